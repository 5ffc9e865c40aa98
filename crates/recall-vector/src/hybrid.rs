//! Hybrid retrieval: merging keyword and vector result lists.
//!
//! Two fusion methods are supported:
//!
//! - **Reciprocal rank fusion**: `score(d) = Σ 1/(k + rank_i(d))` with a
//!   1-based rank per list. With the default `k = 0`, the top hit of a list
//!   contributes `1.0`, the second `0.5`, and so on.
//! - **Simple**: `score(d) = Σ score_i(d)`, summing the raw scores.
//!
//! The keyword list is scored first, then the vector list. Results are
//! ordered by descending combined score; equal scores keep the order in
//! which ids were first seen.

use recall_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::types::{QueryResult, VectorDocument};

/// Number of fused results returned by [`combine_results`].
pub const DEFAULT_TOP_N: usize = 10;

/// How ranked lists are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethod {
    /// Sum of reciprocal ranks.
    #[default]
    ReciprocalRank,
    /// Sum of raw scores.
    Simple,
}

impl FromStr for FusionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reciprocal_rank" | "rrf" => Ok(Self::ReciprocalRank),
            "simple" => Ok(Self::Simple),
            other => Err(Error::config(format!(
                "unknown fusion method '{other}' (expected reciprocal_rank, rrf or simple)"
            ))),
        }
    }
}

impl fmt::Display for FusionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReciprocalRank => write!(f, "reciprocal_rank"),
            Self::Simple => write!(f, "simple"),
        }
    }
}

/// A scored hit that can take part in fusion.
pub trait RankedHit {
    /// Document identifier.
    fn id(&self) -> &str;

    /// Relevance score from the producing search.
    fn score(&self) -> f32;

    /// The document, when the producing search returned one.
    fn document(&self) -> Option<&VectorDocument> {
        None
    }
}

impl RankedHit for QueryResult {
    fn id(&self) -> &str {
        &self.document.id
    }

    fn score(&self) -> f32 {
        self.score
    }

    fn document(&self) -> Option<&VectorDocument> {
        Some(&self.document)
    }
}

/// A hit produced by a keyword (full-text) search.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    /// Document identifier.
    pub id: String,
    /// Relevance score from the keyword search.
    pub score: f32,
    /// The document, if the keyword engine returned it.
    pub document: Option<VectorDocument>,
}

impl KeywordHit {
    /// Create a hit without a document.
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
            document: None,
        }
    }

    /// Attach the document.
    pub fn with_document(mut self, document: VectorDocument) -> Self {
        self.document = Some(document);
        self
    }
}

impl RankedHit for KeywordHit {
    fn id(&self) -> &str {
        &self.id
    }

    fn score(&self) -> f32 {
        self.score
    }

    fn document(&self) -> Option<&VectorDocument> {
        self.document.as_ref()
    }
}

/// Which input lists contained a fused hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitSource {
    /// Only the keyword list.
    Keyword,
    /// Only the vector list.
    Vector,
    /// Both lists.
    Both,
}

impl HitSource {
    fn merge(self, other: HitSource) -> HitSource {
        if self == other { self } else { HitSource::Both }
    }
}

/// A fused result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridResult {
    /// Document identifier.
    pub id: String,

    /// Combined score (higher is better).
    pub score: f32,

    /// Lists the id appeared in.
    pub source: HitSource,

    /// Document from the first list that supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<VectorDocument>,
}

/// Configurable fuser.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridFusion {
    /// Fusion method.
    pub method: FusionMethod,
    /// RRF rank offset.
    pub k: f32,
    /// Maximum number of fused results.
    pub top_n: usize,
}

impl Default for HybridFusion {
    fn default() -> Self {
        Self {
            method: FusionMethod::default(),
            k: 0.0,
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl HybridFusion {
    /// Fuser with the given method and default `k` / `top_n`.
    pub fn new(method: FusionMethod) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    /// Set the RRF rank offset.
    pub fn with_k(mut self, k: f32) -> Self {
        self.k = k;
        self
    }

    /// Set the result count.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Merge the two lists.
    pub fn fuse<K, V>(&self, keyword: &[K], vector: &[V]) -> Vec<HybridResult>
    where
        K: RankedHit,
        V: RankedHit,
    {
        let mut fused: Vec<HybridResult> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        self.accumulate(&mut fused, &mut positions, keyword, HitSource::Keyword);
        self.accumulate(&mut fused, &mut positions, vector, HitSource::Vector);

        // Stable: equal scores keep first-seen order.
        fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        fused.truncate(self.top_n);
        fused
    }

    fn accumulate<H: RankedHit>(
        &self,
        fused: &mut Vec<HybridResult>,
        positions: &mut HashMap<String, usize>,
        hits: &[H],
        source: HitSource,
    ) {
        for (rank, hit) in hits.iter().enumerate() {
            let contribution = match self.method {
                FusionMethod::ReciprocalRank => 1.0 / (self.k + (rank + 1) as f32),
                FusionMethod::Simple => hit.score(),
            };

            match positions.get(hit.id()) {
                Some(&pos) => {
                    let entry = &mut fused[pos];
                    entry.score += contribution;
                    entry.source = entry.source.merge(source);
                    if entry.document.is_none() {
                        entry.document = hit.document().cloned();
                    }
                }
                None => {
                    positions.insert(hit.id().to_string(), fused.len());
                    fused.push(HybridResult {
                        id: hit.id().to_string(),
                        score: contribution,
                        source,
                        document: hit.document().cloned(),
                    });
                }
            }
        }
    }
}

/// Merge keyword and vector results with `method`, keeping the top
/// [`DEFAULT_TOP_N`].
pub fn combine_results<K, V>(keyword: &[K], vector: &[V], method: FusionMethod) -> Vec<HybridResult>
where
    K: RankedHit,
    V: RankedHit,
{
    HybridFusion::new(method).fuse(keyword, vector)
}

// ============================================================================
// Tests
// ============================================================================
