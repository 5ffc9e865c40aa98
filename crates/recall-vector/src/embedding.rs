//! Embedder trait and a deterministic implementation.
//!
//! Recall does not generate embeddings itself; documents arrive with their
//! vectors already computed. The [`Embedder`] trait is the seam through which
//! a provider can offer a text-only query path (see
//! [`MemoryProvider::query_text`](crate::memory::MemoryProvider::query_text))
//! by delegating to an external embedding service.
//!
//! [`HashEmbedder`] produces stable vectors from the input bytes. It carries
//! no semantics and exists for tests and local experiments.

use async_trait::async_trait;
use recall_core::Result;

/// Trait for turning text into embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts.
    ///
    /// Default implementation calls `embed` for each text sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Output dimension.
    fn dimension(&self) -> usize;

    /// Embedder name for diagnostics.
    fn name(&self) -> &str;
}

/// Deterministic, unit-normalized embeddings derived from text bytes.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create an embedder with the given output dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        // FNV-1a over the bytes, folding each running hash into a slot.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for (pos, byte) in text.bytes().enumerate() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
            let slot = (hash as usize ^ pos) % self.dimension;
            vector[slot] += ((hash >> 40) as f32 / (1u64 << 24) as f32) - 0.5;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_embed_dimension_and_norm() {
        let embedder = HashEmbedder::new(8);
        let vector = embedder.embed("interface contract").await.unwrap();

        assert_eq!(vector.len(), 8);
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hash_embed_deterministic() {
        let embedder = HashEmbedder::new(16);
        let a = embedder.embed("same text").await.unwrap();
        let b = embedder.embed("same text").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hash_embed_distinguishes_texts() {
        let embedder = HashEmbedder::new(16);
        let a = embedder.embed("text one").await.unwrap();
        let b = embedder.embed("text two").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_hash_embed_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(4);
        let vector = embedder.embed("").await.unwrap();
        assert_eq!(vector, vec![0.0; 4]);
    }

    #[tokio::test]
    async fn test_hash_embed_batch() {
        let embedder = HashEmbedder::new(4);
        let vectors = embedder.embed_batch(&["a", "b", "c"]).await.unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], embedder.embed("a").await.unwrap());
    }

    #[test]
    fn test_embedder_metadata() {
        let embedder = HashEmbedder::new(32);
        assert_eq!(embedder.dimension(), 32);
        assert_eq!(embedder.name(), "hash");
    }
}
