//! Document schemas and metadata validation.
//!
//! A [`DocumentSchema`] names a set of metadata field definitions. Schemas
//! are checked when they are defined (at least one required field, patterns
//! only on string fields, patterns must compile), so validating a document
//! never fails: it only produces a list of human-readable violations.
//!
//! Schemas deserialize from the JSON shape used by schema files:
//!
//! ```json
//! {
//!   "name": "lld",
//!   "version": "1",
//!   "fields": {
//!     "component_type": { "type": "string", "required": true },
//!     "interfaces": { "type": "array", "required": true },
//!     "status": { "type": "string", "enum": ["draft", "final"] }
//!   }
//! }
//! ```

use recall_core::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use crate::types::VectorDocument;

// ============================================================================
// Field definitions
// ============================================================================

/// Type constraint on a metadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// JSON string.
    String,
    /// JSON number (integer or float).
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON array.
    #[serde(alias = "list")]
    Array,
    /// JSON object.
    Object,
}

impl FieldType {
    /// Whether `value` has this type.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// Constraints on a single metadata field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Whether the field must be present.
    #[serde(default)]
    pub required: bool,

    /// Expected value type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,

    /// Allowed values.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,

    /// Regex the value must match from its first character (string fields only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl FieldDefinition {
    /// A required field of the given type.
    pub fn required(field_type: FieldType) -> Self {
        Self {
            required: true,
            field_type: Some(field_type),
            ..Default::default()
        }
    }

    /// An optional field of the given type.
    pub fn optional(field_type: FieldType) -> Self {
        Self {
            required: false,
            field_type: Some(field_type),
            ..Default::default()
        }
    }

    /// Restrict the field to a set of values.
    pub fn with_allowed<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Require string values to match a pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

// ============================================================================
// Schema
// ============================================================================

/// Serialized form of a [`DocumentSchema`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Schema name.
    #[serde(default)]
    pub name: String,

    /// Optional schema version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Field definitions keyed by metadata key.
    pub fields: BTreeMap<String, FieldDefinition>,
}

/// A validated document schema with its patterns compiled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SchemaDefinition", into = "SchemaDefinition")]
pub struct DocumentSchema {
    definition: SchemaDefinition,
    patterns: HashMap<String, Regex>,
}

impl DocumentSchema {
    /// Define a schema from named fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaDefinition`] if no field is required, a pattern
    /// is attached to a non-string field, or a pattern does not compile.
    pub fn new<I, K>(name: impl Into<String>, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, FieldDefinition)>,
        K: Into<String>,
    {
        Self::from_definition(SchemaDefinition {
            name: name.into(),
            version: None,
            description: None,
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })
    }

    /// Build a schema from its serialized definition.
    pub fn from_definition(definition: SchemaDefinition) -> Result<Self> {
        if !definition.fields.values().any(|f| f.required) {
            return Err(Error::schema(format!(
                "schema '{}' must contain at least one required field",
                definition.name
            )));
        }

        let mut patterns = HashMap::new();
        for (name, field) in &definition.fields {
            let Some(pattern) = &field.pattern else {
                continue;
            };
            if field.field_type != Some(FieldType::String) {
                return Err(Error::schema(format!(
                    "field '{name}' has a pattern but is not a string field"
                )));
            }
            let regex = Regex::new(pattern).map_err(|e| {
                Error::schema(format!("field '{name}' has an invalid pattern: {e}"))
            })?;
            patterns.insert(name.clone(), regex);
        }

        Ok(Self {
            definition,
            patterns,
        })
    }

    /// Set the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.definition.version = Some(version.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = Some(description.into());
        self
    }

    /// Schema name.
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Schema version, if any.
    pub fn version(&self) -> Option<&str> {
        self.definition.version.as_deref()
    }

    /// Schema description, if any.
    pub fn description(&self) -> Option<&str> {
        self.definition.description.as_deref()
    }

    /// Field definitions keyed by metadata key.
    pub fn fields(&self) -> &BTreeMap<String, FieldDefinition> {
        &self.definition.fields
    }

    /// Names of the required fields, in key order.
    pub fn required_fields(&self) -> Vec<&str> {
        self.definition
            .fields
            .iter()
            .filter(|(_, f)| f.required)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Validate a document's metadata.
    ///
    /// Returns one message per violation, in field-name order. An empty
    /// vector means the document is valid.
    pub fn validate(&self, document: &VectorDocument) -> Vec<String> {
        let mut violations = Vec::new();

        for (name, field) in &self.definition.fields {
            let Some(value) = document.metadata.get(name) else {
                if field.required {
                    violations.push(format!("Missing required field: {name}"));
                }
                continue;
            };

            if let Some(field_type) = field.field_type {
                if !field_type.matches(value) {
                    violations.push(format!("Field {name} must be a {field_type}"));
                }
            }

            if let Some(allowed) = &field.allowed {
                if !allowed.contains(value) {
                    let choices = serde_json::to_string(allowed).unwrap_or_default();
                    violations.push(format!(
                        "Invalid value for {name}. Must be one of: {choices}"
                    ));
                }
            }

            if let (Some(regex), Some(text)) = (self.patterns.get(name), value.as_str()) {
                let anchored = regex.find(text).is_some_and(|m| m.start() == 0);
                if !anchored {
                    violations.push(format!(
                        "Field {name} does not match pattern: {}",
                        regex.as_str()
                    ));
                }
            }
        }

        violations
    }
}

impl TryFrom<SchemaDefinition> for DocumentSchema {
    type Error = Error;

    fn try_from(definition: SchemaDefinition) -> Result<Self> {
        Self::from_definition(definition)
    }
}

impl From<DocumentSchema> for SchemaDefinition {
    fn from(schema: DocumentSchema) -> Self {
        schema.definition
    }
}

// ============================================================================
// Schema catalog
// ============================================================================

/// Named schemas, typically loaded from a directory of `*.json` files.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: HashMap<String, DocumentSchema>,
}

impl SchemaCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` file in `dir`, keyed by file stem.
    ///
    /// A schema file without a `name` takes its file stem as the name.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut catalog = Self::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let raw = std::fs::read_to_string(&path)?;
            let mut definition: SchemaDefinition = serde_json::from_str(&raw).map_err(|e| {
                Error::serialization(format!("{}: {e}", path.display()))
            })?;
            if definition.name.is_empty() {
                definition.name = stem.to_string();
            }

            let schema = DocumentSchema::from_definition(definition)?;
            log::info!("Loaded schema: {stem}");
            catalog.insert(stem, schema);
        }

        Ok(catalog)
    }

    /// Add or replace a schema.
    pub fn insert(&mut self, key: impl Into<String>, schema: DocumentSchema) {
        self.schemas.insert(key.into(), schema);
    }

    /// Look up a schema.
    pub fn get(&self, key: &str) -> Option<&DocumentSchema> {
        self.schemas.get(key)
    }

    /// Catalog keys, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
