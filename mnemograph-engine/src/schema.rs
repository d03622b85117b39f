//! Per-kind type schemas
//!
//! A schema is registered for every record kind and carries the chunking
//! budget plus an optional structural requirement on write attributes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EngineError, Result};

/// Registered schema for one record kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeSchema {
    /// The kind tag this schema governs
    pub kind: String,
    /// Token budget above which content is chunked
    pub max_tokens: usize,
    /// Tokens repeated across consecutive chunk boundaries
    pub overlap_tokens: usize,
    /// Attribute keys every record of this kind must carry
    #[serde(default)]
    pub required_attributes: Vec<String>,
}

impl TypeSchema {
    /// Create a schema, validating the chunk configuration
    pub fn new(kind: impl Into<String>, max_tokens: usize, overlap_tokens: usize) -> Result<Self> {
        if max_tokens == 0 || overlap_tokens >= max_tokens {
            return Err(EngineError::InvalidChunkConfig {
                max_tokens,
                overlap_tokens,
            });
        }
        Ok(Self {
            kind: kind.into(),
            max_tokens,
            overlap_tokens,
            required_attributes: Vec::new(),
        })
    }

    /// Require an attribute key on every record of this kind
    pub fn require(mut self, key: impl Into<String>) -> Self {
        self.required_attributes.push(key.into());
        self
    }

    /// Check write attributes against the structural requirements
    pub fn validate_attributes(&self, attributes: &Map<String, Value>) -> Result<()> {
        for key in &self.required_attributes {
            match attributes.get(key) {
                Some(value) if !value.is_null() => {}
                _ => {
                    return Err(EngineError::schema_violation(format!(
                        "kind '{}' requires attribute '{}'",
                        self.kind, key
                    )))
                }
            }
        }
        Ok(())
    }
}
