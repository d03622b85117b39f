//! Entities and entity-to-record links
//!
//! An entity is a named concept distinct from any single record. Records
//! reference entities through confidence-scored, labeled links, enabling
//! entity-centric search alongside record search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::record::MemoryId;

/// Unique identifier for entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named concept with its own optional embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Create a named entity
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            name: name.into(),
            description: None,
            attributes: Map::new(),
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the embedding (stored as given; the write path normalizes)
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Many-to-many join between an entity and a record
///
/// Unique on (entity, record, relationship); re-linking the same triple
/// replaces the confidence rather than creating a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityLink {
    pub id: Uuid,
    pub entity_id: EntityId,
    pub memory_id: MemoryId,
    pub relationship: String,
    /// Link confidence in [0, 1]
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
}

impl EntityLink {
    /// Create a link, clamping confidence into [0, 1]
    pub fn new(
        entity_id: EntityId,
        memory_id: MemoryId,
        relationship: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id,
            memory_id,
            relationship: relationship.into(),
            confidence: confidence.clamp(0.0, 1.0),
            created_at: Utc::now(),
        }
    }

    /// The uniqueness key for dedup on insert
    pub fn triple(&self) -> (EntityId, MemoryId, &str) {
        (self.entity_id, self.memory_id, self.relationship.as_str())
    }
}
