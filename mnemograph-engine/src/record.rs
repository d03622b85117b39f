//! Memory record and chunk types
//!
//! Core stored units of the engine: a record carries content, an open
//! attribute map, and an optional unit-normalized embedding; oversized
//! content is carried by ordered chunks owned by their record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Unique identifier for memory records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    /// Create a new random MemoryId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MemoryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(pub Uuid);

impl ChunkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ChunkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ChunkId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle status of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Active,
    Archived,
    Deleted,
}

impl RecordStatus {
    /// Lowercase wire name, as exposed to filters
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Deleted => "deleted",
        }
    }
}

/// A stored memory record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier
    pub id: MemoryId,
    /// Owning agent, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    /// Registered kind tag
    pub kind: String,
    /// Lifecycle status
    pub status: RecordStatus,
    /// Full content text
    pub content: String,
    /// Open structured attributes, arbitrary nesting
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Unit-normalized embedding vector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
    /// Optional expiry; expired records are skipped by search
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    /// Create a new builder for MemoryRecord
    pub fn builder() -> MemoryRecordBuilder {
        MemoryRecordBuilder::default()
    }

    /// Whether the record has expired relative to `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expiry) if expiry <= now)
    }

    /// Stamp the update timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Builder for MemoryRecord with fluent API
#[derive(Debug, Default)]
pub struct MemoryRecordBuilder {
    id: Option<MemoryId>,
    owner_id: Option<Uuid>,
    kind: Option<String>,
    status: RecordStatus,
    content: Option<String>,
    attributes: Map<String, Value>,
    embedding: Option<Vec<f32>>,
    expires_at: Option<DateTime<Utc>>,
}

impl MemoryRecordBuilder {
    /// Set the record ID (auto-generated if not set)
    pub fn id(mut self, id: MemoryId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the owning agent
    pub fn owner(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    /// Set the kind tag
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Set the lifecycle status
    pub fn status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the content
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Add a single attribute
    pub fn attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Set the full attribute map
    pub fn attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set the embedding vector (stored as given; the write path normalizes)
    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Set the expiry timestamp
    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Build the MemoryRecord
    pub fn build(self) -> Result<MemoryRecord, RecordBuilderError> {
        let kind = self.kind.ok_or(RecordBuilderError::MissingKind)?;
        let content = self.content.ok_or(RecordBuilderError::MissingContent)?;
        let now = Utc::now();

        Ok(MemoryRecord {
            id: self.id.unwrap_or_default(),
            owner_id: self.owner_id,
            kind,
            status: self.status,
            content,
            attributes: self.attributes,
            embedding: self.embedding,
            created_at: now,
            updated_at: now,
            expires_at: self.expires_at,
        })
    }
}

/// Errors that can occur when building a MemoryRecord
#[derive(Debug, thiserror::Error)]
pub enum RecordBuilderError {
    #[error("Missing required field: kind")]
    MissingKind,
    #[error("Missing required field: content")]
    MissingContent,
}

/// An ordered sub-piece of a record's content
///
/// Chunk indices for a record form a contiguous sequence starting at 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier
    pub id: ChunkId,
    /// Owning record
    pub memory_id: MemoryId,
    /// Zero-based position within the record
    pub chunk_index: u32,
    /// This piece's content
    pub content: String,
    /// Unit-normalized embedding for this piece
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Position metadata and any caller attributes
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chunk {
    /// Create a chunk for a record, stamping position metadata
    pub fn new(memory_id: MemoryId, chunk_index: u32, chunk_total: u32, content: String) -> Self {
        let now = Utc::now();
        let mut attributes = Map::new();
        attributes.insert("chunk_index".into(), Value::from(chunk_index));
        attributes.insert("chunk_total".into(), Value::from(chunk_total));
        Self {
            id: ChunkId::new(),
            memory_id,
            chunk_index,
            content,
            embedding: None,
            attributes,
            created_at: now,
            updated_at: now,
        }
    }
}
