//! Engine facade: the write pipeline and the public read operations
//!
//! Writes run normalize -> chunk -> persist -> link as one logical unit;
//! reads compose the compiled predicate with similarity ranking or with
//! bounded graph traversal. Callers hand in embeddings; this engine never
//! generates them.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::chunker::{ChunkSplitter, Tokenizer};
use crate::entity::{Entity, EntityId, EntityLink};
use crate::error::{EngineError, Result};
use crate::filter::Filter;
use crate::graph::{self, MemoryEdge, TraversedEdge, FOLLOWS_UP, VERSION_OF};
use crate::record::{Chunk, ChunkId, MemoryId, MemoryRecord, RecordStatus};
use crate::schema::TypeSchema;
use crate::search::{SearchHit, SearchRequest, SimilarityIndex};
use crate::store::{RecordStore, StoreConfig};
use crate::vector::normalize;

/// A write submitted by the external collaborator
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub owner_id: Option<Uuid>,
    pub kind: String,
    pub content: String,
    pub attributes: Map<String, Value>,
    /// Raw embedding; normalized before persistence
    pub embedding: Option<Vec<f32>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl WriteRequest {
    pub fn new(kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            owner_id: None,
            kind: kind.into(),
            content: content.into(),
            attributes: Map::new(),
            embedding: None,
            expires_at: None,
        }
    }

    pub fn owner(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

/// Outcome of a write: one record, or a record with its ordered chunks
///
/// Callers must handle both shapes; chunking activates only when the
/// content exceeds the kind's token budget.
#[derive(Debug, Clone)]
pub enum Remembered {
    Single(MemoryRecord),
    Chunked {
        record: MemoryRecord,
        chunks: Vec<Chunk>,
    },
}

impl Remembered {
    /// The written record regardless of shape
    pub fn record(&self) -> &MemoryRecord {
        match self {
            Self::Single(record) => record,
            Self::Chunked { record, .. } => record,
        }
    }

    /// The chunk pieces, empty for the single shape
    pub fn chunks(&self) -> &[Chunk] {
        match self {
            Self::Single(_) => &[],
            Self::Chunked { chunks, .. } => chunks,
        }
    }
}

/// A read submitted by the external collaborator
#[derive(Debug, Clone)]
pub struct RecallRequest {
    pub query: Vec<f32>,
    pub threshold: f32,
    pub limit: usize,
    pub owner_id: Option<Uuid>,
    /// Structured-attribute filter specification
    pub filter: Option<Value>,
    /// Temporal filter specification (created_at / updated_at / expires_at)
    pub temporal_filter: Option<Value>,
    /// Entity filter specification; setting one implies entity inclusion
    pub entity_filter: Option<Value>,
    pub include_entities: bool,
    pub include_chunks: bool,
}

impl RecallRequest {
    pub fn new(query: Vec<f32>, threshold: f32, limit: usize) -> Self {
        Self {
            query,
            threshold,
            limit,
            owner_id: None,
            filter: None,
            temporal_filter: None,
            entity_filter: None,
            include_entities: false,
            include_chunks: true,
        }
    }
}

/// The retrieval and relationship engine
pub struct MemoryEngine {
    store: Arc<RecordStore>,
    splitter: ChunkSplitter,
    index: SimilarityIndex,
}

impl MemoryEngine {
    /// Open an engine over a store at the given path
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        Self::open_with_tokenizer(path, config, crate::chunker::WhitespaceTokenizer)
    }

    /// Open with a caller-supplied token counter
    pub fn open_with_tokenizer(
        path: impl AsRef<Path>,
        config: StoreConfig,
        tokenizer: impl Tokenizer + 'static,
    ) -> Result<Self> {
        let store = Arc::new(RecordStore::open(path, config)?);
        let index = SimilarityIndex::new(store.clone());
        Ok(Self {
            store,
            splitter: ChunkSplitter::new(tokenizer),
            index,
        })
    }

    /// Shared store handle
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    // ----- schema collaborator -----

    /// Register or replace the schema for a record kind
    pub fn register_schema(&self, schema: TypeSchema) -> Result<()> {
        self.store.put_schema(schema)
    }

    // ----- write path -----

    /// Store a memory: normalize -> chunk -> persist -> link, atomically
    pub fn remember(&self, request: WriteRequest) -> Result<Remembered> {
        let schema = self
            .store
            .schema(&request.kind)
            .ok_or_else(|| EngineError::unknown_kind(&request.kind))?;
        schema.validate_attributes(&request.attributes)?;

        let embedding = match request.embedding {
            Some(raw) => {
                self.check_dimension(&raw)?;
                Some(normalize(&raw)?)
            }
            None => None,
        };

        let record = {
            let mut builder = MemoryRecord::builder()
                .kind(&request.kind)
                .content(&request.content)
                .attributes(request.attributes);
            if let Some(owner) = request.owner_id {
                builder = builder.owner(owner);
            }
            if let Some(embedding) = embedding {
                builder = builder.embedding(embedding);
            }
            if let Some(at) = request.expires_at {
                builder = builder.expires_at(at);
            }
            builder
                .build()
                .map_err(|e| EngineError::schema_violation(e.to_string()))?
        };

        let pieces = self
            .splitter
            .split(&request.content, schema.max_tokens, schema.overlap_tokens)?;

        if pieces.len() == 1 {
            self.store.insert_bundle(record.clone(), vec![], vec![])?;
            return Ok(Remembered::Single(record));
        }

        let total = pieces.len() as u32;
        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .enumerate()
            .map(|(i, piece)| Chunk::new(record.id, i as u32, total, piece))
            .collect();

        let edges: Vec<MemoryEdge> = chunks
            .windows(2)
            .map(|pair| {
                let mut attributes = Map::new();
                attributes.insert("chunk_index".into(), Value::from(pair[0].chunk_index));
                attributes.insert("chunk_total".into(), Value::from(total));
                MemoryEdge::new(pair[0].id.0, pair[1].id.0, FOLLOWS_UP)
                    .with_attributes(attributes)
            })
            .collect();

        log::debug!(
            "Chunked record {} into {} pieces ({} follow-up edges)",
            record.id,
            total,
            edges.len()
        );

        self.store
            .insert_bundle(record.clone(), chunks.clone(), edges)?;
        Ok(Remembered::Chunked { record, chunks })
    }

    /// Re-write a record's content as a new record, optionally linked back
    /// to the one it replaces with a `version_of` edge
    pub fn update(
        &self,
        id: MemoryId,
        content: impl Into<String>,
        attributes: Option<Map<String, Value>>,
        embedding: Option<Vec<f32>>,
        create_version_edge: bool,
    ) -> Result<Remembered> {
        let old = self
            .store
            .record(id)
            .ok_or_else(|| EngineError::not_found(id.to_string()))?;

        let mut request = WriteRequest::new(old.kind.clone(), content);
        request.owner_id = old.owner_id;
        request.attributes = attributes.unwrap_or(old.attributes);
        request.embedding = embedding;
        request.expires_at = old.expires_at;

        let remembered = self.remember(request)?;
        if create_version_edge {
            self.store
                .put_edge(MemoryEdge::new(remembered.record().id.0, id.0, VERSION_OF))?;
        }
        Ok(remembered)
    }

    /// Delete a record and everything it owns; false when absent
    pub fn forget(&self, id: MemoryId) -> Result<bool> {
        self.store.delete_record_cascade(id)
    }

    /// Transition a record's lifecycle status
    pub fn set_status(&self, id: MemoryId, status: RecordStatus) -> Result<MemoryRecord> {
        self.store
            .update_record(id, |record| {
                record.status = status;
                record.touch();
            })?
            .ok_or_else(|| EngineError::not_found(id.to_string()))
    }

    /// Replace a record's attributes
    pub fn set_attributes(
        &self,
        id: MemoryId,
        attributes: Map<String, Value>,
    ) -> Result<MemoryRecord> {
        self.store
            .update_record(id, |record| {
                record.attributes = attributes;
                record.touch();
            })?
            .ok_or_else(|| EngineError::not_found(id.to_string()))
    }

    /// Set a record's embedding; normalized before persistence
    pub fn set_embedding(&self, id: MemoryId, embedding: Vec<f32>) -> Result<MemoryRecord> {
        self.check_dimension(&embedding)?;
        let normalized = normalize(&embedding)?;
        self.store
            .update_record(id, |record| {
                record.embedding = Some(normalized);
                record.touch();
            })?
            .ok_or_else(|| EngineError::not_found(id.to_string()))
    }

    /// Set a chunk's embedding; normalized before persistence
    pub fn set_chunk_embedding(&self, id: ChunkId, embedding: Vec<f32>) -> Result<Chunk> {
        self.check_dimension(&embedding)?;
        let normalized = normalize(&embedding)?;
        self.store
            .update_chunk(id, |chunk| {
                chunk.embedding = Some(normalized);
                chunk.updated_at = Utc::now();
            })?
            .ok_or_else(|| EngineError::not_found(id.to_string()))
    }

    // ----- relationship graph -----

    /// Link two records; re-linking the same (source, target, relationship)
    /// replaces weight and attributes instead of duplicating the edge
    pub fn link(
        &self,
        source: MemoryId,
        target: MemoryId,
        relationship: impl Into<String>,
        weight: f32,
        attributes: Map<String, Value>,
    ) -> Result<MemoryEdge> {
        let relationship = relationship.into();
        for id in [source, target] {
            if self.store.record(id).is_none() {
                return Err(EngineError::not_found(id.to_string()));
            }
        }

        let mut edge = MemoryEdge::new(source.0, target.0, relationship.clone())
            .with_weight(weight)
            .with_attributes(attributes);
        if let Some(existing) = self.store.edge_by_triple(source.0, target.0, &relationship) {
            edge.id = existing.id;
            edge.created_at = existing.created_at;
        }
        self.store.put_edge(edge.clone())?;
        Ok(edge)
    }

    /// Remove links between two records; count of edges removed
    pub fn unlink(
        &self,
        source: MemoryId,
        target: MemoryId,
        relationship: Option<&str>,
    ) -> Result<usize> {
        self.store
            .remove_edges_between(source.0, target.0, relationship)
    }

    /// Bounded breadth-first traversal from a seed record or chunk
    pub fn connected(
        &self,
        seed: Uuid,
        relationship: Option<&str>,
        max_depth: u32,
    ) -> Vec<TraversedEdge> {
        graph::connected(
            &self.store.edges_snapshot(),
            seed,
            relationship,
            max_depth,
        )
    }

    // ----- entities -----

    /// Create an entity; its embedding is normalized before persistence
    pub fn create_entity(&self, mut entity: Entity) -> Result<Entity> {
        if let Some(raw) = entity.embedding.take() {
            self.check_dimension(&raw)?;
            entity.embedding = Some(normalize(&raw)?);
        }
        self.store.put_entity(entity.clone())?;
        Ok(entity)
    }

    /// Link an entity to a record; unique on (entity, record, relationship)
    pub fn link_entity(
        &self,
        entity_id: EntityId,
        memory_id: MemoryId,
        relationship: impl Into<String>,
        confidence: f32,
    ) -> Result<EntityLink> {
        let relationship = relationship.into();
        if self.store.entity(entity_id).is_none() {
            return Err(EngineError::not_found(entity_id.to_string()));
        }
        if self.store.record(memory_id).is_none() {
            return Err(EngineError::not_found(memory_id.to_string()));
        }

        let mut link = EntityLink::new(entity_id, memory_id, relationship.clone(), confidence);
        if let Some(existing) =
            self.store
                .entity_link_by_triple(entity_id, memory_id, &relationship)
        {
            link.id = existing.id;
            link.created_at = existing.created_at;
        }
        self.store.put_entity_link(link.clone())?;
        Ok(link)
    }

    /// Delete an entity and its links; false when absent
    pub fn delete_entity(&self, id: EntityId) -> Result<bool> {
        self.store.delete_entity_cascade(id)
    }

    // ----- read path -----

    /// Ranked similarity search under owner scope and compiled filters
    ///
    /// Filter specifications are compiled (and rejected) before any
    /// storage access.
    pub fn recall(&self, request: RecallRequest) -> Result<Vec<SearchHit>> {
        let structured = match &request.filter {
            Some(spec) => Filter::compile(spec)?,
            None => Filter::match_all(),
        };
        let temporal = match &request.temporal_filter {
            Some(spec) => Filter::compile(spec)?,
            None => Filter::match_all(),
        };
        let entity_predicate = match &request.entity_filter {
            Some(spec) => Filter::compile(spec)?,
            None => Filter::match_all(),
        };

        let search = SearchRequest {
            query: request.query,
            threshold: request.threshold,
            limit: request.limit,
            owner_id: request.owner_id,
            predicate: structured.and(temporal),
            entity_predicate,
            include_chunks: request.include_chunks,
            include_entities: request.include_entities || request.entity_filter.is_some(),
            active_only: true,
        };
        self.index.search(&search)
    }

    /// Point lookup of a record
    pub fn record(&self, id: MemoryId) -> Result<MemoryRecord> {
        self.store
            .record(id)
            .ok_or_else(|| EngineError::not_found(id.to_string()))
    }

    /// Chunks of a record in index order
    pub fn chunks_of(&self, id: MemoryId) -> Vec<Chunk> {
        self.store.chunks_of(id)
    }

    fn check_dimension(&self, v: &[f32]) -> Result<()> {
        let expected = self.store.config().dimension;
        if v.len() != expected {
            return Err(EngineError::DimensionMismatch {
                expected,
                got: v.len(),
            });
        }
        Ok(())
    }
}
