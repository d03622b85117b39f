//! Similarity search over records, chunks, and entities
//!
//! Ranks every embedded object that satisfies the compiled predicate by
//! cosine similarity (inner product of unit vectors), descending, with a
//! deterministic id tie-break. The HNSW index supplies over-fetched
//! candidates; exact rescoring and a full-scan fallback preserve the
//! correctness contract when the index underfills the limit.

use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use chrono::Utc;

use crate::entity::Entity;
use crate::error::{EngineError, Result};
use crate::filter::{lookup_path, FieldSource, Filter};
use crate::record::{Chunk, MemoryRecord, RecordStatus};
use crate::store::{RecordStore, RefKind, VectorRef};
use crate::vector::normalize;

/// Tolerance when comparing scores against the threshold, so an exact
/// duplicate still clears `threshold = 1.0` under f32 rounding
pub const SCORE_EPSILON: f32 = 1e-6;

/// The matched object behind a search hit
#[derive(Debug, Clone)]
pub enum SearchPayload {
    Record(MemoryRecord),
    Chunk(Chunk),
    Entity(Entity),
}

/// One ranked search result
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Cosine similarity in [-1, 1]
    pub score: f32,
    pub payload: SearchPayload,
}

impl SearchHit {
    /// Which table the hit came from
    pub fn kind(&self) -> RefKind {
        match &self.payload {
            SearchPayload::Record(_) => RefKind::Record,
            SearchPayload::Chunk(_) => RefKind::Chunk,
            SearchPayload::Entity(_) => RefKind::Entity,
        }
    }

    /// Raw id of the hit, the secondary sort key
    pub fn id(&self) -> Uuid {
        match &self.payload {
            SearchPayload::Record(r) => r.id.0,
            SearchPayload::Chunk(c) => c.id.0,
            SearchPayload::Entity(e) => e.id.0,
        }
    }
}

/// Parameters of one similarity search
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Query vector; normalized internally before ranking
    pub query: Vec<f32>,
    /// Minimum score for inclusion
    pub threshold: f32,
    /// Maximum number of hits; 0 returns nothing
    pub limit: usize,
    /// Restrict record/chunk hits to one owner
    pub owner_id: Option<Uuid>,
    /// Compiled predicate applied to records and chunks
    pub predicate: Filter,
    /// Predicate applied to entities when they are included
    pub entity_predicate: Filter,
    /// Whether chunk embeddings participate
    pub include_chunks: bool,
    /// Whether entities participate (tagged-union results)
    pub include_entities: bool,
    /// Skip archived/deleted records (and their chunks)
    pub active_only: bool,
}

impl SearchRequest {
    /// Search with open predicates and default scoping
    pub fn new(query: Vec<f32>, threshold: f32, limit: usize) -> Self {
        Self {
            query,
            threshold,
            limit,
            owner_id: None,
            predicate: Filter::match_all(),
            entity_predicate: Filter::match_all(),
            include_chunks: true,
            include_entities: false,
            active_only: true,
        }
    }
}

/// Similarity index over a shared record store
pub struct SimilarityIndex {
    store: Arc<RecordStore>,
}

impl SimilarityIndex {
    /// Create a search index over the store
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Run a ranked search
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let dimension = self.store.config().dimension;
        if request.query.len() != dimension {
            return Err(EngineError::DimensionMismatch {
                expected: dimension,
                got: request.query.len(),
            });
        }
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let query = normalize(&request.query)?;

        // ANN candidates first; a full exact scan whenever the index is
        // missing or the filtered candidates underfill the limit.
        let overfetch = self.store.config().overfetch.max(1);
        let mut hits = match self
            .store
            .ann_candidates(&query, request.limit * overfetch)
        {
            Some(candidates) => self.collect_hits(candidates, request),
            None => Vec::new(),
        };
        if hits.len() < request.limit {
            hits = self.collect_hits(self.store.scan_scored(&query), request);
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id().cmp(&b.id()))
        });
        hits.truncate(request.limit);
        Ok(hits)
    }

    /// Filter scored candidates down to accepted hits
    fn collect_hits(
        &self,
        candidates: Vec<(VectorRef, f32)>,
        request: &SearchRequest,
    ) -> Vec<SearchHit> {
        let now = Utc::now();
        let mut hits = Vec::new();
        for (vref, score) in candidates {
            if score + SCORE_EPSILON < request.threshold {
                continue;
            }
            let Some(payload) = self.accept(vref, request, now) else {
                continue;
            };
            hits.push(SearchHit { score, payload });
        }
        hits
    }

    /// Apply scoping and predicates to one candidate
    fn accept(
        &self,
        vref: VectorRef,
        request: &SearchRequest,
        now: chrono::DateTime<Utc>,
    ) -> Option<SearchPayload> {
        match vref.kind {
            RefKind::Record => {
                let record = self.store.record(crate::record::MemoryId(vref.id))?;
                self.record_in_scope(&record, request, now)?;
                request.predicate.matches(&record).then(|| SearchPayload::Record(record))
            }
            RefKind::Chunk => {
                if !request.include_chunks {
                    return None;
                }
                let chunk = self.store.chunk(crate::record::ChunkId(vref.id))?;
                // A chunk is scoped by the record that owns it.
                let parent = self.store.record(chunk.memory_id)?;
                self.record_in_scope(&parent, request, now)?;
                request.predicate.matches(&chunk).then(|| SearchPayload::Chunk(chunk))
            }
            RefKind::Entity => {
                if !request.include_entities {
                    return None;
                }
                let entity = self.store.entity(crate::entity::EntityId(vref.id))?;
                request
                    .entity_predicate
                    .matches(&entity)
                    .then(|| SearchPayload::Entity(entity))
            }
        }
    }

    /// Owner / status / expiry scoping for a record
    fn record_in_scope(
        &self,
        record: &MemoryRecord,
        request: &SearchRequest,
        now: chrono::DateTime<Utc>,
    ) -> Option<()> {
        if let Some(owner) = request.owner_id {
            if record.owner_id != Some(owner) {
                return None;
            }
        }
        if request.active_only && record.status != RecordStatus::Active {
            return None;
        }
        if record.is_expired_at(now) {
            return None;
        }
        Some(())
    }
}

// ----- predicate field resolution for the stored types -----

impl FieldSource for MemoryRecord {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.to_string())),
            "owner_id" => Some(
                self.owner_id
                    .map(|o| Value::String(o.to_string()))
                    .unwrap_or(Value::Null),
            ),
            "kind" => Some(Value::String(self.kind.clone())),
            "status" => Some(Value::String(self.status.as_str().to_string())),
            "content" => Some(Value::String(self.content.clone())),
            "created_at" => Some(Value::String(self.created_at.to_rfc3339())),
            "updated_at" => Some(Value::String(self.updated_at.to_rfc3339())),
            "expires_at" => Some(
                self.expires_at
                    .map(|t| Value::String(t.to_rfc3339()))
                    .unwrap_or(Value::Null),
            ),
            path => lookup_path(&self.attributes, path),
        }
    }
}

impl FieldSource for Chunk {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.to_string())),
            "memory_id" => Some(Value::String(self.memory_id.to_string())),
            "chunk_index" => Some(Value::from(self.chunk_index)),
            "content" => Some(Value::String(self.content.clone())),
            "created_at" => Some(Value::String(self.created_at.to_rfc3339())),
            "updated_at" => Some(Value::String(self.updated_at.to_rfc3339())),
            path => lookup_path(&self.attributes, path),
        }
    }
}

impl FieldSource for Entity {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.to_string())),
            "name" => Some(Value::String(self.name.clone())),
            "description" => Some(
                self.description
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            ),
            "created_at" => Some(Value::String(self.created_at.to_rfc3339())),
            "updated_at" => Some(Value::String(self.updated_at.to_rfc3339())),
            path => lookup_path(&self.attributes, path),
        }
    }
}
