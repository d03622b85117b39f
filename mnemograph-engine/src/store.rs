//! RocksDB-backed record store
//!
//! Durable keyed storage for records, chunks, edges, entities, links, and
//! schemas, with DashMap caches in front and an optional HNSW index over
//! every stored embedding. A logical write is applied as a single
//! `WriteBatch`, so a record is never durable without its chunks and
//! follow-up edges.

use dashmap::DashMap;
use instant_distance::{Builder, HnswMap, Point, Search};
use parking_lot::RwLock;
use rocksdb::{IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::entity::{Entity, EntityId, EntityLink};
use crate::error::Result;
use crate::graph::{EdgeId, MemoryEdge};
use crate::record::{Chunk, ChunkId, MemoryId, MemoryRecord};
use crate::schema::TypeSchema;
use crate::vector::score;

/// Which stored table a vector belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Record,
    Chunk,
    Entity,
}

/// Identity of one embedded object across the heterogeneous tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorRef {
    pub kind: RefKind,
    pub id: Uuid,
}

/// Store tunables
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Embedding dimension enforced on every write and query
    pub dimension: usize,
    /// ANN candidate multiplier: candidates fetched = limit * overfetch
    pub overfetch: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dimension: 1536,
            overfetch: 3,
        }
    }
}

/// HNSW point wrapper over a unit-normalized vector
#[derive(Clone)]
struct VectorPoint(Vec<f32>);

impl Point for VectorPoint {
    fn distance(&self, other: &Self) -> f32 {
        // Cosine distance over unit vectors (HNSW minimizes)
        1.0 - self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(x, y)| x * y)
            .sum::<f32>()
    }
}

struct AnnIndex {
    hnsw: HnswMap<VectorPoint, VectorRef>,
}

/// Durable store with cache layer and ANN index
pub struct RecordStore {
    db: Arc<DB>,
    records: DashMap<MemoryId, MemoryRecord>,
    chunks: DashMap<ChunkId, Chunk>,
    edges: DashMap<EdgeId, MemoryEdge>,
    entities: DashMap<EntityId, Entity>,
    entity_links: DashMap<Uuid, EntityLink>,
    schemas: DashMap<String, TypeSchema>,
    ann: RwLock<Option<AnnIndex>>,
    config: StoreConfig,
}

fn rec_key(id: MemoryId) -> String {
    format!("rec:{id}")
}

fn chk_key(id: ChunkId) -> String {
    format!("chk:{id}")
}

fn edg_key(id: EdgeId) -> String {
    format!("edg:{id}")
}

fn ent_key(id: EntityId) -> String {
    format!("ent:{id}")
}

fn lnk_key(id: Uuid) -> String {
    format!("lnk:{id}")
}

fn sch_key(kind: &str) -> String {
    format!("sch:{kind}")
}

impl RecordStore {
    /// Open (or create) a store at the given path
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_background_jobs(2);
        opts.set_bytes_per_sync(1048576); // 1MB
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)?;

        log::info!("RecordStore opened at: {}", path.display());

        let store = Self {
            db: Arc::new(db),
            records: DashMap::new(),
            chunks: DashMap::new(),
            edges: DashMap::new(),
            entities: DashMap::new(),
            entity_links: DashMap::new(),
            schemas: DashMap::new(),
            ann: RwLock::new(None),
            config,
        };

        store.load_cache()?;
        store.rebuild_ann();
        Ok(store)
    }

    /// Store configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Load persisted state into the cache layer on startup
    fn load_cache(&self) -> Result<()> {
        let mut loaded = 0usize;
        let mut skipped = 0usize;

        macro_rules! decode_into {
            ($value:expr, $ty:ty, $insert:expr) => {
                match serde_json::from_slice::<$ty>($value) {
                    Ok(decoded) => {
                        $insert(decoded);
                        loaded += 1;
                    }
                    Err(e) => {
                        log::warn!("Failed to decode stored entry: {}. Skipping.", e);
                        skipped += 1;
                    }
                }
            };
        }

        for item in self.db.iterator(IteratorMode::Start) {
            let (key, value) = item?;
            let key = String::from_utf8_lossy(&key);
            match key.split_once(':').map(|(p, _)| p) {
                Some("rec") => decode_into!(&value, MemoryRecord, |r: MemoryRecord| {
                    self.records.insert(r.id, r);
                }),
                Some("chk") => decode_into!(&value, Chunk, |c: Chunk| {
                    self.chunks.insert(c.id, c);
                }),
                Some("edg") => decode_into!(&value, MemoryEdge, |e: MemoryEdge| {
                    self.edges.insert(e.id, e);
                }),
                Some("ent") => decode_into!(&value, Entity, |e: Entity| {
                    self.entities.insert(e.id, e);
                }),
                Some("lnk") => decode_into!(&value, EntityLink, |l: EntityLink| {
                    self.entity_links.insert(l.id, l);
                }),
                Some("sch") => decode_into!(&value, TypeSchema, |s: TypeSchema| {
                    self.schemas.insert(s.kind.clone(), s);
                }),
                _ => {}
            }
        }

        if loaded > 0 {
            log::info!("Loaded {} entries from disk", loaded);
        }
        if skipped > 0 {
            log::warn!("Skipped {} entries due to decode errors", skipped);
        }
        Ok(())
    }

    // ----- schemas -----

    /// Register or replace the schema for a kind
    pub fn put_schema(&self, schema: TypeSchema) -> Result<()> {
        self.db
            .put(sch_key(&schema.kind).as_bytes(), serde_json::to_vec(&schema)?)?;
        self.schemas.insert(schema.kind.clone(), schema);
        Ok(())
    }

    /// Look up the schema for a kind
    pub fn schema(&self, kind: &str) -> Option<TypeSchema> {
        self.schemas.get(kind).map(|s| s.clone())
    }

    // ----- logical writes -----

    /// Persist one logical write as a unit: a record, its chunks, and the
    /// follow-up edges between them. All-or-nothing at the storage layer;
    /// caches are populated chunks-and-edges first so the record never
    /// becomes searchable ahead of its pieces.
    pub fn insert_bundle(
        &self,
        record: MemoryRecord,
        chunks: Vec<Chunk>,
        edges: Vec<MemoryEdge>,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put(rec_key(record.id).as_bytes(), serde_json::to_vec(&record)?);
        for chunk in &chunks {
            batch.put(chk_key(chunk.id).as_bytes(), serde_json::to_vec(chunk)?);
        }
        for edge in &edges {
            batch.put(edg_key(edge.id).as_bytes(), serde_json::to_vec(edge)?);
        }
        self.db.write(batch)?;
        self.db.flush()?;

        for chunk in chunks {
            self.chunks.insert(chunk.id, chunk);
        }
        for edge in edges {
            self.edges.insert(edge.id, edge);
        }
        self.records.insert(record.id, record);
        self.rebuild_ann();
        Ok(())
    }

    /// Persist a single edge
    pub fn put_edge(&self, edge: MemoryEdge) -> Result<()> {
        self.db
            .put(edg_key(edge.id).as_bytes(), serde_json::to_vec(&edge)?)?;
        self.edges.insert(edge.id, edge);
        Ok(())
    }

    /// Persist a single entity
    pub fn put_entity(&self, entity: Entity) -> Result<()> {
        self.db
            .put(ent_key(entity.id).as_bytes(), serde_json::to_vec(&entity)?)?;
        self.entities.insert(entity.id, entity);
        self.rebuild_ann();
        Ok(())
    }

    /// Persist a single entity link
    pub fn put_entity_link(&self, link: EntityLink) -> Result<()> {
        self.db
            .put(lnk_key(link.id).as_bytes(), serde_json::to_vec(&link)?)?;
        self.entity_links.insert(link.id, link);
        Ok(())
    }

    /// Mutate a record in place and persist the result
    pub fn update_record(
        &self,
        id: MemoryId,
        mutate: impl FnOnce(&mut MemoryRecord),
    ) -> Result<Option<MemoryRecord>> {
        let Some(mut entry) = self.records.get_mut(&id) else {
            return Ok(None);
        };
        mutate(&mut entry);
        let updated = entry.clone();
        drop(entry);
        self.db
            .put(rec_key(id).as_bytes(), serde_json::to_vec(&updated)?)?;
        self.rebuild_ann();
        Ok(Some(updated))
    }

    /// Mutate a chunk in place and persist the result
    pub fn update_chunk(
        &self,
        id: ChunkId,
        mutate: impl FnOnce(&mut Chunk),
    ) -> Result<Option<Chunk>> {
        let Some(mut entry) = self.chunks.get_mut(&id) else {
            return Ok(None);
        };
        mutate(&mut entry);
        let updated = entry.clone();
        drop(entry);
        self.db
            .put(chk_key(id).as_bytes(), serde_json::to_vec(&updated)?)?;
        self.rebuild_ann();
        Ok(Some(updated))
    }

    // ----- cascade deletes -----

    /// Delete a record together with its chunks, every edge touching the
    /// record or its chunks, and its entity links. One batch.
    pub fn delete_record_cascade(&self, id: MemoryId) -> Result<bool> {
        if !self.records.contains_key(&id) {
            return Ok(false);
        }

        let chunk_ids: Vec<ChunkId> = self
            .chunks
            .iter()
            .filter(|c| c.value().memory_id == id)
            .map(|c| *c.key())
            .collect();

        let mut owned_nodes: Vec<Uuid> = vec![id.0];
        owned_nodes.extend(chunk_ids.iter().map(|c| c.0));

        let edge_ids: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|e| {
                owned_nodes.contains(&e.value().source_id)
                    || owned_nodes.contains(&e.value().target_id)
            })
            .map(|e| *e.key())
            .collect();

        let link_ids: Vec<Uuid> = self
            .entity_links
            .iter()
            .filter(|l| l.value().memory_id == id)
            .map(|l| *l.key())
            .collect();

        let mut batch = WriteBatch::default();
        batch.delete(rec_key(id).as_bytes());
        for chunk_id in &chunk_ids {
            batch.delete(chk_key(*chunk_id).as_bytes());
        }
        for edge_id in &edge_ids {
            batch.delete(edg_key(*edge_id).as_bytes());
        }
        for link_id in &link_ids {
            batch.delete(lnk_key(*link_id).as_bytes());
        }
        self.db.write(batch)?;
        self.db.flush()?;

        self.records.remove(&id);
        for chunk_id in &chunk_ids {
            self.chunks.remove(chunk_id);
        }
        for edge_id in &edge_ids {
            self.edges.remove(edge_id);
        }
        for link_id in &link_ids {
            self.entity_links.remove(link_id);
        }

        log::debug!(
            "Cascade deleted record {}: {} chunks, {} edges, {} entity links",
            id,
            chunk_ids.len(),
            edge_ids.len(),
            link_ids.len()
        );

        self.rebuild_ann();
        Ok(true)
    }

    /// Delete an entity and its links
    pub fn delete_entity_cascade(&self, id: EntityId) -> Result<bool> {
        if !self.entities.contains_key(&id) {
            return Ok(false);
        }

        let link_ids: Vec<Uuid> = self
            .entity_links
            .iter()
            .filter(|l| l.value().entity_id == id)
            .map(|l| *l.key())
            .collect();

        let mut batch = WriteBatch::default();
        batch.delete(ent_key(id).as_bytes());
        for link_id in &link_ids {
            batch.delete(lnk_key(*link_id).as_bytes());
        }
        self.db.write(batch)?;

        self.entities.remove(&id);
        for link_id in &link_ids {
            self.entity_links.remove(link_id);
        }
        self.rebuild_ann();
        Ok(true)
    }

    /// Remove edges between two nodes, optionally restricted by type
    pub fn remove_edges_between(
        &self,
        source: Uuid,
        target: Uuid,
        relationship: Option<&str>,
    ) -> Result<usize> {
        let edge_ids: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|e| {
                let edge = e.value();
                edge.source_id == source
                    && edge.target_id == target
                    && relationship.map_or(true, |rel| edge.relationship == rel)
            })
            .map(|e| *e.key())
            .collect();

        if edge_ids.is_empty() {
            return Ok(0);
        }

        let mut batch = WriteBatch::default();
        for edge_id in &edge_ids {
            batch.delete(edg_key(*edge_id).as_bytes());
        }
        self.db.write(batch)?;
        for edge_id in &edge_ids {
            self.edges.remove(edge_id);
        }
        Ok(edge_ids.len())
    }

    // ----- reads -----

    /// Get a record by id
    pub fn record(&self, id: MemoryId) -> Option<MemoryRecord> {
        self.records.get(&id).map(|r| r.clone())
    }

    /// Get a chunk by id
    pub fn chunk(&self, id: ChunkId) -> Option<Chunk> {
        self.chunks.get(&id).map(|c| c.clone())
    }

    /// Get an entity by id
    pub fn entity(&self, id: EntityId) -> Option<Entity> {
        self.entities.get(&id).map(|e| e.clone())
    }

    /// Chunks of a record, ordered by chunk index
    pub fn chunks_of(&self, memory_id: MemoryId) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = self
            .chunks
            .iter()
            .filter(|c| c.value().memory_id == memory_id)
            .map(|c| c.value().clone())
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        chunks
    }

    /// Snapshot of every edge, for traversal
    pub fn edges_snapshot(&self) -> Vec<MemoryEdge> {
        self.edges.iter().map(|e| e.value().clone()).collect()
    }

    /// Find an edge by its (source, target, relationship) triple
    pub fn edge_by_triple(
        &self,
        source: Uuid,
        target: Uuid,
        relationship: &str,
    ) -> Option<MemoryEdge> {
        self.edges
            .iter()
            .find(|e| {
                let edge = e.value();
                edge.source_id == source
                    && edge.target_id == target
                    && edge.relationship == relationship
            })
            .map(|e| e.value().clone())
    }

    /// Find an entity link by its uniqueness triple
    pub fn entity_link_by_triple(
        &self,
        entity_id: EntityId,
        memory_id: MemoryId,
        relationship: &str,
    ) -> Option<EntityLink> {
        self.entity_links
            .iter()
            .find(|l| {
                let link = l.value();
                link.entity_id == entity_id
                    && link.memory_id == memory_id
                    && link.relationship == relationship
            })
            .map(|l| l.value().clone())
    }

    /// Links attached to a record
    pub fn links_of_record(&self, memory_id: MemoryId) -> Vec<EntityLink> {
        self.entity_links
            .iter()
            .filter(|l| l.value().memory_id == memory_id)
            .map(|l| l.value().clone())
            .collect()
    }

    /// Number of records currently cached
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Visit every record (cloned snapshot per entry)
    pub fn for_each_record(&self, mut visit: impl FnMut(&MemoryRecord)) {
        for entry in self.records.iter() {
            visit(entry.value());
        }
    }

    /// Visit every chunk
    pub fn for_each_chunk(&self, mut visit: impl FnMut(&Chunk)) {
        for entry in self.chunks.iter() {
            visit(entry.value());
        }
    }

    /// Visit every entity
    pub fn for_each_entity(&self, mut visit: impl FnMut(&Entity)) {
        for entry in self.entities.iter() {
            visit(entry.value());
        }
    }

    // ----- vector index -----

    /// Rebuild the HNSW index from every stored embedding
    fn rebuild_ann(&self) {
        let mut points = Vec::new();
        let mut values = Vec::new();

        for entry in self.records.iter() {
            if let Some(embedding) = &entry.value().embedding {
                points.push(VectorPoint(embedding.clone()));
                values.push(VectorRef {
                    kind: RefKind::Record,
                    id: entry.key().0,
                });
            }
        }
        for entry in self.chunks.iter() {
            if let Some(embedding) = &entry.value().embedding {
                points.push(VectorPoint(embedding.clone()));
                values.push(VectorRef {
                    kind: RefKind::Chunk,
                    id: entry.key().0,
                });
            }
        }
        for entry in self.entities.iter() {
            if let Some(embedding) = &entry.value().embedding {
                points.push(VectorPoint(embedding.clone()));
                values.push(VectorRef {
                    kind: RefKind::Entity,
                    id: entry.key().0,
                });
            }
        }

        if points.is_empty() {
            *self.ann.write() = None;
            return;
        }

        let hnsw = Builder::default().ef_construction(100).build(points, values);
        *self.ann.write() = Some(AnnIndex { hnsw });
    }

    /// Approximate candidates from the HNSW index, exact-rescored
    ///
    /// Returns None when no index is built; callers fall back to a scan.
    pub fn ann_candidates(&self, query: &[f32], limit: usize) -> Option<Vec<(VectorRef, f32)>> {
        let guard = self.ann.read();
        let index = guard.as_ref()?;

        let query_point = VectorPoint(query.to_vec());
        let mut search = Search::default();
        let mut results = Vec::new();
        for candidate in index.hnsw.search(&query_point, &mut search) {
            let exact = score(query, &candidate.point.0).unwrap_or(-1.0);
            results.push((*candidate.value, exact));
            if results.len() >= limit {
                break;
            }
        }
        Some(results)
    }

    /// Exact scores for every stored embedding (full scan)
    pub fn scan_scored(&self, query: &[f32]) -> Vec<(VectorRef, f32)> {
        let mut results = Vec::new();
        for entry in self.records.iter() {
            if let Some(embedding) = &entry.value().embedding {
                if let Ok(s) = score(query, embedding) {
                    results.push((
                        VectorRef {
                            kind: RefKind::Record,
                            id: entry.key().0,
                        },
                        s,
                    ));
                }
            }
        }
        for entry in self.chunks.iter() {
            if let Some(embedding) = &entry.value().embedding {
                if let Ok(s) = score(query, embedding) {
                    results.push((
                        VectorRef {
                            kind: RefKind::Chunk,
                            id: entry.key().0,
                        },
                        s,
                    ));
                }
            }
        }
        for entry in self.entities.iter() {
            if let Some(embedding) = &entry.value().embedding {
                if let Ok(s) = score(query, embedding) {
                    results.push((
                        VectorRef {
                            kind: RefKind::Entity,
                            id: entry.key().0,
                        },
                        s,
                    ));
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::normalize;
    use tempfile::TempDir;

    fn test_store(dim: usize) -> (TempDir, RecordStore) {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(
            dir.path(),
            StoreConfig {
                dimension: dim,
                overfetch: 3,
            },
        )
        .unwrap();
        (dir, store)
    }

    fn record_with_embedding(v: &[f32]) -> MemoryRecord {
        MemoryRecord::builder()
            .kind("knowledge")
            .content("stored fact")
            .embedding(normalize(v).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_bundle_roundtrip_across_reopen() {
        let dir = TempDir::new().unwrap();
        let record_id;
        {
            let store = RecordStore::open(dir.path(), StoreConfig::default()).unwrap();
            let record = record_with_embedding(&[1.0, 0.0, 0.0]);
            record_id = record.id;
            let chunk = Chunk::new(record.id, 0, 2, "piece one".into());
            let chunk2 = Chunk::new(record.id, 1, 2, "piece two".into());
            let edge = MemoryEdge::new(chunk.id.0, chunk2.id.0, "follows_up");
            store
                .insert_bundle(record, vec![chunk, chunk2], vec![edge])
                .unwrap();
        }

        let store = RecordStore::open(dir.path(), StoreConfig::default()).unwrap();
        let record = store.record(record_id).unwrap();
        assert_eq!(record.content, "stored fact");
        let chunks = store.chunks_of(record_id);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(store.edges_snapshot().len(), 1);
    }

    #[test]
    fn test_cascade_delete() {
        let (_dir, store) = test_store(3);
        let record = record_with_embedding(&[1.0, 0.0, 0.0]);
        let record_id = record.id;
        let chunk = Chunk::new(record_id, 0, 2, "a".into());
        let chunk2 = Chunk::new(record_id, 1, 2, "b".into());
        let edge = MemoryEdge::new(chunk.id.0, chunk2.id.0, "follows_up");
        store
            .insert_bundle(record, vec![chunk, chunk2], vec![edge])
            .unwrap();

        let other = record_with_embedding(&[0.0, 1.0, 0.0]);
        let other_id = other.id;
        store.insert_bundle(other, vec![], vec![]).unwrap();
        store
            .put_edge(MemoryEdge::new(record_id.0, other_id.0, "related_to"))
            .unwrap();

        let entity = Entity::new("rocksdb");
        let entity_id = entity.id;
        store.put_entity(entity).unwrap();
        store
            .put_entity_link(EntityLink::new(entity_id, record_id, "mentions", 0.9))
            .unwrap();

        assert!(store.delete_record_cascade(record_id).unwrap());
        assert!(store.record(record_id).is_none());
        assert!(store.chunks_of(record_id).is_empty());
        assert!(store.edges_snapshot().is_empty());
        assert!(store.links_of_record(record_id).is_empty());
        // unrelated record survives
        assert!(store.record(other_id).is_some());

        assert!(!store.delete_record_cascade(record_id).unwrap());
    }

    #[test]
    fn test_remove_edges_between() {
        let (_dir, store) = test_store(3);
        let a = record_with_embedding(&[1.0, 0.0, 0.0]);
        let b = record_with_embedding(&[0.0, 1.0, 0.0]);
        let (a_id, b_id) = (a.id, b.id);
        store.insert_bundle(a, vec![], vec![]).unwrap();
        store.insert_bundle(b, vec![], vec![]).unwrap();
        store
            .put_edge(MemoryEdge::new(a_id.0, b_id.0, "related_to"))
            .unwrap();
        store
            .put_edge(MemoryEdge::new(a_id.0, b_id.0, "version_of"))
            .unwrap();

        let removed = store
            .remove_edges_between(a_id.0, b_id.0, Some("related_to"))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.edges_snapshot().len(), 1);

        let removed = store.remove_edges_between(a_id.0, b_id.0, None).unwrap();
        assert_eq!(removed, 1);
        assert!(store.edges_snapshot().is_empty());
    }

    #[test]
    fn test_schema_persistence() {
        let dir = TempDir::new().unwrap();
        {
            let store = RecordStore::open(dir.path(), StoreConfig::default()).unwrap();
            let schema = TypeSchema::new("knowledge", 128, 16).unwrap();
            store.put_schema(schema).unwrap();
        }
        let store = RecordStore::open(dir.path(), StoreConfig::default()).unwrap();
        let schema = store.schema("knowledge").unwrap();
        assert_eq!(schema.max_tokens, 128);
        assert!(store.schema("unregistered").is_none());
    }

    #[test]
    fn test_scan_scored_covers_all_kinds() {
        let (_dir, store) = test_store(2);
        let record = record_with_embedding(&[1.0, 0.0]);
        store.insert_bundle(record, vec![], vec![]).unwrap();

        let entity = Entity::new("topic").with_embedding(normalize(&[0.0, 1.0]).unwrap());
        store.put_entity(entity).unwrap();

        let query = normalize(&[1.0, 0.0]).unwrap();
        let scored = store.scan_scored(&query);
        assert_eq!(scored.len(), 2);
        let best = scored
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .unwrap();
        assert_eq!(best.0.kind, RefKind::Record);
        assert!((best.1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ann_candidates_after_inserts() {
        let (_dir, store) = test_store(2);
        for i in 0..20 {
            let angle = i as f32 * 0.1;
            let record = record_with_embedding(&[angle.cos(), angle.sin()]);
            store.insert_bundle(record, vec![], vec![]).unwrap();
        }
        let query = normalize(&[1.0, 0.0]).unwrap();
        let candidates = store.ann_candidates(&query, 5).unwrap();
        assert!(!candidates.is_empty());
        assert!(candidates.len() <= 5);
        // best candidate should be very close to the query direction
        assert!(candidates.iter().any(|(_, s)| *s > 0.99));
    }

    #[test]
    fn test_update_record_persists() {
        let dir = TempDir::new().unwrap();
        let id;
        {
            let store = RecordStore::open(dir.path(), StoreConfig::default()).unwrap();
            let record = record_with_embedding(&[1.0, 0.0]);
            id = record.id;
            store.insert_bundle(record, vec![], vec![]).unwrap();
            store
                .update_record(id, |r| {
                    r.status = crate::record::RecordStatus::Archived;
                    r.touch();
                })
                .unwrap()
                .unwrap();
        }
        let store = RecordStore::open(dir.path(), StoreConfig::default()).unwrap();
        assert_eq!(
            store.record(id).unwrap().status,
            crate::record::RecordStatus::Archived
        );
    }
}
