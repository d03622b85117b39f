//! Mnemograph Engine
//!
//! Retrieval and relationship engine for a structured agent memory store:
//! unit-normalized embeddings with cosine ranking, compiled predicate
//! filtering over open attribute maps and temporal fields, overlap-aware
//! chunking of oversized content, and bounded traversal of the typed
//! relationship graph.
//!
//! ## Features
//!
//! - **Similarity search** - HNSW candidates with exact rescoring and a
//!   full-scan fallback, deterministic ordering
//! - **Declarative filters** - `_gt` / `_contains` style operator maps
//!   compiled once, evaluated against records, chunks, and entities
//! - **Transparent chunking** - token-budgeted splitting with overlap and
//!   `follows_up` relinking, atomic with the record write
//! - **RocksDB persistence** - batched writes, cascade deletes, cache layer
//!
//! ## Example
//!
//! ```ignore
//! use mnemograph_engine::{MemoryEngine, StoreConfig, TypeSchema, WriteRequest};
//!
//! let engine = MemoryEngine::open(&db_path, StoreConfig::default())?;
//! engine.register_schema(TypeSchema::new("knowledge", 512, 64)?)?;
//!
//! // Embeddings come from the caller; the engine normalizes and ranks.
//! let remembered = engine.remember(
//!     WriteRequest::new("knowledge", "The staging cluster uses pgvector")
//!         .embedding(embedding),
//! )?;
//! ```

pub mod chunker;
pub mod engine;
pub mod entity;
pub mod error;
pub mod filter;
pub mod graph;
pub mod record;
pub mod schema;
pub mod search;
pub mod store;
pub mod vector;

// Re-exports for convenience
pub use chunker::{ChunkSplitter, Tokenizer, WhitespaceTokenizer};
pub use engine::{MemoryEngine, RecallRequest, Remembered, WriteRequest};
pub use entity::{Entity, EntityId, EntityLink};
pub use error::{EngineError, Result};
pub use filter::{FieldSource, Filter};
pub use graph::{EdgeId, MemoryEdge, TraversedEdge, FOLLOWS_UP, VERSION_OF};
pub use record::{Chunk, ChunkId, MemoryId, MemoryRecord, MemoryRecordBuilder, RecordStatus};
pub use schema::TypeSchema;
pub use search::{SearchHit, SearchPayload, SearchRequest, SimilarityIndex};
pub use store::{RecordStore, RefKind, StoreConfig};
pub use vector::{inspect, normalize, VectorDiagnostics};
