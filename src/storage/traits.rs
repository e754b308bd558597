//! Vector store trait definition.
//!
//! Defines the persistence port consumed by the indexer, the context
//! builder, and the semantic graph. Implementations own the `Chunk`,
//! `KnowledgeChunk`, and `FileMetadata` lifecycles across requests.

use crate::core::{Chunk, FileMetadata, KnowledgeChunk};
use crate::error::Result;
use serde::Serialize;

/// An equality filter applied to top-k retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Match the chunk's project-relative path exactly.
    Path(String),
    /// Match the chunk's language label exactly.
    Language(String),
    /// Match the chunk's type name exactly (e.g. "function").
    ChunkType(String),
}

/// One retrieval hit: the chunk and its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct Scored<T> {
    /// The retrieved row.
    pub item: T,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

/// Trait for vector store backends.
///
/// Implementations must be `Send + Sync`: the indexer and the context
/// builder may drive a shared store from worker threads. Upserts are
/// atomic per row; no cross-table transactions are offered. Readers may
/// observe in-progress batches of row inserts.
pub trait VectorStore: Send + Sync {
    /// Initializes the store (creates schema). Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    fn init(&mut self) -> Result<()>;

    /// Checks whether the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be performed.
    fn is_initialized(&self) -> Result<bool>;

    // ==================== Code context ====================

    /// Upserts chunks keyed by `chunk_id`.
    ///
    /// # Errors
    ///
    /// Returns an error on write failure or vector dimension mismatch.
    fn upsert_chunks(&mut self, chunks: &[Chunk]) -> Result<()>;

    /// Deletes all chunks stored for a project-relative path.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn delete_chunks_for_path(&mut self, path: &str) -> Result<()>;

    /// Returns all chunks stored for a path, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn chunks_for_path(&self, path: &str) -> Result<Vec<Chunk>>;

    /// Returns every stored chunk. Used by the semantic graph builder.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn all_chunks(&self) -> Result<Vec<Chunk>>;

    /// Top-k retrieval by cosine similarity with equality filters.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure or dimension mismatch.
    fn top_k(&self, vector: &[f32], k: usize, filters: &[Filter]) -> Result<Vec<Scored<Chunk>>>;

    // ==================== Knowledge base ====================

    /// Upserts knowledge chunks keyed by `chunk_id`.
    ///
    /// # Errors
    ///
    /// Returns an error on write failure or vector dimension mismatch.
    fn upsert_knowledge(&mut self, chunks: &[KnowledgeChunk]) -> Result<()>;

    /// Top-k retrieval over one knowledge space only.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure or dimension mismatch.
    fn top_k_knowledge(
        &self,
        vector: &[f32],
        k: usize,
        knowledge_space: &str,
    ) -> Result<Vec<Scored<KnowledgeChunk>>>;

    // ==================== File metadata ====================

    /// Upserts the metadata record for a path (exactly one per path).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn upsert_file_metadata(&mut self, metadata: &FileMetadata) -> Result<()>;

    /// Returns all stored file metadata records.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn all_file_metadata(&self) -> Result<Vec<FileMetadata>>;

    /// Deletes the metadata record for a path.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn delete_file_metadata(&mut self, path: &str) -> Result<()>;

    // ==================== Diagnostics ====================

    /// Gathers store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be collected.
    fn stats(&self) -> Result<StoreStats>;
}

/// Store statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// Rows in the code context table.
    pub chunk_count: usize,
    /// Rows in the knowledge base table.
    pub knowledge_count: usize,
    /// Rows in the file metadata table.
    pub file_count: usize,
    /// Vector dimension the store was opened with.
    pub dimensions: usize,
}
