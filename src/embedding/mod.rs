//! Embedding generation for retrieval.
//!
//! Defines the embedding port consumed by the indexer and the context
//! builder, plus a deterministic hash-projection implementation used when
//! no model-backed provider is wired in. A provider that is not loaded
//! fails with `EmbedUnavailable`; callers treat the affected chunk as
//! skipped, never as a hard error.

mod fallback;

pub use fallback::HashEmbedder;

use crate::error::Result;

/// Vector dimension used across the process.
///
/// This is the authoritative constant: the vector store validates every
/// row against it and queries must supply vectors of this length.
pub const DEFAULT_DIMENSIONS: usize = 256;

/// Trait for embedding providers.
///
/// Implementations must be thread-safe (`Send + Sync`): the indexer
/// embeds chunks from parallel file workers.
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimension.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::EmbedUnavailable` (wrapped) when the backing
    /// model is not loaded.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts.
    ///
    /// The default implementation embeds sequentially; implementations may
    /// override for batching.
    ///
    /// # Errors
    ///
    /// Returns an error if any single embedding fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Creates the default embedder for this process.
#[must_use]
pub fn create_embedder() -> Box<dyn Embedder> {
    Box::new(HashEmbedder::new(DEFAULT_DIMENSIONS))
}

/// Computes cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or zero-magnitude input; for unit
/// vectors this is the dot product.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
