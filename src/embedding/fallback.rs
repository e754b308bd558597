//! Hash-projection embedder.
//!
//! Produces deterministic pseudo-embeddings from lexical features when no
//! model-backed provider is wired in. Similarity reflects word and
//! character-trigram overlap, not semantics.

use crate::embedding::Embedder;
use crate::error::Result;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Deterministic hash-projection embedder.
///
/// Each word and character trigram of the normalized text is hashed into
/// one vector slot with a hash-derived sign and weight; the result is
/// normalized to unit length so cosine similarity is the dot product.
///
/// # Examples
///
/// ```
/// use codefactory_rs::embedding::{Embedder, HashEmbedder, DEFAULT_DIMENSIONS};
///
/// let embedder = HashEmbedder::new(DEFAULT_DIMENSIONS);
/// let a = embedder.embed("def greet(name)").unwrap();
/// let b = embedder.embed("def greet(name)").unwrap();
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Word feature weight relative to trigram features.
    const WORD_WEIGHT: f32 = 1.0;
    const TRIGRAM_WEIGHT: f32 = 0.5;

    /// Creates an embedder with the given vector dimension.
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn feature_hash(feature: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        hasher.finish()
    }

    /// Folds one lexical feature into the vector.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn accumulate(vector: &mut [f32], feature: &str, weight: f32) {
        let hash = Self::feature_hash(feature);
        let slot = (hash as usize) % vector.len();
        let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
        let scale = 1.0 + ((hash >> 16) & 0xFF) as f32 / 255.0;
        vector[slot] += sign * scale * weight;
    }

    fn project(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }

        let normalized: String = text
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c.is_whitespace() {
                    c.to_ascii_lowercase()
                } else {
                    ' '
                }
            })
            .collect();

        for word in normalized.split_whitespace() {
            Self::accumulate(&mut vector, word, Self::WORD_WEIGHT);
        }

        let chars: Vec<char> = normalized.chars().collect();
        for window in chars.windows(3) {
            let trigram: String = window.iter().collect();
            Self::accumulate(&mut vector, &trigram, Self::TRIGRAM_WEIGHT);
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }
        vector
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.project(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        use rayon::prelude::*;
        Ok(texts.par_iter().map(|text| self.project(text)).collect())
    }
}
