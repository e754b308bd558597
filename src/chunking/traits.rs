//! Chunker trait definition.
//!
//! Defines the interface for all language-aware chunking strategies,
//! enabling pluggable source segmentation.

use crate::core::Chunk;
use crate::error::Result;

/// A source file handed to a chunking strategy.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Project-relative path.
    pub path: String,
    /// Full file content.
    pub content: String,
}

impl SourceFile {
    /// Creates a source file record.
    #[must_use]
    pub fn new(path: &str, content: &str) -> Self {
        Self {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    /// Returns the lower-cased extension, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.path)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Number of lines in the content.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }
}

/// Trait for segmenting a source file into semantically labelled chunks.
///
/// Implementations must be `Send + Sync` so the indexer can fan files out
/// across a worker pool. Output must be deterministic for the same input.
/// Strategies may return an empty vector; the registry wraps every
/// dispatch and substitutes the whole-file fallback chunk, so callers
/// always observe at least one chunk per file.
pub trait LanguageChunker: Send + Sync {
    /// Segments the file into chunks.
    ///
    /// Spans are 1-based inclusive line numbers within the file.
    ///
    /// # Errors
    ///
    /// Returns an error only for internal failures (e.g. a bad pattern);
    /// extraction yielding nothing is not an error.
    fn chunk(&self, source: &SourceFile) -> Result<Vec<Chunk>>;

    /// Returns the name of the strategy.
    fn name(&self) -> &'static str;

    /// Returns the language label attached to produced chunks.
    fn language(&self) -> &'static str;
}
