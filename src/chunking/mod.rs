//! Language-aware source chunking.
//!
//! The registry maps a file extension to a chunking strategy and
//! guarantees that every dispatch returns at least one chunk: when a
//! strategy extracts nothing, the whole file is returned as a single
//! fallback chunk. Oversized files are cut into fixed line blocks
//! regardless of language.

pub mod balance;
mod fixed;
mod go;
mod java;
mod javascript;
mod markup;
mod python;
mod text;
pub mod traits;
mod typescript;

pub use fixed::{DEFAULT_BLOCK_LINES, FixedChunker};
pub use go::GoChunker;
pub use java::JavaChunker;
pub use javascript::{JavaScriptChunker, JsxChunker, looks_like_jsx};
pub use markup::{CssChunker, HtmlChunker};
pub use python::PythonChunker;
pub use text::{GenericTextChunker, MarkdownChunker, ShellChunker};
pub use traits::{LanguageChunker, SourceFile};
pub use typescript::TypeScriptChunker;

use crate::core::Chunk;
use crate::error::Result;

/// Line count above which files are chunked with fixed blocks.
pub const LARGE_FILE_LINES: usize = 5000;

/// Registry that dispatches files to language-appropriate chunkers.
///
/// # Examples
///
/// ```
/// use codefactory_rs::chunking::{ChunkerRegistry, SourceFile};
///
/// let registry = ChunkerRegistry::new();
/// let chunks = registry
///     .chunk_source(&SourceFile::new("m.py", "def f():\n    pass\n"))
///     .unwrap();
/// assert!(!chunks.is_empty());
/// ```
pub struct ChunkerRegistry {
    large_file_lines: usize,
}

impl Default for ChunkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkerRegistry {
    /// Creates a registry with the default large-file threshold.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            large_file_lines: LARGE_FILE_LINES,
        }
    }

    /// Overrides the large-file threshold (useful in tests).
    #[must_use]
    pub const fn with_large_file_lines(mut self, lines: usize) -> Self {
        self.large_file_lines = lines;
        self
    }

    /// Returns the strategy for a file extension.
    #[must_use]
    pub fn chunker_for_extension(&self, ext: &str) -> Box<dyn LanguageChunker> {
        match ext {
            "py" => Box::new(PythonChunker::new()),
            "ts" | "tsx" => Box::new(TypeScriptChunker::new()),
            "js" => Box::new(JavaScriptChunker::new()),
            "jsx" => Box::new(JsxChunker::new()),
            "go" => Box::new(GoChunker::new()),
            "java" => Box::new(JavaChunker::new()),
            "html" | "htm" => Box::new(HtmlChunker::new()),
            "css" | "scss" | "sass" | "less" => Box::new(CssChunker::new()),
            "md" | "markdown" => Box::new(MarkdownChunker::new()),
            "sh" | "bash" => Box::new(ShellChunker::new()),
            _ => Box::new(GenericTextChunker::new()),
        }
    }

    /// Chunks a source file, guaranteeing at least one chunk.
    ///
    /// Oversized files bypass language strategies and use fixed blocks.
    /// A strategy error or an empty extraction degrades to the whole-file
    /// fallback chunk.
    pub fn chunk_source(&self, source: &SourceFile) -> Result<Vec<Chunk>> {
        if source.line_count() > self.large_file_lines {
            let chunks = FixedChunker::new().chunk(source)?;
            if !chunks.is_empty() {
                return Ok(chunks);
            }
        }

        let ext = source.extension().unwrap_or_default();
        let chunker = self.chunker_for_extension(&ext);
        let language = chunker.language();

        let chunks = match chunker.chunk(source) {
            Ok(chunks) => chunks,
            Err(err) => {
                tracing::warn!(path = %source.path, %err, "chunking failed, using fallback");
                Vec::new()
            }
        };

        if chunks.is_empty() {
            return Ok(vec![Chunk::fallback(&source.path, &source.content, language)]);
        }
        Ok(chunks)
    }
}

/// Names of the registered strategies, for diagnostics.
#[must_use]
pub fn available_strategies() -> Vec<&'static str> {
    vec![
        "python",
        "typescript",
        "javascript",
        "jsx",
        "go",
        "java",
        "html",
        "css",
        "markdown",
        "shell",
        "generic",
        "fixed",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChunkKind;
    use test_case::test_case;

    #[test_case("m.py", "python"; "python extension")]
    #[test_case("m.ts", "typescript"; "typescript extension")]
    #[test_case("m.jsx", "jsx"; "jsx extension")]
    #[test_case("m.go", "go"; "go extension")]
    #[test_case("m.java", "java"; "java extension")]
    #[test_case("m.css", "css"; "css extension")]
    #[test_case("m.md", "markdown"; "markdown extension")]
    #[test_case("m.sh", "shell"; "shell extension")]
    #[test_case("m.unknown", "generic"; "unknown extension")]
    fn test_dispatch_by_extension(path: &str, expected: &str) {
        let registry = ChunkerRegistry::new();
        let source = SourceFile::new(path, "");
        let ext = source.extension().unwrap_or_default();
        assert_eq!(registry.chunker_for_extension(&ext).name(), expected);
    }

    #[test]
    fn test_every_file_yields_at_least_one_chunk() {
        let registry = ChunkerRegistry::new();
        for (path, content) in [
            ("empty.py", ""),
            ("conf.py", "X = 1\n"),
            ("data.bin.txt", "\n\n\n"),
            ("style.css", "/* nothing */"),
        ] {
            let chunks = registry
                .chunk_source(&SourceFile::new(path, content))
                .unwrap();
            assert!(!chunks.is_empty(), "no chunks for {path}");
        }
    }

    #[test]
    fn test_empty_extraction_becomes_fallback() {
        let registry = ChunkerRegistry::new();
        let chunks = registry
            .chunk_source(&SourceFile::new("conf.py", "DEBUG = True\n"))
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkKind::Fallback);
        assert_eq!(chunks[0].language, "python");
    }

    #[test]
    fn test_large_file_uses_fixed_blocks() {
        let registry = ChunkerRegistry::new().with_large_file_lines(10);
        let content: String = (0..50).map(|i| format!("def f{i}(): pass\n")).collect();
        let chunks = registry
            .chunk_source(&SourceFile::new("big.py", &content))
            .unwrap();
        assert!(chunks.iter().all(|c| c.chunk_type == ChunkKind::Block));
    }

    #[test]
    fn test_chunk_hashes_match_content() {
        let registry = ChunkerRegistry::new();
        let chunks = registry
            .chunk_source(&SourceFile::new("m.py", "def f():\n    return 1\n"))
            .unwrap();
        for chunk in chunks {
            assert_eq!(chunk.content_hash, crate::core::sha256_hex(&chunk.content));
        }
    }

    #[test]
    fn test_spans_strictly_within_file() {
        let registry = ChunkerRegistry::new();
        let content = "# Title\n\nBody text.\n\n## Sub\n\nMore.\n";
        let source = SourceFile::new("doc.md", content);
        let line_count = source.line_count();
        for chunk in registry.chunk_source(&source).unwrap() {
            assert!(chunk.start_line >= 1);
            assert!(chunk.end_line <= line_count);
        }
    }

    #[test]
    fn test_available_strategies_listed() {
        let names = available_strategies();
        assert!(names.contains(&"python"));
        assert!(names.contains(&"fixed"));
    }
}
