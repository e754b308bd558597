//! Java chunking strategy.
//!
//! Matches class/interface/enum declarations and method definitions with
//! brace-balance extents. Methods nested inside an already chunked type
//! are not emitted again.

use crate::chunking::balance::{brace_extent, line_span, line_start};
use crate::chunking::traits::{LanguageChunker, SourceFile};
use crate::core::{Chunk, ChunkKind};
use crate::error::Result;
use regex::Regex;
use std::sync::OnceLock;

#[allow(clippy::unwrap_used)]
fn type_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^(?:public\s+|protected\s+|private\s+)?(?:abstract\s+|final\s+)?(?:class|interface|enum)\s+(\w+)",
        )
        .unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn method_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*(?:public|protected|private)\s+(?:static\s+)?[\w<>\[\]]+\s+(\w+)\s*\([^)]*\)\s*\{",
        )
        .unwrap()
    })
}

/// Chunker for Java sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct JavaChunker;

impl JavaChunker {
    /// Creates a new Java chunker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LanguageChunker for JavaChunker {
    fn chunk(&self, source: &SourceFile) -> Result<Vec<Chunk>> {
        let content = &source.content;
        let mut chunks = Vec::new();
        let mut claimed: Vec<(usize, usize)> = Vec::new();

        for caps in type_pattern().captures_iter(content) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let start = line_start(content, whole.start());
            let Some(end) = brace_extent(content, whole.end()) else {
                continue;
            };
            claimed.push((start, end));

            let snippet = content[start..end].trim();
            let (start_line, end_line) = line_span(content, start, end);
            chunks.push(Chunk::new(
                &source.path,
                name.as_str(),
                ChunkKind::Class,
                snippet,
                start_line,
                end_line,
                self.language(),
            ));
        }

        for caps in method_pattern().captures_iter(content) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let start = line_start(content, whole.start());
            if claimed.iter().any(|&(s, e)| start >= s && start < e) {
                continue;
            }
            let Some(end) = brace_extent(content, whole.end().saturating_sub(1)) else {
                continue;
            };

            let snippet = content[start..end].trim();
            let (start_line, end_line) = line_span(content, start, end);
            chunks.push(Chunk::new(
                &source.path,
                name.as_str(),
                ChunkKind::Function,
                snippet,
                start_line,
                end_line,
                self.language(),
            ));
        }

        chunks.sort_by_key(|c| c.start_line);
        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "java"
    }

    fn language(&self) -> &'static str {
        "java"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
package app;

public class Greeter {
    private String name;

    public String greet(String title) {
        return \"Hello, \" + title;
    }
}

interface Runner {
    void run();
}
";

    #[test]
    fn test_chunks_types() {
        let chunker = JavaChunker::new();
        let chunks = chunker
            .chunk(&SourceFile::new("Greeter.java", SAMPLE))
            .unwrap();
        let names: Vec<&str> = chunks.iter().map(|c| c.chunk_name.as_str()).collect();
        assert_eq!(names, vec!["Greeter", "Runner"]);
        assert!(chunks.iter().all(|c| c.chunk_type == ChunkKind::Class));
    }

    #[test]
    fn test_method_inside_class_not_duplicated() {
        let chunker = JavaChunker::new();
        let chunks = chunker
            .chunk(&SourceFile::new("Greeter.java", SAMPLE))
            .unwrap();
        assert!(!chunks.iter().any(|c| c.chunk_name == "greet"));
        assert!(chunks[0].content.contains("public String greet"));
    }

    #[test]
    fn test_empty_source_yields_nothing() {
        let chunker = JavaChunker::new();
        let chunks = chunker
            .chunk(&SourceFile::new("Empty.java", "// nothing here\n"))
            .unwrap();
        assert!(chunks.is_empty());
    }
}
