//! Go chunking strategy.
//!
//! Matches functions, methods, and `type ... struct|interface`
//! declarations, measuring each block with the shared brace-balance
//! extent.

use crate::chunking::balance::{brace_extent, line_span, line_start};
use crate::chunking::traits::{LanguageChunker, SourceFile};
use crate::core::{Chunk, ChunkKind};
use crate::error::Result;
use regex::Regex;
use std::sync::OnceLock;

#[allow(clippy::unwrap_used)]
fn go_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^func\s*(?:\([^)]*\))?\s*(?P<name>\w+)\s*\(|^type\s+(?P<type_name>\w+)\s+(?P<kind>struct|interface)",
        )
        .unwrap()
    })
}

/// Chunker for Go sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoChunker;

impl GoChunker {
    /// Creates a new Go chunker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LanguageChunker for GoChunker {
    fn chunk(&self, source: &SourceFile) -> Result<Vec<Chunk>> {
        let content = &source.content;
        let mut chunks = Vec::new();

        for caps in go_pattern().captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let start = line_start(content, whole.start());

            let (name, kind) = caps.name("name").map_or_else(
                || {
                    let type_name = caps.name("type_name").map_or("", |m| m.as_str());
                    (type_name, ChunkKind::Class)
                },
                |m| (m.as_str(), ChunkKind::Function),
            );

            let end = match brace_extent(content, whole.end()) {
                Some(end) => end,
                // Braceless type alias: the declaration is its own line.
                None => content[whole.end()..]
                    .find('\n')
                    .map_or(content.len(), |pos| whole.end() + pos),
            };

            let snippet = content[start..end].trim();
            if snippet.is_empty() {
                continue;
            }
            let (start_line, end_line) = line_span(content, start, end);
            chunks.push(Chunk::new(
                &source.path,
                name,
                kind,
                snippet,
                start_line,
                end_line,
                self.language(),
            ));
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "go"
    }

    fn language(&self) -> &'static str {
        "go"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
package main

import \"fmt\"

type Server struct {
    Addr string
}

type Handler interface {
    Serve() error
}

func (s *Server) Run() error {
    if s.Addr == \"\" {
        return fmt.Errorf(\"no addr\")
    }
    return nil
}

func main() {
    _ = Server{}
}
";

    #[test]
    fn test_chunks_types_and_funcs() {
        let chunker = GoChunker::new();
        let chunks = chunker.chunk(&SourceFile::new("main.go", SAMPLE)).unwrap();
        let names: Vec<&str> = chunks.iter().map(|c| c.chunk_name.as_str()).collect();
        assert_eq!(names, vec!["Server", "Handler", "Run", "main"]);
    }

    #[test]
    fn test_method_receiver_chunked_as_function() {
        let chunker = GoChunker::new();
        let chunks = chunker.chunk(&SourceFile::new("main.go", SAMPLE)).unwrap();
        let run = chunks.iter().find(|c| c.chunk_name == "Run").unwrap();
        assert_eq!(run.chunk_type, ChunkKind::Function);
        assert!(run.content.contains("fmt.Errorf"));
        assert!(run.content.ends_with('}'));
    }

    #[test]
    fn test_struct_chunked_as_class() {
        let chunker = GoChunker::new();
        let chunks = chunker.chunk(&SourceFile::new("main.go", SAMPLE)).unwrap();
        let server = chunks.iter().find(|c| c.chunk_name == "Server").unwrap();
        assert_eq!(server.chunk_type, ChunkKind::Class);
        assert!(server.content.contains("Addr string"));
    }

    #[test]
    fn test_no_declarations_yields_nothing() {
        let chunker = GoChunker::new();
        let chunks = chunker
            .chunk(&SourceFile::new("doc.go", "package docs\n"))
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_spans_within_file() {
        let chunker = GoChunker::new();
        let source = SourceFile::new("main.go", SAMPLE);
        let line_count = source.line_count();
        for chunk in chunker.chunk(&source).unwrap() {
            assert!(chunk.start_line >= 1 && chunk.end_line <= line_count);
        }
    }
}
