//! TypeScript chunking strategy.
//!
//! Accumulates lines into chunks that open at top-level declarations
//! (class, interface, enum, function, type, const/let/var) and close when
//! the brace balance returns to zero at the next declaration, mirroring
//! how the declarations read in source.

use crate::chunking::balance::line_span;
use crate::chunking::traits::{LanguageChunker, SourceFile};
use crate::core::{Chunk, ChunkKind};
use crate::error::Result;
use regex::Regex;
use std::sync::OnceLock;

#[allow(clippy::unwrap_used)]
fn decl_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:export\s+)?(class|interface|enum|function|type)\s+(\w+)").unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn var_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:export\s+)?(?:const|let|var)\s+(\w+)").unwrap()
    })
}

/// Chunker for TypeScript sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeScriptChunker;

impl TypeScriptChunker {
    /// Creates a new TypeScript chunker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Classifies a declaration keyword into a chunk kind.
    fn kind_for(keyword: &str) -> ChunkKind {
        match keyword {
            "class" | "interface" | "enum" => ChunkKind::Class,
            "function" => ChunkKind::Function,
            _ => ChunkKind::Block,
        }
    }
}

impl LanguageChunker for TypeScriptChunker {
    fn chunk(&self, source: &SourceFile) -> Result<Vec<Chunk>> {
        let content = &source.content;
        let mut chunks: Vec<Chunk> = Vec::new();

        let mut current: Vec<&str> = Vec::new();
        let mut current_name = String::new();
        let mut current_kind = ChunkKind::Block;
        let mut current_start = 0usize;
        let mut open_braces: i64 = 0;
        let mut pos = 0usize;

        let mut flush = |current: &mut Vec<&str>,
                         name: &str,
                         kind: ChunkKind,
                         start: usize,
                         pos: usize| {
            if current.is_empty() {
                return;
            }
            let snippet: String = current.concat();
            if !snippet.trim().is_empty() {
                let (start_line, end_line) = line_span(content, start, pos);
                chunks.push(Chunk::new(
                    &source.path,
                    name,
                    kind,
                    snippet.trim_end_matches('\n'),
                    start_line,
                    end_line,
                    "typescript",
                ));
            }
            current.clear();
        };

        for line in content.split_inclusive('\n') {
            // New top-level declarations only open when braces are balanced.
            if open_braces == 0 {
                let matched = decl_pattern().captures(line).map_or_else(
                    || {
                        var_pattern()
                            .captures(line)
                            .map(|caps| (caps[1].to_string(), ChunkKind::Block))
                    },
                    |caps| Some((caps[2].to_string(), Self::kind_for(&caps[1]))),
                );
                if let Some((name, kind)) = matched {
                    flush(&mut current, &current_name, current_kind, current_start, pos);
                    current_name = name;
                    current_kind = kind;
                    current_start = pos;
                }
            }

            open_braces += i64::try_from(line.matches('{').count()).unwrap_or(0);
            open_braces -= i64::try_from(line.matches('}').count()).unwrap_or(0);
            current.push(line);
            pos += line.len();
        }
        flush(&mut current, &current_name, current_kind, current_start, pos);

        // Leading content before the first declaration is only worth a
        // chunk when there is no declaration at all; label it ts_file.
        if chunks.len() == 1 && chunks[0].chunk_name.is_empty() {
            let whole = &chunks[0];
            let replacement = Chunk::new(
                &source.path,
                "ts_content",
                ChunkKind::TsFile,
                &whole.content,
                whole.start_line,
                whole.end_line,
                "typescript",
            );
            return Ok(vec![replacement]);
        }

        Ok(chunks
            .into_iter()
            .filter(|chunk| !chunk.chunk_name.is_empty())
            .collect())
    }

    fn name(&self) -> &'static str {
        "typescript"
    }

    fn language(&self) -> &'static str {
        "typescript"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
import { x } from './x';

export interface Props {
    title: string;
}

export function render(props: Props): string {
    if (props.title) {
        return props.title;
    }
    return '';
}

const DEFAULT_TITLE = 'untitled';
";

    #[test]
    fn test_chunks_top_level_declarations() {
        let chunker = TypeScriptChunker::new();
        let source = SourceFile::new("view.ts", SAMPLE);
        let chunks = chunker.chunk(&source).unwrap();

        let names: Vec<&str> = chunks.iter().map(|c| c.chunk_name.as_str()).collect();
        assert_eq!(names, vec!["Props", "render", "DEFAULT_TITLE"]);
        assert_eq!(chunks[0].chunk_type, ChunkKind::Class);
        assert_eq!(chunks[1].chunk_type, ChunkKind::Function);
        assert_eq!(chunks[2].chunk_type, ChunkKind::Block);
    }

    #[test]
    fn test_nested_braces_stay_in_one_chunk() {
        let chunker = TypeScriptChunker::new();
        let source = SourceFile::new("view.ts", SAMPLE);
        let chunks = chunker.chunk(&source).unwrap();
        assert!(chunks[1].content.contains("if (props.title)"));
        assert!(chunks[1].content.contains("return '';"));
    }

    #[test]
    fn test_declaration_free_source_labelled_ts_file() {
        let chunker = TypeScriptChunker::new();
        let source = SourceFile::new("side.ts", "console.log('hello');\n");
        let chunks = chunker.chunk(&source).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkKind::TsFile);
        assert_eq!(chunks[0].chunk_name, "ts_content");
    }

    #[test]
    fn test_spans_within_file() {
        let chunker = TypeScriptChunker::new();
        let source = SourceFile::new("view.ts", SAMPLE);
        let line_count = source.line_count();
        for chunk in chunker.chunk(&source).unwrap() {
            assert!(chunk.start_line >= 1);
            assert!(chunk.end_line <= line_count);
        }
    }

    #[test]
    fn test_type_alias_chunked_as_class_kind() {
        let chunker = TypeScriptChunker::new();
        let source = SourceFile::new("t.ts", "export type Id = string;\n");
        let chunks = chunker.chunk(&source).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_name, "Id");
    }
}
