//! Python chunking strategy.
//!
//! Splits Python sources into top-level function and class blocks. The
//! block scan follows indentation: a chunk starts at a top-level `def`,
//! `async def`, or `class` line (decorators attached) and runs to the next
//! top-level block. Sources with no top-level definitions fall through to
//! the whole-file fallback via the registry.

use crate::chunking::traits::{LanguageChunker, SourceFile};
use crate::core::{Chunk, ChunkKind};
use crate::error::Result;
use regex::Regex;
use std::sync::OnceLock;

#[allow(clippy::unwrap_used)]
fn def_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:async\s+)?def\s+(\w+)|^class\s+(\w+)").unwrap()
    })
}

/// Chunker for Python sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonChunker;

impl PythonChunker {
    /// Creates a new Python chunker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// One detected top-level block.
struct Boundary {
    /// Index of the first line of the block (decorators included).
    start: usize,
    /// Index of the def/class line itself.
    decl: usize,
    name: String,
    kind: ChunkKind,
}

impl LanguageChunker for PythonChunker {
    fn chunk(&self, source: &SourceFile) -> Result<Vec<Chunk>> {
        let lines: Vec<&str> = source.content.lines().collect();
        let mut boundaries: Vec<Boundary> = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let Some(caps) = def_pattern().captures(line) else {
                continue;
            };
            let (name, kind) = caps.get(1).map_or_else(
                || {
                    let class_name = caps.get(2).map_or("", |m| m.as_str());
                    (class_name.to_string(), ChunkKind::Class)
                },
                |m| (m.as_str().to_string(), ChunkKind::Function),
            );

            // Attach directly preceding decorator lines to the block.
            let mut start = i;
            while start > 0 && lines[start - 1].trim_start().starts_with('@') {
                start -= 1;
            }
            boundaries.push(Boundary {
                start,
                decl: i,
                name,
                kind,
            });
        }

        let mut chunks = Vec::with_capacity(boundaries.len());
        for (idx, boundary) in boundaries.iter().enumerate() {
            let block_end = boundaries
                .get(idx + 1)
                .map_or(lines.len(), |next| next.start);

            // Trim trailing blank lines off the block.
            let mut end = block_end;
            while end > boundary.decl + 1 && lines[end - 1].trim().is_empty() {
                end -= 1;
            }

            let content = lines[boundary.start..end].join("\n");
            if content.trim().is_empty() {
                continue;
            }
            chunks.push(Chunk::new(
                &source.path,
                &boundary.name,
                boundary.kind,
                &content,
                boundary.start + 1,
                end,
                self.language(),
            ));
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "python"
    }

    fn language(&self) -> &'static str {
        "python"
    }
}
