//! Fixed-size chunking strategy.
//!
//! Used for oversized sources where structural chunking is not worth the
//! scan: the file is cut into fixed line blocks regardless of language.

use crate::chunking::traits::{LanguageChunker, SourceFile};
use crate::core::{Chunk, ChunkKind};
use crate::error::Result;

/// Default block height in lines.
pub const DEFAULT_BLOCK_LINES: usize = 200;

/// Chunker that cuts sources into fixed line blocks.
#[derive(Debug, Clone, Copy)]
pub struct FixedChunker {
    block_lines: usize,
}

impl Default for FixedChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedChunker {
    /// Creates a fixed chunker with the default block height.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            block_lines: DEFAULT_BLOCK_LINES,
        }
    }

    /// Creates a fixed chunker with a custom block height (min 1).
    #[must_use]
    pub const fn with_block_lines(block_lines: usize) -> Self {
        Self {
            block_lines: if block_lines == 0 { 1 } else { block_lines },
        }
    }
}

impl LanguageChunker for FixedChunker {
    fn chunk(&self, source: &SourceFile) -> Result<Vec<Chunk>> {
        let lines: Vec<&str> = source.content.lines().collect();
        let mut chunks = Vec::with_capacity(lines.len().div_ceil(self.block_lines));

        for (index, block) in lines.chunks(self.block_lines).enumerate() {
            let start_line = index * self.block_lines + 1;
            let end_line = start_line + block.len() - 1;
            chunks.push(Chunk::new(
                &source.path,
                &format!("block_{}", index + 1),
                ChunkKind::Block,
                &block.join("\n"),
                start_line,
                end_line,
                self.language(),
            ));
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }

    fn language(&self) -> &'static str {
        "text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_cover_file_without_overlap() {
        let content: String = (1..=450).map(|i| format!("line {i}\n")).collect();
        let chunker = FixedChunker::new();
        let chunks = chunker.chunk(&SourceFile::new("big.log", &content)).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 200);
        assert_eq!(chunks[1].start_line, 201);
        assert_eq!(chunks[2].end_line, 450);
    }

    #[test]
    fn test_custom_block_height() {
        let chunker = FixedChunker::with_block_lines(2);
        let chunks = chunker
            .chunk(&SourceFile::new("s.txt", "a\nb\nc\n"))
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content, "c");
        assert_eq!(chunks[1].start_line, 3);
    }

    #[test]
    fn test_zero_block_height_clamped() {
        let chunker = FixedChunker::with_block_lines(0);
        let chunks = chunker.chunk(&SourceFile::new("s.txt", "a\nb\n")).unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_empty_source_yields_nothing() {
        let chunker = FixedChunker::new();
        let chunks = chunker.chunk(&SourceFile::new("s.txt", "")).unwrap();
        assert!(chunks.is_empty());
    }
}
