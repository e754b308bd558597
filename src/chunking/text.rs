//! Markdown, shell, and generic text chunking strategies.
//!
//! Markdown splits on headings into non-overlapping sections. Shell
//! scripts split on comment-delimited blocks. Generic text splits on
//! blank-line paragraphs.

use crate::chunking::traits::{LanguageChunker, SourceFile};
use crate::core::{Chunk, ChunkKind};
use crate::error::Result;
use regex::Regex;
use std::sync::OnceLock;

#[allow(clippy::unwrap_used)]
fn heading_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^#{1,6} ").unwrap()
    })
}

/// Chunker for Markdown documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownChunker;

impl MarkdownChunker {
    /// Creates a new Markdown chunker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LanguageChunker for MarkdownChunker {
    fn chunk(&self, source: &SourceFile) -> Result<Vec<Chunk>> {
        let lines: Vec<&str> = source.content.lines().collect();
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut heading = "Introduction".to_string();
        let mut start_line = 0usize;

        let mut flush = |current: &mut Vec<&str>, heading: &str, start: usize, end: usize| {
            if current.is_empty() {
                return;
            }
            let body = current.join("\n");
            if body.trim().is_empty() {
                current.clear();
                return;
            }
            chunks.push(Chunk::new(
                &source.path,
                heading,
                ChunkKind::MarkdownSection,
                &body,
                start + 1,
                end,
                "markdown",
            ));
            current.clear();
        };

        for (i, line) in lines.iter().enumerate() {
            if heading_pattern().is_match(line) {
                flush(&mut current, &heading, start_line, i);
                current.push(line);
                heading = line.trim_start_matches('#').trim().to_string();
                start_line = i;
            } else {
                current.push(line);
            }
        }
        flush(&mut current, &heading, start_line, lines.len());

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "markdown"
    }

    fn language(&self) -> &'static str {
        "markdown"
    }
}

/// Chunker for shell scripts: blocks are delimited by comment lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellChunker;

impl ShellChunker {
    /// Creates a new shell chunker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LanguageChunker for ShellChunker {
    fn chunk(&self, source: &SourceFile) -> Result<Vec<Chunk>> {
        let lines: Vec<&str> = source.content.lines().collect();
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut block_name = String::new();
        let mut block_index = 0usize;
        let mut start_line = 0usize;

        let mut flush =
            |current: &mut Vec<&str>, name: &str, index: &mut usize, start: usize, end: usize| {
                let body = current.join("\n");
                current.clear();
                if body.trim().is_empty() {
                    return;
                }
                *index += 1;
                let label = if name.is_empty() {
                    format!("block_{index}")
                } else {
                    name.to_string()
                };
                chunks.push(Chunk::new(
                    &source.path,
                    &label,
                    ChunkKind::Block,
                    &body,
                    start + 1,
                    end,
                    "shell",
                ));
            };

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim_start();
            // A comment line (not the shebang) starts a new block.
            if trimmed.starts_with('#') && !trimmed.starts_with("#!") && !current.is_empty() {
                flush(&mut current, &block_name, &mut block_index, start_line, i);
                block_name = trimmed.trim_start_matches('#').trim().to_string();
                start_line = i;
            }
            current.push(line);
        }
        flush(
            &mut current,
            &block_name,
            &mut block_index,
            start_line,
            lines.len(),
        );

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "shell"
    }

    fn language(&self) -> &'static str {
        "shell"
    }
}

/// Chunker for generic text: paragraphs split on blank lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericTextChunker;

impl GenericTextChunker {
    /// Creates a new generic text chunker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LanguageChunker for GenericTextChunker {
    fn chunk(&self, source: &SourceFile) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        let mut paragraph: Vec<&str> = Vec::new();
        let mut index = 0usize;
        let mut start_line = 0usize;

        let lines: Vec<&str> = source.content.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                if !paragraph.is_empty() {
                    index += 1;
                    chunks.push(Chunk::new(
                        &source.path,
                        &format!("paragraph_{index}"),
                        ChunkKind::Paragraph,
                        &paragraph.join("\n"),
                        start_line + 1,
                        i,
                        "text",
                    ));
                    paragraph.clear();
                }
                start_line = i + 1;
            } else {
                if paragraph.is_empty() {
                    start_line = i;
                }
                paragraph.push(line);
            }
        }
        if !paragraph.is_empty() {
            index += 1;
            chunks.push(Chunk::new(
                &source.path,
                &format!("paragraph_{index}"),
                ChunkKind::Paragraph,
                &paragraph.join("\n"),
                start_line + 1,
                lines.len(),
                "text",
            ));
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "generic"
    }

    fn language(&self) -> &'static str {
        "text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKDOWN: &str = "\
Intro text before any heading.

# Setup

Install the thing.

## Usage

Run the thing.
";

    #[test]
    fn test_markdown_sections_by_heading() {
        let chunker = MarkdownChunker::new();
        let chunks = chunker
            .chunk(&SourceFile::new("README.md", MARKDOWN))
            .unwrap();
        let names: Vec<&str> = chunks.iter().map(|c| c.chunk_name.as_str()).collect();
        assert_eq!(names, vec!["Introduction", "Setup", "Usage"]);
        assert!(chunks.iter().all(|c| c.chunk_type == ChunkKind::MarkdownSection));
    }

    #[test]
    fn test_markdown_sections_do_not_overlap() {
        let chunker = MarkdownChunker::new();
        let chunks = chunker
            .chunk(&SourceFile::new("README.md", MARKDOWN))
            .unwrap();
        for pair in chunks.windows(2) {
            assert!(pair[0].end_line < pair[1].start_line);
        }
    }

    const SHELL: &str = "\
#!/bin/sh
set -e

# build step
make build

# deploy step
scp out remote:
";

    #[test]
    fn test_shell_blocks_by_comment() {
        let chunker = ShellChunker::new();
        let chunks = chunker.chunk(&SourceFile::new("deploy.sh", SHELL)).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chunk_name, "block_1");
        assert_eq!(chunks[1].chunk_name, "build step");
        assert_eq!(chunks[2].chunk_name, "deploy step");
        assert!(chunks[0].content.contains("#!/bin/sh"));
    }

    #[test]
    fn test_generic_paragraphs() {
        let chunker = GenericTextChunker::new();
        let chunks = chunker
            .chunk(&SourceFile::new(
                "notes.txt",
                "first paragraph\nstill first\n\nsecond paragraph\n",
            ))
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "first paragraph\nstill first");
        assert_eq!(chunks[1].content, "second paragraph");
        assert_eq!(chunks[1].start_line, 4);
    }

    #[test]
    fn test_generic_empty_source_yields_nothing() {
        let chunker = GenericTextChunker::new();
        let chunks = chunker.chunk(&SourceFile::new("empty.txt", "")).unwrap();
        assert!(chunks.is_empty());
    }
}
