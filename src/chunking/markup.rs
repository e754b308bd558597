//! HTML and CSS chunking strategies.
//!
//! HTML sources yield one chunk per `<script>` block plus one chunk for
//! the remaining markup. CSS sources yield one chunk per selector block,
//! delimited by brace balance.

use crate::chunking::balance::{brace_extent, line_span};
use crate::chunking::traits::{LanguageChunker, SourceFile};
use crate::core::{Chunk, ChunkKind};
use crate::error::Result;
use regex::Regex;
use std::sync::OnceLock;

#[allow(clippy::unwrap_used)]
fn script_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script[^>]*>(.*?)</script>").unwrap()
    })
}

/// Chunker for HTML sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlChunker;

impl HtmlChunker {
    /// Creates a new HTML chunker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LanguageChunker for HtmlChunker {
    fn chunk(&self, source: &SourceFile) -> Result<Vec<Chunk>> {
        let content = &source.content;
        let mut chunks = Vec::new();
        let mut remainder = String::with_capacity(content.len());
        let mut cursor = 0usize;
        let mut script_index = 0usize;

        for caps in script_pattern().captures_iter(content) {
            let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            remainder.push_str(&content[cursor..whole.start()]);
            cursor = whole.end();

            let script = body.as_str().trim();
            if !script.is_empty() {
                script_index += 1;
                let (start_line, end_line) = line_span(content, body.start(), body.end());
                chunks.push(Chunk::new(
                    &source.path,
                    &format!("script_{script_index}"),
                    ChunkKind::Script,
                    script,
                    start_line,
                    end_line,
                    "html",
                ));
            }
        }
        remainder.push_str(&content[cursor..]);

        let markup = remainder.trim();
        if !markup.is_empty() {
            let line_count = source.line_count().max(1);
            chunks.push(Chunk::new(
                &source.path,
                "markup",
                ChunkKind::Block,
                markup,
                1,
                line_count,
                "html",
            ));
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "html"
    }

    fn language(&self) -> &'static str {
        "html"
    }
}

/// Chunker for CSS sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssChunker;

impl CssChunker {
    /// Creates a new CSS chunker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LanguageChunker for CssChunker {
    fn chunk(&self, source: &SourceFile) -> Result<Vec<Chunk>> {
        let content = &source.content;
        let mut chunks = Vec::new();
        let mut cursor = 0usize;

        while cursor < content.len() {
            let Some(open_rel) = content[cursor..].find('{') else {
                break;
            };
            let open = cursor + open_rel;
            let selector = content[cursor..open].trim();
            let Some(end) = brace_extent(content, open) else {
                break;
            };

            let block = content[cursor..end].trim();
            if !block.is_empty() {
                let (start_line, end_line) = line_span(content, cursor, end);
                chunks.push(Chunk::new(
                    &source.path,
                    selector,
                    ChunkKind::Selector,
                    block,
                    start_line,
                    end_line,
                    "css",
                ));
            }
            cursor = end;
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "css"
    }

    fn language(&self) -> &'static str {
        "css"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = "\
<html>
<head>
<script>
function boot() { console.log('hi'); }
</script>
</head>
<body>
<p>hello</p>
</body>
</html>
";

    #[test]
    fn test_html_separates_script_and_markup() {
        let chunker = HtmlChunker::new();
        let chunks = chunker.chunk(&SourceFile::new("index.html", HTML)).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_type, ChunkKind::Script);
        assert!(chunks[0].content.contains("function boot"));
        assert_eq!(chunks[1].chunk_type, ChunkKind::Block);
        assert!(chunks[1].content.contains("<p>hello</p>"));
        assert!(!chunks[1].content.contains("function boot"));
    }

    #[test]
    fn test_html_without_scripts_single_markup_chunk() {
        let chunker = HtmlChunker::new();
        let chunks = chunker
            .chunk(&SourceFile::new("plain.html", "<p>only markup</p>\n"))
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_name, "markup");
    }

    const CSS: &str = "\
body {
    margin: 0;
}

.app .title, .app .subtitle {
    font-weight: bold;
}
";

    #[test]
    fn test_css_selector_blocks() {
        let chunker = CssChunker::new();
        let chunks = chunker.chunk(&SourceFile::new("app.css", CSS)).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_name, "body");
        assert_eq!(chunks[1].chunk_name, ".app .title, .app .subtitle");
        assert!(chunks.iter().all(|c| c.chunk_type == ChunkKind::Selector));
    }

    #[test]
    fn test_css_nested_braces_one_block() {
        let src = "@media screen { body { margin: 0; } }\n";
        let chunker = CssChunker::new();
        let chunks = chunker.chunk(&SourceFile::new("m.css", src)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_name, "@media screen");
    }

    #[test]
    fn test_css_without_blocks_yields_nothing() {
        let chunker = CssChunker::new();
        let chunks = chunker
            .chunk(&SourceFile::new("vars.css", "/* comment only */\n"))
            .unwrap();
        assert!(chunks.is_empty());
    }
}
