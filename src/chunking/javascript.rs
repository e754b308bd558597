//! JavaScript and JSX chunking strategies.
//!
//! JavaScript sources are scanned for declaration patterns with
//! brace-balance extents. JSX indicator patterns (React imports, tags in
//! return position, `className=`) force the JSX strategy, which matches
//! component, class-component, hook, and arrow-function shapes. A JSX scan
//! that matches nothing falls back to one whole-file chunk labelled
//! `jsx_file`.

use crate::chunking::balance::{brace_extent, consume_trailer, line_span, line_start};
use crate::chunking::traits::{LanguageChunker, SourceFile};
use crate::core::{Chunk, ChunkKind};
use crate::error::Result;
use regex::Regex;
use std::sync::OnceLock;

#[allow(clippy::unwrap_used)]
fn jsx_indicators() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"import\s+React",
            r"from\s+['\x22]react['\x22]",
            r"return\s*\(\s*<",
            r"=>\s*\(\s*<",
            r"className=",
            r"</[A-Za-z]",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

#[allow(clippy::unwrap_used)]
fn js_patterns() -> &'static [(Regex, ChunkKind)] {
    static RES: OnceLock<Vec<(Regex, ChunkKind)>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            (r"(?m)^(?:export\s+)?(?:default\s+)?function\s+(\w+)\s*\(", ChunkKind::Function),
            (r"(?m)^(?:export\s+)?class\s+(\w+)", ChunkKind::Class),
            (r"(?m)^(?:export\s+)?const\s+(\w+)\s*=\s*(?:async\s*)?\([^)]*\)\s*=>", ChunkKind::Function),
            (r"(?m)^(?:export\s+)?const\s+(\w+)\s*=\s*function\b", ChunkKind::Function),
        ]
        .iter()
        .map(|(p, k)| (Regex::new(p).unwrap(), *k))
        .collect()
    })
}

#[allow(clippy::unwrap_used)]
fn jsx_patterns() -> &'static [(Regex, &'static str)] {
    static RES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            (
                r"(?m)^(?:export\s+(?:default\s+)?)?(?:const|function)\s+(use\w+)\s*[=(]",
                "hook",
            ),
            (
                r"(?m)^(?:export\s+(?:default\s+)?)?const\s+([A-Z]\w*)\s*=\s*(?:async\s*)?\([^)]*\)\s*=>\s*\{",
                "component",
            ),
            (
                r"(?m)^class\s+(\w+)\s+extends\s+(?:React\.)?Component\s*\{",
                "class_component",
            ),
            (
                r"(?m)^(?:export\s+(?:default\s+)?)?function\s+(\w+)\s*\([^)]*\)\s*\{",
                "function",
            ),
            (
                r"(?m)^(?:export\s+)?const\s+(\w+)\s*=\s*\([^)]*\)\s*=>\s*\{",
                "arrow_function",
            ),
        ]
        .iter()
        .map(|(p, label)| (Regex::new(p).unwrap(), *label))
        .collect()
    })
}

/// True when the source carries JSX indicator patterns.
///
/// Detection is by substring shape, so JSX-like text inside strings or
/// comments can route a plain-JS file here; the scan then falls through
/// to the labelled whole-file fallback.
#[must_use]
pub fn looks_like_jsx(content: &str) -> bool {
    jsx_indicators().iter().any(|re| re.is_match(content))
}

/// Chunker for JavaScript sources; delegates to [`JsxChunker`] when JSX
/// indicators are present.
#[derive(Debug, Clone, Copy, Default)]
pub struct JavaScriptChunker;

impl JavaScriptChunker {
    /// Creates a new JavaScript chunker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LanguageChunker for JavaScriptChunker {
    fn chunk(&self, source: &SourceFile) -> Result<Vec<Chunk>> {
        if looks_like_jsx(&source.content) {
            return JsxChunker::new().chunk(source);
        }

        let content = &source.content;
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut claimed: Vec<(usize, usize)> = Vec::new();

        for (pattern, kind) in js_patterns() {
            for caps in pattern.captures_iter(content) {
                let Some(whole) = caps.get(0) else { continue };
                let start = line_start(content, whole.start());
                if claimed.iter().any(|&(s, e)| start >= s && start < e) {
                    continue;
                }
                let Some(end) = brace_extent(content, whole.end().saturating_sub(1)) else {
                    continue;
                };
                let end = consume_trailer(content, end);
                claimed.push((start, end));

                let name = caps.get(1).map_or("", |m| m.as_str());
                let snippet = content[start..end].trim_end();
                if snippet.is_empty() {
                    continue;
                }
                let (start_line, end_line) = line_span(content, start, start + snippet.len());
                chunks.push(Chunk::new(
                    &source.path,
                    name,
                    *kind,
                    snippet,
                    start_line,
                    end_line,
                    "javascript",
                ));
            }
        }

        chunks.sort_by_key(|c| c.start_line);
        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "javascript"
    }

    fn language(&self) -> &'static str {
        "javascript"
    }
}

/// Chunker for JSX/React sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsxChunker;

impl JsxChunker {
    /// Creates a new JSX chunker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LanguageChunker for JsxChunker {
    fn chunk(&self, source: &SourceFile) -> Result<Vec<Chunk>> {
        let content = &source.content;
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut claimed: Vec<(usize, usize)> = Vec::new();

        for (pattern, label) in jsx_patterns() {
            for caps in pattern.captures_iter(content) {
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
                let end = consume_trailer(content, end);

                let snippet = content[start..end].trim_end();
                // Single-expression matches are too small to be components.
                if snippet.len() <= 10 {
                    continue;
                }
                claimed.push((start, end));

                let kind = match *label {
                    "class_component" => ChunkKind::Class,
                    _ => ChunkKind::Function,
                };
                let (start_line, end_line) = line_span(content, start, start + snippet.len());
                chunks.push(Chunk::new(
                    &source.path,
                    name.as_str(),
                    kind,
                    snippet,
                    start_line,
                    end_line,
                    "jsx",
                ));
            }
        }

        if chunks.is_empty() {
            // Pattern scan found nothing; keep the file retrievable.
            let line_count = source.line_count().max(1);
            return Ok(vec![Chunk::new(
                &source.path,
                "jsx_content",
                ChunkKind::JsxFile,
                content,
                1,
                line_count,
                "jsx",
            )]);
        }

        chunks.sort_by_key(|c| c.start_line);
        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "jsx"
    }

    fn language(&self) -> &'static str {
        "jsx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN_JS: &str = "\
function add(a, b) {
    return a + b;
}

const mul = (a, b) => {
    return a * b;
};

class Calc {
    run() { return 0; }
}
";

    const REACT_APP: &str = "\
import React, { useState, useEffect } from 'react';

const App = () => {
    const [items, setItems] = useState([]);
    useEffect(() => {
        fetch('/api/items').then(r => r.json()).then(setItems);
    }, []);
    return (
        <div className=\"app\">
            {items.length}
        </div>
    );
};

export default App;
";

    #[test]
    fn test_plain_js_not_detected_as_jsx() {
        assert!(!looks_like_jsx(PLAIN_JS));
        assert!(looks_like_jsx(REACT_APP));
    }

    #[test]
    fn test_js_chunker_extracts_declarations() {
        let chunker = JavaScriptChunker::new();
        let source = SourceFile::new("calc.js", PLAIN_JS);
        let chunks = chunker.chunk(&source).unwrap();

        let names: Vec<&str> = chunks.iter().map(|c| c.chunk_name.as_str()).collect();
        assert_eq!(names, vec!["add", "mul", "Calc"]);
        assert_eq!(chunks[2].chunk_type, ChunkKind::Class);
        assert!(chunks[2].content.contains("run() { return 0; }"));
    }

    #[test]
    fn test_js_with_jsx_routes_to_jsx_chunker() {
        let chunker = JavaScriptChunker::new();
        let source = SourceFile::new("App.js", REACT_APP);
        let chunks = chunker.chunk(&source).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_name, "App");
        assert_eq!(chunks[0].language, "jsx");
    }

    #[test]
    fn test_jsx_chunker_extracts_component() {
        let chunker = JsxChunker::new();
        let source = SourceFile::new("App.jsx", REACT_APP);
        let chunks = chunker.chunk(&source).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_name, "App");
        assert!(chunks[0].content.contains("useState"));
        assert!(chunks[0].content.ends_with("};"));
    }

    #[test]
    fn test_jsx_hook_detection() {
        let src = "\
export function useCounter(start) {
    const [n, setN] = useState(start);
    return [n, () => setN(n + 1)];
}
";
        let chunker = JsxChunker::new();
        let chunks = chunker.chunk(&SourceFile::new("useCounter.jsx", src)).unwrap();
        assert_eq!(chunks[0].chunk_name, "useCounter");
    }

    #[test]
    fn test_jsx_fallback_labelled_jsx_file() {
        let chunker = JsxChunker::new();
        let source = SourceFile::new("weird.jsx", "<div>static markup only</div>\n");
        let chunks = chunker.chunk(&source).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkKind::JsxFile);
        assert_eq!(chunks[0].chunk_name, "jsx_content");
    }

    #[test]
    fn test_class_component_kind() {
        let src = "\
class Panel extends React.Component {
    render() {
        return <div className=\"panel\" />;
    }
}
";
        let chunker = JsxChunker::new();
        let chunks = chunker.chunk(&SourceFile::new("Panel.jsx", src)).unwrap();
        assert_eq!(chunks[0].chunk_type, ChunkKind::Class);
        assert_eq!(chunks[0].chunk_name, "Panel");
    }
}
