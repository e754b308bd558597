//! Chunk and file-metadata representations.
//!
//! Chunks are semantically labelled fragments of source files produced by
//! the chunking strategies. Each chunk carries its position in the file,
//! a content hash for identity, and an embedding vector for retrieval.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Semantic label attached to a chunk by its chunking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// A function or method body.
    Function,
    /// A class or type declaration.
    Class,
    /// A generic source block (shell sections, HTML markup remainder).
    Block,
    /// A CSS selector block.
    Selector,
    /// An embedded script block extracted from HTML.
    Script,
    /// A heading-delimited markdown section.
    MarkdownSection,
    /// A paragraph of plain text.
    Paragraph,
    /// Whole-file fallback when structural extraction yielded nothing.
    Fallback,
    /// Whole-file fallback specific to TypeScript sources.
    TsFile,
    /// Whole-file fallback specific to JSX sources.
    JsxFile,
}

impl ChunkKind {
    /// Returns the wire name of the kind (matches the stored column value).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Block => "block",
            Self::Selector => "selector",
            Self::Script => "script",
            Self::MarkdownSection => "markdown_section",
            Self::Paragraph => "paragraph",
            Self::Fallback => "fallback",
            Self::TsFile => "ts_file",
            Self::JsxFile => "jsx_file",
        }
    }

    /// Parses a stored kind name back into the enum.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "function" => Some(Self::Function),
            "class" => Some(Self::Class),
            "block" => Some(Self::Block),
            "selector" => Some(Self::Selector),
            "script" => Some(Self::Script),
            "markdown_section" => Some(Self::MarkdownSection),
            "paragraph" => Some(Self::Paragraph),
            "fallback" => Some(Self::Fallback),
            "ts_file" => Some(Self::TsFile),
            "jsx_file" => Some(Self::JsxFile),
            _ => None,
        }
    }
}

/// A semantically labelled fragment of a source file.
///
/// # Examples
///
/// ```
/// use codefactory_rs::core::{Chunk, ChunkKind};
///
/// let chunk = Chunk::new("src/app.py", "helpers", ChunkKind::Function, "def f():\n    pass", 10, 11, "python");
/// assert_eq!(chunk.start_line, 10);
/// assert_eq!(chunk.content_hash.len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier derived from path, name, and content.
    pub chunk_id: String,

    /// Project-relative path of the source file.
    pub path: String,

    /// Name of the chunked symbol (empty for unnamed blocks).
    pub chunk_name: String,

    /// Semantic label.
    pub chunk_type: ChunkKind,

    /// Chunk content.
    pub content: String,

    /// Embedding vector; empty until the chunk has been embedded.
    pub vector: Vec<f32>,

    /// First line of the chunk in the file (1-based, inclusive; 0 if unknown).
    pub start_line: usize,

    /// Last line of the chunk in the file (1-based, inclusive; 0 if unknown).
    pub end_line: usize,

    /// Hex SHA-256 of `content`.
    pub content_hash: String,

    /// Source language label (e.g. "python", "typescript").
    pub language: String,

    /// Lint messages attached during analysis, in order.
    pub lint_errors: Vec<String>,

    /// Names of symbols this chunk references.
    pub dependencies: BTreeSet<String>,
}

impl Chunk {
    /// Creates a new chunk with a derived identifier and content hash.
    #[must_use]
    pub fn new(
        path: &str,
        chunk_name: &str,
        chunk_type: ChunkKind,
        content: &str,
        start_line: usize,
        end_line: usize,
        language: &str,
    ) -> Self {
        let head: String = content.chars().take(100).collect();
        let chunk_id = sha256_hex(&format!("{path}:{chunk_name}:{head}"));
        Self {
            chunk_id,
            path: path.to_string(),
            chunk_name: chunk_name.to_string(),
            chunk_type,
            content: content.to_string(),
            vector: Vec::new(),
            start_line,
            end_line,
            content_hash: sha256_hex(content),
            language: language.to_string(),
            lint_errors: Vec::new(),
            dependencies: BTreeSet::new(),
        }
    }

    /// Creates the whole-file fallback chunk for a source that yielded no
    /// structural chunks.
    #[must_use]
    pub fn fallback(path: &str, content: &str, language: &str) -> Self {
        let line_count = content.lines().count().max(1);
        Self::new(
            path,
            "full_file",
            ChunkKind::Fallback,
            content,
            1,
            line_count,
            language,
        )
    }

    /// Returns the size of the chunk content in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Checks if the chunk content is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Estimates token count using the ~4 characters per token heuristic.
    #[must_use]
    pub fn estimate_tokens(&self) -> usize {
        self.content.len().div_ceil(4)
    }
}

/// Per-file bookkeeping used by the incremental indexer to detect change.
///
/// Exactly one record exists per path; `content_hash` is the SHA-256 of
/// the file content at `last_indexed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Project-relative path.
    pub path: String,

    /// File size in bytes at index time.
    pub file_size: u64,

    /// Modification time as unix seconds at index time.
    pub mtime: i64,

    /// Hex SHA-256 of the file content at index time.
    pub content_hash: String,

    /// Unix seconds when the file was last indexed.
    pub last_indexed: i64,

    /// Number of chunks stored for this file.
    pub chunk_count: usize,
}

/// A retrieval chunk belonging to the knowledge base rather than to the
/// project tree. Isolated from project chunks by table and by
/// `knowledge_space`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// Stable identifier derived from source and content.
    pub chunk_id: String,

    /// Origin document path or URL.
    pub source: String,

    /// Chunk content.
    pub content: String,

    /// Embedding vector.
    pub vector: Vec<f32>,

    /// Logical partition preventing cross-project bleed in retrieval.
    pub knowledge_space: String,

    /// Document classification (e.g. "api_docs", "tutorial").
    pub document_type: String,

    /// Framework the document covers, if any.
    pub framework: String,

    /// Framework or document version label.
    pub version: String,

    /// Hex SHA-256 of the source document.
    pub source_hash: String,

    /// Additional metadata as a JSON string.
    pub metadata_json: String,
}

impl KnowledgeChunk {
    /// Creates a knowledge chunk with a derived identifier.
    #[must_use]
    pub fn new(source: &str, content: &str, knowledge_space: &str) -> Self {
        let head: String = content.chars().take(100).collect();
        Self {
            chunk_id: sha256_hex(&format!("{source}:{knowledge_space}:{head}")),
            source: source.to_string(),
            content: content.to_string(),
            vector: Vec::new(),
            knowledge_space: knowledge_space.to_string(),
            document_type: String::new(),
            framework: String::new(),
            version: String::new(),
            source_hash: sha256_hex(content),
            metadata_json: "{}".to_string(),
        }
    }
}

/// Computes the hex-encoded SHA-256 digest of a string.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Returns the current unix timestamp in seconds.
#[allow(clippy::cast_possible_wrap)]
#[must_use]
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
