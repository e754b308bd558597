//! SQL schema for the vector store.
//!
//! Three tables back the retrieval layer: `code_context` holds project
//! chunks, `knowledge_base` holds ingested documentation chunks, and
//! `file_metadata` tracks per-file indexing state. A `metadata` table
//! records the schema version for migrations.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Table name for project code chunks.
pub const TABLE_CODE_CONTEXT: &str = "code_context";

/// Table name for knowledge-base chunks.
pub const TABLE_KNOWLEDGE_BASE: &str = "knowledge_base";

/// Table name for per-file indexing metadata.
pub const TABLE_FILE_METADATA: &str = "file_metadata";

/// Full schema creation SQL. Idempotent.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS code_context (
    chunk_id     TEXT PRIMARY KEY,
    path         TEXT NOT NULL,
    chunk_name   TEXT NOT NULL DEFAULT '',
    chunk_type   TEXT NOT NULL DEFAULT 'fallback',
    content      TEXT NOT NULL,
    vector       BLOB NOT NULL,
    start_line   INTEGER NOT NULL DEFAULT 0,
    end_line     INTEGER NOT NULL DEFAULT 0,
    content_hash TEXT NOT NULL,
    language     TEXT NOT NULL DEFAULT '',
    lint_errors  TEXT NOT NULL DEFAULT '[]',
    dependencies TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_code_context_path ON code_context(path);
CREATE INDEX IF NOT EXISTS idx_code_context_language ON code_context(language);

CREATE TABLE IF NOT EXISTS knowledge_base (
    chunk_id        TEXT PRIMARY KEY,
    source          TEXT NOT NULL,
    content         TEXT NOT NULL,
    vector          BLOB NOT NULL,
    knowledge_space TEXT NOT NULL,
    document_type   TEXT NOT NULL DEFAULT '',
    framework       TEXT NOT NULL DEFAULT '',
    version         TEXT NOT NULL DEFAULT '',
    source_hash     TEXT NOT NULL DEFAULT '',
    metadata_json   TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_knowledge_base_space ON knowledge_base(knowledge_space);

CREATE TABLE IF NOT EXISTS file_metadata (
    path         TEXT PRIMARY KEY,
    file_size    INTEGER NOT NULL,
    mtime        INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    last_indexed INTEGER NOT NULL,
    chunk_count  INTEGER NOT NULL DEFAULT 0
);
";

/// Checks whether the schema has been created.
pub const CHECK_SCHEMA_SQL: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'code_context'";

/// Reads the stored schema version.
pub const GET_VERSION_SQL: &str = "SELECT value FROM metadata WHERE key = 'schema_version'";

/// Writes the schema version.
pub const SET_VERSION_SQL: &str =
    "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)";

/// Encodes an embedding vector as a little-endian f32 blob.
#[must_use]
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decodes a little-endian f32 blob back into a vector.
#[must_use]
pub fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}
