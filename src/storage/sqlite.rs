//! `SQLite` vector store implementation.
//!
//! Stores embedding vectors as little-endian f32 blobs and answers top-k
//! queries with a brute-force cosine scan, which is exact and fast enough
//! at project scale. Each upsert is a single `INSERT OR REPLACE`, atomic
//! per row.

// SQLite stores all integers as i64. These casts are intentional and safe
// because we only store non-negative values that fit in usize.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use crate::core::{Chunk, ChunkKind, FileMetadata, KnowledgeChunk};
use crate::embedding::cosine_similarity;
use crate::error::{Result, StorageError};
use crate::storage::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, SCHEMA_SQL, SET_VERSION_SQL, decode_vector,
    encode_vector,
};
use crate::storage::traits::{Filter, Scored, StoreStats, VectorStore};
use rusqlite::{Connection, Row, params};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed vector store.
///
/// The connection sits behind a mutex so the store satisfies the port's
/// `Send + Sync` bound and can be shared across worker threads; each
/// operation holds the lock for one statement batch.
///
/// # Examples
///
/// ```no_run
/// use codefactory_rs::storage::{SqliteStore, VectorStore};
/// use codefactory_rs::embedding::DEFAULT_DIMENSIONS;
///
/// let mut store = SqliteStore::open(".codefactory/state.db", DEFAULT_DIMENSIONS).unwrap();
/// store.init().unwrap();
/// ```
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    dimensions: usize,
}

impl SqliteStore {
    /// Opens or creates a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Database(e.to_string()))?;
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
            dimensions,
        })
    }

    /// Creates an in-memory store. Useful for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory(dimensions: usize) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
            dimensions,
        })
    }

    /// Returns the database path (`None` for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the vector dimension the store was opened with.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Acquires the connection lock.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection lock poisoned".to_string()).into())
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(StorageError::DimensionMismatch {
                actual: vector.len(),
                expected: self.dimensions,
            }
            .into());
        }
        Ok(())
    }

    fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<Chunk> {
        let chunk_type: String = row.get("chunk_type")?;
        let lint_errors: String = row.get("lint_errors")?;
        let dependencies: String = row.get("dependencies")?;
        let vector: Vec<u8> = row.get("vector")?;
        Ok(Chunk {
            chunk_id: row.get("chunk_id")?,
            path: row.get("path")?,
            chunk_name: row.get("chunk_name")?,
            chunk_type: ChunkKind::parse(&chunk_type).unwrap_or(ChunkKind::Fallback),
            content: row.get("content")?,
            vector: decode_vector(&vector),
            start_line: row.get::<_, i64>("start_line")? as usize,
            end_line: row.get::<_, i64>("end_line")? as usize,
            content_hash: row.get("content_hash")?,
            language: row.get("language")?,
            lint_errors: serde_json::from_str(&lint_errors).unwrap_or_default(),
            dependencies: serde_json::from_str::<BTreeSet<String>>(&dependencies)
                .unwrap_or_default(),
        })
    }

    fn knowledge_from_row(row: &Row<'_>) -> rusqlite::Result<KnowledgeChunk> {
        let vector: Vec<u8> = row.get("vector")?;
        Ok(KnowledgeChunk {
            chunk_id: row.get("chunk_id")?,
            source: row.get("source")?,
            content: row.get("content")?,
            vector: decode_vector(&vector),
            knowledge_space: row.get("knowledge_space")?,
            document_type: row.get("document_type")?,
            framework: row.get("framework")?,
            version: row.get("version")?,
            source_hash: row.get("source_hash")?,
            metadata_json: row.get("metadata_json")?,
        })
    }

    fn metadata_from_row(row: &Row<'_>) -> rusqlite::Result<FileMetadata> {
        Ok(FileMetadata {
            path: row.get("path")?,
            file_size: row.get::<_, i64>("file_size")? as u64,
            mtime: row.get("mtime")?,
            content_hash: row.get("content_hash")?,
            last_indexed: row.get("last_indexed")?,
            chunk_count: row.get::<_, i64>("chunk_count")? as usize,
        })
    }

    /// Applies equality filters as a SQL predicate suffix.
    fn filter_clause(filters: &[Filter]) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        for filter in filters {
            match filter {
                Filter::Path(value) => {
                    clauses.push(format!("path = ?{}", values.len() + 1));
                    values.push(value.clone());
                }
                Filter::Language(value) => {
                    clauses.push(format!("language = ?{}", values.len() + 1));
                    values.push(value.clone());
                }
                Filter::ChunkType(value) => {
                    clauses.push(format!("chunk_type = ?{}", values.len() + 1));
                    values.push(value.clone());
                }
            }
        }
        let clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        (clause, values)
    }
}

impl VectorStore for SqliteStore {
    fn init(&mut self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL).map_err(StorageError::from)?;
        conn.execute(SET_VERSION_SQL, params![CURRENT_SCHEMA_VERSION.to_string()])
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn is_initialized(&self) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    fn upsert_chunks(&mut self, chunks: &[Chunk]) -> Result<()> {
        if !self.is_initialized()? {
            return Err(StorageError::NotInitialized.into());
        }
        let conn = self.lock()?;
        for chunk in chunks {
            self.check_dimensions(&chunk.vector)?;
            let lint_errors = serde_json::to_string(&chunk.lint_errors)
                .map_err(StorageError::from)?;
            let dependencies = serde_json::to_string(&chunk.dependencies)
                .map_err(StorageError::from)?;
            conn.execute(
                    "INSERT OR REPLACE INTO code_context
                     (chunk_id, path, chunk_name, chunk_type, content, vector,
                      start_line, end_line, content_hash, language, lint_errors, dependencies)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    params![
                        chunk.chunk_id,
                        chunk.path,
                        chunk.chunk_name,
                        chunk.chunk_type.as_str(),
                        chunk.content,
                        encode_vector(&chunk.vector),
                        chunk.start_line as i64,
                        chunk.end_line as i64,
                        chunk.content_hash,
                        chunk.language,
                        lint_errors,
                        dependencies,
                    ],
                )
                .map_err(StorageError::from)?;
        }
        Ok(())
    }

    fn delete_chunks_for_path(&mut self, path: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM code_context WHERE path = ?1", params![path])
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn chunks_for_path(&self, path: &str) -> Result<Vec<Chunk>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT * FROM code_context WHERE path = ?1 ORDER BY start_line")
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map(params![path], Self::chunk_from_row)
            .map_err(StorageError::from)?;
        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row.map_err(StorageError::from)?);
        }
        Ok(chunks)
    }

    fn all_chunks(&self) -> Result<Vec<Chunk>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT * FROM code_context ORDER BY path, start_line")
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map([], Self::chunk_from_row)
            .map_err(StorageError::from)?;
        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row.map_err(StorageError::from)?);
        }
        Ok(chunks)
    }

    fn top_k(&self, vector: &[f32], k: usize, filters: &[Filter]) -> Result<Vec<Scored<Chunk>>> {
        self.check_dimensions(vector)?;
        let (clause, values) = Self::filter_clause(filters);
        let sql = format!("SELECT * FROM code_context{clause}");
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(StorageError::from)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), Self::chunk_from_row)
            .map_err(StorageError::from)?;

        let mut scored = Vec::new();
        for row in rows {
            let chunk = row.map_err(StorageError::from)?;
            let score = cosine_similarity(vector, &chunk.vector);
            scored.push(Scored { item: chunk, score });
        }
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn upsert_knowledge(&mut self, chunks: &[KnowledgeChunk]) -> Result<()> {
        if !self.is_initialized()? {
            return Err(StorageError::NotInitialized.into());
        }
        let conn = self.lock()?;
        for chunk in chunks {
            self.check_dimensions(&chunk.vector)?;
            conn.execute(
                    "INSERT OR REPLACE INTO knowledge_base
                     (chunk_id, source, content, vector, knowledge_space,
                      document_type, framework, version, source_hash, metadata_json)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        chunk.chunk_id,
                        chunk.source,
                        chunk.content,
                        encode_vector(&chunk.vector),
                        chunk.knowledge_space,
                        chunk.document_type,
                        chunk.framework,
                        chunk.version,
                        chunk.source_hash,
                        chunk.metadata_json,
                    ],
                )
                .map_err(StorageError::from)?;
        }
        Ok(())
    }

    fn top_k_knowledge(
        &self,
        vector: &[f32],
        k: usize,
        knowledge_space: &str,
    ) -> Result<Vec<Scored<KnowledgeChunk>>> {
        self.check_dimensions(vector)?;
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT * FROM knowledge_base WHERE knowledge_space = ?1")
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map(params![knowledge_space], Self::knowledge_from_row)
            .map_err(StorageError::from)?;

        let mut scored = Vec::new();
        for row in rows {
            let chunk = row.map_err(StorageError::from)?;
            let score = cosine_similarity(vector, &chunk.vector);
            scored.push(Scored { item: chunk, score });
        }
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn upsert_file_metadata(&mut self, metadata: &FileMetadata) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
                "INSERT OR REPLACE INTO file_metadata
                 (path, file_size, mtime, content_hash, last_indexed, chunk_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    metadata.path,
                    metadata.file_size as i64,
                    metadata.mtime,
                    metadata.content_hash,
                    metadata.last_indexed,
                    metadata.chunk_count as i64,
                ],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn all_file_metadata(&self) -> Result<Vec<FileMetadata>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT * FROM file_metadata ORDER BY path")
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map([], Self::metadata_from_row)
            .map_err(StorageError::from)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(StorageError::from)?);
        }
        Ok(records)
    }

    fn delete_file_metadata(&mut self, path: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM file_metadata WHERE path = ?1", params![path])
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn
                .query_row(sql, [], |row| row.get(0))
                .map_err(StorageError::from)?;
            Ok(n as usize)
        };
        Ok(StoreStats {
            chunk_count: count("SELECT COUNT(*) FROM code_context")?,
            knowledge_count: count("SELECT COUNT(*) FROM knowledge_base")?,
            file_count: count("SELECT COUNT(*) FROM file_metadata")?,
            dimensions: self.dimensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sha256_hex;

    const DIMS: usize = 4;

    fn store() -> SqliteStore {
        let mut store = SqliteStore::in_memory(DIMS).unwrap();
        store.init().unwrap();
        store
    }

    fn chunk(path: &str, name: &str, vector: Vec<f32>) -> Chunk {
        let mut chunk = Chunk::new(path, name, ChunkKind::Function, name, 1, 1, "python");
        chunk.vector = vector;
        chunk
    }

    #[test]
    fn test_init_idempotent() {
        let mut store = store();
        store.init().unwrap();
        assert!(store.is_initialized().unwrap());
    }

    #[test]
    fn test_upsert_requires_init() {
        let mut store = SqliteStore::in_memory(DIMS).unwrap();
        let err = store
            .upsert_chunks(&[chunk("a.py", "f", vec![0.0; DIMS])])
            .unwrap_err();
        assert!(err.to_string().contains("not initialized"));
    }

    #[test]
    fn test_upsert_and_read_back() {
        let mut store = store();
        let original = chunk("a.py", "f", vec![1.0, 0.0, 0.0, 0.0]);
        store.upsert_chunks(std::slice::from_ref(&original)).unwrap();

        let loaded = store.chunks_for_path("a.py").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], original);
    }

    #[test]
    fn test_upsert_replaces_by_chunk_id() {
        let mut store = store();
        let mut c = chunk("a.py", "f", vec![1.0, 0.0, 0.0, 0.0]);
        store.upsert_chunks(std::slice::from_ref(&c)).unwrap();
        c.lint_errors.push("shadowed name".to_string());
        store.upsert_chunks(std::slice::from_ref(&c)).unwrap();

        let loaded = store.chunks_for_path("a.py").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].lint_errors, vec!["shadowed name".to_string()]);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut store = store();
        let err = store
            .upsert_chunks(&[chunk("a.py", "f", vec![0.0; DIMS + 1])])
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Storage(StorageError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_top_k_orders_by_cosine() {
        let mut store = store();
        store
            .upsert_chunks(&[
                chunk("a.py", "exact", vec![1.0, 0.0, 0.0, 0.0]),
                chunk("a.py", "near", vec![0.9, 0.1, 0.0, 0.0]),
                chunk("a.py", "far", vec![0.0, 0.0, 1.0, 0.0]),
            ])
            .unwrap();

        let hits = store.top_k(&[1.0, 0.0, 0.0, 0.0], 2, &[]).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].item.chunk_name, "exact");
        assert_eq!(hits[1].item.chunk_name, "near");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_top_k_with_filters() {
        let mut store = store();
        let mut py = chunk("a.py", "f", vec![1.0, 0.0, 0.0, 0.0]);
        py.language = "python".to_string();
        let mut js = chunk("a.js", "g", vec![1.0, 0.0, 0.0, 0.0]);
        js.language = "javascript".to_string();
        store.upsert_chunks(&[py, js]).unwrap();

        let hits = store
            .top_k(
                &[1.0, 0.0, 0.0, 0.0],
                10,
                &[Filter::Language("javascript".to_string())],
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item.path, "a.js");
    }

    #[test]
    fn test_delete_chunks_for_path() {
        let mut store = store();
        store
            .upsert_chunks(&[
                chunk("a.py", "f", vec![0.0; DIMS]),
                chunk("b.py", "g", vec![0.0; DIMS]),
            ])
            .unwrap();
        store.delete_chunks_for_path("a.py").unwrap();
        assert!(store.chunks_for_path("a.py").unwrap().is_empty());
        assert_eq!(store.chunks_for_path("b.py").unwrap().len(), 1);
    }

    #[test]
    fn test_knowledge_space_isolation() {
        let mut store = store();
        let mut a = KnowledgeChunk::new("doc.md", "react hooks guide", "proj-a");
        a.vector = vec![1.0, 0.0, 0.0, 0.0];
        let mut b = KnowledgeChunk::new("doc.md", "react hooks guide", "proj-b");
        b.vector = vec![1.0, 0.0, 0.0, 0.0];
        store.upsert_knowledge(&[a, b]).unwrap();

        let hits = store
            .top_k_knowledge(&[1.0, 0.0, 0.0, 0.0], 10, "proj-a")
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item.knowledge_space, "proj-a");
    }

    #[test]
    fn test_file_metadata_one_record_per_path() {
        let mut store = store();
        let mut meta = FileMetadata {
            path: "a.py".to_string(),
            file_size: 10,
            mtime: 100,
            content_hash: sha256_hex("v1"),
            last_indexed: 1,
            chunk_count: 1,
        };
        store.upsert_file_metadata(&meta).unwrap();
        meta.content_hash = sha256_hex("v2");
        meta.last_indexed = 2;
        store.upsert_file_metadata(&meta).unwrap();

        let all = store.all_file_metadata().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content_hash, sha256_hex("v2"));
    }

    #[test]
    fn test_delete_file_metadata() {
        let mut store = store();
        store
            .upsert_file_metadata(&FileMetadata {
                path: "gone.py".to_string(),
                file_size: 1,
                mtime: 1,
                content_hash: String::new(),
                last_indexed: 1,
                chunk_count: 0,
            })
            .unwrap();
        store.delete_file_metadata("gone.py").unwrap();
        assert!(store.all_file_metadata().unwrap().is_empty());
    }

    #[test]
    fn test_stats() {
        let mut store = store();
        store
            .upsert_chunks(&[chunk("a.py", "f", vec![0.0; DIMS])])
            .unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.chunk_count, 1);
        assert_eq!(stats.knowledge_count, 0);
        assert_eq!(stats.dimensions, DIMS);
    }
}
