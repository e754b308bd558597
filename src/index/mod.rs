//! Incremental project indexer.
//!
//! Keeps the `code_context` and `file_metadata` tables consistent with the
//! on-disk project tree with minimum work: only files whose size or
//! content hash changed are re-chunked and re-embedded. A touched mtime
//! with an unchanged hash does not trigger reindexing (hash equality
//! wins); the stored mtime is refreshed so the next run compares cheaply.
//!
//! Per-file failures are recorded in the run report and never abort the
//! run. Files that vanished from disk lose both their metadata record and
//! their stored chunks.

use crate::chunking::{ChunkerRegistry, SourceFile};
use crate::core::{Chunk, FileMetadata, sha256_hex, unix_now};
use crate::embedding::Embedder;
use crate::error::{IndexError, Result, StorageError};
use crate::storage::VectorStore;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Largest file the indexer will read, in bytes.
pub const MAX_FILE_SIZE: u64 = 100 * 1024;

/// Directory names skipped during the walk.
pub const SKIP_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    "node_modules",
    "build",
    "dist",
    "target",
    ".pytest_cache",
    ".mypy_cache",
    ".idea",
    ".vscode",
    "coverage",
    "logs",
    "tmp",
];

/// Extensions eligible for indexing.
pub const ELIGIBLE_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "java", "cpp", "c", "h", "hpp", "cs", "rb", "go", "rs", "php",
    "html", "css", "scss", "sass", "less", "vue", "svelte", "md", "txt", "json", "yaml", "yml",
    "xml", "sql", "sh",
];

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Largest file to read, in bytes.
    pub max_file_size: u64,
    /// Directory names to skip.
    pub skip_dirs: Vec<String>,
    /// Worker parallelism for changed-file processing.
    pub workers: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            skip_dirs: SKIP_DIRS.iter().map(|s| (*s).to_string()).collect(),
            workers: num_cpus::get(),
        }
    }
}

/// Outcome of one indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    /// Eligible files enumerated.
    pub files_checked: usize,
    /// Files chunked, embedded, and stored this run.
    pub files_indexed: usize,
    /// Files left alone because nothing changed.
    pub files_unchanged: usize,
    /// Files skipped due to per-file errors.
    pub files_skipped: usize,
    /// Chunks written this run.
    pub chunks_indexed: usize,
    /// Per-file error messages, in completion order.
    pub errors: Vec<String>,
}

/// Snapshot of one on-disk file used for change detection.
struct FileState {
    rel_path: String,
    abs_path: PathBuf,
    file_size: u64,
    mtime: i64,
    content_hash: String,
    content: String,
}

/// Incremental indexer over a project tree.
///
/// # Examples
///
/// ```no_run
/// use codefactory_rs::embedding::{DEFAULT_DIMENSIONS, create_embedder};
/// use codefactory_rs::index::{IncrementalIndexer, IndexerConfig};
/// use codefactory_rs::storage::{SqliteStore, VectorStore};
///
/// let mut store = SqliteStore::open(".codefactory/state.db", DEFAULT_DIMENSIONS).unwrap();
/// store.init().unwrap();
/// let embedder = create_embedder();
/// let indexer = IncrementalIndexer::new("my-project".into(), IndexerConfig::default());
/// let report = indexer.index_project(&mut store, embedder.as_ref()).unwrap();
/// println!("{} files indexed", report.files_indexed);
/// ```
pub struct IncrementalIndexer {
    project_root: PathBuf,
    config: IndexerConfig,
    registry: ChunkerRegistry,
}

impl IncrementalIndexer {
    /// Creates an indexer for a project root.
    #[must_use]
    pub fn new(project_root: PathBuf, config: IndexerConfig) -> Self {
        Self {
            project_root,
            config,
            registry: ChunkerRegistry::new(),
        }
    }

    /// Indexes the project, reprocessing only changed files.
    ///
    /// # Errors
    ///
    /// Returns an error only for run-level failures (missing root, store
    /// unavailable); per-file failures land in the report.
    pub fn index_project(
        &self,
        store: &mut dyn VectorStore,
        embedder: &dyn Embedder,
    ) -> Result<IndexReport> {
        if !self.project_root.is_dir() {
            return Err(IndexError::RootNotFound {
                path: self.project_root.display().to_string(),
            }
            .into());
        }

        let mut report = IndexReport::default();
        let stored: HashMap<String, FileMetadata> = store
            .all_file_metadata()?
            .into_iter()
            .map(|meta| (meta.path.clone(), meta))
            .collect();

        tracing::info!(
            root = %self.project_root.display(),
            known_files = stored.len(),
            "starting incremental index run"
        );

        let mut candidates = Vec::new();
        self.walk(&self.project_root, &mut candidates);
        report.files_checked = candidates.len();

        // Snapshot current file states, deciding per file what to do.
        let mut to_index: Vec<FileState> = Vec::new();
        let mut seen_paths: Vec<String> = Vec::new();
        for abs_path in candidates {
            let rel_path = self.relative_name(&abs_path);
            seen_paths.push(rel_path.clone());
            match Self::snapshot(&abs_path, &rel_path) {
                Ok(state) => {
                    match stored.get(&rel_path) {
                        Some(prev)
                            if prev.file_size == state.file_size
                                && prev.content_hash == state.content_hash =>
                        {
                            report.files_unchanged += 1;
                            // Touched mtime with identical content: refresh
                            // the record so the next run compares cheaply.
                            if prev.mtime != state.mtime {
                                let mut refreshed = prev.clone();
                                refreshed.mtime = state.mtime;
                                store.upsert_file_metadata(&refreshed)?;
                            }
                        }
                        _ => to_index.push(state),
                    }
                }
                Err(reason) => {
                    report.files_skipped += 1;
                    report.errors.push(format!("{rel_path}: {reason}"));
                }
            }
        }

        tracing::info!(
            to_index = to_index.len(),
            unchanged = report.files_unchanged,
            "change detection complete"
        );

        // Chunk and embed changed files on a bounded worker pool; the
        // store mutations happen afterwards, one batch per file.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.max(1))
            .build()
            .map_err(|e| crate::error::Error::Config {
                message: format!("worker pool: {e}"),
            })?;

        let registry = &self.registry;
        let processed: Vec<(FileState, std::result::Result<Vec<Chunk>, String>)> = pool.install(|| {
            to_index
                .into_par_iter()
                .map(|state| {
                    let outcome = Self::chunk_and_embed(registry, embedder, &state);
                    (state, outcome)
                })
                .collect()
        });

        for (state, outcome) in processed {
            match outcome {
                Ok(chunks) => {
                    store.delete_chunks_for_path(&state.rel_path)?;
                    store.upsert_chunks(&chunks)?;
                    store.upsert_file_metadata(&FileMetadata {
                        path: state.rel_path.clone(),
                        file_size: state.file_size,
                        mtime: state.mtime,
                        content_hash: state.content_hash.clone(),
                        last_indexed: unix_now(),
                        chunk_count: chunks.len(),
                    })?;
                    report.files_indexed += 1;
                    report.chunks_indexed += chunks.len();
                }
                Err(reason) => {
                    report.files_skipped += 1;
                    report.errors.push(format!("{}: {reason}", state.rel_path));
                }
            }
        }

        // Drop records for files that no longer exist on disk.
        for (path, _) in &stored {
            if !seen_paths.contains(path) {
                store.delete_chunks_for_path(path)?;
                store.delete_file_metadata(path)?;
                tracing::debug!(%path, "removed records for deleted file");
            }
        }

        tracing::info!(
            indexed = report.files_indexed,
            chunks = report.chunks_indexed,
            errors = report.errors.len(),
            "index run complete"
        );
        Ok(report)
    }

    /// Walks the tree collecting eligible files.
    fn walk(&self, dir: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        let mut entries: Vec<_> = entries.flatten().collect();
        entries.sort_by_key(std::fs::DirEntry::path);

        for entry in entries {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if path.is_dir() {
                if !self.config.skip_dirs.iter().any(|skip| skip == &name) {
                    self.walk(&path, out);
                }
                continue;
            }

            let Ok(meta) = entry.metadata() else { continue };
            if meta.len() > self.config.max_file_size {
                continue;
            }
            let eligible = path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .is_some_and(|ext| ELIGIBLE_EXTENSIONS.contains(&ext.as_str()));
            if eligible {
                out.push(path);
            }
        }
    }

    fn relative_name(&self, abs_path: &Path) -> String {
        abs_path
            .strip_prefix(&self.project_root)
            .unwrap_or(abs_path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Reads one file and computes its change-detection triple.
    #[allow(clippy::cast_possible_wrap)]
    fn snapshot(abs_path: &Path, rel_path: &str) -> std::result::Result<FileState, String> {
        let meta = std::fs::metadata(abs_path).map_err(|e| e.to_string())?;
        let content = std::fs::read_to_string(abs_path).map_err(|e| e.to_string())?;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs() as i64);

        Ok(FileState {
            rel_path: rel_path.to_string(),
            abs_path: abs_path.to_path_buf(),
            file_size: meta.len(),
            mtime,
            content_hash: sha256_hex(&content),
            content,
        })
    }

    /// Chunks and embeds one file. An unavailable embedder skips the
    /// affected chunks rather than failing the file.
    fn chunk_and_embed(
        registry: &ChunkerRegistry,
        embedder: &dyn Embedder,
        state: &FileState,
    ) -> std::result::Result<Vec<Chunk>, String> {
        let source = SourceFile::new(&state.rel_path, &state.content);
        let mut chunks = registry
            .chunk_source(&source)
            .map_err(|e| format!("chunking failed: {e}"))?;

        let mut kept = Vec::with_capacity(chunks.len());
        for mut chunk in chunks.drain(..) {
            match embedder.embed(&chunk.content) {
                Ok(vector) => {
                    chunk.vector = vector;
                    kept.push(chunk);
                }
                Err(crate::error::Error::Storage(StorageError::EmbedUnavailable(reason))) => {
                    tracing::warn!(
                        path = %state.abs_path.display(),
                        %reason,
                        "embedder unavailable, skipping chunk"
                    );
                }
                Err(err) => return Err(format!("embedding failed: {err}")),
            }
        }
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::storage::SqliteStore;
    use std::fs;

    const DIMS: usize = 16;

    fn setup(root: &Path) -> (SqliteStore, HashEmbedder, IncrementalIndexer) {
        let mut store = SqliteStore::in_memory(DIMS).unwrap();
        store.init().unwrap();
        let embedder = HashEmbedder::new(DIMS);
        let indexer = IncrementalIndexer::new(root.to_path_buf(), IndexerConfig::default());
        (store, embedder, indexer)
    }

    #[test]
    fn test_first_run_indexes_everything() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "def f():\n    return 1\n").unwrap();
        fs::write(dir.path().join("notes.md"), "# Title\n\nBody.\n").unwrap();
        fs::write(dir.path().join("image.png"), "binary-ish").unwrap();

        let (mut store, embedder, indexer) = setup(dir.path());
        let report = indexer.index_project(&mut store, &embedder).unwrap();

        assert_eq!(report.files_checked, 2);
        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.files_unchanged, 0);
        assert!(report.chunks_indexed >= 2);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "def f():\n    return 1\n").unwrap();

        let (mut store, embedder, indexer) = setup(dir.path());
        indexer.index_project(&mut store, &embedder).unwrap();
        let second = indexer.index_project(&mut store, &embedder).unwrap();

        assert_eq!(second.files_indexed, 0);
        assert_eq!(second.files_unchanged, 1);
        assert_eq!(second.chunks_indexed, 0);
    }

    #[test]
    fn test_edit_converges_stored_hash() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.py");
        fs::write(&file, "def f():\n    return 1\n").unwrap();

        let (mut store, embedder, indexer) = setup(dir.path());
        indexer.index_project(&mut store, &embedder).unwrap();

        let edited = "def f():\n    return 2\n";
        fs::write(&file, edited).unwrap();
        let report = indexer.index_project(&mut store, &embedder).unwrap();
        assert_eq!(report.files_indexed, 1);

        let metadata = store.all_file_metadata().unwrap();
        assert_eq!(metadata[0].content_hash, sha256_hex(edited));
        let chunks = store.chunks_for_path("app.py").unwrap();
        assert!(chunks.iter().all(|c| c.content.contains("return 2")));
    }

    #[test]
    fn test_touched_mtime_with_same_hash_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.py");
        fs::write(&file, "def f():\n    return 1\n").unwrap();

        let (mut store, embedder, indexer) = setup(dir.path());
        indexer.index_project(&mut store, &embedder).unwrap();

        // Force a different stored mtime so the triple disagrees on mtime
        // only; hash equality must win.
        let mut meta = store.all_file_metadata().unwrap().remove(0);
        meta.mtime -= 3600;
        store.upsert_file_metadata(&meta).unwrap();

        let report = indexer.index_project(&mut store, &embedder).unwrap();
        assert_eq!(report.files_indexed, 0);
        assert_eq!(report.files_unchanged, 1);

        // The stored mtime was refreshed to the current value.
        let refreshed = store.all_file_metadata().unwrap().remove(0);
        assert_ne!(refreshed.mtime, meta.mtime);
    }

    #[test]
    fn test_deleted_file_records_removed() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gone.py");
        fs::write(&file, "def f():\n    return 1\n").unwrap();

        let (mut store, embedder, indexer) = setup(dir.path());
        indexer.index_project(&mut store, &embedder).unwrap();
        assert_eq!(store.all_file_metadata().unwrap().len(), 1);

        fs::remove_file(&file).unwrap();
        indexer.index_project(&mut store, &embedder).unwrap();

        assert!(store.all_file_metadata().unwrap().is_empty());
        assert!(store.chunks_for_path("gone.py").unwrap().is_empty());
    }

    #[test]
    fn test_skip_dirs_and_size_cap() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/dep.js"), "module.exports = 1;\n").unwrap();
        fs::write(dir.path().join("huge.py"), "x = 1\n".repeat(30_000)).unwrap();
        fs::write(dir.path().join("ok.py"), "def f(): pass\n").unwrap();

        let (mut store, embedder, indexer) = setup(dir.path());
        let report = indexer.index_project(&mut store, &embedder).unwrap();

        assert_eq!(report.files_checked, 1);
        assert_eq!(report.files_indexed, 1);
        assert!(store.chunks_for_path("node_modules/dep.js").unwrap().is_empty());
    }

    #[test]
    fn test_missing_root_is_run_level_error() {
        let (mut store, embedder, _) = setup(Path::new("."));
        let indexer = IncrementalIndexer::new(
            PathBuf::from("/definitely/not/here"),
            IndexerConfig::default(),
        );
        assert!(indexer.index_project(&mut store, &embedder).is_err());
    }

    #[test]
    fn test_unreadable_file_recorded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // Invalid UTF-8 content fails read_to_string.
        fs::write(dir.path().join("bad.py"), [0xFF, 0xFE, 0x01]).unwrap();
        fs::write(dir.path().join("ok.py"), "def f(): pass\n").unwrap();

        let (mut store, embedder, indexer) = setup(dir.path());
        let report = indexer.index_project(&mut store, &embedder).unwrap();

        assert_eq!(report.files_indexed, 1);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("bad.py"));
    }
}
