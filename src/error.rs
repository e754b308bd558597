//! Error types for pipeline operations.
//!
//! This module provides the error hierarchy using `thiserror` for all
//! pipeline operations including chunking, storage, indexing, LLM calls,
//! code modification, and operational checks.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Chunking-related errors (source segmentation).
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// Storage-related errors (vector store operations).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Indexing errors (project tree scanning).
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Language model errors.
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    /// Code modification pipeline errors.
    #[error("modification error: {0}")]
    Modify(#[from] ModifyError),

    /// Operational (SRE) pipeline errors.
    #[error("operational error: {0}")]
    Sre(#[from] SreError),

    /// Invalid state errors.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Chunking-specific errors for source segmentation.
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// File could not be read for chunking.
    #[error("failed to read source: {path}: {reason}")]
    ReadFailed {
        /// Path to the source file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(String),

    /// Unknown chunking strategy requested.
    #[error("unknown chunking strategy: {name}")]
    UnknownStrategy {
        /// Name of the unknown strategy.
        name: String,
    },
}

/// Storage-specific errors for vector store operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Store not initialized (schema not created).
    #[error("vector store not initialized")]
    NotInitialized,

    /// Vector dimension mismatch between row and store.
    #[error("vector dimension {actual} does not match store dimension {expected}")]
    DimensionMismatch {
        /// Dimension of the supplied vector.
        actual: usize,
        /// Dimension the store was opened with.
        expected: usize,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Embedding backend unavailable. Callers treat the affected chunk
    /// as skipped, not as a hard failure.
    #[error("embedding backend unavailable: {0}")]
    EmbedUnavailable(String),
}

/// Indexing errors for project tree scans.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Project root does not exist or is not a directory.
    #[error("project root not found: {path}")]
    RootNotFound {
        /// Path that was checked.
        path: String,
    },

    /// A single file failed during indexing. Recorded in the run report;
    /// never aborts the run.
    #[error("file error: {path}: {reason}")]
    FileError {
        /// Project-relative path of the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Language model port errors.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The call exceeded its time bound.
    #[error("llm call timed out after {seconds}s")]
    Timeout {
        /// Time bound that was exceeded.
        seconds: u64,
    },

    /// The provider rejected the request.
    #[error("llm request rejected: {0}")]
    Rejected(String),

    /// The session token budget is exhausted; no further calls are issued.
    #[error("session budget exceeded: {used} of {limit} tokens consumed")]
    BudgetExceeded {
        /// Tokens consumed so far.
        used: u64,
        /// Session limit.
        limit: u64,
    },

    /// The reply could not be interpreted. Consumers degrade to a minimal
    /// fallback artifact carrying an `error` field.
    #[error("invalid llm response: {0}")]
    InvalidResponse(String),
}

/// Code modification pipeline errors.
#[derive(Error, Debug)]
pub enum ModifyError {
    /// A target path escapes the project root after normalization.
    /// Fatal to the request; the patch is never applied.
    #[error("path escapes project root: {path}")]
    PathEscape {
        /// Offending path as given in the request.
        path: String,
    },

    /// Phase-1 syntax validation failed.
    #[error("syntax invalid: {path}: {reason}")]
    SyntaxInvalid {
        /// File that failed the check.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// LLM review validation failed after retries were exhausted.
    #[error("validation failed: {failures} check(s) failing")]
    ValidationFailed {
        /// Count of failing checks in the final report.
        failures: usize,
    },

    /// The unified diff could not be applied to the working tree.
    #[error("patch apply failed: {path}: {reason}")]
    PatchApplyFailed {
        /// File the hunk targeted.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// The aggregate patch text could not be parsed.
    #[error("malformed patch: {0}")]
    MalformedPatch(String),
}

/// Operational pipeline errors for the SRE agents.
#[derive(Error, Debug)]
pub enum SreError {
    /// A required external tool is not installed. Logged; the phase is
    /// marked not container-based but still passes if nothing else failed.
    #[error("tool missing: {tool}")]
    ToolMissing {
        /// Name of the missing executable.
        tool: String,
    },

    /// A subprocess exceeded its time bound. The phase is marked failed.
    #[error("{tool} timed out after {seconds}s")]
    Timeout {
        /// Tool that was running.
        tool: String,
        /// Time bound that was exceeded.
        seconds: u64,
    },

    /// A subprocess exited with a failure status.
    #[error("{tool} failed: {detail}")]
    CommandFailed {
        /// Tool that failed.
        tool: String,
        /// Captured stderr or stdout excerpt.
        detail: String,
    },
}

// Implement From traits for standard library and dependency errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::InvalidState {
            message: err.to_string(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<regex::Error> for ChunkingError {
    fn from(err: regex::Error) -> Self {
        Self::Regex(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
