//! # codefactory-rs
//!
//! An LLM-driven code modification and validation pipeline: given a
//! structured change request or a natural-language objective, the crate
//! analyzes the target project through a retrieval-augmented context
//! index and a cross-file semantic graph, produces per-file modification
//! payloads, validates them in two phases, renders deterministic unified
//! diffs and changelogs, applies the patch to the working tree, and then
//! hardens the result operationally (dependency manifests, docker
//! configuration, container-aware testing and security scanning).
//!
//! ## Architecture
//!
//! - **Retrieval layer**: language-aware chunking, an embedding port, a
//!   `SQLite` vector store, and an incremental indexer that reprocesses
//!   only changed files.
//! - **Modification pipeline**: analyzer, modifier, validator, diffing,
//!   and documentation adapters sequenced by an interactor with bounded
//!   validation retries and session-budget enforcement.
//! - **Operational pipeline**: dependency, docker-config, sandbox, and
//!   test-generation agents sequenced by an SRE lead into one report.
//!
//! Language model and embedding providers are consumed through ports;
//! no concrete provider is bound here.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod budget;
pub mod chunking;
pub mod cli;
pub mod context;
pub mod core;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod index;
pub mod llm;
pub mod modify;
pub mod sre;
pub mod storage;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use self::core::{
    AnalysisResult, Chunk, ChunkKind, FileMetadata, FilePayload, KnowledgeChunk,
    ModificationPlan, ModificationRequest, ModificationStep, ModifyOutcome, Patch,
    ValidationReport,
};

// Re-export budget types
pub use budget::{DEFAULT_SESSION_TOKENS, SessionBudget};

// Re-export storage types
pub use storage::{DEFAULT_DB_PATH, Filter, SqliteStore, VectorStore};

// Re-export chunking types
pub use chunking::{ChunkerRegistry, LanguageChunker, SourceFile, available_strategies};

// Re-export embedding types
pub use embedding::{DEFAULT_DIMENSIONS, Embedder, HashEmbedder, cosine_similarity, create_embedder};

// Re-export indexing types
pub use index::{IncrementalIndexer, IndexReport, IndexerConfig};

// Re-export retrieval types
pub use context::{ContextBuilder, ContextQuery, apply_context};

// Re-export graph types
pub use graph::SemanticGraph;

// Re-export llm port types
pub use llm::{BudgetedModel, LanguageModel, LlmReply, ScriptedModel, Usage};

// Re-export pipeline types
pub use modify::{ModifyCodeInteractor, PatchApplier};

// Re-export operational types
pub use sre::{DockerCli, OperationalReport, SreLead, TestGenerator};
