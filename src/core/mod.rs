//! Core domain types shared across the pipeline.

mod artifacts;
mod chunk;
mod request;

pub use artifacts::{
    AnalysisResult, CheckStat, CodeQuality, DependencyAnalysis, DocumentationUpdate, FilePayload,
    ModificationPlan, ModifyOutcome, Patch, PatchSummary, RippleEntry, RiskAssessment,
    ValidationReport,
};
pub use chunk::{Chunk, ChunkKind, FileMetadata, KnowledgeChunk, sha256_hex, unix_now};
pub use request::{Action, ModificationRequest, ModificationStep, UserPrompt};
