//! SRE operational pipeline.
//!
//! Runs after a patch lands: dependency manifests, docker configuration,
//! container-aware testing and security scanning, and version-control
//! readiness, aggregated into one operational report.

pub mod dependency;
pub mod docker;
pub mod docker_config;
pub mod lead;
pub mod sandbox;
pub mod testgen;

pub use dependency::{DependencyAgent, ManifestReport, ScanReport};
pub use docker::{DockerCli, has_compose_file, has_docker_configuration, standalone_dockerfile};
pub use docker_config::DockerConfigAgent;
pub use lead::{DockerPipeline, OperationalReport, OperationalSummary, PhaseResult, SreLead};
pub use sandbox::{SandboxAgent, SandboxReport, detect_project_language};
pub use testgen::TestGenerator;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Coarse classification of the project's architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemType {
    /// Backend and frontend modules present.
    FullstackWebApp,
    /// Frontend only.
    FrontendApp,
    /// Backend only.
    BackendApp,
    /// Nothing recognizable.
    Unknown,
}

/// One module of the architectural context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Languages the module is written in.
    pub languages: Vec<String>,
    /// Responsibilities, free-form.
    pub responsibilities: Vec<String>,
}

/// Architectural context driving manifest and docker generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitecturalContext {
    /// System classification.
    pub system_type: SystemType,
    /// Modules keyed by name ("backend", "frontend").
    pub modules: BTreeMap<String, ModuleInfo>,
}

impl ArchitecturalContext {
    /// A fullstack context with backend and frontend modules.
    #[must_use]
    pub fn fullstack() -> Self {
        let mut modules = BTreeMap::new();
        modules.insert(
            "backend".to_string(),
            ModuleInfo {
                languages: vec!["python".to_string()],
                responsibilities: vec!["API endpoints".to_string(), "business logic".to_string()],
            },
        );
        modules.insert(
            "frontend".to_string(),
            ModuleInfo {
                languages: vec!["javascript".to_string()],
                responsibilities: vec!["user interface".to_string()],
            },
        );
        Self {
            system_type: SystemType::FullstackWebApp,
            modules,
        }
    }

    /// A backend-only context.
    #[must_use]
    pub fn backend_only() -> Self {
        let mut modules = BTreeMap::new();
        modules.insert(
            "backend".to_string(),
            ModuleInfo {
                languages: vec!["python".to_string()],
                responsibilities: vec!["API endpoints".to_string()],
            },
        );
        Self {
            system_type: SystemType::BackendApp,
            modules,
        }
    }

    /// True when a backend module is declared.
    #[must_use]
    pub fn has_backend(&self) -> bool {
        self.modules.contains_key("backend")
    }

    /// True when a frontend module is declared.
    #[must_use]
    pub fn has_frontend(&self) -> bool {
        self.modules.contains_key("frontend")
    }
}

/// Classifies a project tree into an architectural context.
#[must_use]
pub fn analyze_architecture(project_root: &Path) -> ArchitecturalContext {
    let has_backend = tree_has_extension(project_root, &["py"])
        || project_root.join("backend").is_dir();
    let has_frontend = tree_has_extension(project_root, &["jsx", "tsx", "js", "ts"])
        || project_root.join("frontend").is_dir();

    let system_type = match (has_backend, has_frontend) {
        (true, true) => SystemType::FullstackWebApp,
        (true, false) => SystemType::BackendApp,
        (false, true) => SystemType::FrontendApp,
        (false, false) => SystemType::Unknown,
    };

    let mut modules = BTreeMap::new();
    if has_backend {
        modules.insert(
            "backend".to_string(),
            ModuleInfo {
                languages: vec!["python".to_string()],
                responsibilities: vec!["API endpoints".to_string(), "business logic".to_string()],
            },
        );
    }
    if has_frontend {
        modules.insert(
            "frontend".to_string(),
            ModuleInfo {
                languages: vec!["javascript".to_string(), "typescript".to_string()],
                responsibilities: vec![
                    "user interface".to_string(),
                    "client-side logic".to_string(),
                ],
            },
        );
    }

    ArchitecturalContext {
        system_type,
        modules,
    }
}

/// True when any file under the root (vendored dirs skipped) carries one
/// of the extensions.
fn tree_has_extension(project_root: &Path, extensions: &[&str]) -> bool {
    let mut stack = vec![project_root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if path.is_dir() {
                if !crate::index::SKIP_DIRS.contains(&name.as_str()) {
                    stack.push(path);
                }
            } else if path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .is_some_and(|ext| extensions.contains(&ext.as_str()))
            {
                return true;
            }
        }
    }
    false
}
