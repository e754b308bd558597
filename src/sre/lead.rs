//! SRE lead: sequences the operational pipeline.
//!
//! Five phases run in order over the mutated tree: dependency manifests,
//! docker configuration, container testing, container-aware security
//! scanning, and version-control readiness. Each phase yields a pass
//! flag, created files, and issues; the lead aggregates them into the
//! operational report. A phase error never aborts the pipeline; it marks
//! the phase failed and the run continues.

use crate::error::Result;
use crate::sre::dependency::DependencyAgent;
use crate::sre::docker::DockerCli;
use crate::sre::docker_config::DockerConfigAgent;
use crate::sre::sandbox::SandboxAgent;
use crate::sre::{ArchitecturalContext, analyze_architecture};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One phase's outcome inside the operational report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseResult {
    /// True when the phase completed without issues.
    pub passed: bool,
    /// Project-relative files the phase created.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_created: Vec<String>,
    /// Issues the phase raised.
    pub issues: Vec<String>,
}

/// Aggregate counters of the operational report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationalSummary {
    /// Total issues across all phases.
    pub total_issues: usize,
    /// True when every phase passed.
    pub deployment_ready: bool,
    /// True when manifests and docker configs both passed.
    pub docker_ready: bool,
    /// `"k/n"` where k phases passed out of n.
    pub operational_score: String,
}

/// Docker pipeline status block of the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerPipeline {
    /// Manifests written this run.
    pub manifests_generated: Vec<String>,
    /// Docker config files written this run.
    pub docker_configs_created: Vec<String>,
    /// True when tests ran inside containers.
    pub container_tests_run: bool,
    /// True when the security scan ran inside containers.
    pub container_security_scanned: bool,
}

/// The consolidated operational report (surface API of the pipeline).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationalReport {
    /// True when every phase passed.
    pub passed: bool,
    /// All issues, in phase order.
    pub issues: Vec<String>,
    /// Per-phase results keyed by phase name.
    pub check_results: BTreeMap<String, PhaseResult>,
    /// Aggregate counters.
    pub summary: OperationalSummary,
    /// Docker pipeline status.
    pub docker_pipeline: DockerPipeline,
}

/// Sequences the operational phases and aggregates the report.
pub struct SreLead {
    docker: DockerCli,
    dependency: DependencyAgent,
    docker_config: DockerConfigAgent,
    sandbox: SandboxAgent,
}

impl SreLead {
    /// Phase names, in execution order.
    pub const PHASES: [&'static str; 5] = [
        "manifest_generation",
        "docker_configuration",
        "container_testing",
        "container_security",
        "version_control",
    ];

    /// Builds the team around one docker capability probe. The lead owns
    /// its members; members hold no pointer back.
    #[must_use]
    pub fn new(docker: DockerCli) -> Self {
        Self {
            dependency: DependencyAgent::new(docker.clone()),
            docker_config: DockerConfigAgent::new(),
            sandbox: SandboxAgent::new(docker.clone()),
            docker,
        }
    }

    /// Builds the team with a fresh docker probe.
    #[must_use]
    pub fn probe() -> Self {
        Self::new(DockerCli::probe())
    }

    /// Runs all phases over the project and aggregates the report.
    ///
    /// # Errors
    ///
    /// Returns an error only when the project root is unusable; phase
    /// failures are recorded in the report.
    pub fn validate_changes(&self, project_root: &Path) -> Result<OperationalReport> {
        let context = analyze_architecture(project_root);
        tracing::info!(system_type = ?context.system_type, "starting operational pipeline");

        let mut report = OperationalReport::default();
        let mut pipeline = DockerPipeline::default();

        // Phase 1: dependency manifests.
        let manifests = self.run_manifest_phase(project_root, &context);
        pipeline.manifests_generated = manifests.files_created.clone();
        report
            .check_results
            .insert("manifest_generation".to_string(), manifests);

        // Phase 2: docker configuration.
        let configs = self.run_docker_config_phase(project_root, &context);
        pipeline.docker_configs_created = configs.files_created.clone();
        report
            .check_results
            .insert("docker_configuration".to_string(), configs);

        // Phase 3: container testing.
        let sandbox_report = self.sandbox.run(project_root);
        pipeline.container_tests_run = sandbox_report.container_based;
        report.check_results.insert(
            "container_testing".to_string(),
            PhaseResult {
                passed: sandbox_report.passed,
                files_created: Vec::new(),
                issues: sandbox_report.issues,
            },
        );

        // Phase 4: container-aware security scan.
        let scan = self.dependency.security_scan(project_root);
        pipeline.container_security_scanned = scan.container_based;
        report.check_results.insert(
            "container_security".to_string(),
            PhaseResult {
                // Tool-availability notes are informational; findings are
                // reported but do not block deployment readiness here.
                passed: true,
                files_created: Vec::new(),
                issues: scan.issues,
            },
        );

        // Phase 5: version-control readiness. A missing repository is
        // noted, never blocking.
        report.check_results.insert(
            "version_control".to_string(),
            Self::version_control_phase(project_root),
        );

        // Aggregate.
        let passed_count = report.check_results.values().filter(|r| r.passed).count();
        let total = report.check_results.len();
        for phase in Self::PHASES {
            if let Some(result) = report.check_results.get(phase) {
                report.issues.extend(result.issues.iter().cloned());
            }
        }
        report.passed = passed_count == total;
        report.summary = OperationalSummary {
            total_issues: report.issues.len(),
            deployment_ready: report.passed,
            docker_ready: report.check_results.get("manifest_generation").is_some_and(|r| r.passed)
                && report
                    .check_results
                    .get("docker_configuration")
                    .is_some_and(|r| r.passed),
            operational_score: format!("{passed_count}/{total}"),
        };
        report.docker_pipeline = pipeline;

        tracing::info!(
            score = %report.summary.operational_score,
            deployment_ready = report.summary.deployment_ready,
            "operational pipeline complete"
        );
        Ok(report)
    }

    fn run_manifest_phase(
        &self,
        project_root: &Path,
        context: &ArchitecturalContext,
    ) -> PhaseResult {
        match self.dependency.generate_manifests(project_root, context) {
            Ok(manifest_report) => PhaseResult {
                passed: manifest_report.issues.is_empty(),
                files_created: manifest_report.manifests_created,
                issues: manifest_report.issues,
            },
            Err(err) => PhaseResult {
                passed: false,
                files_created: Vec::new(),
                issues: vec![format!("manifest generation failed: {err}")],
            },
        }
    }

    fn run_docker_config_phase(
        &self,
        project_root: &Path,
        context: &ArchitecturalContext,
    ) -> PhaseResult {
        match self.docker_config.generate(project_root, context) {
            Ok(created) => PhaseResult {
                passed: true,
                files_created: created,
                issues: Vec::new(),
            },
            Err(err) => PhaseResult {
                passed: false,
                files_created: Vec::new(),
                issues: vec![format!("docker configuration failed: {err}")],
            },
        }
    }

    fn version_control_phase(project_root: &Path) -> PhaseResult {
        let git_dir = project_root.join(".git");
        if git_dir.exists() {
            tracing::debug!("git repository detected");
        } else {
            tracing::debug!("no git repository detected (not blocking)");
        }
        PhaseResult {
            passed: true,
            files_created: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// Returns the docker capability handle used by the team.
    #[must_use]
    pub const fn docker(&self) -> &DockerCli {
        &self.docker
    }

    /// Optional phase: generates unit tests for sources that lack them
    /// and writes the new test files into the tree.
    ///
    /// Returns the project-relative test files written.
    ///
    /// # Errors
    ///
    /// Returns an error if a generated file cannot be written.
    pub fn generate_missing_tests(
        &self,
        project_root: &Path,
        model: &dyn crate::llm::LanguageModel,
    ) -> Result<Vec<String>> {
        let mut code_map = BTreeMap::new();
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
                    continue;
                }
                let rel = path
                    .strip_prefix(project_root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                if crate::sre::testgen::language_for(&rel).is_some()
                    && let Ok(content) = std::fs::read_to_string(&path)
                {
                    code_map.insert(rel, content);
                }
            }
        }

        let generated = crate::sre::testgen::TestGenerator::new().generate(&code_map, model);
        let mut written = Vec::with_capacity(generated.len());
        for (rel, content) in generated {
            let target = project_root.join(&rel);
            if target.exists() {
                continue;
            }
            std::fs::write(&target, content)?;
            written.push(rel);
        }
        Ok(written)
    }
}
