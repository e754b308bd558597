//! Sandbox execution of project tests.
//!
//! Container mode is preferred when Docker is available: a compose file
//! routes through `compose build` plus per-service test runs in fresh
//! ephemeral containers (torn down on both success and failure, with the
//! professional-pattern checklist on top), while a standalone Dockerfile
//! is built into a throwaway image and tested directly. Local mode
//! sweeps Python sources with a compile check and runs
//! `unittest discover` with a 60-second bound; non-Python projects are
//! skipped as passing.

use crate::core::unix_now;
use crate::sre::docker::{
    BUILD_TIMEOUT_SECS, CONTAINER_TEST_TIMEOUT_SECS, DockerCli, IMAGE_CLEANUP_TIMEOUT_SECS,
    has_compose_file, run_bounded, standalone_dockerfile,
};
use std::path::{Path, PathBuf};

/// Time bound for local test runs, in seconds.
pub const LOCAL_TEST_TIMEOUT_SECS: u64 = 60;

/// Outcome of one sandbox run.
#[derive(Debug, Clone, Default)]
pub struct SandboxReport {
    /// True when every check passed.
    pub passed: bool,
    /// Failure messages.
    pub issues: Vec<String>,
    /// True when the run used containers.
    pub container_based: bool,
    /// Detected primary language.
    pub language: String,
    /// Human-readable summary.
    pub message: String,
}

/// Runs syntax checks and tests, in containers when possible.
pub struct SandboxAgent {
    docker: DockerCli,
}

impl SandboxAgent {
    /// Creates a sandbox agent with the given docker capability.
    #[must_use]
    pub const fn new(docker: DockerCli) -> Self {
        Self { docker }
    }

    /// Runs the sandbox for a project.
    #[must_use]
    pub fn run(&self, project_root: &Path) -> SandboxReport {
        let language = detect_project_language(project_root);

        if self.docker.available() {
            if has_compose_file(project_root) {
                tracing::info!("running compose-based validation");
                return self.run_in_containers(project_root, &language);
            }
            if let Some(dockerfile) = standalone_dockerfile(project_root) {
                tracing::info!("running standalone-image validation");
                return self.run_with_dockerfile(project_root, &dockerfile, &language);
            }
        }
        tracing::info!("running local validation");
        self.run_locally(project_root, &language)
    }

    /// Container mode: build, test per service, pattern checks, teardown.
    fn run_in_containers(&self, project_root: &Path, language: &str) -> SandboxReport {
        let mut report = SandboxReport {
            container_based: true,
            language: language.to_string(),
            ..SandboxReport::default()
        };

        let outcome = self.compose_test_cycle(project_root, &mut report);
        // Teardown runs on success and failure alike.
        let _ = self.docker.compose(
            project_root,
            &["down", "--volumes", "--remove-orphans"],
            BUILD_TIMEOUT_SECS,
        );

        if !outcome {
            report.passed = false;
            if report.message.is_empty() {
                report.message = "container tests failed".to_string();
            }
            return report;
        }

        let pattern_issues = professional_pattern_issues(project_root, &self.docker);
        if pattern_issues.is_empty() {
            report.passed = true;
            report.message.push_str("; professional patterns validated");
        } else {
            report.passed = false;
            report
                .message
                .push_str("; professional pattern issues found");
            report.issues.extend(pattern_issues);
        }
        report
    }

    /// Builds and tests each compose service. Returns false on failure.
    fn compose_test_cycle(&self, project_root: &Path, report: &mut SandboxReport) -> bool {
        match self
            .docker
            .compose(project_root, &["build", "--parallel"], BUILD_TIMEOUT_SECS)
        {
            Ok(out) if out.success => {}
            Ok(out) => {
                report
                    .issues
                    .push(format!("compose build failed: {}", out.detail()));
                return false;
            }
            Err(err) => {
                report.issues.push(format!("compose build error: {err}"));
                return false;
            }
        }

        let mut messages = Vec::new();
        for (service, test_command) in [
            ("backend", vec!["python", "-m", "pytest", "-v", "--tb=short"]),
            ("frontend", vec!["npm", "test", "--", "--watchAll=false"]),
        ] {
            if !service_in_compose(project_root, service) {
                continue;
            }
            let container_name = format!("test-{service}-{}", unix_now());
            let mut args = vec!["run", "--rm", "--name", container_name.as_str(), service];
            args.extend(test_command.iter().copied());

            match self
                .docker
                .compose(project_root, &args, CONTAINER_TEST_TIMEOUT_SECS)
            {
                Ok(out) if out.success => messages.push(format!("{service}: tests passed")),
                Ok(out) => {
                    let mut detail = out.detail();
                    detail.truncate(200);
                    report.issues.push(format!("{service}: tests failed: {detail}"));
                }
                Err(err) => {
                    report.issues.push(format!("{service}: test error: {err}"));
                }
            }
        }

        report.message = messages.join("; ");
        report.issues.is_empty()
    }

    /// Builds a standalone Dockerfile into a throwaway image and runs
    /// the language-appropriate test command inside it.
    fn run_with_dockerfile(
        &self,
        project_root: &Path,
        dockerfile: &Path,
        language: &str,
    ) -> SandboxReport {
        let mut report = SandboxReport {
            container_based: true,
            language: language.to_string(),
            ..SandboxReport::default()
        };
        let scope = dockerfile
            .strip_prefix(project_root)
            .unwrap_or(dockerfile)
            .to_string_lossy()
            .replace('\\', "/");
        let context = dockerfile.parent().unwrap_or(project_root);
        let image = format!("sandbox-test-{language}-{}", unix_now());
        let dockerfile_arg = dockerfile.display().to_string();

        match self.docker.docker(
            context,
            &["build", "-t", &image, "-f", &dockerfile_arg, "."],
            BUILD_TIMEOUT_SECS,
        ) {
            Ok(out) if out.success => {}
            Ok(out) => {
                report.passed = false;
                report.message = "image build failed".to_string();
                report
                    .issues
                    .push(format!("{scope}: image build failed: {}", out.detail()));
                return report;
            }
            Err(err) => {
                report.passed = false;
                report.message = "image build error".to_string();
                report.issues.push(format!("{scope}: image build error: {err}"));
                return report;
            }
        }

        let command: &[&str] = match language {
            "python" => &["python", "-m", "unittest", "discover", "-v"],
            "javascript" => &["npm", "test"],
            "go" => &["go", "test", "./..."],
            "java" => &["mvn", "test"],
            _ => &[],
        };
        if command.is_empty() {
            report.passed = true;
            report.message = format!("no container test command for {language}");
        } else {
            let mut args = vec!["run", "--rm", image.as_str()];
            args.extend_from_slice(command);
            match self
                .docker
                .docker(project_root, &args, CONTAINER_TEST_TIMEOUT_SECS)
            {
                Ok(out) if out.success => {
                    report.passed = true;
                    report.message = format!("{language} tests passed in container");
                }
                Ok(out) => {
                    report.passed = false;
                    let mut detail = out.detail();
                    detail.truncate(200);
                    report.issues.push(format!("container tests failed: {detail}"));
                    report.message = "container tests failed".to_string();
                }
                Err(err) => {
                    report.passed = false;
                    report.issues.push(format!("container test error: {err}"));
                    report.message = "container test error".to_string();
                }
            }
        }

        let _ = self
            .docker
            .docker(project_root, &["rmi", &image], IMAGE_CLEANUP_TIMEOUT_SECS);
        report
    }

    /// Local mode: Python compile sweep plus `unittest discover`.
    fn run_locally(&self, project_root: &Path, language: &str) -> SandboxReport {
        let mut report = SandboxReport {
            container_based: false,
            language: language.to_string(),
            ..SandboxReport::default()
        };

        if language != "python" {
            report.passed = true;
            report.message = format!("local checks skipped for {language}");
            return report;
        }

        match python_syntax_sweep(project_root) {
            Ok(checked) => {
                report.message = format!("syntax OK for {checked} file(s)");
            }
            Err(issues) => {
                report.passed = false;
                report.message = "syntax check failed".to_string();
                report.issues = issues;
                return report;
            }
        }

        let has_tests = collect_files(project_root, "py")
            .iter()
            .any(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with("test"))
                    .unwrap_or(false)
            });
        if !has_tests {
            report.passed = true;
            report.message.push_str("; no test files found");
            return report;
        }

        match run_bounded(
            "python3",
            &["-m", "unittest", "discover", "-s", ".", "-p", "test*.py"],
            Some(project_root),
            LOCAL_TEST_TIMEOUT_SECS,
        ) {
            Ok(out) if out.success => {
                report.passed = true;
                report.message.push_str("; unit tests passed");
            }
            Ok(out) => {
                report.passed = false;
                let mut detail = out.detail();
                detail.truncate(200);
                report.issues.push(format!("unit tests failed: {detail}"));
                report.message.push_str("; unit tests failed");
            }
            Err(err) => {
                // A missing interpreter is reported, not fatal.
                if matches!(err, crate::error::SreError::ToolMissing { .. }) {
                    report.passed = true;
                    report.message.push_str("; python3 not found, tests skipped");
                } else {
                    report.passed = false;
                    report.issues.push(format!("unit test run error: {err}"));
                }
            }
        }
        report
    }
}

/// Detects the primary project language by file census.
#[must_use]
pub fn detect_project_language(project_root: &Path) -> String {
    for (ext, language) in [
        ("py", "python"),
        ("ts", "javascript"),
        ("tsx", "javascript"),
        ("js", "javascript"),
        ("jsx", "javascript"),
        ("go", "go"),
        ("java", "java"),
    ] {
        if !collect_files(project_root, ext).is_empty() {
            return language.to_string();
        }
    }
    "python".to_string()
}

/// Recursively collects files with an extension, skipping vendored dirs.
fn collect_files(project_root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
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
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
            {
                found.push(path);
            }
        }
    }
    found
}

/// Compile-checks every Python file via `python3 -m py_compile`.
///
/// Returns the number checked, or the failure list. A missing
/// interpreter counts as zero files checked, not as a failure.
fn python_syntax_sweep(project_root: &Path) -> std::result::Result<usize, Vec<String>> {
    let files = collect_files(project_root, "py");
    if files.is_empty() {
        return Ok(0);
    }

    let mut issues = Vec::new();
    let mut checked = 0usize;
    for file in &files {
        let arg = file.display().to_string();
        match run_bounded(
            "python3",
            &["-m", "py_compile", &arg],
            Some(project_root),
            LOCAL_TEST_TIMEOUT_SECS,
        ) {
            Ok(out) if out.success => checked += 1,
            Ok(out) => {
                let rel = file.strip_prefix(project_root).unwrap_or(file);
                issues.push(format!("{}: {}", rel.display(), out.detail()));
            }
            Err(crate::error::SreError::ToolMissing { .. }) => return Ok(0),
            Err(err) => issues.push(format!("{}: {err}", file.display())),
        }
    }

    if issues.is_empty() { Ok(checked) } else { Err(issues) }
}

/// True when the compose file declares the named service.
fn service_in_compose(project_root: &Path, service: &str) -> bool {
    std::fs::read_to_string(project_root.join("docker-compose.yml"))
        .map(|content| content.contains(&format!("{service}:")))
        .unwrap_or(false)
}

/// The production-readiness checklist validated in container mode.
#[must_use]
pub fn professional_pattern_issues(project_root: &Path, docker: &DockerCli) -> Vec<String> {
    let mut issues = Vec::new();

    // 1. File structure: no App.js/App.jsx conflict, expected layout.
    let app_js = project_root.join("frontend/src/App.js");
    let app_jsx = project_root.join("frontend/src/App.jsx");
    if app_js.exists() && app_jsx.exists() {
        issues.push("both App.js and App.jsx exist".to_string());
    }
    for expected in ["backend/main.py", "frontend/package.json", "docker-compose.yml"] {
        if !project_root.join(expected).exists() {
            issues.push(format!("missing expected file: {expected}"));
        }
    }

    // 2. Compose configuration validates.
    if project_root.join("docker-compose.yml").exists() {
        match docker.compose(project_root, &["config"], 30) {
            Ok(out) if out.success => {}
            Ok(out) => issues.push(format!("compose config invalid: {}", out.detail())),
            Err(err) => issues.push(format!("compose config check error: {err}")),
        }

        // 3. Health checks and startup ordering configured.
        if let Ok(compose) = std::fs::read_to_string(project_root.join("docker-compose.yml")) {
            if !compose.contains("healthcheck") {
                issues.push("no healthcheck configured".to_string());
            }
            if !compose.contains("depends_on") {
                issues.push("no depends_on configured".to_string());
            }
        }
    }

    // 4. CORS middleware present in the backend.
    if let Ok(main) = std::fs::read_to_string(project_root.join("backend/main.py"))
        && !main.contains("CORSMiddleware")
    {
        issues.push("no CORS middleware in backend".to_string());
    }

    // 5. Frontend talks to the API.
    if let Ok(app) = std::fs::read_to_string(&app_jsx) {
        if !app.contains("fetch(") {
            issues.push("no fetch calls in frontend".to_string());
        }
        if !app.contains("/api/") {
            issues.push("no /api/ endpoint calls in frontend".to_string());
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_detect_language_python() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();
        assert_eq!(detect_project_language(dir.path()), "python");
    }

    #[test]
    fn test_detect_language_javascript() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.js"), "const x = 1;\n").unwrap();
        assert_eq!(detect_project_language(dir.path()), "javascript");
    }

    #[test]
    fn test_local_mode_non_python_skipped_as_pass() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.go"), "package main\n").unwrap();

        let report = SandboxAgent::new(DockerCli::unavailable()).run(dir.path());
        assert!(report.passed);
        assert!(!report.container_based);
        assert!(report.message.contains("skipped"));
    }

    #[test]
    fn test_bare_dockerfile_without_docker_falls_back_to_local() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("backend")).unwrap();
        fs::write(dir.path().join("backend/Dockerfile"), "FROM python:3.11-slim\n").unwrap();
        fs::write(dir.path().join("backend/main.py"), "x = 1\n").unwrap();

        let report = SandboxAgent::new(DockerCli::unavailable()).run(dir.path());
        assert!(!report.container_based);
        assert!(!report.issues.iter().any(|i| i.contains("compose")));
    }

    #[test]
    fn test_local_mode_python_without_tests() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "def f():\n    return 1\n").unwrap();

        let report = SandboxAgent::new(DockerCli::unavailable()).run(dir.path());
        // Passes whether or not a python3 interpreter exists on the host.
        assert!(report.passed);
        assert_eq!(report.language, "python");
    }

    #[test]
    fn test_pattern_checks_flag_missing_layout() {
        let dir = tempfile::tempdir().unwrap();
        let issues = professional_pattern_issues(dir.path(), &DockerCli::unavailable());
        assert!(issues.iter().any(|i| i.contains("backend/main.py")));
        assert!(issues.iter().any(|i| i.contains("frontend/package.json")));
        assert!(issues.iter().any(|i| i.contains("docker-compose.yml")));
    }

    #[test]
    fn test_pattern_checks_app_conflict() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("frontend/src")).unwrap();
        fs::write(dir.path().join("frontend/src/App.js"), "old\n").unwrap();
        fs::write(dir.path().join("frontend/src/App.jsx"), "new\n").unwrap();

        let issues = professional_pattern_issues(dir.path(), &DockerCli::unavailable());
        assert!(issues.iter().any(|i| i.contains("App.js and App.jsx")));
    }

    #[test]
    fn test_pattern_checks_cors_and_api_wiring() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("backend")).unwrap();
        fs::create_dir_all(dir.path().join("frontend/src")).unwrap();
        fs::write(
            dir.path().join("backend/main.py"),
            "from fastapi import FastAPI\napp = FastAPI()\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("frontend/src/App.jsx"),
            "const App = () => <div/>;\n",
        )
        .unwrap();

        let issues = professional_pattern_issues(dir.path(), &DockerCli::unavailable());
        assert!(issues.iter().any(|i| i.contains("CORS")));
        assert!(issues.iter().any(|i| i.contains("fetch")));
        assert!(issues.iter().any(|i| i.contains("/api/")));
    }

    #[test]
    fn test_pattern_checks_clean_fullstack() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("backend")).unwrap();
        fs::create_dir_all(dir.path().join("frontend/src")).unwrap();
        fs::write(
            dir.path().join("backend/main.py"),
            "from fastapi.middleware.cors import CORSMiddleware\n",
        )
        .unwrap();
        fs::write(dir.path().join("frontend/package.json"), "{}\n").unwrap();
        fs::write(
            dir.path().join("frontend/src/App.jsx"),
            "fetch('/api/items')\n",
        )
        .unwrap();
        // No compose file: only that check family fires.
        let issues = professional_pattern_issues(dir.path(), &DockerCli::unavailable());
        assert_eq!(issues, vec!["missing expected file: docker-compose.yml"]);
    }
}
