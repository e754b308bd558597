//! Dependency manifests and security scanning.
//!
//! Manifest generation infers backend and frontend dependency sets from
//! the source tree (framework detection by substring) and writes pinned
//! manifests; an existing manifest is never overwritten. The security
//! scan is container-first: with Docker and a compose file the audit
//! tools run inside the service containers; with Docker and only a
//! standalone Dockerfile the image is built and audited directly;
//! otherwise the local tools are used. Missing tools are reported as
//! issues, never as failures.

use crate::core::unix_now;
use crate::error::{Result, SreError};
use crate::sre::docker::{
    BUILD_TIMEOUT_SECS, CONTAINER_TEST_TIMEOUT_SECS, DockerCli, IMAGE_CLEANUP_TIMEOUT_SECS,
    has_compose_file, run_bounded, standalone_dockerfile,
};
use crate::sre::{ArchitecturalContext, SystemType};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Pinned versions for backend packages.
fn backend_versions() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("fastapi", "0.109.1"),
        ("uvicorn[standard]", "0.24.0"),
        ("python-multipart", "0.0.18"),
        ("pydantic", "2.5.0"),
        ("sqlalchemy", "2.0.23"),
        ("alembic", "1.13.1"),
        ("python-jose[cryptography]", "3.3.0"),
        ("bcrypt", "4.1.2"),
        ("flask", "3.0.0"),
        ("gunicorn", "21.2.0"),
        ("fastapi-cors", "0.0.6"),
        ("pytest", "7.4.3"),
        ("httpx", "0.25.2"),
    ])
}

/// Pinned versions for frontend packages.
fn frontend_versions() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("react", "^18.2.0"),
        ("react-dom", "^18.2.0"),
        ("axios", "^1.6.0"),
        ("react-router-dom", "^6.18.0"),
        ("@vitejs/plugin-react", "^4.1.0"),
        ("vite", "^4.5.0"),
        ("vitest", "^0.34.0"),
    ])
}

/// Outcome of a manifest-generation run.
#[derive(Debug, Clone, Default)]
pub struct ManifestReport {
    /// Project-relative manifest paths written.
    pub manifests_created: Vec<String>,
    /// Issues encountered (missing directories, write failures).
    pub issues: Vec<String>,
}

/// Outcome of a security scan.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Issue strings, one per finding or tool problem.
    pub issues: Vec<String>,
    /// True when the scan ran inside containers.
    pub container_based: bool,
}

/// Generates manifests and runs dependency security scans.
pub struct DependencyAgent {
    docker: DockerCli,
}

impl DependencyAgent {
    /// Creates an agent with the given docker capability.
    #[must_use]
    pub const fn new(docker: DockerCli) -> Self {
        Self { docker }
    }

    // ==================== Manifest generation ====================

    /// Writes `backend/requirements.txt` and `frontend/package.json` as
    /// the architecture requires. Existing manifests are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error only for filesystem failures creating directories.
    pub fn generate_manifests(
        &self,
        project_root: &Path,
        context: &ArchitecturalContext,
    ) -> Result<ManifestReport> {
        let mut report = ManifestReport::default();
        let fullstack = context.system_type == SystemType::FullstackWebApp;

        if context.has_backend() || fullstack {
            let target = project_root.join("backend/requirements.txt");
            if target.exists() {
                tracing::debug!("backend manifest already present, not overwriting");
            } else {
                let deps = detect_backend_dependencies(project_root);
                std::fs::create_dir_all(project_root.join("backend"))?;
                std::fs::write(&target, render_requirements(&deps))?;
                report
                    .manifests_created
                    .push("backend/requirements.txt".to_string());
            }
        }

        if context.has_frontend() || fullstack {
            let target = project_root.join("frontend/package.json");
            if target.exists() {
                tracing::debug!("frontend manifest already present, not overwriting");
            } else {
                let deps = detect_frontend_dependencies(project_root);
                std::fs::create_dir_all(project_root.join("frontend"))?;
                std::fs::write(&target, render_package_json(&deps))?;
                report
                    .manifests_created
                    .push("frontend/package.json".to_string());
            }
        }

        Ok(report)
    }

    // ==================== Security scan ====================

    /// Runs the dependency security scan, container-first.
    ///
    /// With Docker available, a compose file routes through the service
    /// containers and a standalone Dockerfile through a direct image
    /// build; everything else uses the local tools.
    #[must_use]
    pub fn security_scan(&self, project_root: &Path) -> ScanReport {
        if self.docker.available() {
            if has_compose_file(project_root) {
                let mut report = self.compose_scan(project_root);
                report.container_based = true;
                return report;
            }
            if let Some(dockerfile) = standalone_dockerfile(project_root) {
                let mut report = self.dockerfile_scan(project_root, &dockerfile);
                report.container_based = true;
                return report;
            }
        }
        tracing::info!("falling back to local security scan");
        self.local_scan(project_root)
    }

    /// Builds the compose services and audits inside each container.
    fn compose_scan(&self, project_root: &Path) -> ScanReport {
        let mut report = ScanReport::default();

        match self
            .docker
            .compose(project_root, &["build", "--parallel"], BUILD_TIMEOUT_SECS)
        {
            Ok(out) if out.success => {}
            Ok(out) => {
                report
                    .issues
                    .push(format!("compose build failed: {}", out.detail()));
                return report;
            }
            Err(err) => {
                report.issues.push(format!("compose build error: {err}"));
                return report;
            }
        }

        if service_in_compose(project_root, "backend") {
            match self.docker.compose(
                project_root,
                &[
                    "run", "--rm", "backend", "pip-audit", "--format=json", "--exit-zero",
                ],
                CONTAINER_TEST_TIMEOUT_SECS,
            ) {
                Ok(out) => report
                    .issues
                    .extend(parse_pip_audit("backend", &out.stdout)),
                Err(err) => report.issues.push(format!("backend: pip-audit error: {err}")),
            }
        }

        if service_in_compose(project_root, "frontend") {
            match self.docker.compose(
                project_root,
                &["run", "--rm", "frontend", "npm", "audit", "--json"],
                CONTAINER_TEST_TIMEOUT_SECS,
            ) {
                Ok(out) => report
                    .issues
                    .extend(parse_npm_audit("frontend", &out.stdout)),
                Err(err) => report.issues.push(format!("frontend: npm audit error: {err}")),
            }
        }

        report
    }

    /// Builds a standalone Dockerfile into a throwaway image and audits
    /// inside it. The audit tool follows the base image: pip-audit for
    /// python bases, npm audit for node bases.
    fn dockerfile_scan(&self, project_root: &Path, dockerfile: &Path) -> ScanReport {
        let mut report = ScanReport::default();
        let scope = dockerfile
            .strip_prefix(project_root)
            .unwrap_or(dockerfile)
            .to_string_lossy()
            .replace('\\', "/");
        let context = dockerfile.parent().unwrap_or(project_root);
        let image = format!("dep-scan-{}", unix_now());

        let dockerfile_arg = dockerfile.display().to_string();
        match self.docker.docker(
            context,
            &["build", "-t", &image, "-f", &dockerfile_arg, "."],
            BUILD_TIMEOUT_SECS,
        ) {
            Ok(out) if out.success => {}
            Ok(out) => {
                report
                    .issues
                    .push(format!("{scope}: image build failed: {}", out.detail()));
                return report;
            }
            Err(err) => {
                report.issues.push(format!("{scope}: image build error: {err}"));
                return report;
            }
        }

        let base = std::fs::read_to_string(dockerfile)
            .unwrap_or_default()
            .to_lowercase();
        if base.contains("python") {
            match self.docker.docker(
                project_root,
                &[
                    "run", "--rm", &image, "pip-audit", "--format=json", "--exit-zero",
                ],
                CONTAINER_TEST_TIMEOUT_SECS,
            ) {
                Ok(out) => report.issues.extend(parse_pip_audit(&scope, &out.stdout)),
                Err(err) => report.issues.push(format!("{scope}: pip-audit error: {err}")),
            }
        } else if base.contains("node") {
            match self.docker.docker(
                project_root,
                &["run", "--rm", &image, "npm", "audit", "--json"],
                CONTAINER_TEST_TIMEOUT_SECS,
            ) {
                Ok(out) => report.issues.extend(parse_npm_audit(&scope, &out.stdout)),
                Err(err) => report.issues.push(format!("{scope}: npm audit error: {err}")),
            }
        } else {
            report
                .issues
                .push(format!("{scope}: no audit tool for this base image"));
        }

        let _ = self.docker.docker(
            project_root,
            &["rmi", &image],
            IMAGE_CLEANUP_TIMEOUT_SECS,
        );
        report
    }

    /// Audits with the locally installed tools.
    fn local_scan(&self, project_root: &Path) -> ScanReport {
        let mut report = ScanReport::default();

        let requirements = project_root.join("backend/requirements.txt");
        if requirements.exists() {
            match run_bounded(
                "pip-audit",
                &[
                    "-r",
                    &requirements.display().to_string(),
                    "--format=json",
                    "--exit-zero",
                ],
                Some(project_root),
                CONTAINER_TEST_TIMEOUT_SECS,
            ) {
                Ok(out) => report.issues.extend(parse_pip_audit("local", &out.stdout)),
                Err(SreError::ToolMissing { tool }) => {
                    report
                        .issues
                        .push(format!("{tool} not installed; python scan skipped"));
                }
                Err(err) => report.issues.push(format!("local pip-audit error: {err}")),
            }
        }

        let package_json = project_root.join("frontend/package.json");
        if package_json.exists() {
            match run_bounded(
                "npm",
                &["audit", "--json"],
                Some(&project_root.join("frontend")),
                CONTAINER_TEST_TIMEOUT_SECS,
            ) {
                Ok(out) => report.issues.extend(parse_npm_audit("local", &out.stdout)),
                Err(SreError::ToolMissing { tool }) => {
                    report
                        .issues
                        .push(format!("{tool} not installed; node scan skipped"));
                }
                Err(err) => report.issues.push(format!("local npm audit error: {err}")),
            }
        }

        report
    }
}

/// Scans Python sources for framework usage by substring.
fn detect_backend_dependencies(project_root: &Path) -> BTreeSet<String> {
    let mut deps: BTreeSet<String> = BTreeSet::new();
    for content in read_sources(project_root, &["py"]) {
        let lowered = content.to_lowercase();
        if lowered.contains("fastapi") {
            deps.insert("fastapi".to_string());
            deps.insert("uvicorn[standard]".to_string());
            deps.insert("python-multipart".to_string());
        }
        if lowered.contains("flask") {
            deps.insert("flask".to_string());
            deps.insert("gunicorn".to_string());
        }
        if lowered.contains("pydantic") {
            deps.insert("pydantic".to_string());
        }
        if lowered.contains("sqlalchemy") {
            deps.insert("sqlalchemy".to_string());
            deps.insert("alembic".to_string());
        }
        if lowered.contains("jwt") || lowered.contains("jose") {
            deps.insert("python-jose[cryptography]".to_string());
        }
        if lowered.contains("bcrypt") {
            deps.insert("bcrypt".to_string());
        }
        if lowered.contains("cors") {
            deps.insert("fastapi-cors".to_string());
        }
    }
    // Test dependencies ship regardless of what the scan found.
    deps.insert("pytest".to_string());
    deps.insert("httpx".to_string());
    deps
}

/// Scans JS/JSX sources for React-ecosystem usage.
fn detect_frontend_dependencies(project_root: &Path) -> BTreeSet<String> {
    let mut deps: BTreeSet<String> = BTreeSet::new();
    for content in read_sources(project_root, &["jsx", "js"]) {
        if content.contains("import React")
            || content.contains("useState")
            || content.contains("useEffect")
        {
            deps.insert("react".to_string());
            deps.insert("react-dom".to_string());
        }
        if content.contains("axios") {
            deps.insert("axios".to_string());
        }
        if content.contains("react-router") {
            deps.insert("react-router-dom".to_string());
        }
    }
    if deps.is_empty() {
        deps.insert("react".to_string());
        deps.insert("react-dom".to_string());
    }
    deps
}

/// Reads all sources with the given extensions under the root, skipping
/// dependency directories.
fn read_sources(project_root: &Path, extensions: &[&str]) -> Vec<String> {
    let mut contents = Vec::new();
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
                && let Ok(content) = std::fs::read_to_string(&path)
            {
                contents.push(content);
            }
        }
    }
    contents
}

/// Renders requirements.txt with pins, sorted alphabetically.
fn render_requirements(deps: &BTreeSet<String>) -> String {
    let versions = backend_versions();
    let mut out = String::new();
    for dep in deps {
        match versions.get(dep.as_str()) {
            Some(version) => out.push_str(&format!("{dep}=={version}\n")),
            None => out.push_str(&format!("{dep}\n")),
        }
    }
    out
}

/// Renders package.json with the standard scripts block.
fn render_package_json(deps: &BTreeSet<String>) -> String {
    let versions = frontend_versions();
    let dependencies: serde_json::Map<String, serde_json::Value> = deps
        .iter()
        .map(|dep| {
            let version = versions.get(dep.as_str()).copied().unwrap_or("^1.0.0");
            (dep.clone(), serde_json::Value::String(version.to_string()))
        })
        .collect();
    let dev_dependencies: serde_json::Map<String, serde_json::Value> =
        ["@vitejs/plugin-react", "vite", "vitest"]
            .iter()
            .map(|dep| {
                let version = versions.get(*dep).copied().unwrap_or("^1.0.0");
                ((*dep).to_string(), serde_json::Value::String(version.to_string()))
            })
            .collect();

    let package = serde_json::json!({
        "name": "frontend",
        "version": "0.1.0",
        "type": "module",
        "scripts": {
            "dev": "vite",
            "build": "vite build",
            "preview": "vite preview",
            "test": "vitest",
            "audit": "npm audit --audit-level moderate"
        },
        "dependencies": dependencies,
        "devDependencies": dev_dependencies
    });
    serde_json::to_string_pretty(&package).unwrap_or_default() + "\n"
}

/// True when the compose file declares the named service.
fn service_in_compose(project_root: &Path, service: &str) -> bool {
    std::fs::read_to_string(project_root.join("docker-compose.yml"))
        .map(|content| content.contains(&format!("{service}:")))
        .unwrap_or(false)
}

/// Parses pip-audit JSON into issue strings.
fn parse_pip_audit(scope: &str, output: &str) -> Vec<String> {
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(output) else {
        if output.trim().is_empty() {
            return Vec::new();
        }
        return vec![format!("{scope}: pip-audit output parsing failed")];
    };

    let mut issues = Vec::new();
    let dependencies = parsed
        .get("dependencies")
        .and_then(|d| d.as_array())
        .cloned()
        .unwrap_or_default();
    for dep in dependencies {
        let name = dep.get("name").and_then(|v| v.as_str()).unwrap_or("?");
        let version = dep.get("version").and_then(|v| v.as_str()).unwrap_or("?");
        for vuln in dep
            .get("vulns")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
        {
            let id = vuln.get("id").and_then(|v| v.as_str()).unwrap_or("?");
            let summary = vuln
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or("no summary");
            issues.push(format!("{scope}: {name} ({version}) - {id}: {summary}"));
        }
    }
    issues
}

/// Parses npm audit JSON into issue strings.
fn parse_npm_audit(scope: &str, output: &str) -> Vec<String> {
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(output) else {
        if output.trim().is_empty() {
            return Vec::new();
        }
        return vec![format!("{scope}: npm audit output parsing failed")];
    };

    let mut issues = Vec::new();
    if let Some(vulnerabilities) = parsed.get("vulnerabilities").and_then(|v| v.as_object()) {
        for (package, detail) in vulnerabilities {
            let severity = detail
                .get("severity")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let range = detail.get("range").and_then(|v| v.as_str()).unwrap_or("?");
            issues.push(format!(
                "{scope}: {package} ({range}) - severity: {severity}"
            ));
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn agent() -> DependencyAgent {
        DependencyAgent::new(DockerCli::unavailable())
    }

    #[test]
    fn test_backend_detection_fastapi() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("backend")).unwrap();
        fs::write(
            dir.path().join("backend/main.py"),
            "from fastapi import FastAPI\napp = FastAPI()\n",
        )
        .unwrap();

        let deps = detect_backend_dependencies(dir.path());
        assert!(deps.contains("fastapi"));
        assert!(deps.contains("uvicorn[standard]"));
        assert!(deps.contains("pytest"));
        assert!(deps.contains("httpx"));
    }

    #[test]
    fn test_requirements_rendered_sorted_and_pinned() {
        let deps: BTreeSet<String> =
            ["pytest", "fastapi", "httpx"].iter().map(|s| (*s).to_string()).collect();
        let rendered = render_requirements(&deps);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec!["fastapi==0.109.1", "httpx==0.25.2", "pytest==7.4.3"]
        );
    }

    #[test]
    fn test_package_json_scripts_block() {
        let deps: BTreeSet<String> = ["react"].iter().map(|s| (*s).to_string()).collect();
        let rendered = render_package_json(&deps);
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        for script in ["dev", "build", "preview", "test", "audit"] {
            assert!(parsed["scripts"].get(script).is_some(), "missing {script}");
        }
        assert_eq!(parsed["dependencies"]["react"], "^18.2.0");
        assert!(parsed["devDependencies"].get("vite").is_some());
    }

    #[test]
    fn test_manifests_written_for_fullstack() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("backend")).unwrap();
        fs::write(dir.path().join("backend/main.py"), "from fastapi import FastAPI\n").unwrap();

        let report = agent()
            .generate_manifests(dir.path(), &ArchitecturalContext::fullstack())
            .unwrap();
        assert!(report
            .manifests_created
            .contains(&"backend/requirements.txt".to_string()));
        assert!(report
            .manifests_created
            .contains(&"frontend/package.json".to_string()));
        assert!(dir.path().join("backend/requirements.txt").exists());
    }

    #[test]
    fn test_existing_manifest_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("backend")).unwrap();
        fs::write(dir.path().join("backend/requirements.txt"), "custom==1.0\n").unwrap();

        let report = agent()
            .generate_manifests(dir.path(), &ArchitecturalContext::backend_only())
            .unwrap();
        assert!(report.manifests_created.is_empty());
        assert_eq!(
            fs::read_to_string(dir.path().join("backend/requirements.txt")).unwrap(),
            "custom==1.0\n"
        );
    }

    #[test]
    fn test_parse_pip_audit_findings() {
        let output = serde_json::json!({
            "dependencies": [
                {"name": "fastapi", "version": "0.100.0", "vulns": [
                    {"id": "PYSEC-2024-38", "description": "ReDoS in multipart parsing"}
                ]},
                {"name": "httpx", "version": "0.25.2", "vulns": []}
            ]
        })
        .to_string();
        let issues = parse_pip_audit("backend", &output);
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0],
            "backend: fastapi (0.100.0) - PYSEC-2024-38: ReDoS in multipart parsing"
        );
    }

    #[test]
    fn test_parse_pip_audit_garbage() {
        let issues = parse_pip_audit("backend", "not json");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("parsing failed"));
        assert!(parse_pip_audit("backend", "").is_empty());
    }

    #[test]
    fn test_parse_npm_audit_findings() {
        let output = serde_json::json!({
            "vulnerabilities": {
                "axios": {"severity": "high", "range": "<1.6.0"}
            }
        })
        .to_string();
        let issues = parse_npm_audit("frontend", &output);
        assert_eq!(issues, vec!["frontend: axios (<1.6.0) - severity: high"]);
    }

    #[test]
    fn test_local_scan_missing_tools_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("backend")).unwrap();
        fs::write(dir.path().join("backend/requirements.txt"), "fastapi==0.109.1\n").unwrap();

        let report = agent().security_scan(dir.path());
        assert!(!report.container_based);
        // Whatever the host has installed, the scan returns a report.
        let _ = report.issues;
    }

    #[test]
    fn test_bare_dockerfile_without_docker_scans_locally() {
        // A standalone Dockerfile (the non-fullstack shape the docker
        // config agent produces) must not route through compose.
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("backend")).unwrap();
        fs::write(dir.path().join("backend/Dockerfile"), "FROM python:3.11-slim\n").unwrap();
        fs::write(dir.path().join("backend/requirements.txt"), "fastapi==0.109.1\n").unwrap();

        let report = agent().security_scan(dir.path());
        assert!(!report.container_based);
        assert!(!report.issues.iter().any(|i| i.contains("compose")));
    }

    #[test]
    fn test_frontend_detection_defaults_to_react() {
        let dir = tempfile::tempdir().unwrap();
        let deps = detect_frontend_dependencies(dir.path());
        assert!(deps.contains("react"));
        assert!(deps.contains("react-dom"));
    }
}
