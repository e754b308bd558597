//! Docker CLI capability wrapper.
//!
//! All container interaction goes through this wrapper: it probes for a
//! usable daemon, prefers the `docker compose` form and falls back to
//! `docker-compose` when the plugin form is missing, and time-bounds
//! every invocation. Subprocesses run with the project root as their
//! working directory.

use crate::error::SreError;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Time bound for availability probes, in seconds.
pub const PROBE_TIMEOUT_SECS: u64 = 10;

/// Time bound for container builds, in seconds.
pub const BUILD_TIMEOUT_SECS: u64 = 300;

/// Time bound for container test runs, in seconds.
pub const CONTAINER_TEST_TIMEOUT_SECS: u64 = 120;

/// Time bound for throwaway-image cleanup, in seconds.
pub const IMAGE_CLEANUP_TIMEOUT_SECS: u64 = 30;

/// Captured output of one bounded subprocess run.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// True when the process exited with status zero.
    pub success: bool,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns stderr if non-empty, else stdout, trimmed.
    #[must_use]
    pub fn detail(&self) -> String {
        let err = self.stderr.trim();
        if err.is_empty() {
            self.stdout.trim().to_string()
        } else {
            err.to_string()
        }
    }
}

/// Runs a command with a hard time bound, capturing output.
///
/// # Errors
///
/// `ToolMissing` when the executable is absent, `Timeout` when the bound
/// elapses (the process is killed), `CommandFailed` for spawn errors.
pub fn run_bounded(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout_secs: u64,
) -> Result<CommandOutput, SreError> {
    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let mut child = command.spawn().map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            SreError::ToolMissing {
                tool: program.to_string(),
            }
        } else {
            SreError::CommandFailed {
                tool: program.to_string(),
                detail: err.to_string(),
            }
        }
    })?;

    // Drain pipes on their own threads so a chatty child cannot block on
    // a full pipe while we wait.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_thread = std::thread::spawn(move || read_all(stdout));
    let stderr_thread = std::thread::spawn(move || read_all(stderr));

    let tool = format!("{program} {}", args.join(" "));
    let status = child
        .wait_timeout(Duration::from_secs(timeout_secs))
        .map_err(|err| SreError::CommandFailed {
            tool: tool.clone(),
            detail: err.to_string(),
        })?;

    let Some(status) = status else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(SreError::Timeout {
            tool,
            seconds: timeout_secs,
        });
    };

    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();
    Ok(CommandOutput {
        success: status.success(),
        stdout,
        stderr,
    })
}

fn read_all<R: Read>(source: Option<R>) -> String {
    let mut buffer = String::new();
    if let Some(mut source) = source {
        let mut bytes = Vec::new();
        if source.read_to_end(&mut bytes).is_ok() {
            buffer = String::from_utf8_lossy(&bytes).to_string();
        }
    }
    buffer
}

/// Which compose CLI form the host accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComposeForm {
    /// `docker compose <cmd>` (plugin form).
    Plugin,
    /// `docker-compose <cmd>` (standalone binary).
    Standalone,
}

/// Probed Docker capability handle.
#[derive(Debug, Clone)]
pub struct DockerCli {
    available: bool,
}

impl DockerCli {
    /// Probes the host for a usable Docker daemon.
    #[must_use]
    pub fn probe() -> Self {
        let available = run_bounded("docker", &["--version"], None, PROBE_TIMEOUT_SECS)
            .map(|out| out.success)
            .unwrap_or(false)
            && run_bounded("docker", &["info"], None, PROBE_TIMEOUT_SECS)
                .map(|out| out.success)
                .unwrap_or(false);
        if available {
            tracing::info!("docker daemon available");
        } else {
            tracing::info!("docker unavailable, container phases will fall back");
        }
        Self { available }
    }

    /// Creates a handle with forced availability (tests only).
    #[must_use]
    pub const fn unavailable() -> Self {
        Self { available: false }
    }

    /// True when the daemon answered the probe.
    #[must_use]
    pub const fn available(&self) -> bool {
        self.available
    }

    /// Runs a compose subcommand, trying `docker compose` first and
    /// falling back to `docker-compose` when the plugin form is missing.
    ///
    /// # Errors
    ///
    /// Propagates `Timeout` and `CommandFailed`; `ToolMissing` only when
    /// both forms are absent.
    pub fn compose(
        &self,
        project_root: &Path,
        args: &[&str],
        timeout_secs: u64,
    ) -> Result<CommandOutput, SreError> {
        self.compose_with(project_root, args, timeout_secs, ComposeForm::Plugin)
            .or_else(|err| {
                if matches!(err, SreError::ToolMissing { .. }) {
                    self.compose_with(project_root, args, timeout_secs, ComposeForm::Standalone)
                } else {
                    Err(err)
                }
            })
    }

    fn compose_with(
        &self,
        project_root: &Path,
        args: &[&str],
        timeout_secs: u64,
        form: ComposeForm,
    ) -> Result<CommandOutput, SreError> {
        match form {
            ComposeForm::Plugin => {
                let mut full = vec!["compose"];
                full.extend_from_slice(args);
                let out = run_bounded("docker", &full, Some(project_root), timeout_secs)?;
                // Older docker binaries report the missing plugin as an
                // unknown command rather than failing to spawn.
                if !out.success && out.stderr.contains("is not a docker command") {
                    return Err(SreError::ToolMissing {
                        tool: "docker compose".to_string(),
                    });
                }
                Ok(out)
            }
            ComposeForm::Standalone => {
                run_bounded("docker-compose", args, Some(project_root), timeout_secs)
            }
        }
    }

    /// Runs a plain `docker <args>` command.
    ///
    /// # Errors
    ///
    /// Propagates the bounded-run error kinds.
    pub fn docker(
        &self,
        project_root: &Path,
        args: &[&str],
        timeout_secs: u64,
    ) -> Result<CommandOutput, SreError> {
        run_bounded("docker", args, Some(project_root), timeout_secs)
    }
}

/// True when the project carries any Docker configuration file.
#[must_use]
pub fn has_docker_configuration(project_root: &Path) -> bool {
    [
        "Dockerfile",
        "backend/Dockerfile",
        "frontend/Dockerfile",
        "docker-compose.yml",
    ]
    .iter()
    .any(|rel| project_root.join(rel).exists())
}

/// True when the project carries a compose file. Compose-driven paths
/// (service builds, per-service test runs) require this specifically;
/// a bare Dockerfile goes through the standalone-image paths instead.
#[must_use]
pub fn has_compose_file(project_root: &Path) -> bool {
    project_root.join("docker-compose.yml").exists()
}

/// Finds the first standalone Dockerfile for a project without a
/// compose file, in root/backend/frontend order.
#[must_use]
pub fn standalone_dockerfile(project_root: &Path) -> Option<std::path::PathBuf> {
    ["Dockerfile", "backend/Dockerfile", "frontend/Dockerfile"]
        .iter()
        .map(|rel| project_root.join(rel))
        .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_reported() {
        let err = run_bounded("definitely-not-a-real-binary-xyz", &[], None, 5).unwrap_err();
        assert!(matches!(err, SreError::ToolMissing { .. }));
    }

    #[test]
    fn test_run_bounded_captures_output() {
        let out = run_bounded("echo", &["hello"], None, 5).unwrap();
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_run_bounded_failure_status() {
        // `false` exits non-zero everywhere.
        let out = run_bounded("false", &[], None, 5).unwrap();
        assert!(!out.success);
    }

    #[test]
    fn test_timeout_kills_process() {
        let err = run_bounded("sleep", &["30"], None, 1).unwrap_err();
        assert!(matches!(err, SreError::Timeout { seconds: 1, .. }));
    }

    #[test]
    fn test_detail_prefers_stderr() {
        let out = CommandOutput {
            success: false,
            stdout: "from stdout".to_string(),
            stderr: "from stderr".to_string(),
        };
        assert_eq!(out.detail(), "from stderr");

        let out = CommandOutput {
            success: false,
            stdout: "from stdout".to_string(),
            stderr: String::new(),
        };
        assert_eq!(out.detail(), "from stdout");
    }

    #[test]
    fn test_has_docker_configuration() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!has_docker_configuration(dir.path()));
        std::fs::write(dir.path().join("docker-compose.yml"), "services: {}\n").unwrap();
        assert!(has_docker_configuration(dir.path()));
        assert!(has_compose_file(dir.path()));
    }

    #[test]
    fn test_bare_dockerfile_is_not_compose() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("backend")).unwrap();
        std::fs::write(dir.path().join("backend/Dockerfile"), "FROM python:3.11-slim\n").unwrap();

        assert!(has_docker_configuration(dir.path()));
        assert!(!has_compose_file(dir.path()));
        assert_eq!(
            standalone_dockerfile(dir.path()),
            Some(dir.path().join("backend/Dockerfile"))
        );
    }

    #[test]
    fn test_standalone_dockerfile_prefers_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("backend")).unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM node:18-alpine\n").unwrap();
        std::fs::write(dir.path().join("backend/Dockerfile"), "FROM python:3.11-slim\n").unwrap();

        assert_eq!(
            standalone_dockerfile(dir.path()),
            Some(dir.path().join("Dockerfile"))
        );
        assert_eq!(standalone_dockerfile(&dir.path().join("empty-nowhere")), None);
    }

    #[test]
    fn test_unavailable_handle() {
        let docker = DockerCli::unavailable();
        assert!(!docker.available());
    }
}
