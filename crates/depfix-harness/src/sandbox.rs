//! Sandboxed CI execution.
//!
//! Each exec evaluation runs the instance's job-runner command inside a
//! privileged container created from a prebuilt runner image. The image
//! ships its own container daemon (the job runner launches nested
//! containers), so the host runtime must provide the `sysbox-runc` runtime
//! class, and the command is dispatched only after the inner daemon answers
//! a health probe.
//!
//! The project tree is mounted read-only at `/project`; the job command is
//! wrapped in an in-container `timeout` so a stuck job cannot exceed the
//! wall-clock limit. Outcome classification keys on the job runner's
//! literal markers, plus exit code 124 for timeouts.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

use crate::logging::InstanceLog;

/// Runner image used when the CLI does not override it.
pub const DEFAULT_RUNNER_IMAGE: &str = "ghcr.io/bug-ops/depfix-runner:latest";

const CONTAINER_PREFIX: &str = "depfix";
const DAEMON_PROBE_INTERVAL: Duration = Duration::from_secs(2);
const DAEMON_PROBE_TIMEOUT: Duration = Duration::from_secs(60);
/// Grace on top of the in-container timeout before the host gives up.
const EXEC_GRACE: Duration = Duration::from_secs(120);

const JOB_SUCCEEDED_MARKER: &str = "🏁  Job succeeded";
const JOB_FAILED_MARKER: &str = "🏁  Job failed";

/// Container creation, startup, or readiness failed.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("docker {step} failed:\n{stderr}")]
    Docker { step: &'static str, stderr: String },

    #[error("inner container daemon never became ready in container {0}")]
    DaemonNotReady(String),

    #[error("CI command did not return within the host-side deadline")]
    HostDeadline,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of one CI run.
#[derive(Debug, Clone)]
pub struct CiOutcome {
    pub passed: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Classifies a finished CI run from its captured stdout and exit code.
///
/// Pass iff stdout carries the success marker; the failure marker or exit
/// code 124 (in-container timeout) force a fail, and any other terminal
/// state (typically an unsupported-platform skip) also counts as fail.
pub fn classify_output(stdout: &str, exit_code: Option<i32>) -> bool {
    if stdout.contains(JOB_FAILED_MARKER) || exit_code == Some(124) {
        return false;
    }
    stdout.contains(JOB_SUCCEEDED_MARKER)
}

async fn docker(step: &'static str, args: &[&str]) -> Result<std::process::Output, SandboxError> {
    let output = Command::new("docker").args(args).output().await?;
    if !output.status.success() {
        return Err(SandboxError::Docker {
            step,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(output)
}

/// A created container, force-removed even if the async path never reaches
/// the explicit release (cancellation, panic).
struct Container {
    name: String,
    released: AtomicBool,
}

impl Container {
    async fn create(
        image: &str,
        name: &str,
        project_root: &Path,
        log: &InstanceLog,
    ) -> Result<Self, SandboxError> {
        let mount = format!("{}:/project:ro", project_root.display());
        docker(
            "create",
            &[
                "create",
                "--name",
                name,
                "--runtime",
                "sysbox-runc",
                "-t",
                "-i",
                "-e",
                "GITHUB_TOKEN",
                "-v",
                &mount,
                image,
            ],
        )
        .await?;
        log.info(format!("container created: {name}"));

        docker("start", &["start", name]).await?;
        log.info(format!("container started: {name}"));

        Ok(Self {
            name: name.to_string(),
            released: AtomicBool::new(false),
        })
    }

    /// Polls the nested daemon until `docker ps` succeeds inside the
    /// container.
    async fn wait_for_inner_daemon(&self, log: &InstanceLog) -> Result<(), SandboxError> {
        let deadline = tokio::time::Instant::now() + DAEMON_PROBE_TIMEOUT;
        loop {
            let probe = Command::new("docker")
                .args(["exec", self.name.as_str(), "docker", "ps"])
                .output()
                .await?;
            if probe.status.success() {
                log.info("inner container daemon is ready");
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SandboxError::DaemonNotReady(self.name.clone()));
            }
            log.info("waiting for inner container daemon...");
            tokio::time::sleep(DAEMON_PROBE_INTERVAL).await;
        }
    }

    /// Stop (kill fallback) and remove with retries. Runs on all exit
    /// paths; errors are logged, never raised.
    async fn release(&self, log: &InstanceLog) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        let stop = Command::new("docker")
            .args(["stop", "-t", "10", self.name.as_str()])
            .output()
            .await;
        match stop {
            Ok(out) if out.status.success() => {
                log.info(format!("container stopped: {}", self.name));
            }
            _ => {
                log.warn(format!(
                    "failed to stop container {}, killing it",
                    self.name
                ));
                let _ = Command::new("docker")
                    .args(["kill", self.name.as_str()])
                    .output()
                    .await;
            }
        }

        for attempt in 1..=3 {
            let removed = Command::new("docker")
                .args(["rm", "-f", "-v", self.name.as_str()])
                .output()
                .await;
            if matches!(&removed, Ok(out) if out.status.success()) {
                log.info(format!("container removed: {}", self.name));
                return;
            }
            log.warn(format!(
                "failed to remove container {} (attempt {attempt}/3)",
                self.name
            ));
        }
        log.error(format!(
            "giving up on removing container {}, manual cleanup needed",
            self.name
        ));
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        // Last-resort cleanup when the async release path was cancelled.
        if !self.released.swap(true, Ordering::SeqCst) {
            let _ = std::process::Command::new("docker")
                .args(["rm", "-f", "-v", self.name.as_str()])
                .output();
        }
    }
}

/// Launches sandboxed CI runs from a prebuilt runner image.
#[derive(Clone)]
pub struct SandboxRunner {
    image: String,
}

impl SandboxRunner {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }

    /// Pulls the runner image on first use. Concurrent first-uses race one
    /// pull; the container runtime deduplicates.
    async fn ensure_image(&self, log: &InstanceLog) -> Result<(), SandboxError> {
        let inspect = Command::new("docker")
            .args(["image", "inspect", self.image.as_str()])
            .output()
            .await?;
        if inspect.status.success() {
            return Ok(());
        }
        log.info(format!("pulling runner image: {}", self.image));
        docker("pull", &["pull", &self.image]).await?;
        Ok(())
    }

    /// Runs the CI job command inside a fresh sandbox container.
    ///
    /// Both captured streams are written to `output_file` under
    /// `===== stdout =====` / `===== stderr =====` headers. The container
    /// is stopped and removed on every exit path.
    pub async fn run_ci(
        &self,
        run_name: &str,
        project_root: &Path,
        command: &str,
        timeout_secs: u64,
        output_file: &Path,
        log: &InstanceLog,
    ) -> Result<CiOutcome, SandboxError> {
        self.ensure_image(log).await?;

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("{CONTAINER_PREFIX}-{run_name}-{}", &suffix[..6]);
        let container = Container::create(&self.image, &name, project_root, log).await?;

        let result = self
            .exec_job(&container, command, timeout_secs, output_file, log)
            .await;
        container.release(log).await;
        result
    }

    async fn exec_job(
        &self,
        container: &Container,
        command: &str,
        timeout_secs: u64,
        output_file: &Path,
        log: &InstanceLog,
    ) -> Result<CiOutcome, SandboxError> {
        container.wait_for_inner_daemon(log).await?;

        log.info(format!("running CI command: {command}"));
        let timeout_arg = format!("{timeout_secs}s");
        let exec = Command::new("docker")
            .args([
                "exec",
                container.name.as_str(),
                "timeout",
                timeout_arg.as_str(),
                "/bin/sh",
                "-c",
                command,
            ])
            .output();

        let deadline = Duration::from_secs(timeout_secs) + EXEC_GRACE;
        let output = tokio::time::timeout(deadline, exec)
            .await
            .map_err(|_| SandboxError::HostDeadline)??;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        tokio::fs::write(
            output_file,
            format!("===== stdout =====\n{stdout}\n===== stderr =====\n{stderr}"),
        )
        .await?;

        let exit_code = output.status.code();
        log.info(format!("CI command finished, exit code: {exit_code:?}"));

        let passed = classify_output(&stdout, exit_code);
        if passed {
            log.info("CI job succeeded");
        } else if exit_code == Some(124) {
            log.error("CI job timed out (exit code 124)");
        } else {
            log.error(format!("CI job failed, exit code: {exit_code:?}"));
        }

        Ok(CiOutcome {
            passed,
            stdout,
            stderr,
        })
    }
}
