//! Out-of-process algorithm execution.
//!
//! An algorithm unit is a stateless program: it reads one JSON request on
//! stdin, writes one JSON response on stdout and exits zero. The runner
//! owns the child for the whole call and kills it on every exit path,
//! including the timeout. On Unix each unit leads its own process group,
//! and a timed-out unit is killed together with anything it forked.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::RunnerError;

/// Boundary to the external forecasting computation.
#[async_trait]
pub trait AlgorithmRunner: Send + Sync {
    /// Run `unit` with `payload` on its stdin and return its full stdout.
    async fn run(
        &self,
        unit: &Path,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, RunnerError>;
}

/// Runs units as child processes, optionally through an interpreter
/// (`python3 <unit>`).
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    interpreter: Option<PathBuf>,
}

impl ProcessRunner {
    /// Execute units directly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute units as `<interpreter> <unit>`.
    pub fn with_interpreter(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: Some(interpreter.into()),
        }
    }

    pub fn interpreter(&self) -> Option<&Path> {
        self.interpreter.as_deref()
    }

    fn command(&self, unit: &Path) -> Command {
        let mut cmd = match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(unit);
                cmd
            }
            None => Command::new(unit),
        };
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

#[async_trait]
impl AlgorithmRunner for ProcessRunner {
    async fn run(
        &self,
        unit: &Path,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, RunnerError> {
        let mut cmd = self.command(unit);
        debug!(unit = %unit.display(), bytes = payload.len(), ?timeout, "running algorithm");

        let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            unit: unit.to_path_buf(),
            source,
        })?;

        let pid = child.id();
        let stdin = child.stdin.take();
        let write = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(payload).await?;
                // stdin is dropped here, so the unit sees EOF.
            }
            Ok::<_, std::io::Error>(())
        };

        // Feed stdin while draining stdout/stderr so neither side can stall
        // on a full pipe. The child lives inside this future; dropping it on
        // timeout kills the process.
        let run = async move { tokio::join!(write, child.wait_with_output()) };

        let (written, output) = match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => {
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                warn!(unit = %unit.display(), ?timeout, "algorithm timed out, killed");
                return Err(RunnerError::Timeout {
                    unit: unit.to_path_buf(),
                    timeout,
                });
            }
        };

        let output = output.map_err(|source| RunnerError::Io {
            unit: unit.to_path_buf(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let diagnostics = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr
            };
            return Err(RunnerError::Execution {
                unit: unit.to_path_buf(),
                status: output.status.to_string(),
                output: diagnostics,
            });
        }

        // A unit that exits cleanly without reading all of its input is fine.
        if let Err(source) = written
            && source.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(RunnerError::Io {
                unit: unit.to_path_buf(),
                source,
            });
        }

        debug!(
            unit = %unit.display(),
            bytes = output.stdout.len(),
            "algorithm finished"
        );
        Ok(output.stdout)
    }
}

/// SIGKILL every process left in the unit's group.
#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: killpg has no memory-safety preconditions. ESRCH (group
    // already gone) is the expected outcome when the unit did not fork.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}
