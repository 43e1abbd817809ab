//! Server-under-test process lifecycle
//!
//! The server is spawned as the leader of a fresh process group so the whole
//! group can be killed at once. Cleanup (group kill, then the optional
//! name-based sweep) is idempotent and safe to run when nothing is running.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::common::config::{HarnessConfig, ReadinessConfig, ServerConfig};
use crate::common::{paths, Error, Result};

use super::readiness;
use super::sweep::{self, SweepOutcome};

/// How long to wait for the killed server to be reaped
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle state of a spawned server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Ready,
    Failed,
    Terminated,
}

/// A running server-under-test process (and its process group)
pub struct ServerHandle {
    child: Child,
    pid: u32,
    addr: String,
    state: ServerState,
}

impl ServerHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Address the server is expected to listen on
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Whether the process has exited
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// SIGKILL the whole process group
    #[cfg(unix)]
    fn kill_group(&self) {
        // The server is its own group leader, so pgid == pid
        let rc = unsafe { libc::killpg(self.pid as libc::pid_t, libc::SIGKILL) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                tracing::warn!(pid = self.pid, "Failed to kill process group: {}", err);
            }
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&self) {}

    /// Kill the group and reap the leader
    async fn shutdown(&mut self) {
        if self.state == ServerState::Terminated {
            return;
        }

        self.kill_group();
        let _ = self.child.start_kill();

        match tokio::time::timeout(REAP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(pid = self.pid, %status, "Server terminated"),
            Ok(Err(e)) => tracing::debug!(pid = self.pid, "Failed to reap server: {}", e),
            Err(_) => tracing::warn!(pid = self.pid, "Server did not exit after SIGKILL"),
        }

        self.state = ServerState::Terminated;
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        // Last resort if terminate() was never reached; can't await here
        if self.state != ServerState::Terminated {
            self.kill_group();
            let _ = self.child.start_kill();
        }
    }
}

/// Starts, awaits and stops the server under test
pub struct ProcessManager {
    binary: PathBuf,
    server: ServerConfig,
    readiness: ReadinessConfig,
}

impl ProcessManager {
    pub fn new(binary: &Path, config: &HarnessConfig) -> Self {
        Self {
            binary: binary.to_path_buf(),
            server: config.server.clone(),
            readiness: config.readiness.clone(),
        }
    }

    /// Make sure no stray server instance holds the test port
    pub async fn cleanup(&self) -> SweepOutcome {
        if !self.server.sweep_by_name {
            return SweepOutcome::Skipped;
        }
        let Some(name) = paths::process_name(&self.binary) else {
            return SweepOutcome::Skipped;
        };
        let outcome = sweep::sweep_by_name(&name).await;
        tracing::debug!(name = %name, ?outcome, "Process sweep finished");
        outcome
    }

    /// Spawn the server with the given configuration file
    ///
    /// Fails if the process cannot be spawned or has already exited once the
    /// startup grace period is over.
    pub async fn start(&self, config_path: &Path) -> Result<ServerHandle> {
        let output = || {
            if self.server.inherit_output {
                Stdio::inherit()
            } else {
                Stdio::null()
            }
        };

        let mut std_cmd = std::process::Command::new(&self.binary);
        std_cmd
            .arg("-c")
            .arg(config_path)
            .args(&self.server.args)
            .stdin(Stdio::null())
            .stdout(output())
            .stderr(output());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0); // New group, so the whole tree can be killed
        }

        let mut cmd = Command::from(std_cmd);
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            Error::StartupFailed(format!("could not spawn {}: {}", self.binary.display(), e))
        })?;

        let pid = child
            .id()
            .ok_or_else(|| Error::StartupFailed("server exited immediately".to_string()))?;

        tracing::info!(
            pid,
            binary = %self.binary.display(),
            config = %config_path.display(),
            "Started server"
        );

        let mut handle = ServerHandle {
            child,
            pid,
            addr: self.server.addr(),
            state: ServerState::Starting,
        };

        tokio::time::sleep(self.server.startup_grace()).await;

        if let Ok(Some(status)) = handle.child.try_wait() {
            handle.state = ServerState::Failed;
            return Err(Error::ServerExited {
                status: status.to_string(),
            });
        }

        Ok(handle)
    }

    /// Poll until the server accepts TCP connections
    ///
    /// Gives up early if the process exits while polling. Moves the handle to
    /// `Ready` or `Failed`.
    pub async fn wait_for_ready(&self, handle: &mut ServerHandle) -> bool {
        let child = &mut handle.child;
        let ready = readiness::wait_for_ready(&handle.addr, &self.readiness, || {
            matches!(child.try_wait(), Ok(Some(_)))
        })
        .await;

        handle.state = if ready {
            ServerState::Ready
        } else {
            ServerState::Failed
        };

        if ready {
            tracing::debug!(pid = handle.pid, addr = %handle.addr, "Server ready");
        } else if handle.has_exited() {
            tracing::warn!(pid = handle.pid, "Server exited before accepting connections");
        } else {
            tracing::warn!(
                pid = handle.pid,
                timeout_secs = self.readiness.timeout_secs,
                "Server never accepted a connection"
            );
        }
        ready
    }

    /// Kill the server's process group, then sweep for stragglers
    pub async fn terminate(&self, mut handle: ServerHandle) -> SweepOutcome {
        handle.shutdown().await;
        self.cleanup().await
    }

    /// Error to report when readiness polling fails
    pub fn not_ready_error(&self) -> Error {
        Error::ServerNotReady {
            addr: self.server.addr(),
            secs: self.readiness.timeout_secs,
        }
    }
}
