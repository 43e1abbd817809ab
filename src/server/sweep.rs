//! Defensive process sweep
//!
//! Children forked by the server can leave its process group and keep the
//! test port bound. The sweep kills every process owned by the current user
//! whose name is exactly the server's process name. An unrelated process with
//! the same name and owner is killed as well. Set
//! `server.sweep_by_name = false` to rely on the process-group kill alone.
//!
//! The harness itself and its ancestors are never signalled, even when they
//! carry the same name.
//!
//! Every failure is swallowed; finding nothing to kill is the normal case.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::readiness::{poll_until, Probe};

/// How long to wait for signalled processes to die
const EXIT_WAIT: Duration = Duration::from_secs(1);

/// What a sweep did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// At least one process was signalled
    Killed,
    /// No process matched
    NothingMatched,
    /// Sweep could not run (no `pgrep`, spawn failure, bad name)
    Skipped,
}

/// Escape extended-regex metacharacters so `name` matches literally
pub fn literal_pattern(name: &str) -> String {
    let mut pattern = String::with_capacity(name.len());
    for c in name.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern
}

#[cfg(unix)]
fn current_uid() -> u32 {
    // SAFETY: getuid has no preconditions and cannot fail
    unsafe { libc::getuid() }
}

/// Parent pid of `pid`, read from procfs
#[cfg(target_os = "linux")]
fn parent_of(pid: u32) -> Option<u32> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    // The command name may contain spaces and parens; fields resume after the last ')'
    let (_, rest) = stat.rsplit_once(')')?;
    rest.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn parent_of(pid: u32) -> Option<u32> {
    if pid == std::process::id() {
        // SAFETY: getppid has no preconditions and cannot fail
        Some(unsafe { libc::getppid() } as u32)
    } else {
        None
    }
}

#[cfg(not(unix))]
fn parent_of(_pid: u32) -> Option<u32> {
    None
}

/// This process and every ancestor up to (not including) init
pub fn protected_pids() -> Vec<u32> {
    let mut pids = vec![std::process::id()];
    while let Some(parent) = pids.last().copied().and_then(parent_of) {
        if parent <= 1 || pids.contains(&parent) {
            break;
        }
        pids.push(parent);
    }
    pids
}

#[cfg(unix)]
fn kill(pid: u32) -> bool {
    // SAFETY: plain syscall; a stale pid yields ESRCH
    unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) == 0 }
}

#[cfg(not(unix))]
fn kill(_pid: u32) -> bool {
    false
}

/// Whether `pid` has exited (a zombie counts as exited)
#[cfg(target_os = "linux")]
fn is_gone(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .map_or(true, |state| state == "Z"),
        Err(_) => true,
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_gone(pid: u32) -> bool {
    // SAFETY: signal 0 only checks for existence
    unsafe { libc::kill(pid as libc::pid_t, 0) != 0 }
}

#[cfg(not(unix))]
fn is_gone(_pid: u32) -> bool {
    true
}

/// Processes of the current user named exactly `name`, via `pgrep -x`
///
/// `None` if `pgrep` could not be run.
async fn find_by_name(name: &str) -> Option<Vec<u32>> {
    let pgrep = match which::which("pgrep") {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!("Skipping process sweep, pgrep not available: {}", e);
            return None;
        }
    };

    let mut cmd = Command::new(pgrep);
    cmd.arg("-x");
    #[cfg(unix)]
    cmd.arg("-u").arg(current_uid().to_string());
    cmd.arg(literal_pattern(name))
        .stdin(Stdio::null())
        .stderr(Stdio::null());

    let output = match cmd.output().await {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!(name, "Failed to run pgrep: {}", e);
            return None;
        }
    };

    match output.status.code() {
        Some(0) => Some(
            String::from_utf8_lossy(&output.stdout)
                .lines()
                .filter_map(|line| line.trim().parse().ok())
                .collect(),
        ),
        Some(1) => Some(Vec::new()),
        code => {
            tracing::debug!(name, ?code, "pgrep reported an error");
            None
        }
    }
}

/// SIGKILL every process of the current user named exactly `name`
pub async fn sweep_by_name(name: &str) -> SweepOutcome {
    if name.is_empty() {
        return SweepOutcome::Skipped;
    }

    let Some(candidates) = find_by_name(name).await else {
        return SweepOutcome::Skipped;
    };

    let protected = protected_pids();
    let mut killed = Vec::new();
    for pid in candidates {
        if protected.contains(&pid) {
            tracing::debug!(pid, name, "Sweep spared the harness process");
            continue;
        }
        if kill(pid) {
            killed.push(pid);
        }
    }

    if killed.is_empty() {
        return SweepOutcome::NothingMatched;
    }

    // Signal delivery is asynchronous; the port is only free once they are gone
    let gone = poll_until(Duration::from_millis(20), EXIT_WAIT, || {
        let all_gone = killed.iter().all(|pid| is_gone(*pid));
        async move {
            if all_gone {
                Probe::Ready
            } else {
                Probe::Pending
            }
        }
    })
    .await;
    if !gone {
        tracing::warn!(name, "Swept processes still alive after SIGKILL");
    }

    tracing::debug!(name, killed = killed.len(), "Sweep killed lingering server processes");
    SweepOutcome::Killed
}
