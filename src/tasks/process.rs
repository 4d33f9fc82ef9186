//! Child-process plumbing: spawning, signaling, startup aborts.

use std::path::Path;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time;

use tracing::{debug, warn};

use crate::error::StartError;
use crate::tasks::task::Task;

/// Spawns the task's child process with stdio wired per its targets.
///
/// The child inherits the supervisor's environment with the task's own
/// entries layered on top.
pub(super) fn spawn(task: &Task, path: &Path) -> Result<Child, StartError> {
    let mut cmd = Command::new(path);
    cmd.args(&task.args)
        .envs(&task.env)
        .stdin(std::process::Stdio::null())
        .stdout(task.stdout.as_stdio())
        .stderr(task.stderr.as_stdio());

    let mut child = cmd.spawn().map_err(StartError::Spawn)?;
    debug!(task = %task.name(), pid = child.id(), path = %path.display(), "spawned");

    task.stdout.spawn_copier(task.name(), child.stdout.take());
    task.stderr.spawn_copier(task.name(), child.stderr.take());
    Ok(child)
}

/// Sends the platform termination signal to a process.
pub(super) fn terminate(pid: u32) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            warn!(pid, error = %e, "SIGTERM failed");
        }
    }
    #[cfg(not(unix))]
    {
        warn!(pid, "graceful termination is not supported on this platform");
    }
}

/// Sends an unconditional kill to a process.
pub(super) fn obliterate(pid: u32) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            warn!(pid, error = %e, "SIGKILL failed");
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}

/// Tears down a child whose start did not complete.
///
/// Signals the process, then reaps it in the background, escalating to an
/// unconditional kill after `grace`. The caller's start has already
/// failed; this only prevents the half-started child from lingering.
pub(super) fn abort_startup(name: &str, mut child: Child, grace: Duration) {
    let name = name.to_string();
    if let Some(pid) = child.id() {
        terminate(pid);
    }
    tokio::spawn(async move {
        match time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => debug!(task = %name, %status, "aborted startup reaped"),
            Ok(Err(e)) => warn!(task = %name, error = %e, "aborted startup wait failed"),
            Err(_elapsed) => {
                warn!(task = %name, "aborted startup ignored SIGTERM, killing");
                let _ = child.kill().await;
            }
        }
    });
}
