//! Error types used by the procmon runtime.
//!
//! Three enums, matching the error taxonomy of the system:
//!
//! - [`BuildError`] — configuration-time failures; fatal before any task
//!   is started.
//! - [`StartError`] — failures while bringing one task up; warn-level for
//!   the task's owner, fatal only for mandatory onetime pre-runs.
//! - [`RuntimeError`] — failures of the supervisor itself (prologue gate,
//!   signal registration).
//!
//! Errors never cross channel boundaries except wrapped in an event; the
//! only synchronous error returns are from `Supervisor::build` and from
//! `Task::start`.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while binding the configuration into a task forest.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BuildError {
    /// The TOML document failed to parse or bind (unknown probe type,
    /// bad duration, bad permission string, missing field).
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment interpolation reference stayed unresolved after the
    /// final pass.
    #[error("unresolved variable ${name} in env entry {entry:?}")]
    UnresolvedEnv {
        /// The variable that could not be resolved.
        name: String,
        /// The env key whose value references it.
        entry: String,
    },

    /// Two tasks share a name.
    #[error("duplicate task name {0:?}")]
    DuplicateTask(String),

    /// A task names a parent that is not defined anywhere in the file.
    #[error("task {task:?} references unknown parent {parent:?}")]
    UnknownParent {
        /// The referencing task.
        task: String,
        /// The missing parent name.
        parent: String,
    },

    /// A task names a pre-run that is not defined before it.
    #[error("task {task:?} references unknown pre-run {prerun:?}")]
    UnknownPrerun {
        /// The referencing task.
        task: String,
        /// The missing pre-run name.
        prerun: String,
    },

    /// A restart delay of zero would spin the restarter.
    #[error("task {0:?} has a zero restart delay")]
    ZeroRestartDelay(String),

    /// A permission string did not parse as octal.
    #[error("invalid octal permission {0:?}")]
    BadPermission(String),
}

/// Errors raised while starting one task.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StartError {
    /// The executable could not be spawned.
    #[error("spawn failed: {0}")]
    Spawn(#[source] io::Error),

    /// A pre-run of this task failed, aborting the start.
    #[error("pre-run {name:?} failed: {source}")]
    PreRun {
        /// Name of the failing pre-run.
        name: String,
        /// The underlying failure.
        #[source]
        source: Box<StartError>,
    },

    /// A onetime run exited non-zero.
    #[error("onetime task exited with code {code:?}")]
    OnetimeFailed {
        /// The exit code, if the platform reported one.
        code: Option<i32>,
    },

    /// The process exited before the readiness probe returned `Ok`.
    #[error("process exited before ready (code {code:?})")]
    ExitedBeforeReady {
        /// The exit code, if the platform reported one.
        code: Option<i32>,
    },

    /// The readiness probe did not return `Ok` within the startup deadline.
    #[error("not ready after {0:?}")]
    ReadyTimeout(Duration),

    /// Waiting on a onetime child failed at the OS level.
    #[error("wait failed: {0}")]
    Wait(#[source] io::Error),
}

impl StartError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StartError::Spawn(_) => "spawn_failed",
            StartError::PreRun { .. } => "prerun_failed",
            StartError::OnetimeFailed { .. } => "onetime_failed",
            StartError::ExitedBeforeReady { .. } => "exited_before_ready",
            StartError::ReadyTimeout(_) => "ready_timeout",
            StartError::Wait(_) => "wait_failed",
        }
    }
}

/// Errors raised by the supervisor loop itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A prologue probe reported something other than `Ok`; no task was
    /// started.
    #[error("prologue probe {probe:?} failed: {detail}")]
    PrologueFailed {
        /// Name of the failing probe.
        probe: String,
        /// The error carried by the probe's event, if any.
        detail: String,
    },

    /// A root's mandatory onetime work (its own run, or a pre-run)
    /// failed; the supervisor exits non-zero once it winds down.
    #[error("root {root:?} failed: {detail}")]
    RootFailed {
        /// The failing root task.
        root: String,
        /// The underlying start error.
        detail: String,
    },

    /// OS signal listeners could not be registered.
    #[error("signal registration failed: {0}")]
    Signal(#[from] io::Error),
}
