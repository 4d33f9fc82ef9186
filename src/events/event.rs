//! # Events flowing through a task's status channel.
//!
//! Every probe invocation, monitor wrapper, and process-exit observation is
//! reported as an [`Event`]. Events come in three shapes:
//! - a plain status code,
//! - a status code with the error that produced it,
//! - a terminate report carrying the child's exit code.
//!
//! [`EventCode::Stop`] is the only code a task acts on: the master monitor
//! closes the incarnation's stop token when it sees one. Everything else is
//! advisory and is consumed by wrappers or logged.
//!
//! ## Flow
//! ```text
//! probe ──► monitor driver ──► retry gate ──► fail adapter ──► Status channel
//!                                                                   │
//! exit watcher ── Terminated ──────────────────────────────────────►│
//!                                                                   ▼
//!                                                            master monitor
//! ```

use std::sync::Arc;

/// Status code carried by every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCode {
    /// The probe succeeded.
    Ok,
    /// The probe failed, but the failure is still below the retry threshold.
    Failing,
    /// The probe failed past the retry threshold.
    Failed,
    /// The task should shut down. Emitted by the exit watcher and by the
    /// fail adapter when a `Failed` escalates.
    Stop,
}

impl EventCode {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventCode::Ok => "ok",
            EventCode::Failing => "failing",
            EventCode::Failed => "failed",
            EventCode::Stop => "stop",
        }
    }
}

/// One report on a task's status channel.
///
/// ## Example
/// ```
/// use procmon::{Event, EventCode};
///
/// let ev = Event::failed("connection refused");
/// assert_eq!(ev.code(), EventCode::Failed);
/// assert_eq!(ev.error(), Some("connection refused"));
///
/// let term = Event::terminated(Some(1));
/// assert_eq!(term.code(), EventCode::Stop);
/// assert_eq!(term.exit_code(), Some(1));
/// ```
#[derive(Debug, Clone)]
pub enum Event {
    /// A bare status report.
    Status(EventCode),
    /// A status report with the error that produced it.
    Errored {
        /// The status code.
        code: EventCode,
        /// Human-readable error detail, shared cheaply between wrappers.
        error: Arc<str>,
    },
    /// The child process exited. Always reads as [`EventCode::Stop`].
    Terminated {
        /// The process exit code, if the platform reported one.
        exit_code: Option<i32>,
    },
}

impl Event {
    /// A plain `Ok` report.
    #[inline]
    pub fn ok() -> Self {
        Event::Status(EventCode::Ok)
    }

    /// A plain `Stop` report.
    #[inline]
    pub fn stop() -> Self {
        Event::Status(EventCode::Stop)
    }

    /// A `Failing` report with error detail.
    #[inline]
    pub fn failing(error: impl Into<Arc<str>>) -> Self {
        Event::Errored {
            code: EventCode::Failing,
            error: error.into(),
        }
    }

    /// A `Failed` report with error detail.
    #[inline]
    pub fn failed(error: impl Into<Arc<str>>) -> Self {
        Event::Errored {
            code: EventCode::Failed,
            error: error.into(),
        }
    }

    /// A terminate report for a process exit.
    #[inline]
    pub fn terminated(exit_code: Option<i32>) -> Self {
        Event::Terminated { exit_code }
    }

    /// Returns the status code of this event.
    ///
    /// Terminate reports read as [`EventCode::Stop`].
    pub fn code(&self) -> EventCode {
        match self {
            Event::Status(code) => *code,
            Event::Errored { code, .. } => *code,
            Event::Terminated { .. } => EventCode::Stop,
        }
    }

    /// Returns the error detail, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Event::Errored { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Returns the process exit code, if this is a terminate report.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Event::Terminated { exit_code } => *exit_code,
            _ => None,
        }
    }

    /// True when this event should trigger shutdown.
    #[inline]
    pub fn is_stop(&self) -> bool {
        self.code() == EventCode::Stop
    }

    /// Returns a copy of this event carrying the given code.
    ///
    /// Used by the retry gate to report `Failing` while the underlying
    /// probe keeps returning `Failed`. Error detail is preserved.
    pub fn with_code(&self, code: EventCode) -> Self {
        match self {
            Event::Errored { error, .. } => Event::Errored {
                code,
                error: Arc::clone(error),
            },
            Event::Terminated { exit_code } => Event::Terminated {
                exit_code: *exit_code,
            },
            Event::Status(_) => Event::Status(code),
        }
    }
}
