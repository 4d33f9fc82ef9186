//! Runtime events: the status-channel data model.
//!
//! Events are produced by monitor drivers, the retry gate, the fail adapter,
//! and each incarnation's exit watcher, and consumed by the task's master
//! monitor.

mod event;

pub use event::{Event, EventCode};
