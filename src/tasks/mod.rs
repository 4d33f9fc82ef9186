//! # Tasks: supervised processes and their lifecycle machinery.
//!
//! - [`Task`] — one node of the dependency tree: launch parameters,
//!   lifecycle knobs, pre-runs, dependents, monitors, and the mutable
//!   bookkeeping of the running incarnation.
//! - [`StdioTarget`] — where a child's output streams go.
//! - `watchers` — the per-incarnation loops (master monitor, exit
//!   watcher, stop monitor, child monitor).
//! - `process` — spawn/signal plumbing around `tokio::process`.

mod process;
mod stdio;
mod task;
mod watchers;

pub use stdio::StdioTarget;
pub use task::Task;

pub(crate) use task::{BehaviorSpec, TaskSettings};
