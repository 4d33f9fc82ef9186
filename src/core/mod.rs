//! # Core runtime: building and running the task forest.
//!
//! ```text
//! Config ──build_forest──► roots: Vec<Arc<Task>>
//!                             │
//!           Supervisor::run ──┤  prologue gate
//!                             ├─ start roots in parallel
//!                             ├─ SIGHUP → optional callback
//!                             └─ SIGINT/SIGTERM → cascade kill, return
//! ```

pub(crate) mod builder;
pub mod shutdown;
mod supervisor;

pub use supervisor::Supervisor;
