//! # procmon
//!
//! **procmon** supervises a dependency-ordered tree of long-running OS
//! processes. It starts children in the right order, watches them through
//! pluggable health probes, and — when a process dies or a probe fails
//! past its threshold — restarts it together with everything that depends
//! on it, applying exponential backoff so a flapping child cannot storm
//! the machine.
//!
//! ## Architecture
//! ```text
//!                 ┌───────────────────────────────────────────┐
//!                 │ Supervisor                                │
//!                 │  - prologue gate (all probes must be Ok)  │
//!                 │  - parallel root start                    │
//!                 │  - SIGINT/SIGTERM → cascade kill          │
//!                 └───────┬───────────────────┬───────────────┘
//!                         ▼                   ▼
//!                 ┌──────────────┐    ┌──────────────┐
//!                 │ Task (root)  │    │ Task (root)  │
//!                 └──────┬───────┘    └──────────────┘
//!        pre-runs ──────►│ start():
//!   (run to completion)  │   spawn process → await readiness
//!                        │   → behavior monitors → dependents
//!                        ▼
//!     ┌──────────────────────────────────────────────────┐
//!     │ incarnation (fresh channels per start)           │
//!     │                                                  │
//!     │  probe ─► Monitor ─► RetryGate ─► FailMonitor ─┐ │
//!     │  child exit ─► exit watcher ── Terminated ─────┤ │
//!     │                                                ▼ │
//!     │  Status channel ──► master monitor ──► Stopped   │
//!     │                                           │      │
//!     │  stop monitor ◄───────────────────────────┘      │
//!     │     └─► kill(): dependents first, SIGTERM,       │
//!     │         escalate to SIGKILL after MaxShutdown    │
//!     └──────────────────────────────────────────────────┘
//!                        ▲
//!      child monitor ────┘ (parent side: restart with doubled
//!                           backoff; relax own delay while idle)
//! ```
//!
//! ## Feature map
//! | Area | Description | Key types |
//! |---|---|---|
//! | **Probes** | Single-shot health checks (http, tcp, fs, redis). | [`Probe`], [`ProbeSpec`] |
//! | **Monitors** | Periodic drivers with retry damping and escalation. | [`Monitor`], [`RetryGate`], [`FailMonitor`] |
//! | **Tasks** | Supervised processes in a dependency tree. | [`Task`], [`StdioTarget`] |
//! | **Supervision** | Build the forest from config and run it. | [`Supervisor`], [`Config`] |
//! | **Errors** | Typed failures per phase. | [`BuildError`], [`StartError`], [`RuntimeError`] |
//!
//! ## Example
//! ```no_run
//! use procmon::{Config, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let raw = std::fs::read_to_string("procmon.toml")?;
//!     let config = Config::from_toml(&raw)?;
//!     procmon::logging::init(&config.logger);
//!
//!     let supervisor = Supervisor::build(&config)?;
//!     supervisor.run().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
pub mod logging;
mod monitors;
mod policies;
mod probes;
mod tasks;

// ---- Public re-exports ----

pub use crate::config::{
    Config, DefaultsConfig, LogFormat, LogLevel, LogOutput, LoggerConfig, MonitorSpec, TaskConfig,
};
pub use crate::core::Supervisor;
pub use crate::error::{BuildError, RuntimeError, StartError};
pub use crate::events::{Event, EventCode};
pub use crate::monitors::{FailMonitor, Monitor, RetryGate};
pub use crate::policies::JitterPolicy;
pub use crate::probes::{
    EnsureDir, HttpPinger, ImmediateOk, PortAvailable, PortInUse, Probe, ProbeRef, ProbeSpec,
    RedisPinger,
};
pub use crate::tasks::{StdioTarget, Task};
