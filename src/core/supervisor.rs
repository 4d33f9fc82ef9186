//! # Supervisor: the composition root.
//!
//! Two operations face the outside:
//!
//! - [`Supervisor::build`] binds a [`Config`] into the task forest
//!   (fatal on any configuration error; nothing is started).
//! - [`Supervisor::run`] gates on the prologue probes, starts every root
//!   in parallel, and then blocks until either all roots have stopped on
//!   their own or a termination signal arrives — in which case every
//!   root is killed, cascading down the tree, before `run` returns.
//!
//! ## Shutdown path
//! ```text
//! SIGINT/SIGTERM ──► kill(root₁) ∥ kill(root₂) ∥ …
//!                        │
//!                        ├─ kill every dependent (recursively), wait
//!                        ├─ SIGTERM own process
//!                        └─ wait, escalating to SIGKILL after MaxShutdown
//! ```

use std::sync::Arc;

use tokio::task::JoinSet;

use tracing::{info, warn};

use crate::config::Config;
use crate::core::builder::{self, Forest};
use crate::core::shutdown;
use crate::error::{BuildError, RuntimeError, StartError};
use crate::events::EventCode;
use crate::probes::ProbeRef;
use crate::tasks::Task;

type HupCallback = Arc<dyn Fn() + Send + Sync>;

/// Owns the root tasks and the prologue gate.
pub struct Supervisor {
    prologue: Vec<ProbeRef>,
    roots: Vec<Arc<Task>>,
    on_hup: Option<HupCallback>,
}

impl Supervisor {
    /// Binds the configuration into a task forest.
    ///
    /// Any unresolved reference, unknown probe type, or bad knob is fatal
    /// here; no task is started.
    pub fn build(config: &Config) -> Result<Self, BuildError> {
        let Forest { prologue, roots } = builder::build_forest(config)?;
        Ok(Self {
            prologue,
            roots,
            on_hup: None,
        })
    }

    /// The root tasks, in configuration order.
    pub fn roots(&self) -> &[Arc<Task>] {
        &self.roots
    }

    /// Registers a callback invoked on every `SIGHUP`. Unused by default.
    pub fn on_hup(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_hup = Some(Arc::new(callback));
        self
    }

    /// Runs the forest until completion or a termination signal.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        self.run_prologue().await?;

        if let Some(callback) = self.on_hup.clone() {
            shutdown::spawn_hup_listener(move || callback())?;
        }

        let mut set = JoinSet::new();
        for root in &self.roots {
            let root = Arc::clone(root);
            set.spawn(async move {
                let name = root.name().to_string();
                (name, root.start(None).await)
            });
        }
        let mut fatal = None;
        while let Some(joined) = set.join_next().await {
            if let Ok((name, Err(e))) = joined {
                // Roots are not auto-retried; the rest of the forest keeps
                // running. Mandatory onetime failures still turn into a
                // non-zero exit once the supervisor winds down.
                warn!(root = %name, error = %e, "root failed to start");
                if matches!(
                    e,
                    StartError::OnetimeFailed { .. } | StartError::PreRun { .. }
                ) && fatal.is_none()
                {
                    fatal = Some(RuntimeError::RootFailed {
                        root: name,
                        detail: e.to_string(),
                    });
                }
            }
        }

        let roots = self.roots.clone();
        let all_stopped = async move {
            for root in &roots {
                root.wait_stopped().await;
            }
        };

        tokio::select! {
            signal = shutdown::wait_for_shutdown_signal() => {
                signal?;
                info!("termination signal received, shutting down");
                self.kill_all().await;
            }
            _ = all_stopped => {
                info!("all roots stopped");
            }
        }
        match fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Kills every root in parallel and waits for the cascades to finish.
    pub async fn kill_all(&self) {
        let mut set = JoinSet::new();
        for root in &self.roots {
            set.spawn(Arc::clone(root).kill());
        }
        while set.join_next().await.is_some() {}
    }

    async fn run_prologue(&self) -> Result<(), RuntimeError> {
        for probe in &self.prologue {
            let ev = probe.check().await;
            if ev.code() != EventCode::Ok {
                return Err(RuntimeError::PrologueFailed {
                    probe: probe.name().to_string(),
                    detail: ev.error().unwrap_or("probe not ok").to_string(),
                });
            }
            info!(probe = %probe.name(), "prologue ok");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn prologue_failure_aborts_run() {
        // An in-use port makes `portavailable` fail deterministically.
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let raw = format!(
            r#"
            [[prologue]]
            type = "portavailable"
            port = {port}

            [[task]]
            name = "api"
            path = "/bin/true"
            onetime = true
        "#
        );
        let config = Config::from_toml(&raw).unwrap();
        let supervisor = Supervisor::build(&config).unwrap();

        match supervisor.run().await {
            Err(RuntimeError::PrologueFailed { probe, .. }) => {
                assert!(probe.contains("portavailable"));
            }
            other => panic!("expected PrologueFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_forest_runs_to_completion() {
        let config = Config::from_toml("").unwrap();
        let supervisor = Supervisor::build(&config).unwrap();
        supervisor.run().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_onetime_root_is_reported() {
        let config = Config::from_toml(
            r#"
            [[task]]
            name = "boom"
            path = "/bin/false"
            onetime = true
        "#,
        )
        .unwrap();
        let supervisor = Supervisor::build(&config).unwrap();
        match supervisor.run().await {
            Err(RuntimeError::RootFailed { root, .. }) => assert_eq!(root, "boom"),
            other => panic!("expected RootFailed, got {other:?}"),
        }
    }
}
