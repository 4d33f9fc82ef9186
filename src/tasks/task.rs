//! # Task: one supervised process and its lifecycle.
//!
//! A [`Task`] owns a child process, a readiness probe, a set of behavior
//! monitors, an ordered list of pre-runs, and an unordered list of
//! dependents. Its lifecycle:
//!
//! ```text
//! Quiescent ──start()──► Starting ──ready──► Ready/Running
//!                           │                    │
//!                 pre-run fails /          Stop observed
//!                 exit / deadline               │
//!                           ▼                   ▼
//!                        Stopped ◄────────── Stopping
//!                           │
//!              parent's restarter (backoff)
//!                           ▼
//!                 Starting (new incarnation)
//! ```
//!
//! ## Incarnations
//! Every successful `start` creates a fresh status channel and a fresh
//! stop token. The watchers launched for that incarnation capture the
//! channels they were given; nothing from one incarnation can leak into
//! the next. The master monitor is the sole canceller of the stop token.
//!
//! ## Watchers per incarnation
//! - **master monitor** — drains the status channel; cancels the stop
//!   token on `Stop` or when the parent's token cancels.
//! - **exit watcher** — owns the child; reports its exit as a terminate
//!   event on the captured status channel.
//! - **stop monitor** — waits for the stop token, then runs `kill`.
//! - **child monitor** — one per dependent; restarts it with doubled
//!   backoff when it goes down, and relaxes this task's own delay while
//!   everything stays quiet.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use tracing::{info, warn};

use crate::error::StartError;
use crate::events::EventCode;
use crate::monitors::FailMonitor;
use crate::policies::{backoff, JitterPolicy};
use crate::probes::ProbeRef;
use crate::tasks::stdio::StdioTarget;
use crate::tasks::{process, watchers};

/// Readiness poll cadence during startup.
const READY_POLL: Duration = Duration::from_millis(50);

/// One behavior monitor attached to a task.
pub(crate) struct BehaviorSpec {
    pub probe: ProbeRef,
    pub period: Duration,
    pub retries: u32,
}

/// Everything needed to construct a task; assembled by the builder.
pub(crate) struct TaskSettings {
    pub name: String,
    pub path: Option<PathBuf>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub stdout: StdioTarget,
    pub stderr: StdioTarget,
    pub onetime: bool,
    pub max_startup: Duration,
    pub max_shutdown: Duration,
    pub restart_delay: Duration,
    pub default_delay: Duration,
    pub jitter: JitterPolicy,
    pub ready: ProbeRef,
    pub behaviors: Vec<BehaviorSpec>,
    pub preruns: Vec<Arc<Task>>,
}

/// Mutable bookkeeping, guarded by a short-lived lock.
///
/// Writers are the task's own `start`/`kill` and, between incarnations,
/// the parent's child monitor. The lock is never held across an await.
struct State {
    restart_delay: Duration,
    fail_count: u32,
    dying: bool,
    incarnation: Option<Incarnation>,
}

/// Per-incarnation handles. Cloned out of the lock before use.
#[derive(Clone)]
pub(crate) struct Incarnation {
    pub stopped: CancellationToken,
    pub pid: Option<u32>,
    pub exited: watch::Receiver<Option<ExitStatus>>,
}

impl Incarnation {
    fn has_exited(&self) -> bool {
        self.exited.borrow().is_some()
    }
}

/// One supervised process and a node in the dependency tree.
pub struct Task {
    pub(super) name: String,
    pub(super) path: Option<PathBuf>,
    pub(super) args: Vec<String>,
    pub(super) env: BTreeMap<String, String>,
    pub(super) stdout: StdioTarget,
    pub(super) stderr: StdioTarget,
    pub(super) onetime: bool,
    pub(super) max_startup: Duration,
    pub(super) max_shutdown: Duration,
    pub(super) default_delay: Duration,
    pub(super) jitter: JitterPolicy,
    pub(super) ready: ProbeRef,
    pub(super) behaviors: Vec<BehaviorSpec>,
    pub(super) preruns: Vec<Arc<Task>>,
    dependents: OnceLock<Vec<Arc<Task>>>,
    state: Mutex<State>,
}

impl Task {
    pub(crate) fn new(settings: TaskSettings) -> Arc<Self> {
        Arc::new(Self {
            name: settings.name,
            path: settings.path,
            args: settings.args,
            env: settings.env,
            stdout: settings.stdout,
            stderr: settings.stderr,
            onetime: settings.onetime,
            max_startup: settings.max_startup,
            max_shutdown: settings.max_shutdown,
            default_delay: settings.default_delay,
            jitter: settings.jitter,
            ready: settings.ready,
            behaviors: settings.behaviors,
            preruns: settings.preruns,
            dependents: OnceLock::new(),
            state: Mutex::new(State {
                restart_delay: settings.restart_delay,
                fail_count: 0,
                dying: false,
                incarnation: None,
            }),
        })
    }

    /// The task's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for run-to-completion tasks.
    pub fn onetime(&self) -> bool {
        self.onetime
    }

    /// Tasks started after this one reaches Ready and stopped before it.
    pub fn dependents(&self) -> &[Arc<Task>] {
        self.dependents.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Wires the dependents once, at build time.
    pub(crate) fn set_dependents(&self, dependents: Vec<Arc<Task>>) {
        let _ = self.dependents.set(dependents);
    }

    /// Current restart backoff.
    pub fn restart_delay(&self) -> Duration {
        self.state().restart_delay
    }

    /// Number of restarts so far.
    pub fn fail_count(&self) -> u32 {
        self.state().fail_count
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn incarnation(&self) -> Option<Incarnation> {
        self.state().incarnation.clone()
    }

    /// The current incarnation's stop token, if one is live.
    pub(crate) fn stop_token(&self) -> Option<CancellationToken> {
        self.state()
            .incarnation
            .as_ref()
            .map(|inc| inc.stopped.clone())
    }

    /// True when no child of this task is running.
    pub(crate) fn exited(&self) -> bool {
        self.state()
            .incarnation
            .as_ref()
            .map(Incarnation::has_exited)
            .unwrap_or(true)
    }

    /// Relaxes the restart delay one step toward the configured default.
    pub(crate) fn relax_restart_delay(&self) {
        let mut state = self.state();
        state.restart_delay = backoff::relax(state.restart_delay, self.default_delay);
    }

    /// Records one restart: bumps the counter and doubles the delay.
    pub(crate) fn note_restart(&self) -> (u32, Duration) {
        let mut state = self.state();
        state.fail_count += 1;
        state.restart_delay = backoff::escalate(state.restart_delay);
        (state.fail_count, state.restart_delay)
    }

    /// Resolves when the current incarnation stops. A task with no live
    /// incarnation counts as already down.
    pub(crate) async fn wait_down(&self) {
        if let Some(token) = self.stop_token() {
            token.cancelled().await;
        }
    }

    /// Resolves when this task's incarnation has stopped; immediately for
    /// tasks that never established one.
    pub async fn wait_stopped(&self) {
        self.wait_down().await;
    }

    /// Starts the task: pre-runs to completion, then the process, then
    /// readiness, then monitors, then dependents.
    ///
    /// `parent_stop` cancels when the parent wants this subtree torn
    /// down; `None` for roots.
    pub fn start(
        self: Arc<Self>,
        parent_stop: Option<CancellationToken>,
    ) -> BoxFuture<'static, Result<(), StartError>> {
        Box::pin(async move {
            for prerun in &self.preruns {
                if let Err(e) = Arc::clone(prerun).start(parent_stop.clone()).await {
                    warn!(task = %self.name, prerun = %prerun.name(), error = %e, "pre-run failed");
                    return Err(StartError::PreRun {
                        name: prerun.name().to_string(),
                        source: Box::new(e),
                    });
                }
            }

            // A task without an executable only aggregates its pre-runs.
            let Some(path) = self.path.clone() else {
                return Ok(());
            };

            let mut child = process::spawn(&self, &path)?;

            if self.onetime {
                let status = child.wait().await.map_err(StartError::Wait)?;
                return if status.success() {
                    info!(task = %self.name, "onetime run complete");
                    Ok(())
                } else {
                    Err(StartError::OnetimeFailed {
                        code: status.code(),
                    })
                };
            }

            // Readiness gate: poll the probe while watching for an early
            // exit, bounded by the startup deadline.
            let deadline = Instant::now() + self.max_startup;
            loop {
                if let Some(status) = child.try_wait().map_err(StartError::Wait)? {
                    warn!(task = %self.name, %status, "exited before ready");
                    return Err(StartError::ExitedBeforeReady {
                        code: status.code(),
                    });
                }
                if self.ready.check().await.code() == EventCode::Ok {
                    break;
                }
                let now = Instant::now();
                if now >= deadline {
                    warn!(task = %self.name, deadline = ?self.max_startup, "readiness deadline elapsed");
                    process::abort_startup(&self.name, child, self.max_shutdown);
                    return Err(StartError::ReadyTimeout(self.max_startup));
                }
                time::sleep(READY_POLL.min(deadline - now)).await;
            }

            // Fresh channels for this incarnation.
            let (status_tx, status_rx) = mpsc::channel(1);
            let stopped = CancellationToken::new();
            let (exit_tx, exit_rx) = watch::channel(None);
            let pid = child.id();
            {
                let mut state = self.state();
                state.dying = false;
                state.incarnation = Some(Incarnation {
                    stopped: stopped.clone(),
                    pid,
                    exited: exit_rx,
                });
            }

            tokio::spawn(watchers::master_monitor(
                self.name.clone(),
                status_rx,
                parent_stop.clone(),
                stopped.clone(),
            ));
            tokio::spawn(watchers::exit_watcher(
                self.name.clone(),
                child,
                status_tx.clone(),
                exit_tx,
            ));
            tokio::spawn(watchers::stop_monitor(Arc::clone(&self), stopped.clone()));

            for behavior in &self.behaviors {
                let monitor = FailMonitor::new(
                    Arc::clone(&behavior.probe),
                    behavior.period,
                    behavior.retries,
                );
                tokio::spawn(monitor.run(status_tx.clone(), stopped.clone()));
            }

            // Dependents come up in parallel; all of them finish starting
            // before this call returns.
            let mut set = JoinSet::new();
            for dependent in self.dependents() {
                let dependent = Arc::clone(dependent);
                let token = stopped.clone();
                set.spawn(async move {
                    let name = dependent.name().to_string();
                    (name, dependent.start(Some(token)).await)
                });
            }
            while let Some(joined) = set.join_next().await {
                if let Ok((name, Err(e))) = joined {
                    warn!(task = %self.name, dependent = %name, error = %e, "dependent failed to start");
                }
            }

            for dependent in self.dependents() {
                tokio::spawn(watchers::child_monitor(
                    Arc::clone(&self),
                    Arc::clone(dependent),
                    stopped.clone(),
                ));
            }

            info!(task = %self.name, pid, "ready");
            Ok(())
        })
    }

    /// Idempotent cascaded shutdown: dependents first, then this task's
    /// own process, escalating after `max_shutdown`.
    pub fn kill(self: Arc<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let first = {
                let mut state = self.state();
                let first = !state.dying;
                state.dying = true;
                first
            };
            if !first {
                self.wait_for_shutdown().await;
                return;
            }

            let mut set = JoinSet::new();
            for dependent in self.dependents() {
                set.spawn(Arc::clone(dependent).kill());
            }
            while set.join_next().await.is_some() {}

            if let Some(inc) = self.incarnation() {
                if !inc.has_exited() {
                    if let Some(pid) = inc.pid {
                        info!(task = %self.name, pid, "terminating");
                        process::terminate(pid);
                    }
                }
            }
            self.wait_for_shutdown().await;
        })
    }

    /// Polls for process exit with exponentially lengthening intervals,
    /// starting at `max_shutdown / 64`; escalates to [`Task::destroy`]
    /// when the deadline passes.
    async fn wait_for_shutdown(self: &Arc<Self>) {
        let deadline = Instant::now() + self.max_shutdown;
        let mut interval = self.max_shutdown / 64;
        loop {
            if self.exited() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                self.clone().destroy().await;
                return;
            }
            let nap = interval
                .max(Duration::from_millis(1))
                .min(deadline - now);
            time::sleep(nap).await;
            interval = interval.saturating_mul(2);
        }
    }

    /// Last resort: unconditional kill of the whole subtree, waiting for
    /// the OS to reap each process.
    fn destroy(self: Arc<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let mut set = JoinSet::new();
            for dependent in self.dependents() {
                set.spawn(Arc::clone(dependent).destroy());
            }
            while set.join_next().await.is_some() {}

            if let Some(inc) = self.incarnation() {
                if !inc.has_exited() {
                    if let Some(pid) = inc.pid {
                        warn!(task = %self.name, pid, "graceful shutdown timed out, killing");
                        process::obliterate(pid);
                    }
                    let mut exited = inc.exited.clone();
                    loop {
                        if exited.borrow_and_update().is_some() {
                            break;
                        }
                        if exited.changed().await.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::ImmediateOk;

    fn bare_task(delay: Duration, default: Duration) -> Arc<Task> {
        Task::new(TaskSettings {
            name: "t".into(),
            path: None,
            args: vec![],
            env: BTreeMap::new(),
            stdout: StdioTarget::Discard,
            stderr: StdioTarget::Discard,
            onetime: false,
            max_startup: Duration::from_secs(1),
            max_shutdown: Duration::from_secs(1),
            restart_delay: delay,
            default_delay: default,
            jitter: JitterPolicy::None,
            ready: Arc::new(ImmediateOk),
            behaviors: vec![],
            preruns: vec![],
        })
    }

    #[test]
    fn note_restart_doubles_and_counts() {
        let task = bare_task(Duration::from_millis(50), Duration::from_millis(50));
        assert_eq!(task.fail_count(), 0);

        let (count, delay) = task.note_restart();
        assert_eq!(count, 1);
        assert_eq!(delay, Duration::from_millis(100));

        let (count, delay) = task.note_restart();
        assert_eq!(count, 2);
        assert_eq!(delay, Duration::from_millis(200));
    }

    #[test]
    fn relax_converges_to_default() {
        let task = bare_task(Duration::from_secs(30), Duration::from_secs(10));
        task.relax_restart_delay();
        assert_eq!(task.restart_delay(), Duration::from_secs(28));

        for _ in 0..200 {
            task.relax_restart_delay();
        }
        assert!(task.restart_delay().abs_diff(Duration::from_secs(10)) < Duration::from_millis(1));
    }

    #[test]
    fn fresh_task_counts_as_exited() {
        let task = bare_task(Duration::from_millis(50), Duration::from_millis(50));
        assert!(task.exited());
        assert!(task.stop_token().is_none());
    }

    #[tokio::test]
    async fn aggregator_start_is_a_noop() {
        let task = bare_task(Duration::from_millis(50), Duration::from_millis(50));
        task.clone().start(None).await.unwrap();
        assert!(task.incarnation().is_none());
    }
}
