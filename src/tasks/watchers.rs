//! # Per-incarnation watcher loops.
//!
//! Each incarnation of a task owns four kinds of long-lived loops, all
//! capturing the channels they were launched with:
//!
//! - [`master_monitor`] — the sole canceller of the incarnation's stop
//!   token.
//! - [`exit_watcher`] — owns the child; turns its exit into a terminate
//!   event.
//! - [`stop_monitor`] — turns a cancelled stop token into a `kill`.
//! - [`child_monitor`] — one per dependent; the restarter.

use std::process::ExitStatus;
use std::sync::Arc;

use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tokio_util::sync::CancellationToken;

use tracing::{debug, info, trace, warn};

use crate::events::{Event, EventCode};
use crate::tasks::task::Task;

/// Multiplexes the incarnation's status channel against the parent's stop
/// token.
///
/// Only a `Stop` event (or the parent going down, or every sender
/// vanishing) triggers shutdown; other codes are advisory and are logged
/// at the task's level. Exactly one code path cancels the stop token.
pub(super) async fn master_monitor(
    name: String,
    mut status: mpsc::Receiver<Event>,
    parent_stop: Option<CancellationToken>,
    stopped: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = wait_parent(parent_stop.as_ref()) => {
                debug!(task = %name, "parent stopped, cascading");
                stopped.cancel();
                return;
            }
            ev = status.recv() => {
                let Some(ev) = ev else {
                    stopped.cancel();
                    return;
                };
                match ev.code() {
                    EventCode::Stop => {
                        match ev.exit_code() {
                            Some(code) => info!(task = %name, code, "stop: process exited"),
                            None => info!(task = %name, error = ev.error(), "stop requested"),
                        }
                        stopped.cancel();
                        return;
                    }
                    EventCode::Failed => {
                        warn!(task = %name, error = ev.error(), "monitor failure")
                    }
                    EventCode::Failing => {
                        warn!(task = %name, error = ev.error(), "monitor failing")
                    }
                    EventCode::Ok => trace!(task = %name, "monitor ok"),
                }
            }
        }
    }
}

async fn wait_parent(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Blocks on the child's completion and reports it exactly once on the
/// status channel that was current when the watcher was launched.
///
/// The exit status is published to the watch cell first, so `kill` polls
/// observe the exit even when the status channel is no longer drained.
pub(super) async fn exit_watcher(
    name: String,
    mut child: Child,
    status: mpsc::Sender<Event>,
    exited: watch::Sender<Option<ExitStatus>>,
) {
    let outcome = child.wait().await;
    let code = match &outcome {
        Ok(st) => {
            debug!(task = %name, status = %st, "process exited");
            st.code()
        }
        Err(e) => {
            warn!(task = %name, error = %e, "wait on child failed");
            None
        }
    };
    let _ = exited.send(outcome.ok());
    let _ = status.send(Event::terminated(code)).await;
}

/// Waits for the incarnation's stop token, then tears the task down.
pub(super) async fn stop_monitor(task: Arc<Task>, stopped: CancellationToken) {
    stopped.cancelled().await;
    task.kill().await;
}

/// The restarter: one per (parent, dependent) pair per parent incarnation.
///
/// Three concerns multiplexed in one loop:
/// - every `parent.restart_delay` tick, relax the parent's own delay
///   toward the configured default;
/// - when the parent stops, return without restarting anything;
/// - when the dependent goes down, wait out its backoff, double it, and
///   start a fresh incarnation with the parent's stop token.
///
/// The dependent's current stop token is re-read on every iteration, so
/// an incarnation swap between ticks is observed on the next pass. A
/// dependent that failed to start has no incarnation and counts as down,
/// which is what schedules its backed-off retry.
pub(super) async fn child_monitor(
    parent: Arc<Task>,
    dependent: Arc<Task>,
    parent_stop: CancellationToken,
) {
    if dependent.onetime() {
        // Completed onetime runs leave nothing to supervise.
        return;
    }

    loop {
        let tick = parent.restart_delay();
        tokio::select! {
            _ = parent_stop.cancelled() => return,
            _ = time::sleep(tick) => {
                parent.relax_restart_delay();
            }
            _ = dependent.wait_down() => {
                let backoff = dependent.jitter.apply(dependent.restart_delay());
                debug!(
                    parent = %parent.name(),
                    dependent = %dependent.name(),
                    delay = ?backoff,
                    "dependent down, restart scheduled"
                );
                tokio::select! {
                    _ = parent_stop.cancelled() => return,
                    _ = time::sleep(backoff) => {}
                }

                let (restarts, next_delay) = dependent.note_restart();
                info!(
                    parent = %parent.name(),
                    dependent = %dependent.name(),
                    restarts,
                    next_delay = ?next_delay,
                    "restarting dependent"
                );
                if let Err(e) = Arc::clone(&dependent)
                    .start(Some(parent_stop.clone()))
                    .await
                {
                    warn!(
                        parent = %parent.name(),
                        dependent = %dependent.name(),
                        error = %e,
                        "dependent restart failed"
                    );
                }
            }
        }
    }
}
