//! # Fail adapter: the task-side end of a behavior monitor.
//!
//! [`FailMonitor`] assembles the full monitor pipeline for one probe:
//! a periodic [`Monitor`] driver feeding a private channel, a
//! [`RetryGate`] mapping its events, and a forwarding loop that puts the
//! mapped events on the owning task's status channel.
//!
//! A `Failed` that makes it through the gate means "this task should
//! restart": the adapter forwards it and then escalates by sending `Stop`.
//! The adapter terminates when the task's stop token cancels or when the
//! status consumer goes away.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tracing::debug;

use crate::events::{Event, EventCode};
use crate::monitors::{Monitor, RetryGate};
use crate::probes::ProbeRef;

/// One behavior monitor, fully wired: probe, period, retry threshold.
pub struct FailMonitor {
    probe: ProbeRef,
    period: Duration,
    retries: u32,
}

impl FailMonitor {
    pub fn new(probe: ProbeRef, period: Duration, retries: u32) -> Self {
        Self {
            probe,
            period,
            retries,
        }
    }

    /// Runs the pipeline until `stopped` cancels.
    ///
    /// The inner driver exits with the same token, or — if this loop
    /// returns first — on its next send into the dropped private channel.
    pub async fn run(self, status: mpsc::Sender<Event>, stopped: CancellationToken) {
        let name = self.probe.name().to_string();
        let (tx, mut rx) = mpsc::channel(1);
        tokio::spawn(Monitor::new(self.probe, self.period, tx).run(stopped.clone()));

        let mut gate = RetryGate::new(self.retries);
        loop {
            let ev = tokio::select! {
                _ = stopped.cancelled() => return,
                ev = rx.recv() => match ev {
                    Some(ev) => ev,
                    None => return,
                },
            };

            let mapped = gate.observe(ev);
            let escalate = mapped.code() == EventCode::Failed;
            if status.send(mapped).await.is_err() {
                return;
            }
            if escalate {
                debug!(monitor = %name, "failure threshold crossed, requesting stop");
                if status.send(Event::stop()).await.is_err() {
                    return;
                }
            }
        }
    }
}
