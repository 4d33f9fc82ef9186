//! # Periodic probe driver.
//!
//! A [`Monitor`] owns one probe, a period, and an emit channel. Its loop
//! sleeps one period, invokes the probe, and sends the resulting event —
//! in that order, forever, until the shared done token cancels.
//!
//! ## Guarantees
//! - At most one probe invocation is in flight per monitor: the loop is
//!   strictly sequential.
//! - The send is synchronous. A consumer that does not drain promptly
//!   throttles the probe schedule rather than piling events up.
//! - After the done token cancels, no further event is sent.
//! - The monitor never closes the emit channel for other senders.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::events::Event;
use crate::probes::ProbeRef;

/// Drives one probe on a fixed period, emitting events to a channel.
pub struct Monitor {
    probe: ProbeRef,
    period: Duration,
    emit: mpsc::Sender<Event>,
}

impl Monitor {
    pub fn new(probe: ProbeRef, period: Duration, emit: mpsc::Sender<Event>) -> Self {
        Self {
            probe,
            period,
            emit,
        }
    }

    /// Runs until `done` cancels or the consumer goes away.
    pub async fn run(self, done: CancellationToken) {
        loop {
            tokio::select! {
                _ = done.cancelled() => return,
                _ = time::sleep(self.period) => {}
            }

            let ev = self.probe.check().await;

            tokio::select! {
                _ = done.cancelled() => return,
                sent = self.emit.send(ev) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
