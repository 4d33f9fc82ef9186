//! # Retry gate: damping for transient probe errors.
//!
//! [`RetryGate`] converts the first `retries` consecutive `Failed` events
//! into `Failing` and only lets `Failed` through once the threshold is
//! crossed. A single `Ok` resets the counter.
//!
//! The counter is not time-bounded: a slow trickle of failures interleaved
//! with successes resets it every time and never reaches `Failed`. Callers
//! wanting leaky-bucket behavior must compose a different wrapper.

use crate::events::{Event, EventCode};

/// Threshold gate over a stream of probe events.
#[derive(Debug)]
pub struct RetryGate {
    retries: u32,
    fail_count: u32,
}

impl RetryGate {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            fail_count: 0,
        }
    }

    /// Maps one observed event.
    ///
    /// - `Ok` resets the counter and passes through.
    /// - `Failed` increments the counter; below or at the threshold it is
    ///   downgraded to `Failing`, above it passes through as `Failed`.
    /// - Everything else passes through unchanged.
    pub fn observe(&mut self, ev: Event) -> Event {
        match ev.code() {
            EventCode::Ok => {
                self.fail_count = 0;
                ev
            }
            EventCode::Failed => {
                self.fail_count += 1;
                if self.fail_count > self.retries {
                    ev
                } else {
                    ev.with_code(EventCode::Failing)
                }
            }
            _ => ev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(gate: &mut RetryGate, input: &[Event]) -> Vec<EventCode> {
        input
            .iter()
            .map(|ev| gate.observe(ev.clone()).code())
            .collect()
    }

    #[test]
    fn damps_failures_below_threshold() {
        let mut gate = RetryGate::new(2);
        let seq = codes(
            &mut gate,
            &[
                Event::ok(),
                Event::failed("a"),
                Event::failed("b"),
                Event::failed("c"),
            ],
        );
        assert_eq!(
            seq,
            vec![
                EventCode::Ok,
                EventCode::Failing,
                EventCode::Failing,
                EventCode::Failed,
            ]
        );
    }

    #[test]
    fn ok_resets_the_counter() {
        let mut gate = RetryGate::new(1);
        let seq = codes(
            &mut gate,
            &[
                Event::failed("a"),
                Event::ok(),
                Event::failed("b"),
                Event::failed("c"),
            ],
        );
        assert_eq!(
            seq,
            vec![
                EventCode::Failing,
                EventCode::Ok,
                EventCode::Failing,
                EventCode::Failed,
            ]
        );
    }

    #[test]
    fn zero_retries_fails_immediately() {
        let mut gate = RetryGate::new(0);
        assert_eq!(gate.observe(Event::failed("x")).code(), EventCode::Failed);
    }

    #[test]
    fn stop_passes_through_untouched() {
        let mut gate = RetryGate::new(3);
        let ev = gate.observe(Event::terminated(Some(2)));
        assert_eq!(ev.code(), EventCode::Stop);
        assert_eq!(ev.exit_code(), Some(2));
    }

    #[test]
    fn error_detail_survives_the_downgrade() {
        let mut gate = RetryGate::new(5);
        let ev = gate.observe(Event::failed("connection refused"));
        assert_eq!(ev.code(), EventCode::Failing);
        assert_eq!(ev.error(), Some("connection refused"));
    }
}
