//! # Restart-delay escalation and relaxation.
//!
//! A task's restart delay moves in two directions:
//!
//! - [`escalate`] doubles it each time the task's parent restarts it, which
//!   bounds the restart rate under sustained failure.
//! - [`relax`] pulls it back toward a configured default while the task
//!   stays healthy, using the exponential-smoothing rule
//!   `next = default + ((current - default) * 9) / 10`.
//!
//! The relaxation rule produces asymptotic decay: after `k` ticks the
//! deviation from the default is at most `0.9^k` times the initial
//! deviation, in either direction.

use std::time::Duration;

/// Doubles the delay, saturating at the maximum representable duration.
#[inline]
pub fn escalate(current: Duration) -> Duration {
    current.saturating_mul(2)
}

/// Relaxes the delay one step toward `default`.
///
/// Works in signed nanoseconds so delays below the default decay upward
/// just as delays above it decay downward.
pub fn relax(current: Duration, default: Duration) -> Duration {
    let current = current.as_nanos() as i128;
    let default = default.as_nanos() as i128;
    let next = default + ((current - default) * 9) / 10;
    Duration::from_nanos(next.max(0) as u64)
}
