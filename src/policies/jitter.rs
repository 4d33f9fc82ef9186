//! # Jitter policy for restart sleeps.
//!
//! [`JitterPolicy`] adds randomness to the restarter's backoff sleeps so
//! that several dependents knocked over by the same outage do not come back
//! in lockstep.
//!
//! - [`JitterPolicy::None`] — no randomization, predictable delays
//! - [`JitterPolicy::Full`] — random delay in `[0, delay]`
//! - [`JitterPolicy::Equal`] — `delay/2 + random[0, delay/2]`
//!
//! The default is `None`, which keeps restart trajectories exactly at the
//! doubled/relaxed values.

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// Policy controlling randomization of restart sleeps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterPolicy {
    /// Use the exact backoff delay.
    #[default]
    None,
    /// Random delay in `[0, delay]`. Maximum load spreading.
    Full,
    /// `delay/2 + random[0, delay/2]`. Preserves ~75% of the delay on
    /// average.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        if delay.is_zero() {
            return delay;
        }
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => {
                let nanos = delay.as_nanos() as u64;
                Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
            }
            JitterPolicy::Equal => {
                let half = delay / 2;
                let nanos = half.as_nanos() as u64;
                half + Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_millis(250);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn full_stays_within_bounds() {
        let d = Duration::from_millis(1000);
        for _ in 0..100 {
            assert!(JitterPolicy::Full.apply(d) <= d);
        }
    }

    #[test]
    fn equal_keeps_lower_half() {
        let d = Duration::from_millis(1000);
        for _ in 0..100 {
            let out = JitterPolicy::Equal.apply(d);
            assert!(out >= Duration::from_millis(500));
            assert!(out <= d);
        }
    }

    #[test]
    fn zero_delay_is_untouched() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
    }
}
