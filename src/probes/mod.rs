//! # Health probes: single-shot checks over external resources.
//!
//! A probe is a small, stateless check: each invocation returns one
//! [`Event`](crate::Event) and closes every resource it opened before
//! returning. Probes are pure with respect to supervisor state; the
//! monitor layer owns periods, thresholds, and channels.
//!
//! ## Primitives
//! - [`HttpPinger`] — GET a URL, `Ok` on a 2xx status
//! - [`PortInUse`] — `Ok` iff a TCP connect succeeds within the timeout
//! - [`PortAvailable`] — `Ok` iff a listener can be bound
//! - [`EnsureDir`] — create a directory (and parents) if absent; idempotent
//! - [`RedisPinger`] — `Ok` on PING → PONG
//!
//! Configuration binds probes through [`ProbeSpec`].

mod fs;
mod http;
mod net;
mod redis;
mod spec;

use std::sync::Arc;

use async_trait::async_trait;

use crate::events::Event;

pub use fs::EnsureDir;
pub use http::HttpPinger;
pub use net::{PortAvailable, PortInUse};
pub use redis::RedisPinger;
pub use spec::ProbeSpec;

/// A single-shot health check.
///
/// Implementations must be cheap, must not block beyond their configured
/// timeout, and must not leave background work running after `check`
/// returns.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    /// Returns a stable, human-readable probe name for logs.
    fn name(&self) -> &str;

    /// Runs the check once and reports the outcome as an event.
    async fn check(&self) -> Event;
}

/// Shared handle to a probe.
pub type ProbeRef = Arc<dyn Probe>;

/// The default readiness probe: immediately `Ok`.
///
/// Tasks without an explicit `ready` monitor are considered ready the
/// moment their process is launched.
pub struct ImmediateOk;

#[async_trait]
impl Probe for ImmediateOk {
    fn name(&self) -> &str {
        "immediate"
    }

    async fn check(&self) -> Event {
        Event::ok()
    }
}
