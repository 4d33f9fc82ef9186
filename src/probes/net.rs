//! TCP port probes.

use std::time::Duration;

use async_trait::async_trait;

use tokio::net::{TcpListener, TcpStream};
use tokio::time;

use crate::events::Event;
use crate::probes::Probe;

/// Probes whether something is accepting connections on a local port.
///
/// `Ok` iff a TCP connection to `127.0.0.1:port` succeeds within the
/// timeout. The connection is dropped immediately after the handshake.
pub struct PortInUse {
    port: u16,
    timeout: Duration,
    label: String,
}

impl PortInUse {
    /// Default connect timeout when the config does not give one.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

    pub fn new(port: u16, timeout: Duration) -> Self {
        Self {
            port,
            timeout,
            label: format!("portinuse:{port}"),
        }
    }
}

#[async_trait]
impl Probe for PortInUse {
    fn name(&self) -> &str {
        &self.label
    }

    async fn check(&self) -> Event {
        match time::timeout(self.timeout, TcpStream::connect(("127.0.0.1", self.port))).await {
            Ok(Ok(_stream)) => Event::ok(),
            Ok(Err(e)) => Event::failed(format!("connect 127.0.0.1:{}: {e}", self.port)),
            Err(_elapsed) => Event::failed(format!(
                "connect 127.0.0.1:{} timed out after {:?}",
                self.port, self.timeout
            )),
        }
    }
}

/// Probes whether a local port is free to bind.
///
/// `Ok` iff binding a listener on `127.0.0.1:port` succeeds; the listener
/// is closed before returning.
pub struct PortAvailable {
    port: u16,
    label: String,
}

impl PortAvailable {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            label: format!("portavailable:{port}"),
        }
    }
}

#[async_trait]
impl Probe for PortAvailable {
    fn name(&self) -> &str {
        &self.label
    }

    async fn check(&self) -> Event {
        match TcpListener::bind(("127.0.0.1", self.port)).await {
            Ok(listener) => {
                drop(listener);
                Event::ok()
            }
            Err(e) => Event::failed(format!("bind 127.0.0.1:{}: {e}", self.port)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventCode;

    #[tokio::test]
    async fn port_in_use_detects_listener() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = PortInUse::new(port, Duration::from_millis(500));
        assert_eq!(probe.check().await.code(), EventCode::Ok);

        drop(listener);
        let probe = PortInUse::new(port, Duration::from_millis(100));
        assert_eq!(probe.check().await.code(), EventCode::Failed);
    }

    #[tokio::test]
    async fn port_available_sees_free_and_taken() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = PortAvailable::new(port);
        assert_eq!(probe.check().await.code(), EventCode::Failed);

        drop(listener);
        let probe = PortAvailable::new(port);
        assert_eq!(probe.check().await.code(), EventCode::Ok);
    }

    #[tokio::test]
    async fn port_available_releases_the_listener() {
        let probe = PortAvailable::new(0);
        assert_eq!(probe.check().await.code(), EventCode::Ok);
        assert_eq!(probe.check().await.code(), EventCode::Ok);
    }
}
