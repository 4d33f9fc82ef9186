//! Redis health probe.

use std::time::Duration;

use async_trait::async_trait;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use crate::events::Event;
use crate::probes::Probe;

/// Probes a Redis server with an inline PING.
///
/// `Ok` iff the server answers `+PONG`. The config gives no timeout knob
/// for this probe; the whole exchange is bounded by a fixed one-second
/// deadline so a wedged server cannot stall the monitor schedule.
pub struct RedisPinger {
    addr: String,
    label: String,
}

const EXCHANGE_DEADLINE: Duration = Duration::from_secs(1);

impl RedisPinger {
    /// Default server address when the config does not give one.
    pub const DEFAULT_ADDR: &'static str = "localhost:6379";

    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        Self {
            label: format!("redis:{addr}"),
            addr,
        }
    }

    async fn ping(&self) -> Result<(), String> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| format!("connect {}: {e}", self.addr))?;

        stream
            .write_all(b"PING\r\n")
            .await
            .map_err(|e| format!("write: {e}"))?;

        let mut buf = [0u8; 32];
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| format!("read: {e}"))?;

        if buf[..n].starts_with(b"+PONG") {
            Ok(())
        } else {
            Err(format!(
                "unexpected reply {:?}",
                String::from_utf8_lossy(&buf[..n])
            ))
        }
    }
}

#[async_trait]
impl Probe for RedisPinger {
    fn name(&self) -> &str {
        &self.label
    }

    async fn check(&self) -> Event {
        match time::timeout(EXCHANGE_DEADLINE, self.ping()).await {
            Ok(Ok(())) => Event::ok(),
            Ok(Err(e)) => Event::failed(format!("ping {}: {e}", self.addr)),
            Err(_elapsed) => Event::failed(format!(
                "ping {}: timed out after {EXCHANGE_DEADLINE:?}",
                self.addr
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventCode;
    use tokio::net::TcpListener;

    async fn fake_redis(reply: &'static [u8]) -> String {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut drain = [0u8; 64];
            let _ = sock.read(&mut drain).await;
            let _ = sock.write_all(reply).await;
        });
        addr
    }

    #[tokio::test]
    async fn ok_on_pong() {
        let addr = fake_redis(b"+PONG\r\n").await;
        let probe = RedisPinger::new(addr);
        assert_eq!(probe.check().await.code(), EventCode::Ok);
    }

    #[tokio::test]
    async fn failed_on_error_reply() {
        let addr = fake_redis(b"-NOAUTH Authentication required.\r\n").await;
        let probe = RedisPinger::new(addr);
        let ev = probe.check().await;
        assert_eq!(ev.code(), EventCode::Failed);
        assert!(ev.error().unwrap().contains("NOAUTH"));
    }

    #[tokio::test]
    async fn failed_when_nothing_listens() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let probe = RedisPinger::new(addr);
        assert_eq!(probe.check().await.code(), EventCode::Failed);
    }
}
