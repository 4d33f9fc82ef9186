//! HTTP health probe.

use std::time::Duration;

use async_trait::async_trait;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use crate::events::Event;
use crate::probes::Probe;

/// Probes an HTTP endpoint with a GET request.
///
/// `Ok` on any 2xx status; `Failed` on transport errors, on any other
/// status, and when the whole exchange does not finish within the timeout.
///
/// The request is a plain HTTP/1.1 GET over a TCP connection; no client
/// stack is pulled in for a health check. TLS endpoints are out of scope.
pub struct HttpPinger {
    url: String,
    timeout: Duration,
    label: String,
}

impl HttpPinger {
    /// Default exchange timeout when the config does not give one.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let url = url.into();
        Self {
            label: format!("http:{url}"),
            url,
            timeout,
        }
    }

    async fn request(&self) -> Result<u16, String> {
        let url = url::Url::parse(&self.url).map_err(|e| format!("invalid url: {e}"))?;
        let host = url.host_str().ok_or("no host in url")?.to_string();
        let port = url.port_or_known_default().unwrap_or(80);
        let path = url.path();
        let query = url.query().map(|q| format!("?{q}")).unwrap_or_default();

        let mut stream = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|e| format!("connect {host}:{port}: {e}"))?;

        let request =
            format!("GET {path}{query} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|e| format!("write: {e}"))?;

        // The status line fits well within the first kilobyte.
        let mut buf = [0u8; 1024];
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| format!("read: {e}"))?;

        let head = String::from_utf8_lossy(&buf[..n]);
        let first_line = head.lines().next().ok_or("empty response")?;
        let mut parts = first_line.split_whitespace();
        let _version = parts.next().ok_or("malformed status line")?;
        parts
            .next()
            .ok_or_else(|| format!("malformed status line: {first_line}"))?
            .parse::<u16>()
            .map_err(|_| format!("invalid status code in {first_line:?}"))
    }
}

#[async_trait]
impl Probe for HttpPinger {
    fn name(&self) -> &str {
        &self.label
    }

    async fn check(&self) -> Event {
        match time::timeout(self.timeout, self.request()).await {
            Ok(Ok(status)) if (200..300).contains(&status) => Event::ok(),
            Ok(Ok(status)) => Event::failed(format!("GET {}: status {status}", self.url)),
            Ok(Err(e)) => Event::failed(format!("GET {}: {e}", self.url)),
            Err(_elapsed) => Event::failed(format!(
                "GET {}: timed out after {:?}",
                self.url, self.timeout
            )),
        }
    }
}
