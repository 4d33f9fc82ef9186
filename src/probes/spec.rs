//! Probe specifications as they appear in configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::config::de;
use crate::error::BuildError;
use crate::probes::{EnsureDir, HttpPinger, PortAvailable, PortInUse, ProbeRef, RedisPinger};

/// One probe entry from the configuration, tagged by `type`.
///
/// Used both for prologue probes and for task monitors. Options and their
/// defaults:
///
/// | type | options |
/// |---|---|
/// | `portavailable` | `port` |
/// | `portinuse` | `port`, `timeout` (default 100 ms) |
/// | `ensuredir` | `path`, `perm` (octal string, default 0755) |
/// | `redis` | `addr` (default `localhost:6379`) |
/// | `http` | `url`, `timeout` (default 1 s) |
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProbeSpec {
    PortAvailable {
        port: u16,
    },
    PortInUse {
        port: u16,
        #[serde(default, deserialize_with = "de::duration_opt")]
        timeout: Option<Duration>,
    },
    EnsureDir {
        path: PathBuf,
        #[serde(default)]
        perm: Option<String>,
    },
    Redis {
        #[serde(default)]
        addr: Option<String>,
    },
    Http {
        url: String,
        #[serde(default, deserialize_with = "de::duration_opt")]
        timeout: Option<Duration>,
    },
}

impl ProbeSpec {
    /// Instantiates the probe this spec describes.
    pub fn build(&self) -> Result<ProbeRef, BuildError> {
        Ok(match self {
            ProbeSpec::PortAvailable { port } => Arc::new(PortAvailable::new(*port)),
            ProbeSpec::PortInUse { port, timeout } => Arc::new(PortInUse::new(
                *port,
                timeout.unwrap_or(PortInUse::DEFAULT_TIMEOUT),
            )),
            ProbeSpec::EnsureDir { path, perm } => {
                let mode = match perm {
                    Some(p) => u32::from_str_radix(p, 8)
                        .map_err(|_| BuildError::BadPermission(p.clone()))?,
                    None => EnsureDir::DEFAULT_MODE,
                };
                Arc::new(EnsureDir::new(path.clone(), mode))
            }
            ProbeSpec::Redis { addr } => Arc::new(RedisPinger::new(
                addr.clone()
                    .unwrap_or_else(|| RedisPinger::DEFAULT_ADDR.to_string()),
            )),
            ProbeSpec::Http { url, timeout } => Arc::new(HttpPinger::new(
                url.clone(),
                timeout.unwrap_or(HttpPinger::DEFAULT_TIMEOUT),
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        probe: ProbeSpec,
    }

    fn parse(snippet: &str) -> ProbeSpec {
        toml::from_str::<Holder>(snippet).unwrap().probe
    }

    #[test]
    fn parses_every_probe_type() {
        assert!(matches!(
            parse("probe = { type = \"portavailable\", port = 9000 }"),
            ProbeSpec::PortAvailable { port: 9000 }
        ));
        assert!(matches!(
            parse("probe = { type = \"portinuse\", port = 80, timeout = \"250ms\" }"),
            ProbeSpec::PortInUse {
                port: 80,
                timeout: Some(t)
            } if t == Duration::from_millis(250)
        ));
        assert!(matches!(
            parse("probe = { type = \"ensuredir\", path = \"/tmp/x\" }"),
            ProbeSpec::EnsureDir { perm: None, .. }
        ));
        assert!(matches!(
            parse("probe = { type = \"redis\" }"),
            ProbeSpec::Redis { addr: None }
        ));
        assert!(matches!(
            parse("probe = { type = \"http\", url = \"http://localhost:8080/health\" }"),
            ProbeSpec::Http { timeout: None, .. }
        ));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let out = toml::from_str::<Holder>("probe = { type = \"smoke\" }");
        assert!(out.is_err());
    }

    #[test]
    fn bad_permission_fails_build() {
        let spec = parse("probe = { type = \"ensuredir\", path = \"/tmp/x\", perm = \"rwx\" }");
        assert!(matches!(spec.build(), Err(BuildError::BadPermission(_))));
    }

    #[test]
    fn octal_permission_parses() {
        let spec = parse("probe = { type = \"ensuredir\", path = \"/tmp/x\", perm = \"0700\" }");
        assert!(spec.build().is_ok());
    }
}
