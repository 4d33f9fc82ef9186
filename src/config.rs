//! # Configuration schema and binding.
//!
//! The supervisor is driven by a TOML document with five sections:
//!
//! ```toml
//! [env]
//! DATA = "${HOME}/data"
//!
//! [logger]
//! output = "stderr"      # stdout | stderr | discard
//! format = "text"        # text | json
//! level = "info"         # debug | info | warn | error
//!
//! [defaults]
//! restart_delay = "1s"   # relaxation target for task backoff
//! jitter = "none"        # none | full | equal
//!
//! [[prologue]]
//! type = "ensuredir"
//! path = "${HOME}/data"
//!
//! [[task]]
//! name = "api"
//! path = "/usr/local/bin/api-server"
//! args = ["--port", "8080"]
//! max_startup = "30s"
//! max_shutdown = "10s"
//!
//! [[task.monitors]]
//! name = "ready"
//! type = "portinuse"
//! port = 8080
//!
//! [[task.monitors]]
//! name = "health"
//! type = "http"
//! url = "http://localhost:8080/health"
//! period = "15s"
//! retries = 3
//! ```
//!
//! Durations are humantime strings (`"500ms"`, `"10s"`). Values in `[env]`
//! are interpolated: `$NAME` and `${NAME}` resolve against the `[env]`
//! table itself, falling back to the process environment; the expansion is
//! iterated up to five passes, and a reference that is still unresolved
//! afterwards is a build error.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::BuildError;
use crate::policies::JitterPolicy;
use crate::probes::ProbeSpec;

/// Serde helpers for humantime-formatted durations.
pub(crate) mod de {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        duration(deserializer).map(Some)
    }
}

/// Where the log stream goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    Discard,
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Minimum level that gets emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// The `[logger]` section.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub output: LogOutput,
    pub format: LogFormat,
    pub level: LogLevel,
}

/// The `[defaults]` section: knobs shared by every task.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// The relaxation target for restart backoff, and the initial restart
    /// delay for tasks that do not set their own.
    #[serde(deserialize_with = "de::duration")]
    pub restart_delay: Duration,
    /// Jitter applied to restart sleeps.
    pub jitter: JitterPolicy,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            restart_delay: Duration::from_secs(1),
            jitter: JitterPolicy::None,
        }
    }
}

/// One monitor entry under a task: a probe spec plus scheduling knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSpec {
    /// Monitor name; the one named `ready` becomes the readiness probe.
    pub name: String,
    /// Probe period. Ignored for the readiness probe.
    #[serde(default = "MonitorSpec::default_period", deserialize_with = "de::duration")]
    pub period: Duration,
    /// Consecutive failures tolerated before `Failed` escalates.
    #[serde(default = "MonitorSpec::default_retries")]
    pub retries: u32,
    /// The probe itself, tagged by `type`.
    #[serde(flatten)]
    pub probe: ProbeSpec,
}

impl MonitorSpec {
    /// Name reserved for the readiness probe.
    pub const READY: &'static str = "ready";

    fn default_period() -> Duration {
        Duration::from_secs(15)
    }

    fn default_retries() -> u32 {
        3
    }

    /// True when this entry is the readiness probe.
    pub fn is_ready(&self) -> bool {
        self.name == Self::READY
    }
}

/// One `[[task]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Unique task name.
    pub name: String,
    /// Executable path. Absent for a pure pre-run aggregator.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Arguments, in order.
    #[serde(default)]
    pub args: Vec<String>,
    /// Run to completion instead of supervising.
    #[serde(default)]
    pub onetime: bool,
    /// Stdout target: a file path, `SUPPRESS`, or empty for discard.
    #[serde(default)]
    pub stdout: Option<String>,
    /// Stderr target, same forms as `stdout`.
    #[serde(default)]
    pub stderr: Option<String>,
    /// Name of the parent task; empty for a root.
    #[serde(default)]
    pub parent: Option<String>,
    /// Names of tasks run to completion, in order, before this one launches.
    #[serde(default)]
    pub prerun: Vec<String>,
    /// Deadline from launch to Ready.
    #[serde(default = "TaskConfig::default_max_startup", deserialize_with = "de::duration")]
    pub max_startup: Duration,
    /// Deadline from SIGTERM to exit, after which the kill escalates.
    #[serde(default = "TaskConfig::default_max_shutdown", deserialize_with = "de::duration")]
    pub max_shutdown: Duration,
    /// Initial restart backoff; defaults to `[defaults] restart_delay`.
    #[serde(default, deserialize_with = "de::duration_opt")]
    pub restart_delay: Option<Duration>,
    /// Readiness probe and behavior monitors.
    #[serde(default)]
    pub monitors: Vec<MonitorSpec>,
}

impl TaskConfig {
    fn default_max_startup() -> Duration {
        Duration::from_secs(30)
    }

    fn default_max_shutdown() -> Duration {
        Duration::from_secs(10)
    }
}

/// The whole configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment passed to every child, interpolated at build time.
    pub env: BTreeMap<String, String>,
    /// Logging setup.
    pub logger: LoggerConfig,
    /// Shared task knobs.
    pub defaults: DefaultsConfig,
    /// Probes that must all report `Ok` before any task is started.
    pub prologue: Vec<ProbeSpec>,
    /// The task forest.
    pub task: Vec<TaskConfig>,
}

impl Config {
    /// Parses a TOML document and interpolates its `[env]` table.
    pub fn from_toml(raw: &str) -> Result<Self, BuildError> {
        let mut config: Config = toml::from_str(raw)?;
        config.env = interpolate(&config.env)?;
        Ok(config)
    }
}

/// Maximum interpolation passes before a remaining reference is an error.
const MAX_PASSES: usize = 5;

/// Expands `$NAME` / `${NAME}` references in every value of `env`.
///
/// References resolve against `env` itself first, then against the process
/// environment. Expansion iterates until stable or [`MAX_PASSES`] passes,
/// whichever comes first.
fn interpolate(env: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, BuildError> {
    let mut resolved = env.clone();

    for _ in 0..MAX_PASSES {
        let snapshot = resolved.clone();
        let mut changed = false;
        for value in resolved.values_mut() {
            let (expanded, _) = expand(value, &snapshot);
            if expanded != *value {
                *value = expanded;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    for (key, value) in &resolved {
        let (_, unresolved) = expand(value, &resolved);
        if let Some(name) = unresolved {
            return Err(BuildError::UnresolvedEnv {
                name,
                entry: key.clone(),
            });
        }
    }

    Ok(resolved)
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Expands one value; returns the expansion and the first reference that
/// could not be resolved, if any.
fn expand(value: &str, vars: &BTreeMap<String, String>) -> (String, Option<String>) {
    let mut out = String::with_capacity(value.len());
    let mut unresolved = None;
    let mut chars = value.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let name: String = match chars.peek() {
            Some((_, '{')) => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed || name.is_empty() {
                    out.push_str("${");
                    out.push_str(&name);
                    if unresolved.is_none() {
                        unresolved = Some(name);
                    }
                    continue;
                }
                name
            }
            Some((_, c)) if is_ident(*c) && !c.is_ascii_digit() => {
                let mut name = String::new();
                while let Some((_, c)) = chars.peek() {
                    if is_ident(*c) {
                        name.push(*c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                name
            }
            _ => {
                out.push('$');
                continue;
            }
        };

        match vars.get(&name).cloned().or_else(|| std::env::var(&name).ok()) {
            Some(v) => out.push_str(&v),
            None => {
                out.push('$');
                out.push_str(&name);
                if unresolved.is_none() {
                    unresolved = Some(name);
                }
            }
        }
    }

    (out, unresolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_document() {
        let raw = r#"
            [env]
            PORT = "8080"

            [logger]
            output = "stderr"
            format = "json"
            level = "debug"

            [defaults]
            restart_delay = "250ms"
            jitter = "equal"

            [[prologue]]
            type = "ensuredir"
            path = "/tmp/procmon"

            [[task]]
            name = "api"
            path = "/usr/local/bin/api"
            args = ["--port", "8080"]
            max_startup = "5s"

            [[task.monitors]]
            name = "ready"
            type = "portinuse"
            port = 8080

            [[task.monitors]]
            name = "health"
            type = "http"
            url = "http://localhost:8080/health"
            period = "30s"
            retries = 2

            [[task]]
            name = "worker"
            path = "/usr/local/bin/worker"
            parent = "api"
        "#;

        let config = Config::from_toml(raw).unwrap();
        assert_eq!(config.logger.output, LogOutput::Stderr);
        assert_eq!(config.logger.format, LogFormat::Json);
        assert_eq!(config.defaults.restart_delay, Duration::from_millis(250));
        assert_eq!(config.defaults.jitter, JitterPolicy::Equal);
        assert_eq!(config.prologue.len(), 1);
        assert_eq!(config.task.len(), 2);

        let api = &config.task[0];
        assert_eq!(api.max_startup, Duration::from_secs(5));
        assert_eq!(api.max_shutdown, Duration::from_secs(10));
        assert!(api.monitors[0].is_ready());
        assert_eq!(api.monitors[1].period, Duration::from_secs(30));
        assert_eq!(api.monitors[1].retries, 2);

        assert_eq!(config.task[1].parent.as_deref(), Some("api"));
    }

    #[test]
    fn monitor_defaults_apply() {
        let raw = r#"
            [[task]]
            name = "t"
            path = "/bin/true"

            [[task.monitors]]
            name = "health"
            type = "redis"
        "#;
        let config = Config::from_toml(raw).unwrap();
        let monitor = &config.task[0].monitors[0];
        assert_eq!(monitor.period, Duration::from_secs(15));
        assert_eq!(monitor.retries, 3);
    }

    #[test]
    fn bad_duration_is_a_parse_error() {
        let raw = r#"
            [[task]]
            name = "t"
            max_startup = "soon"
        "#;
        assert!(matches!(
            Config::from_toml(raw),
            Err(BuildError::Parse(_))
        ));
    }

    #[test]
    fn interpolates_between_entries() {
        let mut env = BTreeMap::new();
        env.insert("ROOT".to_string(), "/srv/app".to_string());
        env.insert("DATA".to_string(), "$ROOT/data".to_string());
        env.insert("CACHE".to_string(), "${DATA}/cache".to_string());

        let out = interpolate(&env).unwrap();
        assert_eq!(out["DATA"], "/srv/app/data");
        assert_eq!(out["CACHE"], "/srv/app/data/cache");
    }

    #[test]
    fn interpolation_is_idempotent() {
        let mut env = BTreeMap::new();
        env.insert("A".to_string(), "a".to_string());
        env.insert("B".to_string(), "$A/b".to_string());

        let once = interpolate(&env).unwrap();
        let twice = interpolate(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn falls_back_to_process_environment() {
        std::env::set_var("PROCMON_TEST_FALLBACK", "from-process");
        let mut env = BTreeMap::new();
        env.insert("X".to_string(), "${PROCMON_TEST_FALLBACK}".to_string());

        let out = interpolate(&env).unwrap();
        assert_eq!(out["X"], "from-process");
    }

    #[test]
    fn unresolved_reference_is_fatal() {
        let mut env = BTreeMap::new();
        env.insert("X".to_string(), "$PROCMON_NO_SUCH_VAR_EVER".to_string());

        match interpolate(&env) {
            Err(BuildError::UnresolvedEnv { name, entry }) => {
                assert_eq!(name, "PROCMON_NO_SUCH_VAR_EVER");
                assert_eq!(entry, "X");
            }
            other => panic!("expected UnresolvedEnv, got {other:?}"),
        }
    }

    #[test]
    fn lone_dollar_is_literal() {
        let mut env = BTreeMap::new();
        env.insert("PRICE".to_string(), "cost: 5$ (flat)".to_string());

        let out = interpolate(&env).unwrap();
        assert_eq!(out["PRICE"], "cost: 5$ (flat)");
    }
}
