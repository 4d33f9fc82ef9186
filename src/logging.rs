//! Structured-log setup from the `[logger]` config section.

use tracing::level_filters::LevelFilter;

use crate::config::{LogFormat, LogLevel, LogOutput, LoggerConfig};

impl LogLevel {
    fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Installs the global tracing subscriber described by `config`.
///
/// Call once, before the supervisor is built. A second call is a no-op
/// (the first subscriber wins), which keeps tests that initialize logging
/// from panicking.
pub fn init(config: &LoggerConfig) {
    let level = config.level.filter();

    macro_rules! install {
        ($writer:expr) => {
            match config.format {
                LogFormat::Text => {
                    let _ = tracing_subscriber::fmt()
                        .with_max_level(level)
                        .with_writer($writer)
                        .with_target(false)
                        .try_init();
                }
                LogFormat::Json => {
                    let _ = tracing_subscriber::fmt()
                        .json()
                        .with_max_level(level)
                        .with_writer($writer)
                        .with_target(false)
                        .try_init();
                }
            }
        };
    }

    match config.output {
        LogOutput::Stdout => install!(std::io::stdout),
        LogOutput::Stderr => install!(std::io::stderr),
        LogOutput::Discard => install!(std::io::sink),
    }
}
