//! # Observability
//!
//! Log setup for roundtable hosts. The library itself only emits `tracing`
//! events; a host decides where they go by calling [`init`] once.
//!
//! Events carry an `event` field and the conversation id:
//!
//! | target | events |
//! |---|---|
//! | `llm_roundtable::orchestrator` | `conversation_started`, `turn_appended`, `turn_failed`, `summary_ready`, `summary_failed`, `conversation_reset` |
//! | `llm_roundtable::registry` | `sessions_bound`, `sessions_rehydrated` |
//! | `llm_roundtable::storage` | state saves (debug) |
//!
//! `RUST_LOG` directives are honoured on top of the configured level, e.g.
//! `RUST_LOG=llm_roundtable::registry=debug`.

use std::path::PathBuf;
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// How a host wants roundtable events reported.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Most verbose level recorded for `llm_roundtable` targets.
    pub level: Level,
    pub target: LogTarget,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            target: LogTarget::default(),
        }
    }
}

/// Where log lines are written.
#[derive(Debug, Clone, Default)]
pub enum LogTarget {
    /// Standard error; stdout is left to the transcript.
    #[default]
    Stderr,
    /// Appended to a file, without ANSI colours.
    File(PathBuf),
}

/// Builds the filter: `RUST_LOG` first, then the roundtable level, with the
/// HTTP stack held at `warn` so request internals do not drown turn events.
pub fn filter(level: Level) -> Result<EnvFilter, ParseError> {
    let level = LevelFilter::from_level(level);
    Ok(EnvFilter::from_default_env()
        .add_directive(format!("llm_roundtable={level}").parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("hyper=warn".parse()?))
}

/// Installs the global subscriber.
///
/// Fails if the filter cannot be built, the log file cannot be opened, or a
/// global subscriber is already installed.
pub fn init(config: ObservabilityConfig) -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = tracing_subscriber::registry().with(filter(config.level)?);

    match config.target {
        LogTarget::Stderr => {
            subscriber
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()?;
        }
        LogTarget::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            subscriber
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(file)),
                )
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_sets_crate_level_and_quiets_http_stack() {
        let rendered = filter(Level::DEBUG).unwrap().to_string().to_lowercase();
        assert!(rendered.contains("llm_roundtable=debug"), "{rendered}");
        assert!(rendered.contains("reqwest=warn"), "{rendered}");
        assert!(rendered.contains("hyper=warn"), "{rendered}");
    }

    #[test]
    fn test_default_logs_info_to_stderr() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(matches!(config.target, LogTarget::Stderr));
    }
}
