//! Process-wide `tracing` setup: JSON lines on stdout plus an optional SQLite
//! log of WARN and ERROR events that can be queried per session.

mod logging;

pub use logging::{LogQuery, LogRecord, SqliteLogLayer, SqliteLogSink};

use std::path::PathBuf;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Base level. `RUST_LOG`, when set, replaces the whole filter.
    pub log_level: Level,
    /// Per-target overrides such as `("twochairs_engine", DEBUG)`.
    pub module_levels: Vec<(String, Level)>,
    pub log_to_sqlite: bool,
    pub log_db_path: PathBuf,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            log_to_sqlite: true,
            log_db_path: default_log_path(),
        }
    }
}

impl TelemetryConfig {
    fn directives(&self) -> String {
        std::iter::once(self.log_level.to_string().to_ascii_lowercase())
            .chain(
                self.module_levels
                    .iter()
                    .map(|(target, level)| format!("{target}={}", level.to_string().to_ascii_lowercase())),
            )
            .collect::<Vec<_>>()
            .join(",")
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }
}

/// Returned by [`init_telemetry`]; holds the log sink when one was opened.
pub struct TelemetryGuard {
    sink: Option<Arc<SqliteLogSink>>,
}

impl TelemetryGuard {
    pub fn logs(&self) -> Option<&SqliteLogSink> {
        self.sink.as_deref()
    }
}

/// Install the global subscriber. A second call leaves the first in place.
///
/// An unopenable log database is reported on stderr and stdout logging
/// continues without it.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let sink = config
        .log_to_sqlite
        .then(|| SqliteLogSink::open(&config.log_db_path))
        .and_then(|opened| match opened {
            Ok(sink) => Some(Arc::new(sink)),
            Err(e) => {
                eprintln!(
                    "twochairs-telemetry: log database {} unavailable: {e}",
                    config.log_db_path.display()
                );
                None
            }
        });

    let stdout = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .with_filter(config.filter());

    let installed = tracing_subscriber::registry()
        .with(stdout)
        .with(sink.clone().map(SqliteLogLayer::new))
        .try_init();
    if let Err(e) = installed {
        eprintln!("twochairs-telemetry: subscriber already set: {e}");
    }

    TelemetryGuard { sink }
}

/// Level from a settings string, case-insensitive. Unknown names mean INFO.
pub fn parse_level(raw: &str) -> Level {
    raw.trim().parse().unwrap_or(Level::INFO)
}

fn default_log_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".twochairs")
        .join("logs.db")
}
