//! Tracing/logging initialization.
//!
//! JSON logs by default, filtered through `RUST_LOG`. `BOF_LOG_FORMAT=pretty`
//! switches to the human-readable formatter for local runs.

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info";
const FORMAT_VAR: &str = "BOF_LOG_FORMAT";

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("unknown log format '{0}' (expected json or pretty)")]
    Format(String),

    #[error("global subscriber already installed")]
    AlreadyInstalled,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ObservabilityError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            _ => Err(ObservabilityError::Format(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `EnvFilter` directives, e.g. `info,bof_infra=debug`.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LogSettings {
    /// Read `RUST_LOG` and `BOF_LOG_FORMAT`, falling back to defaults.
    ///
    /// An unparseable format is ignored rather than failing startup.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            filter: lookup(EnvFilter::DEFAULT_ENV)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.filter),
            format: lookup(FORMAT_VAR)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.format),
        }
    }

    fn env_filter(&self) -> Result<EnvFilter, ObservabilityError> {
        EnvFilter::try_new(&self.filter).map_err(|e| ObservabilityError::Filter {
            filter: self.filter.clone(),
            reason: e.to_string(),
        })
    }
}

/// Install the global subscriber described by `settings`.
pub fn try_init(settings: &LogSettings) -> Result<(), ObservabilityError> {
    let filter = settings.env_filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    let installed = match settings.format {
        LogFormat::Json => builder.json().with_target(false).try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|_| ObservabilityError::AlreadyInstalled)
}

/// Initialize tracing for the process from the environment.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let settings = LogSettings::from_env();
    if let Err(ObservabilityError::Filter { .. }) = try_init(&settings) {
        let _ = try_init(&LogSettings {
            format: settings.format,
            ..LogSettings::default()
        });
    }
}

/// Subscriber for test binaries: output captured per test, `warn` unless
/// `RUST_LOG` says otherwise.
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
