//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default filter when neither the config nor `RUST_LOG` sets one.
const DEFAULT_FILTER: &str = "manifesto_votes=info,tower_http=info,warn";

/// Filter used when `--verbose` is passed.
const VERBOSE_FILTER: &str = "manifesto_votes=debug,tower_http=debug,info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable multi-line output.
    #[default]
    Pretty,
}

impl LogFormat {
    /// Parses a format name; anything but "json" is pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Event filter.
    pub filter: EnvFilter,
    /// Optional log file.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds logging configuration from config settings.
    ///
    /// Filter precedence: `--verbose`, then the config file, then `RUST_LOG`,
    /// then the built-in default.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let format = settings
            .format
            .as_deref()
            .map(LogFormat::parse)
            .unwrap_or_default();

        let filter = if verbose {
            EnvFilter::new(VERBOSE_FILTER)
        } else if let Some(directive) = settings.filter.as_deref() {
            EnvFilter::try_new(directive).unwrap_or_else(|e| {
                eprintln_invalid_filter(directive, &e);
                EnvFilter::new(DEFAULT_FILTER)
            })
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        };

        Self {
            format,
            filter,
            file: settings.file.clone(),
        }
    }
}

// The subscriber is not installed yet, so the only place to report this is stderr.
#[allow(clippy::print_stderr)]
fn eprintln_invalid_filter(directive: &str, e: &tracing_subscriber::filter::ParseError) {
    eprintln!("Invalid log filter '{directive}': {e}; using default");
}
