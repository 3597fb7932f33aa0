//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Pick the log line format from configuration
//! - Let `RUST_LOG` override the configured level
//!
//! # Design Decisions
//! - Dependency noise (hyper, h2, tower) is capped at warn unless
//!   verbosity asks for more
//! - JSON format for production, pretty format for development

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Map a CLI verbosity count onto a level, falling back to `configured`.
pub fn effective_level(configured: &str, verbosity: u8) -> &str {
    match verbosity {
        0 => configured,
        1 => "debug",
        _ => "trace",
    }
}

/// Build the filter used when `RUST_LOG` is not set.
pub fn default_filter(level: &str, verbosity: u8) -> EnvFilter {
    let level = match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    if verbosity >= 3 {
        EnvFilter::new(level)
    } else {
        EnvFilter::new(format!("{},hyper=warn,hyper_util=warn,h2=warn,tower=warn", level))
    }
}

/// Install the global subscriber.
///
/// Returns an error if a subscriber is already installed.
pub fn init_logging(
    config: &ObservabilityConfig,
    verbosity: u8,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let level = effective_level(&config.log_level, verbosity);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level, verbosity));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
    }
}
