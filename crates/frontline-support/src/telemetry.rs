use crate::config::TelemetryConfig;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{filter}'")]
    InvalidFilter {
        filter: String,
        #[source]
        source: ParseError,
    },
    #[error("failed to install tracing subscriber: {0}")]
    Install(Box<dyn std::error::Error + Send + Sync>),
}

/// Resolve the active log filter: an explicit `RUST_LOG` wins, otherwise
/// the configured level applies to everything including pipeline spans.
fn log_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|source| {
            TelemetryError::InvalidFilter {
                filter: config.log_level.clone(),
                source,
            }
        }),
    }
}

/// Install the process-wide subscriber. Case pipeline runs log their case
/// id as a structured field, so the compact single-line format keeps one
/// run's progress easy to follow in aggregated output.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(config)?)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Install)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_is_the_fallback_filter() {
        std::env::remove_var("RUST_LOG");
        let config = TelemetryConfig {
            log_level: "debug".to_string(),
        };
        let filter = log_filter(&config).expect("plain level parses");
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn malformed_fallback_filter_is_rejected() {
        std::env::remove_var("RUST_LOG");
        let config = TelemetryConfig {
            log_level: "frontline=notalevel".to_string(),
        };
        let error = log_filter(&config).expect_err("bad directive is rejected");
        assert!(matches!(error, TelemetryError::InvalidFilter { .. }));
    }
}
