//! Tracing Setup
//!
//! Builds the `tracing-subscriber` stack from `LogConfig`. `dispatch`
//! returns the subscriber without installing it, so callers can hand it
//! to a component (the scheduler) instead of touching global state.

use crate::config::{LogConfig, LogFormat};
use tracing::Dispatch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

fn filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Subscriber for `config`, not installed anywhere
pub fn dispatch(config: &LogConfig) -> Dispatch {
    let registry = tracing_subscriber::registry().with(filter(config));
    match config.format {
        LogFormat::Text => Dispatch::new(registry.with(tracing_subscriber::fmt::layer())),
        LogFormat::Json => Dispatch::new(registry.with(tracing_subscriber::fmt::layer().json())),
    }
}

/// Install the subscriber for `config` as the process-wide default
pub fn init(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing::dispatcher::set_global_default(dispatch(config))?;

    tracing::debug!(
        level = %config.level,
        format = ?config.format,
        "Logging initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_creation() {
        // Building must not install anything globally
        let _text = dispatch(&LogConfig::default());
        let _json = dispatch(&LogConfig {
            level: "debug".to_string(),
            format: LogFormat::Json,
        });
    }

    #[test]
    fn test_invalid_level_falls_back() {
        let _ = dispatch(&LogConfig {
            level: "not a ==== directive".to_string(),
            format: LogFormat::Text,
        });
    }
}
