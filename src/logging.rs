// ABOUTME: Logging setup for applications embedding the rendering engine
// ABOUTME: Installs a tracing-subscriber fmt subscriber driven by LoggingConfig

use anyhow::{anyhow, Result};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Initialize logging based on configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Fails instead of
/// panicking when a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig, no_color: bool) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let installed = match config.format.as_str() {
        "compact" => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(env_filter)
            .with_ansi(!no_color)
            .with_target(false)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(!no_color)
            .with_target(false)
            .try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))?;

    debug!("Logging initialized with level: {}", config.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails_cleanly() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: "compact".to_string(),
        };

        let _ = init_logging(&config, true);
        assert!(init_logging(&config, true).is_err());
    }
}
