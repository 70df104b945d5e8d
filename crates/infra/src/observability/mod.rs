//! Logging setup for the daemon and tools
//!
//! `RUST_LOG` takes precedence over the configured level so a single run
//! can be made more verbose without editing the config file.

use calrecon_domain::{LoggingConfig, ReconError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, else from the configured level.
///
/// # Errors
/// Returns `ReconError::Config` when neither yields a valid directive.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(&config.level).map_err(|e| {
            ReconError::Config(format!("invalid logging.level '{}': {e}", config.level))
        })
    })
}

/// Install the global subscriber: JSON lines when `config.json`, otherwise
/// the human-readable formatter.
///
/// # Errors
/// Returns `ReconError::Config` for a bad filter or when a global subscriber
/// is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry.with(tracing_subscriber::fmt::layer().json().with_current_span(true)).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(true)).try_init()
    };
    installed.map_err(|e| ReconError::Config(format!("tracing already initialised: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_level_is_a_config_error() {
        // Only meaningful when RUST_LOG is unset in the test environment.
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig { level: "calrecon=[".into(), json: false };
        assert!(matches!(env_filter(&config), Err(ReconError::Config(_))));

        let config = LoggingConfig { level: "info,calrecon_core=debug".into(), json: true };
        assert!(env_filter(&config).is_ok());
    }
}
