//! Tracing subscriber setup.
//!
//! `FORGE_LOG` takes precedence over the manifest level, same syntax as
//! `RUST_LOG` (e.g. `FORGE_LOG=forge_app=debug,info`).

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

pub const LOG_ENV: &str = "FORGE_LOG";

fn filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global fmt subscriber. Returns `false` when logging is
/// silenced or a subscriber was already installed.
pub fn init(config: &LogConfig) -> bool {
    if config.silent {
        return false;
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_skips_install() {
        let config = LogConfig {
            level: "debug".into(),
            silent: true,
        };
        assert!(!init(&config));
    }

    #[test]
    fn test_second_init_is_noop() {
        let config = LogConfig::default();
        init(&config);
        assert!(!init(&config));
    }
}
