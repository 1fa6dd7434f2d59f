//! Tracing subscriber setup for hosts embedding the interpreter
//!
//! The library itself only emits `tracing` events; nothing is printed unless
//! the host installs a subscriber, either its own or this one.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install a global fmt subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over the configured filter. Returns `false`
/// when a global subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_existing_subscriber() {
        let config = LoggingConfig {
            filter: "not a [valid filter".to_string(),
            ansi: false,
        };

        init_tracing(&config);
        assert!(!init_tracing(&LoggingConfig::default()));
    }
}
