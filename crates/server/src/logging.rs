use banklens_core::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over the configured level when set.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.trim()))
}

/// Installs the global subscriber. A second call keeps the first subscriber.
pub fn init_logging(config: &LoggingConfig) {
    let filter = env_filter(config);

    let installed = match config.format {
        LogFormat::Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().try_init()
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().try_init()
        }
        LogFormat::Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().try_init()
        }
    };

    if installed.is_err() {
        tracing::debug!(event_name = "system.logging.already_initialized", "subscriber already set");
    }
}

#[cfg(test)]
mod tests {
    use banklens_core::config::{LogFormat, LoggingConfig};

    use super::init_logging;

    #[test]
    fn repeated_initialisation_is_harmless() {
        let config = LoggingConfig { level: "debug".to_string(), format: LogFormat::Json };
        init_logging(&config);
        init_logging(&LoggingConfig { format: LogFormat::Pretty, ..config });
    }
}
