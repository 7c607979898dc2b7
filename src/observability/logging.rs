//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Derive the default filter from the configured log level
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level when set
//! - JSON format for production, pretty format for development

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(level: &str) -> String {
    format!("ext_authz={level},tower_http={level}")
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));
    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_cover_crate_and_http_layer() {
        let directives = default_directives("warn");
        assert!(directives.contains("ext_authz=warn"));
        assert!(directives.contains("tower_http=warn"));
        assert!(directives.parse::<EnvFilter>().is_ok());
    }
}
