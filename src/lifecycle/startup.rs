//! Startup reporting.
//!
//! # Responsibilities
//! - Report rejected environment values
//! - Log the effective configuration before any listener binds
//!
//! # Design Decisions
//! - Fail fast: configuration problems are reported before binding
//! - One log line per listener so each version can be grepped for

use crate::config::{ConfigWarning, ServiceConfig};

/// Log the effective configuration and every rejected environment value.
pub fn announce(config: &ServiceConfig, warnings: &[ConfigWarning]) {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "{} starting",
        env!("CARGO_PKG_NAME")
    );

    for warning in warnings {
        tracing::warn!(variable = %warning.variable, "{}", warning);
    }

    tracing::info!(
        bind_host = %config.bind_host.0,
        policy_mode = ?config.policy.mode,
        log_level = %config.observability.log_level,
        drain_timeout_secs = config.shutdown.drain_timeout_secs,
        metrics_enabled = config.observability.metrics_enabled,
        "Configuration loaded"
    );

    for (version, listener) in config.listeners() {
        tracing::info!(
            %version,
            enabled = listener.enabled,
            port = listener.port,
            tls = listener.tls_enabled,
            "Listener configured"
        );
    }
}
