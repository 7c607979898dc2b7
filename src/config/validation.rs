//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports valid, at least one listener)
//! - Detect enabled listeners racing for the same port
//! - Check that the policy pattern compiles
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before any listener binds

use std::collections::BTreeMap;
use std::net::SocketAddr;

use crate::config::schema::{PolicyMode, ServiceConfig};
use crate::policy::QueryFilterPolicy;
use crate::protocol::ProtocolVersion;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no protocol version is enabled")]
    NoListenersEnabled,

    #[error("{version} listener has invalid port 0")]
    InvalidPort { version: ProtocolVersion },

    #[error("{first} and {second} listeners are both configured on port {port}")]
    PortConflict {
        port: u16,
        first: ProtocolVersion,
        second: ProtocolVersion,
    },

    #[error("bind host {0:?} is not a valid IP address")]
    InvalidBindHost(String),

    #[error("invalid query filter pattern: {0}")]
    InvalidQueryPattern(String),

    #[error("deny path {0:?} must start with '/'")]
    InvalidDenyPath(String),

    #[error("metrics address {0:?} is not a valid socket address")]
    InvalidMetricsAddress(String),
}

/// Validate `config`, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let enabled = config.enabled_listeners();
    if enabled.is_empty() {
        errors.push(ValidationError::NoListenersEnabled);
    }

    let mut ports: BTreeMap<u16, ProtocolVersion> = BTreeMap::new();
    for (version, listener) in &enabled {
        if listener.port == 0 {
            errors.push(ValidationError::InvalidPort { version: *version });
            continue;
        }
        if let Some(first) = ports.insert(listener.port, *version) {
            errors.push(ValidationError::PortConflict {
                port: listener.port,
                first,
                second: *version,
            });
        }
    }

    if config.bind_host.0.parse::<std::net::IpAddr>().is_err() {
        errors.push(ValidationError::InvalidBindHost(config.bind_host.0.clone()));
    }

    if !config.policy.deny_path.starts_with('/') {
        errors.push(ValidationError::InvalidDenyPath(config.policy.deny_path.clone()));
    }

    if config.policy.mode == PolicyMode::QueryFilter {
        if let Err(e) = QueryFilterPolicy::from_config(&config.policy.query_filter) {
            errors.push(ValidationError::InvalidQueryPattern(e.to_string()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
