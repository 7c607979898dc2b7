//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::protocol::ProtocolVersion;

/// Root configuration for the authorization service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Host every listener binds on.
    pub bind_host: BindHost,

    /// One listener per protocol version.
    pub listeners: ListenersConfig,

    /// Decision policy settings.
    pub policy: PolicyConfig,

    /// Limits for the HTTP check variant.
    pub http: HttpCheckConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ServiceConfig {
    /// Listener configs in construction order.
    pub fn listeners(&self) -> [(ProtocolVersion, &ListenerConfig); 4] {
        [
            (ProtocolVersion::V3, &self.listeners.v3),
            (ProtocolVersion::V2, &self.listeners.v2),
            (ProtocolVersion::V2Alpha, &self.listeners.v2alpha),
            (ProtocolVersion::Http, &self.listeners.http),
        ]
    }

    /// Enabled listener configs in construction order.
    pub fn enabled_listeners(&self) -> Vec<(ProtocolVersion, &ListenerConfig)> {
        self.listeners()
            .into_iter()
            .filter(|(_, listener)| listener.enabled)
            .collect()
    }

    pub fn listener(&self, version: ProtocolVersion) -> &ListenerConfig {
        match version {
            ProtocolVersion::V3 => &self.listeners.v3,
            ProtocolVersion::V2 => &self.listeners.v2,
            ProtocolVersion::V2Alpha => &self.listeners.v2alpha,
            ProtocolVersion::Http => &self.listeners.http,
        }
    }

    pub fn listener_mut(&mut self, version: ProtocolVersion) -> &mut ListenerConfig {
        match version {
            ProtocolVersion::V3 => &mut self.listeners.v3,
            ProtocolVersion::V2 => &mut self.listeners.v2,
            ProtocolVersion::V2Alpha => &mut self.listeners.v2alpha,
            ProtocolVersion::Http => &mut self.listeners.http,
        }
    }
}

/// Host part of every listener address (e.g. "0.0.0.0").
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct BindHost(pub String);

impl Default for BindHost {
    fn default() -> Self {
        Self("0.0.0.0".to_string())
    }
}

impl std::fmt::Display for BindHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listener configuration for each protocol version.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenersConfig {
    pub v3: ListenerConfig,
    pub v2: ListenerConfig,
    pub v2alpha: ListenerConfig,
    pub http: ListenerConfig,
}

impl Default for ListenersConfig {
    fn default() -> Self {
        Self {
            v3: ListenerConfig::defaults_for(ProtocolVersion::V3),
            v2: ListenerConfig::defaults_for(ProtocolVersion::V2),
            v2alpha: ListenerConfig::defaults_for(ProtocolVersion::V2Alpha),
            http: ListenerConfig::defaults_for(ProtocolVersion::Http),
        }
    }
}

/// Configuration of one protocol version's listener.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Whether this version is served at all.
    pub enabled: bool,

    /// TCP port, 1-65535.
    pub port: u16,

    /// Whether TLS was requested for this listener.
    #[serde(default)]
    pub tls_enabled: bool,

    /// Optional certificate file (PEM).
    #[serde(default)]
    pub tls_cert_path: Option<PathBuf>,
}

impl ListenerConfig {
    /// Defaults of the sample deployment: only v3 is on.
    pub fn defaults_for(version: ProtocolVersion) -> Self {
        Self {
            enabled: version == ProtocolVersion::V3,
            port: version.default_port(),
            tls_enabled: false,
            tls_cert_path: None,
        }
    }
}

/// Which decision rules are applied.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyMode {
    /// Deny on sentinel path/header, sleep on `sleepfor`.
    #[default]
    Sentinel,
    /// Act on requests whose URI matches a query pattern.
    QueryFilter,
}

impl std::str::FromStr for PolicyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sentinel" => Ok(PolicyMode::Sentinel),
            "query-filter" | "query_filter" | "query" => Ok(PolicyMode::QueryFilter),
            other => Err(format!("unknown policy mode {other:?}, expected sentinel/query-filter")),
        }
    }
}

/// Decision policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub mode: PolicyMode,

    /// Requests to this (decoded) path are denied.
    pub deny_path: String,

    /// Presence of this header denies the request.
    pub deny_header: String,

    /// Header holding a number of seconds to wait before answering.
    pub sleep_header: String,

    /// Upper bound for the `sleep_header` delay.
    pub max_sleep_secs: u64,

    /// Prefix of the two headers added on allow.
    pub header_prefix: String,

    /// Query-filter mode settings.
    pub query_filter: QueryFilterConfig,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            mode: PolicyMode::Sentinel,
            deny_path: "/deny-me/".to_string(),
            deny_header: "deny-me".to_string(),
            sleep_header: "sleepfor".to_string(),
            max_sleep_secs: 60,
            header_prefix: "x-ext-authz".to_string(),
            query_filter: QueryFilterConfig::default(),
        }
    }
}

/// Query-filter mode configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryFilterConfig {
    /// Text following the `?` that triggers the action. Empty matches any query.
    pub query: String,

    /// Interpret `query` as a regular expression.
    pub regex: bool,

    /// One of `allow`, `400`, `403`, `404`. Anything else behaves as `404`.
    pub action: String,
}

impl Default for QueryFilterConfig {
    fn default() -> Self {
        Self {
            query: String::new(),
            regex: false,
            action: "404".to_string(),
        }
    }
}

/// HTTP check variant configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpCheckConfig {
    /// Largest request body buffered for the policy, in bytes.
    pub max_body_bytes: usize,
}

impl Default for HttpCheckConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long a listener waits for in-flight calls once draining.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "debug".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_only_v3() {
        let config = ServiceConfig::default();
        let enabled = config.enabled_listeners();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].0, ProtocolVersion::V3);
        assert_eq!(enabled[0].1.port, 3000);
        assert_eq!(config.listeners.v2.port, 2000);
        assert_eq!(config.listeners.v2alpha.port, 2500);
        assert_eq!(config.listeners.http.port, 8000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            bind_host = "127.0.0.1"

            [listeners.v2]
            enabled = true
            port = 2100

            [policy]
            mode = "query-filter"

            [policy.query_filter]
            query = "debug=.*"
            regex = true
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_host.0, "127.0.0.1");
        assert!(config.listeners.v3.enabled);
        assert!(config.listeners.v2.enabled);
        assert_eq!(config.listeners.v2.port, 2100);
        assert!(!config.listeners.v2.tls_enabled);
        assert_eq!(config.policy.mode, PolicyMode::QueryFilter);
        assert_eq!(config.policy.deny_path, "/deny-me/");
        assert_eq!(config.policy.query_filter.action, "404");
        assert!(config.policy.query_filter.regex);
    }
}
