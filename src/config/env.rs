//! Environment variable overrides.
//!
//! Every variable is optional and an empty value counts as unset. A value
//! that does not parse never aborts startup: it produces a [`ConfigWarning`]
//! and the setting keeps its previous value (file or built-in default).

use std::path::PathBuf;
use std::str::FromStr;

use crate::config::schema::{LogFormat, PolicyMode, ServiceConfig};
use crate::protocol::ProtocolVersion;

pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
pub const ENV_BIND_HOST: &str = "BIND_HOST";
pub const ENV_POLICY_MODE: &str = "POLICY_MODE";
pub const ENV_DENY_PATH: &str = "DENY_PATH";
pub const ENV_MAX_SLEEP_SECS: &str = "MAX_SLEEP_SECS";
pub const ENV_ACTION: &str = "ACTION";
pub const ENV_QUERY: &str = "QUERY";
pub const ENV_REGEX: &str = "REGEX";
pub const ENV_METRICS_ENABLED: &str = "METRICS_ENABLED";
pub const ENV_METRICS_ADDRESS: &str = "METRICS_ADDRESS";
pub const ENV_DRAIN_TIMEOUT_SECS: &str = "DRAIN_TIMEOUT_SECS";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A rejected environment value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub variable: String,
    pub value: String,
    pub expected: &'static str,
    pub fallback: String,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid use of {}={:?}, expected {}; using {}",
            self.variable, self.value, self.expected, self.fallback
        )
    }
}

/// Apply overrides read through `lookup` on top of `config`.
pub fn apply_env<F>(config: &mut ServiceConfig, lookup: F) -> Vec<ConfigWarning>
where
    F: Fn(&str) -> Option<String>,
{
    let mut overlay = Overlay {
        lookup,
        warnings: Vec::new(),
    };

    for version in ProtocolVersion::ALL {
        let prefix = version.env_prefix();
        let listener = config.listener_mut(version);

        overlay.parse_with(&format!("{prefix}_ENABLED"), "true/false", parse_bool, &mut listener.enabled);
        overlay.parse_with(&format!("{prefix}_TLS"), "true/false", parse_bool, &mut listener.tls_enabled);
        overlay.parse_with(
            &format!("{prefix}_PORT"),
            "an integer that is a valid port value",
            parse_port,
            &mut listener.port,
        );
        if let Some(path) = overlay.get(&format!("{prefix}_TLS_CERT_FILE")) {
            listener.tls_cert_path = Some(PathBuf::from(path));
        }
    }

    overlay.parse_with(
        ENV_LOG_LEVEL,
        "debug/info/warn/error",
        |v| {
            let level = v.to_ascii_lowercase();
            LOG_LEVELS.contains(&level.as_str()).then_some(level)
        },
        &mut config.observability.log_level,
    );
    overlay.parse_with(
        ENV_LOG_FORMAT,
        "pretty/json",
        |v| match v.to_ascii_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        },
        &mut config.observability.log_format,
    );
    overlay.parse_with(ENV_METRICS_ENABLED, "true/false", parse_bool, &mut config.observability.metrics_enabled);
    if let Some(address) = overlay.get(ENV_METRICS_ADDRESS) {
        config.observability.metrics_address = address;
    }

    if let Some(host) = overlay.get(ENV_BIND_HOST) {
        config.bind_host.0 = host;
    }
    overlay.parse_with(
        ENV_DRAIN_TIMEOUT_SECS,
        "a non-negative number of seconds",
        |v| v.parse().ok(),
        &mut config.shutdown.drain_timeout_secs,
    );

    let policy = &mut config.policy;
    overlay.parse_with(
        ENV_POLICY_MODE,
        "sentinel/query-filter",
        |v| PolicyMode::from_str(v).ok(),
        &mut policy.mode,
    );
    if let Some(path) = overlay.get(ENV_DENY_PATH) {
        policy.deny_path = path;
    }
    overlay.parse_with(
        ENV_MAX_SLEEP_SECS,
        "a non-negative number of seconds",
        |v| v.parse().ok(),
        &mut policy.max_sleep_secs,
    );
    if let Some(action) = overlay.get(ENV_ACTION) {
        policy.query_filter.action = action;
    }
    if let Some(query) = overlay.get(ENV_QUERY) {
        policy.query_filter.query = query;
    }
    overlay.parse_with(ENV_REGEX, "true/false", parse_bool, &mut policy.query_filter.regex);

    overlay.warnings
}

struct Overlay<F> {
    lookup: F,
    warnings: Vec<ConfigWarning>,
}

impl<F> Overlay<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.is_empty())
    }

    fn parse_with<T, P>(&mut self, name: &str, expected: &'static str, parse: P, target: &mut T)
    where
        T: std::fmt::Debug,
        P: FnOnce(&str) -> Option<T>,
    {
        let Some(raw) = self.get(name) else {
            return;
        };
        match parse(raw.trim()) {
            Some(value) => *target = value,
            None => self.warnings.push(ConfigWarning {
                variable: name.to_string(),
                value: raw,
                expected,
                fallback: format!("{target:?}"),
            }),
        }
    }
}

/// Accepts `1/t/true` and `0/f/false` in the usual casings.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn parse_port(value: &str) -> Option<u16> {
    value.parse::<u16>().ok().filter(|port| *port != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn apply(vars: &[(&str, &str)]) -> (ServiceConfig, Vec<ConfigWarning>) {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = ServiceConfig::default();
        let warnings = apply_env(&mut config, |name| vars.get(name).cloned());
        (config, warnings)
    }

    #[test]
    fn reads_listener_variables() {
        let (config, warnings) = apply(&[
            ("GRPC_V3_ENABLED", "false"),
            ("GRPC_V2_ENABLED", "true"),
            ("GRPC_V2_PORT", "2100"),
            ("GRPC_V2_TLS", "T"),
            ("GRPC_V2_TLS_CERT_FILE", "/etc/certs/v2.pem"),
            ("HTTP_ENABLED", "1"),
        ]);

        assert!(warnings.is_empty(), "{warnings:?}");
        assert!(!config.listeners.v3.enabled);
        assert!(config.listeners.v2.enabled);
        assert_eq!(config.listeners.v2.port, 2100);
        assert!(config.listeners.v2.tls_enabled);
        assert_eq!(
            config.listeners.v2.tls_cert_path,
            Some(PathBuf::from("/etc/certs/v2.pem"))
        );
        assert!(config.listeners.http.enabled);
        assert_eq!(config.listeners.http.port, 8000);
    }

    #[test]
    fn invalid_values_fall_back_with_a_warning() {
        let (config, warnings) = apply(&[
            ("GRPC_V3_PORT", "not-a-port"),
            ("GRPC_V2ALPHA_PORT", "0"),
            ("GRPC_V3_TLS", "maybe"),
            ("LOG_LEVEL", "loud"),
        ]);

        assert_eq!(config.listeners.v3.port, 3000);
        assert_eq!(config.listeners.v2alpha.port, 2500);
        assert!(!config.listeners.v3.tls_enabled);
        assert_eq!(config.observability.log_level, "debug");

        let variables: Vec<&str> = warnings.iter().map(|w| w.variable.as_str()).collect();
        assert_eq!(
            variables,
            vec!["GRPC_V3_TLS", "GRPC_V3_PORT", "GRPC_V2ALPHA_PORT", "LOG_LEVEL"]
        );
        assert!(warnings[1].to_string().contains("using 3000"));
    }

    #[test]
    fn empty_values_are_ignored() {
        let (config, warnings) = apply(&[("GRPC_V3_PORT", ""), ("QUERY", "")]);
        assert!(warnings.is_empty());
        assert_eq!(config.listeners.v3.port, 3000);
        assert_eq!(config.policy.query_filter.query, "");
    }

    #[test]
    fn reads_policy_variables() {
        let (config, warnings) = apply(&[
            ("POLICY_MODE", "query-filter"),
            ("ACTION", "403"),
            ("QUERY", "debug"),
            ("REGEX", "true"),
            ("MAX_SLEEP_SECS", "5"),
        ]);

        assert!(warnings.is_empty());
        assert_eq!(config.policy.mode, PolicyMode::QueryFilter);
        assert_eq!(config.policy.query_filter.action, "403");
        assert_eq!(config.policy.query_filter.query, "debug");
        assert!(config.policy.query_filter.regex);
        assert_eq!(config.policy.max_sleep_secs, 5);
    }
}
