//! The sample sentinel rules.
//!
//! - `sleepfor: <secs>` delays the answer (bounded)
//! - `deny-me` header or the deny path rejects with 403
//! - everything else is allowed with one overwrite and one append mutation

use std::time::Duration;

use axum::http::StatusCode;
use tonic::Code;

use super::target::RequestTarget;
use super::{Decision, Policy};
use crate::check::verdict::{HeaderMutation, Verdict, APPLICATION_JSON};
use crate::check::view::RequestView;
use crate::config::PolicyConfig;

/// Sentinel-header/path policy.
#[derive(Debug, Clone)]
pub struct SentinelPolicy {
    deny_path: String,
    deny_header: String,
    sleep_header: String,
    max_sleep: Duration,
    denial_body: String,
    overwrite_header: String,
    append_header: String,
}

impl SentinelPolicy {
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            deny_path: config.deny_path.clone(),
            deny_header: config.deny_header.to_ascii_lowercase(),
            sleep_header: config.sleep_header.to_ascii_lowercase(),
            max_sleep: Duration::from_secs(config.max_sleep_secs),
            denial_body: format!(
                r#"{{"msg": "Your request was denied, unauthorized path {}"}}"#,
                config.deny_path
            ),
            overwrite_header: format!("{}-overwrite", config.header_prefix),
            append_header: format!("{}-append", config.header_prefix),
        }
    }

    /// Parse the sleep header value; anything but a non-negative integer is ignored.
    fn sleep_for(&self, value: &str) -> Option<Duration> {
        let secs: u64 = match value.trim().parse() {
            Ok(secs) => secs,
            Err(_) => {
                tracing::debug!(header = %self.sleep_header, value, "Ignoring non-integer sleep value");
                return None;
            }
        };
        let requested = Duration::from_secs(secs);
        if requested > self.max_sleep {
            tracing::warn!(
                requested_secs = secs,
                max_secs = self.max_sleep.as_secs(),
                "Sleep request capped"
            );
            return Some(self.max_sleep);
        }
        Some(requested)
    }
}

impl Default for SentinelPolicy {
    fn default() -> Self {
        Self::from_config(&PolicyConfig::default())
    }
}

impl Policy for SentinelPolicy {
    fn evaluate(&self, view: &RequestView) -> Decision {
        let target = match RequestTarget::parse(&view.path) {
            Ok(target) => target,
            Err(e) => {
                tracing::error!(path = %view.path, error = %e, "Unable to parse request path");
                return Decision::immediate(Verdict::internal_error());
            }
        };

        let mut delay = None;
        let mut deny_header = false;
        for (name, value) in view.headers() {
            if name == self.sleep_header {
                delay = self.sleep_for(value);
            } else if name == self.deny_header {
                deny_header = true;
            }
        }

        let verdict = if deny_header || target.path() == self.deny_path {
            Verdict::deny(
                StatusCode::FORBIDDEN,
                Code::PermissionDenied,
                APPLICATION_JSON,
                self.denial_body.clone(),
            )
        } else {
            Verdict::Allow {
                header_mutations: vec![
                    HeaderMutation::overwrite(self.overwrite_header.clone(), "overwritten"),
                    HeaderMutation::append(self.append_header.clone(), "appended"),
                ],
            }
        };

        Decision { delay, verdict }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolVersion;

    fn view(path: &str) -> RequestView {
        RequestView::new(ProtocolVersion::V3, "GET", path)
    }

    fn status(decision: &Decision) -> StatusCode {
        decision.verdict.http_status()
    }

    #[test]
    fn deny_header_denies_any_path() {
        let policy = SentinelPolicy::default();
        for path in ["/", "/ok", "/deny-me/", "/a/b?c=d"] {
            let decision = policy.evaluate(&view(path).with_header("deny-me", ""));
            assert_eq!(status(&decision), StatusCode::FORBIDDEN, "path {path}");
            assert_eq!(decision.verdict.rpc_code(), Code::PermissionDenied);
        }
    }

    #[test]
    fn deny_path_denies_without_header() {
        let policy = SentinelPolicy::default();
        let decision = policy.evaluate(&view("/deny-me/"));
        match decision.verdict {
            Verdict::Deny(denial) => {
                assert_eq!(denial.http_status, StatusCode::FORBIDDEN);
                assert!(denial.body.contains("denied"));
                assert_eq!(
                    denial.headers,
                    vec![("Content-Type".to_string(), "application/json".to_string())]
                );
            }
            other => panic!("expected denial, got {other:?}"),
        }

        // the query does not take part in path matching
        assert_eq!(status(&policy.evaluate(&view("/deny-me/?x=1"))), StatusCode::FORBIDDEN);
        assert_eq!(status(&policy.evaluate(&view("/deny-me"))), StatusCode::OK);
    }

    #[test]
    fn allows_with_overwrite_then_append() {
        let policy = SentinelPolicy::default();
        let decision = policy.evaluate(&view("/ok").with_header("x-other", "1"));
        assert_eq!(decision.delay, None);
        assert_eq!(
            decision.verdict,
            Verdict::Allow {
                header_mutations: vec![
                    HeaderMutation::overwrite("x-ext-authz-overwrite", "overwritten"),
                    HeaderMutation::append("x-ext-authz-append", "appended"),
                ]
            }
        );
    }

    #[test]
    fn same_target_in_either_form_gets_the_same_verdict() {
        let policy = SentinelPolicy::default();
        for path in ["/x/../deny-me/", "http://h/x/../deny-me/"] {
            assert_eq!(status(&policy.evaluate(&view(path))), StatusCode::OK, "path {path}");
        }
        for path in ["/deny-me/", "http://h/deny-me/?q=1"] {
            assert_eq!(status(&policy.evaluate(&view(path))), StatusCode::FORBIDDEN, "path {path}");
        }
        assert_eq!(status(&policy.evaluate(&view("*"))), StatusCode::OK);
    }

    #[test]
    fn malformed_path_is_internal_error_regardless_of_headers() {
        let policy = SentinelPolicy::default();
        for request in [
            view("not a uri###"),
            view("not a uri###").with_header("deny-me", "1"),
            view("").with_header("sleepfor", "3"),
        ] {
            let decision = policy.evaluate(&request);
            assert_eq!(decision.verdict, Verdict::internal_error());
            assert_eq!(decision.delay, None);
        }
    }

    #[test]
    fn sleep_header_requests_a_delay() {
        let policy = SentinelPolicy::default();
        let decision = policy.evaluate(&view("/ok").with_header("SleepFor", "2"));
        assert_eq!(decision.delay, Some(Duration::from_secs(2)));
        assert!(decision.verdict.is_allowed());

        let decision = policy.evaluate(&view("/deny-me/").with_header("sleepfor", "1"));
        assert_eq!(decision.delay, Some(Duration::from_secs(1)));
        assert_eq!(status(&decision), StatusCode::FORBIDDEN);
    }

    #[test]
    fn invalid_sleep_values_are_ignored() {
        let policy = SentinelPolicy::default();
        for value in ["soon", "-1", "1.5", ""] {
            let decision = policy.evaluate(&view("/ok").with_header("sleepfor", value));
            assert_eq!(decision.delay, None, "value {value:?}");
            assert!(decision.verdict.is_allowed());
        }
    }

    #[test]
    fn sleep_is_capped() {
        let policy = SentinelPolicy::from_config(&PolicyConfig {
            max_sleep_secs: 5,
            ..PolicyConfig::default()
        });
        let decision = policy.evaluate(&view("/ok").with_header("sleepfor", "3600"));
        assert_eq!(decision.delay, Some(Duration::from_secs(5)));
    }

    #[test]
    fn custom_deny_path_and_prefix() {
        let policy = SentinelPolicy::from_config(&PolicyConfig {
            deny_path: "/blocked".to_string(),
            header_prefix: "x-v3".to_string(),
            ..PolicyConfig::default()
        });
        assert_eq!(status(&policy.evaluate(&view("/blocked"))), StatusCode::FORBIDDEN);
        assert_eq!(status(&policy.evaluate(&view("/deny-me/"))), StatusCode::OK);

        match policy.evaluate(&view("/ok")).verdict {
            Verdict::Allow { header_mutations } => {
                assert_eq!(header_mutations[0].key, "x-v3-overwrite");
                assert_eq!(header_mutations[1].key, "x-v3-append");
            }
            other => panic!("expected allow, got {other:?}"),
        }
    }
}
