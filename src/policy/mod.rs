//! Decision policy subsystem.
//!
//! # Data Flow
//! ```text
//! RequestView
//!     → target.rs (request-target parsing, malformed → internal error)
//!     → sentinel.rs | query_filter.rs (rules)
//!     → Decision { delay, verdict }
//!     → DecisionPolicy::decide (waits out the delay, returns the verdict)
//! ```
//!
//! # Design Decisions
//! - Rules are pure: the same view always yields the same decision
//! - A requested delay is returned, not slept, so it stays local to the call
//! - Patterns compile once when the policy is built

pub mod query_filter;
pub mod sentinel;
pub mod target;

use std::time::Duration;

use crate::check::verdict::Verdict;
use crate::check::view::RequestView;
use crate::config::{PolicyConfig, PolicyMode};

pub use query_filter::{FilterAction, QueryFilterPolicy};
pub use sentinel::SentinelPolicy;
pub use target::{RequestTarget, TargetError};

/// Error building a policy from configuration.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid query pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// The verdict for a request plus how long to hold it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub delay: Option<Duration>,
    pub verdict: Verdict,
}

impl Decision {
    pub fn immediate(verdict: Verdict) -> Self {
        Self {
            delay: None,
            verdict,
        }
    }
}

/// A set of authorization rules.
pub trait Policy: Send + Sync + std::fmt::Debug {
    /// Decide on `view`. Must not depend on anything but `view` and `self`.
    fn evaluate(&self, view: &RequestView) -> Decision;
}

/// The policy shared by every check endpoint.
#[derive(Debug)]
pub struct DecisionPolicy {
    rules: Box<dyn Policy>,
}

impl DecisionPolicy {
    /// Wrap custom rules.
    pub fn new(rules: impl Policy + 'static) -> Self {
        Self {
            rules: Box::new(rules),
        }
    }

    pub fn from_config(config: &PolicyConfig) -> Result<Self, PolicyError> {
        let policy = match config.mode {
            PolicyMode::Sentinel => Self::new(SentinelPolicy::from_config(config)),
            PolicyMode::QueryFilter => Self::new(QueryFilterPolicy::from_config(&config.query_filter)?),
        };
        Ok(policy)
    }

    pub fn evaluate(&self, view: &RequestView) -> Decision {
        self.rules.evaluate(view)
    }

    /// Evaluate `view` and wait out any requested delay before answering.
    ///
    /// The wait is a timer on the calling task only.
    pub async fn decide(&self, view: &RequestView) -> Verdict {
        let Decision { delay, verdict } = self.evaluate(view);
        if let Some(delay) = delay.filter(|d| !d.is_zero()) {
            tracing::info!("Sleeping for {} seconds...", delay.as_secs());
            tokio::time::sleep(delay).await;
        }
        verdict
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::new(SentinelPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolVersion;
    use tokio::time::Instant;

    #[test]
    fn evaluate_is_idempotent() {
        let policy = DecisionPolicy::default();
        let views = [
            RequestView::new(ProtocolVersion::V3, "GET", "/ok"),
            RequestView::new(ProtocolVersion::V3, "GET", "/deny-me/"),
            RequestView::new(ProtocolVersion::V3, "POST", "/ok").with_header("sleepfor", "1"),
            RequestView::new(ProtocolVersion::V3, "GET", "not a uri###"),
        ];
        for view in &views {
            assert_eq!(policy.evaluate(view), policy.evaluate(view));
        }
    }

    #[test]
    fn mode_selects_rules() {
        let config = PolicyConfig {
            mode: PolicyMode::QueryFilter,
            ..PolicyConfig::default()
        };
        let policy = DecisionPolicy::from_config(&config).unwrap();
        // query-filter mode ignores the sentinel path
        let view = RequestView::new(ProtocolVersion::V3, "GET", "/deny-me/");
        assert_eq!(policy.evaluate(&view).verdict, Verdict::allow());
    }

    #[tokio::test(start_paused = true)]
    async fn decide_waits_out_the_delay() {
        let policy = DecisionPolicy::default();
        let view = RequestView::new(ProtocolVersion::V3, "GET", "/ok").with_header("sleepfor", "2");

        let started = Instant::now();
        let verdict = policy.decide(&view).await;
        assert!(verdict.is_allowed());
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
