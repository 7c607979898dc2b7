//! Query-filtering rules.
//!
//! Requests whose URI contains `?<query>` (literal) or matches `\?(?:<query>)`
//! (regex) get the configured action; all others are allowed untouched.

use axum::http::StatusCode;
use regex::Regex;
use tonic::Code;

use super::target::RequestTarget;
use super::{Decision, Policy, PolicyError};
use crate::check::verdict::{Verdict, TEXT_HTML};
use crate::check::view::RequestView;
use crate::config::QueryFilterConfig;

/// What happens to a request whose URI matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    Allow,
    BadRequest,
    Forbidden,
    NotFound,
}

impl FilterAction {
    /// Parse an action name, matched exactly (`ALLOW` is unknown). Unknown
    /// names map to [`FilterAction::NotFound`] and are reported through the
    /// second element.
    pub fn parse(action: &str) -> (Self, bool) {
        match action {
            "allow" => (FilterAction::Allow, true),
            "400" => (FilterAction::BadRequest, true),
            "403" => (FilterAction::Forbidden, true),
            "404" => (FilterAction::NotFound, true),
            _ => (FilterAction::NotFound, false),
        }
    }

    fn verdict(self) -> Verdict {
        match self {
            FilterAction::Allow => Verdict::allow(),
            FilterAction::BadRequest => Verdict::deny(
                StatusCode::BAD_REQUEST,
                Code::InvalidArgument,
                TEXT_HTML,
                "Bad Request",
            ),
            FilterAction::Forbidden => Verdict::deny(
                StatusCode::FORBIDDEN,
                Code::PermissionDenied,
                TEXT_HTML,
                "Unauthorized",
            ),
            FilterAction::NotFound => {
                Verdict::deny(StatusCode::NOT_FOUND, Code::NotFound, TEXT_HTML, "Not Found")
            }
        }
    }
}

#[derive(Debug, Clone)]
enum QueryMatcher {
    Literal(String),
    Pattern(Regex),
}

impl QueryMatcher {
    fn matches(&self, uri: &str) -> bool {
        match self {
            QueryMatcher::Literal(needle) => uri.contains(needle.as_str()),
            QueryMatcher::Pattern(regex) => regex.is_match(uri),
        }
    }
}

/// Query-filter policy. The pattern is compiled once, here.
#[derive(Debug, Clone)]
pub struct QueryFilterPolicy {
    matcher: QueryMatcher,
    action: FilterAction,
}

impl QueryFilterPolicy {
    pub fn from_config(config: &QueryFilterConfig) -> Result<Self, PolicyError> {
        let matcher = if config.regex {
            let pattern = format!(r"\?(?:{})", config.query);
            let regex = Regex::new(&pattern).map_err(|source| PolicyError::Pattern {
                pattern: config.query.clone(),
                source,
            })?;
            QueryMatcher::Pattern(regex)
        } else {
            QueryMatcher::Literal(format!("?{}", config.query))
        };

        let (action, known) = FilterAction::parse(&config.action);
        if !known {
            tracing::warn!(action = %config.action, "Unknown query filter action, defaulting to 404");
        }

        Ok(Self { matcher, action })
    }

    pub fn action(&self) -> FilterAction {
        self.action
    }
}

impl Policy for QueryFilterPolicy {
    fn evaluate(&self, view: &RequestView) -> Decision {
        let target = match RequestTarget::parse(&view.path) {
            Ok(target) => target,
            Err(e) => {
                tracing::error!(path = %view.path, error = %e, "Unable to parse request path");
                return Decision::immediate(Verdict::deny(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Code::Unknown,
                    TEXT_HTML,
                    "Internal Server Error",
                ));
            }
        };

        if !self.matcher.matches(target.as_str()) {
            tracing::debug!(uri = %target.as_str(), "Request does not contain query");
            return Decision::immediate(Verdict::allow());
        }

        tracing::debug!(uri = %target.as_str(), action = ?self.action, "Request contains matched query");
        Decision::immediate(self.action.verdict())
    }
}
