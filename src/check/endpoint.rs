//! Version-independent check handling.
//!
//! Every protocol version plugs in through a [`ProtocolAdapter`]; the
//! endpoint itself owns the call flow: view → policy → encode.

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;
use uuid::Uuid;

use crate::check::verdict::Verdict;
use crate::check::view::{RequestView, ViewError};
use crate::observability::metrics;
use crate::policy::DecisionPolicy;
use crate::protocol::ProtocolVersion;

/// Translation between one wire version and the normalized model.
pub trait ProtocolAdapter: Send + Sync + 'static {
    type Request: Send + 'static;
    type Response: Send + 'static;

    fn version(&self) -> ProtocolVersion;

    /// Project a wire request. Must only read fields this version carries.
    fn request_view(&self, request: &Self::Request) -> Result<RequestView, ViewError>;

    /// Encode a verdict into this version's response. Pure.
    fn encode(&self, verdict: &Verdict) -> Self::Response;
}

/// Check handler for one protocol version.
///
/// Holds nothing but the adapter and the shared immutable policy, so one
/// instance serves any number of concurrent calls.
#[derive(Debug)]
pub struct CheckEndpoint<A> {
    adapter: A,
    policy: Arc<DecisionPolicy>,
}

impl<A: ProtocolAdapter> CheckEndpoint<A> {
    pub fn new(adapter: A, policy: Arc<DecisionPolicy>) -> Self {
        Self { adapter, policy }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.adapter.version()
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Answer one check call. Always produces a well-formed response.
    pub async fn check(&self, request: A::Request) -> A::Response {
        let started = Instant::now();
        let version = self.adapter.version();
        let view = self.adapter.request_view(&request);

        let call_id = view
            .as_ref()
            .ok()
            .and_then(|view| view.request_id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let span = tracing::info_span!("check", %version, %call_id);

        let verdict = self.decide(view).instrument(span.clone()).await;

        span.in_scope(|| match &verdict {
            Verdict::Allow { header_mutations } => {
                tracing::info!(mutations = header_mutations.len(), "=> ALLOWING REQUEST")
            }
            Verdict::Deny(denial) => tracing::info!(
                status = denial.http_status.as_u16(),
                code = ?denial.rpc_code,
                "=> DENYING REQUEST"
            ),
        });
        metrics::record_check(version, &verdict, started);

        self.adapter.encode(&verdict)
    }

    async fn decide(&self, view: Result<RequestView, ViewError>) -> Verdict {
        let view = match view {
            Ok(view) => view,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read check request");
                return Verdict::internal_error();
            }
        };

        tracing::debug!(
            method = %view.method,
            host = %view.host,
            path = %view.path,
            scheme = %view.scheme,
            protocol = %view.protocol,
            body_bytes = view.body.as_ref().map_or(0, Vec::len),
            "ACCESS"
        );
        for (name, value) in view.headers() {
            tracing::debug!(header = name, value, "Request header");
        }

        self.policy.decide(&view).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Adapter over plain views, for exercising the endpoint alone.
    struct Passthrough;

    impl ProtocolAdapter for Passthrough {
        type Request = Option<RequestView>;
        type Response = Verdict;

        fn version(&self) -> ProtocolVersion {
            ProtocolVersion::V3
        }

        fn request_view(&self, request: &Self::Request) -> Result<RequestView, ViewError> {
            request.clone().ok_or(ViewError::MissingHttpAttributes)
        }

        fn encode(&self, verdict: &Verdict) -> Self::Response {
            verdict.clone()
        }
    }

    fn endpoint() -> Arc<CheckEndpoint<Passthrough>> {
        Arc::new(CheckEndpoint::new(Passthrough, Arc::new(DecisionPolicy::default())))
    }

    #[tokio::test]
    async fn view_errors_become_internal_error() {
        let verdict = endpoint().check(None).await;
        assert_eq!(verdict, Verdict::internal_error());
    }

    #[tokio::test]
    async fn delegates_to_policy() {
        let endpoint = endpoint();
        let deny = RequestView::new(ProtocolVersion::V3, "GET", "/ok").with_header("deny-me", "yes");
        assert!(!endpoint.check(Some(deny)).await.is_allowed());

        let allow = RequestView::new(ProtocolVersion::V3, "GET", "/ok");
        assert!(endpoint.check(Some(allow)).await.is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn sleeping_call_does_not_delay_others() {
        let endpoint = endpoint();
        let sleeper = {
            let endpoint = Arc::clone(&endpoint);
            tokio::spawn(async move {
                let view = RequestView::new(ProtocolVersion::V3, "GET", "/ok").with_header("sleepfor", "2");
                let started = tokio::time::Instant::now();
                endpoint.check(Some(view)).await;
                started.elapsed()
            })
        };

        let mut quick = Vec::new();
        for _ in 0..8 {
            let endpoint = Arc::clone(&endpoint);
            quick.push(tokio::spawn(async move {
                let started = tokio::time::Instant::now();
                endpoint
                    .check(Some(RequestView::new(ProtocolVersion::V3, "GET", "/ok")))
                    .await;
                started.elapsed()
            }));
        }

        for handle in quick {
            assert!(handle.await.unwrap() < Duration::from_secs(1));
        }
        assert!(sleeper.await.unwrap() >= Duration::from_secs(2));
    }
}
