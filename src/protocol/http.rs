//! Plain HTTP authorization.
//!
//! Envoy's HTTP ext_authz client forwards the original request (method, path,
//! headers and optionally the body) to this service. A 200 response allows
//! the request, anything else is relayed to the downstream client as is.
//!
//! # Design Decisions
//! - Every path and method is a check, so the router has a single fallback handler
//! - Allow mutations travel as response headers, `append` ones via `HeaderMap::append`
//! - `x-ext-authz-status` carries the canonical RPC code name for parity with gRPC

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::{HeaderName, HeaderValue, HOST};
use axum::http::request::Parts;
use axum::response::Response;
use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::check::verdict::rpc_code_name;
use crate::check::{CheckEndpoint, ProtocolAdapter, RequestView, Verdict, ViewError};
use crate::config::HttpCheckConfig;
use crate::policy::DecisionPolicy;
use crate::protocol::ProtocolVersion;

/// Response header carrying the canonical RPC code of the verdict.
pub const X_EXT_AUTHZ_STATUS: &str = "x-ext-authz-status";

/// Request id header set by the proxy, or by us when it is missing.
pub const X_REQUEST_ID: &str = "x-request-id";

/// An inbound HTTP check: request head plus the buffered body.
#[derive(Debug)]
pub struct HttpCheckRequest {
    pub parts: Parts,
    /// `Err` holds the reason the body could not be buffered.
    pub body: Result<Bytes, String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HttpAdapter;

impl ProtocolAdapter for HttpAdapter {
    type Request = HttpCheckRequest;
    type Response = Response;

    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::Http
    }

    fn request_view(&self, request: &HttpCheckRequest) -> Result<RequestView, ViewError> {
        let parts = &request.parts;
        let body = request.body.as_ref().map_err(|e| ViewError::Body(e.clone()))?;

        let target = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path(), |pq| pq.as_str());
        let mut view = RequestView::new(ProtocolVersion::Http, parts.method.as_str(), target);

        for (name, value) in &parts.headers {
            view.insert_header(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }
        view.request_id = view.header(X_REQUEST_ID).map(str::to_string);
        view.host = view
            .header(HOST.as_str())
            .or_else(|| parts.uri.host())
            .unwrap_or_default()
            .to_string();
        view.scheme = parts.uri.scheme_str().unwrap_or("http").to_string();
        view.query = parts.uri.query().unwrap_or_default().to_string();
        view.protocol = format!("{:?}", parts.version);
        view.body = Some(body.to_vec()).filter(|body| !body.is_empty());
        Ok(view)
    }

    fn encode(&self, verdict: &Verdict) -> Response {
        let mut response = match verdict {
            Verdict::Allow { header_mutations } => {
                let mut response = Response::new(Body::empty());
                let headers = response.headers_mut();
                for mutation in header_mutations {
                    let Some((name, value)) = header_pair(&mutation.key, &mutation.value) else {
                        continue;
                    };
                    if mutation.append {
                        headers.append(name, value);
                    } else {
                        headers.insert(name, value);
                    }
                }
                response
            }
            Verdict::Deny(denial) => {
                let mut response = Response::new(Body::from(denial.body.clone()));
                *response.status_mut() = denial.http_status;
                let headers = response.headers_mut();
                for (key, value) in &denial.headers {
                    if let Some((name, value)) = header_pair(key, value) {
                        headers.insert(name, value);
                    }
                }
                response
            }
        };

        response.headers_mut().insert(
            HeaderName::from_static(X_EXT_AUTHZ_STATUS),
            HeaderValue::from_static(rpc_code_name(verdict.rpc_code())),
        );
        response
    }
}

fn header_pair(key: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    match (HeaderName::try_from(key), HeaderValue::try_from(value)) {
        (Ok(name), Ok(value)) => Some((name, value)),
        _ => {
            tracing::warn!(header = key, "Dropping header that is not valid on the wire");
            None
        }
    }
}

#[derive(Clone)]
struct HttpCheckState {
    endpoint: Arc<CheckEndpoint<HttpAdapter>>,
    max_body_bytes: usize,
}

/// Build the router answering checks on every path.
pub fn router(policy: Arc<DecisionPolicy>, config: &HttpCheckConfig) -> Router {
    let state = HttpCheckState {
        endpoint: Arc::new(CheckEndpoint::new(HttpAdapter, policy)),
        max_body_bytes: config.max_body_bytes,
    };
    let request_id = HeaderName::from_static(X_REQUEST_ID);

    Router::new()
        .fallback(check_handler)
        .with_state(state)
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

async fn check_handler(State(state): State<HttpCheckState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| e.to_string());

    state.endpoint.check(HttpCheckRequest { parts, body }).await
}
