//! `envoy.service.auth.v2.Authorization` and its `v2alpha` alias.
//!
//! Both services exchange the same messages; they differ in service name and
//! in the version label attached to logs and metrics.

use crate::check::{ProtocolAdapter, RequestView, Verdict, ViewError};
use crate::proto::rpc;
use crate::proto::v2::{
    check_response::HttpResponse, CheckRequest, CheckResponse, DeniedHttpResponse, HeaderValue,
    HeaderValueOption, HttpStatus, OkHttpResponse,
};
use crate::protocol::grpc::GrpcAdapter;
use crate::protocol::ProtocolVersion;

#[derive(Debug, Clone, Copy, Default)]
pub struct V2Adapter;

#[derive(Debug, Clone, Copy, Default)]
pub struct V2AlphaAdapter;

impl GrpcAdapter for V2Adapter {
    const SERVICE_NAME: &'static str = "envoy.service.auth.v2.Authorization";
    const CHECK_PATH: &'static str = "/envoy.service.auth.v2.Authorization/Check";
}

impl GrpcAdapter for V2AlphaAdapter {
    const SERVICE_NAME: &'static str = "envoy.service.auth.v2alpha.Authorization";
    const CHECK_PATH: &'static str = "/envoy.service.auth.v2alpha.Authorization/Check";
}

impl ProtocolAdapter for V2Adapter {
    type Request = CheckRequest;
    type Response = CheckResponse;

    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V2
    }

    fn request_view(&self, request: &CheckRequest) -> Result<RequestView, ViewError> {
        view_of(ProtocolVersion::V2, request)
    }

    fn encode(&self, verdict: &Verdict) -> CheckResponse {
        encode(verdict)
    }
}

impl ProtocolAdapter for V2AlphaAdapter {
    type Request = CheckRequest;
    type Response = CheckResponse;

    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V2Alpha
    }

    fn request_view(&self, request: &CheckRequest) -> Result<RequestView, ViewError> {
        view_of(ProtocolVersion::V2Alpha, request)
    }

    fn encode(&self, verdict: &Verdict) -> CheckResponse {
        encode(verdict)
    }
}

fn view_of(version: ProtocolVersion, request: &CheckRequest) -> Result<RequestView, ViewError> {
    let http = request
        .attributes
        .as_ref()
        .and_then(|attributes| attributes.request.as_ref())
        .and_then(|request| request.http.as_ref())
        .ok_or(ViewError::MissingHttpAttributes)?;

    let mut view = RequestView::new(version, http.method.as_str(), http.path.as_str());
    view.request_id = Some(http.id.clone()).filter(|id| !id.is_empty());
    view.scheme = http.scheme.clone();
    view.host = http.host.clone();
    view.query = http.query.clone();
    view.protocol = http.protocol.clone();
    view.extend_headers(&http.headers);
    view.body = Some(http.body.clone().into_bytes()).filter(|body| !body.is_empty());
    Ok(view)
}

fn encode(verdict: &Verdict) -> CheckResponse {
    let header = |key: &str, value: &str| HeaderValue {
        key: key.to_string(),
        value: value.to_string(),
    };

    let http_response = match verdict {
        Verdict::Allow { header_mutations } => HttpResponse::OkResponse(OkHttpResponse {
            headers: header_mutations
                .iter()
                .map(|mutation| HeaderValueOption {
                    header: Some(header(&mutation.key, &mutation.value)),
                    append: Some(mutation.append.into()),
                })
                .collect(),
        }),
        Verdict::Deny(denial) => HttpResponse::DeniedResponse(DeniedHttpResponse {
            status: Some(HttpStatus {
                code: i32::from(denial.http_status.as_u16()),
            }),
            headers: denial
                .headers
                .iter()
                .map(|(key, value)| HeaderValueOption {
                    header: Some(header(key, value)),
                    append: None,
                })
                .collect(),
            body: denial.body.clone(),
        }),
    };

    CheckResponse {
        status: Some(rpc::Status::from(verdict.rpc_code())),
        http_response: Some(http_response),
    }
}
