//! `envoy.service.auth.v3.Authorization`

use crate::check::{ProtocolAdapter, RequestView, Verdict, ViewError};
use crate::proto::rpc;
use crate::proto::v3::{
    check_response::HttpResponse, CheckRequest, CheckResponse, DeniedHttpResponse, HeaderValue,
    HeaderValueOption, HttpStatus, OkHttpResponse,
};
use crate::protocol::grpc::GrpcAdapter;
use crate::protocol::ProtocolVersion;

/// Adapter for the v3 API, the only one that carries the raw body.
#[derive(Debug, Clone, Copy, Default)]
pub struct V3Adapter;

impl GrpcAdapter for V3Adapter {
    const SERVICE_NAME: &'static str = "envoy.service.auth.v3.Authorization";
    const CHECK_PATH: &'static str = "/envoy.service.auth.v3.Authorization/Check";
}

impl ProtocolAdapter for V3Adapter {
    type Request = CheckRequest;
    type Response = CheckResponse;

    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V3
    }

    fn request_view(&self, request: &CheckRequest) -> Result<RequestView, ViewError> {
        let http = request
            .attributes
            .as_ref()
            .and_then(|attributes| attributes.request.as_ref())
            .and_then(|request| request.http.as_ref())
            .ok_or(ViewError::MissingHttpAttributes)?;

        let mut view = RequestView::new(ProtocolVersion::V3, http.method.as_str(), http.path.as_str());
        view.request_id = Some(http.id.clone()).filter(|id| !id.is_empty());
        view.scheme = http.scheme.clone();
        view.host = http.host.clone();
        view.query = http.query.clone();
        view.protocol = http.protocol.clone();
        view.extend_headers(&http.headers);
        view.body = if !http.raw_body.is_empty() {
            Some(http.raw_body.clone())
        } else if !http.body.is_empty() {
            Some(http.body.clone().into_bytes())
        } else {
            None
        };
        Ok(view)
    }

    fn encode(&self, verdict: &Verdict) -> CheckResponse {
        let http_response = match verdict {
            Verdict::Allow { header_mutations } => HttpResponse::OkResponse(OkHttpResponse {
                headers: header_mutations
                    .iter()
                    .map(|mutation| HeaderValueOption {
                        header: Some(HeaderValue {
                            key: mutation.key.clone(),
                            value: mutation.value.clone(),
                        }),
                        append: Some(mutation.append.into()),
                    })
                    .collect(),
                headers_to_remove: Vec::new(),
            }),
            Verdict::Deny(denial) => HttpResponse::DeniedResponse(DeniedHttpResponse {
                status: Some(HttpStatus {
                    code: i32::from(denial.http_status.as_u16()),
                }),
                headers: denial
                    .headers
                    .iter()
                    .map(|(key, value)| HeaderValueOption {
                        header: Some(HeaderValue {
                            key: key.clone(),
                            value: value.clone(),
                        }),
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
}
