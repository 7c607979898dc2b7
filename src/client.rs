//! Check client.
//!
//! Sends a single check call to a running service over any protocol version
//! and normalizes the answer. Used by `authz-cli` and the integration tests.

use std::collections::HashMap;

use serde::{Serialize, Serializer};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::Code;

use crate::check::verdict::rpc_code_name;
use crate::proto::{v2, v3};
use crate::protocol::http::X_EXT_AUTHZ_STATUS;
use crate::protocol::{GrpcAdapter, ProtocolVersion, V2Adapter, V2AlphaAdapter, V3Adapter};

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("call failed: {0}")]
    Status(#[from] tonic::Status),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid method {0:?}")]
    InvalidMethod(String),

    #[error("response carries no http response")]
    MissingHttpResponse,
}

/// The request to authorize, as the proxy would describe it.
#[derive(Debug, Clone)]
pub struct CheckInput {
    pub method: String,
    /// Request target, query included.
    pub path: String,
    pub host: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl CheckInput {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            host: "localhost".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn header_map(&self) -> HashMap<String, String> {
        self.headers.iter().cloned().collect()
    }
}

/// A header from the answer. `append` is `None` when the wire carried no flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
    pub append: Option<bool>,
}

/// Normalized answer to a check call.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    #[serde(serialize_with = "serialize_code")]
    pub code: Code,
    pub http_status: u16,
    pub headers: Vec<HeaderEntry>,
    pub body: String,
}

impl CheckOutcome {
    pub fn is_allowed(&self) -> bool {
        self.code == Code::Ok
    }

    /// First header named `key`, case-insensitively.
    pub fn header(&self, key: &str) -> Option<&HeaderEntry> {
        self.headers.iter().find(|h| h.key.eq_ignore_ascii_case(key))
    }
}

fn serialize_code<S: Serializer>(code: &Code, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(rpc_code_name(*code))
}

/// Send one check call to `target` (e.g. `http://127.0.0.1:3000`).
pub async fn check(
    version: ProtocolVersion,
    target: &str,
    input: &CheckInput,
) -> Result<CheckOutcome, ClientError> {
    match version {
        ProtocolVersion::V3 => {
            let response: v3::CheckResponse =
                grpc_unary(target, V3Adapter::CHECK_PATH, v3_request(input)).await?;
            v3_outcome(response)
        }
        ProtocolVersion::V2 => {
            let response = grpc_unary(target, V2Adapter::CHECK_PATH, v2_request(input)).await?;
            v2_outcome(response)
        }
        ProtocolVersion::V2Alpha => {
            let response =
                grpc_unary(target, V2AlphaAdapter::CHECK_PATH, v2_request(input)).await?;
            v2_outcome(response)
        }
        ProtocolVersion::Http => http_check(target, input).await,
    }
}

async fn grpc_unary<Req, Resp>(
    target: &str,
    path: &'static str,
    request: Req,
) -> Result<Resp, ClientError>
where
    Req: prost::Message + 'static,
    Resp: prost::Message + Default + 'static,
{
    let channel = tonic::transport::Endpoint::from_shared(target.to_string())?
        .connect()
        .await?;
    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready().await?;

    let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
    let response = grpc
        .unary(
            tonic::Request::new(request),
            PathAndQuery::from_static(path),
            codec,
        )
        .await?;
    Ok(response.into_inner())
}

fn v3_request(input: &CheckInput) -> v3::CheckRequest {
    let body = input.body.clone().unwrap_or_default();
    v3::CheckRequest {
        attributes: Some(v3::AttributeContext {
            request: Some(v3::attribute_context::Request {
                http: Some(v3::attribute_context::HttpRequest {
                    method: input.method.clone(),
                    path: input.path.clone(),
                    host: input.host.clone(),
                    scheme: "http".to_string(),
                    protocol: "HTTP/1.1".to_string(),
                    headers: input.header_map(),
                    size: body.len() as i64,
                    raw_body: body.clone().into_bytes(),
                    body,
                    ..Default::default()
                }),
            }),
            ..Default::default()
        }),
    }
}

fn v2_request(input: &CheckInput) -> v2::CheckRequest {
    let body = input.body.clone().unwrap_or_default();
    v2::CheckRequest {
        attributes: Some(v2::AttributeContext {
            request: Some(v2::attribute_context::Request {
                http: Some(v2::attribute_context::HttpRequest {
                    method: input.method.clone(),
                    path: input.path.clone(),
                    host: input.host.clone(),
                    scheme: "http".to_string(),
                    protocol: "HTTP/1.1".to_string(),
                    headers: input.header_map(),
                    size: body.len() as i64,
                    body,
                    ..Default::default()
                }),
            }),
            ..Default::default()
        }),
    }
}

fn v3_outcome(response: v3::CheckResponse) -> Result<CheckOutcome, ClientError> {
    use v3::check_response::HttpResponse;

    let code = Code::from_i32(response.status.map_or(0, |s| s.code));
    let entry = |option: v3::HeaderValueOption| {
        option.header.map(|h| HeaderEntry {
            key: h.key,
            value: h.value,
            append: option.append.map(|b| b.value),
        })
    };

    match response.http_response {
        Some(HttpResponse::OkResponse(ok)) => Ok(CheckOutcome {
            code,
            http_status: 200,
            headers: ok.headers.into_iter().filter_map(entry).collect(),
            body: String::new(),
        }),
        Some(HttpResponse::DeniedResponse(denied)) => Ok(CheckOutcome {
            code,
            http_status: denied.status.map_or(403, |s| s.code as u16),
            headers: denied.headers.into_iter().filter_map(entry).collect(),
            body: denied.body,
        }),
        None => Err(ClientError::MissingHttpResponse),
    }
}

fn v2_outcome(response: v2::CheckResponse) -> Result<CheckOutcome, ClientError> {
    use v2::check_response::HttpResponse;

    let code = Code::from_i32(response.status.map_or(0, |s| s.code));
    let entry = |option: v2::HeaderValueOption| {
        option.header.map(|h| HeaderEntry {
            key: h.key,
            value: h.value,
            append: option.append.map(|b| b.value),
        })
    };

    match response.http_response {
        Some(HttpResponse::OkResponse(ok)) => Ok(CheckOutcome {
            code,
            http_status: 200,
            headers: ok.headers.into_iter().filter_map(entry).collect(),
            body: String::new(),
        }),
        Some(HttpResponse::DeniedResponse(denied)) => Ok(CheckOutcome {
            code,
            http_status: denied.status.map_or(403, |s| s.code as u16),
            headers: denied.headers.into_iter().filter_map(entry).collect(),
            body: denied.body,
        }),
        None => Err(ClientError::MissingHttpResponse),
    }
}

async fn http_check(target: &str, input: &CheckInput) -> Result<CheckOutcome, ClientError> {
    let method = reqwest::Method::from_bytes(input.method.as_bytes())
        .map_err(|_| ClientError::InvalidMethod(input.method.clone()))?;
    let url = format!("{}{}", target.trim_end_matches('/'), input.path);

    let mut request = reqwest::Client::new()
        .request(method, url)
        .header(reqwest::header::HOST, input.host.as_str());
    for (name, value) in &input.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    if let Some(body) = &input.body {
        request = request.body(body.clone());
    }

    let response = request.send().await?;
    let http_status = response.status().as_u16();
    let headers: Vec<HeaderEntry> = response
        .headers()
        .iter()
        .map(|(name, value)| HeaderEntry {
            key: name.as_str().to_string(),
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            append: None,
        })
        .collect();
    let code = headers
        .iter()
        .find(|h| h.key == X_EXT_AUTHZ_STATUS)
        .and_then(|h| code_from_name(&h.value))
        .unwrap_or(if http_status == 200 { Code::Ok } else { Code::Unknown });
    let body = response.text().await?;

    Ok(CheckOutcome {
        code,
        http_status,
        headers,
        body,
    })
}

fn code_from_name(name: &str) -> Option<Code> {
    (0..=16)
        .map(Code::from_i32)
        .find(|code| rpc_code_name(*code) == name)
}
