//! Authorization verdicts.
//!
//! A verdict is protocol independent. Each wire version encodes it into its
//! own response shape, see `crate::protocol`.

use axum::http::StatusCode;
use tonic::Code;

/// Content type attached to JSON denial bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// Content type attached to plain denial pages.
pub const TEXT_HTML: &str = "text/html";

/// Body returned when the request could not be processed.
pub const INTERNAL_ERROR_JSON: &str = r#"{"msg": "internal server error"}"#;

/// A single header change the proxy applies to the upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMutation {
    pub key: String,
    pub value: String,
    /// `true` adds the value next to existing ones, `false` replaces them.
    pub append: bool,
}

impl HeaderMutation {
    /// A mutation that replaces any existing value.
    pub fn overwrite(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            append: false,
        }
    }

    /// A mutation that keeps existing values and adds this one.
    pub fn append(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            append: true,
        }
    }
}

/// Substitute response sent to the downstream client on denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub http_status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Canonical RPC code reported to the proxy alongside the HTTP status.
    pub rpc_code: Code,
}

/// Outcome of a single check call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Let the request through, applying the mutations in order.
    Allow { header_mutations: Vec<HeaderMutation> },
    /// Reject the request with a substitute response.
    Deny(Denial),
}

impl Verdict {
    /// Allow without touching any header.
    pub fn allow() -> Self {
        Verdict::Allow {
            header_mutations: Vec::new(),
        }
    }

    /// Deny with a single `Content-Type` header.
    pub fn deny(
        http_status: StatusCode,
        rpc_code: Code,
        content_type: &str,
        body: impl Into<String>,
    ) -> Self {
        Verdict::Deny(Denial {
            http_status,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body: body.into(),
            rpc_code,
        })
    }

    /// The request could not be processed at all.
    pub fn internal_error() -> Self {
        Self::deny(
            StatusCode::INTERNAL_SERVER_ERROR,
            Code::Unknown,
            APPLICATION_JSON,
            INTERNAL_ERROR_JSON,
        )
    }

    /// Canonical RPC code mirroring this verdict.
    pub fn rpc_code(&self) -> Code {
        match self {
            Verdict::Allow { .. } => Code::Ok,
            Verdict::Deny(denial) => denial.rpc_code,
        }
    }

    /// HTTP status the downstream client ends up seeing.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Verdict::Allow { .. } => StatusCode::OK,
            Verdict::Deny(denial) => denial.http_status,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow { .. })
    }

    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Allow { .. } => "allow",
            Verdict::Deny(_) => "deny",
        }
    }
}

/// Canonical upper-case name of an RPC code, e.g. `PERMISSION_DENIED`.
pub fn rpc_code_name(code: Code) -> &'static str {
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "CANCELLED",
        Code::Unknown => "UNKNOWN",
        Code::InvalidArgument => "INVALID_ARGUMENT",
        Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
        Code::NotFound => "NOT_FOUND",
        Code::AlreadyExists => "ALREADY_EXISTS",
        Code::PermissionDenied => "PERMISSION_DENIED",
        Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
        Code::FailedPrecondition => "FAILED_PRECONDITION",
        Code::Aborted => "ABORTED",
        Code::OutOfRange => "OUT_OF_RANGE",
        Code::Unimplemented => "UNIMPLEMENTED",
        Code::Internal => "INTERNAL",
        Code::Unavailable => "UNAVAILABLE",
        Code::DataLoss => "DATA_LOSS",
        Code::Unauthenticated => "UNAUTHENTICATED",
    }
}
