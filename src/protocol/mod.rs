//! Wire protocol versions of the Envoy authorization API.
//!
//! # Data Flow
//! ```text
//! accepted TCP stream
//!     → Endpoint (tonic Router for gRPC, axum Router for HTTP)
//!     → AuthorizationServer<Adapter> / http::router
//!     → CheckEndpoint (crate::check)
//! ```
//!
//! # Design Decisions
//! - The `v2` listener also answers `v2alpha`, the `v2alpha` listener only `v2alpha`
//! - Endpoints never bind; they serve an already bound listener until drained

pub mod grpc;
pub mod http;
pub mod v2;
pub mod v3;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;

use crate::config::HttpCheckConfig;
use crate::policy::DecisionPolicy;

pub use grpc::{AuthorizationServer, GrpcAdapter};
pub use http::HttpAdapter;
pub use v2::{V2Adapter, V2AlphaAdapter};
pub use v3::V3Adapter;

/// A protocol version this service can expose.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    #[default]
    V3,
    V2,
    V2Alpha,
    Http,
}

impl ProtocolVersion {
    /// Every version, in listener construction order.
    pub const ALL: [ProtocolVersion; 4] = [
        ProtocolVersion::V3,
        ProtocolVersion::V2,
        ProtocolVersion::V2Alpha,
        ProtocolVersion::Http,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolVersion::V3 => "v3",
            ProtocolVersion::V2 => "v2",
            ProtocolVersion::V2Alpha => "v2alpha",
            ProtocolVersion::Http => "http",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            ProtocolVersion::V3 => 3000,
            ProtocolVersion::V2 => 2000,
            ProtocolVersion::V2Alpha => 2500,
            ProtocolVersion::Http => 8000,
        }
    }

    /// Prefix of this version's environment variables, e.g. `GRPC_V3`.
    pub fn env_prefix(self) -> &'static str {
        match self {
            ProtocolVersion::V3 => "GRPC_V3",
            ProtocolVersion::V2 => "GRPC_V2",
            ProtocolVersion::V2Alpha => "GRPC_V2ALPHA",
            ProtocolVersion::Http => "HTTP",
        }
    }

    pub fn is_grpc(self) -> bool {
        !matches!(self, ProtocolVersion::Http)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown protocol version '{0}', expected one of v3, v2, v2alpha, http")]
pub struct UnknownVersion(pub String);

impl FromStr for ProtocolVersion {
    type Err = UnknownVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProtocolVersion::ALL
            .into_iter()
            .find(|version| version.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVersion(s.to_string()))
    }
}

/// Failure while serving an endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("grpc transport error: {0}")]
    Grpc(#[from] tonic::transport::Error),

    #[error("http server error: {0}")]
    Http(#[from] std::io::Error),
}

/// A fully built, not yet serving, endpoint for one protocol version.
pub enum Endpoint {
    Grpc(tonic::transport::server::Router),
    Http(axum::Router),
}

impl Endpoint {
    /// Build the services answering `version`.
    pub fn build(
        version: ProtocolVersion,
        policy: Arc<DecisionPolicy>,
        http_config: &HttpCheckConfig,
    ) -> Self {
        let mut server = tonic::transport::Server::builder();
        match version {
            ProtocolVersion::V3 => Endpoint::Grpc(
                server.add_service(AuthorizationServer::<V3Adapter>::new(policy)),
            ),
            ProtocolVersion::V2 => Endpoint::Grpc(
                server
                    .add_service(AuthorizationServer::<V2Adapter>::new(Arc::clone(&policy)))
                    .add_service(AuthorizationServer::<V2AlphaAdapter>::new(policy)),
            ),
            ProtocolVersion::V2Alpha => Endpoint::Grpc(
                server.add_service(AuthorizationServer::<V2AlphaAdapter>::new(policy)),
            ),
            ProtocolVersion::Http => Endpoint::Http(http::router(policy, http_config)),
        }
    }

    /// Serve on `listener` until `drain` is cancelled and in-flight calls finish.
    pub async fn serve(self, listener: TcpListener, drain: CancellationToken) -> Result<(), ServeError> {
        match self {
            Endpoint::Grpc(router) => {
                router
                    .serve_with_incoming_shutdown(
                        TcpListenerStream::new(listener),
                        drain.cancelled_owned(),
                    )
                    .await?;
            }
            Endpoint::Http(router) => {
                axum::serve(listener, router)
                    .with_graceful_shutdown(drain.cancelled_owned())
                    .await?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Grpc(_) => f.write_str("Endpoint::Grpc"),
            Endpoint::Http(_) => f.write_str("Endpoint::Http"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_table() {
        let ports: Vec<u16> = ProtocolVersion::ALL.iter().map(|v| v.default_port()).collect();
        assert_eq!(ports, vec![3000, 2000, 2500, 8000]);
        assert_eq!(ProtocolVersion::V2Alpha.env_prefix(), "GRPC_V2ALPHA");
        assert!(ProtocolVersion::V2.is_grpc());
        assert!(!ProtocolVersion::Http.is_grpc());
    }

    #[test]
    fn parses_and_displays() {
        for version in ProtocolVersion::ALL {
            assert_eq!(version.to_string().parse::<ProtocolVersion>().unwrap(), version);
        }
        assert_eq!("V2ALPHA".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::V2Alpha);
        assert!("v4".parse::<ProtocolVersion>().is_err());
    }
}
