//! gRPC `Authorization` service shared by every gRPC protocol version.
//!
//! Equivalent to what `tonic-build` emits for a service with a single unary
//! `Check` method, written once and parameterized over the adapter.

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use tonic::codegen::{http, Body, BoxFuture, Service, StdError};
use tonic::server::{Grpc, NamedService, UnaryService};

use crate::check::{CheckEndpoint, ProtocolAdapter};
use crate::policy::DecisionPolicy;

/// A gRPC flavour of the Envoy authorization API.
pub trait GrpcAdapter: ProtocolAdapter + Default {
    /// Fully qualified service name, e.g. `envoy.service.auth.v3.Authorization`.
    const SERVICE_NAME: &'static str;
    /// `/{SERVICE_NAME}/Check`
    const CHECK_PATH: &'static str;
}

/// Serves `Check` for one gRPC adapter.
pub struct AuthorizationServer<A> {
    endpoint: Arc<CheckEndpoint<A>>,
}

impl<A: GrpcAdapter> AuthorizationServer<A> {
    pub fn new(policy: Arc<DecisionPolicy>) -> Self {
        Self::from_endpoint(Arc::new(CheckEndpoint::new(A::default(), policy)))
    }

    pub fn from_endpoint(endpoint: Arc<CheckEndpoint<A>>) -> Self {
        Self { endpoint }
    }
}

impl<A> Clone for AuthorizationServer<A> {
    fn clone(&self) -> Self {
        Self {
            endpoint: Arc::clone(&self.endpoint),
        }
    }
}

impl<A: GrpcAdapter> NamedService for AuthorizationServer<A> {
    const NAME: &'static str = A::SERVICE_NAME;
}

impl<A, B> Service<http::Request<B>> for AuthorizationServer<A>
where
    A: GrpcAdapter,
    A::Request: prost::Message + Default,
    A::Response: prost::Message,
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::Body>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        if req.uri().path() != A::CHECK_PATH {
            return Box::pin(async move {
                let mut response = http::Response::new(tonic::body::Body::default());
                let headers = response.headers_mut();
                headers.insert(
                    tonic::Status::GRPC_STATUS,
                    (tonic::Code::Unimplemented as i32).into(),
                );
                headers.insert(
                    http::header::CONTENT_TYPE,
                    tonic::metadata::GRPC_CONTENT_TYPE,
                );
                Ok(response)
            });
        }

        let method = CheckMethod(Arc::clone(&self.endpoint));
        Box::pin(async move {
            let mut grpc = Grpc::new(tonic_prost::ProstCodec::default());
            Ok(grpc.unary(method, req).await)
        })
    }
}

struct CheckMethod<A>(Arc<CheckEndpoint<A>>);

impl<A: GrpcAdapter> UnaryService<A::Request> for CheckMethod<A> {
    type Response = A::Response;
    type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

    fn call(&mut self, request: tonic::Request<A::Request>) -> Self::Future {
        let endpoint = Arc::clone(&self.0);
        Box::pin(async move {
            let response = endpoint.check(request.into_inner()).await;
            Ok(tonic::Response::new(response))
        })
    }
}
