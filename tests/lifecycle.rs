//! Startup, failure and shutdown behaviour of the whole service.

use std::time::Duration;

use ext_authz::client::{self, CheckInput};
use ext_authz::config::{ConfigError, PolicyMode, ValidationError};
use ext_authz::lifecycle::{ServiceError, ServiceOrchestrator};
use ext_authz::net::ListenerError;
use ext_authz::protocol::ProtocolVersion;
use tokio_util::sync::CancellationToken;

mod common;

#[tokio::test]
async fn test_two_versions_start_and_stop_cleanly() {
    let config = common::loopback_config(&[
        (ProtocolVersion::V3, 28701),
        (ProtocolVersion::Http, 28702),
    ]);
    let service = common::start_service(config).await;

    let grpc = client::check(ProtocolVersion::V3, &common::target(28701), &CheckInput::get("/"))
        .await
        .unwrap();
    let http = client::check(ProtocolVersion::Http, &common::target(28702), &CheckInput::get("/"))
        .await
        .unwrap();
    assert!(grpc.is_allowed());
    assert!(http.is_allowed());

    assert!(service.stop().await.is_ok());

    // Both ports are released once the service stopped.
    tokio::net::TcpListener::bind("127.0.0.1:28701").await.unwrap();
    tokio::net::TcpListener::bind("127.0.0.1:28702").await.unwrap();
}

#[tokio::test]
async fn test_occupied_port_fails_without_hanging() {
    let _holder = std::net::TcpListener::bind("127.0.0.1:28704").unwrap();
    let config = common::loopback_config(&[
        (ProtocolVersion::V3, 28703),
        (ProtocolVersion::V2, 28704),
    ]);
    let orchestrator = ServiceOrchestrator::new(config).unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        orchestrator.run(CancellationToken::new()),
    )
    .await
    .expect("orchestrator hung after a bind failure");

    match result {
        Err(ServiceError::Listener {
            version,
            source: ListenerError::Bind { addr, .. },
        }) => {
            assert_eq!(version, ProtocolVersion::V2);
            assert_eq!(addr.port(), 28704);
        }
        other => panic!("expected bind error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_first_error_in_construction_order_wins() {
    let _v3 = std::net::TcpListener::bind("127.0.0.1:28705").unwrap();
    let _http = std::net::TcpListener::bind("127.0.0.1:28706").unwrap();
    let config = common::loopback_config(&[
        (ProtocolVersion::Http, 28706),
        (ProtocolVersion::V3, 28705),
    ]);

    let err = ServiceOrchestrator::new(config)
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        ServiceError::Listener { version, .. } => assert_eq!(version, ProtocolVersion::V3),
        other => panic!("expected listener error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_duplicate_ports_rejected_before_binding() {
    let config = common::loopback_config(&[
        (ProtocolVersion::V3, 28707),
        (ProtocolVersion::Http, 28707),
    ]);

    match ServiceOrchestrator::new(config) {
        Err(ServiceError::Config(ConfigError::Validation(errors))) => {
            assert!(errors.iter().any(|e| matches!(
                e,
                ValidationError::PortConflict { port: 28707, .. }
            )));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    // Nothing was bound.
    tokio::net::TcpListener::bind("127.0.0.1:28707").await.unwrap();
}

#[tokio::test]
async fn test_zero_enabled_versions_is_an_error() {
    let config = common::loopback_config(&[]);
    assert!(matches!(
        ServiceOrchestrator::new(config),
        Err(ServiceError::Config(ConfigError::Validation(_)))
    ));
}

#[tokio::test]
async fn test_query_filter_mode_end_to_end() {
    let mut config = common::loopback_config(&[(ProtocolVersion::V2, 28708)]);
    config.policy.mode = PolicyMode::QueryFilter;
    config.policy.query_filter.query = "debug=1".to_string();
    config.policy.query_filter.action = "403".to_string();
    let service = common::start_service(config).await;
    let target = common::target(28708);

    let denied = client::check(ProtocolVersion::V2, &target, &CheckInput::get("/page?debug=1"))
        .await
        .unwrap();
    assert_eq!(denied.code, tonic::Code::PermissionDenied);
    assert_eq!(denied.http_status, 403);
    assert_eq!(denied.body, "Unauthorized");

    let allowed = client::check(ProtocolVersion::V2, &target, &CheckInput::get("/page?debug=0"))
        .await
        .unwrap();
    assert!(allowed.is_allowed());
    assert!(allowed.headers.is_empty());

    service.stop().await.unwrap();
}

async fn assert_in_flight_call_survives_stop(version: ProtocolVersion, port: u16) {
    let service = common::start_service(common::loopback_config(&[(version, port)])).await;
    let target = common::target(port);

    let in_flight = tokio::spawn(async move {
        client::check(version, &target, &CheckInput::get("/slow").header("sleepfor", "1")).await
    });

    // Stop while the call is still sleeping inside the policy.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(service.stop().await.is_ok());

    let outcome = in_flight.await.unwrap().unwrap();
    assert_eq!(outcome.code, tonic::Code::Ok);
    assert!(outcome.is_allowed());
}

#[tokio::test]
async fn test_grpc_stop_drains_in_flight_call() {
    assert_in_flight_call_survives_stop(ProtocolVersion::V3, 28709).await;
}

#[tokio::test]
async fn test_http_stop_drains_in_flight_call() {
    assert_in_flight_call_survives_stop(ProtocolVersion::Http, 28710).await;
}
