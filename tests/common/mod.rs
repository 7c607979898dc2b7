//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::time::Duration;

use ext_authz::config::ServiceConfig;
use ext_authz::lifecycle::{ServiceError, ServiceOrchestrator};
use ext_authz::protocol::ProtocolVersion;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Loopback config with exactly the given versions enabled.
pub fn loopback_config(enabled: &[(ProtocolVersion, u16)]) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.bind_host.0 = "127.0.0.1".to_string();
    config.shutdown.drain_timeout_secs = 5;
    for version in ProtocolVersion::ALL {
        config.listener_mut(version).enabled = false;
    }
    for (version, port) in enabled {
        let listener = config.listener_mut(*version);
        listener.enabled = true;
        listener.port = *port;
    }
    config
}

/// Base address of a loopback listener.
pub fn target(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

/// A service running in the background.
pub struct RunningService {
    pub cancel: CancellationToken,
    pub handle: JoinHandle<Result<(), ServiceError>>,
}

impl RunningService {
    pub async fn stop(self) -> Result<(), ServiceError> {
        self.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("service did not stop in time")
            .expect("service task panicked")
    }
}

/// Start the service and wait until every enabled port accepts connections.
pub async fn start_service(config: ServiceConfig) -> RunningService {
    let ports: Vec<u16> = config
        .enabled_listeners()
        .iter()
        .map(|(_, listener)| listener.port)
        .collect();
    let orchestrator = ServiceOrchestrator::new(config).expect("valid config");
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(orchestrator.run(cancel.clone()));

    for port in ports {
        wait_for_port(SocketAddr::from(([127, 0, 0, 1], port))).await;
    }
    RunningService { cancel, handle }
}

/// Poll until something accepts connections on `addr`.
pub async fn wait_for_port(addr: SocketAddr) {
    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("nothing listening on {addr}");
}
