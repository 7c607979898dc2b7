//! Service orchestration.
//!
//! Builds one [`ListenerSupervisor`] per enabled protocol version and runs
//! them concurrently under a shared cancellation token. The first supervisor
//! to exit, for any reason, stops its siblings.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::config::{validate_config, ConfigError, ServiceConfig, ValidationError};
use crate::net::{tls, ListenerError, ListenerSupervisor};
use crate::policy::{DecisionPolicy, PolicyError};
use crate::protocol::{Endpoint, ProtocolVersion};

/// Fatal service error.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build decision policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("{version} listener: {source}")]
    Listener {
        version: ProtocolVersion,
        #[source]
        source: ListenerError,
    },
}

/// Root of the running service.
#[derive(Debug)]
pub struct ServiceOrchestrator {
    config: Arc<ServiceConfig>,
    policy: Arc<DecisionPolicy>,
}

impl ServiceOrchestrator {
    /// Validate `config` and compile the decision policy.
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let policy = DecisionPolicy::from_config(&config.policy)?;

        Ok(Self {
            config: Arc::new(config),
            policy: Arc::new(policy),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn policy(&self) -> Arc<DecisionPolicy> {
        Arc::clone(&self.policy)
    }

    /// Supervisors for every enabled version, in construction order.
    pub fn supervisors(&self) -> Result<Vec<ListenerSupervisor>, ServiceError> {
        let host: IpAddr = self.config.bind_host.0.parse().map_err(|_| {
            ConfigError::Validation(vec![ValidationError::InvalidBindHost(
                self.config.bind_host.0.clone(),
            )])
        })?;
        let drain_timeout = Duration::from_secs(self.config.shutdown.drain_timeout_secs);

        let supervisors = self
            .config
            .enabled_listeners()
            .into_iter()
            .map(|(version, listener)| {
                tls::report(version, listener);
                let endpoint = Endpoint::build(version, self.policy(), &self.config.http);
                ListenerSupervisor::new(
                    version,
                    SocketAddr::new(host, listener.port),
                    endpoint,
                    drain_timeout,
                )
            })
            .collect();
        Ok(supervisors)
    }

    /// Run every enabled listener until `cancel` fires or one of them fails.
    ///
    /// Waits for all listeners to finish. When several fail, the error of the
    /// earliest constructed listener is returned.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let supervisors = self.supervisors()?;
        if supervisors.is_empty() {
            return Err(ConfigError::Validation(vec![ValidationError::NoListenersEnabled]).into());
        }

        let group = cancel.child_token();
        let tasks = supervisors.into_iter().map(|supervisor| {
            let version = supervisor.version();
            let token = group.clone();
            async move {
                // Any exit, clean or not, stops the siblings.
                let _stop_siblings = token.clone().drop_guard();
                supervisor
                    .start(token)
                    .await
                    .map_err(|source| ServiceError::Listener { version, source })
            }
        });

        let results = join_all(tasks).await;
        match results.into_iter().find_map(Result::err) {
            Some(error) => {
                tracing::error!(error = %error, "Service stopped on listener failure");
                Err(error)
            }
            None => {
                tracing::info!("All listeners stopped");
                Ok(())
            }
        }
    }
}
