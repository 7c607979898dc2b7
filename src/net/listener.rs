//! Listener supervision.
//!
//! # Responsibilities
//! - Bind the configured address for one protocol version
//! - Run the endpoint on its own task
//! - Drain on cancellation, bounded by the drain timeout
//! - Publish state transitions through a watch channel
//!
//! ```text
//! Idle → Binding → Running → Draining → Stopped
//!           │         │
//!           └─────────┴──→ Errored
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::protocol::{Endpoint, ProtocolVersion, ServeError};

/// Lifecycle state of a supervised listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Binding,
    Running,
    Draining,
    Stopped,
    Errored,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListenerState::Idle => "idle",
            ListenerState::Binding => "binding",
            ListenerState::Running => "running",
            ListenerState::Draining => "draining",
            ListenerState::Stopped => "stopped",
            ListenerState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The serve loop failed.
    #[error("{version} listener failed: {source}")]
    Serve {
        version: ProtocolVersion,
        #[source]
        source: ServeError,
    },

    /// The serve loop returned without being asked to stop.
    #[error("{0} listener exited unexpectedly")]
    Exited(ProtocolVersion),

    /// The serve task panicked.
    #[error("{version} listener task panicked: {message}")]
    Panicked {
        version: ProtocolVersion,
        message: String,
    },
}

/// Owns one listener and its endpoint for the listener's whole life.
pub struct ListenerSupervisor {
    version: ProtocolVersion,
    addr: SocketAddr,
    endpoint: Endpoint,
    drain_timeout: Duration,
    state: watch::Sender<ListenerState>,
}

impl ListenerSupervisor {
    pub fn new(
        version: ProtocolVersion,
        addr: SocketAddr,
        endpoint: Endpoint,
        drain_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ListenerState::Idle);
        Self {
            version,
            addr,
            endpoint,
            drain_timeout,
            state,
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Watch state transitions. Works before and during [`start`](Self::start).
    pub fn subscribe(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Bind, serve until `shutdown` is cancelled, then drain.
    ///
    /// Returns `Ok(())` only after a requested stop.
    pub async fn start(self, shutdown: CancellationToken) -> Result<(), ListenerError> {
        let Self {
            version,
            addr,
            endpoint,
            drain_timeout,
            state,
        } = self;
        let transition = |next: ListenerState| {
            let previous = state.send_replace(next);
            tracing::debug!(%version, from = %previous, to = %next, "Listener state");
        };

        transition(ListenerState::Binding);
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                tracing::error!(%version, address = %addr, error = %source, "Failed to bind listener");
                transition(ListenerState::Errored);
                return Err(ListenerError::Bind { addr, source });
            }
        };
        let local_addr = listener.local_addr().unwrap_or(addr);
        tracing::info!(%version, address = %local_addr, "Listening for check calls");

        // The serve task owns the listener from here on.
        let drain = CancellationToken::new();
        let mut serve = tokio::spawn(endpoint.serve(listener, drain.clone()));
        transition(ListenerState::Running);

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                transition(ListenerState::Draining);
                tracing::info!(%version, "Draining listener");
                drain.cancel();

                let outcome = match tokio::time::timeout(drain_timeout, &mut serve).await {
                    Ok(Ok(Ok(()))) => Ok(()),
                    Ok(Ok(Err(source))) => Err(ListenerError::Serve { version, source }),
                    Ok(Err(join)) => Err(ListenerError::Panicked {
                        version,
                        message: join.to_string(),
                    }),
                    Err(_) => {
                        tracing::warn!(
                            %version,
                            timeout_secs = drain_timeout.as_secs(),
                            "Drain timed out, aborting in-flight calls"
                        );
                        serve.abort();
                        Ok(())
                    }
                };

                match &outcome {
                    Ok(()) => {
                        transition(ListenerState::Stopped);
                        tracing::info!(%version, "Listener stopped");
                    }
                    Err(e) => {
                        transition(ListenerState::Errored);
                        tracing::error!(%version, error = %e, "Listener failed while draining");
                    }
                }
                outcome
            }

            joined = &mut serve => {
                transition(ListenerState::Errored);
                let error = match joined {
                    Ok(Ok(())) => ListenerError::Exited(version),
                    Ok(Err(source)) => ListenerError::Serve { version, source },
                    Err(join) => ListenerError::Panicked {
                        version,
                        message: join.to_string(),
                    },
                };
                tracing::error!(%version, error = %error, "Listener stopped unexpectedly");
                Err(error)
            }
        }
    }
}

impl fmt::Debug for ListenerSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSupervisor")
            .field("version", &self.version)
            .field("addr", &self.addr)
            .field("state", &*self.state.borrow())
            .finish()
    }
}
