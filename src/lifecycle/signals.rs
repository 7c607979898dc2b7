//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT)
//! - First signal triggers a graceful drain
//! - A second signal forces the process to exit
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Only Ctrl-C is available outside unix

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

/// Wait for the next termination signal and return its name.
#[cfg(unix)]
pub async fn termination_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = interrupt.recv() => Ok("SIGINT"),
    }
}

/// Wait for the next termination signal and return its name.
#[cfg(not(unix))]
pub async fn termination_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Trigger `shutdown` on the first signal, exit hard on the second.
pub fn spawn_signal_handler(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        match termination_signal().await {
            Ok(signal) => {
                tracing::info!(signal, "Shutdown signal received, draining listeners");
                shutdown.trigger();
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                return;
            }
        }

        if let Ok(signal) = termination_signal().await {
            tracing::warn!(signal, "Second signal received, forcing exit");
            std::process::exit(1);
        }
    })
}
