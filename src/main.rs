//! ext-authz service binary.
//!
//! Resolves the configuration (optional TOML file, then environment), starts
//! one listener per enabled protocol version and runs until SIGTERM/SIGINT.

use std::path::PathBuf;

use clap::Parser;

use ext_authz::config;
use ext_authz::lifecycle::{signals, startup, ServiceOrchestrator, Shutdown};
use ext_authz::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "ext-authz")]
#[command(about = "Envoy external authorization service", long_about = None)]
struct Cli {
    /// Optional TOML configuration file, overridden by environment variables
    #[arg(short, long, env = "EXT_AUTHZ_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = match config::load(cli.config.as_deref(), |name| std::env::var(name).ok()) {
        Ok(loaded) => loaded,
        Err(e) => {
            // Logging is configured from the same config, so report this one plainly.
            eprintln!("ext-authz: {e}");
            return Err(e.into());
        }
    };
    let config = loaded.config;

    logging::init_logging(&config.observability)?;
    startup::announce(&config, &loaded.warnings);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let orchestrator = ServiceOrchestrator::new(config).map_err(|e| {
        tracing::error!(error = %e, "Failed to build service");
        e
    })?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    if let Err(e) = orchestrator.run(shutdown.subscribe()).await {
        tracing::error!(error = %e, "Service terminated with error");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
