//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Announce → Build orchestrator
//!
//! Run (orchestrator.rs):
//!     One supervisor per enabled version → first exit cancels the rest
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Trigger cancellation → Drain listeners → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then policy, then listeners
//! - Shutdown has timeout: a listener that cannot drain is aborted
//! - A second signal forces exit

pub mod orchestrator;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use orchestrator::{ServiceError, ServiceOrchestrator};
pub use shutdown::Shutdown;
