//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceOrchestrator
//!     → listener.rs (bind, serve task, drain, state machine)
//!     → tls.rs (settings inspected and reported, plaintext served)
//!     → crate::protocol::Endpoint (tonic / axum accept loop)
//! ```
//!
//! # Design Decisions
//! - One supervisor per protocol version, each on its own port
//! - The serve task owns the bound listener; dropping the task closes it
//! - Draining is bounded; a stuck drain is aborted, never awaited forever

pub mod listener;
pub mod tls;

pub use listener::{ListenerError, ListenerState, ListenerSupervisor};
pub use tls::TlsCheck;
