//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! CheckEndpoint / supervisors / orchestrator produce:
//!     → logging.rs (structured log events, one span per check call)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Call id (proxy request id or UUID v4) is attached to every check span
//! - Metrics are optional and off by default

pub mod logging;
pub mod metrics;
