//! Check call handling.
//!
//! # Data Flow
//! ```text
//! wire request (gRPC v3 / v2 / v2alpha, HTTP)
//!     → ProtocolAdapter::request_view (view.rs)
//!     → DecisionPolicy::decide (crate::policy)
//!     → Verdict (verdict.rs)
//!     → ProtocolAdapter::encode
//!     → wire response
//! ```
//!
//! # Design Decisions
//! - One generic endpoint, one small adapter per wire version
//! - A request that cannot be read is answered with a 500, never a transport error
//! - Logging and metrics observe the verdict, they never change it

pub mod endpoint;
pub mod verdict;
pub mod view;

pub use endpoint::{CheckEndpoint, ProtocolAdapter};
pub use verdict::{Denial, HeaderMutation, Verdict};
pub use view::{RequestView, ViewError};
