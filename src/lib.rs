//! Envoy external authorization service.
//!
//! Answers Envoy `ext_authz` check calls over gRPC (v3, v2, v2alpha) and
//! plain HTTP, each on its own listener, from one shared decision policy.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!                 │                ServiceOrchestrator               │
//!                 │                                                  │
//!   Envoy ───────▶│  ListenerSupervisor (v3)      ─┐                 │
//!   Envoy ───────▶│  ListenerSupervisor (v2)       ├─▶ CheckEndpoint │
//!   Envoy ───────▶│  ListenerSupervisor (v2alpha)  │      │          │
//!   Envoy ───────▶│  ListenerSupervisor (http)    ─┘      ▼          │
//!                 │                               DecisionPolicy     │
//!                 │                                       │          │
//!                 │                                       ▼          │
//!                 │                          Verdict → wire encoding │
//!                 └──────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod check;
pub mod policy;
pub mod proto;
pub mod protocol;

// Serving
pub mod lifecycle;
pub mod net;

// Cross-cutting concerns
pub mod config;
pub mod observability;

// Tooling
pub mod client;
