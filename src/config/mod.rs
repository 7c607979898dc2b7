//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → env.rs (environment overrides, warnings for rejected values)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is resolved once at startup; there is no reload
//! - All fields have defaults to allow an empty environment
//! - A bad environment value degrades to the default, a bad combination of
//!   values (port conflict, no listener) stops startup

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use env::ConfigWarning;
pub use loader::{load, load_config, ConfigError, LoadedConfig};
pub use schema::{
    BindHost, HttpCheckConfig, ListenerConfig, LogFormat, ObservabilityConfig, PolicyConfig,
    PolicyMode, QueryFilterConfig, ServiceConfig, ShutdownConfig,
};
pub use validation::{validate_config, ValidationError};
