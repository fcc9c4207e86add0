//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), optional
//!     → loader.rs (parse & deserialize)
//!     → command-line overrides (--dburi, --bind)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → passed by value to HttpServer::new and the store constructor
//! ```
//!
//! # Design Decisions
//! - No process-wide globals; every consumer receives its section explicitly
//! - All fields have defaults to allow minimal configs
//! - Pool bounds are named constants, not file settings

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{finalize, load_config, ConfigError};
pub use schema::{DatabaseConfig, ListenerConfig, ObservabilityConfig, ServerConfig, TimeoutConfig};
