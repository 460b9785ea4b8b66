//! Engine configuration.
//!
//! # Responsibilities
//! - Define the configuration schema with serde derives and defaults
//! - Load and validate configuration from TOML files

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ClientConfig, EngineConfig, ServerConfig};
