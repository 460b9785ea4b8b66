//! Configuration validation.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::EngineConfig;

/// A single validation failure. Loading reports all of them at once.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.bind_address {0:?} is not a valid socket address")]
    BindAddress(String),

    #[error("server.max_connections must be at least 1")]
    MaxConnections,

    #[error("client.pool_size must be at least 1")]
    PoolSize,

    #[error("client.manifest_path {0:?} must start with '/'")]
    ManifestPath(String),
}

/// Validate a loaded configuration, collecting every failure.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.server.bind_address.clone(),
        ));
    }
    if config.server.max_connections == 0 {
        errors.push(ValidationError::MaxConnections);
    }
    if config.client.pool_size == 0 {
        errors.push(ValidationError::PoolSize);
    }
    if !config.client.manifest_path.starts_with('/') {
        errors.push(ValidationError::ManifestPath(
            config.client.manifest_path.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
