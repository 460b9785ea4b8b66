//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Defaults follow the reference deployment: port 20080, a 100-slot
//! connection table, a 3 s readiness-wait timeout, and a 50 s idle timeout.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for both engine roles.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Server event-loop configuration.
    pub server: ServerConfig,

    /// Client fetch-engine configuration.
    pub client: ClientConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:20080").
    pub bind_address: String,

    /// Connection table capacity. Connections past this bound are rejected
    /// with a 503 response (admission control).
    pub max_connections: usize,

    /// Upper bound on one readiness wait, in milliseconds. Housekeeping
    /// (idle eviction) runs at least this often.
    pub poll_timeout_ms: u64,

    /// Connections idle longer than this are evicted, in seconds.
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:20080".to_string(),
            max_connections: 100,
            poll_timeout_ms: 3000,
            idle_timeout_secs: 50,
        }
    }
}

impl ServerConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection pool capacity. A new connection is opened only while the
    /// pool holds fewer than this many.
    pub pool_size: usize,

    /// Path of the well-known dependency manifest fetched first.
    pub manifest_path: String,

    /// Upper bound on one readiness wait, in milliseconds.
    pub poll_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            manifest_path: "/dependency.csv".to_string(),
            poll_timeout_ms: 3000,
        }
    }
}

impl ClientConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = EngineConfig::default();
        assert_eq!(config.server.bind_address, "0.0.0.0:20080");
        assert_eq!(config.server.max_connections, 100);
        assert_eq!(config.client.manifest_path, "/dependency.csv");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: EngineConfig =
            toml::from_str("[server]\nmax_connections = 2\n").unwrap();
        assert_eq!(config.server.max_connections, 2);
        assert_eq!(config.server.poll_timeout_ms, 3000);
        assert_eq!(config.client.pool_size, 8);
    }
}
