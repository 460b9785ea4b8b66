//! Engine error taxonomy.
//!
//! # Responsibilities
//! - One error type shared by the server and client engines
//! - Distinguish terminal-for-a-connection failures from per-request ones
//!
//! Partial parses are framer verdicts, not errors; malformed requests,
//! admission rejection, and orderly peer EOF are handled inside the event
//! loops (400 / 503 / silent slot release) and never surface here.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the engine. Nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum Error {
    /// A read or write syscall failed; the affected connection is dropped.
    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),

    /// A new pooled connection could not be established. Only the resource
    /// that triggered the connect is affected.
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// One resource request could not be sent. The path stays registered in
    /// the resource set; the attempt is consumed, not retried. When the
    /// failure cost a connection, `orphaned` lists the paths still awaiting
    /// responses on it so the caller can account for them.
    #[error("could not schedule request for {path}: {source}")]
    Schedule {
        path: String,
        orphaned: Vec<String>,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The server's content root does not exist or is not a directory.
    #[error("content root {0:?} is not a directory")]
    ContentRoot(PathBuf),
}
