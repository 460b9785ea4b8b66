//! Minimal pipelined HTTP/1.1 engine.
//!
//! Two roles share one protocol core:
//!
//! - a **server** that multiplexes many client connections on a single
//!   control task, with admission control past a fixed table capacity and
//!   keep-alive lifecycle handling;
//! - a **client** that discovers a graph of dependent resources from a
//!   manifest and fetches them over a bounded pool of pipelined connections,
//!   demultiplexing responses by per-connection FIFO order.
//!
//! ```text
//!   server:  listener ──▶ connection table ──▶ framer ──▶ content ──▶ wire
//!   client:  scheduler ──▶ wire ──▶ framer ──▶ manifest ──▶ scheduler …
//! ```
//!
//! Everything is owned by the event-loop task that drives it; there is no
//! shared mutable state and no locking.

// Core subsystems
pub mod config;
pub mod http;
pub mod server;

// Client subsystems
pub mod client;

// Cross-cutting concerns
pub mod error;
pub mod observability;

pub use client::FetchEngine;
pub use config::EngineConfig;
pub use error::Error;
pub use server::ServerEventLoop;

/// Default port used by both binaries when the address does not name one.
pub const DEFAULT_PORT: u16 = 20080;
