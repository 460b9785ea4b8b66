//! Client engine: bounded connection pool, resource scheduler, manifest
//! extraction, and the fetch event loop.
//!
//! # Responsibilities
//! - Fetch a well-known dependency manifest and every resource it names
//! - Pipeline requests over at most K connections, least-loaded first
//! - Never request the same resource path twice
//! - Demultiplex responses by per-connection FIFO order

pub mod fetch;
pub mod manifest;
pub mod pool;
pub mod scheduler;

pub use fetch::{FetchEngine, FetchReport};
pub use manifest::dependencies;
pub use pool::{ConnId, ConnectionPool, PooledConn};
pub use scheduler::{ResourceScheduler, ResourceSet, ScheduleOutcome};
