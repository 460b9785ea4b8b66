//! Server engine: connection table, event loop, and content collaborator.
//!
//! # Responsibilities
//! - Multiplex many client connections on one owning task
//! - Enforce admission control at the connection-table capacity
//! - Frame requests out of partially-arrived bytes and answer them
//! - Enforce keep-alive vs. close lifecycle per connection

pub mod conn;
pub mod content;
pub mod event_loop;

pub use conn::{ConnState, ConnectionTable, ServerConn, SlotId};
pub use content::{ResponseBuilder, StaticContent};
pub use event_loop::ServerEventLoop;
