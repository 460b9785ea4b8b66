//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the logging subsystem for the binaries
//! - Keep log level configurable via the environment

pub mod logging;

pub use logging::init_tracing;
