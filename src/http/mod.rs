//! HTTP/1.1 message model and framing.
//!
//! # Responsibilities
//! - Typed request/response messages with ordered headers
//! - Case-insensitive header lookup without mutating stored bytes
//! - Incremental framing of messages out of partially-arrived byte streams
//! - Wire serialization

pub mod framer;
pub mod request;
pub mod response;

pub use framer::{frame_request, frame_response, FrameOutcome};
pub use request::{Method, Request};
pub use response::Response;

/// The only protocol version this engine speaks.
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// Header block terminator.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// An ordered list of header name/value pairs.
///
/// Order is preserved as parsed; lookup is case-insensitive and works on a
/// shared reference, so a stored message is never rewritten to answer a
/// header query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// First value whose name matches `name` case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Declared body length, if a `Content-Length` header is present and
    /// parses as an integer.
    pub fn content_length(&self) -> Option<Result<usize, std::num::ParseIntError>> {
        self.get("Content-Length").map(|v| v.trim().parse())
    }

    /// Whether the `Connection` header asks for the connection to be closed
    /// after this message. Only the trailing comma-separated token counts,
    /// matched in any letter casing.
    pub fn wants_close(&self) -> bool {
        self.get("Connection")
            .and_then(|v| v.rsplit(',').next())
            .map(|token| token.trim().eq_ignore_ascii_case("close"))
            .unwrap_or(false)
    }
}
