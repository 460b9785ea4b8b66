//! Request model and serialization.

use bytes::{Bytes, BytesMut};

use super::{Headers, HTTP_VERSION};

/// Methods accepted by the engine. Anything else is a malformed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
}

impl Method {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(Method::Get),
            "HEAD" => Some(Method::Head),
            "POST" => Some(Method::Post),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed HTTP request.
///
/// Produced by the framer on the server side and built directly on the
/// client side; lives for exactly one request cycle.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Request target as it appeared on the wire (absolute path).
    pub target: String,
    /// Protocol version token, always [`HTTP_VERSION`] once validated.
    pub version: String,
    pub headers: Headers,
    pub body: Bytes,
    /// Byte length of the header block including the blank-line terminator.
    /// The read cursor advances by this plus the body length.
    pub header_len: usize,
}

impl Request {
    /// Build a GET request for `target` against `host`.
    pub fn get(target: &str, host: &str) -> Self {
        let mut headers = Headers::new();
        headers.push("Host", host);
        headers.push("Connection", "keep-alive");
        Self {
            method: Method::Get,
            target: target.to_string(),
            version: HTTP_VERSION.to_string(),
            headers,
            body: Bytes::new(),
            header_len: 0,
        }
    }

    /// Value of the `Host` header, if present.
    pub fn host(&self) -> Option<&str> {
        self.headers.get("Host")
    }

    /// Serialize to wire form. Total for any well-formed request.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(128 + self.body.len());
        out.extend_from_slice(self.method.as_str().as_bytes());
        out.extend_from_slice(b" ");
        out.extend_from_slice(self.target.as_bytes());
        out.extend_from_slice(b" ");
        out.extend_from_slice(self.version.as_bytes());
        out.extend_from_slice(b"\r\n");
        for (name, value) in self.headers.iter() {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out.freeze()
    }
}
