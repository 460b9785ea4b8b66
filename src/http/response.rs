//! Response model and serialization.

use bytes::{Bytes, BytesMut};

use super::{Headers, HTTP_VERSION};

/// A parsed or constructed HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
    pub body: Bytes,
    /// Byte length of the header block including the terminator.
    pub header_len: usize,
}

impl Response {
    /// A response with a body. `Content-Length` is always set so peers can
    /// frame the message.
    pub fn with_body(status: u16, reason: &str, content_type: &str, body: Bytes) -> Self {
        let mut headers = Headers::new();
        headers.push("Content-Type", content_type);
        headers.push("Content-Length", body.len().to_string());
        Self {
            status,
            reason: reason.to_string(),
            headers,
            body,
            header_len: 0,
        }
    }

    /// A bodyless response carrying an explicit `Content-Length`, as sent
    /// for HEAD requests.
    pub fn head_only(status: u16, reason: &str, content_type: &str, length: usize) -> Self {
        let mut headers = Headers::new();
        headers.push("Content-Type", content_type);
        headers.push("Content-Length", length.to_string());
        Self {
            status,
            reason: reason.to_string(),
            headers,
            body: Bytes::new(),
            header_len: 0,
        }
    }

    pub fn ok(content_type: &str, body: Bytes) -> Self {
        Self::with_body(200, "OK", content_type, body)
    }

    pub fn not_found() -> Self {
        Self::with_body(404, "Not Found", "text/plain", Bytes::from_static(b"Not Found"))
    }

    /// Sent for protocol violations; always closes the connection.
    pub fn bad_request() -> Self {
        let mut response = Self::with_body(400, "Bad Request", "text/plain", Bytes::new());
        response.headers.push("Connection", "close");
        response
    }

    /// Admission-control rejection; the socket is dropped after the write.
    pub fn service_unavailable() -> Self {
        let mut response = Self::with_body(503, "Service Unavailable", "text/plain", Bytes::new());
        response.headers.push("Connection", "close");
        response
    }

    /// Serialize to wire form.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(128 + self.body.len());
        out.extend_from_slice(HTTP_VERSION.as_bytes());
        out.extend_from_slice(b" ");
        out.extend_from_slice(self.status.to_string().as_bytes());
        out.extend_from_slice(b" ");
        out.extend_from_slice(self.reason.as_bytes());
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
