//! Incremental message framing.
//!
//! # Responsibilities
//! - Decide whether accumulated connection bytes hold a complete message
//! - Parse the message and report how many bytes it occupied
//! - Stay non-destructive on partial input: the caller advances its read
//!   cursor only on a `Complete` or `Malformed` verdict
//!
//! Completeness is judged before validity. A request using an unsupported
//! method or version is reported `Malformed` only once its header block has
//! fully arrived; before that it is indistinguishable from a slow peer and
//! must stay `Partial`.

use bytes::Bytes;

use super::{Headers, Method, Request, Response, HEADER_TERMINATOR, HTTP_VERSION};

/// Verdict of one framing attempt over a connection's unconsumed bytes.
#[derive(Debug)]
pub enum FrameOutcome<T> {
    /// A full message was parsed; the caller may advance by `consumed`.
    Complete { message: T, consumed: usize },
    /// Not enough bytes yet. Nothing may be consumed; re-evaluate on the
    /// next readiness signal.
    Partial,
    /// The header block is complete but violates the protocol. The caller
    /// advances by `consumed` (the header block) before disposing of the
    /// connection.
    Malformed { consumed: usize },
}

/// Offset one past the `\r\n\r\n` terminator, if present.
fn header_block_len(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .map(|pos| pos + HEADER_TERMINATOR.len())
}

/// Split a complete header block into its start line and header pairs.
/// `None` means the block is syntactically broken.
fn parse_header_block(block: &[u8]) -> Option<(String, Headers)> {
    let text = std::str::from_utf8(block).ok()?;
    let mut lines = text.split("\r\n");
    let start_line = lines.next()?.to_string();
    let mut headers = Headers::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':')?;
        if name.is_empty() {
            return None;
        }
        headers.push(name.trim(), value.trim());
    }
    Some((start_line, headers))
}

/// Frame a request out of `buf`.
pub fn frame_request(buf: &[u8]) -> FrameOutcome<Request> {
    let Some(header_len) = header_block_len(buf) else {
        return FrameOutcome::Partial;
    };
    let malformed = FrameOutcome::Malformed { consumed: header_len };

    let Some((start_line, headers)) = parse_header_block(&buf[..header_len]) else {
        return malformed;
    };
    let mut tokens = start_line.split_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return malformed;
    };
    if version != HTTP_VERSION {
        return malformed;
    }
    let Some(method) = Method::parse(method) else {
        return malformed;
    };

    let content_length = match headers.content_length() {
        Some(Ok(n)) => n,
        Some(Err(_)) => return malformed,
        None => 0,
    };
    // A declared length that overflows the buffer arithmetic can never be
    // satisfied; treat it like any other unusable header.
    let Some(total) = header_len.checked_add(content_length) else {
        return malformed;
    };
    if buf.len() < total {
        return FrameOutcome::Partial;
    }

    FrameOutcome::Complete {
        message: Request {
            method,
            target: target.to_string(),
            version: version.to_string(),
            headers,
            body: Bytes::copy_from_slice(&buf[header_len..total]),
            header_len,
        },
        consumed: total,
    }
}

/// Frame a response out of `buf`. Same completeness rules as requests; the
/// start line is a status line instead.
pub fn frame_response(buf: &[u8]) -> FrameOutcome<Response> {
    let Some(header_len) = header_block_len(buf) else {
        return FrameOutcome::Partial;
    };
    let malformed = FrameOutcome::Malformed { consumed: header_len };

    let Some((start_line, headers)) = parse_header_block(&buf[..header_len]) else {
        return malformed;
    };
    let mut tokens = start_line.splitn(3, ' ');
    let (Some(version), Some(status), reason) = (tokens.next(), tokens.next(), tokens.next())
    else {
        return malformed;
    };
    if version != HTTP_VERSION {
        return malformed;
    }
    let Ok(status) = status.parse::<u16>() else {
        return malformed;
    };

    let content_length = match headers.content_length() {
        Some(Ok(n)) => n,
        Some(Err(_)) => return malformed,
        None => 0,
    };
    let Some(total) = header_len.checked_add(content_length) else {
        return malformed;
    };
    if buf.len() < total {
        return FrameOutcome::Partial;
    }

    FrameOutcome::Complete {
        message: Response {
            status,
            reason: reason.unwrap_or("").to_string(),
            headers,
            body: Bytes::copy_from_slice(&buf[header_len..total]),
            header_len,
        },
        consumed: total,
    }
}
