//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use pipeline_http::config::ServerConfig;
use pipeline_http::http::{frame_response, FrameOutcome, Response};
use pipeline_http::server::{ServerEventLoop, StaticContent};

static ROOT_COUNTER: AtomicU32 = AtomicU32::new(0);

/// A unique, freshly-created temporary content root.
pub fn temp_root(tag: &str) -> PathBuf {
    let n = ROOT_COUNTER.fetch_add(1, Ordering::Relaxed);
    let root = std::env::temp_dir().join(format!(
        "pipeline-http-it-{tag}-{}-{n}",
        std::process::id()
    ));
    std::fs::create_dir_all(&root).expect("create temp root");
    root
}

/// Start a server engine on an ephemeral port; returns its address.
pub async fn spawn_engine(root: &Path, config: ServerConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let content = StaticContent::new(root).expect("content root");
    let engine = ServerEventLoop::new(config, content);
    tokio::spawn(async move {
        let _ = engine.run(listener).await;
    });
    addr
}

/// A fast server config suitable for tests.
pub fn test_config(max_connections: usize) -> ServerConfig {
    ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        max_connections,
        poll_timeout_ms: 100,
        idle_timeout_secs: 60,
    }
}

/// Reads framed responses off one connection, preserving pipelined
/// leftovers between calls.
pub struct ResponseReader {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl ResponseReader {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            buf: Vec::new(),
        }
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Next complete response, waiting up to five seconds.
    pub async fn next(&mut self) -> Response {
        loop {
            match frame_response(&self.buf) {
                FrameOutcome::Complete { message, consumed } => {
                    self.buf.drain(..consumed);
                    return message;
                }
                FrameOutcome::Partial => {}
                FrameOutcome::Malformed { .. } => panic!("malformed response from server"),
            }
            let mut chunk = [0u8; 4096];
            let n = timeout(Duration::from_secs(5), self.stream.read(&mut chunk))
                .await
                .expect("timed out waiting for response")
                .expect("read");
            assert!(n > 0, "eof before a complete response");
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Assert the server closed this connection.
    pub async fn expect_eof(&mut self) {
        let mut chunk = [0u8; 64];
        let n = timeout(Duration::from_secs(5), self.stream.read(&mut chunk))
            .await
            .expect("timed out waiting for eof")
            .expect("read");
        assert_eq!(n, 0, "expected the server to close the connection");
    }
}

/// Read from a raw socket until `count` header terminators have arrived;
/// returns everything read. Used by scripted test servers.
pub async fn read_requests(stream: &mut TcpStream, count: usize) -> Vec<u8> {
    const TERMINATOR: &[u8] = b"\r\n\r\n";
    let mut buf = Vec::new();
    loop {
        let terminators = buf.windows(4).filter(|w| *w == TERMINATOR).count();
        if terminators >= count {
            return buf;
        }
        let mut chunk = [0u8; 4096];
        let n = timeout(Duration::from_secs(5), stream.read(&mut chunk))
            .await
            .expect("timed out waiting for requests")
            .expect("read");
        assert!(n > 0, "client closed before sending expected requests");
        buf.extend_from_slice(&chunk[..n]);
    }
}
