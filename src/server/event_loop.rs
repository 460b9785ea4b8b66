//! Single-task readiness loop multiplexing all server connections.
//!
//! # Responsibilities
//! - Wait (with a bounded timeout) for accept readiness, per-connection read
//!   readiness, or a housekeeping tick
//! - Admission-reject new connections with a 503 once the table is full
//! - Frame requests out of each connection's buffer and answer them in order
//! - Enforce keep-alive vs. close and evict idle connections
//!
//! One task owns the table, every buffer, and every state machine; there is
//! nothing to lock.

use std::io;
use std::net::SocketAddr;

use bytes::Buf;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time;

use crate::config::ServerConfig;
use crate::error::Error;
use crate::http::{frame_request, FrameOutcome, Response};
use crate::server::conn::{ConnState, ConnectionTable, SlotId};
use crate::server::content::ResponseBuilder;

/// What one readiness wait resolved to.
enum Wake {
    Accept(io::Result<(TcpStream, SocketAddr)>),
    Readable(SlotId),
    Tick,
}

/// Outcome of draining available bytes from one connection.
enum ReadStatus {
    Drained,
    PeerClosed,
    Failed,
}

/// The server engine. Owns the connection table and the content builder.
pub struct ServerEventLoop<B> {
    table: ConnectionTable,
    builder: B,
    config: ServerConfig,
}

impl<B: ResponseBuilder> ServerEventLoop<B> {
    pub fn new(config: ServerConfig, builder: B) -> Self {
        Self {
            table: ConnectionTable::new(config.max_connections),
            builder,
            config,
        }
    }

    /// Run the engine on an already-bound listener. Runs until the task is
    /// dropped; per-connection failures never bring the loop down.
    pub async fn run(mut self, listener: TcpListener) -> Result<(), Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            capacity = self.table.capacity(),
            "Server event loop starting"
        );
        loop {
            self.turn(&listener).await;
        }
    }

    /// One readiness wait plus the handling it triggers.
    async fn turn(&mut self, listener: &TcpListener) {
        let wake = {
            let mut readable: FuturesUnordered<_> = self
                .table
                .iter()
                .map(|conn| async move {
                    // Readiness only; errors surface on the read itself.
                    let _ = conn.stream.readable().await;
                    conn.id
                })
                .collect();
            tokio::select! {
                res = listener.accept() => Wake::Accept(res),
                Some(id) = readable.next() => Wake::Readable(id),
                _ = time::sleep(self.config.poll_timeout()) => Wake::Tick,
            }
        };

        match wake {
            Wake::Accept(Ok((stream, peer))) => self.admit(stream, peer).await,
            Wake::Accept(Err(err)) => {
                tracing::warn!(error = %err, "Accept failed");
            }
            Wake::Readable(id) => self.handle_readable(id).await,
            Wake::Tick => self.evict_idle(),
        }
    }

    /// Admission control: a connection gets a slot or an immediate 503.
    async fn admit(&mut self, mut stream: TcpStream, peer: SocketAddr) {
        if self.table.is_full() {
            tracing::warn!(
                peer = %peer,
                capacity = self.table.capacity(),
                "Connection table full, rejecting with 503"
            );
            let rejection = Response::service_unavailable().to_bytes();
            if let Err(err) = stream.write_all(&rejection).await {
                tracing::debug!(peer = %peer, error = %err, "Failed to deliver 503");
            }
            // Socket drops here; no slot was consumed.
            return;
        }
        if let Some(id) = self.table.insert(stream, peer) {
            tracing::debug!(peer = %peer, id = %id, live = self.table.len(), "Connection accepted");
        }
    }

    async fn handle_readable(&mut self, id: SlotId) {
        let status = {
            let Some(conn) = self.table.get_mut(id) else {
                return;
            };
            loop {
                conn.buf.reserve(4096);
                match conn.stream.try_read_buf(&mut conn.buf) {
                    Ok(0) => break ReadStatus::PeerClosed,
                    Ok(_) => conn.touch(),
                    Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                        break ReadStatus::Drained
                    }
                    Err(err) => {
                        tracing::warn!(id = %id, error = %err, "Read failed, closing");
                        break ReadStatus::Failed;
                    }
                }
            }
        };

        match status {
            ReadStatus::PeerClosed => {
                // Orderly EOF: release the slot without generating a response.
                tracing::debug!(id = %id, "Peer closed connection");
                self.table.release(id);
            }
            ReadStatus::Failed => {
                self.table.release(id);
            }
            ReadStatus::Drained => self.process_buffered(id).await,
        }
    }

    /// Frame and answer every complete request currently buffered, in order.
    async fn process_buffered(&mut self, id: SlotId) {
        loop {
            let verdict = match self.table.get_mut(id) {
                Some(conn) => frame_request(&conn.buf),
                None => return,
            };
            match verdict {
                FrameOutcome::Partial => return,
                FrameOutcome::Malformed { consumed } => {
                    // Framing cannot be trusted past a malformed header
                    // block, so a 400 always closes the connection.
                    tracing::warn!(id = %id, "Malformed request, answering 400 and closing");
                    let wire = Response::bad_request().to_bytes();
                    if let Some(conn) = self.table.get_mut(id) {
                        conn.buf.advance(consumed.min(conn.buf.len()));
                        conn.state = ConnState::Closed;
                        if let Err(err) = conn.stream.write_all(&wire).await {
                            tracing::debug!(id = %id, error = %err, "Failed to deliver 400");
                        }
                    }
                    self.table.release(id);
                    return;
                }
                FrameOutcome::Complete { message, consumed } => {
                    let response = self.builder.build(&message);
                    let close_after = message.headers.wants_close();
                    tracing::debug!(
                        id = %id,
                        method = %message.method,
                        target = %message.target,
                        status = response.status,
                        "Request served"
                    );
                    let wire = response.to_bytes();
                    let Some(conn) = self.table.get_mut(id) else {
                        return;
                    };
                    conn.buf.advance(consumed);
                    conn.state = ConnState::CompleteParsed;
                    conn.touch();
                    if let Err(err) = conn.stream.write_all(&wire).await {
                        tracing::warn!(id = %id, error = %err, "Write failed, closing");
                        self.table.release(id);
                        return;
                    }
                    conn.state = ConnState::ResponseSent;
                    if close_after {
                        tracing::debug!(id = %id, "Connection: close honored");
                        conn.state = ConnState::Closed;
                        self.table.release(id);
                        return;
                    }
                    conn.state = ConnState::AwaitingHeaders;
                    // Keep draining: pipelined requests already buffered are
                    // answered before the next readiness wait.
                }
            }
        }
    }

    fn evict_idle(&mut self) {
        for id in self.table.idle_since(self.config.idle_timeout()) {
            tracing::debug!(id = %id, "Evicting idle connection");
            self.table.release(id);
        }
    }
}
