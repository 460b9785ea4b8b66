//! Client fetch loop: pipelined response demultiplexing and manifest fan-out.
//!
//! # Responsibilities
//! - Wait (with a bounded timeout) for read readiness across the pool
//! - Frame responses and bind each to its connection's pipeline head
//! - Feed manifest bodies back into the scheduler until the dependency
//!   graph is exhausted
//! - Terminate once the resource set stops growing and every pipeline is
//!   empty

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;

use bytes::{Buf, Bytes};
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::time;

use crate::client::pool::ConnId;
use crate::client::scheduler::ResourceScheduler;
use crate::client::manifest;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::http::{frame_response, FrameOutcome};

/// A stalled fetch is abandoned after this many consecutive empty
/// readiness waits.
const MAX_IDLE_TICKS: u32 = 5;

/// What one fetch run produced.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Fetched bodies by canonical resource path, the manifest included.
    pub resources: HashMap<String, Bytes>,
    /// Paths whose request or response was lost with a connection.
    pub failed: Vec<String>,
}

enum ReadStatus {
    Drained,
    PeerClosed,
    Failed,
}

/// The client engine. Owns the scheduler (and through it the pool).
pub struct FetchEngine {
    scheduler: ResourceScheduler,
    manifest_path: String,
    config: ClientConfig,
}

impl FetchEngine {
    pub fn new(config: ClientConfig, target: SocketAddr) -> Self {
        // Keyed the same way the scheduler canonicalizes paths, so the
        // manifest's own response is recognized when it is demuxed.
        let manifest_path = if config.manifest_path.starts_with('/') {
            config.manifest_path.clone()
        } else {
            format!("/{}", config.manifest_path)
        };
        Self {
            scheduler: ResourceScheduler::new(target, config.pool_size),
            manifest_path,
            config,
        }
    }

    /// Fetch the manifest and everything it transitively names.
    ///
    /// Only a failure to schedule the manifest itself is fatal; any later
    /// per-resource failure lands in the report instead.
    pub async fn run(mut self) -> Result<FetchReport, Error> {
        let mut report = FetchReport::default();
        let manifest_path = self.manifest_path.clone();
        self.scheduler.request(&manifest_path).await?;

        let mut idle_ticks = 0u32;
        while self.scheduler.pool().total_in_flight() > 0 {
            match self.wait_readable().await {
                Some(id) => {
                    idle_ticks = 0;
                    self.handle_readable(id, &mut report).await;
                }
                None => {
                    idle_ticks += 1;
                    tracing::debug!(idle_ticks, "No readiness within the poll timeout");
                    if idle_ticks >= MAX_IDLE_TICKS {
                        tracing::error!(
                            in_flight = self.scheduler.pool().total_in_flight(),
                            "Fetch stalled, abandoning in-flight resources"
                        );
                        self.fail_all(&mut report);
                    }
                }
            }
        }

        tracing::info!(
            fetched = report.resources.len(),
            failed = report.failed.len(),
            discovered = self.scheduler.resources().len(),
            "Fetch complete"
        );
        Ok(report)
    }

    /// Bounded readiness wait over every pooled connection.
    async fn wait_readable(&self) -> Option<ConnId> {
        let mut readable: FuturesUnordered<_> = self
            .scheduler
            .pool()
            .iter()
            .map(|conn| async move {
                let _ = conn.stream.readable().await;
                conn.id
            })
            .collect();
        tokio::select! {
            Some(id) = readable.next() => Some(id),
            _ = time::sleep(self.config.poll_timeout()) => None,
        }
    }

    async fn handle_readable(&mut self, id: ConnId, report: &mut FetchReport) {
        let status = {
            let Some(conn) = self.scheduler.pool_mut().get_mut(id) else {
                return;
            };
            loop {
                conn.buf.reserve(4096);
                match conn.stream.try_read_buf(&mut conn.buf) {
                    Ok(0) => break ReadStatus::PeerClosed,
                    Ok(_) => {}
                    Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                        break ReadStatus::Drained
                    }
                    Err(err) => {
                        tracing::warn!(conn = %id, error = %err, "Read failed");
                        break ReadStatus::Failed;
                    }
                }
            }
        };

        match status {
            ReadStatus::PeerClosed | ReadStatus::Failed => {
                tracing::debug!(conn = %id, "Connection lost");
                self.fail_connection(id, report);
            }
            ReadStatus::Drained => self.process_buffered(id, report).await,
        }
    }

    /// Demux every complete response currently buffered on one connection.
    ///
    /// Within one connection, response N is fully consumed and bound to the
    /// pipeline head before response N+1's bytes are interpreted.
    async fn process_buffered(&mut self, id: ConnId, report: &mut FetchReport) {
        loop {
            let verdict = match self.scheduler.pool_mut().get_mut(id) {
                Some(conn) => frame_response(&conn.buf),
                None => return,
            };
            match verdict {
                FrameOutcome::Partial => return,
                FrameOutcome::Malformed { .. } => {
                    tracing::warn!(conn = %id, "Malformed response, dropping connection");
                    self.fail_connection(id, report);
                    return;
                }
                FrameOutcome::Complete { message, consumed } => {
                    let owner = {
                        let Some(conn) = self.scheduler.pool_mut().get_mut(id) else {
                            return;
                        };
                        conn.buf.advance(consumed);
                        conn.pipeline.pop_front()
                    };
                    let Some(owner) = owner else {
                        // A response nothing asked for: the peer broke
                        // in-order delivery. Nothing can be attributed
                        // safely on this connection anymore.
                        tracing::warn!(conn = %id, "Unowned response, dropping connection");
                        self.fail_connection(id, report);
                        return;
                    };
                    tracing::debug!(
                        conn = %id,
                        path = %owner,
                        status = message.status,
                        "Response bound to resource"
                    );
                    if owner == self.manifest_path {
                        self.fan_out(&message.body, report).await;
                    }
                    report.resources.insert(owner, message.body);
                }
            }
        }
    }

    /// Schedule every path a manifest body names.
    async fn fan_out(&mut self, body: &Bytes, report: &mut FetchReport) {
        let text = String::from_utf8_lossy(body);
        let paths: Vec<String> = manifest::dependencies(&text).map(str::to_string).collect();
        tracing::info!(count = paths.len(), "Manifest fan-out");
        for path in paths {
            match self.scheduler.request(&path).await {
                Ok(_) => {}
                Err(Error::Schedule {
                    path,
                    orphaned,
                    source,
                }) => {
                    tracing::warn!(path = %path, error = %source, "Failed to schedule dependency");
                    // The send failure may have cost a connection; resources
                    // stranded on it fail alongside the new path.
                    report.failed.push(path);
                    report.failed.extend(orphaned);
                }
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "Failed to schedule dependency");
                    report.failed.push(path);
                }
            }
        }
    }

    /// Drop a connection and account for everything still in its pipeline.
    fn fail_connection(&mut self, id: ConnId, report: &mut FetchReport) {
        if let Some(conn) = self.scheduler.pool_mut().close(id) {
            report.failed.extend(conn.pipeline);
        }
    }

    fn fail_all(&mut self, report: &mut FetchReport) {
        let ids: Vec<ConnId> = self.scheduler.pool().iter().map(|conn| conn.id).collect();
        for id in ids {
            self.fail_connection(id, report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn fan_out_fails_resources_stranded_by_a_send_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = ClientConfig {
            pool_size: 1,
            manifest_path: "/dependency.csv".to_string(),
            poll_timeout_ms: 100,
        };
        let mut engine = FetchEngine::new(config, addr);
        engine.scheduler.request("/early.txt").await.unwrap();

        // Shut the only connection's write half so scheduling the manifest's
        // dependency fails and costs the connection.
        let id = engine.scheduler.pool().iter().next().unwrap().id;
        engine
            .scheduler
            .pool_mut()
            .get_mut(id)
            .unwrap()
            .stream
            .shutdown()
            .await
            .unwrap();

        let mut report = FetchReport::default();
        let body = Bytes::from_static(b"top\r\nlate.txt\r\n");
        engine.fan_out(&body, &mut report).await;

        // Both the new path and the one already in flight are accounted for.
        assert!(report.failed.contains(&"/late.txt".to_string()));
        assert!(report.failed.contains(&"/early.txt".to_string()));
        assert_eq!(engine.scheduler.pool().total_in_flight(), 0);
    }
}
