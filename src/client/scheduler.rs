//! Resource scheduling over the connection pool.
//!
//! # Responsibilities
//! - Deduplicate resource paths: a path is transmitted at most once, ever
//! - Place each request on the connection with the smallest pipeline, or a
//!   new connection while every open one is busy and capacity remains
//! - Append the scheduled path to the carrying connection's pipeline tail

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;

use crate::client::pool::{ConnId, ConnectionPool};
use crate::error::Error;
use crate::http::Request;

/// What `request` did for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A request went out on the wire.
    Scheduled,
    /// The path was already requested; no wire traffic.
    Deduplicated,
}

/// Canonical resource path → monotonic discovery index.
#[derive(Debug, Default)]
pub struct ResourceSet {
    index: HashMap<String, usize>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Register a path, returning its discovery index. A second insert of
    /// the same path returns the original index.
    pub fn insert(&mut self, path: &str) -> usize {
        let next = self.index.len();
        *self.index.entry(path.to_string()).or_insert(next)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Chooses connections and sends resource requests.
pub struct ResourceScheduler {
    pool: ConnectionPool,
    set: ResourceSet,
    /// Host header value for outgoing requests.
    host: String,
}

impl ResourceScheduler {
    pub fn new(target: SocketAddr, pool_capacity: usize) -> Self {
        Self {
            pool: ConnectionPool::new(target, pool_capacity),
            set: ResourceSet::new(),
            host: target.to_string(),
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ConnectionPool {
        &mut self.pool
    }

    pub fn resources(&self) -> &ResourceSet {
        &self.set
    }

    /// Request one resource, at most once ever.
    ///
    /// Connection choice: the open connection with the smallest pipeline if
    /// that pipeline is empty; a new connection while every open one has
    /// in-flight work and the pool has spare capacity; otherwise the
    /// least-loaded existing connection (saturation mode).
    ///
    /// On failure the path stays registered: the attempt is consumed, never
    /// retried automatically.
    pub async fn request(&mut self, path: &str) -> Result<ScheduleOutcome, Error> {
        let path = canonical(path);
        if self.set.contains(&path) {
            tracing::debug!(path = %path, "Deduplicated resource request");
            return Ok(ScheduleOutcome::Deduplicated);
        }
        self.set.insert(&path);

        let conn_id = self.choose_connection().await?;
        let wire = Request::get(&path, &self.host).to_bytes();
        let Some(conn) = self.pool.get_mut(conn_id) else {
            return Err(Error::Schedule {
                path,
                orphaned: Vec::new(),
                source: std::io::Error::other("chosen connection vanished"),
            });
        };
        if let Err(source) = conn.stream.write_all(&wire).await {
            // The connection is unusable; drop it so its slot can recover,
            // surfacing whatever its pipeline still carried.
            let orphaned = self
                .pool
                .close(conn_id)
                .map(|conn| Vec::from(conn.pipeline))
                .unwrap_or_default();
            return Err(Error::Schedule {
                path,
                orphaned,
                source,
            });
        }
        conn.pipeline.push_back(path.clone());
        tracing::debug!(
            path = %path,
            conn = %conn_id,
            in_flight = conn.in_flight(),
            discovered = self.set.len(),
            "Scheduled resource request"
        );
        Ok(ScheduleOutcome::Scheduled)
    }

    async fn choose_connection(&mut self) -> Result<ConnId, Error> {
        match self.pool.least_loaded() {
            // An idle connection wins outright.
            Some((id, 0)) => Ok(id),
            // Every open connection is busy: grow the pool if we may.
            Some((id, _)) => {
                if self.pool.has_spare_capacity() {
                    self.pool.open().await
                } else {
                    Ok(id)
                }
            }
            // Empty pool: the first request opens the first connection.
            None => self.pool.open().await,
        }
    }
}

/// Resource paths are keyed with a leading slash so manifest tokens and
/// request targets dedup against each other.
fn canonical(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn scheduler(pool_capacity: usize) -> (TcpListener, ResourceScheduler) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, ResourceScheduler::new(addr, pool_capacity))
    }

    #[tokio::test]
    async fn second_request_for_a_path_is_deduplicated() {
        let (_listener, mut scheduler) = scheduler(2).await;
        assert_eq!(
            scheduler.request("/x").await.unwrap(),
            ScheduleOutcome::Scheduled
        );
        assert_eq!(
            scheduler.request("/x").await.unwrap(),
            ScheduleOutcome::Deduplicated
        );
        // Exactly one request is in flight anywhere in the pool.
        assert_eq!(scheduler.pool().total_in_flight(), 1);
        assert_eq!(scheduler.resources().len(), 1);
    }

    #[tokio::test]
    async fn manifest_token_and_target_form_dedup_together() {
        let (_listener, mut scheduler) = scheduler(2).await;
        scheduler.request("a.txt").await.unwrap();
        assert_eq!(
            scheduler.request("/a.txt").await.unwrap(),
            ScheduleOutcome::Deduplicated
        );
    }

    #[tokio::test]
    async fn saturated_pool_opens_two_then_queues_on_least_loaded() {
        let (_listener, mut scheduler) = scheduler(2).await;
        scheduler.request("/r1").await.unwrap();
        scheduler.request("/r2").await.unwrap();
        scheduler.request("/r3").await.unwrap();

        // K = 2: two connections opened, the third request queued behind
        // whichever had the shorter pipeline.
        assert_eq!(scheduler.pool().len(), 2);
        let mut loads: Vec<_> = scheduler.pool().iter().map(|c| c.in_flight()).collect();
        loads.sort_unstable();
        assert_eq!(loads, vec![1, 2]);
        assert_eq!(scheduler.pool().total_in_flight(), 3);
    }

    #[tokio::test]
    async fn idle_connection_is_preferred_over_opening() {
        let (_listener, mut scheduler) = scheduler(4).await;
        scheduler.request("/r1").await.unwrap();
        // Simulate r1's response having been demuxed.
        let id = scheduler.pool().iter().next().unwrap().id;
        scheduler
            .pool_mut()
            .get_mut(id)
            .unwrap()
            .pipeline
            .pop_front();

        scheduler.request("/r2").await.unwrap();
        assert_eq!(scheduler.pool().len(), 1, "idle connection should carry r2");
    }

    #[tokio::test]
    async fn send_failure_surfaces_the_stranded_pipeline() {
        let (_listener, mut scheduler) = scheduler(1).await;
        scheduler.request("/kept.txt").await.unwrap();

        // Shut the write half so the next send fails deterministically.
        let id = scheduler.pool().iter().next().unwrap().id;
        scheduler
            .pool_mut()
            .get_mut(id)
            .unwrap()
            .stream
            .shutdown()
            .await
            .unwrap();

        match scheduler.request("/next.txt").await {
            Err(Error::Schedule { path, orphaned, .. }) => {
                assert_eq!(path, "/next.txt");
                assert_eq!(orphaned, vec!["/kept.txt".to_string()]);
            }
            other => panic!("expected Schedule error, got {other:?}"),
        }
        // The dead connection's slot is free again.
        assert!(scheduler.pool().is_empty());
    }

    #[tokio::test]
    async fn failed_attempt_stays_registered() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let mut scheduler = ResourceScheduler::new(addr, 1);

        assert!(scheduler.request("/gone").await.is_err());
        // The attempt is consumed: no silent retry on the next call.
        assert_eq!(
            scheduler.request("/gone").await.unwrap(),
            ScheduleOutcome::Deduplicated
        );
    }
}
