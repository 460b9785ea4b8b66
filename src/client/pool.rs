//! Bounded pool of outbound pipelined connections.

use std::collections::VecDeque;
use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::net::TcpStream;

use crate::error::Error;

/// Index of a pool slot. Valid only while the slot is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub usize);

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One outbound connection and its in-order pipeline.
///
/// The pipeline queue head always owns the next response to arrive on this
/// connection; HTTP/1.1 guarantees per-connection response order.
#[derive(Debug)]
pub struct PooledConn {
    pub id: ConnId,
    pub stream: TcpStream,
    /// Unconsumed received bytes.
    pub buf: BytesMut,
    /// Resource paths with a request sent but no response received yet,
    /// oldest first.
    pub pipeline: VecDeque<String>,
}

impl PooledConn {
    pub fn in_flight(&self) -> usize {
        self.pipeline.len()
    }
}

/// At most `capacity` connections to one server address.
#[derive(Debug)]
pub struct ConnectionPool {
    slots: Vec<Option<PooledConn>>,
    target: SocketAddr,
}

impl ConnectionPool {
    pub fn new(target: SocketAddr, capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            target,
        }
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_spare_capacity(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    /// Open a new connection in the first free slot.
    pub async fn open(&mut self) -> Result<ConnId, Error> {
        let Some(free) = self.slots.iter().position(Option::is_none) else {
            // Callers check capacity first; treat this as a connect failure.
            return Err(Error::Connect {
                addr: self.target,
                source: std::io::Error::other("connection pool at capacity"),
            });
        };
        let stream = TcpStream::connect(self.target)
            .await
            .map_err(|source| Error::Connect {
                addr: self.target,
                source,
            })?;
        let id = ConnId(free);
        self.slots[free] = Some(PooledConn {
            id,
            stream,
            buf: BytesMut::with_capacity(4096),
            pipeline: VecDeque::new(),
        });
        tracing::debug!(id = %id, target = %self.target, "Opened pooled connection");
        Ok(id)
    }

    /// The open connection with the fewest in-flight requests, ties broken
    /// by lowest slot index. `None` when the pool is empty.
    pub fn least_loaded(&self) -> Option<(ConnId, usize)> {
        self.iter()
            .map(|conn| (conn.id, conn.in_flight()))
            .min_by_key(|&(id, load)| (load, id.0))
    }

    pub fn get_mut(&mut self, id: ConnId) -> Option<&mut PooledConn> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Remove a connection, returning it so the caller can account for any
    /// resources still in its pipeline. The freed slot resets completely.
    pub fn close(&mut self, id: ConnId) -> Option<PooledConn> {
        self.slots.get_mut(id.0).and_then(Option::take)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PooledConn> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Total requests awaiting responses across the pool.
    pub fn total_in_flight(&self) -> usize {
        self.iter().map(PooledConn::in_flight).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[tokio::test]
    async fn least_loaded_prefers_lowest_pipeline_then_lowest_slot() {
        let (_listener, addr) = listener().await;
        let mut pool = ConnectionPool::new(addr, 3);
        let a = pool.open().await.unwrap();
        let b = pool.open().await.unwrap();

        assert_eq!(pool.least_loaded(), Some((a, 0)));
        pool.get_mut(a).unwrap().pipeline.push_back("/x".into());
        assert_eq!(pool.least_loaded(), Some((b, 0)));
        pool.get_mut(b).unwrap().pipeline.push_back("/y".into());
        pool.get_mut(b).unwrap().pipeline.push_back("/z".into());
        assert_eq!(pool.least_loaded(), Some((a, 1)));
        assert_eq!(pool.total_in_flight(), 3);
    }

    #[tokio::test]
    async fn closed_slot_is_reused_fresh() {
        let (_listener, addr) = listener().await;
        let mut pool = ConnectionPool::new(addr, 1);
        let id = pool.open().await.unwrap();
        pool.get_mut(id).unwrap().pipeline.push_back("/stale".into());

        let closed = pool.close(id).unwrap();
        assert_eq!(closed.pipeline.len(), 1);
        assert!(pool.is_empty());
        assert!(pool.has_spare_capacity());

        let id = pool.open().await.unwrap();
        assert_eq!(pool.get_mut(id).unwrap().in_flight(), 0);
    }

    #[tokio::test]
    async fn connect_failure_is_surfaced() {
        let (listener, addr) = listener().await;
        drop(listener);
        let mut pool = ConnectionPool::new(addr, 1);
        assert!(matches!(pool.open().await, Err(Error::Connect { .. })));
    }
}
