//! Server connection slots and the fixed-capacity connection table.

use std::net::SocketAddr;
use std::time::Instant;

use bytes::BytesMut;
use tokio::net::TcpStream;

/// Index of a slot in the connection table. Valid only while the slot is
/// occupied; a released slot may be handed to an unrelated new connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub usize);

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// Per-connection request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Waiting for (more of) a request's header block. Initial state, and
    /// the state a kept-alive connection returns to.
    AwaitingHeaders,
    /// A full request has been framed and handed to the content builder.
    CompleteParsed,
    /// The response bytes have been written back.
    ResponseSent,
    /// Terminal; the slot is about to be released.
    Closed,
}

/// One live server-side connection.
#[derive(Debug)]
pub struct ServerConn {
    pub id: SlotId,
    pub stream: TcpStream,
    pub peer: SocketAddr,
    /// Unconsumed received bytes. The framer peeks at this; the cursor only
    /// advances on a Complete or Malformed verdict.
    pub buf: BytesMut,
    pub state: ConnState,
    pub last_activity: Instant,
}

impl ServerConn {
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Fixed-capacity registry of live connections.
///
/// Slot release drops the whole `ServerConn`, so buffer, state, and
/// timestamps reset together before the slot can be reused.
#[derive(Debug)]
pub struct ConnectionTable {
    slots: Vec<Option<ServerConn>>,
    live: usize,
}

impl ConnectionTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            live: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn is_full(&self) -> bool {
        self.live == self.slots.len()
    }

    /// Place a new connection in the first free slot. `None` when the table
    /// is at capacity; the caller admission-rejects in that case.
    pub fn insert(&mut self, stream: TcpStream, peer: SocketAddr) -> Option<SlotId> {
        let free = self.slots.iter().position(Option::is_none)?;
        let id = SlotId(free);
        self.slots[free] = Some(ServerConn {
            id,
            stream,
            peer,
            buf: BytesMut::with_capacity(4096),
            state: ConnState::AwaitingHeaders,
            last_activity: Instant::now(),
        });
        self.live += 1;
        Some(id)
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut ServerConn> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Release a slot, dropping the connection and all its bookkeeping.
    pub fn release(&mut self, id: SlotId) -> bool {
        match self.slots.get_mut(id.0).and_then(Option::take) {
            Some(_) => {
                self.live -= 1;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServerConn> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Slots whose connections have been idle longer than the given cutoff.
    pub fn idle_since(&self, cutoff: std::time::Duration) -> Vec<SlotId> {
        self.iter()
            .filter(|conn| conn.last_activity.elapsed() > cutoff)
            .map(|conn| conn.id)
            .collect()
    }
}
