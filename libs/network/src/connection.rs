//! Framed connection and its read/write pipelines
//!
//! A [`Connection`] owns one live TCP socket and runs two tasks on its
//! endpoint's I/O runtime: a read loop that reassembles frames (header, then
//! body when the header declares one) and pushes them onto the owner's shared
//! inbound queue, and a write loop that drains the connection's private
//! outbound queue in strict enqueue order, never interleaving mid-frame.
//!
//! Any read or write failure is fatal to the connection: the failure is
//! logged with the connection id, the closed flag flips and both loops exit.
//! The pipeline never retries; the owning endpoint notices the closed
//! connection later and prunes it.

use bytes::BytesMut;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Notify};
use tracing::{debug, trace, warn};

use crate::error::NetError;
use crate::queue::ConcurrentQueue;
use codec::{Envelope, Header, MessageKind, HEADER_SIZE};

/// Stable identifier assigned to server-owned connections
pub type ConnectionId = u32;

/// First id handed out by a server; ids count up from here per accept
pub const FIRST_CLIENT_ID: ConnectionId = 10_000;

/// Which endpoint owns this end of the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Server-owned, carrying the id the server assigned at accept time
    Server(ConnectionId),
    /// Client-owned; the client has exactly one peer, so no id is needed
    Client,
}

/// A received envelope tagged with the connection that produced it
///
/// `origin` is the stable connection id rather than a live reference, so a
/// message can outlive the pool entry it came from; lookups that find nothing
/// mean the connection is already gone.
#[derive(Debug, Clone)]
pub struct OwnedMessage<K: MessageKind> {
    /// Producing connection on a server, `None` on a client
    pub origin: Option<ConnectionId>,
    /// The reassembled wire message
    pub message: Envelope<K>,
}

impl<K: MessageKind> fmt::Display for OwnedMessage<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.message, f)
    }
}

/// One live socket plus the state its pipelines share
pub struct Connection<K: MessageKind> {
    role: Role,
    peer_addr: SocketAddr,
    max_message_size: usize,
    /// Private outbound buffer; only `send` pushes, only the write loop pops
    outbound: ConcurrentQueue<Envelope<K>>,
    /// Wakes the write loop when `send` finds it parked on an empty queue
    outbound_ready: Notify,
    /// Level-triggered close signal both loops select on
    close_tx: watch::Sender<bool>,
    closed: AtomicBool,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl<K: MessageKind> Connection<K> {
    pub(crate) fn server(id: ConnectionId, peer_addr: SocketAddr, max_message_size: usize) -> Self {
        Self::with_role(Role::Server(id), peer_addr, max_message_size)
    }

    pub(crate) fn client(peer_addr: SocketAddr, max_message_size: usize) -> Self {
        Self::with_role(Role::Client, peer_addr, max_message_size)
    }

    fn with_role(role: Role, peer_addr: SocketAddr, max_message_size: usize) -> Self {
        let (close_tx, _) = watch::channel(false);
        Self {
            role,
            peer_addr,
            max_message_size,
            outbound: ConcurrentQueue::new(),
            outbound_ready: Notify::new(),
            close_tx,
            closed: AtomicBool::new(false),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    /// The id the server assigned at accept time, `None` on a client-owned
    /// connection
    pub fn id(&self) -> Option<ConnectionId> {
        match self.role {
            Role::Server(id) => Some(id),
            Role::Client => None,
        }
    }

    /// Address of the remote peer
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// True until a pipeline failure or an explicit close
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Total frame bytes written to the socket
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Total frame bytes read from the socket
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Queue an envelope for transmission
    ///
    /// Messages go out in strict enqueue order. Once the connection is
    /// closed the envelope is dropped; a failed connection's unsent backlog
    /// is lost by design.
    pub fn send(&self, envelope: Envelope<K>) {
        if !self.is_connected() {
            debug!(id = ?self.id(), peer = %self.peer_addr, "dropping send on closed connection");
            return;
        }
        self.outbound.push_back(envelope);
        self.outbound_ready.notify_one();
    }

    /// Close the connection; idempotent
    ///
    /// Both pipeline tasks observe the signal and exit, abandoning whatever
    /// operation was in flight.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(id = ?self.id(), peer = %self.peer_addr, "connection closed");
            self.close_tx.send_replace(true);
            self.outbound_ready.notify_one();
        }
    }

    /// Split the socket and start the read and write loops on the endpoint's
    /// I/O runtime
    pub(crate) fn spawn_pipelines(
        self: &Arc<Self>,
        handle: &tokio::runtime::Handle,
        stream: TcpStream,
        inbound: Arc<ConcurrentQueue<OwnedMessage<K>>>,
    ) {
        let (read_half, write_half) = stream.into_split();
        handle.spawn(read_loop(Arc::clone(self), read_half, inbound));
        handle.spawn(write_loop(Arc::clone(self), write_half));
    }
}

/// Reassemble frames until failure, close or peer shutdown
async fn read_loop<K: MessageKind>(
    conn: Arc<Connection<K>>,
    mut reader: OwnedReadHalf,
    inbound: Arc<ConcurrentQueue<OwnedMessage<K>>>,
) {
    let mut close_rx = conn.close_tx.subscribe();
    loop {
        if *close_rx.borrow() {
            break;
        }
        let frame = tokio::select! {
            _ = close_rx.changed() => break,
            frame = read_frame(&mut reader, conn.max_message_size) => frame,
        };
        match frame {
            Ok(envelope) => {
                conn.bytes_received
                    .fetch_add(envelope.total_size() as u64, Ordering::Relaxed);
                trace!(
                    id = ?conn.id(),
                    kind = ?envelope.kind(),
                    size = envelope.body_len(),
                    "received frame"
                );
                inbound.push_back(OwnedMessage {
                    origin: conn.id(),
                    message: envelope,
                });
            }
            Err(err) if err.is_peer_closed() => {
                debug!(id = ?conn.id(), peer = %conn.peer_addr, "peer closed connection");
                break;
            }
            Err(err) => {
                warn!(id = ?conn.id(), peer = %conn.peer_addr, error = %err, "read failed");
                break;
            }
        }
    }
    conn.close();
}

/// Read exactly one frame: the 8-byte header, then the body it declares
async fn read_frame<K: MessageKind>(
    reader: &mut OwnedReadHalf,
    max_message_size: usize,
) -> Result<Envelope<K>, NetError> {
    let mut head = [0u8; HEADER_SIZE];
    reader
        .read_exact(&mut head)
        .await
        .map_err(|e| NetError::io("read header", e))?;

    let header = Header::<K>::decode(head)?;
    let size = header.size as usize;
    if size > max_message_size {
        return Err(NetError::FrameTooLarge {
            size,
            max: max_message_size,
        });
    }

    // A zero-size header skips the body phase entirely
    let mut body = BytesMut::zeroed(size);
    if size > 0 {
        reader
            .read_exact(&mut body[..])
            .await
            .map_err(|e| NetError::io("read body", e))?;
    }
    Ok(Envelope::from_parts(header.kind, body))
}

/// Drain the outbound queue until failure or close, parking when empty
async fn write_loop<K: MessageKind>(conn: Arc<Connection<K>>, mut writer: OwnedWriteHalf) {
    let mut close_rx = conn.close_tx.subscribe();
    loop {
        if *close_rx.borrow() {
            break;
        }
        let Some(envelope) = conn.outbound.pop_front() else {
            tokio::select! {
                _ = close_rx.changed() => break,
                _ = conn.outbound_ready.notified() => {}
            }
            continue;
        };
        match write_frame(&mut writer, &envelope).await {
            Ok(()) => {
                conn.bytes_sent
                    .fetch_add(envelope.total_size() as u64, Ordering::Relaxed);
                trace!(
                    id = ?conn.id(),
                    kind = ?envelope.kind(),
                    size = envelope.body_len(),
                    "sent frame"
                );
            }
            Err(err) => {
                warn!(id = ?conn.id(), peer = %conn.peer_addr, error = %err, "write failed");
                break;
            }
        }
    }
    conn.close();
}

/// Write one frame: header, then body when non-empty
async fn write_frame<K: MessageKind>(
    writer: &mut OwnedWriteHalf,
    envelope: &Envelope<K>,
) -> Result<(), NetError> {
    writer
        .write_all(&envelope.encode_header())
        .await
        .map_err(|e| NetError::io("write header", e))?;
    if envelope.body_len() > 0 {
        writer
            .write_all(envelope.body())
            .await
            .map_err(|e| NetError::io("write body", e))?;
    }
    writer
        .flush()
        .await
        .map_err(|e| NetError::io("flush", e))
}
