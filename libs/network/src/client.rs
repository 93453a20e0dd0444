//! Client endpoint
//!
//! Owns one connection to a remote server plus the I/O thread that drives
//! it. Received messages land on the endpoint's inbound queue, which the
//! application drains at its own pace through [`Client::incoming`].

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::connection::{Connection, OwnedMessage};
use crate::driver::IoDriver;
use crate::error::{NetError, Result};
use crate::queue::ConcurrentQueue;
use codec::{Envelope, MessageKind};

/// Client endpoint: connect, send, drain, disconnect
pub struct Client<K: MessageKind> {
    config: ClientConfig,
    inbound: Arc<ConcurrentQueue<OwnedMessage<K>>>,
    connection: Option<Arc<Connection<K>>>,
    io: Option<IoDriver>,
}

impl<K: MessageKind> Client<K> {
    /// Create a disconnected client with default configuration
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a disconnected client with explicit configuration
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            inbound: Arc::new(ConcurrentQueue::new()),
            connection: None,
            io: None,
        }
    }

    /// Resolve `host:port`, connect within the configured timeout and start
    /// the I/O thread
    ///
    /// Resolution may yield several addresses; they are tried in order and
    /// the last error is reported if none accepts. Failures are returned to
    /// the caller, never retried internally.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        // A stale previous session is torn down first
        self.disconnect();

        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| NetError::setup_with_source(format!("resolving {host}:{port}"), e))?
            .collect();
        if addrs.is_empty() {
            return Err(NetError::setup(format!("{host}:{port} resolved to no addresses")));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NetError::setup_with_source("building client runtime", e))?;

        let connect_timeout = self.config.connect_timeout;
        let stream = runtime
            .block_on(async {
                tokio::time::timeout(connect_timeout, connect_any(&addrs)).await
            })
            .map_err(|_| NetError::timeout("connect", connect_timeout.as_millis() as u64))?
            .map_err(|e| NetError::setup_with_source(format!("connecting to {host}:{port}"), e))?;

        if self.config.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                warn!(error = %e, "failed to set TCP_NODELAY");
            }
        }
        let peer_addr = stream
            .peer_addr()
            .map_err(|e| NetError::setup_with_source("reading peer address", e))?;

        let connection = Arc::new(Connection::client(peer_addr, self.config.max_message_size));
        connection.spawn_pipelines(runtime.handle(), stream, Arc::clone(&self.inbound));

        self.io = Some(
            IoDriver::start(runtime, "net-client-io")
                .map_err(|e| NetError::setup_with_source("spawning client i/o thread", e))?,
        );
        self.connection = Some(connection);

        info!(peer = %peer_addr, "connected to server");
        Ok(())
    }

    /// Close the connection and stop the I/O thread; idempotent
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            info!(peer = %connection.peer_addr(), "disconnected");
        }
        if let Some(io) = self.io.take() {
            io.shutdown();
        }
    }

    /// True while the connection's socket is open
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map_or(false, |conn| conn.is_connected())
    }

    /// Queue an envelope for transmission to the server
    pub fn send(&self, envelope: Envelope<K>) -> Result<()> {
        match &self.connection {
            Some(conn) if conn.is_connected() => {
                conn.send(envelope);
                Ok(())
            }
            _ => Err(NetError::NotConnected),
        }
    }

    /// The inbound queue of received messages, for poll-and-pop draining
    pub fn incoming(&self) -> &ConcurrentQueue<OwnedMessage<K>> {
        &self.inbound
    }

    /// Address of the connected server, `None` while disconnected
    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.connection.as_ref().map(|conn| conn.peer_addr())
    }

    /// Total frame bytes written over the current connection
    pub fn bytes_sent(&self) -> u64 {
        self.connection.as_ref().map_or(0, |conn| conn.bytes_sent())
    }

    /// Total frame bytes read over the current connection
    pub fn bytes_received(&self) -> u64 {
        self.connection
            .as_ref()
            .map_or(0, |conn| conn.bytes_received())
    }
}

impl<K: MessageKind> Default for Client<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: MessageKind> Drop for Client<K> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Try each resolved address in order, reporting the last failure
async fn connect_any(addrs: &[SocketAddr]) -> std::io::Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "no addresses to try")
    }))
}
