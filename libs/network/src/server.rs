//! Server endpoint
//!
//! Owns the acceptor, a pool of live connections and the shared inbound
//! queue. Application behavior is injected as a [`ServerHandler`] rather than
//! inherited: the accept loop asks it to veto new connections, pruning
//! reports disconnects to it, and [`Server::update`] feeds it received
//! messages in global arrival order.

use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::connection::{Connection, ConnectionId, OwnedMessage, FIRST_CLIENT_ID};
use crate::driver::IoDriver;
use crate::error::{NetError, Result};
use crate::queue::ConcurrentQueue;
use codec::{Envelope, MessageKind};

/// Application hooks the server invokes from its own threads
///
/// `on_client_connect` and `on_client_disconnect` run on whichever thread
/// detects the event (the I/O thread for accepts, the caller's thread for
/// pruning); `on_message` runs on the thread calling [`Server::update`].
/// None of them may block unboundedly - that stalls the endpoint.
pub trait ServerHandler<K: MessageKind>: Send + Sync + 'static {
    /// Veto point for new connections; returning `false` drops the socket
    fn on_client_connect(&self, peer_addr: SocketAddr) -> bool {
        let _ = peer_addr;
        true
    }

    /// A pooled connection was found dead and is about to be pruned
    fn on_client_disconnect(&self, client: ConnectionId) {
        let _ = client;
    }

    /// A message arrived from the given connection
    fn on_message(&self, origin: ConnectionId, message: Envelope<K>);
}

/// Server endpoint: accept loop, connection pool, broadcast and drain
pub struct Server<K: MessageKind> {
    config: ServerConfig,
    handler: Arc<dyn ServerHandler<K>>,
    inbound: Arc<ConcurrentQueue<OwnedMessage<K>>>,
    pool: Arc<Mutex<Vec<Arc<Connection<K>>>>>,
    next_id: Arc<AtomicU32>,
    io: Option<IoDriver>,
    local_addr: Option<SocketAddr>,
}

impl<K: MessageKind> Server<K> {
    /// Create a stopped server; `start` arms the acceptor
    pub fn new(config: ServerConfig, handler: Arc<dyn ServerHandler<K>>) -> Self {
        Self {
            config,
            handler,
            inbound: Arc::new(ConcurrentQueue::new()),
            pool: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU32::new(FIRST_CLIENT_ID)),
            io: None,
            local_addr: None,
        }
    }

    /// Bind the listener, start the accept loop and the I/O thread
    ///
    /// Setup failures are reported, not retried.
    pub fn start(&mut self) -> Result<()> {
        if self.io.is_some() {
            return Err(NetError::setup("server already running"));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NetError::setup_with_source("building server runtime", e))?;

        let listener = runtime
            .block_on(TcpListener::bind(self.config.bind_address))
            .map_err(|e| {
                NetError::setup_with_source(
                    format!("binding {}", self.config.bind_address),
                    e,
                )
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| NetError::setup_with_source("reading local address", e))?;

        runtime.handle().spawn(accept_loop(
            listener,
            Arc::clone(&self.handler),
            Arc::clone(&self.pool),
            Arc::clone(&self.inbound),
            Arc::clone(&self.next_id),
            self.config.clone(),
        ));

        self.io = Some(
            IoDriver::start(runtime, "net-server-io")
                .map_err(|e| NetError::setup_with_source("spawning server i/o thread", e))?,
        );
        self.local_addr = Some(local_addr);

        info!(addr = %local_addr, "server started");
        Ok(())
    }

    /// Close every connection, clear the pool and join the I/O thread;
    /// idempotent
    pub fn stop(&mut self) {
        let Some(io) = self.io.take() else {
            return;
        };
        for connection in self.pool.lock().drain(..) {
            connection.close();
        }
        io.shutdown();
        self.local_addr = None;
        info!("server stopped");
    }

    /// Address the listener actually bound, `None` while stopped
    ///
    /// Useful when binding port 0 and asking the OS for a free port.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Number of connections currently pooled (closed-but-unpruned entries
    /// included)
    pub fn client_count(&self) -> usize {
        self.pool.lock().len()
    }

    /// Send to one client by id
    ///
    /// A closed target triggers `on_client_disconnect` and is pruned; an
    /// unknown id means the connection is already gone and is ignored.
    pub fn message_client(&self, client: ConnectionId, envelope: &Envelope<K>) {
        let target = self
            .pool
            .lock()
            .iter()
            .find(|conn| conn.id() == Some(client))
            .cloned();
        match target {
            Some(conn) if conn.is_connected() => conn.send(envelope.clone()),
            Some(conn) => {
                conn.close();
                self.handler.on_client_disconnect(client);
                self.pool.lock().retain(|c| c.id() != Some(client));
            }
            None => {}
        }
    }

    /// Send to every connected client, optionally excluding one
    ///
    /// Members found dead during the pass each get one
    /// `on_client_disconnect`, then a single prune pass removes them -
    /// never pruning while iterating.
    pub fn message_all_clients(&self, envelope: &Envelope<K>, exclude: Option<ConnectionId>) {
        let members: Vec<Arc<Connection<K>>> = self.pool.lock().iter().cloned().collect();
        let mut dead: Vec<ConnectionId> = Vec::new();

        for conn in members {
            let Some(id) = conn.id() else { continue };
            if conn.is_connected() {
                if Some(id) != exclude {
                    conn.send(envelope.clone());
                }
            } else {
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            for id in &dead {
                self.handler.on_client_disconnect(*id);
            }
            self.pool
                .lock()
                .retain(|conn| !matches!(conn.id(), Some(id) if dead.contains(&id)));
        }
    }

    /// Drain up to `max_messages` received messages (`None` = until empty),
    /// dispatching each to `on_message` in global arrival order
    ///
    /// Returns the number of messages dispatched.
    pub fn update(&self, max_messages: Option<usize>) -> usize {
        let limit = max_messages.unwrap_or(usize::MAX);
        let mut drained = 0;
        while drained < limit {
            let Some(owned) = self.inbound.pop_front() else {
                break;
            };
            if let Some(origin) = owned.origin {
                self.handler.on_message(origin, owned.message);
            }
            drained += 1;
        }
        drained
    }
}

impl<K: MessageKind> Drop for Server<K> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Accept until the runtime is torn down; errors are logged, never fatal
async fn accept_loop<K: MessageKind>(
    listener: TcpListener,
    handler: Arc<dyn ServerHandler<K>>,
    pool: Arc<Mutex<Vec<Arc<Connection<K>>>>>,
    inbound: Arc<ConcurrentQueue<OwnedMessage<K>>>,
    next_id: Arc<AtomicU32>,
    config: ServerConfig,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                info!(peer = %peer_addr, "new connection");
                if config.nodelay {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(peer = %peer_addr, error = %e, "failed to set TCP_NODELAY");
                    }
                }
                if !handler.on_client_connect(peer_addr) {
                    info!(peer = %peer_addr, "connection denied");
                    continue;
                }

                let id = next_id.fetch_add(1, Ordering::Relaxed);
                let connection =
                    Arc::new(Connection::server(id, peer_addr, config.max_message_size));
                connection.spawn_pipelines(
                    &tokio::runtime::Handle::current(),
                    stream,
                    Arc::clone(&inbound),
                );
                pool.lock().push(connection);
                info!(id, peer = %peer_addr, "connection approved");
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        Ping,
    }

    impl MessageKind for Kind {
        fn to_wire(self) -> u32 {
            0
        }

        fn from_wire(raw: u32) -> Option<Self> {
            (raw == 0).then_some(Kind::Ping)
        }
    }

    struct NullHandler;

    impl ServerHandler<Kind> for NullHandler {
        fn on_message(&self, _origin: ConnectionId, _message: Envelope<Kind>) {}
    }

    #[test]
    fn stopped_server_has_no_address_or_clients() {
        let server = Server::new(ServerConfig::on_port(0), Arc::new(NullHandler));
        assert_eq!(server.local_addr(), None);
        assert_eq!(server.client_count(), 0);
    }

    #[test]
    fn stop_before_start_is_a_noop() {
        let mut server = Server::new(ServerConfig::on_port(0), Arc::new(NullHandler));
        server.stop();
        server.stop();
    }

    #[test]
    fn messaging_an_unknown_id_is_ignored() {
        let server = Server::new(ServerConfig::on_port(0), Arc::new(NullHandler));
        server.message_client(12345, &Envelope::new(Kind::Ping));
        assert_eq!(server.client_count(), 0);
    }

    #[test]
    fn update_on_empty_queue_drains_nothing() {
        let server = Server::new(ServerConfig::on_port(0), Arc::new(NullHandler));
        assert_eq!(server.update(None), 0);
        assert_eq!(server.update(Some(16)), 0);
    }
}
