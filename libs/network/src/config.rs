//! Endpoint configuration

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::DEFAULT_MAX_MESSAGE_SIZE;

/// Client endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Deadline for the initial TCP connect
    pub connect_timeout: Duration,
    /// Maximum accepted frame body size, applied on send and receive
    pub max_message_size: usize,
    /// Set TCP_NODELAY on the socket
    pub nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            nodelay: true,
        }
    }
}

/// Server endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Local address the acceptor binds to
    pub bind_address: SocketAddr,
    /// Maximum accepted frame body size, applied on send and receive
    pub max_message_size: usize,
    /// Set TCP_NODELAY on accepted sockets
    pub nodelay: bool,
}

impl ServerConfig {
    /// Listen on all interfaces at the given port
    pub fn on_port(port: u16) -> Self {
        Self {
            bind_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            nodelay: true,
        }
    }
}
