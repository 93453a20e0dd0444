//! Symmetric client/server message transport
//!
//! A reusable transport layer for applications that exchange a closed set of
//! typed messages over TCP. Both roles are built from the same primitives:
//! a framed [`Connection`] that drives one socket's read and write pipelines,
//! a mutex-guarded [`ConcurrentQueue`] that hands completed messages across
//! the I/O/application thread boundary, and an endpoint ([`Client`] or
//! [`Server`]) that owns a dedicated I/O thread.
//!
//! The framework moves envelopes; it never interprets their bodies. Received
//! messages surface tagged with the [`ConnectionId`] of the connection that
//! produced them (absent on a client, which has exactly one peer).
//!
//! Not provided, by design: encryption, authentication, compression,
//! request/response correlation, delivery guarantees, automatic reconnection.

pub mod client;
pub mod config;
pub mod connection;
mod driver;
pub mod error;
pub mod queue;
pub mod server;

pub use client::Client;
pub use config::{ClientConfig, ServerConfig};
pub use connection::{Connection, ConnectionId, OwnedMessage, FIRST_CLIENT_ID};
pub use error::{NetError, Result};
pub use queue::ConcurrentQueue;
pub use server::{Server, ServerHandler};

// Re-export the codec surface so applications depend on one crate
pub use codec::{CodecError, Envelope, Header, MessageKind, HEADER_SIZE};

/// Default cap on a single frame's body, applied on both send and receive
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024; // 16MB
