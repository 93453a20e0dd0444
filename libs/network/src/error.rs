//! Transport error types
//!
//! Setup failures are reported to the caller and never retried. I/O failures
//! are always fatal to the connection they occur on: the pipeline logs,
//! closes the socket and stops - detection and pruning is the owning
//! endpoint's job.

use codec::CodecError;
use thiserror::Error;

/// Main transport error type
#[derive(Debug, Error)]
pub enum NetError {
    /// Endpoint setup failures: address resolution, bind, initial connect
    #[error("setup error: {message}")]
    Setup {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Read/write failures on a live connection
    #[error("i/o error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// An operation exceeded its configured deadline
    #[error("timeout: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// A received header declared a body larger than the configured cap
    #[error("frame of {size} bytes exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Envelope encoding/decoding failures
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The endpoint has no live connection
    #[error("not connected")]
    NotConnected,
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, NetError>;

impl NetError {
    /// Create a setup error
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
            source: None,
        }
    }

    /// Create a setup error carrying the underlying I/O error
    pub fn setup_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Setup {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// True when this is the peer closing its end cleanly rather than a fault
    pub(crate) fn is_peer_closed(&self) -> bool {
        matches!(
            self,
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::UnexpectedEof
        )
    }
}
