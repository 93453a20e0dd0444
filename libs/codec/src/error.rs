//! Codec error types
//!
//! Failures here are caller-contract violations or malformed wire data, never
//! transient conditions - nothing in this module is retryable.

use thiserror::Error;

/// Errors produced while packing, unpacking or decoding envelopes
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// More bytes were requested from the body than it currently holds.
    /// The caller either consumed out of order or consumed more fields
    /// than were appended.
    #[error("body underflow: tried to consume {need} bytes, body holds {have}")]
    Underflow { need: usize, have: usize },

    /// The raw kind value in a received header is not part of the
    /// application's closed message-kind set.
    #[error("unknown message kind {raw:#010x}")]
    UnknownKind { raw: u32 },
}
