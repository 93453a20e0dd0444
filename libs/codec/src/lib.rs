//! Wire envelope codec
//!
//! Defines the unit that crosses the socket: a fixed 8-byte header (message
//! kind + body length) followed by an opaque, variable-length body. The codec
//! does not interpret body contents - that is entirely the consuming
//! application's concern. Payload fields are packed and unpacked with
//! fixed-layout (`zerocopy`) types so that anything with pointers or hidden
//! indirection is rejected at compile time.
//!
//! Body packing is deliberately LIFO: fields are consumed in the exact
//! reverse of the order they were appended. See [`Envelope`] for the caller
//! contract.

pub mod envelope;
pub mod error;
pub mod kind;

pub use envelope::{Envelope, Header, HEADER_SIZE};
pub use error::CodecError;
pub use kind::MessageKind;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;
