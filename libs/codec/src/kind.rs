//! Application-defined message kinds
//!
//! The framework never interprets payloads; the only thing it needs from the
//! application is a closed set of kind tags that fit in the header's 32-bit
//! kind field.

use std::fmt;

/// The closed set of message kinds an application exchanges.
///
/// Implemented on a plain `enum` by the consuming application. `to_wire` and
/// `from_wire` define the mapping to the 32-bit value carried in the header;
/// `from_wire` returns `None` for values outside the set, which fails header
/// decoding on the receive path and closes the connection.
///
/// ```
/// use codec::MessageKind;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum GameMessage {
///     Ping,
///     FireBullet,
///     MovePlayer,
/// }
///
/// impl MessageKind for GameMessage {
///     fn to_wire(self) -> u32 {
///         match self {
///             GameMessage::Ping => 0,
///             GameMessage::FireBullet => 1,
///             GameMessage::MovePlayer => 2,
///         }
///     }
///
///     fn from_wire(raw: u32) -> Option<Self> {
///         match raw {
///             0 => Some(GameMessage::Ping),
///             1 => Some(GameMessage::FireBullet),
///             2 => Some(GameMessage::MovePlayer),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait MessageKind: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Map this kind to its 32-bit wire representation
    fn to_wire(self) -> u32;

    /// Map a 32-bit wire value back into the closed set, `None` if outside it
    fn from_wire(raw: u32) -> Option<Self>;
}
