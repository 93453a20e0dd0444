//! Message envelope and header framing
//!
//! Wire layout of one frame, all integers little-endian regardless of host
//! architecture:
//!
//! ```text
//! [kind: u32][size: u32][body: exactly `size` raw bytes]
//! ```
//!
//! The body is packed like a stack: [`Envelope::append`] pushes the raw bytes
//! of a fixed-layout value onto the end, [`Envelope::consume`] pops the
//! last-appended value back off. Callers must consume fields in the exact
//! reverse of append order - the codec tracks sizes, not field identities.

use bytes::BytesMut;
use std::fmt;
use std::mem;

use crate::error::CodecError;
use crate::kind::MessageKind;
use zerocopy::{AsBytes, FromBytes};

/// Encoded size of a frame header in bytes
pub const HEADER_SIZE: usize = 8;

/// The fixed-layout header transmitted at the start of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<K> {
    /// Application-defined message kind tag
    pub kind: K,
    /// Body length in bytes
    pub size: u32,
}

impl<K: MessageKind> Header<K> {
    /// Encode the header into its 8-byte wire form
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.kind.to_wire().to_le_bytes());
        buf[4..8].copy_from_slice(&self.size.to_le_bytes());
        buf
    }

    /// Decode a header from its 8-byte wire form
    ///
    /// Fails with [`CodecError::UnknownKind`] when the kind value is outside
    /// the application's closed set.
    pub fn decode(buf: [u8; HEADER_SIZE]) -> Result<Self, CodecError> {
        let raw = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let size = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let kind = K::from_wire(raw).ok_or(CodecError::UnknownKind { raw })?;
        Ok(Self { kind, size })
    }
}

/// One wire message: a kind tag plus an opaque body
///
/// The header is derived from the current state rather than stored, so
/// `header().size` always equals the body length - the invariant holds by
/// construction at every component boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<K: MessageKind> {
    kind: K,
    body: BytesMut,
}

impl<K: MessageKind> Envelope<K> {
    /// Create an empty envelope of the given kind
    pub fn new(kind: K) -> Self {
        Self {
            kind,
            body: BytesMut::new(),
        }
    }

    /// Reassemble an envelope from a decoded kind and a received body
    pub fn from_parts(kind: K, body: BytesMut) -> Self {
        Self { kind, body }
    }

    /// The envelope's kind tag
    pub fn kind(&self) -> K {
        self.kind
    }

    /// The current header (kind + body length)
    pub fn header(&self) -> Header<K> {
        Header {
            kind: self.kind,
            size: self.body.len() as u32,
        }
    }

    /// The current header in its 8-byte wire form
    pub fn encode_header(&self) -> [u8; HEADER_SIZE] {
        self.header().encode()
    }

    /// The raw body bytes
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body length in bytes
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Header size plus body length; reported for diagnostics, never
    /// transmitted as a separate field
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }

    /// Push the raw bytes of a fixed-layout value onto the end of the body
    ///
    /// The `AsBytes` bound rejects padding-bearing or pointer-containing
    /// types at compile time, so this operation cannot fail.
    pub fn append<T: AsBytes>(&mut self, value: &T) {
        self.body.extend_from_slice(value.as_bytes());
    }

    /// Pop the last-appended value off the end of the body
    ///
    /// Fields come back in reverse append order. Fails with
    /// [`CodecError::Underflow`] when the body holds fewer bytes than
    /// `size_of::<T>()` - the caller consumed too much or out of order.
    pub fn consume<T: FromBytes>(&mut self) -> Result<T, CodecError> {
        let need = mem::size_of::<T>();
        let have = self.body.len();
        if have < need {
            return Err(CodecError::Underflow { need, have });
        }
        let at = have - need;
        let value = T::read_from(&self.body[at..]).ok_or(CodecError::Underflow { need, have })?;
        self.body.truncate(at);
        Ok(value)
    }
}

impl<K: MessageKind> fmt::Display for Envelope<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID:{:?} Size:{}", self.kind, self.body.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use zerocopy::{AsBytes, FromBytes, FromZeroes};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        Ping,
        State,
    }

    impl MessageKind for Kind {
        fn to_wire(self) -> u32 {
            match self {
                Kind::Ping => 1,
                Kind::State => 2,
            }
        }

        fn from_wire(raw: u32) -> Option<Self> {
            match raw {
                1 => Some(Kind::Ping),
                2 => Some(Kind::State),
                _ => None,
            }
        }
    }

    #[repr(C)]
    #[derive(AsBytes, FromBytes, FromZeroes, Debug, Clone, Copy, PartialEq)]
    struct Vec2 {
        x: f32,
        y: f32,
    }

    #[test]
    fn append_then_consume_is_lifo() {
        let mut env = Envelope::new(Kind::State);
        let a: u32 = 99;
        let b: u8 = 1;
        let c: f32 = 31.1;
        let d = Vec2 { x: 1.0, y: 2.0 };

        env.append(&a);
        env.append(&b);
        env.append(&c);
        env.append(&d);
        assert_eq!(env.body_len(), 4 + 1 + 4 + 8);
        assert_eq!(env.header().size, 17);

        assert_eq!(env.consume::<Vec2>().unwrap(), d);
        assert_eq!(env.consume::<f32>().unwrap(), c);
        assert_eq!(env.consume::<u8>().unwrap(), b);
        assert_eq!(env.consume::<u32>().unwrap(), a);
        assert_eq!(env.header().size, 0);
        assert_eq!(env.body_len(), 0);
    }

    #[test]
    fn total_size_tracks_header_plus_body() {
        let mut env = Envelope::new(Kind::Ping);
        assert_eq!(env.total_size(), HEADER_SIZE);

        env.append(&7u64);
        assert_eq!(env.total_size(), HEADER_SIZE + 8);

        env.consume::<u64>().unwrap();
        assert_eq!(env.total_size(), HEADER_SIZE);
    }

    #[test]
    fn consuming_past_the_body_underflows() {
        let mut env = Envelope::new(Kind::State);
        env.append(&3u16);

        let err = env.consume::<u64>().unwrap_err();
        assert_eq!(err, CodecError::Underflow { need: 8, have: 2 });

        // The failed consume left the body untouched
        assert_eq!(env.consume::<u16>().unwrap(), 3);
    }

    #[test]
    fn zero_size_body_is_valid() {
        let env = Envelope::new(Kind::Ping);
        assert_eq!(env.body_len(), 0);
        assert_eq!(env.header().size, 0);
        assert_eq!(env.encode_header(), [1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn header_encode_decode_round_trip() {
        let mut env = Envelope::new(Kind::State);
        env.append(&Vec2 { x: 0.5, y: -0.5 });

        let decoded = Header::<Kind>::decode(env.encode_header()).unwrap();
        assert_eq!(decoded.kind, Kind::State);
        assert_eq!(decoded.size, 8);
    }

    #[test]
    fn header_decode_rejects_unknown_kind() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&999u32.to_le_bytes());

        let err = Header::<Kind>::decode(buf).unwrap_err();
        assert_eq!(err, CodecError::UnknownKind { raw: 999 });
    }

    #[test]
    fn display_reports_kind_and_size() {
        let mut env = Envelope::new(Kind::Ping);
        env.append(&1u32);
        assert_eq!(env.to_string(), "ID:Ping Size:4");
    }

    proptest! {
        #[test]
        fn lifo_round_trip_for_any_sequence(values in proptest::collection::vec(any::<u64>(), 0..64)) {
            let mut env = Envelope::new(Kind::State);
            for v in &values {
                env.append(v);
            }
            prop_assert_eq!(env.body_len(), values.len() * 8);

            let mut recovered = Vec::with_capacity(values.len());
            for _ in 0..values.len() {
                recovered.push(env.consume::<u64>().unwrap());
            }
            recovered.reverse();
            prop_assert_eq!(recovered, values);
            prop_assert_eq!(env.header().size, 0);
        }
    }
}
