//! Core types for the GT06 protocol

use thiserror::Error;

/// Start marker opening every frame
pub const START_MARKER: [u8; 2] = [0x78, 0x78];

/// Terminator closing every frame
pub const TERMINATOR: [u8; 2] = [0x0D, 0x0A];

/// Largest value the single-byte length field can carry
pub const MAX_PACKET_LENGTH: usize = u8::MAX as usize;

/// Bytes counted by the length field besides the payload:
/// kind (1) + serial (2) + checksum (2)
pub const LENGTH_OVERHEAD: usize = 5;

/// Framing bytes around the payload: start (2) + length (1) + kind (1) +
/// serial (2) + checksum (2) + terminator (2)
pub const FRAME_OVERHEAD: usize = 10;

/// Information serial number carried by every frame
pub type SerialNumber = u16;

/// Connection identifier assigned by the collection server
pub type SessionId = u64;

/// Protocol number selecting the payload schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Login,
    Heartbeat,
    LocationReport,
    AlarmReport,
    /// Any protocol number without a typed payload
    Other(u8),
}

impl MessageKind {
    pub fn as_u8(self) -> u8 {
        match self {
            MessageKind::Login => 0x01,
            MessageKind::Heartbeat => 0x13,
            MessageKind::LocationReport => 0x22,
            MessageKind::AlarmReport => 0x26,
            MessageKind::Other(byte) => byte,
        }
    }

    pub fn from_u8(byte: u8) -> Self {
        match byte {
            0x01 => MessageKind::Login,
            0x13 => MessageKind::Heartbeat,
            0x22 => MessageKind::LocationReport,
            0x26 => MessageKind::AlarmReport,
            other => MessageKind::Other(other),
        }
    }
}

impl From<u8> for MessageKind {
    fn from(byte: u8) -> Self {
        MessageKind::from_u8(byte)
    }
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> Self {
        kind.as_u8()
    }
}

/// A single protocol frame before encoding / after decoding.
///
/// The length byte and checksum are derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: MessageKind,
    pub payload: Vec<u8>,
    pub serial: SerialNumber,
}

impl Frame {
    /// Create an empty frame of the given kind with serial 0
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            payload: Vec::new(),
            serial: 0,
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_serial(mut self, serial: SerialNumber) -> Self {
        self.serial = serial;
        self
    }

    /// Value of the on-wire length byte: kind through checksum inclusive.
    pub fn packet_length(&self) -> Result<u8, Gt06Error> {
        let length = self.payload.len() + LENGTH_OVERHEAD;
        u8::try_from(length).map_err(|_| Gt06Error::FrameTooLarge {
            length,
            max: MAX_PACKET_LENGTH,
        })
    }

    /// Total number of bytes the encoded frame occupies
    pub fn encoded_len(&self) -> usize {
        self.payload.len() + FRAME_OVERHEAD
    }
}

/// Errors raised by encoding, decoding and transport
#[derive(Debug, Error)]
pub enum Gt06Error {
    #[error("invalid device identity {0:?}: expected a decimal integer")]
    InvalidIdentity(String),

    #[error("field `{field}` value {value} outside {min}..={max}")]
    FieldOutOfRange {
        field: &'static str,
        value: String,
        min: i64,
        max: i64,
    },

    #[error("packet length {length} exceeds maximum {max}")]
    FrameTooLarge { length: usize, max: usize },

    #[error("checksum mismatch: frame carries 0x{expected:04X}, computed 0x{computed:04X}")]
    ChecksumMismatch { expected: u16, computed: u16 },

    #[error("invalid start marker {0:02X?}")]
    InvalidStartMarker([u8; 2]),

    #[error("invalid terminator {0:02X?}")]
    InvalidTerminator([u8; 2]),

    #[error("invalid packet length {0}")]
    InvalidLength(u8),

    #[error("{kind:?} payload is {actual} bytes, expected {expected}")]
    PayloadLength {
        kind: MessageKind,
        expected: usize,
        actual: usize,
    },

    #[error("unexpected message kind 0x{0:02X}")]
    UnexpectedKind(u8),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("login rejected: response acknowledged {got:?}")]
    LoginRejected { got: MessageKind },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timed out waiting for response")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Gt06Error {
    pub(crate) fn out_of_range(
        field: &'static str,
        value: impl ToString,
        min: i64,
        max: i64,
    ) -> Self {
        Gt06Error::FieldOutOfRange {
            field,
            value: value.to_string(),
            min,
            max,
        }
    }

    /// Raised while turning typed fields into bytes
    pub fn is_encoding(&self) -> bool {
        matches!(
            self,
            Gt06Error::InvalidIdentity(_)
                | Gt06Error::FieldOutOfRange { .. }
                | Gt06Error::FrameTooLarge { .. }
        )
    }

    /// Raised by the connection rather than by the protocol
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Gt06Error::Io(_) | Gt06Error::ConnectionClosed | Gt06Error::Timeout
        )
    }
}
