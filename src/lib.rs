//! # gt06 - GT06 tracker protocol
//!
//! Frame builder, CRC-ITU checksum and TCP transport for the GT06 (Concox)
//! GPS tracker protocol.
//!
//! ## Quick Start
//!
//! ```rust
//! use gt06::{DeviceIdentity, FrameBuilder, Login, TimeZone, LANGUAGE_ENGLISH};
//!
//! let login = Login::new(
//!     DeviceIdentity::parse("123456789123456")?,
//!     0x0242,
//!     TimeZone::from_hours(8)?,
//!     LANGUAGE_ENGLISH,
//! );
//!
//! let frame = FrameBuilder::new().login(&login, 1)?;
//! assert_eq!(&frame[..4], &[0x78, 0x78, 0x11, 0x01]);
//!
//! let decoded = gt06::decode_frame(&frame)?;
//! assert_eq!(gt06::Message::decode(&decoded)?, gt06::Message::Login(login));
//! # Ok::<(), gt06::Gt06Error>(())
//! ```
//!
//! ## Protocol Overview
//!
//! - START (2B): `0x78 0x78`
//! - LEN (1B): bytes from TYPE through CRC inclusive
//! - TYPE (1B): protocol number
//! - PAYLOAD: fixed layout per protocol number
//! - SERIAL (2B BE): information serial number
//! - CRC (2B BE): CRC-ITU over LEN through SERIAL
//! - STOP (2B): `0x0D 0x0A`
//!
//! ## Message Types
//!
//! | Type | Name      | Direction         | Payload |
//! |------|-----------|-------------------|---------|
//! | 0x01 | LOGIN     | Terminal → Server | 12 B    |
//! | 0x13 | HEARTBEAT | Terminal → Server | 7 B     |
//! | 0x22 | LOCATION  | Terminal → Server | 33 B    |
//! | 0x26 | ALARM     | Terminal → Server | 36 B    |
//!
//! The server acknowledges each of them with an empty-payload frame echoing
//! the protocol number and serial.

pub mod ack;
pub mod builder;
pub mod codec;
pub mod config;
pub mod crc;
pub mod frame;
pub mod message;
pub mod tcp;
pub mod types;

// Re-export main types for convenience
pub use types::{
    Frame, Gt06Error, MessageKind, SerialNumber, SessionId, START_MARKER, TERMINATOR,
};

pub use ack::Ack;
pub use builder::{build_frame, FrameBuilder, FrameObserver, TracingObserver};
pub use codec::Gt06FrameCodec;
pub use config::ClientConfig;
pub use frame::{decode_frame, encode_frame, skip_corrupt, try_decode_frame};
pub use message::{
    pack_course_status, AlarmReport, CellInfo, Coordinate, CourseFlags, DateTime, DeviceIdentity,
    GpsInfo, Heartbeat, LocationReport, Login, Message, TerminalInfo, TimeZone, Voltage,
    LANGUAGE_CHINESE, LANGUAGE_ENGLISH,
};
