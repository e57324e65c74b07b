//! Server acknowledgments
//!
//! The collection server answers login, location, alarm and heartbeat frames
//! with an empty-payload frame echoing the protocol number and serial. A
//! terminal only needs the protocol number at index 3 to know what was
//! acknowledged.

use crate::types::{Frame, MessageKind, SerialNumber};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub kind: MessageKind,
    pub serial: SerialNumber,
}

impl Ack {
    /// Acknowledgment carried by a decoded server response
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            kind: frame.kind,
            serial: frame.serial,
        }
    }

    /// Reply a collection server sends for `frame`
    pub fn for_frame(frame: &Frame) -> Frame {
        Frame::new(frame.kind).with_serial(frame.serial)
    }

    pub fn acknowledges(&self, kind: MessageKind) -> bool {
        self.kind == kind
    }
}

/// Whether the collection server answers this kind
pub fn requires_ack(kind: MessageKind) -> bool {
    !matches!(kind, MessageKind::Other(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{decode_frame, encode_frame};

    #[test]
    fn test_login_ack_bytes() {
        let login = Frame::new(MessageKind::Login)
            .with_payload(vec![0; 12])
            .with_serial(1);
        let reply = encode_frame(&Ack::for_frame(&login)).unwrap();
        assert_eq!(
            &reply[..],
            &[0x78, 0x78, 0x05, 0x01, 0x00, 0x01, 0xD9, 0xDC, 0x0D, 0x0A]
        );
    }

    #[test]
    fn test_from_frame() {
        let reply = encode_frame(&Frame::new(MessageKind::Heartbeat).with_serial(42)).unwrap();
        let ack = Ack::from_frame(&decode_frame(&reply).unwrap());
        // the protocol number sits at index 3 of the response
        assert_eq!(ack.kind, MessageKind::from_u8(reply[3]));
        assert_eq!(ack.serial, 42);
        assert!(ack.acknowledges(MessageKind::Heartbeat));
        assert!(!ack.acknowledges(MessageKind::Login));
    }

    #[test]
    fn test_requires_ack() {
        assert!(requires_ack(MessageKind::Login));
        assert!(requires_ack(MessageKind::AlarmReport));
        assert!(!requires_ack(MessageKind::Other(0x8A)));
    }
}
