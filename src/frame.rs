//! Frame encoding and decoding
//!
//! ```text
//! offset  size  field
//! 0       2     start marker 0x78 0x78
//! 2       1     length = kind + payload + serial + checksum
//! 3       1     message kind
//! 4       N     payload
//! 4+N     2     serial number
//! 6+N     2     checksum over bytes 2..6+N
//! 8+N     2     terminator 0x0D 0x0A
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::crc::checksum;
use crate::types::{
    Frame, Gt06Error, MessageKind, FRAME_OVERHEAD, LENGTH_OVERHEAD, START_MARKER, TERMINATOR,
};

/// Offset of the length byte; the checksummed region starts here.
const LENGTH_OFFSET: usize = 2;

/// Encode a frame into a freshly allocated buffer
pub fn encode_frame(frame: &Frame) -> Result<Bytes, Gt06Error> {
    let mut buf = BytesMut::with_capacity(frame.encoded_len());
    encode_frame_into(frame, &mut buf)?;
    Ok(buf.freeze())
}

/// Append an encoded frame to `dst`.
///
/// Nothing is written when the frame cannot be represented.
pub fn encode_frame_into(frame: &Frame, dst: &mut BytesMut) -> Result<(), Gt06Error> {
    let length = frame.packet_length()?;

    dst.reserve(frame.encoded_len());
    dst.put_slice(&START_MARKER);

    let region_start = dst.len();
    dst.put_u8(length);
    dst.put_u8(frame.kind.as_u8());
    dst.put_slice(&frame.payload);
    dst.put_u16(frame.serial);

    let crc = checksum(&dst[region_start..]);
    dst.put_u16(crc);
    dst.put_slice(&TERMINATOR);

    Ok(())
}

/// Try to decode one frame from the front of `src`.
///
/// Returns `Ok(None)` while the buffered bytes do not yet hold a whole frame.
/// On success the frame's bytes are consumed from `src`; on error nothing is
/// consumed, see [`skip_corrupt`] to move past the bad bytes.
pub fn try_decode_frame(src: &mut BytesMut) -> Result<Option<Frame>, Gt06Error> {
    if src.len() < START_MARKER.len() {
        return Ok(None);
    }
    if src[..2] != START_MARKER {
        return Err(Gt06Error::InvalidStartMarker([src[0], src[1]]));
    }
    if src.len() <= LENGTH_OFFSET {
        return Ok(None);
    }

    let length = src[LENGTH_OFFSET];
    if (length as usize) < LENGTH_OVERHEAD {
        return Err(Gt06Error::InvalidLength(length));
    }

    let payload_len = length as usize - LENGTH_OVERHEAD;
    let total = payload_len + FRAME_OVERHEAD;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    let frame = parse_frame(&src[..total])?;
    src.advance(total);
    debug!(
        "Decoded {:?} frame, serial {}, {} payload bytes",
        frame.kind,
        frame.serial,
        frame.payload.len()
    );
    Ok(Some(frame))
}

/// Decode a buffer holding exactly one frame
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, Gt06Error> {
    let mut buf = BytesMut::from(bytes);
    let frame = try_decode_frame(&mut buf)?.ok_or_else(|| {
        Gt06Error::InvalidResponse(format!("incomplete frame ({} bytes)", bytes.len()))
    })?;
    if !buf.is_empty() {
        return Err(Gt06Error::InvalidResponse(format!(
            "{} trailing bytes after frame",
            buf.len()
        )));
    }
    Ok(frame)
}

/// Drop the bytes that made [`try_decode_frame`] fail and return how many
/// were dropped.
///
/// A buffer starting with the start marker loses one byte, anything else is
/// dropped up to the next start marker. A trailing `0x78` is kept since it may
/// be the first half of a marker still in flight.
pub fn skip_corrupt(src: &mut BytesMut) -> usize {
    let skip = if src.starts_with(&START_MARKER) {
        1
    } else {
        src.windows(START_MARKER.len())
            .position(|window| window == START_MARKER)
            .unwrap_or_else(|| match src.last() {
                Some(&byte) if byte == START_MARKER[0] => src.len() - 1,
                _ => src.len(),
            })
    };
    src.advance(skip);
    skip
}

/// Check the checksum of a complete encoded frame
pub fn verify_checksum(frame: &[u8]) -> Result<(), Gt06Error> {
    if frame.len() < FRAME_OVERHEAD {
        return Err(Gt06Error::InvalidResponse(format!(
            "frame of {} bytes is shorter than {}",
            frame.len(),
            FRAME_OVERHEAD
        )));
    }
    let crc_at = frame.len() - 4;
    let expected = u16::from_be_bytes([frame[crc_at], frame[crc_at + 1]]);
    let computed = checksum(&frame[LENGTH_OFFSET..crc_at]);
    if expected != computed {
        return Err(Gt06Error::ChecksumMismatch { expected, computed });
    }
    Ok(())
}

/// Validate a complete frame whose length byte has already been checked
fn parse_frame(raw: &[u8]) -> Result<Frame, Gt06Error> {
    let total = raw.len();
    let terminator = [raw[total - 2], raw[total - 1]];
    if terminator != TERMINATOR {
        return Err(Gt06Error::InvalidTerminator(terminator));
    }

    verify_checksum(raw)?;

    let serial_at = total - 6;
    Ok(Frame {
        kind: MessageKind::from_u8(raw[3]),
        payload: raw[4..serial_at].to_vec(),
        serial: u16::from_be_bytes([raw[serial_at], raw[serial_at + 1]]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unhex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_encode_ack_frame() {
        let frame = Frame::new(MessageKind::Login).with_serial(1);
        let encoded = encode_frame(&frame).unwrap();
        assert_eq!(&encoded[..], &unhex("787805010001d9dc0d0a")[..]);
    }

    #[test]
    fn test_encode_heartbeat_frame() {
        let frame = Frame::new(MessageKind::Heartbeat)
            .with_payload(unhex("6004d205030102"))
            .with_serial(1);
        let encoded = encode_frame(&frame).unwrap();
        assert_eq!(&encoded[..], &unhex("78780c136004d20503010200013e3c0d0a")[..]);
    }

    #[test]
    fn test_length_and_checksum_invariants() {
        for len in [0usize, 1, 7, 12, 33, 36, 100, 250] {
            let frame = Frame::new(MessageKind::Other(0x80))
                .with_payload(vec![0xA5; len])
                .with_serial(len as u16);
            let encoded = encode_frame(&frame).unwrap();

            assert_eq!(encoded[2] as usize, encoded.len() - 5);
            let n = encoded.len();
            let crc = u16::from_be_bytes([encoded[n - 4], encoded[n - 3]]);
            assert_eq!(checksum(&encoded[2..n - 4]), crc);
            assert_eq!(&encoded[n - 2..], &TERMINATOR);
        }
    }

    #[test]
    fn test_frame_too_large() {
        let frame = Frame::new(MessageKind::Other(0x80)).with_payload(vec![0; 251]);
        let mut dst = BytesMut::new();
        let err = encode_frame_into(&frame, &mut dst).unwrap_err();
        assert!(matches!(err, Gt06Error::FrameTooLarge { length: 256, max: 255 }));
        assert!(dst.is_empty());
    }

    #[test]
    fn test_decode_roundtrip() {
        let frame = Frame::new(MessageKind::AlarmReport)
            .with_payload(vec![1, 2, 3, 4, 5])
            .with_serial(0xBEEF);
        let encoded = encode_frame(&frame).unwrap();
        assert_eq!(decode_frame(&encoded).unwrap(), frame);
    }

    #[test]
    fn test_decode_partial() {
        let frame = Frame::new(MessageKind::Heartbeat)
            .with_payload(vec![0; 7])
            .with_serial(9);
        let encoded = encode_frame(&frame).unwrap();

        let mut buf = BytesMut::new();
        for (i, byte) in encoded.iter().enumerate() {
            buf.put_u8(*byte);
            let decoded = try_decode_frame(&mut buf).unwrap();
            if i + 1 < encoded.len() {
                assert!(decoded.is_none());
            } else {
                assert_eq!(decoded.unwrap(), frame);
            }
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_back_to_back() {
        let first = Frame::new(MessageKind::Login).with_serial(1);
        let second = Frame::new(MessageKind::Heartbeat).with_serial(2);

        let mut buf = BytesMut::new();
        encode_frame_into(&first, &mut buf).unwrap();
        encode_frame_into(&second, &mut buf).unwrap();

        assert_eq!(try_decode_frame(&mut buf).unwrap().unwrap(), first);
        assert_eq!(try_decode_frame(&mut buf).unwrap().unwrap(), second);
        assert!(try_decode_frame(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let mut raw = unhex("787805010001d9dc0d0a");
        raw[5] = 0x02;
        match decode_frame(&raw) {
            Err(Gt06Error::ChecksumMismatch { expected, computed }) => {
                assert_eq!(expected, 0xD9DC);
                assert_ne!(computed, expected);
            }
            other => panic!("expected checksum mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_bad_markers() {
        let mut raw = unhex("787805010001d9dc0d0a");
        raw[0] = 0x79;
        assert!(matches!(
            decode_frame(&raw),
            Err(Gt06Error::InvalidStartMarker([0x79, 0x78]))
        ));

        let mut raw = unhex("787805010001d9dc0d0a");
        raw[9] = 0x0B;
        assert!(matches!(
            decode_frame(&raw),
            Err(Gt06Error::InvalidTerminator([0x0D, 0x0B]))
        ));

        let raw = unhex("78780401000100000d0a");
        assert!(matches!(decode_frame(&raw), Err(Gt06Error::InvalidLength(4))));
    }

    #[test]
    fn test_decode_error_consumes_nothing() {
        let mut raw = unhex("787805010001d9dc0d0a");
        raw[6] = 0x00;
        let mut buf = BytesMut::from(&raw[..]);
        assert!(try_decode_frame(&mut buf).is_err());
        assert_eq!(buf.len(), raw.len());
    }

    #[test]
    fn test_skip_corrupt() {
        // corrupt frame at the front loses a single byte
        let mut buf = BytesMut::from(&unhex("787805010001000d0a")[..]);
        assert_eq!(skip_corrupt(&mut buf), 1);
        assert_eq!(buf[0], 0x78);

        // noise is dropped up to the next marker
        let mut buf = BytesMut::from(&unhex("00ff78787805")[..]);
        assert_eq!(skip_corrupt(&mut buf), 2);
        assert_eq!(&buf[..], &unhex("78787805")[..]);

        // a trailing half marker is kept
        let mut buf = BytesMut::from(&unhex("000178")[..]);
        assert_eq!(skip_corrupt(&mut buf), 2);
        assert_eq!(&buf[..], &[0x78]);

        let mut buf = BytesMut::from(&unhex("000102")[..]);
        assert_eq!(skip_corrupt(&mut buf), 3);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut raw = unhex("787805010001d9dc0d0a");
        raw.push(0x00);
        assert!(matches!(
            decode_frame(&raw),
            Err(Gt06Error::InvalidResponse(_))
        ));
    }
}
