//! Tokio codec for GT06 frames

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::frame::{encode_frame_into, skip_corrupt, try_decode_frame};
use crate::types::{Frame, Gt06Error};

/// Frame codec for use with `tokio_util::codec::Framed`.
///
/// Corrupt input never ends the stream: bad bytes are skipped until the next
/// start marker, the way a collection server resynchronizes on a noisy line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gt06FrameCodec;

impl Gt06FrameCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for Gt06FrameCodec {
    type Item = Frame;
    type Error = Gt06Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match try_decode_frame(src) {
                Ok(frame) => return Ok(frame),
                Err(e) => {
                    let skipped = skip_corrupt(src);
                    warn!("Skipped {} bytes after frame error: {}", skipped, e);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                if !buf.is_empty() {
                    warn!("Discarding {} bytes of incomplete frame at end of stream", buf.len());
                    buf.clear();
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Frame> for Gt06FrameCodec {
    type Error = Gt06Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame_into(&item, dst)
    }
}

/// Pass through frames that were already built
impl Encoder<Bytes> for Gt06FrameCodec {
    type Error = Gt06Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageKind;
    use bytes::BufMut;

    #[test]
    fn test_codec_roundtrip() {
        let mut codec = Gt06FrameCodec::new();
        let frame = Frame::new(MessageKind::LocationReport)
            .with_payload(vec![7; 33])
            .with_serial(2);

        let mut buf = BytesMut::new();
        codec.encode(frame.clone(), &mut buf).unwrap();
        assert_eq!(buf.len(), 43);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_split_input() {
        let mut codec = Gt06FrameCodec::new();
        let mut encoded = BytesMut::new();
        codec
            .encode(Frame::new(MessageKind::Login).with_serial(1), &mut encoded)
            .unwrap();

        let mut buf = BytesMut::new();
        buf.put_slice(&encoded[..4]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.put_slice(&encoded[4..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.kind, MessageKind::Login);
        assert_eq!(frame.serial, 1);
    }

    #[test]
    fn test_codec_prebuilt_bytes() {
        let mut codec = Gt06FrameCodec::new();
        let prebuilt = Bytes::from_static(&[0x78, 0x78, 0x05, 0x01, 0x00, 0x01, 0xD9, 0xDC, 0x0D, 0x0A]);

        let mut buf = BytesMut::new();
        codec.encode(prebuilt, &mut buf).unwrap();
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, Frame::new(MessageKind::Login).with_serial(1));
    }

    #[test]
    fn test_codec_skips_garbage() {
        let mut codec = Gt06FrameCodec::new();
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_resyncs_after_noise_byte() {
        let mut codec = Gt06FrameCodec::new();
        let login = Frame::new(MessageKind::Login)
            .with_payload(vec![0; 12])
            .with_serial(1);

        let mut buf = BytesMut::new();
        buf.put_u8(0x00);
        codec.encode(login.clone(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), login);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_skips_corrupt_frame() {
        let mut codec = Gt06FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Frame::new(MessageKind::Login).with_serial(1), &mut buf)
            .unwrap();
        // break the first frame's checksum
        buf[6] ^= 0xFF;
        let heartbeat = Frame::new(MessageKind::Heartbeat)
            .with_payload(vec![0; 7])
            .with_serial(2);
        codec.encode(heartbeat.clone(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), heartbeat);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_codec_keeps_partial_marker() {
        let mut codec = Gt06FrameCodec::new();
        let mut encoded = BytesMut::new();
        codec
            .encode(Frame::new(MessageKind::Login).with_serial(1), &mut encoded)
            .unwrap();

        let mut buf = BytesMut::from(&[0x11, 0x22, 0x78][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], &[0x78]);

        buf.put_slice(&encoded[1..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.serial, 1);
    }

    #[test]
    fn test_codec_eof_drops_partial_frame() {
        let mut codec = Gt06FrameCodec::new();
        let mut buf = BytesMut::from(&[0x78, 0x78, 0x11, 0x01][..]);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }
}
