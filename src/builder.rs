//! Frame builder with an observability hook
//!
//! Each build is a pure transform from typed fields to bytes. The observer is
//! told about every frame built and every build that failed; it never affects
//! the result.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::frame::encode_frame;
use crate::message::{AlarmReport, Heartbeat, LocationReport, Login, Message};
use crate::types::{Frame, Gt06Error, MessageKind, SerialNumber};

/// Receives notifications at frame-build boundaries
pub trait FrameObserver: Send + Sync {
    fn frame_built(&self, kind: MessageKind, serial: SerialNumber, frame: &[u8]);

    fn frame_rejected(&self, kind: MessageKind, serial: SerialNumber, error: &Gt06Error) {
        let _ = (kind, serial, error);
    }
}

/// Default observer: logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl FrameObserver for TracingObserver {
    fn frame_built(&self, kind: MessageKind, serial: SerialNumber, frame: &[u8]) {
        debug!(
            "Built {:?} frame, serial {}, {} bytes: {}",
            kind,
            serial,
            frame.len(),
            HexDump(frame)
        );
    }

    fn frame_rejected(&self, kind: MessageKind, serial: SerialNumber, error: &Gt06Error) {
        warn!("Failed to build {:?} frame, serial {}: {}", kind, serial, error);
    }
}

/// Lowercase hex rendering of a byte slice
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Builds finished frames for the four message kinds
#[derive(Clone)]
pub struct FrameBuilder {
    observer: Arc<dyn FrameObserver>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self {
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(observer: Arc<dyn FrameObserver>) -> Self {
        Self { observer }
    }

    pub fn login(&self, login: &Login, serial: SerialNumber) -> Result<Bytes, Gt06Error> {
        self.finish(Login::KIND, serial, login.encode_payload())
    }

    pub fn location(
        &self,
        report: &LocationReport,
        serial: SerialNumber,
    ) -> Result<Bytes, Gt06Error> {
        self.finish(LocationReport::KIND, serial, report.encode_payload())
    }

    pub fn alarm(&self, report: &AlarmReport, serial: SerialNumber) -> Result<Bytes, Gt06Error> {
        self.finish(AlarmReport::KIND, serial, report.encode_payload())
    }

    pub fn heartbeat(
        &self,
        heartbeat: &Heartbeat,
        serial: SerialNumber,
    ) -> Result<Bytes, Gt06Error> {
        self.finish(Heartbeat::KIND, serial, heartbeat.encode_payload())
    }

    pub fn build(&self, message: &Message, serial: SerialNumber) -> Result<Bytes, Gt06Error> {
        self.finish(message.kind(), serial, message.encode_payload())
    }

    /// Frame an arbitrary payload under any protocol number
    pub fn raw(
        &self,
        kind: MessageKind,
        payload: &[u8],
        serial: SerialNumber,
    ) -> Result<Bytes, Gt06Error> {
        self.finish(kind, serial, Ok(payload.to_vec()))
    }

    fn finish(
        &self,
        kind: MessageKind,
        serial: SerialNumber,
        payload: Result<Vec<u8>, Gt06Error>,
    ) -> Result<Bytes, Gt06Error> {
        let result = payload.and_then(|payload| {
            let frame = Frame::new(kind).with_payload(payload).with_serial(serial);
            encode_frame(&frame)
        });

        match &result {
            Ok(bytes) => self.observer.frame_built(kind, serial, bytes),
            Err(e) => self.observer.frame_rejected(kind, serial, e),
        }
        result
    }
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuilder").finish_non_exhaustive()
    }
}

/// Build a frame with the default tracing observer
pub fn build_frame(message: &Message, serial: SerialNumber) -> Result<Bytes, Gt06Error> {
    FrameBuilder::new().build(message, serial)
}
