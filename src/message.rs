//! Typed payloads for the login, location, alarm and heartbeat messages
//!
//! Every multi-byte field is big-endian. Integer inputs are wider than their
//! wire encoding and are range-checked when the payload is serialized, so a
//! value that does not fit fails with [`Gt06Error::FieldOutOfRange`] instead
//! of being truncated. Two truncations are part of the protocol and are
//! applied on purpose: the device identity keeps the low 64 bits of its
//! decimal value, and the cell tower id keeps its low 24 bits.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use bitflags::bitflags;
use byteorder::{BigEndian, ReadBytesExt};
use bytes::{BufMut, BytesMut};

use crate::types::{Frame, Gt06Error, MessageKind, SerialNumber};

/// Satellite count reported in every GPS block
pub const DEFAULT_SATELLITES: u32 = 10;

pub const LANGUAGE_CHINESE: u32 = 0x01;
pub const LANGUAGE_ENGLISH: u32 = 0x02;

/// Bits of the cell tower id that survive encoding
pub const CELL_ID_MASK: u32 = 0x00FF_FFFF;

pub const LOGIN_PAYLOAD_LEN: usize = 12;
pub const LOCATION_PAYLOAD_LEN: usize = 33;
pub const ALARM_PAYLOAD_LEN: usize = 36;
pub const HEARTBEAT_PAYLOAD_LEN: usize = 7;

/// Terminal identity packed into 8 bytes.
///
/// Parsed from a decimal string (normally the 15-digit IMEI). Values beyond
/// 64 bits keep only their low-order 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceIdentity(u64);

impl DeviceIdentity {
    pub fn parse(input: &str) -> Result<Self, Gt06Error> {
        if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Gt06Error::InvalidIdentity(input.to_string()));
        }
        // wrapping arithmetic keeps the value modulo 2^64
        let value = input.bytes().fold(0u64, |acc, b| {
            acc.wrapping_mul(10).wrapping_add(u64::from(b - b'0'))
        });
        Ok(Self(value))
    }

    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub const fn to_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl FromStr for DeviceIdentity {
    type Err = Gt06Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Time zone offset in hundredths of an hour (+8:00 is 800).
///
/// Carried in the top 12 bits of the login's time-zone/language word as a
/// two's complement value, which bounds it to -2048..=2047.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeZone(i16);

impl TimeZone {
    pub const MIN: i16 = -2048;
    pub const MAX: i16 = 2047;

    pub const UTC: TimeZone = TimeZone(0);

    pub fn from_hundredths(hundredths: i32) -> Result<Self, Gt06Error> {
        if hundredths < i32::from(Self::MIN) || hundredths > i32::from(Self::MAX) {
            return Err(Gt06Error::out_of_range(
                "time_zone",
                hundredths,
                Self::MIN.into(),
                Self::MAX.into(),
            ));
        }
        Ok(Self(hundredths as i16))
    }

    /// Whole-hour offset, e.g. `from_hours(8)` for UTC+8
    pub fn from_hours(hours: i32) -> Result<Self, Gt06Error> {
        Self::from_hundredths(hours.saturating_mul(100))
    }

    pub const fn hundredths(&self) -> i16 {
        self.0
    }

    fn to_bits(self) -> u16 {
        (self.0 as u16) & 0x0FFF
    }

    fn from_bits(bits: u16) -> Self {
        // sign-extend the 12-bit field
        Self(((bits << 4) as i16) >> 4)
    }
}

/// Latitude or longitude magnitude as degrees x 1,800,000.
///
/// The hemisphere travels in the course/status word, see [`CourseFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coordinate(u32);

impl Coordinate {
    pub const SCALE: f64 = 1_800_000.0;

    pub fn latitude(degrees: f64) -> Result<Self, Gt06Error> {
        Self::from_degrees("latitude", degrees)
    }

    pub fn longitude(degrees: f64) -> Result<Self, Gt06Error> {
        Self::from_degrees("longitude", degrees)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u32 {
        self.0
    }

    pub fn degrees(&self) -> f64 {
        f64::from(self.0) / Self::SCALE
    }

    fn from_degrees(field: &'static str, degrees: f64) -> Result<Self, Gt06Error> {
        scale_to_u32(field, degrees * Self::SCALE, u32::MAX).map(Self)
    }
}

/// External supply voltage in hundredths of a volt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Voltage(u16);

impl Voltage {
    pub const SCALE: f64 = 100.0;

    pub fn from_volts(volts: f64) -> Result<Self, Gt06Error> {
        scale_to_u32("external_voltage", volts * Self::SCALE, u16::MAX.into())
            .map(|v| Self(v as u16))
    }

    pub const fn from_centivolts(centivolts: u16) -> Self {
        Self(centivolts)
    }

    pub const fn centivolts(&self) -> u16 {
        self.0
    }

    pub fn volts(&self) -> f64 {
        f64::from(self.0) / Self::SCALE
    }
}

/// Truncate a scaled fixed-point value toward zero and check it fits
fn scale_to_u32(field: &'static str, scaled: f64, max: u32) -> Result<u32, Gt06Error> {
    let truncated = scaled.trunc();
    if !truncated.is_finite() || truncated < 0.0 || truncated > f64::from(max) {
        return Err(Gt06Error::out_of_range(field, scaled, 0, max.into()));
    }
    Ok(truncated as u32)
}

bitflags! {
    /// Terminal information byte. Bits 3-5 carry the alarm code and are kept
    /// as raw bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TerminalInfo: u8 {
        const DEFENCE_ACTIVE = 0b0000_0001;
        const ACC_HIGH = 0b0000_0010;
        const CHARGING = 0b0000_0100;
        const ALARM_MASK = 0b0011_1000;
        const GPS_TRACKING = 0b0100_0000;
        const OIL_ELECTRICITY_CUT = 0b1000_0000;
    }
}

impl TerminalInfo {
    /// 3-bit alarm code from bits 3-5
    pub fn alarm_code(&self) -> u8 {
        (self.bits() & Self::ALARM_MASK.bits()) >> 3
    }
}

bitflags! {
    /// Flag bits of the course/status word; the low 10 bits hold the course
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CourseFlags: u16 {
        const LATITUDE_NORTH = 1 << 10;
        const LONGITUDE_WEST = 1 << 11;
        const POSITIONED = 1 << 12;
        const DIFFERENTIAL = 1 << 13;
    }
}

const COURSE_MASK: u16 = 0x03FF;

/// Pack a course in degrees with its flag bits into the 2-byte status word
pub fn pack_course_status(course: u32, flags: CourseFlags) -> Result<u32, Gt06Error> {
    if course > u32::from(COURSE_MASK) {
        return Err(Gt06Error::out_of_range("course", course, 0, COURSE_MASK.into()));
    }
    Ok(course | u32::from(flags.bits()))
}

/// Raw date and time bytes, no century or time zone conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DateTime {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl DateTime {
    pub fn new(year: u32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }
}

/// GPS block shared by location and alarm reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsInfo {
    pub date_time: DateTime,
    pub satellites: u32,
    pub latitude: Coordinate,
    pub longitude: Coordinate,
    /// km/h
    pub speed: u32,
    pub course_status: u32,
}

impl GpsInfo {
    pub fn new(date_time: DateTime, latitude: Coordinate, longitude: Coordinate) -> Self {
        Self {
            date_time,
            satellites: DEFAULT_SATELLITES,
            latitude,
            longitude,
            speed: 0,
            course_status: 0,
        }
    }

    pub fn course(&self) -> u32 {
        self.course_status & u32::from(COURSE_MASK)
    }

    pub fn course_flags(&self) -> CourseFlags {
        CourseFlags::from_bits_truncate(self.course_status as u16)
    }
}

/// Serving cell (LBS) block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellInfo {
    pub mcc: u32,
    pub mnc: u32,
    pub lac: u32,
    /// Only the low 24 bits are transmitted
    pub cell_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Login {
    pub identity: DeviceIdentity,
    pub model_code: u32,
    pub time_zone: TimeZone,
    /// 4-bit language selector
    pub language: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationReport {
    pub gps: GpsInfo,
    pub cell: CellInfo,
    pub acc: u32,
    pub upload_mode: u32,
    pub realtime_reupload: u32,
    /// Meters
    pub odometer: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmReport {
    pub gps: GpsInfo,
    pub cell: CellInfo,
    pub acc: u32,
    pub terminal_info: TerminalInfo,
    pub battery_level: u32,
    pub signal_strength: u32,
    /// Alarm type in the high byte, language in the low byte
    pub alarm_language: u32,
    /// Meters
    pub odometer: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub terminal_info: TerminalInfo,
    pub external_voltage: Voltage,
    pub battery_level: u32,
    pub signal_strength: u32,
    pub language_port_status: u32,
}

/// Fixed-width big-endian payload writer with range checks
struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    fn u8(&mut self, field: &'static str, value: u32) -> Result<(), Gt06Error> {
        let byte = u8::try_from(value)
            .map_err(|_| Gt06Error::out_of_range(field, value, 0, u8::MAX.into()))?;
        self.buf.put_u8(byte);
        Ok(())
    }

    fn u16(&mut self, field: &'static str, value: u32) -> Result<(), Gt06Error> {
        let word = u16::try_from(value)
            .map_err(|_| Gt06Error::out_of_range(field, value, 0, u16::MAX.into()))?;
        self.buf.put_u16(word);
        Ok(())
    }

    fn u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    /// Cell id: 4-byte big-endian with the top byte dropped
    fn cell_id(&mut self, cell_id: u32) {
        self.buf.put_slice(&cell_id.to_be_bytes()[1..]);
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    fn finish(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

type PayloadReader<'a> = Cursor<&'a [u8]>;

fn check_len(kind: MessageKind, expected: usize, payload: &[u8]) -> Result<(), Gt06Error> {
    if payload.len() != expected {
        return Err(Gt06Error::PayloadLength {
            kind,
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

fn write_gps(w: &mut PayloadWriter, gps: &GpsInfo) -> Result<(), Gt06Error> {
    let dt = &gps.date_time;
    w.u8("year", dt.year)?;
    w.u8("month", dt.month)?;
    w.u8("day", dt.day)?;
    w.u8("hour", dt.hour)?;
    w.u8("minute", dt.minute)?;
    w.u8("second", dt.second)?;
    w.u8("satellites", gps.satellites)?;
    w.u32(gps.latitude.raw());
    w.u32(gps.longitude.raw());
    w.u8("speed", gps.speed)?;
    w.u16("course_status", gps.course_status)
}

fn write_cell(w: &mut PayloadWriter, cell: &CellInfo) -> Result<(), Gt06Error> {
    w.u16("mcc", cell.mcc)?;
    w.u8("mnc", cell.mnc)?;
    w.u16("lac", cell.lac)?;
    w.cell_id(cell.cell_id);
    Ok(())
}

fn read_gps(r: &mut PayloadReader<'_>) -> Result<GpsInfo, Gt06Error> {
    let date_time = DateTime {
        year: r.read_u8()?.into(),
        month: r.read_u8()?.into(),
        day: r.read_u8()?.into(),
        hour: r.read_u8()?.into(),
        minute: r.read_u8()?.into(),
        second: r.read_u8()?.into(),
    };
    Ok(GpsInfo {
        date_time,
        satellites: r.read_u8()?.into(),
        latitude: Coordinate::from_raw(r.read_u32::<BigEndian>()?),
        longitude: Coordinate::from_raw(r.read_u32::<BigEndian>()?),
        speed: r.read_u8()?.into(),
        course_status: r.read_u16::<BigEndian>()?.into(),
    })
}

fn read_cell(r: &mut PayloadReader<'_>) -> Result<CellInfo, Gt06Error> {
    Ok(CellInfo {
        mcc: r.read_u16::<BigEndian>()?.into(),
        mnc: r.read_u8()?.into(),
        lac: r.read_u16::<BigEndian>()?.into(),
        cell_id: r.read_u24::<BigEndian>()?,
    })
}

impl Login {
    pub const KIND: MessageKind = MessageKind::Login;

    pub fn new(
        identity: DeviceIdentity,
        model_code: u32,
        time_zone: TimeZone,
        language: u32,
    ) -> Self {
        Self {
            identity,
            model_code,
            time_zone,
            language,
        }
    }

    pub fn encode_payload(&self) -> Result<Vec<u8>, Gt06Error> {
        if self.language > 0x0F {
            return Err(Gt06Error::out_of_range("language", self.language, 0, 0x0F));
        }
        let mut w = PayloadWriter::with_capacity(LOGIN_PAYLOAD_LEN);
        w.bytes(&self.identity.to_bytes());
        w.u16("model_code", self.model_code)?;
        let tz_language = (u32::from(self.time_zone.to_bits()) << 4) | self.language;
        w.u16("time_zone_language", tz_language)?;
        Ok(w.finish())
    }

    pub fn decode_payload(payload: &[u8]) -> Result<Self, Gt06Error> {
        check_len(Self::KIND, LOGIN_PAYLOAD_LEN, payload)?;
        let mut r = Cursor::new(payload);
        let identity = DeviceIdentity::from_u64(r.read_u64::<BigEndian>()?);
        let model_code = r.read_u16::<BigEndian>()?.into();
        let tz_language = r.read_u16::<BigEndian>()?;
        Ok(Self {
            identity,
            model_code,
            time_zone: TimeZone::from_bits(tz_language >> 4),
            language: u32::from(tz_language & 0x0F),
        })
    }
}

impl LocationReport {
    pub const KIND: MessageKind = MessageKind::LocationReport;

    pub fn encode_payload(&self) -> Result<Vec<u8>, Gt06Error> {
        let mut w = PayloadWriter::with_capacity(LOCATION_PAYLOAD_LEN);
        write_gps(&mut w, &self.gps)?;
        write_cell(&mut w, &self.cell)?;
        w.u8("acc", self.acc)?;
        w.u8("upload_mode", self.upload_mode)?;
        w.u8("realtime_reupload", self.realtime_reupload)?;
        w.u32(self.odometer);
        Ok(w.finish())
    }

    pub fn decode_payload(payload: &[u8]) -> Result<Self, Gt06Error> {
        check_len(Self::KIND, LOCATION_PAYLOAD_LEN, payload)?;
        let mut r = Cursor::new(payload);
        Ok(Self {
            gps: read_gps(&mut r)?,
            cell: read_cell(&mut r)?,
            acc: r.read_u8()?.into(),
            upload_mode: r.read_u8()?.into(),
            realtime_reupload: r.read_u8()?.into(),
            odometer: r.read_u32::<BigEndian>()?,
        })
    }
}

impl AlarmReport {
    pub const KIND: MessageKind = MessageKind::AlarmReport;

    pub fn encode_payload(&self) -> Result<Vec<u8>, Gt06Error> {
        let mut w = PayloadWriter::with_capacity(ALARM_PAYLOAD_LEN);
        write_gps(&mut w, &self.gps)?;
        write_cell(&mut w, &self.cell)?;
        w.u8("acc", self.acc)?;
        w.u8("terminal_info", self.terminal_info.bits().into())?;
        w.u8("battery_level", self.battery_level)?;
        w.u8("signal_strength", self.signal_strength)?;
        w.u16("alarm_language", self.alarm_language)?;
        w.u32(self.odometer);
        Ok(w.finish())
    }

    pub fn decode_payload(payload: &[u8]) -> Result<Self, Gt06Error> {
        check_len(Self::KIND, ALARM_PAYLOAD_LEN, payload)?;
        let mut r = Cursor::new(payload);
        Ok(Self {
            gps: read_gps(&mut r)?,
            cell: read_cell(&mut r)?,
            acc: r.read_u8()?.into(),
            terminal_info: TerminalInfo::from_bits_retain(r.read_u8()?),
            battery_level: r.read_u8()?.into(),
            signal_strength: r.read_u8()?.into(),
            alarm_language: r.read_u16::<BigEndian>()?.into(),
            odometer: r.read_u32::<BigEndian>()?,
        })
    }
}

impl Heartbeat {
    pub const KIND: MessageKind = MessageKind::Heartbeat;

    pub fn encode_payload(&self) -> Result<Vec<u8>, Gt06Error> {
        let mut w = PayloadWriter::with_capacity(HEARTBEAT_PAYLOAD_LEN);
        w.u8("terminal_info", self.terminal_info.bits().into())?;
        w.u16("external_voltage", self.external_voltage.centivolts().into())?;
        w.u8("battery_level", self.battery_level)?;
        w.u8("signal_strength", self.signal_strength)?;
        w.u16("language_port_status", self.language_port_status)?;
        Ok(w.finish())
    }

    pub fn decode_payload(payload: &[u8]) -> Result<Self, Gt06Error> {
        check_len(Self::KIND, HEARTBEAT_PAYLOAD_LEN, payload)?;
        let mut r = Cursor::new(payload);
        Ok(Self {
            terminal_info: TerminalInfo::from_bits_retain(r.read_u8()?),
            external_voltage: Voltage::from_centivolts(r.read_u16::<BigEndian>()?),
            battery_level: r.read_u8()?.into(),
            signal_strength: r.read_u8()?.into(),
            language_port_status: r.read_u16::<BigEndian>()?.into(),
        })
    }
}

/// One of the four typed message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Login(Login),
    Location(LocationReport),
    Alarm(AlarmReport),
    Heartbeat(Heartbeat),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Login(_) => Login::KIND,
            Message::Location(_) => LocationReport::KIND,
            Message::Alarm(_) => AlarmReport::KIND,
            Message::Heartbeat(_) => Heartbeat::KIND,
        }
    }

    pub fn encode_payload(&self) -> Result<Vec<u8>, Gt06Error> {
        match self {
            Message::Login(m) => m.encode_payload(),
            Message::Location(m) => m.encode_payload(),
            Message::Alarm(m) => m.encode_payload(),
            Message::Heartbeat(m) => m.encode_payload(),
        }
    }

    /// Serialize into an unencoded frame, checking it fits the length byte
    pub fn to_frame(&self, serial: SerialNumber) -> Result<Frame, Gt06Error> {
        let frame = Frame::new(self.kind())
            .with_payload(self.encode_payload()?)
            .with_serial(serial);
        frame.packet_length()?;
        Ok(frame)
    }

    /// Decode the typed payload of a received frame
    pub fn decode(frame: &Frame) -> Result<Self, Gt06Error> {
        match frame.kind {
            MessageKind::Login => Login::decode_payload(&frame.payload).map(Message::Login),
            MessageKind::LocationReport => {
                LocationReport::decode_payload(&frame.payload).map(Message::Location)
            }
            MessageKind::AlarmReport => {
                AlarmReport::decode_payload(&frame.payload).map(Message::Alarm)
            }
            MessageKind::Heartbeat => {
                Heartbeat::decode_payload(&frame.payload).map(Message::Heartbeat)
            }
            MessageKind::Other(byte) => Err(Gt06Error::UnexpectedKind(byte)),
        }
    }
}

impl From<Login> for Message {
    fn from(m: Login) -> Self {
        Message::Login(m)
    }
}

impl From<LocationReport> for Message {
    fn from(m: LocationReport) -> Self {
        Message::Location(m)
    }
}

impl From<AlarmReport> for Message {
    fn from(m: AlarmReport) -> Self {
        Message::Alarm(m)
    }
}

impl From<Heartbeat> for Message {
    fn from(m: Heartbeat) -> Self {
        Message::Heartbeat(m)
    }
}
