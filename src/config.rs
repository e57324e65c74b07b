//! Terminal configuration
//!
//! Loaded from a JSON document; any missing field falls back to its default.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::message::{DeviceIdentity, Login, TimeZone, LANGUAGE_ENGLISH};
use crate::types::{Gt06Error, SerialNumber};

/// Configuration of a simulated terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Collection server, `host:port`
    pub server_addr: String,
    /// Decimal device identity (IMEI)
    pub identity: String,
    pub model_code: u16,
    /// Hundredths of an hour
    pub time_zone: i32,
    pub language: u8,
    /// Serial number of the first frame sent
    pub first_serial: SerialNumber,
    pub connect_timeout_ms: u64,
    pub response_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8000".to_string(),
            identity: "123456789123456".to_string(),
            model_code: 0x0242,
            time_zone: 800,
            language: LANGUAGE_ENGLISH as u8,
            first_serial: 1,
            connect_timeout_ms: 5_000,
            response_timeout_ms: 5_000,
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, Gt06Error> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Gt06Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Gt06Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Check the fields that feed the login frame
    pub fn validate(&self) -> Result<(), Gt06Error> {
        if self.server_addr.is_empty() {
            return Err(Gt06Error::Config("server_addr is empty".to_string()));
        }
        self.login()?.encode_payload().map(|_| ())
    }

    /// Login message for this terminal
    pub fn login(&self) -> Result<Login, Gt06Error> {
        Ok(Login::new(
            DeviceIdentity::parse(&self.identity)?,
            self.model_code.into(),
            TimeZone::from_hundredths(self.time_zone)?,
            self.language.into(),
        ))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}
