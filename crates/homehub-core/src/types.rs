use crate::{
    Result,
    constants::{MAX_DEVICE_ID_LENGTH, SWITCH_OFF, SWITCH_ON},
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Device identifier (non-empty, no whitespace, at most 64 bytes)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a new device ID with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidDeviceId` if the ID is empty, too long or
    /// contains whitespace or control characters.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidDeviceId("device ID must not be empty".into()));
        }
        if id.len() > MAX_DEVICE_ID_LENGTH {
            return Err(Error::InvalidDeviceId(format!(
                "device ID must be at most {MAX_DEVICE_ID_LENGTH} bytes, got {}",
                id.len()
            )));
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::InvalidDeviceId(format!(
                "device ID must not contain whitespace: {id:?}"
            )));
        }
        Ok(DeviceId(id))
    }

    /// Get the device ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DeviceId::new(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        DeviceId::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Declared type of a device.
///
/// The kind decides the write policy applied by the coordinator. Any type
/// string the hub does not recognise deserializes to [`DeviceKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// On/off light.
    Light,
    /// On/off power socket.
    Socket,
    /// Read-only temperature sensor.
    #[serde(alias = "sensor_temp", alias = "sensor")]
    TempSensor,
    /// Anything else; values pass through unvalidated.
    #[serde(other)]
    Unknown,
}

impl DeviceKind {
    /// Parse a kind name as used in device tables (`light`, `socket`,
    /// `sensor_temp`, ...). Unrecognised names map to `Unknown`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "light" => Self::Light,
            "socket" => Self::Socket,
            "temp_sensor" | "sensor_temp" | "sensor" => Self::TempSensor,
            _ => Self::Unknown,
        }
    }

    /// Whether the kind accepts writes at all.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        !matches!(self, Self::TempSensor)
    }

    /// Whether writes must be normalized to the on/off vocabulary.
    #[must_use]
    pub fn is_switch(&self) -> bool {
        matches!(self, Self::Light | Self::Socket)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Socket => write!(f, "socket"),
            Self::TempSensor => write!(f, "temp_sensor"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Immutable registry entry describing one device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub kind: DeviceKind,
}

impl DeviceDescriptor {
    pub fn new(id: DeviceId, kind: DeviceKind) -> Self {
        Self { id, kind }
    }
}

/// A device value as read from or written to the HAL.
///
/// Serialized untagged so JSON `true`, `21.5` and `"on"` all map directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl StateValue {
    /// Get the text if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the number if this is a numeric value.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Canonical state of an on/off device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchState {
    On,
    Off,
}

impl SwitchState {
    /// Normalize a requested value to on/off.
    ///
    /// Accepts, case-insensitively and ignoring surrounding whitespace,
    /// `on`/`off`, `1`/`0`, `true`/`false`, as well as JSON booleans and the
    /// numbers `1` and `0`.
    ///
    /// # Errors
    /// Returns `Error::InvalidSwitchValue` for anything else.
    ///
    /// ```
    /// use homehub_core::{StateValue, SwitchState};
    ///
    /// assert_eq!(SwitchState::from_value(&"ON".into()).unwrap(), SwitchState::On);
    /// assert_eq!(SwitchState::from_value(&StateValue::Bool(false)).unwrap(), SwitchState::Off);
    /// assert!(SwitchState::from_value(&"dim".into()).is_err());
    /// ```
    pub fn from_value(value: &StateValue) -> Result<Self> {
        match value {
            StateValue::Bool(true) => Ok(Self::On),
            StateValue::Bool(false) => Ok(Self::Off),
            StateValue::Number(n) if *n == 1.0 => Ok(Self::On),
            StateValue::Number(n) if *n == 0.0 => Ok(Self::Off),
            StateValue::Number(n) => Err(Error::InvalidSwitchValue(n.to_string())),
            StateValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "on" | "1" | "true" => Ok(Self::On),
                "off" | "0" | "false" => Ok(Self::Off),
                _ => Err(Error::InvalidSwitchValue(s.clone())),
            },
        }
    }

    /// Wire/HAL representation (`"on"` or `"off"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => SWITCH_ON,
            Self::Off => SWITCH_OFF,
        }
    }

    /// The opposite state.
    #[must_use]
    pub fn toggled(&self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<SwitchState> for StateValue {
    fn from(state: SwitchState) -> Self {
        StateValue::Text(state.as_str().to_string())
    }
}

/// Snapshot of a device value at the moment it was observed.
///
/// Every successful read produces a fresh snapshot; nothing mutates one after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub value: StateValue,
    pub observed_at: DateTime<Utc>,
}

impl DeviceState {
    /// Snapshot observed now.
    pub fn new(value: impl Into<StateValue>) -> Self {
        Self::observed_at(value, Utc::now())
    }

    /// Snapshot with an explicit observation time.
    pub fn observed_at(value: impl Into<StateValue>, observed_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            observed_at,
        }
    }
}
