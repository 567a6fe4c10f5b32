//! Error taxonomy shared by every front end.
//!
//! HAL failures never leave the coordinator raw: they are classified into a
//! small set of [`ErrorKind`]s with stable wire codes, so the command server,
//! the console and the scheduler all report failures the same way.

use homehub_hal::HalError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// Stable classification of a coordinator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The id is not in the registry.
    UnknownDevice,
    /// The device kind refuses the operation.
    UnsupportedOperation,
    /// The write payload is not valid for the device kind.
    InvalidValue,
    /// The HAL could not reach the device.
    DeviceUnavailable,
    /// Cancellation is in effect; stop retrying.
    ShuttingDown,
    /// Anything unexpected.
    #[serde(rename = "internal_error")]
    Internal,
}

impl ErrorKind {
    /// Wire code of this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownDevice => "unknown_device",
            Self::UnsupportedOperation => "unsupported_operation",
            Self::InvalidValue => "invalid_value",
            Self::DeviceUnavailable => "device_unavailable",
            Self::ShuttingDown => "shutting_down",
            Self::Internal => "internal_error",
        }
    }

    /// Whether a caller may reasonably try the same call again later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DeviceUnavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by [`DeviceCoordinator`](crate::DeviceCoordinator) and the
/// access gate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinatorError {
    /// The id is not in the registry.
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    /// The requested value is not valid for the device.
    #[error("Invalid value {value:?} for device {device}")]
    InvalidValue { device: String, value: String },

    /// The HAL failed to reach the device.
    #[error("Device {device} unavailable: {message}")]
    DeviceUnavailable { device: String, message: String },

    /// The hub is shutting down.
    #[error("Shutting down")]
    ShuttingDown,

    /// Coordinator was built with an unusable configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Unexpected failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoordinatorError {
    /// Classify a HAL failure for `device`.
    pub fn from_hal(device: &str, err: HalError) -> Self {
        match err {
            HalError::NotFound { .. } | HalError::Misconfigured { .. } => {
                Self::UnknownDevice(device.to_string())
            }
            HalError::Io(_) | HalError::Disconnected { .. } | HalError::Timeout { .. } => {
                Self::DeviceUnavailable {
                    device: device.to_string(),
                    message: err.to_string(),
                }
            }
            other => Self::Internal(format!("{device}: {other}")),
        }
    }

    /// Classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownDevice(_) => ErrorKind::UnknownDevice,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
            Self::DeviceUnavailable { .. } => ErrorKind::DeviceUnavailable,
            Self::ShuttingDown => ErrorKind::ShuttingDown,
            Self::Config(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(HalError::not_found("x"), ErrorKind::UnknownDevice)]
    #[case(HalError::misconfigured("/dev/x missing"), ErrorKind::UnknownDevice)]
    #[case(HalError::disconnected("x"), ErrorKind::DeviceUnavailable)]
    #[case(HalError::timeout(500), ErrorKind::DeviceUnavailable)]
    #[case(
        HalError::Io(std::io::Error::other("bus error")),
        ErrorKind::DeviceUnavailable
    )]
    #[case(HalError::invalid_data("garbage"), ErrorKind::Internal)]
    #[case(HalError::unsupported("write"), ErrorKind::Internal)]
    #[case(HalError::other("boom"), ErrorKind::Internal)]
    fn test_hal_error_translation(#[case] err: HalError, #[case] expected: ErrorKind) {
        assert_eq!(CoordinatorError::from_hal("x", err).kind(), expected);
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(ErrorKind::DeviceUnavailable.is_retryable());
        assert!(!ErrorKind::ShuttingDown.is_retryable());
        assert!(!ErrorKind::UnknownDevice.is_retryable());
        assert!(!ErrorKind::Internal.is_retryable());
    }

    #[test]
    fn test_error_kind_wire_codes() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::Internal).unwrap(),
            "\"internal_error\""
        );
        assert_eq!(ErrorKind::UnknownDevice.to_string(), "unknown_device");
    }

    #[test]
    fn test_error_display() {
        let err = CoordinatorError::InvalidValue {
            device: "light1".into(),
            value: "dim".into(),
        };
        assert_eq!(err.to_string(), "Invalid value \"dim\" for device light1");
    }
}
