//! Error types for HAL operations.
//!
//! This module defines the failures a hardware abstraction layer can report:
//! unknown or misconfigured devices, disconnections, timeouts and plain I/O
//! errors. Callers above the HAL translate these into their own taxonomy.

/// Result type alias for HAL operations.
pub type Result<T> = std::result::Result<T, HalError>;

/// Errors that can occur during HAL operations.
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    /// The HAL has no device with this identifier.
    #[error("Device not found: {device}")]
    NotFound { device: String },

    /// The device exists in configuration but cannot be addressed
    /// (missing node, permission denied, bad configuration entry).
    #[error("Device misconfigured: {message}")]
    Misconfigured { message: String },

    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Operation is not supported by this HAL.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Invalid data received from device.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl HalError {
    /// Create a new not-found error.
    pub fn not_found(device: impl Into<String>) -> Self {
        Self::NotFound {
            device: device.into(),
        }
    }

    /// Create a new misconfiguration error.
    pub fn misconfigured(message: impl Into<String>) -> Self {
        Self::Misconfigured {
            message: message.into(),
        }
    }

    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a generic error with custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}
