//! Shared constants for the hub.
//!
//! Defaults that more than one crate needs to agree on live here: identifier
//! limits, the switch vocabulary and the timing defaults used by the
//! coordinator and its activities.
//!
//! ```
//! use homehub_core::constants::*;
//!
//! assert_eq!(SWITCH_ON, "on");
//! assert!(DEFAULT_GATE_CAPACITY >= 1);
//! ```

// ============================================================================
// Device identifiers
// ============================================================================

/// Maximum length of a device identifier, in bytes.
pub const MAX_DEVICE_ID_LENGTH: usize = 64;

// ============================================================================
// Switch vocabulary
// ============================================================================

/// Canonical "on" value written to lights and sockets.
pub const SWITCH_ON: &str = "on";

/// Canonical "off" value written to lights and sockets.
pub const SWITCH_OFF: &str = "off";

// ============================================================================
// Access gate
// ============================================================================

/// Default number of HAL operations allowed in flight at once.
pub const DEFAULT_GATE_CAPACITY: usize = 1;

// ============================================================================
// Activity timing (milliseconds)
// ============================================================================

/// Default interval between two successful poll rounds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Default delay before polling again after a failed round.
pub const DEFAULT_POLL_FAILURE_BACKOFF_MS: u64 = 30_000;

/// Default time an activity gets to stop once shutdown begins.
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 3_000;

/// Default capacity of the poll result queue.
pub const DEFAULT_POLL_QUEUE_CAPACITY: usize = 100;

// ============================================================================
// Command server
// ============================================================================

/// Default TCP port of the command server.
pub const DEFAULT_COMMAND_PORT: u16 = 9998;

/// Default limit of simultaneous command sessions.
pub const DEFAULT_MAX_CONNECTIONS: usize = 32;

/// Default maximum length of one request line, in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8 * 1024;

// ============================================================================
// Simulated sensor bounds
// ============================================================================

/// Lowest temperature the mock sensor will report, in degrees Celsius.
pub const MOCK_TEMP_MIN: f64 = 10.0;

/// Highest temperature the mock sensor will report, in degrees Celsius.
pub const MOCK_TEMP_MAX: f64 = 35.0;
