//! Mock HAL for testing and development.
//!
//! This module provides a simulated device backend that can be controlled
//! programmatically without any hardware or device nodes.

pub mod hal;

// Re-export commonly used types
pub use hal::{MockFault, MockHal, MockHalHandle, MockHalStats, default_devices};
