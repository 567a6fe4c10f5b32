//! Hardware abstraction layer for the home hub.
//!
//! This crate defines the [`DeviceHal`] trait the coordinator talks to, and
//! ships two backends:
//!
//! - [`MockHal`]: simulated lights, sockets and a temperature sensor, with a
//!   [`MockHalHandle`] for fault injection and call statistics.
//! - [`FileHal`]: one file or character device node per device.
//!
//! [`AnyHal`] wraps both so the backend can be picked from configuration.
//!
//! # Design
//!
//! - **Async-first**: all device I/O uses native `async fn` in traits.
//! - **Shared**: methods take `&self`; a HAL handles its own synchronization
//!   and must be `Send + Sync`.
//! - **Plain errors**: a HAL reports [`HalError`]; classifying failures for
//!   clients is the coordinator's job.
//!
//! ```no_run
//! use homehub_hal::{DeviceHal, HalError};
//! use homehub_core::DeviceId;
//!
//! async fn is_on<H: DeviceHal>(hal: &H, id: &DeviceId) -> Result<bool, HalError> {
//!     let state = hal.read_device(id).await?;
//!     Ok(state.value.as_text() == Some("on"))
//! }
//! ```

pub mod devices;
pub mod error;
pub mod file;
pub mod mock;
pub mod traits;

pub use devices::AnyHal;
pub use error::{HalError, Result};
pub use file::{FileDeviceConfig, FileHal};
pub use mock::{MockFault, MockHal, MockHalHandle, MockHalStats};
pub use traits::DeviceHal;
