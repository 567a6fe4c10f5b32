//! HAL trait definition.
//!
//! [`DeviceHal`] is the contract between the hub and whatever actually talks
//! to devices: an in-memory mock, a file-backed stub or a real driver. The
//! coordinator is written against this trait only, so any implementation can
//! be plugged in.
//!
//! Methods take `&self`: a HAL is shared by every caller of the coordinator
//! and must handle its own interior synchronization. The returned futures are
//! declared `Send` and implementations `'static`, so the coordinator can hand
//! a call to its own task on any Tokio worker.

use crate::error::Result;
use homehub_core::{DeviceId, DeviceKind, DeviceState, StateValue};
use std::collections::BTreeMap;
use std::future::Future;

/// Hardware abstraction layer for a set of addressable devices.
///
/// # Examples
///
/// ```
/// use homehub_hal::traits::DeviceHal;
/// use homehub_hal::mock::MockHal;
/// use homehub_core::DeviceId;
///
/// #[tokio::main]
/// async fn main() -> homehub_hal::Result<()> {
///     let (hal, _handle) = MockHal::new();
///
///     let devices = hal.list_devices().await?;
///     assert!(devices.contains_key("light_livingroom"));
///
///     let id = DeviceId::new("light_livingroom").unwrap();
///     hal.write_device(&id, &"on".into()).await?;
///     let state = hal.read_device(&id).await?;
///     assert_eq!(state.value.as_text(), Some("on"));
///
///     Ok(())
/// }
/// ```
pub trait DeviceHal: Send + Sync + 'static {
    /// List every device this HAL can address, with its declared kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the device table cannot be produced.
    fn list_devices(&self) -> impl Future<Output = Result<BTreeMap<DeviceId, DeviceKind>>> + Send;

    /// Read the current value of a device.
    ///
    /// # Errors
    ///
    /// - `HalError::NotFound` / `HalError::Misconfigured` if the device cannot be addressed
    /// - `HalError::Io` / `HalError::Disconnected` / `HalError::Timeout` on driver failures
    fn read_device(&self, id: &DeviceId) -> impl Future<Output = Result<DeviceState>> + Send;

    /// Write a value to a device.
    ///
    /// Returns `Ok(false)` when the HAL reached the device but declined the
    /// value (for example a read-only node).
    ///
    /// # Errors
    ///
    /// Same classes as [`DeviceHal::read_device`].
    fn write_device(
        &self,
        id: &DeviceId,
        value: &StateValue,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Human-readable backend name, used in logs.
    fn backend_name(&self) -> &str;
}
