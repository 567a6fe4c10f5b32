//! Enum wrapper for HAL dispatch.
//!
//! Native `async fn` in traits is not object-safe, so a `Box<dyn DeviceHal>`
//! is not available. [`AnyHal`] gives the binary one concrete type to hand to
//! the coordinator while the backend is chosen at runtime from configuration.
//!
//! # Examples
//!
//! ```
//! use homehub_hal::devices::AnyHal;
//! use homehub_hal::mock::MockHal;
//! use homehub_hal::traits::DeviceHal;
//!
//! let (hal, _handle) = MockHal::new();
//! let any = AnyHal::Mock(hal);
//! assert_eq!(any.backend_name(), "mock");
//! ```

use crate::file::FileHal;
use crate::mock::MockHal;
use crate::traits::DeviceHal;
use crate::Result;
use homehub_core::{DeviceId, DeviceKind, DeviceState, StateValue};
use std::collections::BTreeMap;

/// Runtime-selected HAL backend.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyHal {
    /// In-memory simulated devices.
    Mock(MockHal),
    /// Device nodes or plain files.
    File(FileHal),
}

impl DeviceHal for AnyHal {
    async fn list_devices(&self) -> Result<BTreeMap<DeviceId, DeviceKind>> {
        match self {
            Self::Mock(hal) => hal.list_devices().await,
            Self::File(hal) => hal.list_devices().await,
        }
    }

    async fn read_device(&self, id: &DeviceId) -> Result<DeviceState> {
        match self {
            Self::Mock(hal) => hal.read_device(id).await,
            Self::File(hal) => hal.read_device(id).await,
        }
    }

    async fn write_device(&self, id: &DeviceId, value: &StateValue) -> Result<bool> {
        match self {
            Self::Mock(hal) => hal.write_device(id, value).await,
            Self::File(hal) => hal.write_device(id, value).await,
        }
    }

    fn backend_name(&self) -> &str {
        match self {
            Self::Mock(hal) => hal.backend_name(),
            Self::File(hal) => hal.backend_name(),
        }
    }
}

impl From<MockHal> for AnyHal {
    fn from(hal: MockHal) -> Self {
        Self::Mock(hal)
    }
}

impl From<FileHal> for AnyHal {
    fn from(hal: FileHal) -> Self {
        Self::File(hal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_any_hal_dispatches_to_mock() {
        let (hal, handle) = MockHal::new();
        let any = AnyHal::from(hal);
        let id = DeviceId::new("socket_kitchen").unwrap();

        assert!(any.write_device(&id, &"on".into()).await.unwrap());
        assert_eq!(any.read_device(&id).await.unwrap().value.as_text(), Some("on"));
        assert_eq!(handle.stats().writes, 1);
    }

    #[tokio::test]
    async fn test_any_hal_dispatches_to_file() {
        let any = AnyHal::from(FileHal::new([]).unwrap());
        assert_eq!(any.backend_name(), "file");
        assert!(any.list_devices().await.unwrap().is_empty());
    }
}
