//! Device coordinator.
//!
//! [`DeviceCoordinator`] is the only component allowed to call the HAL. It
//! checks ids against the [`Registry`], applies the per-kind write policy,
//! passes every HAL call through the [`AccessGate`] and classifies failures.
//!
//! Each HAL call runs in its own task that owns the gate permit, so the slot
//! is only freed once the HAL has returned. A caller that gives up early,
//! through the optional call timeout or by being dropped, stops waiting but
//! cannot let a further call into the HAL.
//!
//! ```text
//!  command server ─┐
//!  console ────────┤                 ┌──────────┐   ┌─────┐
//!  poller ─────────┼──► Coordinator ─► Gate (N) ├──►│ HAL │
//!  scheduler ──────┘                 └──────────┘   └─────┘
//! ```
//!
//! # Examples
//!
//! ```
//! use homehub_coordinator::{CoordinatorConfig, DeviceCoordinator, ShutdownSignal};
//! use homehub_hal::MockHal;
//!
//! #[tokio::main]
//! async fn main() -> homehub_coordinator::Result<()> {
//!     let (hal, _handle) = MockHal::new();
//!     let coordinator =
//!         DeviceCoordinator::new(hal, CoordinatorConfig::default(), ShutdownSignal::new()).await?;
//!
//!     assert!(coordinator.set_state("light_livingroom", "ON".into()).await?.succeeded());
//!     let state = coordinator.get_state("light_livingroom").await?;
//!     assert_eq!(state.value.as_text(), Some("on"));
//!     Ok(())
//! }
//! ```

use crate::error::{CoordinatorError, ErrorKind, Result};
use crate::gate::AccessGate;
use crate::registry::Registry;
use crate::signal::ShutdownSignal;
use homehub_core::constants::DEFAULT_GATE_CAPACITY;
use homehub_core::{DeviceId, DeviceKind, DeviceState, StateValue, SwitchState};
use homehub_hal::{DeviceHal, HalError};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Coordinator construction parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Maximum number of HAL calls in flight.
    pub gate_capacity: usize,
    /// How long a caller waits for a single HAL call; `None` waits as long as
    /// the HAL does. An abandoned call keeps its gate slot until it returns.
    pub hal_timeout: Option<Duration>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            gate_capacity: DEFAULT_GATE_CAPACITY,
            hal_timeout: None,
        }
    }
}

/// Result of a write request that reached the write policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The HAL applied the value.
    Applied,
    /// The HAL was reached but refused the value.
    Declined,
    /// The device kind does not accept writes; the HAL was not called.
    Unsupported { kind: DeviceKind },
}

impl WriteOutcome {
    /// Whether the value was written.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Applied)
    }

    /// Error classification to report alongside a `false` result.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Unsupported { .. } => Some(ErrorKind::UnsupportedOperation),
            Self::Applied | Self::Declined => None,
        }
    }
}

/// Serializes access to a HAL and exposes the device operations.
#[derive(Debug)]
pub struct DeviceCoordinator<H> {
    hal: Arc<H>,
    registry: Registry,
    gate: AccessGate,
    hal_timeout: Option<Duration>,
}

impl<H: DeviceHal> DeviceCoordinator<H> {
    /// Build the coordinator and load the registry from the HAL.
    ///
    /// A failing HAL listing leaves the registry empty; the coordinator is
    /// still usable and reports every id as unknown.
    ///
    /// # Errors
    ///
    /// Returns `CoordinatorError::Config` if the gate capacity is invalid.
    pub async fn new(hal: H, config: CoordinatorConfig, shutdown: ShutdownSignal) -> Result<Self> {
        let gate = AccessGate::new(config.gate_capacity, shutdown)?;
        let mut coordinator = Self {
            hal: Arc::new(hal),
            registry: Registry::empty(),
            gate,
            hal_timeout: config.hal_timeout,
        };

        let listing = coordinator
            .guarded("*", |hal| async move { hal.list_devices().await })
            .await;
        match listing {
            Ok(listing) => coordinator.registry = Registry::from_listing(listing),
            Err(e) => warn!(error = %e, "Device listing failed, starting with an empty registry"),
        }

        info!(
            backend = coordinator.hal.backend_name(),
            devices = coordinator.registry.len(),
            gate_capacity = coordinator.gate.capacity(),
            "Device coordinator ready"
        );
        Ok(coordinator)
    }

    /// Read the current state of a device.
    ///
    /// # Errors
    ///
    /// - `UnknownDevice` if the id is not registered (no HAL call is made)
    /// - `ShuttingDown` if shutdown was requested while waiting for the gate
    /// - `DeviceUnavailable` for HAL failures and calls past the timeout
    /// - `Internal` for anything else, including a panicking HAL call
    pub async fn get_state(&self, id: &str) -> Result<DeviceState> {
        let target = self.lookup(id)?.id.clone();
        let state = self
            .guarded(id, move |hal| async move { hal.read_device(&target).await })
            .await?;
        debug!(device_id = %id, value = %state.value, "Read device state");
        Ok(state)
    }

    /// Write a value to a device, applying the write policy of its kind.
    ///
    /// Sensors are never written: the call returns
    /// `Ok(WriteOutcome::Unsupported { .. })` without touching the HAL.
    /// Switch values are normalized to `on`/`off` before the HAL sees them.
    ///
    /// # Errors
    ///
    /// - `UnknownDevice` if the id is not registered
    /// - `InvalidValue` if a switch value cannot be normalized (no HAL call)
    /// - `ShuttingDown`, `DeviceUnavailable`, `Internal` as for reads
    pub async fn set_state(&self, id: &str, value: StateValue) -> Result<WriteOutcome> {
        let descriptor = self.lookup(id)?;
        let kind = descriptor.kind;

        if !kind.is_writable() {
            debug!(device_id = %id, kind = %kind, "Refused write to read-only device");
            return Ok(WriteOutcome::Unsupported { kind });
        }
        let value = if kind.is_switch() {
            SwitchState::from_value(&value)
                .map(StateValue::from)
                .map_err(|_| CoordinatorError::InvalidValue {
                    device: id.to_string(),
                    value: value.to_string(),
                })?
        } else {
            warn!(device_id = %id, kind = %kind, value = %value, "Writing unvalidated value");
            value
        };

        let target = descriptor.id.clone();
        let payload = value.clone();
        let accepted = self
            .guarded(id, move |hal| async move { hal.write_device(&target, &payload).await })
            .await?;
        if accepted {
            info!(device_id = %id, value = %value, "Device state set");
            Ok(WriteOutcome::Applied)
        } else {
            warn!(device_id = %id, value = %value, "HAL declined write");
            Ok(WriteOutcome::Declined)
        }
    }

    /// Read every registered device, one after the other.
    ///
    /// Each entry carries its own outcome; one failing device does not affect
    /// the others. Values are not a consistent snapshot across devices.
    pub async fn get_all_states(&self) -> BTreeMap<DeviceId, Result<DeviceState>> {
        let mut states = BTreeMap::new();
        for descriptor in self.registry.descriptors() {
            let outcome = self.get_state(descriptor.id.as_str()).await;
            states.insert(descriptor.id.clone(), outcome);
        }
        states
    }

    /// Copy of the registry as id to kind.
    pub fn list_devices(&self) -> BTreeMap<DeviceId, DeviceKind> {
        self.registry.kinds()
    }

    /// The registry loaded at construction.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The gate in front of the HAL.
    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// Name of the HAL backend.
    pub fn backend_name(&self) -> &str {
        self.hal.backend_name()
    }

    fn lookup(&self, id: &str) -> Result<&homehub_core::DeviceDescriptor> {
        self.registry
            .get(id)
            .ok_or_else(|| CoordinatorError::UnknownDevice(id.to_string()))
    }

    /// Run one HAL call in its own task, holding a gate permit until the call
    /// returns.
    async fn guarded<T, F, Fut>(&self, device: &str, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<H>) -> Fut,
        Fut: Future<Output = homehub_hal::Result<T>> + Send + 'static,
    {
        let permit = self.gate.acquire().await?;
        let work = call(Arc::clone(&self.hal));
        let task = tokio::spawn(async move {
            let result = work.await;
            drop(permit);
            result
        });

        let joined = match self.hal_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    debug!(device_id = %device, "Abandoned HAL call still holds its gate slot");
                    Ok(Err(HalError::timeout(homehub_core::duration_ms(limit))))
                }
            },
            None => task.await,
        };
        let result = joined.unwrap_or_else(|e| Err(HalError::other(format!("HAL call aborted: {e}"))));
        result.map_err(|e| {
            let err = CoordinatorError::from_hal(device, e);
            warn!(device_id = %device, kind = %err.kind(), error = %err, "HAL call failed");
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homehub_hal::{MockFault, MockHal, MockHalHandle};
    use rstest::rstest;

    async fn setup() -> (DeviceCoordinator<MockHal>, MockHalHandle) {
        let (hal, handle) = MockHal::new();
        let coordinator = DeviceCoordinator::new(hal, CoordinatorConfig::default(), ShutdownSignal::new())
            .await
            .unwrap();
        (coordinator, handle)
    }

    #[tokio::test]
    async fn test_registry_loaded_through_gate() {
        let (coordinator, handle) = setup().await;
        assert_eq!(coordinator.list_devices().len(), 4);
        assert_eq!(handle.stats().lists, 1);
        assert_eq!(coordinator.backend_name(), "mock");
    }

    #[tokio::test]
    async fn test_listing_failure_gives_empty_registry() {
        let (hal, handle) = MockHal::new();
        handle.fail_listing(true);
        let coordinator = DeviceCoordinator::new(hal, CoordinatorConfig::default(), ShutdownSignal::new())
            .await
            .unwrap();

        assert!(coordinator.list_devices().is_empty());
        assert!(matches!(
            coordinator.get_state("light_livingroom").await,
            Err(CoordinatorError::UnknownDevice(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_capacity_is_fatal() {
        let (hal, _handle) = MockHal::new();
        let config = CoordinatorConfig {
            gate_capacity: 0,
            hal_timeout: None,
        };
        let result = DeviceCoordinator::new(hal, config, ShutdownSignal::new()).await;
        assert!(matches!(result, Err(CoordinatorError::Config(_))));
    }

    #[rstest]
    #[case::one("1")]
    #[case::upper("ON")]
    #[case::word("true")]
    #[tokio::test]
    async fn test_switch_values_normalized(#[case] raw: &str) {
        let (coordinator, handle) = setup().await;
        let outcome = coordinator
            .set_state("socket_kitchen", raw.into())
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::Applied);
        let id = DeviceId::new("socket_kitchen").unwrap();
        assert_eq!(handle.value(&id), Some(StateValue::from("on")));
    }

    #[tokio::test]
    async fn test_invalid_switch_value_skips_hal() {
        let (coordinator, handle) = setup().await;
        let result = coordinator.set_state("light_bedroom", "dim".into()).await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidValue);
        assert_eq!(handle.stats().writes, 0);
    }

    #[tokio::test]
    async fn test_sensor_write_unsupported() {
        let (coordinator, handle) = setup().await;
        let outcome = coordinator
            .set_state("sensor_temp_main", "30".into())
            .await
            .unwrap();

        assert!(!outcome.succeeded());
        assert_eq!(outcome.error_kind(), Some(ErrorKind::UnsupportedOperation));
        assert_eq!(handle.stats().writes, 0);
    }

    #[tokio::test]
    async fn test_unavailable_device_classified() {
        let (coordinator, handle) = setup().await;
        handle.inject_fault(
            &DeviceId::new("light_bedroom").unwrap(),
            MockFault::Unavailable,
        );

        let err = coordinator.get_state("light_bedroom").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
        assert_eq!(coordinator.gate().available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hal_timeout_reports_unavailable() {
        let (hal, handle) = MockHal::new();
        let config = CoordinatorConfig {
            gate_capacity: 1,
            hal_timeout: Some(Duration::from_millis(100)),
        };
        let coordinator = DeviceCoordinator::new(hal, config, ShutdownSignal::new())
            .await
            .unwrap();
        handle.set_latency(Duration::from_secs(10));

        let err = coordinator.get_state("light_livingroom").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
        // The abandoned read still occupies the gate until the HAL returns.
        assert_eq!(coordinator.gate().available(), 0);

        tokio::time::sleep(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;
        assert_eq!(coordinator.gate().available(), 1);
    }

    #[tokio::test]
    async fn test_get_all_states_isolates_failures() {
        let (coordinator, handle) = setup().await;
        handle.inject_fault(
            &DeviceId::new("socket_kitchen").unwrap(),
            MockFault::Internal,
        );

        let states = coordinator.get_all_states().await;
        assert_eq!(states.len(), 4);
        assert!(states["light_livingroom"].is_ok());
        assert_eq!(
            states["socket_kitchen"].as_ref().unwrap_err().kind(),
            ErrorKind::Internal
        );
    }
}
