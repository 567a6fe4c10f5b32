//! Mock HAL implementation for testing and development.
//!
//! This module provides an in-memory HAL that simulates a handful of home
//! devices. Tests and demos can inject faults, add latency and inspect call
//! statistics through a [`MockHalHandle`].

use crate::{HalError, Result, traits::DeviceHal};
use chrono::{DateTime, Utc};
use homehub_core::constants::{MOCK_TEMP_MAX, MOCK_TEMP_MIN, SWITCH_OFF, SWITCH_ON};
use homehub_core::{DeviceId, DeviceKind, DeviceState, StateValue};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Drift applied to numeric sensors on successive reads, in degrees.
const SENSOR_DRIFT_STEPS: [f64; 6] = [0.1, -0.2, 0.2, 0.0, -0.1, 0.1];

/// Failure to inject into calls against one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFault {
    /// Behave as if the device did not exist.
    NotFound,
    /// Behave as if the device were unplugged.
    Unavailable,
    /// Fail with an unexpected error.
    Internal,
}

impl MockFault {
    fn to_error(self, id: &DeviceId) -> HalError {
        match self {
            Self::NotFound => HalError::not_found(id.as_str()),
            Self::Unavailable => HalError::disconnected(id.as_str()),
            Self::Internal => HalError::other(format!("injected fault on {id}")),
        }
    }
}

/// Call counters collected by the mock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockHalStats {
    /// Number of `list_devices` calls.
    pub lists: usize,
    /// Number of `read_device` calls.
    pub reads: usize,
    /// Number of `write_device` calls.
    pub writes: usize,
    /// Calls currently executing.
    pub in_flight: usize,
    /// Highest number of calls ever executing at the same time.
    pub peak_in_flight: usize,
}

#[derive(Debug, Clone)]
struct MockDevice {
    kind: DeviceKind,
    value: StateValue,
    last_updated: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MockState {
    devices: BTreeMap<DeviceId, MockDevice>,
    faults: HashMap<DeviceId, MockFault>,
    fail_listing: bool,
    latency: Duration,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockState>,
    lists: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    drift_step: AtomicUsize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tracks one executing call for the concurrency statistics.
struct InFlight<'a> {
    shared: &'a Shared,
}

impl<'a> InFlight<'a> {
    fn enter(shared: &'a Shared) -> Self {
        let now = shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        shared.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self { shared }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory HAL simulating lights, sockets and a temperature sensor.
///
/// # Examples
///
/// ```
/// use homehub_hal::mock::{MockFault, MockHal};
/// use homehub_hal::traits::DeviceHal;
/// use homehub_core::DeviceId;
///
/// #[tokio::main]
/// async fn main() {
///     let (hal, handle) = MockHal::new();
///     let id = DeviceId::new("socket_kitchen").unwrap();
///
///     handle.inject_fault(&id, MockFault::Unavailable);
///     assert!(hal.read_device(&id).await.is_err());
///
///     handle.clear_fault(&id);
///     assert!(hal.read_device(&id).await.is_ok());
///     assert_eq!(handle.stats().reads, 2);
/// }
/// ```
#[derive(Debug)]
pub struct MockHal {
    shared: Arc<Shared>,
}

impl MockHal {
    /// Create a mock HAL seeded with the default household devices.
    ///
    /// Returns a tuple of (MockHal, MockHalHandle) where the handle can be
    /// used to drive and observe the mock.
    pub fn new() -> (Self, MockHalHandle) {
        Self::with_devices(default_devices())
    }

    /// Create a mock HAL with an explicit device table.
    ///
    /// Lights and sockets start `off`, temperature sensors at 22.5, anything
    /// else with an empty text value.
    ///
    /// # Examples
    ///
    /// ```
    /// use homehub_hal::mock::MockHal;
    /// use homehub_core::{DeviceId, DeviceKind};
    ///
    /// let (hal, handle) = MockHal::with_devices([
    ///     (DeviceId::new("light1").unwrap(), DeviceKind::Light),
    ///     (DeviceId::new("temp1").unwrap(), DeviceKind::TempSensor),
    /// ]);
    /// assert_eq!(handle.device_count(), 2);
    /// ```
    pub fn with_devices(devices: impl IntoIterator<Item = (DeviceId, DeviceKind)>) -> (Self, MockHalHandle) {
        let now = Utc::now();
        let devices = devices
            .into_iter()
            .map(|(id, kind)| {
                let value = initial_value(kind);
                (
                    id,
                    MockDevice {
                        kind,
                        value,
                        last_updated: now,
                    },
                )
            })
            .collect();

        let shared = Arc::new(Shared {
            state: Mutex::new(MockState {
                devices,
                ..MockState::default()
            }),
            ..Shared::default()
        });

        let hal = Self {
            shared: Arc::clone(&shared),
        };
        (hal, MockHalHandle { shared })
    }

    /// Add a fixed delay to every call, simulating a slow bus.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.shared.lock().latency = latency;
        self
    }

    async fn simulate_latency(&self) {
        let latency = self.shared.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn next_drift(&self) -> f64 {
        let step = self.shared.drift_step.fetch_add(1, Ordering::Relaxed);
        SENSOR_DRIFT_STEPS[step % SENSOR_DRIFT_STEPS.len()]
    }
}

impl DeviceHal for MockHal {
    async fn list_devices(&self) -> Result<BTreeMap<DeviceId, DeviceKind>> {
        self.shared.lists.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.shared);
        self.simulate_latency().await;

        let state = self.shared.lock();
        if state.fail_listing {
            return Err(HalError::other("device listing unavailable"));
        }
        Ok(state
            .devices
            .iter()
            .map(|(id, device)| (id.clone(), device.kind))
            .collect())
    }

    async fn read_device(&self, id: &DeviceId) -> Result<DeviceState> {
        self.shared.reads.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.shared);
        self.simulate_latency().await;

        let drift = self.next_drift();
        let mut state = self.shared.lock();
        if let Some(fault) = state.faults.get(id) {
            return Err(fault.to_error(id));
        }
        let device = state
            .devices
            .get_mut(id)
            .ok_or_else(|| HalError::not_found(id.as_str()))?;

        if device.kind == DeviceKind::TempSensor
            && let StateValue::Number(current) = device.value
        {
            let next = ((current + drift) * 10.0).round() / 10.0;
            device.value = StateValue::Number(next.clamp(MOCK_TEMP_MIN, MOCK_TEMP_MAX));
            device.last_updated = Utc::now();
        }

        Ok(DeviceState::observed_at(
            device.value.clone(),
            device.last_updated,
        ))
    }

    async fn write_device(&self, id: &DeviceId, value: &StateValue) -> Result<bool> {
        self.shared.writes.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.shared);
        self.simulate_latency().await;

        let mut state = self.shared.lock();
        if let Some(fault) = state.faults.get(id) {
            return Err(fault.to_error(id));
        }
        let device = state
            .devices
            .get_mut(id)
            .ok_or_else(|| HalError::not_found(id.as_str()))?;

        let accepted = match device.kind {
            DeviceKind::Light | DeviceKind::Socket => {
                matches!(value.as_text(), Some(SWITCH_ON) | Some(SWITCH_OFF))
            }
            DeviceKind::TempSensor => false,
            DeviceKind::Unknown => true,
        };
        if accepted {
            device.value = value.clone();
            device.last_updated = Utc::now();
        }
        Ok(accepted)
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

/// Handle for controlling a mock HAL.
///
/// The handle shares state with the HAL it was created with, so it keeps
/// working after the HAL has been moved into a coordinator. It can be cloned
/// and shared across tasks.
#[derive(Debug, Clone)]
pub struct MockHalHandle {
    shared: Arc<Shared>,
}

impl MockHalHandle {
    /// Make every subsequent call against `id` fail with `fault`.
    pub fn inject_fault(&self, id: &DeviceId, fault: MockFault) {
        self.shared.lock().faults.insert(id.clone(), fault);
    }

    /// Remove an injected fault.
    pub fn clear_fault(&self, id: &DeviceId) {
        self.shared.lock().faults.remove(id);
    }

    /// Make `list_devices` fail (or succeed again).
    pub fn fail_listing(&self, fail: bool) {
        self.shared.lock().fail_listing = fail;
    }

    /// Change the simulated latency of every call.
    pub fn set_latency(&self, latency: Duration) {
        self.shared.lock().latency = latency;
    }

    /// Change a device value directly, as if it changed physically.
    ///
    /// Returns `false` if the device does not exist.
    pub fn set_value(&self, id: &DeviceId, value: impl Into<StateValue>) -> bool {
        let mut state = self.shared.lock();
        match state.devices.get_mut(id) {
            Some(device) => {
                device.value = value.into();
                device.last_updated = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Current stored value of a device, without counting as a read.
    pub fn value(&self, id: &DeviceId) -> Option<StateValue> {
        self.shared.lock().devices.get(id).map(|d| d.value.clone())
    }

    /// Number of simulated devices.
    pub fn device_count(&self) -> usize {
        self.shared.lock().devices.len()
    }

    /// Snapshot of the call counters.
    pub fn stats(&self) -> MockHalStats {
        MockHalStats {
            lists: self.shared.lists.load(Ordering::SeqCst),
            reads: self.shared.reads.load(Ordering::SeqCst),
            writes: self.shared.writes.load(Ordering::SeqCst),
            in_flight: self.shared.in_flight.load(Ordering::SeqCst),
            peak_in_flight: self.shared.peak_in_flight.load(Ordering::SeqCst),
        }
    }

    /// Reset call counters (the in-flight gauge is left alone).
    pub fn reset_stats(&self) {
        self.shared.lists.store(0, Ordering::SeqCst);
        self.shared.reads.store(0, Ordering::SeqCst);
        self.shared.writes.store(0, Ordering::SeqCst);
        self.shared
            .peak_in_flight
            .store(self.shared.in_flight.load(Ordering::SeqCst), Ordering::SeqCst);
    }
}

/// Devices simulated by [`MockHal::new`].
pub fn default_devices() -> Vec<(DeviceId, DeviceKind)> {
    [
        ("light_livingroom", DeviceKind::Light),
        ("light_bedroom", DeviceKind::Light),
        ("socket_kitchen", DeviceKind::Socket),
        ("sensor_temp_main", DeviceKind::TempSensor),
    ]
    .into_iter()
    .filter_map(|(id, kind)| DeviceId::new(id).ok().map(|id| (id, kind)))
    .collect()
}

fn initial_value(kind: DeviceKind) -> StateValue {
    match kind {
        DeviceKind::Light | DeviceKind::Socket => StateValue::from(SWITCH_OFF),
        DeviceKind::TempSensor => StateValue::Number(22.5),
        DeviceKind::Unknown => StateValue::from(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> DeviceId {
        DeviceId::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_mock_hal_lists_default_devices() {
        let (hal, handle) = MockHal::new();
        let devices = hal.list_devices().await.unwrap();

        assert_eq!(devices.len(), 4);
        assert_eq!(devices[&id("light_bedroom")], DeviceKind::Light);
        assert_eq!(devices[&id("sensor_temp_main")], DeviceKind::TempSensor);
        assert_eq!(handle.stats().lists, 1);
    }

    #[tokio::test]
    async fn test_mock_hal_write_then_read() {
        let (hal, _handle) = MockHal::new();
        let light = id("light_livingroom");

        assert!(hal.write_device(&light, &"on".into()).await.unwrap());
        let state = hal.read_device(&light).await.unwrap();
        assert_eq!(state.value, StateValue::from("on"));
    }

    #[tokio::test]
    async fn test_mock_hal_declines_invalid_switch_value() {
        let (hal, handle) = MockHal::new();
        let light = id("light_livingroom");

        assert!(!hal.write_device(&light, &"dim".into()).await.unwrap());
        assert_eq!(handle.value(&light), Some(StateValue::from("off")));
    }

    #[tokio::test]
    async fn test_mock_hal_declines_sensor_write() {
        let (hal, handle) = MockHal::new();
        let sensor = id("sensor_temp_main");

        assert!(!hal.write_device(&sensor, &"30".into()).await.unwrap());
        assert_eq!(handle.stats().writes, 1);
    }

    #[tokio::test]
    async fn test_mock_hal_unknown_device() {
        let (hal, _handle) = MockHal::new();
        let result = hal.read_device(&id("light_attic")).await;
        assert!(matches!(result, Err(HalError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_mock_hal_sensor_drift_stays_in_bounds() {
        let (hal, handle) = MockHal::new();
        let sensor = id("sensor_temp_main");
        handle.set_value(&sensor, MOCK_TEMP_MAX);

        for _ in 0..20 {
            let state = hal.read_device(&sensor).await.unwrap();
            let value = state.value.as_number().unwrap();
            assert!((MOCK_TEMP_MIN..=MOCK_TEMP_MAX).contains(&value));
        }
    }

    #[tokio::test]
    async fn test_mock_hal_fault_injection() {
        let (hal, handle) = MockHal::new();
        let socket = id("socket_kitchen");

        handle.inject_fault(&socket, MockFault::Unavailable);
        assert!(matches!(
            hal.read_device(&socket).await,
            Err(HalError::Disconnected { .. })
        ));

        handle.inject_fault(&socket, MockFault::NotFound);
        assert!(matches!(
            hal.write_device(&socket, &"on".into()).await,
            Err(HalError::NotFound { .. })
        ));

        handle.clear_fault(&socket);
        assert!(hal.write_device(&socket, &"on".into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_hal_listing_failure() {
        let (hal, handle) = MockHal::new();
        handle.fail_listing(true);
        assert!(hal.list_devices().await.is_err());
        handle.fail_listing(false);
        assert!(hal.list_devices().await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_hal_tracks_peak_concurrency() {
        let (hal, handle) = MockHal::new();
        let hal = Arc::new(hal.with_latency(Duration::from_millis(20)));
        let light = id("light_bedroom");

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let hal = Arc::clone(&hal);
            let light = light.clone();
            tasks.push(tokio::spawn(async move { hal.read_device(&light).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stats = handle.stats();
        assert_eq!(stats.reads, 3);
        assert_eq!(stats.in_flight, 0);
        assert!(stats.peak_in_flight >= 1);
    }

    #[test]
    fn test_mock_hal_handle_clone_shares_state() {
        let (_hal, handle) = MockHal::new();
        let clone = handle.clone();
        let light = id("light_bedroom");

        assert!(clone.set_value(&light, "on"));
        assert_eq!(handle.value(&light), Some(StateValue::from("on")));
        assert!(!clone.set_value(&id("nope"), "on"));
    }
}
