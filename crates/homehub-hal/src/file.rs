//! File-backed HAL.
//!
//! Each device is mapped to a path: a character device node exposed by a
//! driver, or a plain file when running without one. A read returns the
//! whole file trimmed, a write replaces the file content with `on` or `off`.

use crate::{HalError, Result, traits::DeviceHal};
use homehub_core::{DeviceId, DeviceKind, DeviceState, StateValue, SwitchState};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// ENODEV, returned by drivers whose device has gone away.
const ENODEV: i32 = 19;

/// One device entry of a [`FileHal`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileDeviceConfig {
    /// Device identifier.
    pub id: DeviceId,
    /// Declared kind (`light`, `socket`, `sensor_temp`, ...).
    pub kind: DeviceKind,
    /// Device node or file holding the device value.
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
struct FileDevice {
    kind: DeviceKind,
    path: PathBuf,
}

/// HAL reading and writing device values through the filesystem.
#[derive(Debug)]
pub struct FileHal {
    devices: BTreeMap<DeviceId, FileDevice>,
}

impl FileHal {
    /// Build a file HAL from its device table.
    ///
    /// # Errors
    ///
    /// Returns `HalError::Misconfigured` if two entries share an id.
    pub fn new(entries: impl IntoIterator<Item = FileDeviceConfig>) -> Result<Self> {
        let mut devices = BTreeMap::new();
        for entry in entries {
            let device = FileDevice {
                kind: entry.kind,
                path: entry.path,
            };
            if devices.insert(entry.id.clone(), device).is_some() {
                return Err(HalError::misconfigured(format!(
                    "duplicate device id {}",
                    entry.id
                )));
            }
        }
        Ok(Self { devices })
    }

    /// Check that every configured node exists and is writable where needed.
    ///
    /// Problems are logged as warnings and returned; they never fail startup,
    /// a driver may be loaded later.
    pub async fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (id, device) in &self.devices {
            match tokio::fs::metadata(&device.path).await {
                Err(e) => {
                    problems.push(format!("{id}: {} is not accessible: {e}", device.path.display()));
                }
                Ok(meta) if device.kind.is_writable() && meta.permissions().readonly() => {
                    problems.push(format!("{id}: {} is read-only", device.path.display()));
                }
                Ok(_) => {}
            }
        }

        for problem in &problems {
            warn!(problem = %problem, "Device node check failed");
        }
        if problems.is_empty() {
            info!(devices = self.devices.len(), "All device nodes present");
        }
        problems
    }

    fn device(&self, id: &DeviceId) -> Result<&FileDevice> {
        self.devices
            .get(id)
            .ok_or_else(|| HalError::not_found(id.as_str()))
    }
}

/// Map filesystem errors onto the HAL taxonomy.
fn map_io_error(err: io::Error, path: &Path) -> HalError {
    match err.kind() {
        io::ErrorKind::NotFound => {
            HalError::misconfigured(format!("{} does not exist", path.display()))
        }
        io::ErrorKind::PermissionDenied => {
            HalError::misconfigured(format!("permission denied on {}", path.display()))
        }
        _ if err.raw_os_error() == Some(ENODEV) => {
            HalError::misconfigured(format!("no device behind {}", path.display()))
        }
        _ => HalError::Io(err),
    }
}

impl DeviceHal for FileHal {
    async fn list_devices(&self) -> Result<BTreeMap<DeviceId, DeviceKind>> {
        Ok(self
            .devices
            .iter()
            .map(|(id, device)| (id.clone(), device.kind))
            .collect())
    }

    async fn read_device(&self, id: &DeviceId) -> Result<DeviceState> {
        let device = self.device(id)?;
        let raw = tokio::fs::read_to_string(&device.path)
            .await
            .map_err(|e| map_io_error(e, &device.path))?;
        let text = raw.trim();

        let value = match device.kind {
            DeviceKind::TempSensor => match text.parse::<f64>() {
                Ok(n) => StateValue::Number(n),
                Err(_) => {
                    warn!(device_id = %id, raw = %text, "Sensor value is not numeric");
                    StateValue::from(text)
                }
            },
            _ => StateValue::from(text),
        };
        debug!(device_id = %id, value = %value, "Read device");
        Ok(DeviceState::new(value))
    }

    async fn write_device(&self, id: &DeviceId, value: &StateValue) -> Result<bool> {
        let device = self.device(id)?;
        if !device.kind.is_switch() {
            debug!(device_id = %id, kind = %device.kind, "Device does not accept writes");
            return Ok(false);
        }

        let text = match SwitchState::from_value(value) {
            Ok(state) => state.as_str(),
            Err(_) => {
                debug!(device_id = %id, value = %value, "Declined invalid switch value");
                return Ok(false);
            }
        };

        tokio::fs::write(&device.path, text)
            .await
            .map_err(|e| map_io_error(e, &device.path))?;
        debug!(device_id = %id, value = text, "Wrote device");
        Ok(true)
    }

    fn backend_name(&self) -> &str {
        "file"
    }
}
