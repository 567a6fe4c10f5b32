//! Device registry.
//!
//! The registry is built once from the HAL listing and never changes
//! afterwards, so lookups need no locking. Callers only ever receive copies.

use homehub_core::{DeviceDescriptor, DeviceId, DeviceKind};
use std::collections::BTreeMap;

/// Fixed mapping of known device ids to their descriptors.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    devices: BTreeMap<DeviceId, DeviceDescriptor>,
}

impl Registry {
    /// Registry with no devices, used when the HAL listing fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry from a HAL listing.
    pub fn from_listing(listing: BTreeMap<DeviceId, DeviceKind>) -> Self {
        let devices = listing
            .into_iter()
            .map(|(id, kind)| (id.clone(), DeviceDescriptor::new(id, kind)))
            .collect();
        Self { devices }
    }

    /// Look up a device by id.
    pub fn get(&self, id: &str) -> Option<&DeviceDescriptor> {
        self.devices.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterate descriptors in id order.
    pub fn descriptors(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.devices.values()
    }

    /// Copy of the id to kind mapping.
    pub fn kinds(&self) -> BTreeMap<DeviceId, DeviceKind> {
        self.devices
            .iter()
            .map(|(id, descriptor)| (id.clone(), descriptor.kind))
            .collect()
    }
}
