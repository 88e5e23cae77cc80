//! Per-account device store.
//!
//! One store per backend account (plus the push account's upstream store),
//! mapping device id to that account's own record. Records are created
//! lazily, mutated in place, and only ever removed wholesale with
//! [`AccountStore::clear`] when the account is torn down.

use std::collections::BTreeMap;

use serde_json::Value;

use fusehub_domain::account::AccountSource;
use fusehub_domain::device::{DeviceRecord, merge_properties};
use fusehub_domain::id::DeviceId;

/// One account's device map.
#[derive(Debug, Clone)]
pub struct AccountStore {
    source: AccountSource,
    devices: BTreeMap<DeviceId, DeviceRecord>,
}

impl AccountStore {
    #[must_use]
    pub fn new(source: AccountSource) -> Self {
        Self {
            source,
            devices: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn source(&self) -> AccountSource {
        self.source
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    #[must_use]
    pub fn contains(&self, device_id: &DeviceId) -> bool {
        self.devices.contains_key(device_id)
    }

    #[must_use]
    pub fn get(&self, device_id: &DeviceId) -> Option<&DeviceRecord> {
        self.devices.get(device_id)
    }

    pub fn get_mut(&mut self, device_id: &DeviceId) -> Option<&mut DeviceRecord> {
        self.devices.get_mut(device_id)
    }

    /// Records in ascending device id order.
    pub fn records(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    pub(crate) fn records_mut(&mut self) -> impl Iterator<Item = &mut DeviceRecord> {
        self.devices.values_mut()
    }

    /// Insert or replace one record.
    pub fn insert(&mut self, record: DeviceRecord) {
        self.devices.insert(record.id().clone(), record);
    }

    /// Fold a fresh listing into the store.
    ///
    /// Listed values win; keys only the previous record knew are kept.
    /// Devices missing from the listing are left in place.
    pub fn replace_from_listing(&mut self, records: Vec<DeviceRecord>) {
        for mut record in records {
            if let Some(previous) = self.devices.get(record.id()) {
                merge_properties(&mut record, previous);
            }
            self.insert(record);
        }
    }

    /// Record for `device_id`, created with defaults on first observation.
    pub fn observe(&mut self, device_id: &DeviceId) -> &mut DeviceRecord {
        self.devices
            .entry(device_id.clone())
            .or_insert_with(|| DeviceRecord::observed(device_id.clone()))
    }

    /// Write status values, overwriting previous values for the same codes.
    pub fn apply_status<'a>(
        &mut self,
        device_id: &DeviceId,
        values: impl IntoIterator<Item = (&'a str, &'a Value)>,
    ) {
        let record = self.observe(device_id);
        for (code, value) in values {
            record.status.insert(code.to_string(), value.clone());
        }
    }

    pub fn set_online(&mut self, device_id: &DeviceId, online: bool) {
        self.observe(device_id).online = online;
    }

    pub fn rename(&mut self, device_id: &DeviceId, name: impl Into<String>) {
        self.observe(device_id).name = name.into();
    }

    /// Drop every record. Used when the account session ends.
    pub fn clear(&mut self) {
        self.devices.clear();
    }
}
