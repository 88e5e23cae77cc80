//! Aggregator — folds the per-account stores into one device view.
//!
//! Stores are visited in priority order. The first store holding a device
//! supplies its canonical record; every later store holding it contributes
//! missing keys and receives the merged superset back. A final write-back
//! pass brings the earlier stores up to date with what later stores added.

use std::collections::{BTreeMap, HashMap, btree_map};

use fusehub_domain::account::AccountSource;
use fusehub_domain::device::{DeviceRecord, merge_properties};
use fusehub_domain::id::DeviceId;

use crate::store::AccountStore;

/// The unified device view.
#[derive(Debug, Clone, Default)]
pub struct AggregatedView {
    devices: BTreeMap<DeviceId, DeviceRecord>,
    contributors: BTreeMap<DeviceId, Vec<AccountSource>>,
}

impl AggregatedView {
    #[must_use]
    pub fn get(&self, device_id: &DeviceId) -> Option<&DeviceRecord> {
        self.devices.get(device_id)
    }

    #[must_use]
    pub fn contains(&self, device_id: &DeviceId) -> bool {
        self.devices.contains_key(device_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Canonical records in ascending device id order.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    #[must_use]
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.keys().cloned().collect()
    }

    /// Sources whose stores hold `device_id`, in priority order.
    #[must_use]
    pub fn contributors(&self, device_id: &DeviceId) -> &[AccountSource] {
        self.contributors
            .get(device_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Builds [`AggregatedView`]s from a set of account stores.
#[derive(Debug, Clone)]
pub struct Aggregator {
    priority: Vec<AccountSource>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(AccountSource::ALL)
    }
}

impl Aggregator {
    /// Repeated sources keep their first position.
    #[must_use]
    pub fn new(priority: impl IntoIterator<Item = AccountSource>) -> Self {
        let mut ordered = Vec::new();
        for source in priority {
            if !ordered.contains(&source) {
                ordered.push(source);
            }
        }
        Self { priority: ordered }
    }

    #[must_use]
    pub fn priority(&self) -> &[AccountSource] {
        &self.priority
    }

    /// Rebuild the view and synchronise every contributing store.
    ///
    /// Sources without a store, and sources absent from the priority list,
    /// are skipped.
    pub fn rebuild(&self, stores: &mut HashMap<AccountSource, AccountStore>) -> AggregatedView {
        let mut view = AggregatedView::default();

        for source in &self.priority {
            let Some(store) = stores.get_mut(source) else {
                continue;
            };
            for record in store.records_mut() {
                let id = record.id().clone();
                match view.devices.entry(id.clone()) {
                    btree_map::Entry::Vacant(slot) => {
                        slot.insert(record.clone());
                    }
                    btree_map::Entry::Occupied(mut slot) => {
                        let canonical = slot.get_mut();
                        merge_properties(canonical, record);
                        merge_properties(record, canonical);
                    }
                }
                view.contributors.entry(id).or_default().push(*source);
            }
        }

        for source in &self.priority {
            let Some(store) = stores.get_mut(source) else {
                continue;
            };
            for record in store.records_mut() {
                if let Some(canonical) = view.devices.get(record.id()) {
                    merge_properties(record, canonical);
                }
            }
        }

        tracing::debug!(
            devices = view.len(),
            stores = self.priority.iter().filter(|s| stores.contains_key(s)).count(),
            "aggregated view rebuilt"
        );
        view
    }
}
