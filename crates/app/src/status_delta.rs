//! Status delta registry — most recent status items per (device, source).
//!
//! Used to notice two accounts reporting different values for the same code
//! at nearly the same time.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde_json::Value;

use fusehub_domain::account::AccountSource;
use fusehub_domain::envelope::ResolvedStatus;
use fusehub_domain::event::StatusConflict;
use fusehub_domain::id::DeviceId;
use fusehub_domain::time::{Timestamp, within};

/// The last batch of status values one source reported for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusDelta {
    pub values: BTreeMap<String, Value>,
    pub received_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct StatusDeltaRegistry {
    window: Duration,
    entries: HashMap<(DeviceId, AccountSource), StatusDelta>,
}

impl StatusDeltaRegistry {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// Record `items` as the latest delta of `source` for `device_id`.
    ///
    /// Returns one conflict per code on which another source reported a
    /// different value within the conflict window.
    pub fn register(
        &mut self,
        device_id: &DeviceId,
        source: AccountSource,
        items: &[ResolvedStatus],
        received_at: Timestamp,
    ) -> Vec<StatusConflict> {
        let mut conflicts = Vec::new();

        for other_source in AccountSource::ALL.into_iter().filter(|s| *s != source) {
            let Some(other) = self.entries.get(&(device_id.clone(), other_source)) else {
                continue;
            };
            if !within(received_at, other.received_at, self.window) {
                continue;
            }
            for item in items {
                if let Some(other_value) = other.values.get(&item.code)
                    && *other_value != item.value
                {
                    conflicts.push(StatusConflict {
                        device_id: device_id.clone(),
                        code: item.code.clone(),
                        source,
                        value: item.value.clone(),
                        other_source,
                        other_value: other_value.clone(),
                    });
                }
            }
        }

        let values = items
            .iter()
            .map(|item| (item.code.clone(), item.value.clone()))
            .collect();
        self.entries.insert(
            (device_id.clone(), source),
            StatusDelta {
                values,
                received_at,
            },
        );
        conflicts
    }

    #[must_use]
    pub fn latest(&self, device_id: &DeviceId, source: AccountSource) -> Option<&StatusDelta> {
        self.entries.get(&(device_id.clone(), source))
    }

    /// Drop every delta recorded for `source`.
    pub fn forget_source(&mut self, source: AccountSource) {
        self.entries.retain(|(_, s), _| *s != source);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
