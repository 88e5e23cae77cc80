//! Runtime options for [`DeviceHub`](crate::hub::DeviceHub).

use std::time::Duration;

use fusehub_domain::account::AccountSource;
use fusehub_domain::id::DeviceId;

/// Tunables of the aggregation and dispatch engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubOptions {
    /// Order in which account stores are folded into the aggregated view.
    pub priority: Vec<AccountSource>,
    /// Upper bound for a single backend command batch.
    pub dispatch_timeout: Duration,
    /// Two sources disagreeing on a status code within this window is a conflict.
    pub conflict_window: Duration,
    /// Devices whose traffic is logged verbosely.
    pub watched_devices: Vec<DeviceId>,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            priority: AccountSource::ALL.to_vec(),
            dispatch_timeout: Duration::from_secs(10),
            conflict_window: Duration::from_secs(2),
            watched_devices: Vec::new(),
        }
    }
}

impl HubOptions {
    #[must_use]
    pub fn with_priority(mut self, priority: impl Into<Vec<AccountSource>>) -> Self {
        self.priority = priority.into();
        self
    }

    #[must_use]
    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_conflict_window(mut self, window: Duration) -> Self {
        self.conflict_window = window;
        self
    }

    #[must_use]
    pub fn with_watched_device(mut self, device_id: impl Into<DeviceId>) -> Self {
        self.watched_devices.push(device_id.into());
        self
    }
}
