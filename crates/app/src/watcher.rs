//! Device watcher — verbose logging for operator-selected devices.

use std::collections::HashSet;

use fusehub_domain::account::AccountSource;
use fusehub_domain::envelope::{Envelope, ResolvedStatus};
use fusehub_domain::id::DeviceId;

/// Logs every message and status list routed for the watched devices at
/// `warn` level, so they show up under the default filter.
#[derive(Debug, Clone, Default)]
pub struct DeviceWatcher {
    watched: HashSet<DeviceId>,
}

impl DeviceWatcher {
    #[must_use]
    pub fn new(watched: impl IntoIterator<Item = DeviceId>) -> Self {
        Self {
            watched: watched.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn is_watched(&self, device_id: &DeviceId) -> bool {
        self.watched.contains(device_id)
    }

    pub fn observe_message(&self, source: AccountSource, device_id: &DeviceId, envelope: &Envelope) {
        if self.is_watched(device_id) {
            tracing::warn!(
                device_id = %device_id,
                source = %source,
                protocol = envelope.protocol,
                data = %serde_json::Value::Object(envelope.data.clone()),
                "watched device message"
            );
        }
    }

    pub fn observe_status(&self, source: AccountSource, device_id: &DeviceId, status: &[ResolvedStatus]) {
        if self.is_watched(device_id) {
            tracing::warn!(
                device_id = %device_id,
                source = %source,
                status = ?status,
                "watched device status"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_only_watch_configured_devices() {
        let watcher = DeviceWatcher::new([DeviceId::new("a")]);
        assert!(watcher.is_watched(&DeviceId::new("a")));
        assert!(!watcher.is_watched(&DeviceId::new("b")));
    }

    #[test]
    fn should_watch_nothing_by_default() {
        assert!(!DeviceWatcher::default().is_watched(&DeviceId::new("a")));
    }
}
