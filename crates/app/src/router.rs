//! Inbound message router — attributes envelopes to devices and applies
//! them to the account stores.
//!
//! For every envelope the router extracts the device id, completes each
//! status tuple's identity against the stores holding the device, records
//! the tuples in the status delta registry and writes the resulting values
//! into the stores. Messages without a device id are dropped, tuples that
//! cannot be resolved are skipped; neither is an error.

use std::collections::HashMap;

use fusehub_domain::account::AccountSource;
use fusehub_domain::envelope::{Envelope, Protocol, ResolvedStatus};
use fusehub_domain::event::StatusConflict;
use fusehub_domain::id::DeviceId;
use fusehub_domain::resolver::resolve_status_item;
use fusehub_domain::time::Timestamp;

use crate::status_delta::StatusDeltaRegistry;
use crate::store::AccountStore;
use crate::watcher::DeviceWatcher;

/// Why an envelope was not routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Neither `data.devId` nor `data.bizData.devId` was present.
    MissingDeviceId,
}

/// An envelope applied to the stores.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedMessage {
    pub source: AccountSource,
    pub device_id: DeviceId,
    pub resolved: Vec<ResolvedStatus>,
    /// Number of status tuples that could not be resolved.
    pub unresolved: usize,
    pub conflicts: Vec<StatusConflict>,
    /// The envelope with its device id annotated and its status list resolved.
    pub envelope: Envelope,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Routed(Box<RoutedMessage>),
    Dropped(DropReason),
}

impl RouteOutcome {
    #[must_use]
    pub fn is_routed(&self) -> bool {
        matches!(self, Self::Routed(_))
    }

    #[must_use]
    pub fn routed(&self) -> Option<&RoutedMessage> {
        match self {
            Self::Routed(message) => Some(message),
            Self::Dropped(_) => None,
        }
    }
}

/// Stateless router; all mutable state is passed in by the caller.
#[derive(Debug, Clone, Default)]
pub struct InboundRouter {
    priority: Vec<AccountSource>,
    watcher: DeviceWatcher,
}

impl InboundRouter {
    /// `priority` is the order stores are consulted when resolving tuples.
    #[must_use]
    pub fn new(priority: impl Into<Vec<AccountSource>>, watcher: DeviceWatcher) -> Self {
        Self {
            priority: priority.into(),
            watcher,
        }
    }

    /// Apply one envelope received on `source`'s connection.
    pub fn route(
        &self,
        source: AccountSource,
        mut envelope: Envelope,
        stores: &mut HashMap<AccountSource, AccountStore>,
        deltas: &mut StatusDeltaRegistry,
        received_at: Timestamp,
    ) -> RouteOutcome {
        let Some(device_id) = envelope.device_id() else {
            tracing::warn!(
                source = %source,
                protocol = envelope.protocol,
                "dropping message without device id"
            );
            return RouteOutcome::Dropped(DropReason::MissingDeviceId);
        };
        envelope.annotate_device_id(&device_id);
        self.watcher.observe_message(source, &device_id, &envelope);

        let mut resolved = Vec::new();
        let mut unresolved = 0;
        let mut conflicts = Vec::new();

        if let Some(items) = envelope.status_items() {
            let holders: Vec<_> = self
                .priority
                .iter()
                .filter_map(|s| stores.get(s))
                .filter_map(|store| store.get(&device_id))
                .collect();
            for item in &items {
                match resolve_status_item(item, holders.iter().copied()) {
                    Some(status) => resolved.push(status),
                    None => {
                        unresolved += 1;
                        tracing::warn!(
                            device_id = %device_id,
                            source = %source,
                            item = ?item,
                            "could not resolve status item"
                        );
                    }
                }
            }
            envelope.set_status_items(&resolved);
            self.watcher.observe_status(source, &device_id, &resolved);

            conflicts = deltas.register(&device_id, source, &resolved, received_at);
            for conflict in &conflicts {
                tracing::warn!(
                    device_id = %device_id,
                    code = %conflict.code,
                    source = %conflict.source,
                    value = %conflict.value,
                    other_source = %conflict.other_source,
                    other_value = %conflict.other_value,
                    "conflicting status update"
                );
            }

            for_each_holder(stores, source, &device_id, |store| {
                store.apply_status(
                    &device_id,
                    resolved.iter().map(|s| (s.code.as_str(), &s.value)),
                );
            });
        } else if envelope.kind() == Protocol::Other {
            apply_biz_event(&envelope, stores, source, &device_id);
        }

        if let Some(store) = stores.get_mut(&source) {
            store.observe(&device_id);
        }

        RouteOutcome::Routed(Box::new(RoutedMessage {
            source,
            device_id,
            resolved,
            unresolved,
            conflicts,
            envelope,
        }))
    }
}

/// Run `apply` on the store of `source` and on every other store already
/// holding the device.
fn for_each_holder(
    stores: &mut HashMap<AccountSource, AccountStore>,
    source: AccountSource,
    device_id: &DeviceId,
    mut apply: impl FnMut(&mut AccountStore),
) {
    for store in stores.values_mut() {
        if store.source() == source || store.contains(device_id) {
            apply(store);
        }
    }
}

fn apply_biz_event(
    envelope: &Envelope,
    stores: &mut HashMap<AccountSource, AccountStore>,
    source: AccountSource,
    device_id: &DeviceId,
) {
    match envelope.biz_code() {
        Some("online") => {
            for_each_holder(stores, source, device_id, |s| s.set_online(device_id, true));
        }
        Some("offline") => {
            for_each_holder(stores, source, device_id, |s| s.set_online(device_id, false));
        }
        Some("nameUpdate") => {
            let name = envelope
                .biz_data()
                .and_then(|biz| biz.get("name"))
                .and_then(serde_json::Value::as_str);
            if let Some(name) = name {
                for_each_holder(stores, source, device_id, |s| s.rename(device_id, name));
            }
        }
        other => {
            tracing::debug!(device_id = %device_id, biz_code = ?other, "ignoring biz event");
        }
    }
}
