//! Backend port — one backend account as seen by the hub.
//!
//! Each account (push or API) is a separate implementation. The hub never
//! knows how listing or command calls reach the remote service; it only
//! decides *which* account gets *which* call.

use std::future::Future;

use fusehub_domain::command::{Command, PropertyUpdate};
use fusehub_domain::device::DeviceRecord;
use fusehub_domain::envelope::Envelope;
use fusehub_domain::error::FuseHubError;
use fusehub_domain::id::DeviceId;

/// A backend account connection.
pub trait DeviceBackend: Send + Sync {
    /// Every device this account currently knows about.
    fn list_devices(&self) -> impl Future<Output = Result<Vec<DeviceRecord>, FuseHubError>> + Send;

    /// Devices owned by an upstream integration this account overrides.
    ///
    /// `None` means the account has no upstream store. Only the push account
    /// is expected to return one.
    fn list_upstream_devices(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<DeviceRecord>>, FuseHubError>> + Send {
        async { Ok(None) }
    }

    /// Listener hook called with every envelope routed to this account,
    /// after the hub has updated its stores.
    fn on_message(&self, _envelope: &Envelope) {}

    /// Send `{code, value}` commands to a device.
    fn send_native_command(
        &self,
        device_id: DeviceId,
        commands: Vec<Command>,
    ) -> impl Future<Output = Result<(), FuseHubError>> + Send;

    /// Send property updates keyed by data-point id to a device.
    fn send_property_update(
        &self,
        device_id: DeviceId,
        properties: Vec<PropertyUpdate>,
    ) -> impl Future<Output = Result<(), FuseHubError>> + Send;
}

impl<T: DeviceBackend> DeviceBackend for std::sync::Arc<T> {
    fn list_devices(&self) -> impl Future<Output = Result<Vec<DeviceRecord>, FuseHubError>> + Send {
        (**self).list_devices()
    }

    fn list_upstream_devices(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<DeviceRecord>>, FuseHubError>> + Send {
        (**self).list_upstream_devices()
    }

    fn on_message(&self, envelope: &Envelope) {
        (**self).on_message(envelope);
    }

    fn send_native_command(
        &self,
        device_id: DeviceId,
        commands: Vec<Command>,
    ) -> impl Future<Output = Result<(), FuseHubError>> + Send {
        (**self).send_native_command(device_id, commands)
    }

    fn send_property_update(
        &self,
        device_id: DeviceId,
        properties: Vec<PropertyUpdate>,
    ) -> impl Future<Output = Result<(), FuseHubError>> + Send {
        (**self).send_property_update(device_id, properties)
    }
}
