//! # fusehub-adapter-virtual
//!
//! Simulated backend account for demos and end-to-end tests.
//!
//! A [`VirtualBackend`] holds an in-memory device list (and optionally an
//! upstream list) and applies the commands it receives to the simulated
//! status, so a later listing reflects them. Every call is recorded and can
//! be inspected; latency and failures can be injected.
//!
//! ## Dependency rule
//!
//! Depends on `fusehub-app` (port traits) and `fusehub-domain` only.

pub mod demo;
pub mod error;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use fusehub_app::ports::DeviceBackend;
use fusehub_domain::account::AccountSource;
use fusehub_domain::command::{Command, PropertyUpdate};
use fusehub_domain::device::DeviceRecord;
use fusehub_domain::envelope::Envelope;
use fusehub_domain::error::{FuseHubError, NotFoundError};
use fusehub_domain::id::DeviceId;

pub use error::VirtualError;

/// A backend call the virtual account received.
#[derive(Debug, Clone, PartialEq)]
pub enum SentCall {
    Native {
        device_id: DeviceId,
        commands: Vec<Command>,
    },
    Property {
        device_id: DeviceId,
        properties: Vec<PropertyUpdate>,
    },
}

/// In-memory backend account.
pub struct VirtualBackend {
    source: AccountSource,
    devices: Mutex<BTreeMap<DeviceId, DeviceRecord>>,
    upstream: Mutex<Option<Vec<DeviceRecord>>>,
    sent: Mutex<Vec<SentCall>>,
    received: Mutex<Vec<Envelope>>,
    latency: Option<Duration>,
    failing: AtomicBool,
}

impl VirtualBackend {
    #[must_use]
    pub fn new(source: AccountSource) -> Self {
        Self {
            source,
            devices: Mutex::new(BTreeMap::new()),
            upstream: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            received: Mutex::new(Vec::new()),
            latency: None,
            failing: AtomicBool::new(false),
        }
    }

    /// Push account preloaded with the demo device set.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a demo record fails to build.
    pub fn demo_push() -> Result<Self, FuseHubError> {
        Ok(Self::new(AccountSource::Push)
            .with_devices(demo::push_devices()?)
            .with_upstream(demo::upstream_devices()?))
    }

    /// API account preloaded with the demo device set.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a demo record fails to build.
    pub fn demo_api() -> Result<Self, FuseHubError> {
        Ok(Self::new(AccountSource::Api).with_devices(demo::api_devices()?))
    }

    /// Load the device list from a JSON file holding an array of records.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::Io`] if the file cannot be read,
    /// [`VirtualError::Parse`] if it is not a record array, or
    /// [`VirtualError::Domain`] if a record fails validation.
    pub fn from_seed_file(source: AccountSource, path: &Path) -> Result<Self, VirtualError> {
        let content = std::fs::read_to_string(path).map_err(|err| VirtualError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
        let devices = parse_seed(&content)?;
        tracing::info!(source = %source, path = %path.display(), count = devices.len(), "loaded seed file");
        Ok(Self::new(source).with_devices(devices))
    }

    #[must_use]
    pub fn with_devices(self, devices: impl IntoIterator<Item = DeviceRecord>) -> Self {
        {
            let mut map = lock(&self.devices);
            for record in devices {
                map.insert(record.id().clone(), record);
            }
        }
        self
    }

    #[must_use]
    pub fn with_upstream(self, devices: Vec<DeviceRecord>) -> Self {
        *lock(&self.upstream) = Some(devices);
        self
    }

    /// Delay every command call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    #[must_use]
    pub fn source(&self) -> AccountSource {
        self.source
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Add or replace a device, as if the remote service changed it.
    pub fn upsert_device(&self, record: DeviceRecord) {
        lock(&self.devices).insert(record.id().clone(), record);
    }

    /// Current simulated record of a device.
    #[must_use]
    pub fn device(&self, device_id: &DeviceId) -> Option<DeviceRecord> {
        lock(&self.devices).get(device_id).cloned()
    }

    /// Every command call received so far, in order.
    #[must_use]
    pub fn sent_calls(&self) -> Vec<SentCall> {
        lock(&self.sent).clone()
    }

    /// Every envelope the hub forwarded to this account.
    #[must_use]
    pub fn received_messages(&self) -> Vec<Envelope> {
        lock(&self.received).clone()
    }

    fn check_failing(&self) -> Result<(), FuseHubError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(VirtualError::Simulated.into());
        }
        Ok(())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn apply_status<'a>(
        &self,
        device_id: &DeviceId,
        values: impl IntoIterator<Item = (String, &'a serde_json::Value)>,
    ) -> Result<(), FuseHubError> {
        let mut devices = lock(&self.devices);
        let record = devices.get_mut(device_id).ok_or_else(|| NotFoundError {
            entity: "Device",
            id: device_id.to_string(),
        })?;
        for (code, value) in values {
            tracing::debug!(source = %self.source, device_id = %device_id, code = %code, "applying simulated status");
            record.status.insert(code, value.clone());
        }
        Ok(())
    }
}

impl DeviceBackend for VirtualBackend {
    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, FuseHubError> {
        self.check_failing()?;
        Ok(lock(&self.devices).values().cloned().collect())
    }

    async fn list_upstream_devices(&self) -> Result<Option<Vec<DeviceRecord>>, FuseHubError> {
        self.check_failing()?;
        Ok(lock(&self.upstream).clone())
    }

    fn on_message(&self, envelope: &Envelope) {
        lock(&self.received).push(envelope.clone());
    }

    async fn send_native_command(
        &self,
        device_id: DeviceId,
        commands: Vec<Command>,
    ) -> Result<(), FuseHubError> {
        lock(&self.sent).push(SentCall::Native {
            device_id: device_id.clone(),
            commands: commands.clone(),
        });
        self.simulate_latency().await;
        self.check_failing()?;
        self.apply_status(
            &device_id,
            commands.iter().map(|c| (c.code.clone(), &c.value)),
        )
    }

    async fn send_property_update(
        &self,
        device_id: DeviceId,
        properties: Vec<PropertyUpdate>,
    ) -> Result<(), FuseHubError> {
        lock(&self.sent).push(SentCall::Property {
            device_id: device_id.clone(),
            properties: properties.clone(),
        });
        self.simulate_latency().await;
        self.check_failing()?;
        let codes: Vec<(String, &serde_json::Value)> = {
            let devices = lock(&self.devices);
            let strategy = devices.get(&device_id).map(|r| &r.local_strategy);
            properties
                .iter()
                .filter_map(|p| {
                    let code = strategy?.id_to_code(p.dp_id)?;
                    Some((code.to_string(), &p.value))
                })
                .collect()
        };
        self.apply_status(&device_id, codes)
    }
}

fn parse_seed(content: &str) -> Result<Vec<DeviceRecord>, VirtualError> {
    let devices: Vec<DeviceRecord> = serde_json::from_str(content).map_err(VirtualError::Parse)?;
    for record in &devices {
        record.validate().map_err(VirtualError::Domain)?;
    }
    Ok(devices)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
