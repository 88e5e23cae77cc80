//! Dispatcher — sends classified command batches to their owning account.
//!
//! Each batch is one backend call, run on its own task under a timeout.
//! Batches are awaited in dispatch order; a failing batch is reported and
//! does not stop the ones after it.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use fusehub_domain::account::AccountSource;
use fusehub_domain::command::{BatchKind, Command, PropertyUpdate};
use fusehub_domain::error::FuseHubError;
use fusehub_domain::id::{BatchId, DeviceId};

use crate::ports::DeviceBackend;

/// Why a batch did not go through.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("account {0} is not available")]
    AccountUnavailable(AccountSource),

    #[error("backend call failed")]
    Backend(#[source] FuseHubError),

    #[error("dispatch task failed")]
    Task(#[source] tokio::task::JoinError),
}

/// Result of one batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub kind: BatchKind,
    pub account: AccountSource,
    /// Number of commands or properties in the batch.
    pub size: usize,
    pub result: Result<(), DispatchError>,
}

impl BatchOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything one `send` call did.
#[derive(Debug)]
pub struct DispatchReport {
    pub id: BatchId,
    pub device_id: DeviceId,
    pub outcomes: Vec<BatchOutcome>,
    /// Commands no capability matched.
    pub dropped: Vec<Command>,
    /// Reset-state codes applied locally.
    pub resets: Vec<String>,
}

impl DispatchReport {
    #[must_use]
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            id: BatchId::new(),
            device_id,
            outcomes: Vec::new(),
            dropped: Vec::new(),
            resets: Vec::new(),
        }
    }

    /// Whether every dispatched batch succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(BatchOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Kinds of the batches sent, in dispatch order.
    #[must_use]
    pub fn kinds(&self) -> Vec<BatchKind> {
        self.outcomes.iter().map(|o| o.kind).collect()
    }
}

/// Holds the account connections and performs the backend calls.
pub struct Dispatcher<P, A> {
    push: RwLock<Option<Arc<P>>>,
    api: RwLock<Option<Arc<A>>>,
    timeout: Duration,
}

impl<P, A> Dispatcher<P, A>
where
    P: DeviceBackend + 'static,
    A: DeviceBackend + 'static,
{
    #[must_use]
    pub fn new(push: Option<Arc<P>>, api: Option<Arc<A>>, timeout: Duration) -> Self {
        Self {
            push: RwLock::new(push),
            api: RwLock::new(api),
            timeout,
        }
    }

    #[must_use]
    pub fn push_backend(&self) -> Option<Arc<P>> {
        self.push
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn api_backend(&self) -> Option<Arc<A>> {
        self.api
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a connection for `source`'s owning account is attached.
    #[must_use]
    pub fn is_attached(&self, source: AccountSource) -> bool {
        match source.owning_account() {
            AccountSource::Api => self.api_backend().is_some(),
            AccountSource::Upstream | AccountSource::Push => self.push_backend().is_some(),
        }
    }

    /// Drop the connection of `source`'s owning account.
    pub fn detach(&self, source: AccountSource) {
        match source.owning_account() {
            AccountSource::Api => {
                self.api.write().unwrap_or_else(PoisonError::into_inner).take();
            }
            AccountSource::Upstream | AccountSource::Push => {
                self.push.write().unwrap_or_else(PoisonError::into_inner).take();
            }
        }
    }

    /// Send `{code, value}` commands through the push account.
    #[tracing::instrument(skip(self, commands), fields(count = commands.len()))]
    pub async fn push_native(&self, device_id: &DeviceId, commands: Vec<Command>) -> BatchOutcome {
        let size = commands.len();
        let Some(backend) = self.push_backend() else {
            return unavailable(BatchKind::PushNative, AccountSource::Push, size);
        };
        let device_id = device_id.clone();
        self.run(BatchKind::PushNative, AccountSource::Push, size, async move {
            backend.send_native_command(device_id, commands).await
        })
        .await
    }

    /// Send `{code, value}` commands through the API account.
    #[tracing::instrument(skip(self, commands), fields(count = commands.len()))]
    pub async fn api_native(&self, device_id: &DeviceId, commands: Vec<Command>) -> BatchOutcome {
        let size = commands.len();
        let Some(backend) = self.api_backend() else {
            return unavailable(BatchKind::ApiNative, AccountSource::Api, size);
        };
        let device_id = device_id.clone();
        self.run(BatchKind::ApiNative, AccountSource::Api, size, async move {
            backend.send_native_command(device_id, commands).await
        })
        .await
    }

    /// Send property updates through the API account.
    #[tracing::instrument(skip(self, properties), fields(count = properties.len()))]
    pub async fn api_property_update(
        &self,
        device_id: &DeviceId,
        properties: Vec<PropertyUpdate>,
    ) -> BatchOutcome {
        let size = properties.len();
        let Some(backend) = self.api_backend() else {
            return unavailable(BatchKind::ApiPropertyUpdate, AccountSource::Api, size);
        };
        let device_id = device_id.clone();
        self.run(
            BatchKind::ApiPropertyUpdate,
            AccountSource::Api,
            size,
            async move { backend.send_property_update(device_id, properties).await },
        )
        .await
    }

    async fn run<F>(&self, kind: BatchKind, account: AccountSource, size: usize, call: F) -> BatchOutcome
    where
        F: Future<Output = Result<(), FuseHubError>> + Send + 'static,
    {
        let timeout = self.timeout;
        let handle = tokio::spawn(tokio::time::timeout(timeout, call));
        let result = match handle.await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(err))) => Err(DispatchError::Backend(err)),
            Ok(Err(_elapsed)) => Err(DispatchError::Timeout(timeout)),
            Err(err) => Err(DispatchError::Task(err)),
        };
        if let Err(err) = &result {
            tracing::warn!(batch = %kind, account = %account, size, error = %err, "command batch failed");
        }
        BatchOutcome {
            kind,
            account,
            size,
            result,
        }
    }
}

fn unavailable(kind: BatchKind, account: AccountSource, size: usize) -> BatchOutcome {
    tracing::warn!(batch = %kind, account = %account, size, "account not available, batch skipped");
    BatchOutcome {
        kind,
        account,
        size,
        result: Err(DispatchError::AccountUnavailable(account)),
    }
}
