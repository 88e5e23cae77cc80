//! Device hub — the orchestrator the host platform talks to.
//!
//! Owns the account stores, the status delta registry and the latest
//! aggregated view. Every mutation (listing refresh, routed message, local
//! reset, account teardown) runs in one short critical section that ends
//! with a rebuild; readers get the last rebuilt view from a watch channel
//! without taking the lock. The lock is never held across an `.await`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use fusehub_domain::account::AccountSource;
use fusehub_domain::command::{BatchKind, Command};
use fusehub_domain::device::DeviceRecord;
use fusehub_domain::envelope::Envelope;
use fusehub_domain::event::{Event, EventKind};
use fusehub_domain::id::DeviceId;
use fusehub_domain::time::now;

use crate::aggregator::{AggregatedView, Aggregator};
use crate::classifier::{CommandBatches, classify};
use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::options::HubOptions;
use crate::ports::{DeviceBackend, EventPublisher, MessageSink, VirtualFunctionRegistry};
use crate::router::{InboundRouter, RouteOutcome};
use crate::status_delta::StatusDeltaRegistry;
use crate::store::AccountStore;
use crate::watcher::DeviceWatcher;

struct HubState {
    stores: HashMap<AccountSource, AccountStore>,
    deltas: StatusDeltaRegistry,
}

/// Aggregates the device state of the push and API accounts and routes
/// commands back to them.
pub struct DeviceHub<P, A, R, E> {
    aggregator: Aggregator,
    router: InboundRouter,
    dispatcher: Dispatcher<P, A>,
    registry: R,
    events: E,
    state: Mutex<HubState>,
    view: watch::Sender<Arc<AggregatedView>>,
}

impl<P, A, R, E> DeviceHub<P, A, R, E>
where
    P: DeviceBackend + 'static,
    A: DeviceBackend + 'static,
    R: VirtualFunctionRegistry,
    E: EventPublisher + Send + Sync,
{
    /// Create a hub. An account passed as `None` is never established: it
    /// has no store and its batches report the account as unavailable.
    pub fn new(
        options: &HubOptions,
        push: Option<Arc<P>>,
        api: Option<Arc<A>>,
        registry: R,
        events: E,
    ) -> Self {
        let mut stores = HashMap::new();
        if push.is_some() {
            stores.insert(AccountSource::Upstream, AccountStore::new(AccountSource::Upstream));
            stores.insert(AccountSource::Push, AccountStore::new(AccountSource::Push));
        }
        if api.is_some() {
            stores.insert(AccountSource::Api, AccountStore::new(AccountSource::Api));
        }
        let aggregator = Aggregator::new(options.priority.iter().copied());
        let watcher = DeviceWatcher::new(options.watched_devices.iter().cloned());
        let router = InboundRouter::new(aggregator.priority(), watcher);
        let (view, _) = watch::channel(Arc::new(AggregatedView::default()));

        Self {
            router,
            aggregator,
            dispatcher: Dispatcher::new(push, api, options.dispatch_timeout),
            registry,
            events,
            state: Mutex::new(HubState {
                stores,
                deltas: StatusDeltaRegistry::new(options.conflict_window),
            }),
            view,
        }
    }

    /// The last rebuilt aggregated view.
    #[must_use]
    pub fn view(&self) -> Arc<AggregatedView> {
        Arc::clone(&self.view.borrow())
    }

    /// Receive every future rebuilt view.
    #[must_use]
    pub fn subscribe_view(&self) -> watch::Receiver<Arc<AggregatedView>> {
        self.view.subscribe()
    }

    /// Canonical record of one device.
    #[must_use]
    pub fn device(&self, device_id: &DeviceId) -> Option<DeviceRecord> {
        self.view().get(device_id).cloned()
    }

    /// Copy of one account's store, `None` when the account is not established.
    #[must_use]
    pub fn store_snapshot(&self, source: AccountSource) -> Option<AccountStore> {
        self.lock_state().stores.get(&source).cloned()
    }

    /// Fetch every established account's device listing and rebuild.
    ///
    /// A failing listing is logged and the account's store is left as is.
    /// Records that fail validation are logged and left out.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> Arc<AggregatedView> {
        let mut listings = Vec::new();

        if let Some(push) = self.dispatcher.push_backend() {
            match push.list_devices().await {
                Ok(records) => listings.push((AccountSource::Push, records)),
                Err(err) => tracing::warn!(source = %AccountSource::Push, error = %err, "device listing failed"),
            }
            match push.list_upstream_devices().await {
                Ok(Some(records)) => listings.push((AccountSource::Upstream, records)),
                Ok(None) => {}
                Err(err) => tracing::warn!(source = %AccountSource::Upstream, error = %err, "device listing failed"),
            }
        }
        if let Some(api) = self.dispatcher.api_backend() {
            match api.list_devices().await {
                Ok(records) => listings.push((AccountSource::Api, records)),
                Err(err) => tracing::warn!(source = %AccountSource::Api, error = %err, "device listing failed"),
            }
        }

        let view = {
            let mut state = self.lock_state();
            for (source, records) in listings {
                if let Some(store) = state.stores.get_mut(&source) {
                    store.replace_from_listing(valid_records(source, records));
                }
            }
            self.rebuild(&mut state)
        };
        tracing::info!(devices = view.len(), "device listings refreshed");
        self.publish(EventKind::DevicesChanged {
            device_ids: view.device_ids(),
        })
        .await;
        view
    }

    /// Route one envelope received on `source`'s connection.
    #[tracing::instrument(skip(self, source, envelope), fields(source = %source))]
    pub async fn on_message(&self, source: AccountSource, envelope: Envelope) -> RouteOutcome {
        let outcome = {
            let mut state = self.lock_state();
            let HubState { stores, deltas } = &mut *state;
            let outcome = self.router.route(source, envelope, stores, deltas, now());
            if outcome.is_routed() {
                self.rebuild(&mut state);
            }
            outcome
        };

        if let RouteOutcome::Routed(message) = &outcome {
            self.notify_backend(source, &message.envelope);
            for conflict in &message.conflicts {
                self.publish(EventKind::StatusConflict(conflict.clone())).await;
            }
            self.publish(EventKind::DevicesChanged {
                device_ids: vec![message.device_id.clone()],
            })
            .await;
        }
        outcome
    }

    /// Classify `commands` and send each resulting batch to its account.
    ///
    /// Commands for a device missing from the view all go to the push
    /// account unchanged.
    #[tracing::instrument(skip(self, device_id, commands), fields(device_id = %device_id, count = commands.len()))]
    pub async fn send_commands(&self, device_id: &DeviceId, commands: Vec<Command>) -> DispatchReport {
        let mut report = DispatchReport::new(device_id.clone());

        let Some(record) = self.device(device_id) else {
            tracing::debug!("unknown device, sending through push account");
            if !commands.is_empty() {
                report
                    .outcomes
                    .push(self.dispatcher.push_native(device_id, commands).await);
            }
            self.publish_failures(&report).await;
            return report;
        };

        let functions = self.registry.category_functions(&record.category).await;
        let mut batches = CommandBatches::classify_all(commands, &record, &functions);

        let mut expanded = CommandBatches::default();
        let mut resets = Vec::new();
        for invocation in std::mem::take(&mut batches.virtual_functions) {
            if invocation.is_reset() {
                resets.push(invocation.command);
            } else {
                tracing::debug!(key = %invocation.descriptor.key, "expanding virtual function");
                for command in invocation.descriptor.expand(&invocation.command.value) {
                    expanded.push(classify(command, &record, &[]));
                }
            }
        }
        if !resets.is_empty() {
            self.reset_status(device_id, &resets).await;
            report.resets = resets.into_iter().map(|c| c.code).collect();
        }

        self.dispatch(device_id, expanded, Some(BatchKind::VirtualFunction), &mut report)
            .await;
        self.dispatch(device_id, batches, None, &mut report).await;

        self.publish_failures(&report).await;
        report
    }

    /// End `account`'s session: drop its connection, its stores and its
    /// status deltas, then rebuild.
    #[tracing::instrument(skip(self))]
    pub async fn teardown_account(&self, account: AccountSource) {
        let account = account.owning_account();
        self.dispatcher.detach(account);
        let view = {
            let mut state = self.lock_state();
            for source in AccountSource::ALL
                .into_iter()
                .filter(|s| s.owning_account() == account)
            {
                state.stores.remove(&source);
                state.deltas.forget_source(source);
            }
            self.rebuild(&mut state)
        };
        tracing::info!(account = %account, "account torn down");
        self.publish(EventKind::DevicesChanged {
            device_ids: view.device_ids(),
        })
        .await;
    }

    async fn dispatch(
        &self,
        device_id: &DeviceId,
        batches: CommandBatches,
        label: Option<BatchKind>,
        report: &mut DispatchReport,
    ) {
        let CommandBatches {
            push_native,
            api_native,
            api_property_update,
            dropped,
            ..
        } = batches;
        report.dropped.extend(dropped);

        let mut outcomes = Vec::new();
        if !push_native.is_empty() {
            outcomes.push(self.dispatcher.push_native(device_id, push_native).await);
        }
        if !api_native.is_empty() {
            outcomes.push(self.dispatcher.api_native(device_id, api_native).await);
        }
        if !api_property_update.is_empty() {
            outcomes.push(
                self.dispatcher
                    .api_property_update(device_id, api_property_update)
                    .await,
            );
        }
        for mut outcome in outcomes {
            if let Some(kind) = label {
                outcome.kind = kind;
            }
            report.outcomes.push(outcome);
        }
    }

    /// Write reset-state values into every store holding the device.
    async fn reset_status(&self, device_id: &DeviceId, resets: &[Command]) {
        {
            let mut state = self.lock_state();
            for store in state.stores.values_mut() {
                if store.contains(device_id) {
                    store.apply_status(
                        device_id,
                        resets.iter().map(|c| (c.code.as_str(), &c.value)),
                    );
                }
            }
            self.rebuild(&mut state);
        }
        self.publish(EventKind::DevicesChanged {
            device_ids: vec![device_id.clone()],
        })
        .await;
    }

    fn notify_backend(&self, source: AccountSource, envelope: &Envelope) {
        match source.owning_account() {
            AccountSource::Api => {
                if let Some(api) = self.dispatcher.api_backend() {
                    api.on_message(envelope);
                }
            }
            AccountSource::Upstream | AccountSource::Push => {
                if let Some(push) = self.dispatcher.push_backend() {
                    push.on_message(envelope);
                }
            }
        }
    }

    async fn publish_failures(&self, report: &DispatchReport) {
        for failure in report.failures() {
            let reason = match &failure.result {
                Err(err) => err.to_string(),
                Ok(()) => continue,
            };
            self.publish(EventKind::CommandDispatchFailed {
                device_id: report.device_id.clone(),
                batch: failure.kind,
                reason,
            })
            .await;
        }
    }

    async fn publish(&self, kind: EventKind) {
        if let Err(err) = self.events.publish(Event::new(kind)).await {
            tracing::warn!(error = %err, "failed to publish event");
        }
    }

    fn rebuild(&self, state: &mut HubState) -> Arc<AggregatedView> {
        let view = Arc::new(self.aggregator.rebuild(&mut state.stores));
        self.view.send_replace(Arc::clone(&view));
        view
    }

    fn lock_state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P, A, R, E> MessageSink for DeviceHub<P, A, R, E>
where
    P: DeviceBackend + 'static,
    A: DeviceBackend + 'static,
    R: VirtualFunctionRegistry,
    E: EventPublisher + Send + Sync,
{
    fn deliver(
        &self,
        source: AccountSource,
        envelope: Envelope,
    ) -> impl Future<Output = RouteOutcome> + Send {
        self.on_message(source, envelope)
    }
}

fn valid_records(source: AccountSource, records: Vec<DeviceRecord>) -> Vec<DeviceRecord> {
    records
        .into_iter()
        .filter(|record| match record.validate() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(source = %source, device_id = %record.id(), error = %err, "skipping invalid device record");
                false
            }
        })
        .collect()
}
