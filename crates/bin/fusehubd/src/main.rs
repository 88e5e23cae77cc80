//! # fusehubd — fusehub daemon
//!
//! Composition root that wires the accounts, the hub and the message
//! sources together.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Install the tracing subscriber
//! - Establish the enabled backend accounts (seed file or demo set)
//! - Build the virtual-function registry, the event bus and the hub
//! - Fetch the initial listings, then start each account's message source
//! - Handle graceful shutdown (Ctrl-C)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use fusehub_adapter_mqtt::MqttMessageSource;
use fusehub_adapter_virtual::{VirtualBackend, demo};
use fusehub_app::event_bus::InProcessEventBus;
use fusehub_app::hub::DeviceHub;
use fusehub_app::virtual_functions::InMemoryVirtualFunctionRegistry;
use fusehub_domain::account::AccountSource;
use fusehub_domain::event::Event;

use crate::config::{AccountConfig, Config};

type Hub = DeviceHub<
    VirtualBackend,
    VirtualBackend,
    InMemoryVirtualFunctionRegistry,
    Arc<InProcessEventBus>,
>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    let filter = EnvFilter::try_new(&config.logging.filter).context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Accounts
    let push = establish(AccountSource::Push, &config.accounts.push)?;
    let api = establish(AccountSource::Api, &config.accounts.api)?;

    // Virtual functions
    let descriptors = if config.virtual_functions.is_empty() && uses_demo_devices(&config) {
        demo::virtual_functions()
    } else {
        config.virtual_functions.clone()
    };
    let registry = InMemoryVirtualFunctionRegistry::from_descriptors(descriptors)
        .context("invalid virtual function")?;

    // Event bus
    let event_bus = Arc::new(InProcessEventBus::new(config.hub.event_capacity));
    let events = tokio::spawn(log_events(event_bus.subscribe()));

    // Hub
    let hub: Arc<Hub> = Arc::new(DeviceHub::new(
        &config.hub_options(),
        push,
        api,
        registry,
        Arc::clone(&event_bus),
    ));
    let view = hub.refresh().await;
    tracing::info!(devices = view.len(), "fusehubd started");

    // Message sources
    let mut sources = Vec::new();
    for source in [AccountSource::Push, AccountSource::Api] {
        let account = config.account(source);
        let Some(mqtt) = account.mqtt.clone().filter(|_| account.enabled) else {
            continue;
        };
        let mut message_source = MqttMessageSource::new(source, mqtt);
        match message_source.start(Arc::clone(&hub)).await {
            Ok(()) => sources.push(message_source),
            Err(err) => {
                tracing::warn!(source = %source, error = %err, "message source not started");
            }
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");

    for mut message_source in sources {
        if let Err(err) = message_source.stop().await {
            tracing::warn!(source = %message_source.source(), error = %err, "message source did not stop cleanly");
        }
    }
    for source in [AccountSource::Push, AccountSource::Api] {
        hub.teardown_account(source).await;
    }
    events.abort();

    Ok(())
}

/// Build the account's backend, or `None` when it is disabled.
fn establish(
    source: AccountSource,
    account: &AccountConfig,
) -> anyhow::Result<Option<Arc<VirtualBackend>>> {
    if !account.enabled {
        tracing::info!(source = %source, "account disabled");
        return Ok(None);
    }
    let backend = match &account.devices_file {
        Some(path) => VirtualBackend::from_seed_file(source, path)
            .with_context(|| format!("failed to seed {source} account"))?,
        None if source == AccountSource::Api => VirtualBackend::demo_api()?,
        None => VirtualBackend::demo_push()?,
    };
    Ok(Some(Arc::new(backend)))
}

fn uses_demo_devices(config: &Config) -> bool {
    [&config.accounts.push, &config.accounts.api]
        .iter()
        .any(|account| account.enabled && account.devices_file.is_none())
}

async fn log_events(mut receiver: broadcast::Receiver<Event>) {
    loop {
        match receiver.recv().await {
            Ok(event) => tracing::info!(id = %event.id, event = ?event.kind, "hub event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event log lagging behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
