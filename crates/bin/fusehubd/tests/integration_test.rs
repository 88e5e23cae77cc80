//! End-to-end tests for the full fusehub stack.
//!
//! Each test wires a real hub (aggregator, router, classifier, dispatcher,
//! in-memory registry, in-process event bus) to two virtual backend
//! accounts preloaded with the demo device set. No broker is contacted;
//! envelopes are handed to the hub the way the MQTT source does.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::broadcast;

use fusehub_adapter_virtual::{SentCall, VirtualBackend, demo};
use fusehub_app::dispatcher::DispatchError;
use fusehub_app::event_bus::InProcessEventBus;
use fusehub_app::hub::DeviceHub;
use fusehub_app::options::HubOptions;
use fusehub_app::ports::MessageSink;
use fusehub_app::router::{DropReason, RouteOutcome};
use fusehub_app::virtual_functions::InMemoryVirtualFunctionRegistry;
use fusehub_domain::account::AccountSource;
use fusehub_domain::command::{BatchKind, Command, PropertyUpdate};
use fusehub_domain::envelope::Envelope;
use fusehub_domain::event::{Event, EventKind};
use fusehub_domain::id::DeviceId;

type Hub = DeviceHub<
    VirtualBackend,
    VirtualBackend,
    InMemoryVirtualFunctionRegistry,
    Arc<InProcessEventBus>,
>;

struct Stack {
    hub: Arc<Hub>,
    push: Arc<VirtualBackend>,
    api: Arc<VirtualBackend>,
    bus: Arc<InProcessEventBus>,
}

/// Build a fully-wired hub and fetch the initial listings.
async fn stack() -> Stack {
    let push = Arc::new(VirtualBackend::demo_push().unwrap());
    let api = Arc::new(VirtualBackend::demo_api().unwrap());
    let bus = Arc::new(InProcessEventBus::new(64));
    let registry = InMemoryVirtualFunctionRegistry::from_descriptors(demo::virtual_functions()).unwrap();

    let hub = Arc::new(DeviceHub::new(
        &HubOptions::default(),
        Some(Arc::clone(&push)),
        Some(Arc::clone(&api)),
        registry,
        Arc::clone(&bus),
    ));
    hub.refresh().await;

    Stack { hub, push, api, bus }
}

fn thermostat() -> DeviceId {
    DeviceId::new(demo::THERMOSTAT_ID)
}

fn envelope(value: Value) -> Envelope {
    serde_json::from_value(value).unwrap()
}

async fn next_event(receiver: &mut broadcast::Receiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(1), receiver.recv())
        .await
        .expect("event should arrive")
        .unwrap()
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_aggregate_devices_of_every_store() {
    let stack = stack().await;
    let view = stack.hub.view();

    assert_eq!(
        view.device_ids(),
        vec![
            DeviceId::new(demo::BULB_ID),
            DeviceId::new(demo::PLUG_ID),
            thermostat(),
        ]
    );
    assert_eq!(
        view.contributors(&thermostat()),
        &[AccountSource::Push, AccountSource::Api]
    );
    assert_eq!(
        view.contributors(&DeviceId::new(demo::BULB_ID)),
        &[AccountSource::Upstream]
    );
}

#[tokio::test]
async fn should_union_properties_of_shared_device() {
    let stack = stack().await;
    let canonical = stack.hub.device(&thermostat()).unwrap();

    for code in ["switch", "temp_current", "temp_set", "mode"] {
        assert!(canonical.status.contains_key(code), "missing {code}");
    }
    assert!(canonical.has_data_model());
    assert_eq!(canonical.local_strategy.len(), 4);
}

#[tokio::test]
async fn should_sync_merged_properties_back_into_each_store() {
    let stack = stack().await;
    let push_store = stack.hub.store_snapshot(AccountSource::Push).unwrap();
    let record = push_store.get(&thermostat()).unwrap();

    assert_eq!(record.status["temp_set"], json!(210));
    assert_eq!(record.local_strategy.code_to_id("mode"), Some(4));
    assert!(record.has_data_model());
}

#[tokio::test]
async fn should_leave_disabled_account_out_of_the_view() {
    let push = Arc::new(VirtualBackend::demo_push().unwrap());
    let hub: Hub = DeviceHub::new(
        &HubOptions::default(),
        Some(push),
        None,
        InMemoryVirtualFunctionRegistry::new(),
        Arc::new(InProcessEventBus::new(8)),
    );
    let view = hub.refresh().await;

    assert_eq!(view.len(), 3);
    assert!(!view.get(&thermostat()).unwrap().has_data_model());
    assert!(hub.store_snapshot(AccountSource::Api).is_none());
}

// ---------------------------------------------------------------------------
// Inbound routing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_resolve_dp_id_of_push_report() {
    let stack = stack().await;
    let outcome = stack
        .hub
        .deliver(
            AccountSource::Push,
            envelope(json!({
                "protocol": 4,
                "data": {"devId": demo::THERMOSTAT_ID, "status": [{"dpId": 3, "value": 200, "t": 1}]}
            })),
        )
        .await;

    let routed = outcome.routed().unwrap();
    assert_eq!(routed.resolved[0].code, "temp_current");
    assert_eq!(
        stack.hub.device(&thermostat()).unwrap().status["temp_current"],
        json!(200)
    );
    assert_eq!(stack.push.received_messages().len(), 1);
    assert!(stack.api.received_messages().is_empty());
}

#[tokio::test]
async fn should_write_api_report_into_every_holding_store() {
    let stack = stack().await;
    stack
        .hub
        .deliver(
            AccountSource::Api,
            envelope(json!({
                "protocol": 4,
                "data": {"devId": demo::THERMOSTAT_ID, "status": [{"code": "mode", "value": "manual"}]}
            })),
        )
        .await;

    let push_store = stack.hub.store_snapshot(AccountSource::Push).unwrap();
    assert_eq!(push_store.get(&thermostat()).unwrap().status["mode"], json!("manual"));
    assert_eq!(stack.hub.device(&thermostat()).unwrap().status["mode"], json!("manual"));

    let forwarded = stack.api.received_messages();
    let status = forwarded[0].status_items().unwrap();
    assert_eq!(status[0].dp_id, Some(4));
}

#[tokio::test]
async fn should_take_device_id_from_biz_data() {
    let stack = stack().await;
    let outcome = stack
        .hub
        .deliver(
            AccountSource::Push,
            envelope(json!({
                "protocol": 20,
                "data": {"bizCode": "offline", "bizData": {"devId": demo::PLUG_ID}}
            })),
        )
        .await;

    assert!(outcome.is_routed());
    assert!(!stack.hub.device(&DeviceId::new(demo::PLUG_ID)).unwrap().online);
}

#[tokio::test]
async fn should_drop_message_without_device_id() {
    let stack = stack().await;
    let outcome = stack
        .hub
        .deliver(AccountSource::Push, envelope(json!({"protocol": 4, "data": {"status": []}})))
        .await;

    assert!(matches!(outcome, RouteOutcome::Dropped(DropReason::MissingDeviceId)));
    assert!(stack.push.received_messages().is_empty());
}

#[tokio::test]
async fn should_add_device_first_seen_through_push_message() {
    let stack = stack().await;
    stack
        .hub
        .deliver(
            AccountSource::Push,
            envelope(json!({
                "protocol": 20,
                "data": {"bizCode": "online", "bizData": {"devId": "new_sensor"}}
            })),
        )
        .await;

    let view = stack.hub.view();
    assert!(view.contains(&DeviceId::new("new_sensor")));
    assert_eq!(view.contributors(&DeviceId::new("new_sensor")), &[AccountSource::Push]);
}

#[tokio::test]
async fn should_publish_conflict_when_accounts_disagree() {
    let stack = stack().await;
    let mut events = stack.bus.subscribe();

    stack
        .hub
        .deliver(
            AccountSource::Push,
            envelope(json!({
                "protocol": 4,
                "data": {"devId": demo::THERMOSTAT_ID, "status": [{"code": "mode", "value": "eco"}]}
            })),
        )
        .await;
    stack
        .hub
        .deliver(
            AccountSource::Api,
            envelope(json!({
                "protocol": 4,
                "data": {"devId": demo::THERMOSTAT_ID, "status": [{"code": "mode", "value": "manual"}]}
            })),
        )
        .await;

    let mut conflict = None;
    for _ in 0..3 {
        if let EventKind::StatusConflict(found) = next_event(&mut events).await.kind {
            conflict = Some(found);
            break;
        }
    }
    let conflict = conflict.expect("a conflict event");
    assert_eq!(conflict.code, "mode");
    assert_eq!(conflict.source, AccountSource::Api);
    assert_eq!(conflict.other_source, AccountSource::Push);
    assert_eq!(conflict.other_value, json!("eco"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn should_converge_stores_under_concurrent_deliveries() {
    let stack = stack().await;

    let handles: Vec<_> = (0..200)
        .map(|i| {
            let hub = Arc::clone(&stack.hub);
            let source = if i % 2 == 0 { AccountSource::Push } else { AccountSource::Api };
            tokio::spawn(async move {
                hub.deliver(
                    source,
                    envelope(json!({
                        "protocol": 4,
                        "data": {"devId": demo::THERMOSTAT_ID, "status": [{"dpId": 3, "value": i}]}
                    })),
                )
                .await
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().is_routed());
    }

    let in_view = stack.hub.device(&thermostat()).unwrap().status["temp_current"].clone();
    let push_store = stack.hub.store_snapshot(AccountSource::Push).unwrap();
    let api_store = stack.hub.store_snapshot(AccountSource::Api).unwrap();
    assert_eq!(push_store.get(&thermostat()).unwrap().status["temp_current"], in_view);
    assert_eq!(api_store.get(&thermostat()).unwrap().status["temp_current"], in_view);
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_split_commands_across_accounts() {
    let stack = stack().await;
    let report = stack
        .hub
        .send_commands(
            &thermostat(),
            vec![
                Command::new("switch", json!(false)),
                Command::new("mode", json!("eco")),
                Command::new("temp_set", json!(195)),
            ],
        )
        .await;

    assert!(report.is_success());
    assert_eq!(
        report.kinds(),
        vec![BatchKind::PushNative, BatchKind::ApiNative, BatchKind::ApiPropertyUpdate]
    );
    assert_eq!(
        stack.push.sent_calls(),
        vec![SentCall::Native {
            device_id: thermostat(),
            commands: vec![Command::new("switch", json!(false))],
        }]
    );
    assert_eq!(
        stack.api.sent_calls(),
        vec![
            SentCall::Native {
                device_id: thermostat(),
                commands: vec![Command::new("mode", json!("eco"))],
            },
            SentCall::Property {
                device_id: thermostat(),
                properties: vec![PropertyUpdate::new(2, json!(195))],
            },
        ]
    );
    assert_eq!(stack.api.device(&thermostat()).unwrap().status["temp_set"], json!(195));
}

#[tokio::test]
async fn should_key_property_batch_by_dp_id() {
    let stack = stack().await;
    stack
        .hub
        .send_commands(&thermostat(), vec![Command::new("temp_set", json!("187.6"))])
        .await;

    let calls = stack.api.sent_calls();
    let SentCall::Property { properties, .. } = &calls[0] else {
        panic!("expected a property update");
    };
    assert_eq!(Value::Object(properties[0].as_object()), json!({"2": 188}));
}

#[tokio::test]
async fn should_expand_virtual_function_into_native_batches() {
    let stack = stack().await;
    let report = stack
        .hub
        .send_commands(&thermostat(), vec![Command::new("eco_preset", json!(true))])
        .await;

    assert_eq!(
        report.kinds(),
        vec![BatchKind::VirtualFunction, BatchKind::VirtualFunction]
    );
    assert!(stack.push.sent_calls().is_empty());
    assert_eq!(
        stack.api.sent_calls(),
        vec![
            SentCall::Native {
                device_id: thermostat(),
                commands: vec![Command::new("mode", json!("eco"))],
            },
            SentCall::Property {
                device_id: thermostat(),
                properties: vec![PropertyUpdate::new(2, json!(180))],
            },
        ]
    );
}

#[tokio::test]
async fn should_apply_reset_state_locally() {
    let stack = stack().await;
    let report = stack
        .hub
        .send_commands(&thermostat(), vec![Command::new("boost_left", json!(0))])
        .await;

    assert_eq!(report.resets, vec!["boost_left".to_string()]);
    assert!(report.outcomes.is_empty());
    assert!(stack.push.sent_calls().is_empty());
    assert!(stack.api.sent_calls().is_empty());
    assert_eq!(
        stack.hub.device(&thermostat()).unwrap().status["boost_left"],
        json!(0)
    );
}

#[tokio::test]
async fn should_drop_commands_without_capability() {
    let stack = stack().await;
    let report = stack
        .hub
        .send_commands(&thermostat(), vec![Command::new("child_lock", json!(true))])
        .await;

    assert_eq!(report.dropped, vec![Command::new("child_lock", json!(true))]);
    assert!(report.outcomes.is_empty());
    assert!(stack.push.sent_calls().is_empty());
    assert!(stack.api.sent_calls().is_empty());
}

#[tokio::test]
async fn should_send_unknown_device_commands_through_push_account() {
    let stack = stack().await;
    let ghost = DeviceId::new("ghost");
    let report = stack
        .hub
        .send_commands(&ghost, vec![Command::new("switch_1", json!(true))])
        .await;

    assert_eq!(report.kinds(), vec![BatchKind::PushNative]);
    assert_eq!(
        stack.push.sent_calls(),
        vec![SentCall::Native {
            device_id: ghost,
            commands: vec![Command::new("switch_1", json!(true))],
        }]
    );
}

#[tokio::test]
async fn should_isolate_failing_batch_and_publish_failure() {
    let stack = stack().await;
    let mut events = stack.bus.subscribe();
    stack.api.set_failing(true);

    let report = stack
        .hub
        .send_commands(
            &thermostat(),
            vec![Command::new("temp_set", json!(200)), Command::new("switch", json!(true))],
        )
        .await;

    assert!(!report.is_success());
    assert_eq!(report.failures().count(), 1);
    assert_eq!(stack.push.sent_calls().len(), 1);

    let event = next_event(&mut events).await;
    let EventKind::CommandDispatchFailed { device_id, batch, .. } = event.kind else {
        panic!("expected a dispatch failure");
    };
    assert_eq!(device_id, thermostat());
    assert_eq!(batch, BatchKind::ApiPropertyUpdate);
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_keep_serving_after_api_teardown() {
    let stack = stack().await;
    stack.hub.teardown_account(AccountSource::Api).await;

    let view = stack.hub.view();
    assert_eq!(view.contributors(&thermostat()), &[AccountSource::Push]);
    assert!(view.get(&thermostat()).unwrap().has_data_model());
    assert!(stack.hub.store_snapshot(AccountSource::Api).is_none());

    let report = stack
        .hub
        .send_commands(&thermostat(), vec![Command::new("mode", json!("eco"))])
        .await;
    assert!(matches!(
        report.outcomes[0].result,
        Err(DispatchError::AccountUnavailable(AccountSource::Api))
    ));
}
