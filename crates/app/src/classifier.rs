//! Command classifier — decides which backend call each outbound command
//! becomes.
//!
//! Precedence, first match wins:
//! 1. virtual function of the device's category (key or reset-state code)
//! 2. local-strategy entry without remote-API flag → push-account native
//! 3. remote-API + property-update flags → API-account property update
//! 4. remote-API flag only → API-account native
//!
//! Commands matching none of these are dropped.

use fusehub_domain::command::{BatchKind, Command, PropertyUpdate, normalize_property_value};
use fusehub_domain::device::DeviceRecord;
use fusehub_domain::virtual_function::VirtualFunctionDescriptor;

/// A command routed to a virtual function.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualInvocation {
    pub descriptor: VirtualFunctionDescriptor,
    pub command: Command,
}

impl VirtualInvocation {
    /// Whether the command targets one of the function's reset-state codes.
    #[must_use]
    pub fn is_reset(&self) -> bool {
        self.descriptor.is_reset_code(&self.command.code)
    }
}

/// Classification of a single command.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    VirtualFunction(VirtualInvocation),
    PushNative(Command),
    ApiNative(Command),
    ApiPropertyUpdate(PropertyUpdate),
    Unknown(Command),
}

/// Classify one command against the device's record and the virtual
/// functions of its category.
#[must_use]
pub fn classify(
    command: Command,
    record: &DeviceRecord,
    functions: &[VirtualFunctionDescriptor],
) -> Classified {
    if let Some(descriptor) = functions.iter().find(|vf| vf.matches(&command.code)) {
        return Classified::VirtualFunction(VirtualInvocation {
            descriptor: descriptor.clone(),
            command,
        });
    }

    let Some((dp_id, strategy)) = record.local_strategy.find_by_code(&command.code) else {
        return Classified::Unknown(command);
    };

    match (strategy.use_remote_api, strategy.property_update) {
        (false, _) => Classified::PushNative(command),
        (true, true) => Classified::ApiPropertyUpdate(PropertyUpdate::new(
            dp_id,
            normalize_property_value(strategy, &command.value),
        )),
        (true, false) => Classified::ApiNative(command),
    }
}

/// Commands of one `send` call grouped by batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandBatches {
    pub virtual_functions: Vec<VirtualInvocation>,
    pub push_native: Vec<Command>,
    pub api_native: Vec<Command>,
    pub api_property_update: Vec<PropertyUpdate>,
    pub dropped: Vec<Command>,
}

impl CommandBatches {
    /// Classify `commands` in order.
    #[must_use]
    pub fn classify_all(
        commands: impl IntoIterator<Item = Command>,
        record: &DeviceRecord,
        functions: &[VirtualFunctionDescriptor],
    ) -> Self {
        let mut batches = Self::default();
        for command in commands {
            batches.push(classify(command, record, functions));
        }
        batches
    }

    pub fn push(&mut self, classified: Classified) {
        match classified {
            Classified::VirtualFunction(invocation) => self.virtual_functions.push(invocation),
            Classified::PushNative(command) => self.push_native.push(command),
            Classified::ApiNative(command) => self.api_native.push(command),
            Classified::ApiPropertyUpdate(update) => self.api_property_update.push(update),
            Classified::Unknown(command) => {
                tracing::debug!(code = %command.code, "dropping command without capability");
                self.dropped.push(command);
            }
        }
    }

    /// Non-empty batches in dispatch order.
    #[must_use]
    pub fn kinds(&self) -> Vec<BatchKind> {
        let mut kinds = Vec::new();
        if !self.virtual_functions.is_empty() {
            kinds.push(BatchKind::VirtualFunction);
        }
        if !self.push_native.is_empty() {
            kinds.push(BatchKind::PushNative);
        }
        if !self.api_native.is_empty() {
            kinds.push(BatchKind::ApiNative);
        }
        if !self.api_property_update.is_empty() {
            kinds.push(BatchKind::ApiPropertyUpdate);
        }
        kinds
    }

    /// Whether no command was routed anywhere.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use fusehub_domain::local_strategy::{DpStrategy, DpValueType};

    use super::*;

    fn thermostat() -> DeviceRecord {
        DeviceRecord::builder()
            .id("thermo")
            .category("wk")
            .strategy(1, DpStrategy::new("switch"))
            .strategy(
                5,
                DpStrategy::new("temp_set")
                    .with_remote_api()
                    .with_property_update()
                    .with_value_type(DpValueType::Integer),
            )
            .strategy(9, DpStrategy::new("mode").with_remote_api())
            .build()
            .unwrap()
    }

    #[test]
    fn should_route_property_update_keyed_by_dp_id() {
        let batches = CommandBatches::classify_all(
            [Command::new("temp_set", json!(10))],
            &thermostat(),
            &[],
        );
        assert_eq!(batches.kinds(), vec![BatchKind::ApiPropertyUpdate]);
        assert_eq!(
            serde_json::Value::Object(batches.api_property_update[0].as_object()),
            json!({"5": 10})
        );
    }

    #[test]
    fn should_normalize_property_values() {
        let classified = classify(Command::new("temp_set", json!("21.6")), &thermostat(), &[]);
        assert_eq!(
            classified,
            Classified::ApiPropertyUpdate(PropertyUpdate::new(5, json!(22)))
        );
    }

    #[test]
    fn should_route_plain_entries_to_push_account_unmodified() {
        let classified = classify(Command::new("switch", json!(true)), &thermostat(), &[]);
        assert_eq!(classified, Classified::PushNative(Command::new("switch", json!(true))));
    }

    #[test]
    fn should_route_remote_api_entries_to_api_native() {
        let classified = classify(Command::new("mode", json!("eco")), &thermostat(), &[]);
        assert_eq!(classified, Classified::ApiNative(Command::new("mode", json!("eco"))));
    }

    #[test]
    fn should_prefer_virtual_function_over_local_strategy() {
        let vf = VirtualFunctionDescriptor::new("switch", "wk").with_target("mode", None);
        let classified = classify(Command::new("switch", json!(true)), &thermostat(), &[vf.clone()]);
        assert_eq!(
            classified,
            Classified::VirtualFunction(VirtualInvocation {
                descriptor: vf,
                command: Command::new("switch", json!(true)),
            })
        );
    }

    #[test]
    fn should_match_reset_state_codes() {
        let vf = VirtualFunctionDescriptor::new("countdown", "wk").with_reset_state("countdown_left");
        let classified = classify(Command::new("countdown_left", json!(0)), &thermostat(), &[vf]);
        let Classified::VirtualFunction(invocation) = classified else {
            panic!("expected virtual function");
        };
        assert!(invocation.is_reset());
    }

    #[test]
    fn should_drop_commands_without_capability() {
        let batches = CommandBatches::classify_all(
            [Command::new("nope", json!(1)), Command::new("switch", json!(false))],
            &thermostat(),
            &[],
        );
        assert_eq!(batches.dropped.len(), 1);
        assert_eq!(batches.kinds(), vec![BatchKind::PushNative]);
    }

    #[test]
    fn should_list_batch_kinds_in_dispatch_order() {
        let vf = VirtualFunctionDescriptor::new("scene", "wk");
        let batches = CommandBatches::classify_all(
            [
                Command::new("temp_set", json!(20)),
                Command::new("mode", json!("eco")),
                Command::new("switch", json!(true)),
                Command::new("scene", json!(1)),
            ],
            &thermostat(),
            &[vf],
        );
        assert_eq!(
            batches.kinds(),
            vec![
                BatchKind::VirtualFunction,
                BatchKind::PushNative,
                BatchKind::ApiNative,
                BatchKind::ApiPropertyUpdate
            ]
        );
    }

    #[test]
    fn should_be_empty_when_nothing_matches() {
        let batches = CommandBatches::classify_all([Command::new("x", json!(1))], &thermostat(), &[]);
        assert!(batches.is_empty());
    }
}
