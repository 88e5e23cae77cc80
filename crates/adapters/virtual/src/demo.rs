//! Demo device sets — one thermostat shared by both accounts, a plug only
//! the push account sees and a bulb owned by the upstream integration.
//!
//! Identifiers are fixed so they stay stable across restarts.

use serde_json::json;

use fusehub_domain::device::{DeviceFunction, DeviceRecord, StatusRange};
use fusehub_domain::error::FuseHubError;
use fusehub_domain::local_strategy::{DpStrategy, DpValueType};
use fusehub_domain::virtual_function::VirtualFunctionDescriptor;

pub const THERMOSTAT_ID: &str = "demo_thermostat";
pub const PLUG_ID: &str = "demo_plug";
pub const BULB_ID: &str = "demo_bulb";

/// Devices listed by the push account.
///
/// # Errors
///
/// Returns a validation error if a builder fails.
pub fn push_devices() -> Result<Vec<DeviceRecord>, FuseHubError> {
    let thermostat = DeviceRecord::builder()
        .id(THERMOSTAT_ID)
        .name("Demo Thermostat")
        .category("wk")
        .status("switch", json!(true))
        .status("temp_current", json!(195))
        .function(DeviceFunction::new("switch", "Boolean").with_dp_id(1))
        .status_range(StatusRange::new("temp_current", "Integer").with_dp_id(3))
        .strategy(1, DpStrategy::new("switch").with_value_type(DpValueType::Boolean))
        .strategy(3, DpStrategy::new("temp_current").with_value_type(DpValueType::Integer))
        .build()?;

    let plug = DeviceRecord::builder()
        .id(PLUG_ID)
        .name("Demo Plug")
        .category("cz")
        .status("switch_1", json!(false))
        .function(DeviceFunction::new("switch_1", "Boolean").with_dp_id(1))
        .strategy(1, DpStrategy::new("switch_1").with_value_type(DpValueType::Boolean))
        .build()?;

    Ok(vec![thermostat, plug])
}

/// Devices listed by the API account.
///
/// # Errors
///
/// Returns a validation error if a builder fails.
pub fn api_devices() -> Result<Vec<DeviceRecord>, FuseHubError> {
    let thermostat = DeviceRecord::builder()
        .id(THERMOSTAT_ID)
        .name("Demo Thermostat")
        .category("wk")
        .status("temp_set", json!(210))
        .status("mode", json!("auto"))
        .function(
            DeviceFunction::new("temp_set", "Integer")
                .with_dp_id(2)
                .with_values(json!({"min": 50, "max": 350, "scale": 1, "step": 5})),
        )
        .function(
            DeviceFunction::new("mode", "Enum")
                .with_dp_id(4)
                .with_values(json!({"range": ["auto", "manual", "eco"]})),
        )
        .strategy(
            2,
            DpStrategy::new("temp_set")
                .with_remote_api()
                .with_property_update()
                .with_value_type(DpValueType::Integer),
        )
        .strategy(
            4,
            DpStrategy::new("mode")
                .with_remote_api()
                .with_value_type(DpValueType::Enum),
        )
        .data_model(r#"{"modelId":"demo-wk","services":[]}"#)
        .build()?;

    Ok(vec![thermostat])
}

/// Devices of the upstream integration the push account overrides.
///
/// # Errors
///
/// Returns a validation error if a builder fails.
pub fn upstream_devices() -> Result<Vec<DeviceRecord>, FuseHubError> {
    let bulb = DeviceRecord::builder()
        .id(BULB_ID)
        .name("Demo Bulb")
        .category("dj")
        .status("switch_led", json!(false))
        .status("bright_value", json!(500))
        .strategy(20, DpStrategy::new("switch_led").with_value_type(DpValueType::Boolean))
        .strategy(22, DpStrategy::new("bright_value").with_value_type(DpValueType::Integer))
        .build()?;

    Ok(vec![bulb])
}

/// Virtual functions for the demo thermostat category.
#[must_use]
pub fn virtual_functions() -> Vec<VirtualFunctionDescriptor> {
    vec![
        VirtualFunctionDescriptor::new("eco_preset", "wk")
            .with_target("mode", Some(json!("eco")))
            .with_target("temp_set", Some(json!(180))),
        VirtualFunctionDescriptor::new("boost", "wk")
            .with_target("temp_set", None)
            .with_reset_state("boost_left"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_demo_push_devices() {
        let devices = push_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id().as_str(), THERMOSTAT_ID);
        assert_eq!(devices[0].local_strategy.code_to_id("switch"), Some(1));
    }

    #[test]
    fn should_share_thermostat_between_accounts() {
        let push = push_devices().unwrap();
        let api = api_devices().unwrap();
        assert_eq!(push[0].id(), api[0].id());
        assert!(api[0].has_data_model());
        assert!(!push[0].has_data_model());
    }

    #[test]
    fn should_give_upstream_bulb_its_own_identifier() {
        let upstream = upstream_devices().unwrap();
        assert_eq!(upstream.len(), 1);
        assert_eq!(upstream[0].id().as_str(), BULB_ID);
    }

    #[test]
    fn should_validate_demo_virtual_functions() {
        for vf in virtual_functions() {
            assert!(vf.validate().is_ok());
            assert_eq!(vf.category, "wk");
        }
    }
}
