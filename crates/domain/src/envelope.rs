//! Envelopes — already-decoded messages delivered by an account's message
//! queue.
//!
//! The shape is `{ "protocol": <code>, "data": { ... }, ... }`. Device status
//! reports carry `data.devId` and a `data.status` list; other telemetry may
//! only name the device inside `data.bizData.devId`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::DeviceId;
use crate::local_strategy::DpId;

/// Protocol code of a device status report.
pub const PROTOCOL_DEVICE_REPORT: i64 = 4;
/// Protocol code of other telemetry (online/offline, renames, …).
pub const PROTOCOL_OTHER: i64 = 20;

/// Transport classification of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    DeviceReport,
    Other,
    Unknown(i64),
}

impl From<i64> for Protocol {
    fn from(code: i64) -> Self {
        match code {
            PROTOCOL_DEVICE_REPORT => Self::DeviceReport,
            PROTOCOL_OTHER => Self::Other,
            other => Self::Unknown(other),
        }
    }
}

/// One decoded message-queue message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub protocol: i64,
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Transport fields the core does not interpret (`t`, `pv`, `sign`, …).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    #[must_use]
    pub fn new(protocol: i64, data: Map<String, Value>) -> Self {
        Self {
            protocol,
            data,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Protocol {
        Protocol::from(self.protocol)
    }

    /// Device the message is about.
    ///
    /// `data.devId` wins; "other" telemetry falls back to
    /// `data.bizData.devId`.
    #[must_use]
    pub fn device_id(&self) -> Option<DeviceId> {
        if let Some(id) = non_empty_str(self.data.get("devId")) {
            return Some(DeviceId::new(id));
        }
        if self.kind() == Protocol::Other {
            return non_empty_str(self.biz_data()?.get("devId")).map(DeviceId::new);
        }
        None
    }

    /// Copy the resolved device id into `data.devId` when the message only
    /// carried it inside `bizData`.
    pub fn annotate_device_id(&mut self, device_id: &DeviceId) {
        if self.kind() == Protocol::Other && non_empty_str(self.data.get("devId")).is_none() {
            self.data.insert(
                "devId".to_string(),
                Value::String(device_id.to_string()),
            );
        }
    }

    #[must_use]
    pub fn biz_data(&self) -> Option<&Map<String, Value>> {
        self.data.get("bizData").and_then(Value::as_object)
    }

    #[must_use]
    pub fn biz_code(&self) -> Option<&str> {
        self.data.get("bizCode").and_then(Value::as_str)
    }

    /// Status tuples of a device status report, `None` for any other message.
    ///
    /// Non-object list entries are skipped.
    #[must_use]
    pub fn status_items(&self) -> Option<Vec<StatusItem>> {
        if self.kind() != Protocol::DeviceReport {
            return None;
        }
        let list = self.data.get("status")?.as_array()?;
        Some(
            list.iter()
                .filter_map(Value::as_object)
                .map(StatusItem::from_json)
                .collect(),
        )
    }

    /// Replace the status list with fully resolved tuples.
    pub fn set_status_items(&mut self, items: &[ResolvedStatus]) {
        let list = items.iter().map(ResolvedStatus::to_json).collect();
        self.data.insert("status".to_string(), Value::Array(list));
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// A status tuple as received: code, data-point id, or neither.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusItem {
    pub code: Option<String>,
    pub dp_id: Option<DpId>,
    pub value: Option<Value>,
    /// Every other key of the tuple, in key order.
    pub extra: Map<String, Value>,
}

impl StatusItem {
    /// Parse one entry of a `data.status` list.
    ///
    /// `dpId` is accepted as a number or a numeric string.
    #[must_use]
    pub fn from_json(object: &Map<String, Value>) -> Self {
        let mut item = Self::default();
        for (key, value) in object {
            match key.as_str() {
                "code" => item.code = value.as_str().map(str::to_string),
                "dpId" => item.dp_id = parse_dp_id(value),
                "value" => item.value = Some(value.clone()),
                _ => {
                    item.extra.insert(key.clone(), value.clone());
                }
            }
        }
        item
    }

    #[must_use]
    pub fn with_code(code: impl Into<String>, value: Value) -> Self {
        Self {
            code: Some(code.into()),
            value: Some(value),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_dp_id(dp_id: DpId, value: Value) -> Self {
        Self {
            dp_id: Some(dp_id),
            value: Some(value),
            ..Self::default()
        }
    }
}

fn parse_dp_id(value: &Value) -> Option<DpId> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| DpId::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A status tuple with both halves of its identity resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStatus {
    pub code: String,
    #[serde(rename = "dpId")]
    pub dp_id: DpId,
    pub value: Value,
}

impl ResolvedStatus {
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "code": self.code,
            "dpId": self.dp_id,
            "value": self.value,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope(value: Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn should_read_device_id_from_data() {
        let env = envelope(json!({"data": {"devId": "abc"}}));
        assert_eq!(env.device_id(), Some(DeviceId::new("abc")));
    }

    #[test]
    fn should_read_device_id_from_biz_data_for_other_protocol() {
        let env = envelope(json!({"protocol": 20, "data": {"bizData": {"devId": "abc"}}}));
        assert_eq!(env.device_id(), Some(DeviceId::new("abc")));
    }

    #[test]
    fn should_ignore_biz_data_for_status_reports() {
        let env = envelope(json!({"protocol": 4, "data": {"bizData": {"devId": "abc"}}}));
        assert_eq!(env.device_id(), None);
    }

    #[test]
    fn should_return_none_when_no_id_is_present() {
        let env = envelope(json!({"protocol": 20, "data": {"bizCode": "online"}}));
        assert_eq!(env.device_id(), None);
    }

    #[test]
    fn should_annotate_other_message_with_device_id() {
        let mut env = envelope(json!({"protocol": 20, "data": {"bizData": {"devId": "abc"}}}));
        let id = env.device_id().unwrap();
        env.annotate_device_id(&id);
        assert_eq!(env.data["devId"], json!("abc"));
    }

    #[test]
    fn should_parse_status_items_with_mixed_shapes() {
        let env = envelope(json!({
            "protocol": 4,
            "data": {
                "devId": "abc",
                "status": [
                    {"code": "switch_1", "value": true, "t": 1700000000},
                    {"dpId": "5", "value": 21},
                    {"7": false},
                    "garbage"
                ]
            }
        }));
        let items = env.status_items().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].code.as_deref(), Some("switch_1"));
        assert_eq!(items[0].extra["t"], json!(1_700_000_000));
        assert_eq!(items[1].dp_id, Some(5));
        assert_eq!(items[2].code, None);
        assert_eq!(items[2].dp_id, None);
        assert_eq!(items[2].extra["7"], json!(false));
    }

    #[test]
    fn should_not_extract_status_items_from_other_protocol() {
        let env = envelope(json!({"protocol": 20, "data": {"devId": "abc", "status": []}}));
        assert!(env.status_items().is_none());
    }

    #[test]
    fn should_keep_unknown_transport_fields() {
        let env = envelope(json!({"protocol": 4, "data": {}, "t": 17, "pv": "2.0"}));
        assert_eq!(env.extra["pv"], json!("2.0"));
        let back = serde_json::to_value(&env).unwrap();
        assert_eq!(back["t"], json!(17));
    }

    #[test]
    fn should_write_back_resolved_status_list() {
        let mut env = envelope(json!({"protocol": 4, "data": {"devId": "abc", "status": [{"7": false}]}}));
        env.set_status_items(&[ResolvedStatus {
            code: "switch_1".to_string(),
            dp_id: 7,
            value: json!(false),
        }]);
        assert_eq!(
            env.data["status"],
            json!([{"code": "switch_1", "dpId": 7, "value": false}])
        );
    }
}
