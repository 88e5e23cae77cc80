//! Data-point resolver — translates between symbolic status codes and
//! numeric data-point ids.
//!
//! A device's local strategy may be known to only some of the accounts, so
//! resolution walks the records of every account in order until one of them
//! completes the pair.

use crate::device::DeviceRecord;
use crate::envelope::{ResolvedStatus, StatusItem};
use crate::local_strategy::DpId;

/// Data-point id for `code` on this record, first match in ascending id order.
#[must_use]
pub fn code_to_id(record: &DeviceRecord, code: &str) -> Option<DpId> {
    record.local_strategy.code_to_id(code)
}

/// Status code for `dp_id` on this record.
#[must_use]
pub fn id_to_code(record: &DeviceRecord, dp_id: DpId) -> Option<String> {
    record.local_strategy.id_to_code(dp_id).map(str::to_string)
}

/// Complete the identity of a status tuple using the given records.
///
/// - code only: look up its id.
/// - id only: look up its code.
/// - neither: scan the tuple's other keys, parsed as ids, and take the first
///   one any table knows. The value under that key becomes the tuple value.
///
/// Whatever half was found on one record is kept while trying the next one.
/// Returns `None` when no record completes the pair or no value is known.
pub fn resolve_status_item<'a, I>(item: &StatusItem, records: I) -> Option<ResolvedStatus>
where
    I: IntoIterator<Item = &'a DeviceRecord>,
{
    let mut code = item.code.clone();
    let mut dp_id = item.dp_id;
    let mut value = item.value.clone();

    for record in records {
        if code.is_some() && dp_id.is_some() {
            break;
        }
        if let Some(c) = code.as_deref() {
            dp_id = code_to_id(record, c);
        } else if let Some(id) = dp_id {
            code = id_to_code(record, id);
        } else if let Some((id, found_code, found_value)) = scan_extra_keys(item, record) {
            dp_id = Some(id);
            code = Some(found_code);
            value = Some(found_value);
        }
    }

    Some(ResolvedStatus {
        code: code?,
        dp_id: dp_id?,
        value: value?,
    })
}

fn scan_extra_keys(item: &StatusItem, record: &DeviceRecord) -> Option<(DpId, String, serde_json::Value)> {
    item.extra.iter().find_map(|(key, value)| {
        let dp_id: DpId = key.trim().parse().ok()?;
        let code = id_to_code(record, dp_id)?;
        Some((dp_id, code, value.clone()))
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use super::*;
    use crate::local_strategy::DpStrategy;

    fn record(id: &str, table: &[(DpId, &str)]) -> DeviceRecord {
        let mut builder = DeviceRecord::builder().id(id);
        for (dp, code) in table {
            builder = builder.strategy(*dp, DpStrategy::new(*code));
        }
        builder.build().unwrap()
    }

    fn item(value: serde_json::Value) -> StatusItem {
        match value {
            serde_json::Value::Object(map) => StatusItem::from_json(&map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn should_resolve_code_to_id_in_ascending_id_order() {
        let rec = record("a", &[(7, "switch_1"), (1, "switch_1")]);
        assert_eq!(code_to_id(&rec, "switch_1"), Some(1));
        assert_eq!(code_to_id(&rec, "missing"), None);
    }

    #[test]
    fn should_fill_dp_id_for_code_only_item() {
        let rec = record("a", &[(5, "temp_set")]);
        let resolved = resolve_status_item(&StatusItem::with_code("temp_set", json!(21)), [&rec]).unwrap();
        assert_eq!(resolved.dp_id, 5);
        assert_eq!(resolved.value, json!(21));
    }

    #[test]
    fn should_fill_code_for_id_only_item() {
        let rec = record("a", &[(1, "switch_1")]);
        let resolved = resolve_status_item(&StatusItem::with_dp_id(1, json!(true)), [&rec]).unwrap();
        assert_eq!(resolved.code, "switch_1");
    }

    #[test]
    fn should_fall_back_to_later_records() {
        let first = record("a", &[]);
        let second = record("a", &[(1, "switch_1")]);
        let resolved =
            resolve_status_item(&StatusItem::with_dp_id(1, json!(true)), [&first, &second]).unwrap();
        assert_eq!(resolved.code, "switch_1");
    }

    #[test]
    fn should_scan_bare_keys_when_no_identity_is_present() {
        let rec = record("a", &[(7, "switch_1")]);
        let resolved = resolve_status_item(&item(json!({"t": 12, "7": false})), [&rec]).unwrap();
        assert_eq!(resolved.dp_id, 7);
        assert_eq!(resolved.code, "switch_1");
        assert_eq!(resolved.value, json!(false));
    }

    #[test]
    fn should_take_first_known_key_during_scan() {
        let rec = record("a", &[(3, "mode"), (7, "switch_1")]);
        let resolved = resolve_status_item(&item(json!({"3": "auto", "7": true})), [&rec]).unwrap();
        assert_eq!(resolved.code, "mode");
        assert_eq!(resolved.value, json!("auto"));
    }

    #[test]
    fn should_take_value_of_matched_key_over_stray_value() {
        let rec = record("a", &[(1, "switch")]);
        let resolved = resolve_status_item(&item(json!({"1": false, "value": 5})), [&rec]).unwrap();
        assert_eq!(resolved.code, "switch");
        assert_eq!(resolved.dp_id, 1);
        assert_eq!(resolved.value, json!(false));
    }

    #[test]
    fn should_leave_unresolvable_items_unresolved() {
        let rec = record("a", &[(1, "switch_1")]);
        assert!(resolve_status_item(&StatusItem::with_code("unknown", json!(1)), [&rec]).is_none());
        assert!(resolve_status_item(&StatusItem::from_json(&Map::new()), [&rec]).is_none());
        assert!(resolve_status_item(&StatusItem::with_dp_id(1, json!(true)), std::iter::empty()).is_none());
    }
}
