//! Device record — one physical device as seen by one backend account.
//!
//! Several accounts can hold a record for the same device. Their maps overlap
//! but are rarely identical, so they are reconciled with [`merge_properties`]:
//! a key-union where the first writer of each key wins.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{FuseHubError, ValidationError};
use crate::id::DeviceId;
use crate::local_strategy::{DpId, DpStrategy, LocalStrategy};

/// Symbolic status code → current value.
pub type StatusMap = BTreeMap<String, serde_json::Value>;

/// A capability the device accepts commands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFunction {
    pub code: String,
    #[serde(rename = "type")]
    pub value_type: String,
    /// Value schema as reported by the backend.
    #[serde(default)]
    pub values: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dp_id: Option<DpId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

impl DeviceFunction {
    #[must_use]
    pub fn new(code: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            value_type: value_type.into(),
            values: serde_json::Value::Null,
            dp_id: None,
            name: None,
            desc: None,
        }
    }

    #[must_use]
    pub fn with_values(mut self, values: serde_json::Value) -> Self {
        self.values = values;
        self
    }

    #[must_use]
    pub fn with_dp_id(mut self, dp_id: DpId) -> Self {
        self.dp_id = Some(dp_id);
        self
    }
}

/// Value range of a reported status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRange {
    pub code: String,
    #[serde(rename = "type")]
    pub value_type: String,
    #[serde(default)]
    pub values: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dp_id: Option<DpId>,
}

impl StatusRange {
    #[must_use]
    pub fn new(code: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            value_type: value_type.into(),
            values: serde_json::Value::Null,
            dp_id: None,
        }
    }

    #[must_use]
    pub fn with_dp_id(mut self, dp_id: DpId) -> Self {
        self.dp_id = Some(dp_id);
        self
    }
}

/// One account's view of a physical device.
///
/// Equality and hashing only look at the identifier: two records describe the
/// same device iff their ids match, whatever their maps contain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    id: DeviceId,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub status: StatusMap,
    #[serde(default)]
    pub function: BTreeMap<String, DeviceFunction>,
    #[serde(default)]
    pub status_range: BTreeMap<String, StatusRange>,
    #[serde(default)]
    pub local_strategy: LocalStrategy,
    /// Opaque data-model schema. `None` and `""` both mean "absent".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_model: Option<String>,
}

impl DeviceRecord {
    /// Create a builder for constructing a [`DeviceRecord`].
    #[must_use]
    pub fn builder() -> DeviceRecordBuilder {
        DeviceRecordBuilder::default()
    }

    /// Minimal record for a device first seen through a push message, before
    /// any listing call described it.
    #[must_use]
    pub fn observed(id: DeviceId) -> Self {
        Self {
            name: id.to_string(),
            id,
            category: String::new(),
            online: true,
            status: StatusMap::new(),
            function: BTreeMap::new(),
            status_range: BTreeMap::new(),
            local_strategy: LocalStrategy::new(),
            data_model: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Whether a non-empty data-model blob is present.
    #[must_use]
    pub fn has_data_model(&self) -> bool {
        self.data_model.as_deref().is_some_and(|dm| !dm.is_empty())
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`FuseHubError::Validation`] when the id is empty or a
    /// local-strategy entry has no status code.
    pub fn validate(&self) -> Result<(), FuseHubError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyDeviceId.into());
        }
        self.local_strategy.validate()?;
        Ok(())
    }
}

impl PartialEq for DeviceRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DeviceRecord {}

impl Hash for DeviceRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Copy into `destination` every property entry of `source` whose key is
/// missing from `destination`.
///
/// Existing keys are never overwritten. The data-model blob is copied only
/// when `destination` has none and `source` has one. Identity fields (id,
/// name, category, online) are left alone.
pub fn merge_properties(destination: &mut DeviceRecord, source: &DeviceRecord) {
    merge_missing(&mut destination.status, &source.status);
    merge_missing(&mut destination.function, &source.function);
    merge_missing(&mut destination.status_range, &source.status_range);
    for (dp_id, strategy) in &source.local_strategy {
        destination.local_strategy.insert_if_absent(*dp_id, strategy);
    }
    if !destination.has_data_model() && source.has_data_model() {
        destination.data_model.clone_from(&source.data_model);
    }
}

fn merge_missing<V: Clone>(destination: &mut BTreeMap<String, V>, source: &BTreeMap<String, V>) {
    for (key, value) in source {
        if !destination.contains_key(key) {
            destination.insert(key.clone(), value.clone());
        }
    }
}

/// Step-by-step builder for [`DeviceRecord`].
#[derive(Debug, Default)]
pub struct DeviceRecordBuilder {
    id: Option<DeviceId>,
    name: Option<String>,
    category: Option<String>,
    online: Option<bool>,
    status: StatusMap,
    function: BTreeMap<String, DeviceFunction>,
    status_range: BTreeMap<String, StatusRange>,
    local_strategy: LocalStrategy,
    data_model: Option<String>,
}

impl DeviceRecordBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<DeviceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn online(mut self, online: bool) -> Self {
        self.online = Some(online);
        self
    }

    #[must_use]
    pub fn status(mut self, code: impl Into<String>, value: serde_json::Value) -> Self {
        self.status.insert(code.into(), value);
        self
    }

    #[must_use]
    pub fn function(mut self, function: DeviceFunction) -> Self {
        self.function.insert(function.code.clone(), function);
        self
    }

    #[must_use]
    pub fn status_range(mut self, range: StatusRange) -> Self {
        self.status_range.insert(range.code.clone(), range);
        self
    }

    #[must_use]
    pub fn strategy(mut self, dp_id: DpId, strategy: DpStrategy) -> Self {
        self.local_strategy.insert(dp_id, strategy);
        self
    }

    #[must_use]
    pub fn data_model(mut self, data_model: impl Into<String>) -> Self {
        self.data_model = Some(data_model.into());
        self
    }

    /// Consume the builder, validate, and return a [`DeviceRecord`].
    ///
    /// The display name defaults to the identifier; the device is online
    /// unless stated otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`FuseHubError::Validation`] if the id is missing or empty.
    pub fn build(self) -> Result<DeviceRecord, FuseHubError> {
        let id = self.id.unwrap_or_else(|| DeviceId::new(""));
        let record = DeviceRecord {
            name: self.name.unwrap_or_else(|| id.to_string()),
            id,
            category: self.category.unwrap_or_default(),
            online: self.online.unwrap_or(true),
            status: self.status,
            function: self.function,
            status_range: self.status_range,
            local_strategy: self.local_strategy,
            data_model: self.data_model,
        };
        record.validate()?;
        Ok(record)
    }
}
