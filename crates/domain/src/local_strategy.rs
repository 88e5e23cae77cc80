//! Local strategy — per-device table describing how each data point is read
//! and written.
//!
//! Keys are numeric data-point ids. Each entry names the symbolic status code
//! for that data point and the transport flags that decide which backend call
//! a command on it turns into.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Numeric identifier of a device capability in the device protocol.
pub type DpId = u32;

/// Declared value type of a data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DpValueType {
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "value")]
    Integer,
    Enum,
    String,
    Bitmap,
    Json,
    Raw,
}

/// How one data point is read and written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpStrategy {
    /// Symbolic code this data point reports under.
    pub status_code: String,
    /// Commands go through the API account instead of the push account.
    #[serde(default, rename = "use_open_api")]
    pub use_remote_api: bool,
    /// Commands are sent as a property update keyed by data-point id.
    #[serde(default)]
    pub property_update: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<DpValueType>,
}

impl DpStrategy {
    /// A plain push-account data point.
    #[must_use]
    pub fn new(status_code: impl Into<String>) -> Self {
        Self {
            status_code: status_code.into(),
            use_remote_api: false,
            property_update: false,
            value_type: None,
        }
    }

    #[must_use]
    pub fn with_remote_api(mut self) -> Self {
        self.use_remote_api = true;
        self
    }

    #[must_use]
    pub fn with_property_update(mut self) -> Self {
        self.property_update = true;
        self
    }

    #[must_use]
    pub fn with_value_type(mut self, value_type: DpValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }
}

/// Data-point id → strategy table for one device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalStrategy(BTreeMap<DpId, DpStrategy>);

impl LocalStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, dp_id: DpId) -> Option<&DpStrategy> {
        self.0.get(&dp_id)
    }

    #[must_use]
    pub fn contains(&self, dp_id: DpId) -> bool {
        self.0.contains_key(&dp_id)
    }

    /// Insert or replace the entry for `dp_id`.
    pub fn insert(&mut self, dp_id: DpId, strategy: DpStrategy) -> Option<DpStrategy> {
        self.0.insert(dp_id, strategy)
    }

    /// Insert only when `dp_id` has no entry yet. Returns whether it was added.
    pub fn insert_if_absent(&mut self, dp_id: DpId, strategy: &DpStrategy) -> bool {
        match self.0.entry(dp_id) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(strategy.clone());
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Iterate entries in ascending data-point id order.
    pub fn iter(&self) -> btree_map::Iter<'_, DpId, DpStrategy> {
        self.0.iter()
    }

    /// Data-point ids in ascending order.
    pub fn dp_ids(&self) -> impl Iterator<Item = DpId> + '_ {
        self.0.keys().copied()
    }

    /// First entry, in ascending id order, whose status code is `code`.
    #[must_use]
    pub fn find_by_code(&self, code: &str) -> Option<(DpId, &DpStrategy)> {
        self.0
            .iter()
            .find(|(_, strategy)| strategy.status_code == code)
            .map(|(dp_id, strategy)| (*dp_id, strategy))
    }

    /// Resolve a symbolic code to its data-point id.
    #[must_use]
    pub fn code_to_id(&self, code: &str) -> Option<DpId> {
        self.find_by_code(code).map(|(dp_id, _)| dp_id)
    }

    /// Resolve a data-point id to its symbolic code.
    #[must_use]
    pub fn id_to_code(&self, dp_id: DpId) -> Option<&str> {
        self.0
            .get(&dp_id)
            .map(|strategy| strategy.status_code.as_str())
    }

    /// Check that every entry names a status code.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyStatusCode`] for the first offending entry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self
            .0
            .iter()
            .find(|(_, strategy)| strategy.status_code.is_empty())
        {
            Some((dp_id, _)) => Err(ValidationError::EmptyStatusCode(*dp_id)),
            None => Ok(()),
        }
    }
}

impl FromIterator<(DpId, DpStrategy)> for LocalStrategy {
    fn from_iter<T: IntoIterator<Item = (DpId, DpStrategy)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a LocalStrategy {
    type Item = (&'a DpId, &'a DpStrategy);
    type IntoIter = btree_map::Iter<'a, DpId, DpStrategy>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
