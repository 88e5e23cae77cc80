//! Virtual functions — device-category features that do not map one-to-one
//! onto a native data point.
//!
//! A descriptor either expands into one or more native commands, or, for a
//! reset-state code, resets the matching status value locally.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::Command;
use crate::error::ValidationError;

/// A native command a virtual function turns into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualTarget {
    pub code: String,
    /// Fixed value to send. `None` forwards the invoking command's value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// One virtual function of a device category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualFunctionDescriptor {
    pub key: String,
    #[serde(default)]
    pub category: String,
    /// Status codes this function resets when invoked with them.
    #[serde(default)]
    pub reset_state: BTreeSet<String>,
    #[serde(default)]
    pub targets: Vec<VirtualTarget>,
}

impl VirtualFunctionDescriptor {
    #[must_use]
    pub fn new(key: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            category: category.into(),
            reset_state: BTreeSet::new(),
            targets: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_reset_state(mut self, code: impl Into<String>) -> Self {
        self.reset_state.insert(code.into());
        self
    }

    #[must_use]
    pub fn with_target(mut self, code: impl Into<String>, value: Option<Value>) -> Self {
        self.targets.push(VirtualTarget {
            code: code.into(),
            value,
        });
        self
    }

    /// Whether a command with this code is handled by this function.
    #[must_use]
    pub fn matches(&self, code: &str) -> bool {
        self.key == code || self.reset_state.contains(code)
    }

    #[must_use]
    pub fn is_reset_code(&self, code: &str) -> bool {
        self.reset_state.contains(code)
    }

    /// Native commands produced by invoking this function with `value`.
    #[must_use]
    pub fn expand(&self, value: &Value) -> Vec<Command> {
        self.targets
            .iter()
            .map(|target| {
                Command::new(
                    target.code.clone(),
                    target.value.clone().unwrap_or_else(|| value.clone()),
                )
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyFunctionKey`] when the key is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.key.trim().is_empty() {
            return Err(ValidationError::EmptyFunctionKey);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn should_match_key_and_reset_codes() {
        let vf = VirtualFunctionDescriptor::new("countdown", "kg").with_reset_state("countdown_left");
        assert!(vf.matches("countdown"));
        assert!(vf.matches("countdown_left"));
        assert!(vf.is_reset_code("countdown_left"));
        assert!(!vf.matches("switch_1"));
    }

    #[test]
    fn should_expand_with_fixed_and_forwarded_values() {
        let vf = VirtualFunctionDescriptor::new("all_on", "kg")
            .with_target("switch_1", Some(json!(true)))
            .with_target("brightness", None);
        let commands = vf.expand(&json!(80));
        assert_eq!(
            commands,
            vec![
                Command::new("switch_1", json!(true)),
                Command::new("brightness", json!(80)),
            ]
        );
    }

    #[test]
    fn should_reject_empty_key() {
        let vf = VirtualFunctionDescriptor::new(" ", "kg");
        assert_eq!(vf.validate(), Err(ValidationError::EmptyFunctionKey));
    }

    #[test]
    fn should_deserialize_with_defaults() {
        let vf: VirtualFunctionDescriptor = serde_json::from_value(json!({"key": "scene"})).unwrap();
        assert!(vf.targets.is_empty());
        assert!(vf.reset_state.is_empty());
    }
}
