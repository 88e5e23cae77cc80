//! Events published to the host platform.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::account::AccountSource;
use crate::command::BatchKind;
use crate::id::{DeviceId, EventId};
use crate::time::{Timestamp, now};

/// A timestamped notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    #[serde(flatten)]
    pub kind: EventKind,
    pub timestamp: Timestamp,
}

impl Event {
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: EventId::new(),
            kind,
            timestamp: now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// The aggregated view was rebuilt; these devices were part of it.
    DevicesChanged { device_ids: Vec<DeviceId> },
    /// Two accounts reported different values for the same status code
    /// within the conflict window.
    StatusConflict(StatusConflict),
    /// A command batch failed or timed out.
    CommandDispatchFailed {
        device_id: DeviceId,
        batch: BatchKind,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusConflict {
    pub device_id: DeviceId,
    pub code: String,
    pub source: AccountSource,
    pub value: Value,
    pub other_source: AccountSource,
    pub other_value: Value,
}
