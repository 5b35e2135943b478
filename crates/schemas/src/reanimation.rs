// Reanimation state
//
// Snapshot of a paused run. Storage never looks inside it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque serialized execution snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReanimationState(pub Value);

impl ReanimationState {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl From<Value> for ReanimationState {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
