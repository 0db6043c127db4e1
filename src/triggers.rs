//! Deferred action descriptions emitted by scripts
//!
//! A script requests a side effect by calling the `trigger(kind, payload?)`
//! intrinsic. The executor only buffers these, in emission order, and hands
//! them back with the evaluation result; dispatching them is entirely the
//! caller's concern.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// An opaque, serializable action description for downstream dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerAction {
    /// Discriminator interpreted by the action dispatcher, never by this crate
    pub kind: String,
    /// Arbitrary payload captured at emission time
    #[serde(default)]
    pub payload: JsonValue,
}

impl TriggerAction {
    pub fn new(kind: impl Into<String>, payload: JsonValue) -> Self {
        TriggerAction {
            kind: kind.into(),
            payload,
        }
    }
}
