use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single entry from the external feed.
///
/// The feed defines the record; the engine only relies on the unique `id`
/// and the `event_timestamp` (Unix seconds). Everything else rides along in
/// `payload` untouched for the rendering layer to interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    pub id: String,
    pub event_timestamp: u64,
    #[serde(default)]
    pub payload: Value,
}

impl FeedEvent {
    pub fn new(id: impl Into<String>, event_timestamp: u64) -> Self {
        Self {
            id: id.into(),
            event_timestamp,
            payload: Value::Null,
        }
    }
}
