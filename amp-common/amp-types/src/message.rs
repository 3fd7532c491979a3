use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message to be sent to an agent or broadcast to a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub payload: Value,
    /// Where replies should go, e.g. a REST URL or `platform/container/agent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl Message {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            reply_to: None,
        }
    }

    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }
}
