//! Streaming chat completion frames.

use crate::query::Role;
use serde::{Deserialize, Serialize};

/// One incremental piece of a streamed completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatStreamResult {
    /// Completion identifier, shared by every frame of one response.
    pub id: String,
    /// Object type, normally "chat.completion.chunk".
    pub object: String,
    /// Unix timestamp of creation.
    pub created: i64,
    /// Model producing the stream.
    pub model: String,
    /// Per-choice deltas.
    pub choices: Vec<StreamChoice>,
}

impl ChatStreamResult {
    /// Content delta of the first choice, or an empty string.
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .unwrap_or("")
    }

    /// Finish reason of the first choice, present on the last frame.
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.finish_reason.as_deref())
    }

    /// Whether this frame closes the first choice.
    pub fn is_final(&self) -> bool {
        self.finish_reason().is_some()
    }
}

/// Delta for one choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChoice {
    /// Choice index.
    pub index: u32,
    /// Incremental content.
    pub delta: StreamDelta,
    /// Set on the frame that ends this choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Incremental message content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Role, sent on the first frame only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Content fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}
