//! Per-board chat transcript store.
//!
//! The engine does not talk to a model; it only persists the transcript
//! next to the board so the chat collaborator can resume it.

use serde::{Deserialize, Serialize};

/// Current on-disk version of [`ChatStore`].
pub const CHAT_STORE_VERSION: u32 = 1;

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub id: String,
    pub role: String,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ChatEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: role.into(),
            content: content.into(),
            created_at,
            session_id: None,
        }
    }
}

/// Chat history with a rolling summary of older messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatStore {
    pub version: u32,
    pub messages: Vec<ChatEntry>,
    pub summary: Option<String>,
    /// Number of leading messages folded into `summary`.
    pub summary_up_to: usize,
    pub last_session_id: Option<String>,
}

impl Default for ChatStore {
    fn default() -> Self {
        Self {
            version: CHAT_STORE_VERSION,
            messages: Vec::new(),
            summary: None,
            summary_up_to: 0,
            last_session_id: None,
        }
    }
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ChatEntry) {
        if entry.session_id.is_some() {
            self.last_session_id = entry.session_id.clone();
        }
        self.messages.push(entry);
    }

    /// Messages not yet covered by the summary.
    pub fn unsummarized(&self) -> &[ChatEntry] {
        let start = self.summary_up_to.min(self.messages.len());
        &self.messages[start..]
    }

    /// Replace the rolling summary, covering the first `up_to` messages.
    pub fn set_summary(&mut self, summary: impl Into<String>, up_to: usize) {
        self.summary = Some(summary.into());
        self.summary_up_to = up_to.min(self.messages.len());
    }
}
