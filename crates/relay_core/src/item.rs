use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ErrorCategory;

/// Opaque queue item identifier. Assigned once at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ItemStatus {
    /// `Completed` and `Failed` only leave via an explicit reset.
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    pub name: String,
    pub mime_type: String,
    /// Base64 payload, handed to the automation agent through a storage slot.
    pub data: String,
}

/// Retry bookkeeping. Written only by the retry coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryInfo {
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_attempt_time: Option<i64>,
    pub next_retry_time: Option<i64>,
    pub error_category: Option<ErrorCategory>,
}

impl RetryInfo {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            last_attempt_time: None,
            next_retry_time: None,
            error_category: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: ItemId,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_prompt: Option<String>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub completion_time_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_info: Option<RetryInfo>,
}

impl QueueItem {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: ItemId::generate(),
            prompt: prompt.into(),
            final_prompt: None,
            status: ItemStatus::Pending,
            tool: None,
            mode: None,
            images: Vec::new(),
            start_time: None,
            end_time: None,
            completion_time_seconds: None,
            result: None,
            error: None,
            retry_info: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<ItemId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_images(mut self, images: Vec<ImageAttachment>) -> Self {
        self.images = images;
        self
    }

    /// Prompt text sent to the destination: the expanded form when present.
    pub fn effective_prompt(&self) -> &str {
        self.final_prompt.as_deref().unwrap_or(&self.prompt)
    }

    /// Pending → Processing. Clears timestamps left over from an earlier attempt.
    pub fn mark_processing(&mut self, now_ms: i64) {
        self.status = ItemStatus::Processing;
        self.start_time = Some(now_ms);
        self.end_time = None;
        self.completion_time_seconds = None;
    }

    pub fn mark_completed(&mut self, result: Option<serde_json::Value>, now_ms: i64) {
        self.status = ItemStatus::Completed;
        self.end_time = Some(now_ms);
        self.completion_time_seconds = self
            .start_time
            .map(|start| (now_ms - start).max(0) as f64 / 1000.0);
        self.result = result;
        self.error = None;
    }

    /// External "retry" action. Only terminal items are reset; returns whether
    /// anything changed.
    pub fn reset_to_pending(&mut self) -> bool {
        if !self.status.is_terminal() {
            return false;
        }
        self.status = ItemStatus::Pending;
        self.retry_info = None;
        self.error = None;
        self.result = None;
        self.start_time = None;
        self.end_time = None;
        self.completion_time_seconds = None;
        true
    }
}
