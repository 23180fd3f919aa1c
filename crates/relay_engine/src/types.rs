use std::fmt;
use std::time::Duration;

use relay_core::{ErrorCategory, ItemId, ItemStatus, RejectReason, RunEnd, RunMode, TabId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
}

/// One request per item attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Storage slot holding the item's images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AutomationResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeError {
    pub kind: BridgeFailure,
    pub message: String,
}

impl BridgeError {
    pub(crate) fn new(kind: BridgeFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Category fixed by the failure kind; `None` means classify the message.
    pub fn forced_category(&self) -> Option<ErrorCategory> {
        match self.kind {
            BridgeFailure::NotReady => Some(ErrorCategory::Network),
            BridgeFailure::Timeout => Some(ErrorCategory::Timeout),
            BridgeFailure::NoDestination | BridgeFailure::Rejected | BridgeFailure::Transport => {
                None
            }
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for BridgeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeFailure {
    NoDestination,
    NotReady,
    Timeout,
    /// The agent answered with `success: false`.
    Rejected,
    Transport,
}

impl fmt::Display for BridgeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeFailure::NoDestination => write!(f, "no destination"),
            BridgeFailure::NotReady => write!(f, "agent not ready"),
            BridgeFailure::Timeout => write!(f, "timeout"),
            BridgeFailure::Rejected => write!(f, "rejected"),
            BridgeFailure::Transport => write!(f, "transport error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    RunStarted {
        mode: RunMode,
    },
    /// An item left `Processing` at startup was resolved by the recovery policy.
    ItemRecovered {
        item_id: ItemId,
        status: ItemStatus,
    },
    ItemStarted {
        item_id: ItemId,
        tool: Option<String>,
        tab_id: TabId,
    },
    ItemCompleted {
        item_id: ItemId,
        completion_time_seconds: Option<f64>,
    },
    RetryScheduled {
        item_id: ItemId,
        attempt: u32,
        category: ErrorCategory,
        delay: Duration,
    },
    ItemFailed {
        item_id: ItemId,
        category: ErrorCategory,
        message: String,
    },
    RunFinished {
        reason: RunEnd,
    },
    ReadinessProbed {
        tab_id: Option<TabId>,
        error: Option<String>,
    },
    ScheduleFired {
        scheduled_at: i64,
        started: bool,
        next_at: Option<i64>,
    },
    ScheduleArmed {
        scheduled_at: i64,
        repeat_daily: bool,
    },
    ScheduleCancelled,
    ItemsReset {
        count: usize,
    },
    CommandRejected {
        reason: RejectReason,
    },
}
