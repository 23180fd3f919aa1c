//! Relay core: queue data model, retry policy and the pure control dispatcher.
mod backoff;
mod classify;
mod command;
mod config;
mod effect;
mod item;
mod process;
mod queue;
mod retry;
mod state;
mod update;

pub use backoff::{compute_delay, nominal_delay, JITTER_FRACTION};
pub use classify::{categorize, ErrorCategory};
pub use command::{Command, Msg, RunEnd};
pub use config::{PacingConfig, RetryConfig, ScheduleConfig, Settings, SettingsPatch, DAY_MS};
pub use effect::{Effect, RejectReason, RunMode};
pub use item::{ImageAttachment, ItemId, ItemStatus, QueueItem, RetryInfo};
pub use process::{ProcessState, ProcessStatePatch, TabId};
pub use queue::{
    find_item_mut, has_pending, interrupted_items, next_pending, reset_items, tool_for_index,
    QueueSummary,
};
pub use retry::{apply_decision, RetryCoordinator, RetryDecision, RetrySignal};
pub use state::{ControlState, RunPhase};
pub use update::update;
