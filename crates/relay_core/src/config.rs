use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub auto_retry: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 5_000,
            max_delay_ms: 120_000,
            auto_retry: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    /// Epoch milliseconds.
    pub scheduled_at: Option<i64>,
    pub repeat_daily: bool,
}

impl ScheduleConfig {
    pub fn once(at_ms: i64) -> Self {
        Self {
            enabled: true,
            scheduled_at: Some(at_ms),
            repeat_daily: false,
        }
    }

    pub fn daily(at_ms: i64) -> Self {
        Self {
            enabled: true,
            scheduled_at: Some(at_ms),
            repeat_daily: true,
        }
    }

    /// Enabled and pointing at a concrete time.
    pub fn armed_at(&self) -> Option<i64> {
        if self.enabled {
            self.scheduled_at
        } else {
            None
        }
    }

    pub fn disabled(&self) -> Self {
        Self {
            enabled: false,
            ..self.clone()
        }
    }
}

/// Inter-item pacing windows, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PacingConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub drip_min_delay_ms: u64,
    pub drip_max_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 2_000,
            max_delay_ms: 5_000,
            drip_min_delay_ms: 30_000,
            drip_max_delay_ms: 90_000,
        }
    }
}

impl PacingConfig {
    /// Window for the current mode, normalized so that `min <= max`.
    pub fn window(&self, drip_feed: bool) -> (Duration, Duration) {
        let (lo, hi) = if drip_feed {
            (self.drip_min_delay_ms, self.drip_max_delay_ms)
        } else {
            (self.min_delay_ms, self.max_delay_ms)
        };
        (
            Duration::from_millis(lo.min(hi)),
            Duration::from_millis(lo.max(hi)),
        )
    }
}

/// User-facing settings shared with the UI collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Administrative switch; a disabled engine refuses to start runs.
    pub automation_enabled: bool,
    pub retry_config: RetryConfig,
    pub schedule_config: ScheduleConfig,
    pub use_tool_sequence: bool,
    pub tool_sequence: Vec<String>,
    pub drip_feed: bool,
    pub pacing: PacingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            automation_enabled: true,
            retry_config: RetryConfig::default(),
            schedule_config: ScheduleConfig::default(),
            use_tool_sequence: false,
            tool_sequence: Vec::new(),
            drip_feed: false,
            pacing: PacingConfig::default(),
        }
    }
}

/// Merge-patch for [`Settings`]; `None` leaves the field untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub automation_enabled: Option<bool>,
    pub retry_config: Option<RetryConfig>,
    pub schedule_config: Option<ScheduleConfig>,
    pub use_tool_sequence: Option<bool>,
    pub tool_sequence: Option<Vec<String>>,
    pub drip_feed: Option<bool>,
    pub pacing: Option<PacingConfig>,
}

impl SettingsPatch {
    pub fn schedule(config: ScheduleConfig) -> Self {
        Self {
            schedule_config: Some(config),
            ..Self::default()
        }
    }
}

impl Settings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(value) = patch.automation_enabled {
            self.automation_enabled = value;
        }
        if let Some(value) = patch.retry_config {
            self.retry_config = value;
        }
        if let Some(value) = patch.schedule_config {
            self.schedule_config = value;
        }
        if let Some(value) = patch.use_tool_sequence {
            self.use_tool_sequence = value;
        }
        if let Some(value) = patch.tool_sequence {
            self.tool_sequence = value;
        }
        if let Some(value) = patch.drip_feed {
            self.drip_feed = value;
        }
        if let Some(value) = patch.pacing {
            self.pacing = value;
        }
    }
}
