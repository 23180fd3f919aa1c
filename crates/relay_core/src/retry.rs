//! Retry decisions for failed queue items.
//!
//! The coordinator is the only writer of [`RetryInfo`]. It never sleeps; it
//! returns the delay the caller has to honour before the item is eligible again.

use std::time::Duration;

use rand::Rng;

use crate::{categorize, compute_delay, ErrorCategory, ItemStatus, QueueItem, RetryConfig, RetryInfo};

/// Observability signal accompanying a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrySignal {
    RetryAttempted,
    PermanentlyFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryDecision {
    pub next_status: ItemStatus,
    pub retry_info: RetryInfo,
    pub category: ErrorCategory,
    /// Wait before the item may be picked up again; `Some` only for `Pending`.
    pub delay: Option<Duration>,
    pub signal: RetrySignal,
}

impl RetryDecision {
    pub fn will_retry(&self) -> bool {
        self.next_status == ItemStatus::Pending
    }
}

pub struct RetryCoordinator<'a> {
    config: &'a RetryConfig,
}

impl<'a> RetryCoordinator<'a> {
    pub fn new(config: &'a RetryConfig) -> Self {
        Self { config }
    }

    /// Classifies `raw_error` and decides the item's next status.
    pub fn on_failure<R: Rng + ?Sized>(
        &self,
        item: &QueueItem,
        raw_error: &str,
        now_ms: i64,
        rng: &mut R,
    ) -> RetryDecision {
        self.on_categorized_failure(item, categorize(raw_error), now_ms, rng)
    }

    /// Same as [`on_failure`](Self::on_failure) when the category is already
    /// known (bridge timeouts, failed handshakes).
    pub fn on_categorized_failure<R: Rng + ?Sized>(
        &self,
        item: &QueueItem,
        category: ErrorCategory,
        now_ms: i64,
        rng: &mut R,
    ) -> RetryDecision {
        let config = self.config;
        let mut info = item
            .retry_info
            .clone()
            .unwrap_or_else(|| RetryInfo::new(config.max_attempts));
        info.attempts = info.attempts.saturating_add(1);
        info.max_attempts = config.max_attempts;
        info.last_attempt_time = Some(now_ms);
        info.error_category = Some(category);

        let can_retry =
            config.enabled && category.is_retryable() && info.attempts < config.max_attempts;

        if can_retry && config.auto_retry {
            let delay = compute_delay(
                info.attempts,
                config.base_delay_ms,
                config.max_delay_ms,
                category,
                rng,
            );
            info.next_retry_time = Some(now_ms.saturating_add(delay.as_millis() as i64));
            RetryDecision {
                next_status: ItemStatus::Pending,
                retry_info: info,
                category,
                delay: Some(delay),
                signal: RetrySignal::RetryAttempted,
            }
        } else {
            info.next_retry_time = None;
            RetryDecision {
                next_status: ItemStatus::Failed,
                retry_info: info,
                category,
                delay: None,
                signal: RetrySignal::PermanentlyFailed,
            }
        }
    }
}

/// Writes a decision back onto the item, keeping the causing message.
pub fn apply_decision(item: &mut QueueItem, decision: &RetryDecision, message: &str) {
    item.status = decision.next_status;
    item.retry_info = Some(decision.retry_info.clone());
    item.error = Some(message.to_string());
}
