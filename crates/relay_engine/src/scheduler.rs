use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_error, engine_info, engine_warn};
use relay_core::{has_pending, ScheduleConfig, SettingsPatch, DAY_MS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::store::Storage;

/// Delivered to the dispatcher when an armed timer expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTick {
    pub scheduled_at: i64,
    pub repeat_daily: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireOutcome {
    /// The dispatcher should start a run (it ignores this when one is active).
    pub start: bool,
    pub next_at: Option<i64>,
}

/// One-shot timer that starts runs at a configured time, optionally daily.
///
/// The scheduler never touches queue items or process state; firing only
/// asks the dispatcher to start a run. `applied` is the configuration the
/// timer currently reflects; a stored configuration that differs from it was
/// written by another process and is picked up by [`Scheduler::refresh`].
pub struct Scheduler {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    tick_tx: mpsc::UnboundedSender<ScheduleTick>,
    timer: Option<JoinHandle<()>>,
    applied: ScheduleConfig,
}

impl Scheduler {
    pub fn new(
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        tick_tx: mpsc::UnboundedSender<ScheduleTick>,
    ) -> Self {
        Self {
            storage,
            clock,
            tick_tx,
            timer: None,
            applied: ScheduleConfig::default(),
        }
    }

    /// Arms the stored configuration without writing it back.
    pub fn restore(&mut self, config: ScheduleConfig) {
        if let Some(at) = config.armed_at() {
            self.arm(at, config.repeat_daily);
        }
        self.applied = config;
    }

    /// Re-reads the stored configuration and applies it when another writer
    /// changed it. Returns the newly applied configuration.
    pub fn refresh(&mut self) -> Option<ScheduleConfig> {
        let stored = match self.storage.get_settings() {
            Ok(settings) => settings.schedule_config,
            Err(err) => {
                engine_warn!("Failed to re-read schedule: {}", err);
                return None;
            }
        };
        if stored == self.applied {
            return None;
        }
        engine_info!("Stored schedule changed to {:?}", stored);
        match stored.armed_at() {
            Some(at) => self.arm(at, stored.repeat_daily),
            None => self.disarm(),
        }
        self.applied = stored.clone();
        Some(stored)
    }

    /// Replaces any armed timer. A time in the past fires immediately.
    pub fn arm(&mut self, scheduled_at: i64, repeat_daily: bool) {
        self.disarm();
        let wait_ms = scheduled_at.saturating_sub(self.clock.now_ms()).max(0) as u64;
        engine_info!(
            "Schedule armed for {} (in {}s, daily: {})",
            scheduled_at,
            wait_ms / 1000,
            repeat_daily
        );
        let tick_tx = self.tick_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            let _ = tick_tx.send(ScheduleTick {
                scheduled_at,
                repeat_daily,
            });
        }));
    }

    /// Stops the timer without changing the stored configuration.
    pub fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Disarms and turns scheduling off. Queue and process state are untouched.
    pub fn cancel(&mut self) {
        self.disarm();
        self.disable();
        engine_info!("Schedule cancelled");
    }

    /// Persists `config` and arms it when it is enabled.
    pub fn configure(&mut self, config: ScheduleConfig) -> Option<i64> {
        if let Err(err) = self.storage.set_settings(SettingsPatch::schedule(config.clone())) {
            engine_error!("Failed to store schedule: {}", err);
        }
        self.applied = config.clone();
        match config.armed_at() {
            Some(at) => {
                self.arm(at, config.repeat_daily);
                Some(at)
            }
            None => {
                self.disarm();
                None
            }
        }
    }

    /// Handles an expired timer: decides whether a run should start and
    /// re-arms daily schedules.
    pub fn on_fire(&mut self, tick: ScheduleTick) -> FireOutcome {
        self.timer = None;
        let settings = match self.storage.get_settings() {
            Ok(settings) => settings,
            Err(err) => {
                engine_error!("Schedule fired but settings are unreadable: {}", err);
                return FireOutcome {
                    start: false,
                    next_at: None,
                };
            }
        };
        if !settings.schedule_config.enabled {
            engine_info!("Schedule fired while disabled");
            self.disable();
            return FireOutcome {
                start: false,
                next_at: None,
            };
        }

        let pending = match self.storage.get_queue() {
            Ok(queue) => has_pending(&queue),
            Err(err) => {
                engine_warn!("Schedule fired but queue is unreadable: {}", err);
                false
            }
        };
        if !pending {
            engine_info!("Schedule fired with no pending items, disabling");
            self.disable();
            return FireOutcome {
                start: false,
                next_at: None,
            };
        }

        let next_at = if tick.repeat_daily {
            let next = next_daily(tick.scheduled_at, self.clock.now_ms());
            let config = ScheduleConfig {
                scheduled_at: Some(next),
                ..settings.schedule_config
            };
            if let Err(err) = self.storage.set_settings(SettingsPatch::schedule(config.clone())) {
                engine_error!("Failed to store next schedule time: {}", err);
            }
            self.applied = config;
            self.arm(next, true);
            Some(next)
        } else {
            self.disable();
            None
        };

        FireOutcome {
            start: true,
            next_at,
        }
    }

    fn disable(&mut self) {
        let current = match self.storage.get_settings() {
            Ok(settings) => settings.schedule_config,
            Err(err) => {
                engine_warn!("Failed to read schedule before disabling: {}", err);
                ScheduleConfig::default()
            }
        };
        let disabled = current.disabled();
        if let Err(err) = self.storage.set_settings(SettingsPatch::schedule(disabled.clone())) {
            engine_error!("Failed to disable schedule: {}", err);
        }
        self.applied = disabled;
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// `scheduled_at + 24h`, advanced by whole days until it lies after `now`.
pub fn next_daily(scheduled_at: i64, now_ms: i64) -> i64 {
    let mut next = scheduled_at.saturating_add(DAY_MS);
    if next <= now_ms {
        let behind = now_ms - next;
        next = next.saturating_add((behind / DAY_MS + 1) * DAY_MS);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_daily_is_one_day_later() {
        assert_eq!(next_daily(1_000, 2_000), 1_000 + DAY_MS);
    }

    #[test]
    fn next_daily_skips_missed_days() {
        let at = 0;
        let now = 3 * DAY_MS + 5;
        let next = next_daily(at, now);
        assert_eq!(next, 4 * DAY_MS);
        assert!(next > now);
    }
}
