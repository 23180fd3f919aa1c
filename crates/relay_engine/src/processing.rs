//! The run loop: one item in flight, strictly in queue order.

use std::sync::Arc;

use engine_logging::{engine_error, engine_info, engine_warn, short_id};
use rand::rngs::StdRng;
use relay_core::{
    apply_decision, find_item_mut, has_pending, interrupted_items, next_pending, tool_for_index,
    ItemStatus, ProcessStatePatch, QueueItem, RetryCoordinator, RunEnd, RunMode, Settings,
};
use tokio_util::sync::CancellationToken;

use crate::bridge::AutomationBridge;
use crate::clock::Clock;
use crate::events::EventSink;
use crate::pacing::{inter_item_delay, pace_between_items, wait_for_retry};
use crate::store::{ProcessStateStore, Storage};
use crate::EngineEvent;

/// Failure message recorded on items found `Processing` when a run starts.
pub const INTERRUPTED_MESSAGE: &str = "interrupted: engine stopped before the item finished";

enum Step {
    Continue,
    Finished(RunEnd),
}

pub struct ProcessingLoop {
    storage: Arc<dyn Storage>,
    process: ProcessStateStore,
    bridge: Arc<AutomationBridge>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
    rng: StdRng,
}

impl ProcessingLoop {
    pub fn new(
        storage: Arc<dyn Storage>,
        bridge: Arc<AutomationBridge>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
        cancel: CancellationToken,
        rng: StdRng,
    ) -> Self {
        Self {
            process: ProcessStateStore::new(storage.clone()),
            storage,
            bridge,
            clock,
            events,
            cancel,
            rng,
        }
    }

    /// Marks the run active. Called before the loop is spawned so that a
    /// pause issued right after the start cannot be overwritten.
    pub fn begin(&self) {
        self.process.set(ProcessStatePatch::started());
    }

    pub async fn run(mut self, mode: RunMode) -> RunEnd {
        engine_info!("Run started ({:?})", mode);
        self.events.emit(EngineEvent::RunStarted { mode: mode.clone() });

        let end = match self.recover_interrupted() {
            Ok(()) => self.drive(&mode).await,
            Err(end) => end,
        };

        self.process.set(ProcessStatePatch::finished());
        engine_info!("Run finished: {:?}", end);
        self.events.emit(EngineEvent::RunFinished { reason: end });
        end
    }

    async fn drive(&mut self, mode: &RunMode) -> RunEnd {
        loop {
            if let Some(end) = self.interruption() {
                return end;
            }
            let queue = match self.storage.get_queue() {
                Ok(queue) => queue,
                Err(err) => {
                    engine_error!("Failed to read queue: {}", err);
                    return RunEnd::StorageUnavailable;
                }
            };
            let index = match mode {
                RunMode::Queue => next_pending(&queue),
                RunMode::Single(id) => queue
                    .iter()
                    .position(|item| &item.id == id && item.status == ItemStatus::Pending),
            };
            let Some(index) = index else {
                return RunEnd::Completed;
            };
            if let Step::Finished(end) = self.process_item(queue, index, mode).await {
                return end;
            }
        }
    }

    /// Cooperative cancellation point, checked once per iteration. Stop
    /// arrives through the token only, so a lost process-state write cannot
    /// end the run.
    fn interruption(&self) -> Option<RunEnd> {
        if self.cancel.is_cancelled() {
            return Some(RunEnd::Stopped);
        }
        self.process.get().is_paused.then_some(RunEnd::Paused)
    }

    async fn process_item(&mut self, mut queue: Vec<QueueItem>, index: usize, mode: &RunMode) -> Step {
        let settings = self.load_settings();
        let tool = tool_for_index(&settings, &queue, index);

        let preferred = self.process.get().active_tab_id;
        let tab = match self.bridge.discover(preferred.as_ref()).await {
            Ok(tab) => tab,
            Err(err) => {
                engine_error!("Stopping run: {}", err);
                return Step::Finished(RunEnd::NoDestination);
            }
        };
        if preferred.as_ref() != Some(&tab) {
            self.process.set(ProcessStatePatch::active_tab(tab.clone()));
        }

        queue[index].mark_processing(self.clock.now_ms());
        let snapshot = queue[index].clone();
        if let Err(end) = self.save(&queue) {
            return Step::Finished(end);
        }
        engine_info!(
            "Processing item {} at position {} (tool {:?})",
            short_id(snapshot.id.as_str()),
            index,
            tool
        );
        self.events.emit(EngineEvent::ItemStarted {
            item_id: snapshot.id.clone(),
            tool: tool.clone(),
            tab_id: tab.clone(),
        });

        let outcome = self.bridge.run_item(&tab, &snapshot, tool).await;

        // Re-read so edits made by other writers during the exchange survive.
        let mut queue = match self.storage.get_queue() {
            Ok(queue) => queue,
            Err(err) => {
                engine_error!(
                    "Failed to read queue after exchange, item {} stays processing: {}",
                    short_id(snapshot.id.as_str()),
                    err
                );
                return Step::Finished(RunEnd::StorageUnavailable);
            }
        };
        let single = matches!(mode, RunMode::Single(_));
        let now = self.clock.now_ms();
        let Some(item) = find_item_mut(&mut queue, &snapshot.id) else {
            engine_warn!(
                "Item {} was removed during its exchange, outcome dropped",
                short_id(snapshot.id.as_str())
            );
            return if single {
                Step::Finished(RunEnd::Completed)
            } else {
                Step::Continue
            };
        };

        match outcome {
            Ok(data) => {
                item.mark_completed(data, now);
                let completion_time_seconds = item.completion_time_seconds;
                if let Err(end) = self.save(&queue) {
                    return Step::Finished(end);
                }
                engine_info!("Item {} completed", short_id(snapshot.id.as_str()));
                self.events.emit(EngineEvent::ItemCompleted {
                    item_id: snapshot.id,
                    completion_time_seconds,
                });
                if single {
                    return Step::Finished(RunEnd::Completed);
                }
                if has_pending(&queue) {
                    let delay = inter_item_delay(&settings, &mut self.rng);
                    pace_between_items(delay).await;
                }
                Step::Continue
            }
            Err(err) => {
                // Loaded per failure so edits apply without restarting the engine.
                let retry_config = self.load_settings().retry_config;
                let coordinator = RetryCoordinator::new(&retry_config);
                let decision = match err.forced_category() {
                    Some(category) => {
                        coordinator.on_categorized_failure(item, category, now, &mut self.rng)
                    }
                    None => coordinator.on_failure(item, &err.message, now, &mut self.rng),
                };
                apply_decision(item, &decision, &err.message);
                if let Err(end) = self.save(&queue) {
                    return Step::Finished(end);
                }

                match decision.delay {
                    Some(delay) => {
                        engine_warn!(
                            "Item {} failed ({}), retry {}/{} in {:?}: {}",
                            short_id(snapshot.id.as_str()),
                            decision.category,
                            decision.retry_info.attempts,
                            decision.retry_info.max_attempts,
                            delay,
                            err.message
                        );
                        self.events.emit(EngineEvent::RetryScheduled {
                            item_id: snapshot.id,
                            attempt: decision.retry_info.attempts,
                            category: decision.category,
                            delay,
                        });
                        wait_for_retry(delay).await;
                        Step::Continue
                    }
                    None => {
                        engine_error!(
                            "Item {} failed permanently ({}): {}",
                            short_id(snapshot.id.as_str()),
                            decision.category,
                            err.message
                        );
                        self.events.emit(EngineEvent::ItemFailed {
                            item_id: snapshot.id,
                            category: decision.category,
                            message: err.message,
                        });
                        if single {
                            Step::Finished(RunEnd::Completed)
                        } else {
                            Step::Continue
                        }
                    }
                }
            }
        }
    }

    /// Items still `Processing` at run start belong to an engine that went
    /// away mid-exchange. Each counts as one failed attempt, so a crash loop
    /// cannot outlive the retry budget; no backoff wait is applied.
    fn recover_interrupted(&mut self) -> Result<(), RunEnd> {
        let mut queue = self.storage.get_queue().map_err(|err| {
            engine_error!("Failed to read queue: {}", err);
            RunEnd::StorageUnavailable
        })?;
        let interrupted = interrupted_items(&queue);
        if interrupted.is_empty() {
            return Ok(());
        }

        let retry_config = self.load_settings().retry_config;
        let coordinator = RetryCoordinator::new(&retry_config);
        let now = self.clock.now_ms();
        let mut recovered = Vec::with_capacity(interrupted.len());
        for id in interrupted {
            if let Some(item) = find_item_mut(&mut queue, &id) {
                let decision = coordinator.on_failure(item, INTERRUPTED_MESSAGE, now, &mut self.rng);
                apply_decision(item, &decision, INTERRUPTED_MESSAGE);
                engine_warn!(
                    "Recovered interrupted item {} as {}",
                    short_id(id.as_str()),
                    decision.next_status
                );
                recovered.push((id, decision.next_status));
            }
        }
        self.save(&queue)?;
        for (item_id, status) in recovered {
            self.events.emit(EngineEvent::ItemRecovered { item_id, status });
        }
        Ok(())
    }

    fn load_settings(&self) -> Settings {
        self.storage.get_settings().unwrap_or_else(|err| {
            engine_warn!("Failed to read settings, using defaults: {}", err);
            Settings::default()
        })
    }

    fn save(&self, queue: &[QueueItem]) -> Result<(), RunEnd> {
        self.storage.set_queue(queue).map_err(|err| {
            engine_error!("Failed to persist queue: {}", err);
            RunEnd::StorageUnavailable
        })
    }
}
