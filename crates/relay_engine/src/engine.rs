use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_error, engine_info, engine_warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use relay_core::{
    has_pending, reset_items, update, Command, ControlState, Effect, ItemId, Msg,
    ProcessStatePatch, RunEnd, RunMode, ScheduleConfig, Settings,
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::agent::AutomationAgent;
use crate::bridge::{AutomationBridge, BridgeSettings};
use crate::clock::Clock;
use crate::events::{ChannelEventSink, EventSink};
use crate::processing::ProcessingLoop;
use crate::scheduler::{ScheduleTick, Scheduler};
use crate::store::{ProcessStateStore, Storage};
use crate::EngineEvent;

/// How often the stored schedule is compared with the armed one, so that a
/// schedule written by another process is picked up.
pub const SCHEDULE_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub bridge: BridgeSettings,
    /// Fixed seed for backoff jitter and pacing; entropy when `None`.
    pub rng_seed: Option<u64>,
}

/// Handle to a running engine. Dropping it shuts the dispatcher down; an
/// in-flight run finishes its current item on its own.
pub struct EngineHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    event_rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl EngineHandle {
    /// Spawns the dispatcher on the current tokio runtime. Startup performs
    /// crash recovery and restores an armed schedule.
    pub fn spawn(
        storage: Arc<dyn Storage>,
        agent: Arc<dyn AutomationAgent>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let bridge = Arc::new(AutomationBridge::new(
            agent,
            storage.clone(),
            config.bridge.clone(),
        ));
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let dispatcher = Dispatcher {
            process: ProcessStateStore::new(storage.clone()),
            scheduler: Scheduler::new(storage.clone(), clock.clone(), tick_tx),
            storage,
            bridge,
            clock,
            events: Arc::new(ChannelEventSink::new(event_tx)),
            control: ControlState::new(),
            cancel: None,
            start_after_run: false,
            done_tx,
            rng,
        };
        tokio::spawn(dispatcher.run(cmd_rx, tick_rx, done_rx));

        Self { cmd_tx, event_rx }
    }

    pub fn send(&self, command: Command) {
        let _ = self.cmd_tx.send(command);
    }

    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub async fn recv(&mut self) -> Option<EngineEvent> {
        self.event_rx.recv().await
    }
}

struct Dispatcher {
    storage: Arc<dyn Storage>,
    process: ProcessStateStore,
    bridge: Arc<AutomationBridge>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    scheduler: Scheduler,
    control: ControlState,
    cancel: Option<CancellationToken>,
    /// A schedule fired while a run was active.
    start_after_run: bool,
    done_tx: mpsc::UnboundedSender<RunEnd>,
    rng: StdRng,
}

impl Dispatcher {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut tick_rx: mpsc::UnboundedReceiver<ScheduleTick>,
        mut done_rx: mpsc::UnboundedReceiver<RunEnd>,
    ) {
        self.startup().await;
        let mut schedule_poll = tokio::time::interval(SCHEDULE_POLL_INTERVAL);
        schedule_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            // A finished run is folded in before any command queued behind it.
            tokio::select! {
                biased;
                Some(end) = done_rx.recv() => self.on_run_ended(end).await,
                command = cmd_rx.recv() => match command {
                    Some(command) => self.handle(Msg::Command(command)).await,
                    None => break,
                },
                Some(tick) = tick_rx.recv() => self.on_schedule_tick(tick).await,
                _ = schedule_poll.tick() => self.refresh_schedule(),
            }
        }
        self.scheduler.disarm();
        engine_info!("Engine dispatcher stopped");
    }

    async fn startup(&mut self) {
        let settings = self.load_settings();
        let state = self.process.get();
        if state.needs_resume() {
            engine_info!("Previous run was interrupted, resuming");
            self.handle(Msg::Command(Command::Start)).await;
        } else if state.is_processing {
            // Paused run whose loop never got to record its exit.
            self.process.set(ProcessStatePatch::finished());
        }
        self.scheduler.restore(settings.schedule_config);
    }

    async fn on_run_ended(&mut self, end: RunEnd) {
        self.cancel = None;
        self.handle(Msg::RunEnded(end)).await;
        if !std::mem::take(&mut self.start_after_run) || end != RunEnd::Completed {
            return;
        }
        let pending = self
            .storage
            .get_queue()
            .map(|queue| has_pending(&queue))
            .unwrap_or(false);
        if pending {
            engine_info!("Starting the run deferred by an earlier schedule fire");
            self.handle(Msg::Command(Command::Start)).await;
        }
    }

    async fn handle(&mut self, msg: Msg) {
        if matches!(
            msg,
            Msg::Command(Command::Start) | Msg::Command(Command::RunItem { .. })
        ) {
            let enabled = self.load_settings().automation_enabled;
            self.apply(Msg::AutomationToggled(enabled)).await;
        }
        self.apply(msg).await;
    }

    async fn apply(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.control);
        let (state, effects) = update(state, msg);
        self.control = state;
        for effect in effects {
            self.run_effect(effect).await;
        }
    }

    async fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::LaunchRun(mode) => self.launch(mode),
            Effect::RequestPause => {
                engine_info!("Pause requested");
                self.process.set(ProcessStatePatch::paused());
            }
            Effect::RequestStop => {
                engine_info!("Stop requested");
                if let Some(cancel) = &self.cancel {
                    cancel.cancel();
                }
            }
            Effect::ArmSchedule(config) => self.arm_schedule(config),
            Effect::DisarmSchedule => {
                self.scheduler.cancel();
                self.events.emit(EngineEvent::ScheduleCancelled);
            }
            Effect::ProbeReadiness => self.probe().await,
            Effect::ResetItems(ids) => self.reset(&ids),
            Effect::Rejected { reason } => {
                engine_warn!("Command rejected: {:?}", reason);
                self.events.emit(EngineEvent::CommandRejected { reason });
            }
        }
    }

    fn launch(&mut self, mode: RunMode) {
        let cancel = CancellationToken::new();
        let run = ProcessingLoop::new(
            self.storage.clone(),
            self.bridge.clone(),
            self.clock.clone(),
            self.events.clone(),
            cancel.clone(),
            StdRng::from_rng(&mut self.rng).unwrap_or_else(|_| StdRng::from_entropy()),
        );
        run.begin();
        self.cancel = Some(cancel);
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let end = run.run(mode).await;
            let _ = done_tx.send(end);
        });
    }

    fn arm_schedule(&mut self, config: ScheduleConfig) {
        let repeat_daily = config.repeat_daily;
        if let Some(scheduled_at) = self.scheduler.configure(config) {
            self.events.emit(EngineEvent::ScheduleArmed {
                scheduled_at,
                repeat_daily,
            });
        }
    }

    async fn on_schedule_tick(&mut self, tick: ScheduleTick) {
        let outcome = self.scheduler.on_fire(tick);
        engine_info!(
            "Schedule fired for {} (start: {}, next: {:?})",
            tick.scheduled_at,
            outcome.start,
            outcome.next_at
        );
        let running = self.control.is_running();
        self.events.emit(EngineEvent::ScheduleFired {
            scheduled_at: tick.scheduled_at,
            started: outcome.start && !running,
            next_at: outcome.next_at,
        });
        if !outcome.start {
            return;
        }
        if running {
            engine_info!("Run in progress, scheduled start deferred until it ends");
            self.start_after_run = true;
        } else {
            self.handle(Msg::Command(Command::Start)).await;
        }
    }

    fn refresh_schedule(&mut self) {
        let Some(config) = self.scheduler.refresh() else {
            return;
        };
        match config.armed_at() {
            Some(scheduled_at) => self.events.emit(EngineEvent::ScheduleArmed {
                scheduled_at,
                repeat_daily: config.repeat_daily,
            }),
            None => self.events.emit(EngineEvent::ScheduleCancelled),
        }
    }

    async fn probe(&mut self) {
        let preferred = self.process.get().active_tab_id;
        match self.bridge.probe(preferred.as_ref()).await {
            Ok(tab) => {
                engine_info!("Destination tab {} is ready", tab);
                self.events.emit(EngineEvent::ReadinessProbed {
                    tab_id: Some(tab),
                    error: None,
                });
            }
            Err(err) => {
                engine_warn!("Readiness probe failed: {}", err);
                self.events.emit(EngineEvent::ReadinessProbed {
                    tab_id: None,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    fn reset(&mut self, ids: &[ItemId]) {
        let mut queue = match self.storage.get_queue() {
            Ok(queue) => queue,
            Err(err) => {
                engine_error!("Failed to read queue for reset: {}", err);
                return;
            }
        };
        let count = reset_items(&mut queue, ids);
        if count > 0 {
            if let Err(err) = self.storage.set_queue(&queue) {
                engine_error!("Failed to persist reset items: {}", err);
                return;
            }
        }
        engine_info!("Reset {} item(s) to pending", count);
        self.events.emit(EngineEvent::ItemsReset { count });
    }

    fn load_settings(&self) -> Settings {
        self.storage.get_settings().unwrap_or_else(|err| {
            engine_warn!("Failed to read settings, using defaults: {}", err);
            Settings::default()
        })
    }
}
