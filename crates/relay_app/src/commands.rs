use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use engine_logging::{engine_info, engine_warn, short_id};
use relay_core::{
    reset_items, Command, ItemId, ItemStatus, QueueItem, QueueSummary, RunEnd, ScheduleConfig,
    SettingsPatch,
};
use relay_engine::{
    BridgeSettings, EngineConfig, EngineEvent, EngineHandle, EngineLock, FileStorage,
    HttpAgentSettings, HttpAutomationAgent, Storage, SystemClock, SCHEDULE_POLL_INTERVAL,
};

use crate::args::{Args, CliCommand};

const PROMPT_PREVIEW_CHARS: usize = 60;

pub async fn execute(args: Args) -> Result<()> {
    let storage = Arc::new(FileStorage::new(&args.data_dir, args.session_dir()));
    engine_info!(
        "Using data dir {:?}, session dir {:?}",
        storage.data_dir(),
        storage.session_dir()
    );

    match args.command.clone() {
        CliCommand::Add { prompt, tool, mode } => add(&storage, prompt.join(" "), tool, mode),
        CliCommand::List => list(&storage),
        CliCommand::Reset { ids, failed_only } => reset(&storage, ids, failed_only),
        CliCommand::Schedule { at_ms, daily } => schedule(&storage, at_ms, daily),
        CliCommand::Unschedule => unschedule(&storage),
        CliCommand::Probe => {
            let (_lock, engine) = spawn_engine(&args, storage)?;
            probe(engine).await
        }
        CliCommand::Run { item } => {
            let (_lock, engine) = spawn_engine(&args, storage)?;
            run(engine, item).await
        }
        CliCommand::Watch => {
            let (_lock, engine) = spawn_engine(&args, storage)?;
            watch(engine).await
        }
    }
}

/// The returned lock has to outlive the engine: one engine host per queue.
fn spawn_engine(args: &Args, storage: Arc<FileStorage>) -> Result<(EngineLock, EngineHandle)> {
    let lock = storage.lock_engine().context("claiming the queue")?;

    let mut agent_settings = HttpAgentSettings::default();
    if let Some(url) = &args.agent_url {
        agent_settings.base_url = url.clone();
    }
    let agent = HttpAutomationAgent::new(agent_settings).context("building automation client")?;

    let mut bridge = BridgeSettings::default();
    if let Some(target) = &args.target {
        bridge.target_pattern = target.clone();
    }
    let engine = EngineHandle::spawn(
        storage,
        Arc::new(agent),
        Arc::new(SystemClock),
        EngineConfig {
            bridge,
            rng_seed: None,
        },
    );
    Ok((lock, engine))
}

fn add(
    storage: &FileStorage,
    prompt: String,
    tool: Option<String>,
    mode: Option<String>,
) -> Result<()> {
    let mut item = QueueItem::new(prompt);
    item.tool = tool;
    item.mode = mode;
    let id = item.id.clone();

    let mut queue = storage.get_queue().context("reading queue")?;
    queue.push(item);
    storage.set_queue(&queue).context("writing queue")?;
    println!("{id}");
    Ok(())
}

fn list(storage: &FileStorage) -> Result<()> {
    let queue = storage.get_queue().context("reading queue")?;
    for item in &queue {
        println!("{}", describe_item(item));
    }
    let summary = QueueSummary::of(&queue);
    println!(
        "{} item(s): {} pending, {} processing, {} completed, {} failed",
        summary.total(),
        summary.pending,
        summary.processing,
        summary.completed,
        summary.failed
    );

    let settings = storage.get_settings().context("reading settings")?;
    if let Some(at) = settings.schedule_config.armed_at() {
        let repeat = if settings.schedule_config.repeat_daily {
            " (daily)"
        } else {
            ""
        };
        println!("scheduled for {}{}", format_time(at), repeat);
    }
    Ok(())
}

fn reset(storage: &FileStorage, ids: Vec<ItemId>, failed_only: bool) -> Result<()> {
    let mut queue = storage.get_queue().context("reading queue")?;
    let ids = if failed_only {
        let failed: Vec<ItemId> = queue
            .iter()
            .filter(|item| item.status == ItemStatus::Failed)
            .filter(|item| ids.is_empty() || ids.contains(&item.id))
            .map(|item| item.id.clone())
            .collect();
        // An empty list would mean "every terminal item".
        if failed.is_empty() {
            println!("nothing to reset");
            return Ok(());
        }
        failed
    } else {
        ids
    };

    let count = reset_items(&mut queue, &ids);
    if count > 0 {
        storage.set_queue(&queue).context("writing queue")?;
    }
    println!("reset {count} item(s)");
    Ok(())
}

fn schedule(storage: &FileStorage, at_ms: i64, daily: bool) -> Result<()> {
    let config = if daily {
        ScheduleConfig::daily(at_ms)
    } else {
        ScheduleConfig::once(at_ms)
    };
    storage
        .set_settings(SettingsPatch::schedule(config))
        .context("writing settings")?;
    println!(
        "scheduled for {}; a running `relay watch` arms it within {}s",
        format_time(at_ms),
        SCHEDULE_POLL_INTERVAL.as_secs()
    );
    Ok(())
}

fn unschedule(storage: &FileStorage) -> Result<()> {
    let current = storage
        .get_settings()
        .context("reading settings")?
        .schedule_config;
    storage
        .set_settings(SettingsPatch::schedule(current.disabled()))
        .context("writing settings")?;
    println!("schedule disabled");
    Ok(())
}

async fn probe(mut engine: EngineHandle) -> Result<()> {
    engine.send(Command::ProbeReadiness);
    while let Some(event) = engine.recv().await {
        report(&event);
        if let EngineEvent::ReadinessProbed { error, .. } = event {
            return match error {
                None => Ok(()),
                Some(error) => bail!("destination not ready: {error}"),
            };
        }
    }
    bail!("engine stopped before the probe finished")
}

async fn run(mut engine: EngineHandle, item: Option<ItemId>) -> Result<()> {
    engine.send(match item {
        Some(item_id) => Command::RunItem { item_id },
        None => Command::Start,
    });

    let mut stopping = false;
    loop {
        tokio::select! {
            event = engine.recv() => {
                let Some(event) = event else {
                    bail!("engine stopped unexpectedly");
                };
                report(&event);
                match event {
                    EngineEvent::RunFinished { reason } => return finish(reason),
                    EngineEvent::CommandRejected { reason } => {
                        bail!("run not started: {reason:?}")
                    }
                    _ => {}
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    engine_warn!("Failed to listen for Ctrl-C: {}", err);
                }
                if stopping {
                    bail!("interrupted; the in-flight item is recovered on the next run");
                }
                println!("stopping after the current item, Ctrl-C again to quit now");
                engine.send(Command::Stop);
                stopping = true;
            }
        }
    }
}

/// Keeps the engine alive so armed schedules can fire, until Ctrl-C.
async fn watch(mut engine: EngineHandle) -> Result<()> {
    println!("watching schedule, Ctrl-C to exit");
    let mut running = false;
    let mut exiting = false;
    loop {
        tokio::select! {
            event = engine.recv() => {
                let Some(event) = event else {
                    bail!("engine stopped unexpectedly");
                };
                report(&event);
                match event {
                    EngineEvent::RunStarted { .. } => running = true,
                    EngineEvent::RunFinished { .. } => {
                        running = false;
                        if exiting {
                            return Ok(());
                        }
                    }
                    _ => {}
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    engine_warn!("Failed to listen for Ctrl-C: {}", err);
                }
                if !running || exiting {
                    return Ok(());
                }
                println!("pausing after the current item, Ctrl-C again to quit now");
                engine.send(Command::Pause);
                exiting = true;
            }
        }
    }
}

fn finish(reason: RunEnd) -> Result<()> {
    match reason {
        RunEnd::Completed | RunEnd::Paused | RunEnd::Stopped => Ok(()),
        RunEnd::NoDestination => bail!("no destination tab found"),
        RunEnd::StorageUnavailable => bail!("queue storage became unavailable"),
    }
}

fn report(event: &EngineEvent) {
    match event {
        EngineEvent::RunStarted { mode } => println!("run started ({mode:?})"),
        EngineEvent::ItemRecovered { item_id, status } => {
            println!("{} recovered as {}", short_id(item_id.as_str()), status)
        }
        EngineEvent::ItemStarted {
            item_id,
            tool,
            tab_id,
        } => println!(
            "{} started in tab {}{}",
            short_id(item_id.as_str()),
            tab_id,
            tool.as_deref()
                .map(|tool| format!(" with {tool}"))
                .unwrap_or_default()
        ),
        EngineEvent::ItemCompleted {
            item_id,
            completion_time_seconds,
        } => println!(
            "{} completed in {:.1}s",
            short_id(item_id.as_str()),
            completion_time_seconds.unwrap_or_default()
        ),
        EngineEvent::RetryScheduled {
            item_id,
            attempt,
            category,
            delay,
        } => println!(
            "{} failed ({category}), attempt {attempt}, retrying in {}s",
            short_id(item_id.as_str()),
            delay.as_secs()
        ),
        EngineEvent::ItemFailed {
            item_id,
            category,
            message,
        } => println!(
            "{} failed ({category}): {message}",
            short_id(item_id.as_str())
        ),
        EngineEvent::RunFinished { reason } => println!("run finished: {reason:?}"),
        EngineEvent::ReadinessProbed { tab_id, error } => match (tab_id, error) {
            (Some(tab), _) => println!("tab {tab} is ready"),
            (None, Some(error)) => println!("not ready: {error}"),
            (None, None) => println!("not ready"),
        },
        EngineEvent::ScheduleFired {
            scheduled_at,
            started,
            next_at,
        } => {
            println!(
                "schedule for {} fired (run started: {started})",
                format_time(*scheduled_at)
            );
            if let Some(next) = next_at {
                println!("next run at {}", format_time(*next));
            }
        }
        EngineEvent::ScheduleArmed {
            scheduled_at,
            repeat_daily,
        } => println!(
            "schedule armed for {} (daily: {repeat_daily})",
            format_time(*scheduled_at)
        ),
        EngineEvent::ScheduleCancelled => println!("schedule cancelled"),
        EngineEvent::ItemsReset { count } => println!("reset {count} item(s)"),
        EngineEvent::CommandRejected { reason } => println!("command rejected: {reason:?}"),
    }
}

fn describe_item(item: &QueueItem) -> String {
    let mut line = format!(
        "{:<10} {:<10} {}",
        short_id(item.id.as_str()),
        item.status.to_string(),
        preview(&item.prompt)
    );
    if let Some(tool) = &item.tool {
        line.push_str(&format!(" [{tool}]"));
    }
    if let Some(info) = &item.retry_info {
        line.push_str(&format!(" ({}/{} attempts)", info.attempts, info.max_attempts));
    }
    if let Some(error) = &item.error {
        line.push_str(&format!(" error: {error}"));
    }
    line
}

fn preview(prompt: &str) -> String {
    let flat = prompt.replace('\n', " ");
    if flat.chars().count() <= PROMPT_PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PROMPT_PREVIEW_CHARS - 1).collect();
    format!("{cut}…")
}

fn format_time(epoch_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| epoch_ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn long_prompts_are_truncated_on_char_boundaries() {
        let prompt = "é".repeat(100);
        let shown = preview(&prompt);
        assert_eq!(shown.chars().count(), PROMPT_PREVIEW_CHARS);
        assert!(shown.ends_with('…'));
        assert_eq!(preview("short\nprompt"), "short prompt");
    }

    #[test]
    fn item_line_includes_status_and_error() {
        let mut item = QueueItem::new("hello").with_id("abcd-1234");
        item.status = ItemStatus::Failed;
        item.error = Some("network error".into());
        assert_eq!(
            describe_item(&item),
            "abcd       failed     hello error: network error"
        );
    }

    #[test]
    fn format_time_is_rfc3339() {
        assert_eq!(format_time(0), "1970-01-01T00:00:00+00:00");
    }
}
