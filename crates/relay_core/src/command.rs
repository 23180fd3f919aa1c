use crate::{ItemId, ScheduleConfig};

/// Control surface consumed from the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Begin processing the queue from the first pending item.
    Start,
    /// Stop after the in-flight item; resumable.
    Pause,
    /// Stop after the in-flight item; administrative end of the run.
    Stop,
    SetSchedule(ScheduleConfig),
    CancelSchedule,
    /// Check that the destination tab answers the liveness probe.
    ProbeReadiness,
    /// Process exactly one pending item, then return to idle.
    RunItem { item_id: ItemId },
    /// Put terminal items back to pending; an empty list means all of them.
    ResetItems { ids: Vec<ItemId> },
}

/// Why a run stopped looping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// No pending item left.
    Completed,
    Paused,
    Stopped,
    /// No destination tab could be found; remaining items are untouched.
    NoDestination,
    /// The queue could not be read or written.
    StorageUnavailable,
}

/// Everything the dispatcher reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    Command(Command),
    /// The processing task returned.
    RunEnded(RunEnd),
    /// Settings were (re)loaded; carries the administrative switch.
    AutomationToggled(bool),
}

impl From<Command> for Msg {
    fn from(command: Command) -> Self {
        Msg::Command(command)
    }
}
