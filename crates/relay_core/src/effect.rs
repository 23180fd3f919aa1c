use crate::{ItemId, ScheduleConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Queue,
    Single(ItemId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AutomationDisabled,
    RunInProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LaunchRun(RunMode),
    RequestPause,
    RequestStop,
    ArmSchedule(ScheduleConfig),
    DisarmSchedule,
    ProbeReadiness,
    ResetItems(Vec<ItemId>),
    Rejected { reason: RejectReason },
}
