use crate::{Command, ControlState, Effect, Msg, RejectReason, RunMode};

/// Pure dispatcher: applies a message to the control state and returns the
/// effects the engine has to carry out.
pub fn update(mut state: ControlState, msg: Msg) -> (ControlState, Vec<Effect>) {
    let effects = match msg {
        Msg::Command(command) => dispatch(&mut state, command),
        Msg::RunEnded(_) => {
            state.end_run();
            Vec::new()
        }
        Msg::AutomationToggled(enabled) => {
            state.set_automation_enabled(enabled);
            Vec::new()
        }
    };

    (state, effects)
}

fn dispatch(state: &mut ControlState, command: Command) -> Vec<Effect> {
    match command {
        Command::Start | Command::RunItem { .. } if state.is_running() => {
            vec![Effect::Rejected {
                reason: RejectReason::RunInProgress,
            }]
        }
        Command::Start => launch(state, RunMode::Queue),
        Command::RunItem { item_id } => launch(state, RunMode::Single(item_id)),
        Command::Pause => {
            if state.is_running() {
                vec![Effect::RequestPause]
            } else {
                Vec::new()
            }
        }
        Command::Stop => {
            if state.is_running() {
                vec![Effect::RequestStop]
            } else {
                Vec::new()
            }
        }
        Command::SetSchedule(config) => {
            if config.armed_at().is_some() {
                vec![Effect::ArmSchedule(config)]
            } else {
                vec![Effect::DisarmSchedule]
            }
        }
        Command::CancelSchedule => vec![Effect::DisarmSchedule],
        Command::ProbeReadiness => vec![Effect::ProbeReadiness],
        Command::ResetItems { ids } => vec![Effect::ResetItems(ids)],
    }
}

fn launch(state: &mut ControlState, mode: RunMode) -> Vec<Effect> {
    if !state.automation_enabled() {
        return vec![Effect::Rejected {
            reason: RejectReason::AutomationDisabled,
        }];
    }
    state.begin_run();
    vec![Effect::LaunchRun(mode)]
}
