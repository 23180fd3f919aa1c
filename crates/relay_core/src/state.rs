#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
}

/// Dispatcher-side view of the engine. Item state lives in storage, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    phase: RunPhase,
    automation_enabled: bool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            phase: RunPhase::Idle,
            automation_enabled: true,
        }
    }
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == RunPhase::Running
    }

    pub fn automation_enabled(&self) -> bool {
        self.automation_enabled
    }

    pub(crate) fn begin_run(&mut self) {
        self.phase = RunPhase::Running;
    }

    pub(crate) fn end_run(&mut self) {
        self.phase = RunPhase::Idle;
    }

    pub(crate) fn set_automation_enabled(&mut self, enabled: bool) {
        self.automation_enabled = enabled;
    }
}
