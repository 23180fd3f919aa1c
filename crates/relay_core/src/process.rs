use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque destination tab handle as reported by the automation host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub String);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TabId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Durable run record. The default is "not processing".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessState {
    pub is_processing: bool,
    pub is_paused: bool,
    pub active_tab_id: Option<TabId>,
}

impl ProcessState {
    /// A run was active and not paused when the engine last went away.
    pub fn needs_resume(&self) -> bool {
        self.is_processing && !self.is_paused
    }

    pub fn apply(&mut self, patch: ProcessStatePatch) {
        if let Some(value) = patch.is_processing {
            self.is_processing = value;
        }
        if let Some(value) = patch.is_paused {
            self.is_paused = value;
        }
        if let Some(value) = patch.active_tab_id {
            self.active_tab_id = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessStatePatch {
    pub is_processing: Option<bool>,
    pub is_paused: Option<bool>,
    /// `Some(None)` clears the remembered tab.
    pub active_tab_id: Option<Option<TabId>>,
}

impl ProcessStatePatch {
    pub fn started() -> Self {
        Self {
            is_processing: Some(true),
            is_paused: Some(false),
            active_tab_id: None,
        }
    }

    pub fn finished() -> Self {
        Self {
            is_processing: Some(false),
            ..Self::default()
        }
    }

    pub fn paused() -> Self {
        Self {
            is_paused: Some(true),
            ..Self::default()
        }
    }

    pub fn active_tab(tab: TabId) -> Self {
        Self {
            active_tab_id: Some(Some(tab)),
            ..Self::default()
        }
    }
}
