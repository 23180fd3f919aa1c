use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use engine_logging::{engine_error, engine_warn};
use relay_core::{
    ProcessState, ProcessStatePatch, QueueItem, Settings, SettingsPatch,
};
use thiserror::Error;

use crate::persist::PersistError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("failed to serialize {what}: {message}")]
    Serialize { what: &'static str, message: String },
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Key-value storage collaborator.
///
/// Queue and settings are durable. Process state and ephemeral slots are
/// scoped to the browser session.
pub trait Storage: Send + Sync {
    fn get_queue(&self) -> Result<Vec<QueueItem>, StorageError>;
    fn set_queue(&self, items: &[QueueItem]) -> Result<(), StorageError>;

    fn get_settings(&self) -> Result<Settings, StorageError>;
    /// Merge-writes `patch` and returns the resulting settings.
    fn set_settings(&self, patch: SettingsPatch) -> Result<Settings, StorageError>;

    /// `None` when no run has ever been recorded in this session.
    fn get_process_state(&self) -> Result<Option<ProcessState>, StorageError>;
    fn set_process_state(&self, patch: ProcessStatePatch) -> Result<ProcessState, StorageError>;

    fn put(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    queue: Vec<QueueItem>,
    settings: Settings,
    process: Option<ProcessState>,
    slots: HashMap<String, serde_json::Value>,
}

/// In-process storage. Used by tests and by hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queue(self, queue: Vec<QueueItem>) -> Self {
        self.lock().queue = queue;
        self
    }

    pub fn with_settings(self, settings: Settings) -> Self {
        self.lock().settings = settings;
        self
    }

    pub fn with_process_state(self, state: ProcessState) -> Self {
        self.lock().process = Some(state);
        self
    }

    pub fn slot(&self, key: &str) -> Option<serde_json::Value> {
        self.lock().slots.get(key).cloned()
    }

    pub fn slot_count(&self) -> usize {
        self.lock().slots.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn get_queue(&self) -> Result<Vec<QueueItem>, StorageError> {
        Ok(self.lock().queue.clone())
    }

    fn set_queue(&self, items: &[QueueItem]) -> Result<(), StorageError> {
        self.lock().queue = items.to_vec();
        Ok(())
    }

    fn get_settings(&self) -> Result<Settings, StorageError> {
        Ok(self.lock().settings.clone())
    }

    fn set_settings(&self, patch: SettingsPatch) -> Result<Settings, StorageError> {
        let mut inner = self.lock();
        inner.settings.apply(patch);
        Ok(inner.settings.clone())
    }

    fn get_process_state(&self) -> Result<Option<ProcessState>, StorageError> {
        Ok(self.lock().process.clone())
    }

    fn set_process_state(&self, patch: ProcessStatePatch) -> Result<ProcessState, StorageError> {
        let mut inner = self.lock();
        let state = inner.process.get_or_insert_with(ProcessState::default);
        state.apply(patch);
        Ok(state.clone())
    }

    fn put(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        self.lock().slots.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().slots.remove(key);
        Ok(())
    }
}

/// Fail-open view of the durable run record.
///
/// Reads that fail yield "not processing"; writes that fail are logged and
/// dropped, the next read simply sees the older state.
#[derive(Clone)]
pub struct ProcessStateStore {
    storage: Arc<dyn Storage>,
}

impl ProcessStateStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn get(&self) -> ProcessState {
        match self.storage.get_process_state() {
            Ok(state) => state.unwrap_or_default(),
            Err(err) => {
                engine_warn!("Failed to read process state, assuming idle: {}", err);
                ProcessState::default()
            }
        }
    }

    pub fn set(&self, patch: ProcessStatePatch) {
        if let Err(err) = self.storage.set_process_state(patch) {
            engine_error!("Failed to write process state: {}", err);
        }
    }
}
