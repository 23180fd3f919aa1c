use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use engine_logging::engine_debug;
use relay_core::{ProcessState, ProcessStatePatch, QueueItem, Settings, SettingsPatch};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::lock::{EngineLock, LockError};
use crate::store::{Storage, StorageError};

const QUEUE_FILENAME: &str = "queue.ron";
const SETTINGS_FILENAME: &str = "settings.ron";
const PROCESS_STATE_FILENAME: &str = "process_state.ron";
const SLOTS_DIRNAME: &str = "slots";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("directory missing or not writable: {0}")]
    Dir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure a directory exists; create if missing.
pub fn ensure_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::Dir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::Dir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::Dir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// File-backed storage.
///
/// `data_dir` holds the queue and settings and outlives the browser session.
/// `session_dir` holds process state and image slots; hosts point it at a
/// location that is wiped on reboot (e.g. the temp dir).
pub struct FileStorage {
    data: AtomicFileWriter,
    data_dir: PathBuf,
    session: AtomicFileWriter,
    session_dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(data_dir: impl Into<PathBuf>, session_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let session_dir = session_dir.into();
        Self {
            data: AtomicFileWriter::new(data_dir.clone()),
            data_dir,
            session: AtomicFileWriter::new(session_dir.clone()),
            session_dir,
            lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Claims the queue for one engine host; see [`EngineLock`].
    pub fn lock_engine(&self) -> Result<EngineLock, LockError> {
        EngineLock::acquire(&self.data_dir)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slots_dir(&self) -> PathBuf {
        self.session_dir.join(SLOTS_DIRNAME)
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.slots_dir().join(slot_filename(key))
    }
}

impl Storage for FileStorage {
    fn get_queue(&self) -> Result<Vec<QueueItem>, StorageError> {
        let _guard = self.guard();
        Ok(read_ron(&self.data_dir.join(QUEUE_FILENAME))?.unwrap_or_default())
    }

    fn set_queue(&self, items: &[QueueItem]) -> Result<(), StorageError> {
        let _guard = self.guard();
        write_ron(&self.data, QUEUE_FILENAME, items, "queue")
    }

    fn get_settings(&self) -> Result<Settings, StorageError> {
        let _guard = self.guard();
        Ok(read_ron(&self.data_dir.join(SETTINGS_FILENAME))?.unwrap_or_default())
    }

    fn set_settings(&self, patch: SettingsPatch) -> Result<Settings, StorageError> {
        let _guard = self.guard();
        let mut settings: Settings =
            read_ron(&self.data_dir.join(SETTINGS_FILENAME))?.unwrap_or_default();
        settings.apply(patch);
        write_ron(&self.data, SETTINGS_FILENAME, &settings, "settings")?;
        Ok(settings)
    }

    fn get_process_state(&self) -> Result<Option<ProcessState>, StorageError> {
        let _guard = self.guard();
        read_ron(&self.session_dir.join(PROCESS_STATE_FILENAME))
    }

    fn set_process_state(&self, patch: ProcessStatePatch) -> Result<ProcessState, StorageError> {
        let _guard = self.guard();
        let mut state: ProcessState =
            read_ron(&self.session_dir.join(PROCESS_STATE_FILENAME))?.unwrap_or_default();
        state.apply(patch);
        write_ron(&self.session, PROCESS_STATE_FILENAME, &state, "process state")?;
        Ok(state)
    }

    fn put(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        let content = serde_json::to_string(&value).map_err(|err| StorageError::Serialize {
            what: "slot",
            message: err.to_string(),
        })?;
        let filename = slot_filename(key);
        let path = AtomicFileWriter::new(self.slots_dir()).write(&filename, &content)?;
        engine_debug!("Stored slot {:?} ({} bytes)", path, content.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.slot_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn read_ron<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    ron::from_str(&content)
        .map(Some)
        .map_err(|err| StorageError::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        })
}

fn write_ron<T: Serialize + ?Sized>(
    writer: &AtomicFileWriter,
    filename: &str,
    value: &T,
    what: &'static str,
) -> Result<(), StorageError> {
    let pretty = ron::ser::PrettyConfig::new();
    let content =
        ron::ser::to_string_pretty(value, pretty).map_err(|err| StorageError::Serialize {
            what,
            message: err.to_string(),
        })?;
    let path = writer.write(filename, &content)?;
    engine_debug!("Persisted {} to {:?}", what, path);
    Ok(())
}

fn slot_filename(key: &str) -> String {
    format!("{}.json", sanitize_key(key))
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
