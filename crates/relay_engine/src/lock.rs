use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use engine_logging::engine_info;
use fs2::FileExt;
use thiserror::Error;

use crate::persist::{ensure_dir, PersistError};

const LOCK_FILENAME: &str = "engine.lock";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another relay engine (pid {holder}) is already using {path}")]
    Held { path: String, holder: String },
    #[error("io error on {path}: {source}")]
    Io { path: String, source: io::Error },
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Exclusive claim on a queue directory by one engine host.
///
/// The OS lock is released when this value is dropped or the process dies,
/// so a crashed host never leaves the directory claimed. The file itself
/// stays behind and only carries the holder's pid for the error message.
#[derive(Debug)]
pub struct EngineLock {
    _file: File,
    path: PathBuf,
}

impl EngineLock {
    pub fn acquire(dir: &Path) -> Result<Self, LockError> {
        ensure_dir(dir)?;
        let path = dir.join(LOCK_FILENAME);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| io_error(&path, source))?;

        if let Err(err) = file.try_lock_exclusive() {
            if err.raw_os_error() != fs2::lock_contended_error().raw_os_error() {
                return Err(io_error(&path, err));
            }
            let mut holder = String::new();
            let _ = file.read_to_string(&mut holder);
            let holder = holder.trim();
            return Err(LockError::Held {
                path: dir.display().to_string(),
                holder: if holder.is_empty() {
                    "unknown".to_string()
                } else {
                    holder.to_string()
                },
            });
        }

        file.set_len(0)
            .and_then(|()| file.write_all(std::process::id().to_string().as_bytes()))
            .and_then(|()| file.flush())
            .map_err(|source| io_error(&path, source))?;
        engine_info!("Engine lock taken at {:?}", path);
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, source: io::Error) -> LockError {
    LockError::Io {
        path: path.display().to_string(),
        source,
    }
}
