//! Filesystem JSON backend for the channel store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/imports/<id>/import.json     import record
//! <root>/imports/<id>/channels.json   aligned channel data
//! <root>/staging/<id>/...             in-flight creates
//! ```
//!
//! A create stages both files under `staging/<id>` and promotes the whole
//! directory with a single rename, so a crash mid-create leaves only
//! leftovers in staging (swept on open), never a half-written import.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use super::{ChannelStore, NewImport};
use crate::error::{StoreError, StoreResult};
use crate::state::{AlignedChannelSet, Import, ImportStatus};

const IMPORTS_DIR: &str = "imports";
const STAGING_DIR: &str = "staging";
const IMPORT_FILE: &str = "import.json";
const CHANNELS_FILE: &str = "channels.json";

/// Attempts for transient I/O failures, including the first.
const IO_ATTEMPTS: u32 = 3;
/// Backoff base; attempt n sleeps n * this.
const IO_RETRY_BASE: Duration = Duration::from_millis(50);

/// Retry `f` on transient I/O errors with bounded linear backoff.
/// Non-transient errors surface immediately with path/operation context.
fn with_io_retry<T>(
    operation: &'static str,
    path: &Path,
    mut f: impl FnMut() -> io::Result<T>,
) -> StoreResult<T> {
    let mut attempt = 1;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < IO_ATTEMPTS && is_transient(&e) => {
                tracing::warn!(
                    operation,
                    path = %path.display(),
                    attempt,
                    error = %e,
                    "Transient storage failure, retrying"
                );
                thread::sleep(IO_RETRY_BASE * attempt);
                attempt += 1;
            }
            Err(e) => {
                return Err(StoreError::Io {
                    operation,
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Filesystem-backed [`ChannelStore`].
///
/// Cheap to clone-free share behind `&`; all methods take `&self`. Writer
/// serialization is per import id via a lock map — concurrent creates of
/// different imports never contend.
pub struct FsChannelStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FsChannelStore {
    /// Open (creating directories as needed) a store rooted at `root`.
    /// Leftover staging directories from interrupted creates are swept.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        for dir in [root.join(IMPORTS_DIR), root.join(STAGING_DIR)] {
            with_io_retry("create store directory", &dir, || fs::create_dir_all(&dir))?;
        }

        let store = Self {
            root,
            locks: Mutex::new(HashMap::new()),
        };
        store.sweep_staging();
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn imports_dir(&self) -> PathBuf {
        self.root.join(IMPORTS_DIR)
    }

    fn import_dir(&self, id: &str) -> PathBuf {
        self.imports_dir().join(id)
    }

    fn staging_dir(&self, id: &str) -> PathBuf {
        self.root.join(STAGING_DIR).join(id)
    }

    /// Per-id writer lock. The map only grows; entries are a mutex each and
    /// import ids seen per process are bounded by actual usage.
    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id.to_string()).or_default().clone()
    }

    /// Remove leftovers of creates that never committed.
    fn sweep_staging(&self) {
        let staging = self.root.join(STAGING_DIR);
        let Ok(entries) = fs::read_dir(&staging) else {
            return;
        };
        for entry in entries.flatten() {
            tracing::warn!(
                path = %entry.path().display(),
                "Sweeping abandoned staging entry from interrupted create"
            );
            let _ = fs::remove_dir_all(entry.path());
        }
    }

    fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        with_io_retry("write", path, || fs::write(path, &bytes))
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, path: &Path) -> StoreResult<Option<T>> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) if is_transient(&e) => with_io_retry("read", path, || fs::read(path))?,
            Err(e) => {
                return Err(StoreError::Io {
                    operation: "read",
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        let value = serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(value))
    }
}

impl ChannelStore for FsChannelStore {
    fn create(&self, new: NewImport, channels: AlignedChannelSet) -> StoreResult<Import> {
        let id = Uuid::new_v4().to_string();
        let import = Import {
            id: id.clone(),
            name: new.name,
            created_at: Utc::now(),
            status: ImportStatus::Completed,
            channel_count: channels.channel_count(),
            total_size: channels.total_points(),
            original_filename: new.original_filename,
        };

        let lock = self.lock_for(&id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Stage everything, then promote with one rename. Readers can never
        // observe a partially written import.
        let stage = self.staging_dir(&id);
        with_io_retry("create staging directory", &stage, || {
            fs::create_dir_all(&stage)
        })?;
        let staged = (|| {
            self.write_json(&stage.join(CHANNELS_FILE), &channels)?;
            self.write_json(&stage.join(IMPORT_FILE), &import)?;
            let final_dir = self.import_dir(&id);
            with_io_retry("commit import", &final_dir, || fs::rename(&stage, &final_dir))
        })();
        if staged.is_err() {
            let _ = fs::remove_dir_all(&stage);
        }
        staged?;

        tracing::info!(
            import_id = %import.id,
            name = %import.name,
            channels = import.channel_count,
            data_points = import.total_size,
            "Import created"
        );
        Ok(import)
    }

    fn get(&self, id: &str) -> StoreResult<Import> {
        self.read_json(&self.import_dir(id).join(IMPORT_FILE))?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn get_channels(&self, id: &str) -> StoreResult<AlignedChannelSet> {
        self.read_json(&self.import_dir(id).join(CHANNELS_FILE))?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn list(&self) -> StoreResult<Vec<Import>> {
        let dir = self.imports_dir();
        let entries = with_io_retry("list imports", &dir, || {
            fs::read_dir(&dir).and_then(|it| it.collect::<io::Result<Vec<_>>>())
        })?;

        let mut imports = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.read_json::<Import>(&entry.path().join(IMPORT_FILE)) {
                Ok(Some(import)) => imports.push(import),
                // A directory without a record is a stray; skip it.
                Ok(None) => continue,
                Err(StoreError::Corrupt { path, source }) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %source,
                        "Skipping corrupt import record in list"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        imports.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(imports)
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let dir = self.import_dir(id);
        if !dir.is_dir() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        with_io_retry("delete import", &dir, || fs::remove_dir_all(&dir))?;
        tracing::info!(import_id = %id, "Import deleted");
        Ok(())
    }
}
