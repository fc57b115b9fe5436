//! Backup of the edit history between sessions

use crate::config::EditConfig;
use crate::error::Result;
use crate::manager::EditManager;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// History document file
pub const BACKUP_FILE: &str = "history.json";

/// Session lock file
pub const LOCK_FILE: &str = "history.lock";

/// Somewhere to keep a serialized history, guarded by a session lock so two
/// sessions never overwrite each other's backup.
pub trait BackupStore: Send + Sync {
    /// Take the session lock. `Ok(false)` if another session holds it.
    fn lock(&mut self) -> Result<bool>;
    fn unlock(&mut self) -> Result<()>;
    fn is_locked(&self) -> bool;
    fn read(&self) -> Result<Option<String>>;
    fn write(&self, json: &str) -> Result<()>;
    fn remove(&self) -> Result<()>;
    fn has_backup(&self) -> bool;
}

/// Backup directory under a project root: `<root>/.mapedit/`
pub fn backup_dir(root: &Path, config: &EditConfig) -> PathBuf {
    root.join(&config.backup_dir)
}

/// Remove the whole backup directory, lock included.
pub fn clear_backup_dir(root: &Path, config: &EditConfig) -> io::Result<()> {
    let dir = backup_dir(root, config);
    if dir.exists() {
        fs::remove_dir_all(&dir)?;
        info!("Removed backup directory {}", dir.display());
    }
    Ok(())
}

/// Keeps the backup as a JSON file next to a lock file.
#[derive(Debug)]
pub struct FsBackupStore {
    dir: PathBuf,
    locked: bool,
}

impl FsBackupStore {
    pub fn new(root: &Path, config: &EditConfig) -> Self {
        Self::in_dir(backup_dir(root, config))
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        FsBackupStore {
            dir: dir.into(),
            locked: false,
        }
    }

    pub fn backup_path(&self) -> PathBuf {
        self.dir.join(BACKUP_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    fn ensure_dir(&self) -> io::Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

impl BackupStore for FsBackupStore {
    fn lock(&mut self) -> Result<bool> {
        if self.locked {
            return Ok(true);
        }
        self.ensure_dir()?;

        match OpenOptions::new().write(true).create_new(true).open(self.lock_path()) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                self.locked = true;
                debug!("Backup lock taken: {}", self.lock_path().display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn unlock(&mut self) -> Result<()> {
        if !self.locked {
            return Ok(());
        }
        remove_if_present(&self.lock_path())?;
        self.locked = false;
        Ok(())
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.backup_path()) {
            Ok(json) => Ok(Some(json)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, json: &str) -> Result<()> {
        self.ensure_dir()?;
        let path = self.backup_path();
        fs::write(&path, json)?;
        debug!("History backup saved: {}", path.display());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        remove_if_present(&self.backup_path())?;
        Ok(())
    }

    fn has_backup(&self) -> bool {
        self.backup_path().exists()
    }
}

impl Drop for FsBackupStore {
    fn drop(&mut self) {
        if self.locked {
            let _ = remove_if_present(&self.lock_path());
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

impl EditManager {
    /// Take the session lock on `store`.
    ///
    /// A backup left by an earlier session is flagged as restorable, and
    /// `save_backup` will not overwrite it until it is restored or cleared.
    pub fn lock_backup(&mut self, store: &mut dyn BackupStore) -> Result<bool> {
        let locked = store.lock()?;
        if locked {
            self.has_restorable_changes = store.has_backup();
        } else {
            warn!("History backup is locked by another session");
        }
        Ok(locked)
    }

    pub fn has_restorable_changes(&self) -> bool {
        self.has_restorable_changes
    }

    /// Write the current history to `store`, or remove the backup when there
    /// is nothing worth keeping.
    pub fn save_backup(&mut self, store: &dyn BackupStore) -> Result<()> {
        if !store.is_locked() || self.has_restorable_changes {
            return Ok(());
        }

        let result = match self.to_json()? {
            Some(json) => store.write(&json),
            None => store.remove(),
        };
        if let Err(e) = &result {
            warn!("Failed to save history backup: {}", e);
        }
        self.backup_status_changed(result.is_ok());
        result
    }

    /// Load the backup into this manager. Returns whether one was found.
    pub async fn restore_backup(&mut self, store: &dyn BackupStore) -> Result<bool> {
        if !store.is_locked() {
            return Ok(false);
        }
        self.has_restorable_changes = false;

        match store.read()? {
            Some(json) => {
                self.from_json_async(&json).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn clear_backup(&mut self, store: &dyn BackupStore) -> Result<()> {
        if !store.is_locked() {
            return Ok(());
        }
        self.has_restorable_changes = false;
        store.remove()
    }
}
