//! Membership backup.
//!
//! Joined channel ids are kept in `{backup_dir}/channels.json` as a flat JSON
//! array. The whole file is rewritten on every save.

use std::path::{Path, PathBuf};

use crate::error::BackupError;

/// Backup file name inside the backup directory.
pub const BACKUP_FILE_NAME: &str = "channels.json";

/// Persistence collaborator for the membership store.
pub trait Backup: Send + Sync {
    /// Load all saved channel ids.
    fn load(&self) -> Result<Vec<String>, BackupError>;

    /// Replace the saved channel ids.
    fn save(&self, channel_ids: &[String]) -> Result<(), BackupError>;
}

/// File-backed membership backup.
#[derive(Debug, Clone)]
pub struct FileBackup {
    path: PathBuf,
}

impl FileBackup {
    /// Open the backup in `backup_dir`, creating `channels.json` with `[]` if
    /// it does not exist. The directory itself must exist.
    pub fn new(backup_dir: impl AsRef<Path>) -> Result<Self, BackupError> {
        let path = backup_dir.as_ref().join(BACKUP_FILE_NAME);
        if !path.exists() {
            std::fs::write(&path, b"[]").map_err(|source| BackupError::CreateFile {
                path: path.clone(),
                source,
            })?;
            tracing::info!(path = %path.display(), "created empty channel backup");
        }
        Ok(Self { path })
    }

    /// Open the backup in `$TMPDIR/flyte-slack`, creating the directory.
    pub fn in_temp_dir() -> Result<Self, BackupError> {
        let dir = default_backup_dir();
        std::fs::create_dir_all(&dir).map_err(|source| BackupError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Self::new(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Default backup directory.
pub fn default_backup_dir() -> PathBuf {
    std::env::temp_dir().join("flyte-slack")
}

impl Backup for FileBackup {
    fn load(&self) -> Result<Vec<String>, BackupError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| BackupError::Read {
            path: self.path.clone(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| BackupError::Parse {
            path: self.path.clone(),
            content,
            source,
        })
    }

    fn save(&self, channel_ids: &[String]) -> Result<(), BackupError> {
        // Serializing a slice of strings cannot fail.
        let content = serde_json::to_vec(channel_ids).unwrap_or_else(|_| b"[]".to_vec());
        std::fs::write(&self.path, content).map_err(|source| BackupError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), count = channel_ids.len(), "saved channel backup");
        Ok(())
    }
}
