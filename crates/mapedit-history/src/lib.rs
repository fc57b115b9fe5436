//! Mapedit History — edit stack, staging, transactions, persistence and backup

pub mod error;
pub mod config;
pub mod edit;
pub mod events;
pub mod manager;
pub mod serial;
pub mod backup;


pub use error::{EditError, Result};
pub use config::EditConfig;
pub use edit::{Edit, CommitOptions, SourcesUsed, ViewTransform, CUSTOM_IMAGERY};
pub use events::EditEvent;
pub use manager::{EditManager, Changes};
pub use serial::{HistoryDocument, StackItem, HISTORY_VERSION, SUPPORTED_VERSIONS};
pub use backup::{BackupStore, FsBackupStore, BACKUP_FILE, LOCK_FILE, backup_dir, clear_backup_dir};
