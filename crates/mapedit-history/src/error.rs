//! History error types.

use mapedit_core::ParseIdError;
use thiserror::Error;

/// Errors raised by the edit manager, the serializer and the backup store.
#[derive(Debug, Error)]
pub enum EditError {
    /// `commit_append` needs a committed edit to fold into.
    #[error("cannot append to the base edit")]
    CommitAppendToBase,

    #[error("no action given")]
    MissingAction,

    #[error("history version {0} not supported")]
    UnsupportedVersion(u64),

    #[error("history document has no version")]
    MissingVersion,

    /// A stack item names an entity key absent from `entities`.
    #[error("stack item {item} references unknown entity `{key}`")]
    DanglingEntityKey { item: usize, key: String },

    #[error("history index {index} out of range for {len} edits")]
    InvalidIndex { index: usize, len: usize },

    #[error("invalid entity id: {0}")]
    InvalidEntityId(#[from] ParseIdError),

    #[error("history document has an empty stack")]
    EmptyStack,

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, EditError>;
