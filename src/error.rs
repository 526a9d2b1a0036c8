// Error taxonomy for the task store and list state

use crate::task::TaskId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for task store operations
pub type Result<T> = std::result::Result<T, TaskStoreError>;

/// Errors surfaced to callers of the store and the list state
#[derive(Error, Debug)]
pub enum TaskStoreError {
    /// The backing store could not be opened or prepared
    #[error("Failed to initialize task store at {}: {source}", .path.display())]
    StorageInit {
        path: PathBuf,
        #[source]
        source: StorageFault,
    },

    /// Reading the record set failed
    #[error("Failed to read tasks: {0}")]
    StorageRead(#[source] StorageFault),

    /// A mutation could not be made durable
    #[error("Failed to persist task change: {0}")]
    StorageWrite(#[source] StorageFault),

    /// No live task has the given id
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    /// A list position past the end of the local list
    #[error("Index {index} out of range for {len} tasks")]
    IndexOutOfRange { index: usize, len: usize },

    /// Title is empty or whitespace-only
    #[error("Task title cannot be empty")]
    Validation,
}

impl TaskStoreError {
    /// True for the errors a UI can report and carry on from
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TaskStoreError::StorageInit { .. })
    }
}

/// Underlying storage-engine failure
#[derive(Error, Debug)]
pub enum StorageFault {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store is locked by another handle")]
    Locked,

    #[error("store version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("corrupt store: {0}")]
    Corrupt(String),
}
