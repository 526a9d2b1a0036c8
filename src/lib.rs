// tasklist - persistent single-list task store with JSONL log + SQLite cache

pub mod config;
pub mod error;
pub mod jsonl;
pub mod list;
pub mod store;
pub mod task;

// Re-export main types for convenience
pub use config::Config;
pub use error::{Result, StorageFault, TaskStoreError};
pub use list::TaskList;
pub use store::TaskStore;
pub use task::{Task, TaskId, now_ms, validate_title};
