// Task record and identity

use crate::error::{Result, TaskStoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable task identity, assigned by the store at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Allocate a fresh, time-ordered id
    pub(crate) fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A persisted task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub(crate) fn new(title: String) -> Self {
        let now = now_ms();
        Self {
            id: TaskId::new(),
            title,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy of this task carrying a new title
    pub(crate) fn retitled(&self, title: String) -> Self {
        Self {
            id: self.id,
            title,
            created_at: self.created_at,
            // never move backwards, or replay could prefer the old version
            updated_at: now_ms().max(self.updated_at),
        }
    }
}

/// Reject empty or whitespace-only titles
///
/// A title that passes is kept exactly as given.
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(TaskStoreError::Validation);
    }
    Ok(())
}

// Helper function for timestamps
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
