// In-memory list of tasks mirrored from the store for display

use crate::error::{Result, TaskStoreError};
use crate::store::TaskStore;
use crate::task::Task;
use tracing::debug;

/// Display-ordered mirror of the store's tasks
///
/// The `*_local` methods only edit the in-memory list. The `add`, `rename`
/// and `remove` helpers call the store first and touch the list only once the
/// store has confirmed the change, so the two never diverge.
#[derive(Debug, Default)]
pub struct TaskList {
    tasks: Vec<Task>,
    loaded: bool,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list wholesale with the store's contents
    pub fn load(&mut self, store: &TaskStore) -> Result<()> {
        self.tasks = store.fetch_all()?;
        self.loaded = true;
        debug!(count = self.tasks.len(), "load: complete");
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Append a task, returning its index
    pub fn insert_local(&mut self, task: Task) -> usize {
        self.tasks.push(task);
        self.tasks.len() - 1
    }

    /// Remove and return the task at `index`
    pub fn remove_local(&mut self, index: usize) -> Result<Task> {
        self.check_index(index)?;
        Ok(self.tasks.remove(index))
    }

    /// Set the title of the task at `index` in place
    pub fn replace_local(&mut self, index: usize, new_title: impl Into<String>) -> Result<()> {
        self.check_index(index)?;
        self.tasks[index].title = new_title.into();
        Ok(())
    }

    /// Create a task in the store, then append it locally
    pub fn add(&mut self, store: &mut TaskStore, title: &str) -> Result<usize> {
        let task = store.create(title)?;
        Ok(self.insert_local(task))
    }

    /// Rename the task at `index` in the store, then locally
    pub fn rename(&mut self, store: &mut TaskStore, index: usize, new_title: &str) -> Result<()> {
        self.check_index(index)?;
        let updated = store.update(self.tasks[index].id, new_title)?;
        self.tasks[index] = updated;
        Ok(())
    }

    /// Delete the task at `index` from the store, then locally
    pub fn remove(&mut self, store: &mut TaskStore, index: usize) -> Result<Task> {
        self.check_index(index)?;
        store.delete(self.tasks[index].id)?;
        self.remove_local(index)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.tasks.len() {
            return Err(TaskStoreError::IndexOutOfRange {
                index,
                len: self.tasks.len(),
            });
        }
        Ok(())
    }
}
