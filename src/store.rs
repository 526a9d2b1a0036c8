// Task store: JSONL append log as source of truth, SQLite as read cache

use crate::error::{Result, StorageFault, TaskStoreError};
use crate::jsonl;
use crate::task::{Task, TaskId, now_ms, validate_title};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CURRENT_VERSION: u32 = 1;
const LOG_FILE: &str = "tasks.jsonl";
const DB_FILE: &str = "tasks.db";
const LOCK_FILE: &str = ".lock";
const VERSION_FILE: &str = ".version";
const LOG_KEY: &str = "tasks";

type FaultResult<T> = std::result::Result<T, StorageFault>;

/// Durable task record set
///
/// Every mutation is appended to `tasks.jsonl` and fsynced before the
/// matching SQLite transaction commits, so a call that returns `Ok` survives
/// an immediate process kill. Reads come from the SQLite cache, which is
/// rebuilt from the log whenever the two disagree.
///
/// Only one `TaskStore` may be open per directory at a time.
pub struct TaskStore {
    base_path: PathBuf,
    db: Connection,
    // held for the lifetime of the store
    _lock: File,
    closed: bool,
}

impl TaskStore {
    /// Open or create a store in the given directory
    ///
    /// Any failure here is `StorageInit`: there is no degraded mode without
    /// storage, so callers are expected to give up.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        info!(path = ?base_path, "Opening task store");

        Self::open_inner(base_path.clone()).map_err(|source| TaskStoreError::StorageInit {
            path: base_path,
            source,
        })
    }

    fn open_inner(base_path: PathBuf) -> FaultResult<Self> {
        fs::create_dir_all(&base_path)?;

        let lock = acquire_lock(&base_path.join(LOCK_FILE))?;
        check_version(&base_path.join(VERSION_FILE))?;

        let db = Connection::open(base_path.join(DB_FILE))?;
        db.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))?;
        db.execute_batch("PRAGMA synchronous = FULL;")?;

        // no flush on drop until open has completed
        let mut store = Self {
            base_path,
            db,
            _lock: lock,
            closed: true,
        };

        store.create_schema()?;
        store.ensure_log()?;

        if store.check_stale()? {
            info!("Cache is stale, syncing from log");
            store.sync_inner()?;
        }

        store.closed = false;
        Ok(store)
    }

    /// Get the directory this store lives in
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn log_path(&self) -> PathBuf {
        self.base_path.join(LOG_FILE)
    }

    /// Create database schema
    fn create_schema(&self) -> FaultResult<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            -- Live tasks; seq keeps insertion order
            CREATE TABLE IF NOT EXISTS tasks (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                data_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Sync metadata for staleness detection
            CREATE TABLE IF NOT EXISTS sync_metadata (
                log TEXT PRIMARY KEY,
                last_sync_time INTEGER NOT NULL,
                file_mtime INTEGER NOT NULL,
                file_len INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    /// Make sure the log file and its directory entry are on disk
    fn ensure_log(&self) -> FaultResult<()> {
        let path = self.log_path();
        if !path.exists() {
            OpenOptions::new().create(true).append(true).open(&path)?.sync_all()?;
            sync_dir(&self.base_path)?;
        }
        Ok(())
    }

    /// Check if the cache needs rebuilding from the log
    ///
    /// Returns true if the log was never synced, or its size or modification
    /// time differ from what the last sync or write recorded.
    pub fn is_stale(&self) -> Result<bool> {
        self.check_stale().map_err(TaskStoreError::StorageRead)
    }

    fn check_stale(&self) -> FaultResult<bool> {
        let (file_mtime, file_len) = log_stamp(&self.log_path())?;

        let stored: Option<(i64, i64)> = self
            .db
            .query_row(
                "SELECT file_mtime, file_len FROM sync_metadata WHERE log = ?1",
                [LOG_KEY],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(match stored {
            None => true,
            Some((mtime, len)) => mtime != file_mtime || len != file_len,
        })
    }

    // ========================================================================
    // Task API
    // ========================================================================

    /// All live tasks in insertion order
    pub fn fetch_all(&self) -> Result<Vec<Task>> {
        self.read_all().map_err(TaskStoreError::StorageRead)
    }

    fn read_all(&self) -> FaultResult<Vec<Task>> {
        let mut stmt = self.db.prepare("SELECT data_json FROM tasks ORDER BY seq")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut tasks = Vec::new();
        for row_result in rows {
            let data_json = row_result?;
            tasks.push(serde_json::from_str(&data_json)?);
        }
        Ok(tasks)
    }

    /// Get a task by ID
    pub fn get(&self, id: TaskId) -> Result<Option<Task>> {
        self.read_one(id).map_err(TaskStoreError::StorageRead)
    }

    fn read_one(&self, id: TaskId) -> FaultResult<Option<Task>> {
        let json: Option<String> = self
            .db
            .query_row("SELECT data_json FROM tasks WHERE id = ?1", [id.to_string()], |row| {
                row.get(0)
            })
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Number of live tasks
    pub fn count(&self) -> Result<usize> {
        self.db
            .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(|e| TaskStoreError::StorageRead(e.into()))
    }

    /// Persist a new task
    pub fn create(&mut self, title: &str) -> Result<Task> {
        validate_title(title)?;

        let task = Task::new(title.to_string());
        debug!(id = %task.id, "create: called");

        let undo = jsonl::tombstone(&task.id.to_string(), task.updated_at);
        self.commit_change(|tx| insert_task(tx, &task), &task, &undo)
            .map_err(TaskStoreError::StorageWrite)?;

        Ok(task)
    }

    /// Replace the title of an existing task
    pub fn update(&mut self, id: TaskId, new_title: &str) -> Result<Task> {
        validate_title(new_title)?;

        let current = self.get(id)?.ok_or(TaskStoreError::NotFound(id))?;
        let updated = current.retitled(new_title.to_string());
        debug!(id = %id, "update: called");

        let undo = Task {
            updated_at: updated.updated_at,
            ..current
        };
        self.commit_change(
            |tx| {
                let data_json = serde_json::to_string(&updated)?;
                tx.execute(
                    "UPDATE tasks SET data_json = ?2, updated_at = ?3 WHERE id = ?1",
                    rusqlite::params![id.to_string(), data_json, updated.updated_at],
                )?;
                Ok(())
            },
            &updated,
            &undo,
        )
        .map_err(TaskStoreError::StorageWrite)?;

        Ok(updated)
    }

    /// Delete a task
    ///
    /// Deleting an id that is not present fails with `NotFound` and leaves
    /// the store untouched.
    pub fn delete(&mut self, id: TaskId) -> Result<()> {
        let current = self.get(id)?.ok_or(TaskStoreError::NotFound(id))?;
        debug!(id = %id, "delete: called");

        let deleted_at = now_ms().max(current.updated_at);
        let tombstone = jsonl::tombstone(&id.to_string(), deleted_at);
        let undo = Task {
            updated_at: deleted_at,
            ..current
        };
        self.commit_change(
            |tx| {
                tx.execute("DELETE FROM tasks WHERE id = ?1", [id.to_string()])?;
                Ok(())
            },
            &tombstone,
            &undo,
        )
        .map_err(TaskStoreError::StorageWrite)
    }

    /// Force the cache and the log to durable storage
    ///
    /// Mutations already fsync the log; this also checkpoints the SQLite WAL
    /// and is meant for suspension or shutdown.
    pub fn flush(&self) -> Result<()> {
        self.flush_inner().map_err(TaskStoreError::StorageWrite)
    }

    fn flush_inner(&self) -> FaultResult<()> {
        self.db.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        File::open(self.log_path())?.sync_all()?;
        sync_dir(&self.base_path)?;
        debug!("flush: complete");
        Ok(())
    }

    /// Flush and release the store
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        self.closed = true;
        info!(path = ?self.base_path, "Task store closed");
        Ok(())
    }

    /// Apply one change to the cache and the log as a unit
    ///
    /// `apply` runs inside a transaction. `entry` is appended to the log
    /// before commit; if anything fails after that append, `undo` is appended
    /// so that replaying the log does not resurrect the failed change.
    fn commit_change<F, E, U>(&mut self, apply: F, entry: &E, undo: &U) -> FaultResult<()>
    where
        F: FnOnce(&Connection) -> FaultResult<()>,
        E: Serialize,
        U: Serialize,
    {
        let log_path = self.log_path();

        let tx = self.db.transaction()?;
        apply(&*tx)?;

        // A failed append rolls back the transaction on drop
        jsonl::append_jsonl(&log_path, entry)?;

        let committed = log_stamp(&log_path).and_then(|stamp| {
            record_stamp(&tx, stamp)?;
            tx.commit()?;
            Ok(())
        });

        if let Err(e) = committed {
            warn!(error = %e, "Commit failed after log append, reverting");
            if let Err(revert_err) = jsonl::append_jsonl(&log_path, undo) {
                warn!(error = %revert_err, "Failed to append revert entry");
            }
            return Err(e);
        }

        Ok(())
    }

    // ========================================================================
    // Sync operations
    // ========================================================================

    /// Rebuild the SQLite cache from the log
    ///
    /// Returns the number of live tasks loaded. The log itself is not
    /// modified, so failures are reported as `StorageRead`.
    pub fn sync(&mut self) -> Result<usize> {
        self.sync_inner().map_err(TaskStoreError::StorageRead)
    }

    fn sync_inner(&mut self) -> FaultResult<usize> {
        info!("Syncing cache from log");

        let log_path = self.log_path();
        let stamp = log_stamp(&log_path)?;
        let entries = jsonl::read_jsonl_latest(&log_path)?;

        let tx = self.db.transaction()?;
        tx.execute("DELETE FROM tasks", [])?;

        let mut count = 0;
        for (id, value) in entries {
            // Skip tombstones
            if jsonl::is_tombstone(&value) {
                continue;
            }

            let task: Task = match serde_json::from_value(value) {
                Ok(t) => t,
                Err(e) => {
                    warn!(id = %id, error = ?e, "Skipping log entry that is not a task");
                    continue;
                }
            };
            if validate_title(&task.title).is_err() {
                warn!(id = %id, "Skipping task with empty title");
                continue;
            }

            insert_task(&tx, &task)?;
            count += 1;
        }

        record_stamp(&tx, stamp)?;
        tx.commit()?;

        info!(count, "Sync complete");
        Ok(count)
    }
}

impl Drop for TaskStore {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.flush_inner() {
            warn!(path = ?self.base_path, error = %e, "Flush on drop failed");
        }
    }
}

fn insert_task(conn: &Connection, task: &Task) -> FaultResult<()> {
    let data_json = serde_json::to_string(task)?;
    conn.execute(
        "INSERT INTO tasks (id, data_json, updated_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![task.id.to_string(), data_json, task.updated_at],
    )?;
    Ok(())
}

fn acquire_lock(path: &Path) -> FaultResult<File> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if e.kind() == ErrorKind::WouldBlock => Err(StorageFault::Locked),
        Err(e) => Err(e.into()),
    }
}

/// Write the version file, or refuse a store written by a newer format
fn check_version(path: &Path) -> FaultResult<()> {
    if !path.exists() {
        let mut file = File::create(path)?;
        file.write_all(CURRENT_VERSION.to_string().as_bytes())?;
        file.sync_all()?;
        if let Some(parent) = path.parent() {
            sync_dir(parent)?;
        }
        return Ok(());
    }

    let content = fs::read_to_string(path)?;
    let found: u32 = content
        .trim()
        .parse()
        .map_err(|_| StorageFault::Corrupt(format!("invalid version file: {:?}", content.trim())))?;

    if found > CURRENT_VERSION {
        return Err(StorageFault::UnsupportedVersion {
            found,
            supported: CURRENT_VERSION,
        });
    }
    Ok(())
}

/// (mtime in ms, length in bytes) of the log file
fn log_stamp(path: &Path) -> FaultResult<(i64, i64)> {
    let metadata = fs::metadata(path)?;
    let file_mtime = metadata
        .modified()?
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    Ok((file_mtime, metadata.len() as i64))
}

fn record_stamp(conn: &Connection, (file_mtime, file_len): (i64, i64)) -> FaultResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO sync_metadata (log, last_sync_time, file_mtime, file_len)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![LOG_KEY, now_ms(), file_mtime, file_len],
    )?;
    Ok(())
}

fn sync_dir(path: &Path) -> FaultResult<()> {
    #[cfg(unix)]
    File::open(path)?.sync_all()?;
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn titles(store: &TaskStore) -> Vec<String> {
        store.fetch_all().unwrap().into_iter().map(|t| t.title).collect()
    }

    #[test]
    fn test_store_open_creates_layout() {
        let temp = TempDir::new().unwrap();

        let store = TaskStore::open(temp.path()).unwrap();
        assert_eq!(store.base_path(), temp.path());
        assert!(temp.path().join(DB_FILE).exists());
        assert!(temp.path().join(LOG_FILE).exists());
        assert!(temp.path().join(LOCK_FILE).exists());

        let version = fs::read_to_string(temp.path().join(VERSION_FILE)).unwrap();
        assert_eq!(version, CURRENT_VERSION.to_string());
    }

    #[test]
    fn test_existing_version_file_is_kept() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(VERSION_FILE), "1\n").unwrap();

        let _store = TaskStore::open(temp.path()).unwrap();
        let version = fs::read_to_string(temp.path().join(VERSION_FILE)).unwrap();
        assert_eq!(version, "1\n");
    }

    #[test]
    fn test_create_appends_to_log() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();

        let task = store.create("Buy milk").unwrap();
        assert_eq!(task.title, "Buy milk");

        let content = fs::read_to_string(temp.path().join(LOG_FILE)).unwrap();
        assert!(content.contains(&task.id.to_string()));
        assert!(content.contains("\"title\":\"Buy milk\""));

        let retrieved = store.get(task.id).unwrap().unwrap();
        assert_eq!(retrieved, task);
    }

    #[test]
    fn test_create_keeps_title_verbatim() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();

        let task = store.create("  spaced  ").unwrap();
        assert_eq!(task.title, "  spaced  ");
        assert_eq!(titles(&store), vec!["  spaced  "]);
    }

    #[test]
    fn test_create_rejects_blank_title() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();

        assert!(matches!(store.create(""), Err(TaskStoreError::Validation)));
        assert!(matches!(store.create("   "), Err(TaskStoreError::Validation)));
        assert_eq!(store.count().unwrap(), 0);

        let content = fs::read_to_string(temp.path().join(LOG_FILE)).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn test_update_keeps_identity_and_count() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();

        let task = store.create("Original").unwrap();
        store.create("Other").unwrap();

        let updated = store.update(task.id, "Updated").unwrap();
        assert_eq!(updated.id, task.id);
        assert_eq!(updated.created_at, task.created_at);

        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.get(task.id).unwrap().unwrap().title, "Updated");
        // edit does not move the task
        assert_eq!(titles(&store), vec!["Updated", "Other"]);
    }

    #[test]
    fn test_update_missing_task() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();

        let id = TaskId::new();
        assert!(matches!(store.update(id, "x"), Err(TaskStoreError::NotFound(missing)) if missing == id));
    }

    #[test]
    fn test_update_rejects_blank_title() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();

        let task = store.create("Keep me").unwrap();
        assert!(matches!(store.update(task.id, " "), Err(TaskStoreError::Validation)));
        assert_eq!(store.get(task.id).unwrap().unwrap().title, "Keep me");
    }

    #[test]
    fn test_delete_writes_tombstone() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();

        let task = store.create("To Delete").unwrap();
        store.delete(task.id).unwrap();

        assert!(store.get(task.id).unwrap().is_none());

        let content = fs::read_to_string(temp.path().join(LOG_FILE)).unwrap();
        assert!(content.contains("\"deleted\":true"));
    }

    #[test]
    fn test_delete_missing_is_not_found_and_leaves_log_alone() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();

        let task = store.create("Stay").unwrap();
        let before = fs::read_to_string(temp.path().join(LOG_FILE)).unwrap();

        let id = TaskId::new();
        assert!(matches!(store.delete(id), Err(TaskStoreError::NotFound(_))));
        assert!(matches!(store.delete(id), Err(TaskStoreError::NotFound(_))));

        let after = fs::read_to_string(temp.path().join(LOG_FILE)).unwrap();
        assert_eq!(before, after);
        assert_eq!(store.fetch_all().unwrap(), vec![task]);
    }

    #[test]
    fn test_fetch_all_in_insertion_order() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();

        for title in ["A", "B", "C"] {
            store.create(title).unwrap();
        }

        assert_eq!(titles(&store), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_failed_append_is_not_visible() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();
        store.create("Before").unwrap();

        // Replace the log with a directory so the append fails
        let log = temp.path().join(LOG_FILE);
        let saved = fs::read_to_string(&log).unwrap();
        fs::remove_file(&log).unwrap();
        fs::create_dir(&log).unwrap();

        let result = store.create("Lost");
        assert!(matches!(result, Err(TaskStoreError::StorageWrite(_))));
        assert_eq!(titles(&store), vec!["Before"]);

        fs::remove_dir(&log).unwrap();
        fs::write(&log, saved).unwrap();
        assert_eq!(store.sync().unwrap(), 1);
        assert_eq!(titles(&store), vec!["Before"]);
    }

    #[test]
    fn test_commit_failure_after_append_is_reverted_in_log() {
        let temp = TempDir::new().unwrap();
        let keep = {
            let mut store = TaskStore::open(temp.path()).unwrap();
            let keep = store.create("Keep").unwrap();

            // Appends still succeed but recording the log stamp fails
            store.db.execute("DROP TABLE sync_metadata", []).unwrap();

            assert!(matches!(store.create("Lost"), Err(TaskStoreError::StorageWrite(_))));
            assert!(matches!(
                store.update(keep.id, "Changed"),
                Err(TaskStoreError::StorageWrite(_))
            ));
            assert!(matches!(store.delete(keep.id), Err(TaskStoreError::StorageWrite(_))));
            assert_eq!(store.fetch_all().unwrap(), vec![keep.clone()]);

            // original create, then each change followed by its undo line
            let content = fs::read_to_string(temp.path().join(LOG_FILE)).unwrap();
            assert_eq!(content.lines().count(), 7);
            assert!(content.contains("\"title\":\"Lost\""));
            assert!(content.contains("\"title\":\"Changed\""));
            assert_eq!(content.matches("\"deleted\":true").count(), 2);
            keep
        };

        // Replay must not resurrect any of the failed changes
        let store = TaskStore::open(temp.path()).unwrap();
        let tasks = store.fetch_all().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, keep.id);
        assert_eq!(tasks[0].title, "Keep");
    }

    #[test]
    fn test_unreadable_log_fails_open() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(LOG_FILE)).unwrap();

        match TaskStore::open(temp.path()) {
            Err(TaskStoreError::StorageInit { source, .. }) => {
                assert!(matches!(source, StorageFault::Io(_)));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("open should fail on an unreadable log"),
        }

        // the failed open released its lock
        fs::remove_dir(temp.path().join(LOG_FILE)).unwrap();
        let store = TaskStore::open(temp.path()).unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_corrupt_cache_row_is_read_error() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();
        store.create("Fine").unwrap();

        store
            .db
            .execute("UPDATE tasks SET data_json = 'not json'", [])
            .unwrap();

        assert!(matches!(store.fetch_all(), Err(TaskStoreError::StorageRead(_))));
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let (kept, renamed) = {
            let mut store = TaskStore::open(temp.path()).unwrap();
            let kept = store.create("Keep").unwrap();
            let gone = store.create("Gone").unwrap();
            let renamed = store.create("Old name").unwrap();
            store.delete(gone.id).unwrap();
            store.update(renamed.id, "New name").unwrap();
            store.close().unwrap();
            (kept, renamed)
        };

        let store = TaskStore::open(temp.path()).unwrap();
        let tasks = store.fetch_all().unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, kept.id);
        assert_eq!(tasks[1].id, renamed.id);
        assert_eq!(tasks[1].title, "New name");
    }

    #[test]
    fn test_rebuilds_missing_cache_from_log() {
        let temp = TempDir::new().unwrap();
        {
            let mut store = TaskStore::open(temp.path()).unwrap();
            store.create("First").unwrap();
            store.create("Second").unwrap();
            store.close().unwrap();
        }

        for name in [DB_FILE, "tasks.db-wal", "tasks.db-shm"] {
            let _ = fs::remove_file(temp.path().join(name));
        }

        let store = TaskStore::open(temp.path()).unwrap();
        assert_eq!(titles(&store), vec!["First", "Second"]);
    }

    #[test]
    fn test_external_log_append_marks_cache_stale() {
        let temp = TempDir::new().unwrap();
        {
            let mut store = TaskStore::open(temp.path()).unwrap();
            store.create("Local").unwrap();
            store.close().unwrap();
        }

        let external = Task::new("External".to_string());
        jsonl::append_jsonl(&temp.path().join(LOG_FILE), &external).unwrap();

        let store = TaskStore::open(temp.path()).unwrap();
        assert_eq!(titles(&store), vec!["Local", "External"]);
        assert!(!store.is_stale().unwrap());
    }

    #[test]
    fn test_writes_keep_cache_fresh() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();

        let task = store.create("A").unwrap();
        assert!(!store.is_stale().unwrap());
        store.update(task.id, "B").unwrap();
        assert!(!store.is_stale().unwrap());
        store.delete(task.id).unwrap();
        assert!(!store.is_stale().unwrap());
    }

    #[test]
    fn test_second_open_is_locked_out() {
        let temp = TempDir::new().unwrap();
        let _store = TaskStore::open(temp.path()).unwrap();

        match TaskStore::open(temp.path()) {
            Err(TaskStoreError::StorageInit { source, .. }) => {
                assert!(matches!(source, StorageFault::Locked));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("second open should fail"),
        }
    }

    #[test]
    fn test_newer_version_is_init_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(VERSION_FILE), "99").unwrap();

        match TaskStore::open(temp.path()) {
            Err(TaskStoreError::StorageInit { source, .. }) => {
                assert!(matches!(
                    source,
                    StorageFault::UnsupportedVersion { found: 99, supported: CURRENT_VERSION }
                ));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("open should refuse a newer store"),
        }
    }

    #[test]
    fn test_flush_and_close() {
        let temp = TempDir::new().unwrap();
        let mut store = TaskStore::open(temp.path()).unwrap();
        store.create("Flushed").unwrap();
        store.flush().unwrap();
        store.close().unwrap();

        // lock released by close
        let store = TaskStore::open(temp.path()).unwrap();
        assert_eq!(titles(&store), vec!["Flushed"]);
    }
}
