// JSONL append log operations

use crate::error::StorageFault;
use fs2::FileExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Append one record to a JSONL file and fsync it
pub fn append_jsonl<T: Serialize>(path: &Path, record: &T) -> Result<(), StorageFault> {
    let json = serde_json::to_string(record)?;

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    // Acquire exclusive lock before writing
    file.lock_exclusive()?;
    let start = file.metadata()?.len();

    let written = writeln!(file, "{}", json).and_then(|_| file.sync_all());
    if let Err(e) = written {
        // a torn line would also corrupt the next append
        if let Err(trunc_err) = file.set_len(start) {
            warn!(file = ?path, error = ?trunc_err, "Failed to truncate torn line");
        }
        return Err(e.into());
    }

    // Lock is automatically released when file is dropped
    Ok(())
}

/// Tombstone line marking an id as deleted
pub fn tombstone(id: &str, updated_at: i64) -> Value {
    serde_json::json!({
        "id": id,
        "deleted": true,
        "updated_at": updated_at,
    })
}

/// True if a log value is a tombstone
pub fn is_tombstone(value: &Value) -> bool {
    value.get("deleted").and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Read all records from a JSONL file, returning the latest version per ID
///
/// For records with duplicate IDs, the one with the highest `updated_at` wins;
/// on a tie the later line wins. The result keeps each ID at the position of
/// its first appearance, so replay preserves insertion order. Tombstones are
/// returned like any other version; callers drop them.
pub fn read_jsonl_latest(path: &Path) -> Result<Vec<(String, Value)>, StorageFault> {
    if !path.exists() {
        // File doesn't exist yet
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records: Vec<(String, Value)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            // bad UTF-8 is consumed with the line, so the next read moves on
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to read line, skipping"
                );
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if line.trim().is_empty() {
            continue;
        }

        let value: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to parse JSON, skipping"
                );
                continue;
            }
        };

        let Some(id) = value.get("id").and_then(|v| v.as_str()).map(str::to_string) else {
            warn!(file = ?path, line = line_num + 1, "Line has no id, skipping");
            continue;
        };
        let updated_at = updated_at_of(&value);

        match positions.get(&id) {
            Some(&pos) => {
                if updated_at >= updated_at_of(&records[pos].1) {
                    records[pos].1 = value;
                }
            }
            None => {
                positions.insert(id.clone(), records.len());
                records.push((id, value));
            }
        }
    }

    debug!(file = ?path, count = records.len(), "Loaded latest records from JSONL");

    Ok(records)
}

fn updated_at_of(value: &Value) -> i64 {
    value.get("updated_at").and_then(|v| v.as_i64()).unwrap_or(0)
}
