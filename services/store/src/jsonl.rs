//! Append-only JSONL log files
//!
//! One record per line, UTF-8 JSON. The writer is opened append-only and
//! held for the process lifetime; replay opens the file read-only and
//! folds it left-to-right. A line that fails to parse is skipped with a
//! logged warning and replay continues — best-effort recovery, never an
//! abort.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;
use types::errors::SolverError;

/// Controls whether an append is durable before it is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// Buffered append: fast, loses at most the last write on crash.
    #[default]
    Buffered,
    /// Fsync every line before acknowledging.
    Fsync,
}

/// Append-only writer for one table's log file.
pub struct JsonlWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    durability: Durability,
}

impl JsonlWriter {
    /// Open (creating if absent) the log at `path` for appending.
    pub fn open(path: impl Into<PathBuf>, durability: Durability) -> Result<Self, SolverError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SolverError::Fatal(format!("cannot open log {}: {}", path.display(), e)))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            durability,
        })
    }

    /// Append one record as a JSON line.
    ///
    /// The line reaches the OS before this returns; with
    /// `Durability::Fsync` it reaches the disk.
    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<(), SolverError> {
        let line = serde_json::to_string(record)
            .map_err(|e| SolverError::Corruption(format!("cannot encode record: {}", e)))?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        if self.durability == Durability::Fsync {
            self.writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Flush and fsync; called on shutdown.
    pub fn sync(&mut self) -> Result<(), SolverError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Replay a log file into the records it contains, in file order.
///
/// A missing file is an empty table, not an error. Unparseable lines are
/// skipped with a warning; the rest of the file is still applied.
pub fn replay<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SolverError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)
        .map_err(|e| SolverError::Fatal(format!("cannot open log {}: {}", path.display(), e)))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(
                    file = %path.display(),
                    line = line_no + 1,
                    error = %e,
                    "skipping corrupt log line"
                );
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: String,
        value: u64,
    }

    fn record(id: &str, value: u64) -> Record {
        Record {
            id: id.to_string(),
            value,
        }
    }

    #[test]
    fn test_append_then_replay() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("table.jsonl");

        let mut writer = JsonlWriter::open(&path, Durability::Buffered).unwrap();
        writer.append(&record("a", 1)).unwrap();
        writer.append(&record("b", 2)).unwrap();
        drop(writer);

        let records: Vec<Record> = replay(&path).unwrap();
        assert_eq!(records, vec![record("a", 1), record("b", 2)]);
    }

    #[test]
    fn test_replay_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let records: Vec<Record> = replay(&tmp.path().join("absent.jsonl")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_replay_skips_corrupt_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("table.jsonl");

        let mut writer = JsonlWriter::open(&path, Durability::Buffered).unwrap();
        writer.append(&record("a", 1)).unwrap();
        drop(writer);

        // inject garbage between valid lines
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();
        drop(file);

        let mut writer = JsonlWriter::open(&path, Durability::Buffered).unwrap();
        writer.append(&record("b", 2)).unwrap();
        drop(writer);

        let records: Vec<Record> = replay(&path).unwrap();
        assert_eq!(records, vec![record("a", 1), record("b", 2)]);
    }

    #[test]
    fn test_append_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("table.jsonl");

        let mut writer = JsonlWriter::open(&path, Durability::Fsync).unwrap();
        writer.append(&record("a", 1)).unwrap();
        drop(writer);

        let mut writer = JsonlWriter::open(&path, Durability::Fsync).unwrap();
        writer.append(&record("a", 2)).unwrap();
        drop(writer);

        // both post-images present, in write order
        let records: Vec<Record> = replay(&path).unwrap();
        assert_eq!(records, vec![record("a", 1), record("a", 2)]);
    }
}
