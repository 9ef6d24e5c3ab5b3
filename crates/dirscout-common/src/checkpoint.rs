//! Checkpoint store
//!
//! A checkpoint is the ordered sequence of records one stage has produced for
//! one source. Each checkpoint lives in its own JSON file:
//!
//! ```text
//! <data_dir>/<source>/<stage>.json          live runs
//! <data_dir>/trial/<source>/<stage>.json    trial runs
//! ```
//!
//! Every save rewrites the whole sequence into a sibling temp file, fsyncs
//! it and renames it over the previous file. A reader therefore sees either
//! the old sequence or the new one, never a partial write.

use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{DirscoutError, Result};
use crate::error_log::ErrorLog;

/// File name of the per-source error log
pub const ERROR_LOG_FILE: &str = "errors.jsonl";

/// Directory holding trial-run checkpoints, isolated from live data
pub const TRIAL_DIR: &str = "trial";

/// Which set of checkpoints a run reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Namespace {
    /// Production checkpoints
    #[default]
    Live,
    /// Dry-run checkpoints, never mixed with live ones
    Trial,
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Namespace::Live => write!(f, "live"),
            Namespace::Trial => write!(f, "trial"),
        }
    }
}

/// Durable mapping from stage name to record sequence for a single source
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    source: String,
    namespace: Namespace,
    dir: PathBuf,
}

impl CheckpointStore {
    /// Open (and create if needed) the checkpoint directory of `source`.
    ///
    /// Fails with [`DirscoutError::Unwritable`] when the directory cannot be
    /// created or written to; callers treat this as fatal.
    pub fn open(data_dir: impl AsRef<Path>, source: &str, namespace: Namespace) -> Result<Self> {
        validate_source_name(source)?;

        let root = match namespace {
            Namespace::Live => data_dir.as_ref().to_path_buf(),
            Namespace::Trial => data_dir.as_ref().join(TRIAL_DIR),
        };
        let dir = root.join(source);

        fs::create_dir_all(&dir).map_err(|source| DirscoutError::Unwritable {
            path: dir.clone(),
            source,
        })?;

        // Probe writability up front so the failure surfaces before any work
        NamedTempFile::new_in(&dir).map_err(|source| DirscoutError::Unwritable {
            path: dir.clone(),
            source,
        })?;

        debug!(
            source = %source,
            namespace = %namespace,
            dir = %dir.display(),
            "Opened checkpoint store"
        );

        Ok(Self {
            source: source.to_string(),
            namespace,
            dir,
        })
    }

    /// Source this store belongs to
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Directory holding this source's checkpoint files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the checkpoint file for `stage`
    pub fn path(&self, stage: &str) -> PathBuf {
        self.dir.join(format!("{}.json", stage))
    }

    /// Load the full record sequence of `stage`; a missing file is an empty sequence
    pub fn load<T: DeserializeOwned>(&self, stage: &str) -> Result<Vec<T>> {
        let path = self.path(stage);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content)
            .map_err(|source| DirscoutError::CorruptCheckpoint { path, source })
    }

    /// Rewrite the full record sequence of `stage`
    pub fn save<T: Serialize>(&self, stage: &str, records: &[T]) -> Result<()> {
        write_atomic(&self.path(stage), records)
    }

    /// Number of records currently checkpointed for `stage`
    pub fn count(&self, stage: &str) -> Result<usize> {
        Ok(self.load::<serde_json::Value>(stage)?.len())
    }

    /// Load `stage` into an appendable handle
    pub fn checkpoint<T: DeserializeOwned>(&self, stage: &str) -> Result<Checkpoint<T>> {
        let records = self.load(stage)?;
        debug!(
            source = %self.source,
            stage = %stage,
            records = records.len(),
            "Loaded checkpoint"
        );
        Ok(Checkpoint {
            path: self.path(stage),
            records,
        })
    }

    /// Append-only error log of this source (namespaced like the checkpoints)
    pub fn error_log(&self) -> ErrorLog {
        ErrorLog::new(self.dir.join(ERROR_LOG_FILE), &self.source)
    }
}

/// In-memory view of one checkpoint that persists itself on every append
#[derive(Debug)]
pub struct Checkpoint<T> {
    path: PathBuf,
    records: Vec<T>,
}

impl<T> Checkpoint<T> {
    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_records(self) -> Vec<T> {
        self.records
    }
}

impl<T: Serialize> Checkpoint<T> {
    /// Append `items` and durably rewrite the whole sequence.
    ///
    /// On a failed write the in-memory sequence is rolled back, so memory
    /// never runs ahead of disk.
    pub fn append<I>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        let before = self.records.len();
        self.records.extend(items);

        if let Err(e) = write_atomic(&self.path, &self.records) {
            self.records.truncate(before);
            return Err(e);
        }
        Ok(())
    }

    /// Replace the sequence wholesale (used when a stage materializes in one go)
    pub fn replace(&mut self, records: Vec<T>) -> Result<()> {
        write_atomic(&self.path, &records)?;
        self.records = records;
        Ok(())
    }
}

fn validate_source_name(source: &str) -> Result<()> {
    let valid = !source.is_empty()
        && source != TRIAL_DIR
        && !source.starts_with('.')
        && source
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(DirscoutError::InvalidSource(source.to_string()))
    }
}

fn write_atomic<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| DirscoutError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        name: String,
    }

    fn row(name: &str) -> Row {
        Row {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_missing_checkpoint_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path(), "acme-dir", Namespace::Live).unwrap();

        let rows: Vec<Row> = store.load("details").unwrap();
        assert!(rows.is_empty());
        assert_eq!(store.count("details").unwrap(), 0);
    }

    #[test]
    fn test_append_persists_whole_sequence() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path(), "acme-dir", Namespace::Live).unwrap();

        let mut cp = store.checkpoint::<Row>("details").unwrap();
        cp.append([row("a")]).unwrap();
        cp.append([row("b"), row("c")]).unwrap();

        let reloaded: Vec<Row> = store.load("details").unwrap();
        assert_eq!(reloaded, vec![row("a"), row("b"), row("c")]);
        assert_eq!(cp.len(), 3);
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path(), "acme-dir", Namespace::Live).unwrap();

        store.save("list", &[row("a")]).unwrap();
        store.save("list", &[row("a"), row("b")]).unwrap();

        let files: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(files, vec!["list.json".to_string()]);
    }

    #[test]
    fn test_trial_namespace_is_isolated() {
        let temp = TempDir::new().unwrap();
        let live = CheckpointStore::open(temp.path(), "acme-dir", Namespace::Live).unwrap();
        let trial = CheckpointStore::open(temp.path(), "acme-dir", Namespace::Trial).unwrap();

        trial.save("list", &[row("trial-only")]).unwrap();

        assert_eq!(live.count("list").unwrap(), 0);
        assert_eq!(trial.count("list").unwrap(), 1);
        assert!(trial.path("list").starts_with(temp.path().join(TRIAL_DIR)));
    }

    #[test]
    fn test_corrupt_checkpoint_is_reported() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path(), "acme-dir", Namespace::Live).unwrap();
        fs::write(store.path("list"), "[{\"name\": ").unwrap();

        let err = store.load::<Row>("list").unwrap_err();
        assert!(matches!(err, DirscoutError::CorruptCheckpoint { .. }));
    }

    #[test]
    fn test_rejects_path_like_source_names() {
        let temp = TempDir::new().unwrap();
        for bad in ["", "../etc", "a/b", "trial", ".hidden"] {
            let result = CheckpointStore::open(temp.path(), bad, Namespace::Live);
            assert!(
                matches!(result, Err(DirscoutError::InvalidSource(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_replace_overwrites() {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::open(temp.path(), "acme-dir", Namespace::Live).unwrap();

        let mut cp = store.checkpoint::<Row>("list").unwrap();
        cp.append([row("old")]).unwrap();
        cp.replace(vec![row("new")]).unwrap();

        assert_eq!(store.load::<Row>("list").unwrap(), vec![row("new")]);
    }
}
