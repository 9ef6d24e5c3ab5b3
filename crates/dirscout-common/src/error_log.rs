//! Append-only error log
//!
//! Every error caught at an item boundary is appended as one JSON line, so the
//! log survives crashes and can be inspected with line-oriented tools.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

use crate::error::Result;

/// One caught failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub stage: String,
    /// Item identity and any other fields useful to reproduce the failure
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    pub message: String,
}

/// Error log of a single source
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
    source: String,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>, source: &str) -> Self {
        Self {
            path: path.into(),
            source: source.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a caught per-item failure.
    ///
    /// Failing to write the log never aborts the item loop; the failure is
    /// reported through tracing instead.
    pub fn record(&self, stage: &str, context: &[(&str, &str)], message: impl std::fmt::Display) {
        let entry = ErrorEntry {
            timestamp: Utc::now(),
            source: self.source.clone(),
            stage: stage.to_string(),
            context: context
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            message: message.to_string(),
        };

        warn!(
            source = %entry.source,
            stage = %entry.stage,
            context = ?entry.context,
            message = %entry.message,
            "Item failed"
        );

        if let Err(e) = serde_jsonlines::append_json_lines(&self.path, [&entry]) {
            error!(error = %e, path = %self.path.display(), "Failed to append to error log");
        }
    }

    /// Read every entry back, oldest first
    pub fn entries(&self) -> Result<Vec<ErrorEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let entries: Vec<ErrorEntry> =
            serde_jsonlines::json_lines(&self.path)?.collect::<std::io::Result<_>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_appends_lines() {
        let temp = TempDir::new().unwrap();
        let log = ErrorLog::new(temp.path().join("errors.jsonl"), "acme-dir");

        log.record("registry", &[("name", "Acme")], "HTTP 503");
        log.record("social", &[("name", "Beta"), ("website", "beta.fr")], "refused");

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].stage, "registry");
        assert_eq!(entries[0].source, "acme-dir");
        assert_eq!(entries[0].context.get("name").map(String::as_str), Some("Acme"));
        assert_eq!(entries[1].message, "refused");
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[test]
    fn test_missing_log_has_no_entries() {
        let temp = TempDir::new().unwrap();
        let log = ErrorLog::new(temp.path().join("errors.jsonl"), "acme-dir");
        assert!(log.entries().unwrap().is_empty());
    }
}
