//! Pipeline stages
//!
//! Stages run strictly in order. Each one reads the previous stage's
//! checkpoint, resumes from its own and persists after every item.

pub mod details;
pub mod export;
pub mod listing;
pub mod registry;
pub mod social;

use serde::Serialize;
use std::fmt;
use tracing::info;

pub use registry::RegistryEnricher;
pub use social::ProfileDiscovery;

/// Pipeline stage; checkpointed stages store their output under `as_str()`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    List,
    Details,
    Registry,
    Social,
    Export,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::List,
        Stage::Details,
        Stage::Registry,
        Stage::Social,
        Stage::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::List => "list",
            Stage::Details => "details",
            Stage::Registry => "registry",
            Stage::Social => "social",
            Stage::Export => "export",
        }
    }

    /// Whether the stage keeps a checkpoint
    pub fn is_checkpointed(&self) -> bool {
        !matches!(self, Stage::Export)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome counts of one stage run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    /// Items worked on during this run
    pub processed: usize,
    pub succeeded: usize,
    /// Items that ended as a placeholder, a sentinel or were left for retry
    pub failed: usize,
    /// Items already done by an earlier run
    pub skipped: usize,
    /// Records (or rows) written
    pub written: usize,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            processed: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            written: 0,
        }
    }

    pub fn log(&self, source: &str) {
        info!(
            source = %source,
            stage = %self.stage,
            processed = self.processed,
            succeeded = self.succeeded,
            failed = self.failed,
            skipped = self.skipped,
            written = self.written,
            "Stage complete"
        );
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_names() {
        assert!(Stage::List < Stage::Export);
        let names: Vec<&str> = Stage::ALL.iter().map(Stage::as_str).collect();
        assert_eq!(names, vec!["list", "details", "registry", "social", "export"]);
        assert!(!Stage::Export.is_checkpointed());
    }
}
