//! Listing stage: materialize the source's entity list once

use dirscout_common::checkpoint::CheckpointStore;
use std::collections::HashSet;
use tracing::info;

use super::{Stage, StageReport};
use crate::adapters::SourceAdapter;
use crate::error::Result;
use crate::models::SourceRecord;

/// Fetch the listing unless it is already checkpointed.
///
/// An existing checkpoint counts as materialized even when the source listed
/// nothing.
///
/// A listing failure is fatal: nothing downstream can run without it.
pub async fn run(store: &CheckpointStore, adapter: &dyn SourceAdapter) -> Result<StageReport> {
    let mut report = StageReport::new(Stage::List);
    let mut checkpoint = store.checkpoint::<SourceRecord>(Stage::List.as_str())?;

    if checkpoint.path().exists() {
        info!(
            source = %store.source(),
            entries = checkpoint.len(),
            "Listing already materialized, skipping"
        );
        report.skipped = checkpoint.len();
        return Ok(report);
    }

    let listed = adapter.list().await?;
    let total = listed.len();

    let mut seen = HashSet::new();
    let records: Vec<SourceRecord> = listed
        .into_iter()
        .filter(|r| seen.insert(r.link.clone()))
        .collect();

    report.processed = total;
    report.succeeded = records.len();
    report.written = records.len();
    checkpoint.replace(records)?;

    info!(
        source = %store.source(),
        listed = total,
        unique = report.written,
        "Listing saved"
    );
    Ok(report)
}
