//! Detail stage: fetch every listed entity's detail page

use dirscout_common::checkpoint::CheckpointStore;
use std::collections::HashSet;
use tracing::{info, warn};

use super::{Stage, StageReport};
use crate::adapters::SourceAdapter;
use crate::error::Result;
use crate::models::{DetailRecord, SourceRecord};
use crate::progress::{create_stage_progress, Tally};

/// Fetch details for every listed link not yet checkpointed.
///
/// Per-item failures are logged and left out of the checkpoint, so the next
/// run retries them. Checkpoint write failures abort the stage.
pub async fn run(
    store: &CheckpointStore,
    adapter: &dyn SourceAdapter,
    limit: Option<usize>,
    show_progress: bool,
) -> Result<StageReport> {
    let mut report = StageReport::new(Stage::Details);
    let errors = store.error_log();

    let mut listed: Vec<SourceRecord> = store.load(Stage::List.as_str())?;
    if let Some(limit) = limit {
        listed.truncate(limit);
    }

    let mut checkpoint = store.checkpoint::<DetailRecord>(Stage::Details.as_str())?;
    let mut done: HashSet<String> = checkpoint.records().iter().map(|r| r.link.clone()).collect();

    let pending: Vec<&SourceRecord> = listed
        .iter()
        .filter(|r| !done.contains(&r.link))
        .collect();
    report.skipped = listed.len() - pending.len();

    info!(
        source = %store.source(),
        pending = pending.len(),
        done = report.skipped,
        "Fetching details"
    );

    let pb = create_stage_progress(Stage::Details.as_str(), pending.len() as u64, show_progress);
    let mut tally = Tally::default();

    for source in pending {
        // Duplicate links within the listing itself
        if !done.insert(source.link.clone()) {
            tally.success(&pb);
            continue;
        }
        report.processed += 1;

        match adapter.details(&source.link).await {
            Ok(fields) => {
                checkpoint.append([DetailRecord::new(source, fields)])?;
                report.succeeded += 1;
                report.written += 1;
                tally.success(&pb);
            }
            Err(e) => {
                warn!(
                    source = %store.source(),
                    name = %source.name,
                    link = %source.link,
                    error = %e,
                    "Detail fetch failed"
                );
                errors.record(
                    Stage::Details.as_str(),
                    &[("name", source.name.as_str()), ("link", source.link.as_str())],
                    &e,
                );
                done.remove(&source.link);
                report.failed += 1;
                tally.failure(&pb);
            }
        }
    }

    pb.finish_and_clear();
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::DetailFields;
    use crate::stages::fakes::FakeAdapter;
    use crate::stages::listing;
    use dirscout_common::checkpoint::Namespace;
    use std::sync::atomic::Ordering;

    fn listed() -> Vec<SourceRecord> {
        ["acme", "globex", "initech"]
            .iter()
            .map(|n| SourceRecord {
                name: n.to_string(),
                link: format!("https://d.example/{}", n),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_resume_fetches_only_missing_links() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path(), "fake", Namespace::Live).unwrap();

        let mut adapter = FakeAdapter::new(listed());
        adapter.details.insert(
            "https://d.example/acme".to_string(),
            DetailFields {
                postal_code: Some("75002".to_string()),
                ..Default::default()
            },
        );
        adapter.failing.push("https://d.example/globex".to_string());
        listing::run(&store, &adapter).await.unwrap();

        let first = run(&store, &adapter, None, false).await.unwrap();
        assert_eq!(first.succeeded, 2);
        assert_eq!(first.failed, 1);
        assert_eq!(store.error_log().entries().unwrap().len(), 1);

        // Second run: only the failed link is retried, and now succeeds
        let mut adapter = FakeAdapter::new(listed());
        adapter.failing.clear();
        let second = run(&store, &adapter, None, false).await.unwrap();
        assert_eq!(second.skipped, 2);
        assert_eq!(second.succeeded, 1);
        assert_eq!(adapter.detail_calls.load(Ordering::SeqCst), 1);

        // Third run: nothing to do, no duplicates
        let third = run(&store, &adapter, None, false).await.unwrap();
        assert_eq!(third.processed, 0);

        let saved: Vec<DetailRecord> = store.load("details").unwrap();
        let links: HashSet<&str> = saved.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(saved.len(), 3);
        assert_eq!(links.len(), 3);
        assert_eq!(saved[0].postal_code(), Some("75002"));
    }

    #[tokio::test]
    async fn test_limit_caps_listed_entities() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path(), "fake", Namespace::Trial).unwrap();
        let adapter = FakeAdapter::new(listed());
        listing::run(&store, &adapter).await.unwrap();

        let report = run(&store, &adapter, Some(2), false).await.unwrap();
        assert_eq!(report.written, 2);
        assert_eq!(store.count("details").unwrap(), 2);
    }
}
