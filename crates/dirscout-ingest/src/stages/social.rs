//! Social-profile discovery stage
//!
//! For each match record: load the entity's website, scan it for a profile
//! link, and fall back to a web search when the page has none. The outcome is
//! three-way:
//!
//! - a URL when one was found
//! - `""` when the lookup completed without finding one, including when the
//!   site timed out on every attempt
//! - `"ERROR"` after a non-timeout navigation failure on the final attempt or
//!   any other error escaping the lookup
//!
//! Both `""` and `"ERROR"` are final once checkpointed.

use dirscout_common::checkpoint::{Checkpoint, CheckpointStore};
use dirscout_common::error_log::ErrorLog;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

use super::{Stage, StageReport};
use crate::config::DiscoveryConfig;
use crate::error::Result;
use crate::models::{DetailRecord, EnrichedRecord, FinalRecord, ProfileLookup};
use crate::progress::{create_stage_progress, Tally};
use crate::social::links::{select_page_link, select_search_link};
use crate::social::{BrowserLauncher, BrowserSession, Navigation, Page, WebSearch};

/// Navigation result after retries
#[derive(Debug)]
enum NavState {
    Ok(Page),
    /// Timed out on the final attempt
    FailedSoft,
    /// Failed for another reason on the final attempt
    FailedHard(String),
}

/// Social-profile discovery engine
pub struct ProfileDiscovery<'a> {
    launcher: &'a dyn BrowserLauncher,
    search: &'a dyn WebSearch,
    config: &'a DiscoveryConfig,
}

impl<'a> ProfileDiscovery<'a> {
    pub fn new(
        launcher: &'a dyn BrowserLauncher,
        search: &'a dyn WebSearch,
        config: &'a DiscoveryConfig,
    ) -> Self {
        Self {
            launcher,
            search,
            config,
        }
    }

    /// Discover a profile for every match record not yet checkpointed.
    ///
    /// One browser session serves the whole run and is closed whether the
    /// loop completes or aborts.
    pub async fn run(
        &self,
        store: &CheckpointStore,
        limit: Option<usize>,
        show_progress: bool,
    ) -> Result<StageReport> {
        let mut report = StageReport::new(Stage::Social);

        let enriched: Vec<EnrichedRecord> = store.load(Stage::Registry.as_str())?;
        let in_scope = limited_links(store, limit)?;
        let matches: Vec<EnrichedRecord> = enriched
            .into_iter()
            .filter(|r| !r.is_placeholder())
            .filter(|r| match &in_scope {
                Some(links) => links.contains(&r.provenance.link),
                None => true,
            })
            .collect();

        let mut checkpoint = store.checkpoint::<FinalRecord>(Stage::Social.as_str())?;
        let done: HashSet<(String, String)> =
            checkpoint.records().iter().map(|r| resume_key(&r.entity)).collect();

        let total = matches.len();
        let pending: Vec<EnrichedRecord> = matches
            .into_iter()
            .filter(|r| !done.contains(&resume_key(r)))
            .collect();
        report.skipped = total - pending.len();

        if pending.is_empty() {
            info!(source = %store.source(), done = report.skipped, "No profiles left to discover");
            return Ok(report);
        }

        info!(
            source = %store.source(),
            pending = pending.len(),
            done = report.skipped,
            "Discovering social profiles"
        );

        let mut session = self.launcher.launch().await?;
        let outcome = self
            .discover_all(
                session.as_mut(),
                pending,
                &mut checkpoint,
                store,
                &mut report,
                show_progress,
            )
            .await;

        if let Err(e) = session.close().await {
            warn!(source = %store.source(), error = %e, "Browser session did not close cleanly");
        }

        outcome.map(|()| report)
    }

    async fn discover_all(
        &self,
        session: &mut dyn BrowserSession,
        pending: Vec<EnrichedRecord>,
        checkpoint: &mut Checkpoint<FinalRecord>,
        store: &CheckpointStore,
        report: &mut StageReport,
        show_progress: bool,
    ) -> Result<()> {
        let errors = store.error_log();
        let pb = create_stage_progress(Stage::Social.as_str(), pending.len() as u64, show_progress);
        let mut tally = Tally::default();

        for entity in pending {
            report.processed += 1;

            let profile_url = match self.discover(session, &entity, &errors).await {
                Ok(profile) => profile,
                Err(e) => {
                    error!(name = %entity.original_name(), error = %e, "Profile discovery failed");
                    errors.record(
                        Stage::Social.as_str(),
                        &context(&entity),
                        &e,
                    );
                    ProfileLookup::Error
                }
            };

            match &profile_url {
                ProfileLookup::Error => {
                    report.failed += 1;
                    tally.failure(&pb);
                }
                _ => {
                    report.succeeded += 1;
                    tally.success(&pb);
                }
            }

            checkpoint.append([FinalRecord {
                entity,
                profile_url,
            }])?;
            report.written += 1;
        }

        pb.finish_and_clear();
        Ok(())
    }

    /// Lookup sequence for one record
    async fn discover(
        &self,
        session: &mut dyn BrowserSession,
        entity: &EnrichedRecord,
        errors: &ErrorLog,
    ) -> Result<ProfileLookup> {
        let Some(website) = entity.website() else {
            debug!(name = %entity.original_name(), "No website, nothing to discover");
            return Ok(ProfileLookup::NotFound);
        };

        match self.navigate(session, website).await {
            NavState::FailedHard(reason) => {
                warn!(
                    name = %entity.original_name(),
                    website = %website,
                    reason = %reason,
                    "Website unreachable"
                );
                errors.record(Stage::Social.as_str(), &context(entity), &reason);
                return Ok(ProfileLookup::Error);
            }
            NavState::FailedSoft => {
                debug!(
                    name = %entity.original_name(),
                    website = %website,
                    "Website timed out, searching instead"
                );
            }
            NavState::Ok(page) => {
                if let Some(link) = select_page_link(&page.links, &self.config.platform_domain) {
                    debug!(
                        name = %entity.original_name(),
                        link = %link,
                        "Profile found on website"
                    );
                    return Ok(ProfileLookup::Found(link));
                }
            }
        }

        self.search_fallback(entity).await
    }

    /// Short attempt, then one longer retry; the final attempt decides
    async fn navigate(&self, session: &mut dyn BrowserSession, website: &str) -> NavState {
        let attempts = [self.config.first_timeout(), self.config.retry_timeout()];
        let mut last = Navigation::TimedOut;

        for (attempt, timeout) in attempts.into_iter().enumerate() {
            last = session.navigate(website, timeout).await;
            if let Navigation::Loaded(_) = last {
                break;
            }
            debug!(
                website = %website,
                attempt = attempt + 1,
                outcome = last.as_str(),
                "Navigation attempt failed"
            );
        }

        match last {
            Navigation::Loaded(page) => NavState::Ok(page),
            Navigation::TimedOut => NavState::FailedSoft,
            Navigation::Failed(reason) => NavState::FailedHard(reason),
        }
    }

    async fn search_fallback(&self, entity: &EnrichedRecord) -> Result<ProfileLookup> {
        let query = format!("{} {}", entity.original_name(), self.config.platform_name);
        let results = self.search.search(&query).await?;

        Ok(
            match select_search_link(&results, &self.config.platform_domain) {
                Some(link) => {
                    debug!(name = %entity.original_name(), link = %link, "Profile found by search");
                    ProfileLookup::Found(link)
                }
                None => ProfileLookup::NotFound,
            },
        )
    }
}

/// Links of the first `limit` detail records, or `None` without a limit.
///
/// Limits count listed entities, so every fan-out sibling of an entity in
/// scope stays in scope.
fn limited_links(
    store: &CheckpointStore,
    limit: Option<usize>,
) -> Result<Option<HashSet<String>>> {
    let Some(limit) = limit else {
        return Ok(None);
    };
    let details: Vec<DetailRecord> = store.load(Stage::Details.as_str())?;
    Ok(Some(details.into_iter().take(limit).map(|d| d.link).collect()))
}

/// Scraped name plus entity id; the id tells fan-out siblings apart
fn resume_key(entity: &EnrichedRecord) -> (String, String) {
    (
        entity.original_name().to_string(),
        entity.entity_id().unwrap_or_default().to_string(),
    )
}

fn context(entity: &EnrichedRecord) -> Vec<(&str, &str)> {
    let mut context = vec![("name", entity.original_name())];
    if let Some(id) = entity.entity_id() {
        context.push(("entity_id", id));
    }
    if let Some(website) = entity.website() {
        context.push(("website", website));
    }
    context
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{DetailFields, DetailRecord, RegistryMatch};
    use crate::stages::fakes::{FakeSearch, ScriptedBrowser};
    use dirscout_common::checkpoint::Namespace;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn matched(name: &str, entity_id: &str, website: Option<&str>) -> EnrichedRecord {
        EnrichedRecord {
            provenance: DetailRecord {
                name: name.to_string(),
                link: format!("https://d.example/{}", name.to_lowercase()),
                fields: DetailFields::default(),
            },
            registry: Some(RegistryMatch {
                entity_id: entity_id.to_string(),
                legal_id: "123456789".to_string(),
                legal_name: name.to_uppercase(),
                website: website.unwrap_or_default().to_string(),
                ..Default::default()
            }),
            principals: Vec::new(),
        }
    }

    fn loaded(links: &[&str]) -> Navigation {
        Navigation::Loaded(Page {
            url: "https://acme.fr/".to_string(),
            links: links.iter().map(|l| l.to_string()).collect(),
        })
    }

    fn store(dir: &std::path::Path, records: &[EnrichedRecord]) -> CheckpointStore {
        let store = CheckpointStore::open(dir, "fake", Namespace::Live).unwrap();
        store.save("registry", records).unwrap();
        store
    }

    fn config() -> DiscoveryConfig {
        DiscoveryConfig::default()
    }

    fn profiles(store: &CheckpointStore) -> Vec<(String, String)> {
        let saved: Vec<FinalRecord> = store.load("social").unwrap();
        saved
            .iter()
            .map(|r| (r.original_name().to_string(), r.profile_url.as_str().to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_page_link_preferred_over_search() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), &[matched("Acme", "ENT-00001", Some("https://acme.fr"))]);

        let browser = ScriptedBrowser::default();
        browser.script(
            "https://acme.fr",
            vec![loaded(&[
                "https://www.linkedin.com/in/jdoe",
                "https://www.linkedin.com/company/acme",
            ])],
        );
        let search = FakeSearch::default();
        let config = config();

        ProfileDiscovery::new(&browser, &search, &config)
            .run(&store, None, false)
            .await
            .unwrap();

        assert_eq!(
            profiles(&store),
            vec![("Acme".to_string(), "https://www.linkedin.com/company/acme".to_string())]
        );
        assert!(search.queries.lock().unwrap().is_empty());
        assert_eq!(browser.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_double_timeout_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), &[matched("Acme", "ENT-00001", Some("https://acme.fr"))]);

        let browser = ScriptedBrowser::default();
        browser.script("https://acme.fr", vec![Navigation::TimedOut, Navigation::TimedOut]);
        let search = FakeSearch::default();
        let config = config();

        let report = ProfileDiscovery::new(&browser, &search, &config)
            .run(&store, None, false)
            .await
            .unwrap();

        assert_eq!(profiles(&store), vec![("Acme".to_string(), String::new())]);
        assert_eq!(report.succeeded, 1);
        assert_eq!(
            browser.attempts("https://acme.fr"),
            vec![Duration::from_secs(5), Duration::from_secs(10)]
        );
        assert_eq!(
            *search.queries.lock().unwrap(),
            vec!["Acme linkedin".to_string()]
        );
    }

    #[tokio::test]
    async fn test_refused_on_final_attempt_is_error_without_search() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), &[matched("Acme", "ENT-00001", Some("https://acme.fr"))]);

        let browser = ScriptedBrowser::default();
        browser.script(
            "https://acme.fr",
            vec![
                Navigation::TimedOut,
                Navigation::Failed("connection refused".to_string()),
            ],
        );
        let mut search = FakeSearch::default();
        search.results.insert(
            "Acme linkedin".to_string(),
            vec!["https://www.linkedin.com/company/acme".to_string()],
        );
        let config = config();

        let report = ProfileDiscovery::new(&browser, &search, &config)
            .run(&store, None, false)
            .await
            .unwrap();

        assert_eq!(profiles(&store), vec![("Acme".to_string(), "ERROR".to_string())]);
        assert_eq!(report.failed, 1);
        assert!(search.queries.lock().unwrap().is_empty());
        assert_eq!(store.error_log().entries().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), &[matched("Acme", "ENT-00001", Some("https://acme.fr"))]);

        let browser = ScriptedBrowser::default();
        browser.script(
            "https://acme.fr",
            vec![
                Navigation::Failed("reset".to_string()),
                loaded(&["https://fr.linkedin.com/in/jdoe"]),
            ],
        );
        let search = FakeSearch::default();
        let config = config();

        ProfileDiscovery::new(&browser, &search, &config)
            .run(&store, None, false)
            .await
            .unwrap();

        assert_eq!(
            profiles(&store),
            vec![("Acme".to_string(), "https://fr.linkedin.com/in/jdoe".to_string())]
        );
    }

    #[tokio::test]
    async fn test_search_fallback_and_search_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(
            dir.path(),
            &[
                matched("Acme", "ENT-00001", Some("https://acme.fr")),
                matched("Globex", "ENT-00002", Some("https://globex.fr")),
                matched("Initech", "ENT-00003", None),
            ],
        );

        let browser = ScriptedBrowser::default();
        browser.script("https://acme.fr", vec![loaded(&["https://twitter.com/acme"])]);
        browser.script("https://globex.fr", vec![loaded(&[])]);

        let mut search = FakeSearch::default();
        search.results.insert(
            "Acme linkedin".to_string(),
            vec![
                "https://www.linkedin.com/in/jdoe".to_string(),
                "//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.linkedin.com%2Fshowcase%2Facme-labs".to_string(),
            ],
        );
        search.failing.push("Globex linkedin".to_string());
        let config = config();

        ProfileDiscovery::new(&browser, &search, &config)
            .run(&store, None, false)
            .await
            .unwrap();

        assert_eq!(
            profiles(&store),
            vec![
                ("Acme".to_string(), "https://www.linkedin.com/showcase/acme-labs".to_string()),
                ("Globex".to_string(), "ERROR".to_string()),
                ("Initech".to_string(), String::new()),
            ]
        );
    }

    #[tokio::test]
    async fn test_resume_skips_done_and_keeps_siblings_apart() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            matched("Acme", "ENT-00001", Some("https://acme.fr")),
            matched("Acme", "ENT-00002", Some("https://acme.fr")),
            EnrichedRecord::placeholder(DetailRecord {
                name: "Globex".to_string(),
                link: "https://d.example/globex".to_string(),
                fields: DetailFields::default(),
            }),
        ];
        let store = store(dir.path(), &records);
        store
            .save(
                "social",
                &[FinalRecord {
                    entity: records[0].clone(),
                    profile_url: ProfileLookup::Error,
                }],
            )
            .unwrap();

        let browser = ScriptedBrowser::default();
        browser.script(
            "https://acme.fr",
            vec![loaded(&["https://www.linkedin.com/company/acme"])],
        );
        let search = FakeSearch::default();
        let config = config();

        let report = ProfileDiscovery::new(&browser, &search, &config)
            .run(&store, None, false)
            .await
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.processed, 1);

        let saved: Vec<FinalRecord> = store.load("social").unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].profile_url, ProfileLookup::Error);
        assert_eq!(saved[1].entity.entity_id(), Some("ENT-00002"));

        // Everything done: the browser is not even launched
        let report = ProfileDiscovery::new(&browser, &search, &config)
            .run(&store, None, false)
            .await
            .unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(browser.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_limit_keeps_every_sibling_of_limited_entities() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            matched("Acme", "ENT-00001", Some("https://acme.fr")),
            matched("Acme", "ENT-00002", Some("https://acme.fr")),
            matched("Globex", "ENT-00003", Some("https://globex.fr")),
        ];
        let store = store(dir.path(), &records);
        let details = [records[0].provenance.clone(), records[2].provenance.clone()];
        store.save("details", &details).unwrap();

        let browser = ScriptedBrowser::default();
        browser.script(
            "https://acme.fr",
            vec![
                loaded(&["https://www.linkedin.com/company/acme"]),
                loaded(&["https://www.linkedin.com/company/acme"]),
            ],
        );
        let search = FakeSearch::default();
        let config = config();

        let report = ProfileDiscovery::new(&browser, &search, &config)
            .run(&store, Some(1), false)
            .await
            .unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.skipped, 0);

        let saved: Vec<FinalRecord> = store.load("social").unwrap();
        let ids: Vec<Option<&str>> = saved.iter().map(|r| r.entity.entity_id()).collect();
        assert_eq!(ids, vec![Some("ENT-00001"), Some("ENT-00002")]);
        assert!(browser.attempts("https://globex.fr").is_empty());

        // Rerun under the same limit: both siblings count as done
        let report = ProfileDiscovery::new(&browser, &search, &config)
            .run(&store, Some(1), false)
            .await
            .unwrap();
        assert_eq!(report.skipped, 2);
        assert_eq!(report.processed, 0);
    }
}
