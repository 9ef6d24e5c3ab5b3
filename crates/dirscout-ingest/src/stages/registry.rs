//! Registry enrichment stage
//!
//! Every detail record yields at least one enriched record: one match record
//! per registry candidate whose name contains the scraped name, or a single
//! placeholder when there is nothing to match. Entity and principal ids are
//! issued from counters seeded with what the checkpoint already holds, so a
//! resumed run never reissues an id.

use dirscout_common::checkpoint::CheckpointStore;
use dirscout_common::error_log::ErrorLog;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::{Stage, StageReport};
use crate::config::RegistryConfig;
use crate::error::Result;
use crate::ids::{IdCounter, ENTITY_PREFIX, PRINCIPAL_PREFIX};
use crate::models::{DetailRecord, EnrichedRecord, Principal, RegistryMatch};
use crate::progress::{create_stage_progress, Tally};
use crate::registry::labels::{latest_financials, sector_label};
use crate::registry::{Candidate, GeoLabels, RegistryQuery, RegistrySearch};

/// Id counters threaded through one enrichment run
#[derive(Debug, Clone)]
pub struct EnrichmentState {
    pub entity_ids: IdCounter,
    pub principal_ids: IdCounter,
}

impl EnrichmentState {
    /// Counters continuing after the records already checkpointed
    pub fn resume(existing: &[EnrichedRecord]) -> Self {
        let principals = existing.iter().map(|r| r.principals.len()).sum();
        Self {
            entity_ids: IdCounter::seeded(ENTITY_PREFIX, existing.len()),
            principal_ids: IdCounter::seeded(PRINCIPAL_PREFIX, principals),
        }
    }
}

/// How one detail record was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Matched,
    NoPostalCode,
    NoMatch,
    LookupFailed,
}

/// Registry enrichment engine
pub struct RegistryEnricher<'a> {
    search: &'a dyn RegistrySearch,
    geo: &'a dyn GeoLabels,
    config: &'a RegistryConfig,
}

impl<'a> RegistryEnricher<'a> {
    pub fn new(
        search: &'a dyn RegistrySearch,
        geo: &'a dyn GeoLabels,
        config: &'a RegistryConfig,
    ) -> Self {
        Self {
            search,
            geo,
            config,
        }
    }

    /// Enrich every detail record whose scraped name is not yet processed
    pub async fn run(
        &self,
        store: &CheckpointStore,
        limit: Option<usize>,
        show_progress: bool,
    ) -> Result<StageReport> {
        let mut report = StageReport::new(Stage::Registry);
        let errors = store.error_log();

        let mut details: Vec<DetailRecord> = store.load(Stage::Details.as_str())?;
        if let Some(limit) = limit {
            details.truncate(limit);
        }

        let mut checkpoint = store.checkpoint::<EnrichedRecord>(Stage::Registry.as_str())?;
        let mut done: HashSet<String> = checkpoint
            .records()
            .iter()
            .map(|r| r.original_name().to_string())
            .collect();
        let mut state = EnrichmentState::resume(checkpoint.records());

        let pending: Vec<&DetailRecord> =
            details.iter().filter(|d| !done.contains(&d.name)).collect();
        report.skipped = details.len() - pending.len();

        info!(
            source = %store.source(),
            pending = pending.len(),
            done = report.skipped,
            next_entity = state.entity_ids.issued() + 1,
            "Enriching from registry"
        );

        let pb =
            create_stage_progress(Stage::Registry.as_str(), pending.len() as u64, show_progress);
        let mut tally = Tally::default();

        for detail in pending {
            // Same scraped name listed twice: the first one stands for both
            if !done.insert(detail.name.clone()) {
                tally.success(&pb);
                continue;
            }
            report.processed += 1;

            let (records, resolution) = self.enrich(detail, &mut state, &errors).await;
            report.written += records.len();
            checkpoint.append(records)?;

            if resolution == Resolution::Matched {
                report.succeeded += 1;
                tally.success(&pb);
            } else {
                report.failed += 1;
                tally.failure(&pb);
            }

            if !self.config.delay().is_zero() {
                tokio::time::sleep(self.config.delay()).await;
            }
        }

        pb.finish_and_clear();
        Ok(report)
    }

    /// One lookup cycle; never returns an empty list
    async fn enrich(
        &self,
        detail: &DetailRecord,
        state: &mut EnrichmentState,
        errors: &ErrorLog,
    ) -> (Vec<EnrichedRecord>, Resolution) {
        let Some(postal_code) = detail.postal_code() else {
            debug!(name = %detail.name, "No postal code, emitting placeholder");
            return (
                vec![EnrichedRecord::placeholder(detail.clone())],
                Resolution::NoPostalCode,
            );
        };

        let query = RegistryQuery {
            name: detail.name.trim().to_string(),
            postal_code: postal_code.to_string(),
            status: self.config.status.clone(),
            revenue_min: self.config.revenue_min,
            revenue_max: self.config.revenue_max,
        };

        let candidates = match self.search.search(&query).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(
                    name = %detail.name,
                    postal_code = %postal_code,
                    error = %e,
                    "Registry lookup failed"
                );
                errors.record(
                    Stage::Registry.as_str(),
                    &[("name", detail.name.as_str()), ("postal_code", postal_code)],
                    &e,
                );
                return (
                    vec![EnrichedRecord::placeholder(detail.clone())],
                    Resolution::LookupFailed,
                );
            }
        };

        let mut records = Vec::new();
        for candidate in candidates.iter().filter(|c| name_matches(c, &query.name)) {
            if let Some(record) = self.build(detail, candidate, state).await {
                records.push(record);
            }
        }

        if records.is_empty() {
            debug!(
                name = %detail.name,
                candidates = candidates.len(),
                "No usable registry match, emitting placeholder"
            );
            return (
                vec![EnrichedRecord::placeholder(detail.clone())],
                Resolution::NoMatch,
            );
        }

        debug!(name = %detail.name, matches = records.len(), "Registry matches");
        (records, Resolution::Matched)
    }

    /// Merge one candidate into a match record.
    ///
    /// The mandatory-field check runs before any id is issued, so discarded
    /// candidates never consume one.
    async fn build(
        &self,
        detail: &DetailRecord,
        candidate: &Candidate,
        state: &mut EnrichmentState,
    ) -> Option<EnrichedRecord> {
        let siege = &candidate.siege;
        let legal_name = first_non_blank(&[
            candidate.nom_complet.as_deref(),
            candidate.nom_raison_sociale.as_deref(),
        ]);
        let postal_code = first_non_blank(&[siege.code_postal.as_deref(), detail.postal_code()]);
        let website = detail.website().map(str::to_string);

        let (Some(legal_name), Some(postal_code), Some(website)) =
            (legal_name, postal_code, website)
        else {
            debug!(
                name = %detail.name,
                siren = %candidate.siren,
                "Candidate lacks website, name or postal code, discarded"
            );
            return None;
        };

        let entity_id = state.entity_ids.issue();

        let (department, region) = tokio::join!(
            self.label(siege.departement.as_deref(), GeoKind::Department),
            self.label(siege.region.as_deref(), GeoKind::Region),
        );

        let headcount_code = candidate
            .tranche_effectif_salarie
            .as_deref()
            .or(siege.tranche_effectif_salarie.as_deref());
        let financials = latest_financials(candidate.finances.as_ref(), headcount_code);

        let principals = candidate
            .dirigeants
            .iter()
            .filter(|o| o.is_natural_person())
            .filter(|o| !self.is_excluded_role(o.qualite.as_deref().unwrap_or_default()))
            .map(|o| Principal {
                id: state.principal_ids.issue(),
                first_name: o.prenoms.clone().unwrap_or_default(),
                last_name: o.nom.clone().unwrap_or_default(),
                role: o.qualite.clone().unwrap_or_default(),
                company_name: legal_name.clone(),
                company_id: entity_id.clone(),
            })
            .collect();

        let registry = RegistryMatch {
            legal_id: candidate.siren.clone(),
            trading_name: candidate.trading_name().map(str::to_string),
            registered_address: siege.adresse.clone().unwrap_or_default(),
            postal_code,
            city: siege.libelle_commune.clone().unwrap_or_default(),
            department,
            region,
            activity_code: candidate.activite_principale.clone().unwrap_or_default(),
            sector: candidate
                .section_activite_principale
                .as_deref()
                .map(sector_label)
                .unwrap_or_default()
                .to_string(),
            revenue: financials.revenue,
            revenue_year: financials.year,
            revenue_bracket: financials.revenue_bracket,
            headcount: financials.headcount,
            domain: bare_domain(&website),
            website,
            legal_name,
            entity_id,
        };

        Some(EnrichedRecord {
            provenance: detail.clone(),
            registry: Some(registry),
            principals,
        })
    }

    /// Geographic label, `""` when the code is missing or the lookup fails
    async fn label(&self, code: Option<&str>, kind: GeoKind) -> String {
        let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
            return String::new();
        };
        let result = match kind {
            GeoKind::Department => self.geo.department(code).await,
            GeoKind::Region => self.geo.region(code).await,
        };
        result.unwrap_or_else(|e| {
            debug!(code = %code, kind = ?kind, error = %e, "Geo label unavailable");
            String::new()
        })
    }

    fn is_excluded_role(&self, role: &str) -> bool {
        let role = role.to_lowercase();
        self.config
            .excluded_roles
            .iter()
            .any(|excluded| role.contains(&excluded.to_lowercase()))
    }
}

#[derive(Debug, Clone, Copy)]
enum GeoKind {
    Department,
    Region,
}

/// Whether any of the candidate's names contains `query` (case-insensitive)
pub fn name_matches(candidate: &Candidate, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return false;
    }
    candidate
        .names()
        .iter()
        .any(|name| name.to_lowercase().contains(&query))
}

/// Host part of a website without scheme or `www.`
pub fn bare_domain(website: &str) -> String {
    let rest = website.trim();
    let rest = rest.split_once("://").map(|(_, r)| r).unwrap_or(rest);
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    rest.split('/').next().unwrap_or_default().to_string()
}

fn first_non_blank(values: &[Option<&str>]) -> Option<String> {
    values
        .iter()
        .flatten()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}
