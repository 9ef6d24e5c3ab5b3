//! Export stage: flatten the checkpoints into two related CSV files
//!
//! `entities.csv` has one row per enriched record, placeholders included,
//! with the discovered profile joined in by entity id. `principals.csv` has
//! one row per principal and references its entity through `entity_id`.

use dirscout_common::checkpoint::{CheckpointStore, Namespace, TRIAL_DIR};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{Stage, StageReport};
use crate::error::Result;
use crate::models::{EnrichedRecord, FinalRecord};

pub const ENTITIES_FILE: &str = "entities.csv";
pub const PRINCIPALS_FILE: &str = "principals.csv";

#[derive(Debug, Serialize)]
struct EntityRow<'a> {
    entity_id: &'a str,
    legal_id: &'a str,
    original_name: &'a str,
    legal_name: &'a str,
    trading_name: &'a str,
    website: &'a str,
    domain: &'a str,
    profile_url: &'a str,
    registered_address: &'a str,
    postal_code: &'a str,
    city: &'a str,
    department: &'a str,
    region: &'a str,
    activity_code: &'a str,
    sector: &'a str,
    revenue: Option<f64>,
    revenue_year: Option<i32>,
    revenue_bracket: &'a str,
    headcount: &'a str,
    principal_count: usize,
    description: &'a str,
    source_link: &'a str,
}

impl<'a> EntityRow<'a> {
    fn new(record: &'a EnrichedRecord, profile_url: &'a str) -> Self {
        let detail = &record.provenance;
        let postal_fallback = detail.postal_code().unwrap_or_default();

        match &record.registry {
            Some(m) => Self {
                entity_id: &m.entity_id,
                legal_id: &m.legal_id,
                original_name: &detail.name,
                legal_name: &m.legal_name,
                trading_name: m.trading_name.as_deref().unwrap_or_default(),
                website: &m.website,
                domain: &m.domain,
                profile_url,
                registered_address: &m.registered_address,
                postal_code: &m.postal_code,
                city: &m.city,
                department: &m.department,
                region: &m.region,
                activity_code: &m.activity_code,
                sector: &m.sector,
                revenue: m.revenue,
                revenue_year: m.revenue_year,
                revenue_bracket: &m.revenue_bracket,
                headcount: &m.headcount,
                principal_count: record.principals.len(),
                description: detail.fields.description.as_deref().unwrap_or_default(),
                source_link: &detail.link,
            },
            None => Self {
                entity_id: "",
                legal_id: "",
                original_name: &detail.name,
                legal_name: "",
                trading_name: "",
                website: detail.website().unwrap_or_default(),
                domain: "",
                profile_url,
                registered_address: detail.fields.address.as_deref().unwrap_or_default(),
                postal_code: postal_fallback,
                city: detail.fields.city.as_deref().unwrap_or_default(),
                department: "",
                region: "",
                activity_code: "",
                sector: detail.fields.sector.as_deref().unwrap_or_default(),
                revenue: None,
                revenue_year: None,
                revenue_bracket: "",
                headcount: "",
                principal_count: 0,
                description: detail.fields.description.as_deref().unwrap_or_default(),
                source_link: &detail.link,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct PrincipalRow<'a> {
    principal_id: &'a str,
    entity_id: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    role: &'a str,
    company_name: &'a str,
}

/// Directory the CSV files of `store`'s source are written to
pub fn export_dir(root: &Path, store: &CheckpointStore) -> PathBuf {
    match store.namespace() {
        Namespace::Live => root.join(store.source()),
        Namespace::Trial => root.join(TRIAL_DIR).join(store.source()),
    }
}

/// Write both CSV files from the registry and social checkpoints
pub fn run(store: &CheckpointStore, root: &Path) -> Result<StageReport> {
    let mut report = StageReport::new(Stage::Export);

    let enriched: Vec<EnrichedRecord> = store.load(Stage::Registry.as_str())?;
    let finals: Vec<FinalRecord> = store.load(Stage::Social.as_str())?;

    let profiles: HashMap<&str, &str> = finals
        .iter()
        .filter_map(|f| f.entity.entity_id().map(|id| (id, f.profile_url.as_str())))
        .collect();

    let dir = export_dir(root, store);
    std::fs::create_dir_all(&dir)?;

    let mut entities = csv::Writer::from_path(dir.join(ENTITIES_FILE))?;
    let mut principals = csv::Writer::from_path(dir.join(PRINCIPALS_FILE))?;
    let mut principal_rows = 0;

    for record in &enriched {
        let profile_url = record
            .entity_id()
            .and_then(|id| profiles.get(id).copied())
            .unwrap_or_default();
        entities.serialize(EntityRow::new(record, profile_url))?;

        for p in &record.principals {
            principals.serialize(PrincipalRow {
                principal_id: &p.id,
                entity_id: &p.company_id,
                first_name: &p.first_name,
                last_name: &p.last_name,
                role: &p.role,
                company_name: &p.company_name,
            })?;
            principal_rows += 1;
        }

        report.processed += 1;
        if record.is_placeholder() {
            report.failed += 1;
        } else {
            report.succeeded += 1;
        }
    }

    entities.flush()?;
    principals.flush()?;
    report.written = enriched.len() + principal_rows;

    info!(
        source = %store.source(),
        dir = %dir.display(),
        entities = enriched.len(),
        principals = principal_rows,
        "Export written"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{DetailFields, DetailRecord, Principal, ProfileLookup, RegistryMatch};

    fn detail(name: &str) -> DetailRecord {
        DetailRecord {
            name: name.to_string(),
            link: format!("https://d.example/{}", name.to_lowercase()),
            fields: DetailFields::default(),
        }
    }

    fn matched(name: &str, entity_id: &str, principals: &[&str]) -> EnrichedRecord {
        EnrichedRecord {
            provenance: detail(name),
            registry: Some(RegistryMatch {
                entity_id: entity_id.to_string(),
                legal_id: "123456789".to_string(),
                legal_name: name.to_uppercase(),
                revenue: Some(200.0),
                revenue_year: Some(2022),
                ..Default::default()
            }),
            principals: principals
                .iter()
                .map(|id| Principal {
                    id: id.to_string(),
                    first_name: "Jane".to_string(),
                    last_name: "Doe".to_string(),
                    role: "Président".to_string(),
                    company_name: name.to_uppercase(),
                    company_id: entity_id.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_export_joins_profiles_and_links_principals() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(data.path(), "fake", Namespace::Live).unwrap();

        let acme = matched("Acme", "ENT-00001", &["PER-00001", "PER-00002"]);
        let globex = matched("Globex", "ENT-00002", &[]);
        store
            .save(
                "registry",
                &[
                    acme.clone(),
                    EnrichedRecord::placeholder(detail("Initech")),
                    globex,
                ],
            )
            .unwrap();
        store
            .save(
                "social",
                &[FinalRecord {
                    entity: acme,
                    profile_url: ProfileLookup::Found(
                        "https://www.linkedin.com/company/acme".to_string(),
                    ),
                }],
            )
            .unwrap();

        let report = run(&store, out.path()).unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(report.failed, 1);

        let dir = out.path().join("fake");
        let mut reader = csv::Reader::from_path(dir.join(ENTITIES_FILE)).unwrap();
        let headers = reader.headers().unwrap().clone();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);

        let column = |name: &str| headers.iter().position(|h| h == name).unwrap();
        assert_eq!(&rows[0][column("entity_id")], "ENT-00001");
        assert_eq!(&rows[0][column("profile_url")], "https://www.linkedin.com/company/acme");
        assert_eq!(&rows[0][column("revenue_year")], "2022");
        assert_eq!(&rows[1][column("original_name")], "Initech");
        assert_eq!(&rows[1][column("legal_id")], "");
        assert_eq!(&rows[2][column("profile_url")], "");

        let mut reader = csv::Reader::from_path(dir.join(PRINCIPALS_FILE)).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "PER-00001");
        assert_eq!(&rows[0][1], "ENT-00001");
    }

    #[test]
    fn test_trial_exports_are_isolated() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(data.path(), "fake", Namespace::Trial).unwrap();

        run(&store, out.path()).unwrap();
        assert!(out.path().join("trial").join("fake").join(ENTITIES_FILE).exists());
        assert!(!out.path().join("fake").exists());
    }
}
