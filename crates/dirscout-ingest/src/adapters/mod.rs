//! Source adapters
//!
//! An adapter knows how to list the entities of one directory site and how to
//! read an entity's detail page. Sources are declared in a TOML file and
//! resolved by name through the [`AdapterRegistry`]:
//!
//! ```toml
//! [sources.french-tech]
//! list_url = "https://directory.example/companies?page={page}"
//! pages = 3
//! item = "div.company-card"
//! name = "h3"
//! link = "a@href"
//!
//! [sources.french-tech.details]
//! website = "a.website@href"
//! address = ".address"
//! ```

pub mod selector;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::HttpConfig;
use crate::error::{IngestError, Result};
use crate::models::{DetailFields, SourceRecord};

pub use selector::{SelectorAdapter, SelectorSource};

/// Site-specific listing and detail extraction
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source name, used as the checkpoint directory name
    fn name(&self) -> &str;

    /// Every entity of the directory
    async fn list(&self) -> Result<Vec<SourceRecord>>;

    /// Attributes of one entity's detail page
    async fn details(&self, link: &str) -> Result<DetailFields>;
}

/// Parsed sources file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesFile {
    #[serde(default)]
    pub sources: BTreeMap<String, SelectorSource>,
}

/// Name-to-adapter lookup
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build selector adapters for every source declared in `path`
    pub fn from_file(path: impl AsRef<Path>, http: &HttpConfig) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IngestError::config(format!("Cannot read sources file {}: {}", path.display(), e))
        })?;
        let registry = Self::from_toml(&raw, http)?;
        info!(
            path = %path.display(),
            sources = registry.adapters.len(),
            "Loaded source definitions"
        );
        Ok(registry)
    }

    pub fn from_toml(raw: &str, http: &HttpConfig) -> Result<Self> {
        let file: SourcesFile = toml::from_str(raw)?;
        let mut registry = Self::new();
        for (name, source) in file.sources {
            registry.register(Arc::new(SelectorAdapter::new(name, source, http)?));
        }
        Ok(registry)
    }

    /// Add or replace an adapter under its own name
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn SourceAdapter>> {
        self.adapters
            .get(name)
            .cloned()
            .ok_or_else(|| IngestError::UnknownSource(name.to_string()))
    }

    /// Configured source names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const SOURCES: &str = r#"
        [sources.french-tech]
        list_url = "https://directory.example/companies?page={page}"
        pages = 2
        item = "div.card"
        name = "h3"
        link = "a@href"

        [sources.french-tech.details]
        website = "a.website@href"
        address = ".address"

        [sources.startups]
        list_url = "https://startups.example/all"
        item = "li"
        name = "a"
        link = "a@href"
    "#;

    #[test]
    fn test_registry_from_toml() {
        let registry = AdapterRegistry::from_toml(SOURCES, &HttpConfig::default()).unwrap();
        assert_eq!(registry.names(), vec!["french-tech", "startups"]);
        assert_eq!(registry.get("startups").unwrap().name(), "startups");
    }

    #[test]
    fn test_unknown_source_is_an_error() {
        let registry = AdapterRegistry::from_toml(SOURCES, &HttpConfig::default()).unwrap();
        let err = registry.get("nope").err().unwrap();
        assert!(matches!(err, IngestError::UnknownSource(name) if name == "nope"));
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let err = AdapterRegistry::from_toml("[sources.x]\nitem = 3", &HttpConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, IngestError::Config(_)));
    }

    #[test]
    fn test_missing_sources_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AdapterRegistry::from_file(dir.path().join("absent.toml"), &HttpConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, IngestError::Config(_)));
    }
}
