//! Stage orchestration for one source

use dirscout_common::checkpoint::{CheckpointStore, Namespace};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::adapters::AdapterRegistry;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::registry::{GeoClient, GeoLabels, RegistrySearch, SireneClient};
use crate::social::{BrowserLauncher, DuckDuckGoSearch, HttpBrowser, WebSearch};
use crate::stages::{self, ProfileDiscovery, RegistryEnricher, Stage, StageReport};

/// External collaborators of a pipeline
#[derive(Clone)]
pub struct Collaborators {
    pub adapters: AdapterRegistry,
    pub registry: Arc<dyn RegistrySearch>,
    pub geo: Arc<dyn GeoLabels>,
    pub browser: Arc<dyn BrowserLauncher>,
    pub search: Arc<dyn WebSearch>,
}

impl Collaborators {
    /// Default HTTP-backed collaborators, sources read from the sources file
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            adapters: AdapterRegistry::from_file(&config.sources_file, &config.http)?,
            registry: Arc::new(SireneClient::new(&config.http, &config.registry)?),
            geo: Arc::new(GeoClient::new(&config.http, &config.registry)?),
            browser: Arc::new(HttpBrowser::new(config.http.clone())),
            search: Arc::new(DuckDuckGoSearch::new(&config.http, &config.discovery)?),
        })
    }
}

/// Options of one `run`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub namespace: Namespace,
    /// Last stage to run, inclusive
    pub until: Stage,
    /// Cap on the listed entities processed by later stages
    pub limit: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            namespace: Namespace::Live,
            until: Stage::Export,
            limit: None,
        }
    }
}

impl RunOptions {
    /// Dry run in the isolated namespace
    pub fn trial(limit: Option<usize>) -> Self {
        Self {
            namespace: Namespace::Trial,
            limit,
            ..Self::default()
        }
    }
}

/// Reports of every stage a run went through
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub source: String,
    pub trial: bool,
    pub reports: Vec<StageReport>,
}

impl RunSummary {
    pub fn report(&self, stage: Stage) -> Option<&StageReport> {
        self.reports.iter().find(|r| r.stage == stage)
    }
}

/// Checkpointed multi-stage pipeline
pub struct Pipeline {
    config: PipelineConfig,
    collaborators: Collaborators,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    /// Pipeline with the default HTTP collaborators
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let collaborators = Collaborators::from_config(&config)?;
        Ok(Self::new(config, collaborators))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.collaborators.adapters
    }

    /// Checkpoint store of a configured source
    pub fn store(&self, source: &str, namespace: Namespace) -> Result<CheckpointStore> {
        self.collaborators.adapters.get(source)?;
        Ok(CheckpointStore::open(&self.config.data_dir, source, namespace)?)
    }

    /// Run `source` through every stage up to `options.until`.
    ///
    /// Per-item failures are absorbed by the stages; an error returned here
    /// is fatal for the run.
    pub async fn run(&self, source: &str, options: RunOptions) -> Result<RunSummary> {
        let adapter = self.collaborators.adapters.get(source)?;
        let store = CheckpointStore::open(&self.config.data_dir, source, options.namespace)?;
        let progress = self.config.show_progress;

        info!(
            source = %source,
            namespace = %options.namespace,
            until = %options.until,
            limit = ?options.limit,
            "Starting run"
        );

        let mut summary = RunSummary {
            source: source.to_string(),
            trial: options.namespace == Namespace::Trial,
            reports: Vec::new(),
        };

        for stage in Stage::ALL.into_iter().filter(|s| *s <= options.until) {
            let report = match stage {
                Stage::List => stages::listing::run(&store, adapter.as_ref()).await?,
                Stage::Details => {
                    stages::details::run(&store, adapter.as_ref(), options.limit, progress).await?
                }
                Stage::Registry => {
                    RegistryEnricher::new(
                        self.collaborators.registry.as_ref(),
                        self.collaborators.geo.as_ref(),
                        &self.config.registry,
                    )
                    .run(&store, options.limit, progress)
                    .await?
                }
                Stage::Social => {
                    ProfileDiscovery::new(
                        self.collaborators.browser.as_ref(),
                        self.collaborators.search.as_ref(),
                        &self.config.discovery,
                    )
                    .run(&store, options.limit, progress)
                    .await?
                }
                Stage::Export => stages::export::run(&store, &self.config.export_dir)?,
            };
            report.log(source);
            summary.reports.push(report);
        }

        Ok(summary)
    }

    /// Write the CSV export from whatever is checkpointed
    pub fn export(&self, source: &str, namespace: Namespace) -> Result<StageReport> {
        let store = self.store(source, namespace)?;
        let report = stages::export::run(&store, &self.config.export_dir)?;
        report.log(source);
        Ok(report)
    }

    /// Record count of every checkpointed stage
    pub fn status(&self, source: &str, namespace: Namespace) -> Result<Vec<(Stage, usize)>> {
        let store = self.store(source, namespace)?;
        Stage::ALL
            .into_iter()
            .filter(Stage::is_checkpointed)
            .map(|stage| -> Result<(Stage, usize)> { Ok((stage, store.count(stage.as_str())?)) })
            .collect()
    }
}
