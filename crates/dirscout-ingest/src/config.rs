//! Pipeline configuration
//!
//! Defaults suit a production run against the public APIs. Every value can be
//! overridden from the environment (`DIRSCOUT_*`, typically via `.env`) and
//! again from the command line.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::{IngestError, Result};

/// Public SIRENE search API
pub const DEFAULT_REGISTRY_API_URL: &str = "https://recherche-entreprises.api.gouv.fr";
/// Public geographic API (department/region names)
pub const DEFAULT_GEO_API_URL: &str = "https://geo.api.gouv.fr";
/// DuckDuckGo HTML endpoint (no JavaScript required)
pub const DEFAULT_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// Shared HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Request timeout for API calls in seconds
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Registry enrichment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub api_url: String,
    pub geo_api_url: String,
    /// Administrative status filter ("A" = active)
    pub status: String,
    /// Revenue range filter, in euros
    pub revenue_min: u64,
    pub revenue_max: u64,
    /// Pause after each detail record, in milliseconds
    pub delay_ms: u64,
    /// Officer roles never kept as principals (case-insensitive substring)
    pub excluded_roles: Vec<String>,
    pub page_size: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_REGISTRY_API_URL.to_string(),
            geo_api_url: DEFAULT_GEO_API_URL.to_string(),
            status: "A".to_string(),
            revenue_min: 10_000_000,
            revenue_max: 300_000_000,
            delay_ms: 250,
            excluded_roles: vec!["Commissaire aux comptes".to_string()],
            page_size: 25,
        }
    }
}

impl RegistryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Set the post-record delay
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_api_urls(
        mut self,
        api_url: impl Into<String>,
        geo_api_url: impl Into<String>,
    ) -> Self {
        self.api_url = api_url.into();
        self.geo_api_url = geo_api_url.into();
        self
    }
}

/// Social-profile discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub search_url: String,
    /// Platform name appended to search queries
    pub platform_name: String,
    /// Domain a profile link must point at
    pub platform_domain: String,
    /// First navigation attempt timeout, in milliseconds
    pub first_timeout_ms: u64,
    /// Second (last) navigation attempt timeout, in milliseconds
    pub retry_timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            platform_name: "linkedin".to_string(),
            platform_domain: "linkedin.com".to_string(),
            first_timeout_ms: 5_000,
            retry_timeout_ms: 10_000,
        }
    }
}

impl DiscoveryConfig {
    pub fn first_timeout(&self) -> Duration {
        Duration::from_millis(self.first_timeout_ms)
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_millis(self.retry_timeout_ms)
    }

    pub fn with_timeouts(mut self, first_ms: u64, retry_ms: u64) -> Self {
        self.first_timeout_ms = first_ms;
        self.retry_timeout_ms = retry_ms;
        self
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }
}

/// Main pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root of the checkpoint directories
    pub data_dir: PathBuf,
    /// Root of the CSV exports
    pub export_dir: PathBuf,
    /// TOML file declaring the source adapters
    pub sources_file: PathBuf,
    /// Render progress bars
    pub show_progress: bool,
    pub http: HttpConfig,
    pub registry: RegistryConfig,
    pub discovery: DiscoveryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            export_dir: PathBuf::from("./export"),
            sources_file: PathBuf::from("./sources.toml"),
            show_progress: true,
            http: HttpConfig::default(),
            registry: RegistryConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `DIRSCOUT_DATA_DIR`, `DIRSCOUT_EXPORT_DIR`, `DIRSCOUT_SOURCES_FILE`
    /// - `DIRSCOUT_PROGRESS`: render progress bars (true/false)
    /// - `DIRSCOUT_USER_AGENT`, `DIRSCOUT_HTTP_TIMEOUT_SECS`
    /// - `DIRSCOUT_REGISTRY_URL`, `DIRSCOUT_GEO_URL`, `DIRSCOUT_SEARCH_URL`
    /// - `DIRSCOUT_REVENUE_MIN`, `DIRSCOUT_REVENUE_MAX`
    /// - `DIRSCOUT_REGISTRY_DELAY_MS`
    /// - `DIRSCOUT_EXCLUDED_ROLES`: comma-separated role fragments
    /// - `DIRSCOUT_NAV_TIMEOUT_MS`, `DIRSCOUT_NAV_RETRY_TIMEOUT_MS`
    /// - `DIRSCOUT_PLATFORM_NAME`, `DIRSCOUT_PLATFORM_DOMAIN`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let excluded_roles = match std::env::var("DIRSCOUT_EXCLUDED_ROLES") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => defaults.registry.excluded_roles.clone(),
        };

        let config = Self {
            data_dir: env_or("DIRSCOUT_DATA_DIR", defaults.data_dir),
            export_dir: env_or("DIRSCOUT_EXPORT_DIR", defaults.export_dir),
            sources_file: env_or("DIRSCOUT_SOURCES_FILE", defaults.sources_file),
            show_progress: env_or("DIRSCOUT_PROGRESS", defaults.show_progress),
            http: HttpConfig {
                user_agent: env_or("DIRSCOUT_USER_AGENT", defaults.http.user_agent),
                timeout_secs: env_or("DIRSCOUT_HTTP_TIMEOUT_SECS", defaults.http.timeout_secs),
            },
            registry: RegistryConfig {
                api_url: env_or("DIRSCOUT_REGISTRY_URL", defaults.registry.api_url),
                geo_api_url: env_or("DIRSCOUT_GEO_URL", defaults.registry.geo_api_url),
                status: defaults.registry.status,
                revenue_min: env_or("DIRSCOUT_REVENUE_MIN", defaults.registry.revenue_min),
                revenue_max: env_or("DIRSCOUT_REVENUE_MAX", defaults.registry.revenue_max),
                delay_ms: env_or("DIRSCOUT_REGISTRY_DELAY_MS", defaults.registry.delay_ms),
                excluded_roles,
                page_size: defaults.registry.page_size,
            },
            discovery: DiscoveryConfig {
                search_url: env_or("DIRSCOUT_SEARCH_URL", defaults.discovery.search_url),
                platform_name: env_or("DIRSCOUT_PLATFORM_NAME", defaults.discovery.platform_name),
                platform_domain: env_or(
                    "DIRSCOUT_PLATFORM_DOMAIN",
                    defaults.discovery.platform_domain,
                ),
                first_timeout_ms: env_or(
                    "DIRSCOUT_NAV_TIMEOUT_MS",
                    defaults.discovery.first_timeout_ms,
                ),
                retry_timeout_ms: env_or(
                    "DIRSCOUT_NAV_RETRY_TIMEOUT_MS",
                    defaults.discovery.retry_timeout_ms,
                ),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.registry.revenue_min > self.registry.revenue_max {
            return Err(IngestError::config(format!(
                "DIRSCOUT_REVENUE_MIN ({}) must not exceed DIRSCOUT_REVENUE_MAX ({})",
                self.registry.revenue_min, self.registry.revenue_max
            )));
        }
        if self.http.timeout_secs == 0 {
            return Err(IngestError::config("DIRSCOUT_HTTP_TIMEOUT_SECS must be greater than 0"));
        }
        if self.discovery.first_timeout_ms == 0 || self.discovery.retry_timeout_ms == 0 {
            return Err(IngestError::config("Navigation timeouts must be greater than 0"));
        }
        if self.discovery.platform_domain.trim().is_empty() {
            return Err(IngestError::config("DIRSCOUT_PLATFORM_DOMAIN cannot be empty"));
        }
        for (name, value) in [
            ("DIRSCOUT_REGISTRY_URL", &self.registry.api_url),
            ("DIRSCOUT_GEO_URL", &self.registry.geo_api_url),
            ("DIRSCOUT_SEARCH_URL", &self.discovery.search_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| IngestError::config(format!("{} is not a valid URL: {}", name, e)))?;
        }
        Ok(())
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key = %key, value = %raw, "Ignoring unparsable environment value");
                default
            }
        },
        Err(_) => default,
    }
}
