//! `recherche-entreprises` search client

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::models::{Candidate, SearchResponse};
use super::{RegistryQuery, RegistrySearch};
use crate::config::{HttpConfig, RegistryConfig};
use crate::error::{IngestError, Result};

const SERVICE: &str = "registry";

/// SIRENE search API client
pub struct SireneClient {
    client: Client,
    base_url: String,
    page_size: u32,
}

impl SireneClient {
    pub fn new(http: &HttpConfig, registry: &RegistryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(http.timeout())
            .user_agent(&http.user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: registry.api_url.trim_end_matches('/').to_string(),
            page_size: registry.page_size,
        })
    }
}

#[async_trait]
impl RegistrySearch for SireneClient {
    async fn search(&self, query: &RegistryQuery) -> Result<Vec<Candidate>> {
        let url = format!("{}/search", self.base_url);
        let params = [
            ("q", query.name.clone()),
            ("code_postal", query.postal_code.clone()),
            ("etat_administratif", query.status.clone()),
            ("ca_min", query.revenue_min.to_string()),
            ("ca_max", query.revenue_max.to_string()),
            ("per_page", self.page_size.to_string()),
        ];

        debug!(name = %query.name, postal_code = %query.postal_code, "Querying registry");

        let response = self.client.get(&url).query(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Status {
                service: SERVICE,
                status: status.as_u16(),
                url,
            });
        }

        let body: SearchResponse = response.json().await?;
        debug!(
            name = %query.name,
            results = body.results.len(),
            total = ?body.total_results,
            "Registry answered"
        );
        Ok(body.results)
    }
}
