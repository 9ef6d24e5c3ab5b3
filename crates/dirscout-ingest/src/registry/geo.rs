//! geo.api.gouv.fr label client

use async_trait::async_trait;
use reqwest::Client;

use super::models::GeoArea;
use super::GeoLabels;
use crate::config::{HttpConfig, RegistryConfig};
use crate::error::{IngestError, Result};

const SERVICE: &str = "geo";

/// Department and region name lookups
pub struct GeoClient {
    client: Client,
    base_url: String,
}

impl GeoClient {
    pub fn new(http: &HttpConfig, registry: &RegistryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(http.timeout())
            .user_agent(&http.user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: registry.geo_api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn area(&self, kind: &str, code: &str) -> Result<String> {
        let code = code.trim();
        if code.is_empty() {
            return Err(IngestError::parse(format!("empty {} code", kind)));
        }

        let url = format!("{}/{}/{}", self.base_url, kind, code);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Status {
                service: SERVICE,
                status: status.as_u16(),
                url,
            });
        }

        let area: GeoArea = response.json().await?;
        Ok(area.nom)
    }
}

#[async_trait]
impl GeoLabels for GeoClient {
    async fn department(&self, code: &str) -> Result<String> {
        self.area("departements", code).await
    }

    async fn region(&self, code: &str) -> Result<String> {
        self.area("regions", code).await
    }
}
