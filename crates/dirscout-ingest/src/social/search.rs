//! Web search backing the profile fallback lookup

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;

use crate::config::{DiscoveryConfig, HttpConfig};
use crate::error::{IngestError, Result};

const SERVICE: &str = "search";

/// Free-text web search
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Result links in rank order; they may be redirect-wrapped
    async fn search(&self, query: &str) -> Result<Vec<String>>;
}

/// DuckDuckGo HTML endpoint client
pub struct DuckDuckGoSearch {
    client: Client,
    url: String,
}

impl DuckDuckGoSearch {
    pub fn new(http: &HttpConfig, discovery: &DiscoveryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(http.timeout())
            .user_agent(&http.user_agent)
            .build()?;

        Ok(Self {
            client,
            url: discovery.search_url.clone(),
        })
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<Vec<String>> {
        debug!(query = %query, "Searching");

        let response = self.client.get(&self.url).query(&[("q", query)]).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Status {
                service: SERVICE,
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let body = response.text().await?;
        parse_results(&body)
    }
}

/// Result hrefs of a search page: `a.result__a` anchors, or every anchor when
/// the page does not use that markup
pub fn parse_results(html: &str) -> Result<Vec<String>> {
    let results = Selector::parse("a.result__a")
        .map_err(|e| IngestError::parse(format!("Invalid selector: {}", e)))?;
    let anchors = Selector::parse("a[href]")
        .map_err(|e| IngestError::parse(format!("Invalid selector: {}", e)))?;

    let document = Html::parse_document(html);
    let mut links: Vec<String> = document
        .select(&results)
        .filter_map(|a| a.value().attr("href"))
        .map(String::from)
        .collect();

    if links.is_empty() {
        links = document
            .select(&anchors)
            .filter_map(|a| a.value().attr("href"))
            .map(String::from)
            .collect();
    }
    Ok(links)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_result_anchors_only() {
        let html = r#"
            <a href="/settings">Settings</a>
            <div class="result"><a class="result__a" href="//duckduckgo.com/l/?uddg=x">X</a></div>
            <div class="result"><a class="result__a" href="https://acme.fr/">Acme</a></div>
        "#;
        assert_eq!(
            parse_results(html).unwrap(),
            vec!["//duckduckgo.com/l/?uddg=x".to_string(), "https://acme.fr/".to_string()]
        );
    }

    #[test]
    fn test_parse_falls_back_to_all_anchors() {
        let html = r#"<a href="/url?q=https://www.linkedin.com/company/acme">Acme</a>"#;
        assert_eq!(
            parse_results(html).unwrap(),
            vec!["/url?q=https://www.linkedin.com/company/acme".to_string()]
        );
    }
}
