//! Page loading with tagged outcomes

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::HttpConfig;
use crate::error::{IngestError, Result};

/// A loaded page: its final URL and every absolute link on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub links: Vec<String>,
}

/// Outcome of one navigation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Loaded(Page),
    /// The attempt exceeded its timeout
    TimedOut,
    /// Any other failure (DNS, refused connection, TLS, ...)
    Failed(String),
}

impl Navigation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Navigation::Loaded(_) => "loaded",
            Navigation::TimedOut => "timed_out",
            Navigation::Failed(_) => "failed",
        }
    }
}

/// A browsing session shared by every record of a discovery run
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url`, giving up after `timeout`
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Navigation;

    /// Release the session's resources
    async fn close(&mut self) -> Result<()>;
}

/// Opens browsing sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// reqwest-backed page loader
///
/// Does not execute JavaScript; links are read from the served HTML. HTTP
/// error statuses still count as a loaded page.
#[derive(Debug, Clone)]
pub struct HttpBrowser {
    config: HttpConfig,
}

impl HttpBrowser {
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserLauncher for HttpBrowser {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let client = Client::builder()
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| IngestError::Browser(e.to_string()))?;
        Ok(Box::new(HttpSession {
            client: Some(client),
        }))
    }
}

struct HttpSession {
    client: Option<Client>,
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Navigation {
        let Some(client) = &self.client else {
            return Navigation::Failed("session closed".to_string());
        };
        let target = match normalize_url(url) {
            Ok(target) => target,
            Err(e) => return Navigation::Failed(e.to_string()),
        };

        let response = match client.get(target).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => return classify(e),
        };
        let final_url = response.url().clone();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return classify(e),
        };

        let links = extract_links(&body, &final_url);
        debug!(url = %final_url, links = links.len(), "Page loaded");
        Navigation::Loaded(Page {
            url: final_url.to_string(),
            links,
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.client = None;
        Ok(())
    }
}

fn classify(err: reqwest::Error) -> Navigation {
    if err.is_timeout() {
        Navigation::TimedOut
    } else {
        Navigation::Failed(err.to_string())
    }
}

/// Parse a website value, defaulting to `https://` when no scheme is given
pub fn normalize_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.contains("://") {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("https://{}", raw))?)
    }
}

/// Absolute `http(s)` targets of every `a[href]` in `html`
pub fn extract_links(html: &str, base: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(String::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_adds_scheme() {
        assert_eq!(normalize_url("acme.fr").unwrap().as_str(), "https://acme.fr/");
        assert_eq!(
            normalize_url(" http://acme.fr/about ").unwrap().as_str(),
            "http://acme.fr/about"
        );
    }

    #[test]
    fn test_extract_links_resolves_relative() {
        let base = Url::parse("https://acme.fr/about").unwrap();
        let html = r#"
            <a href="/contact">Contact</a>
            <a href="https://www.linkedin.com/company/acme">LinkedIn</a>
            <a href="mailto:hello@acme.fr">Mail</a>
        "#;

        let links = extract_links(html, &base);
        assert_eq!(
            links,
            vec![
                "https://acme.fr/contact".to_string(),
                "https://www.linkedin.com/company/acme".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_refused_connection_is_failed_not_timeout() {
        let browser = HttpBrowser::new(HttpConfig::default());
        let mut session = browser.launch().await.unwrap();

        let outcome = session
            .navigate("http://127.0.0.1:1/", Duration::from_secs(5))
            .await;
        assert!(matches!(outcome, Navigation::Failed(_)));

        session.close().await.unwrap();
        let outcome = session
            .navigate("http://127.0.0.1:1/", Duration::from_secs(5))
            .await;
        assert_eq!(outcome, Navigation::Failed("session closed".to_string()));
    }
}
