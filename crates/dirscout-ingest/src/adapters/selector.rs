//! Configuration-driven HTML adapter
//!
//! Fields are CSS selectors; `selector@attr` reads an attribute instead of
//! the element text. `href` and `src` values are resolved against the page
//! URL.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};
use url::Url;

use super::SourceAdapter;
use crate::config::HttpConfig;
use crate::error::{IngestError, Result};
use crate::models::{DetailFields, SourceRecord};

const SERVICE: &str = "source";
/// French postal codes: five digits
pub const DEFAULT_POSTAL_CODE_PATTERN: &str = r"\b(\d{5})\b";
const PAGE_PLACEHOLDER: &str = "{page}";

/// Declaration of one source in the sources file
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorSource {
    /// Listing URL; `{page}` is replaced by the page number
    pub list_url: String,
    #[serde(default = "default_pages")]
    pub pages: u32,
    #[serde(default = "default_first_page")]
    pub first_page: u32,
    /// One element per listed entity
    pub item: String,
    /// Entity name, relative to `item`
    pub name: String,
    /// Detail page link, relative to `item`
    pub link: String,
    #[serde(default)]
    pub details: DetailSelectors,
}

fn default_pages() -> u32 {
    1
}

fn default_first_page() -> u32 {
    1
}

/// Detail page fields; all optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailSelectors {
    pub description: Option<String>,
    pub website: Option<String>,
    pub postal_code: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub sector: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Regex applied to the address when no postal code is extracted
    pub postal_code_pattern: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// Compiled `selector[@attr]` field
#[derive(Debug, Clone)]
struct Field {
    selector: Selector,
    attr: Option<String>,
}

impl Field {
    fn parse(raw: &str) -> Result<Self> {
        let (css, attr) = match raw.rsplit_once('@') {
            Some((css, attr))
                if !attr.is_empty()
                    && attr.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
            {
                (css, Some(attr.to_string()))
            }
            _ => (raw, None),
        };
        let selector = Selector::parse(css.trim())
            .map_err(|e| IngestError::adapter(format!("Invalid selector '{}': {}", css, e)))?;
        Ok(Self { selector, attr })
    }

    fn optional(raw: Option<&String>) -> Result<Option<Self>> {
        raw.map(|s| Self::parse(s)).transpose()
    }

    /// Value of the first matching element under `scope`
    fn extract(&self, scope: ElementRef<'_>, base: &Url) -> Option<String> {
        scope
            .select(&self.selector)
            .find_map(|element| self.value(element, base))
    }

    fn value(&self, element: ElementRef<'_>, base: &Url) -> Option<String> {
        let raw = match &self.attr {
            Some(attr) => {
                let value = element.value().attr(attr)?.trim();
                if matches!(attr.as_str(), "href" | "src") {
                    base.join(value).map(String::from).unwrap_or_else(|_| value.to_string())
                } else {
                    value.to_string()
                }
            }
            None => collapse_whitespace(&element.text().collect::<Vec<_>>().join(" ")),
        };
        Some(raw).filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone)]
struct DetailFieldSet {
    description: Option<Field>,
    website: Option<Field>,
    postal_code: Option<Field>,
    address: Option<Field>,
    city: Option<Field>,
    sector: Option<Field>,
    phone: Option<Field>,
    email: Option<Field>,
    extra: Vec<(String, Field)>,
}

/// HTML adapter driven by a [`SelectorSource`]
pub struct SelectorAdapter {
    name: String,
    client: Client,
    list_url: String,
    pages: u32,
    first_page: u32,
    item: Selector,
    item_name: Field,
    item_link: Field,
    details: DetailFieldSet,
    postal_code_pattern: Regex,
}

impl SelectorAdapter {
    pub fn new(name: impl Into<String>, source: SelectorSource, http: &HttpConfig) -> Result<Self> {
        let name = name.into();
        if source.pages == 0 {
            return Err(IngestError::config(format!("Source '{}': pages must be at least 1", name)));
        }
        if source.pages > 1 && !source.list_url.contains(PAGE_PLACEHOLDER) {
            return Err(IngestError::config(format!(
                "Source '{}': list_url needs a {} placeholder to paginate",
                name, PAGE_PLACEHOLDER
            )));
        }

        let client = Client::builder()
            .timeout(http.timeout())
            .user_agent(&http.user_agent)
            .build()?;

        let item = Selector::parse(&source.item).map_err(|e| {
            IngestError::adapter(format!("Invalid selector '{}': {}", source.item, e))
        })?;

        let d = &source.details;
        let details = DetailFieldSet {
            description: Field::optional(d.description.as_ref())?,
            website: Field::optional(d.website.as_ref())?,
            postal_code: Field::optional(d.postal_code.as_ref())?,
            address: Field::optional(d.address.as_ref())?,
            city: Field::optional(d.city.as_ref())?,
            sector: Field::optional(d.sector.as_ref())?,
            phone: Field::optional(d.phone.as_ref())?,
            email: Field::optional(d.email.as_ref())?,
            extra: d
                .extra
                .iter()
                .map(|(key, raw)| Ok((key.clone(), Field::parse(raw)?)))
                .collect::<Result<_>>()?,
        };

        let pattern = d
            .postal_code_pattern
            .as_deref()
            .unwrap_or(DEFAULT_POSTAL_CODE_PATTERN);

        Ok(Self {
            client,
            list_url: source.list_url,
            pages: source.pages,
            first_page: source.first_page,
            item,
            item_name: Field::parse(&source.name)?,
            item_link: Field::parse(&source.link)?,
            details,
            postal_code_pattern: Regex::new(pattern)?,
            name,
        })
    }

    async fn fetch(&self, url: &str) -> Result<(Url, String)> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Status {
                service: SERVICE,
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let final_url = response.url().clone();
        Ok((final_url, response.text().await?))
    }

    fn page_url(&self, page: u32) -> String {
        self.list_url.replace(PAGE_PLACEHOLDER, &page.to_string())
    }

    /// Entities of one listing page
    pub fn parse_listing(&self, html: &str, base: &Url) -> Vec<SourceRecord> {
        let document = Html::parse_document(html);
        document
            .select(&self.item)
            .filter_map(|item| {
                let name = self.item_name.extract(item, base)?;
                let link = self.item_link.extract(item, base)?;
                Some(SourceRecord { name, link })
            })
            .collect()
    }

    /// Attributes of one detail page
    pub fn parse_details(&self, html: &str, base: &Url) -> DetailFields {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let get = |field: &Option<Field>| field.as_ref().and_then(|f| f.extract(root, base));

        let address = get(&self.details.address);
        let postal_code = get(&self.details.postal_code).or_else(|| {
            address
                .as_deref()
                .and_then(|a| self.postal_code_from(a))
        });

        DetailFields {
            description: get(&self.details.description),
            website: get(&self.details.website),
            postal_code,
            address,
            city: get(&self.details.city),
            sector: get(&self.details.sector),
            phone: get(&self.details.phone),
            email: get(&self.details.email).map(|e| e.trim_start_matches("mailto:").to_string()),
            extra: self
                .details
                .extra
                .iter()
                .filter_map(|(key, field)| field.extract(root, base).map(|v| (key.clone(), v)))
                .collect(),
        }
    }

    fn postal_code_from(&self, text: &str) -> Option<String> {
        let captures = self.postal_code_pattern.captures(text)?;
        captures
            .get(1)
            .or_else(|| captures.get(0))
            .map(|m| m.as_str().to_string())
    }
}

#[async_trait]
impl SourceAdapter for SelectorAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self) -> Result<Vec<SourceRecord>> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for page in self.first_page..self.first_page + self.pages {
            let url = self.page_url(page);
            let (base, html) = self.fetch(&url).await?;
            let found = self.parse_listing(&html, &base);
            debug!(source = %self.name, page, entries = found.len(), "Listing page parsed");

            if found.is_empty() {
                break;
            }
            records.extend(found.into_iter().filter(|r| seen.insert(r.link.clone())));
        }

        info!(source = %self.name, entries = records.len(), "Listing complete");
        Ok(records)
    }

    async fn details(&self, link: &str) -> Result<DetailFields> {
        let (base, html) = self.fetch(link).await?;
        Ok(self.parse_details(&html, &base))
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn source() -> SelectorSource {
        SelectorSource {
            list_url: "https://directory.example/companies?page={page}".to_string(),
            pages: 2,
            first_page: 1,
            item: "div.card".to_string(),
            name: "h3".to_string(),
            link: "a.more@href".to_string(),
            details: DetailSelectors {
                website: Some("a.website@href".to_string()),
                address: Some("p.address".to_string()),
                email: Some("a.mail@href".to_string()),
                extra: BTreeMap::from([("founded".to_string(), "span.founded".to_string())]),
                ..Default::default()
            },
        }
    }

    fn adapter() -> SelectorAdapter {
        SelectorAdapter::new("french-tech", source(), &HttpConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_listing_resolves_links_and_skips_incomplete_items() {
        let base = Url::parse("https://directory.example/companies?page=1").unwrap();
        let html = r#"
            <div class="card"><h3> Acme
                SAS </h3><a class="more" href="/c/acme">More</a></div>
            <div class="card"><h3>No link</h3></div>
            <div class="card"><h3>Globex</h3><a class="more" href="https://directory.example/c/globex">More</a></div>
        "#;

        let records = adapter().parse_listing(html, &base);
        assert_eq!(
            records,
            vec![
                SourceRecord {
                    name: "Acme SAS".to_string(),
                    link: "https://directory.example/c/acme".to_string(),
                },
                SourceRecord {
                    name: "Globex".to_string(),
                    link: "https://directory.example/c/globex".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_details_derives_postal_code_from_address() {
        let base = Url::parse("https://directory.example/c/acme").unwrap();
        let html = r#"
            <a class="website" href="https://acme.fr">Site</a>
            <p class="address">12 rue de la Paix, 75002 Paris</p>
            <a class="mail" href="mailto:hello@acme.fr">Mail</a>
            <span class="founded">2015</span>
        "#;

        let fields = adapter().parse_details(html, &base);
        assert_eq!(fields.website.as_deref(), Some("https://acme.fr/"));
        assert_eq!(fields.postal_code.as_deref(), Some("75002"));
        assert_eq!(fields.email.as_deref(), Some("hello@acme.fr"));
        assert_eq!(fields.extra.get("founded").map(String::as_str), Some("2015"));
        assert!(fields.description.is_none());
    }

    #[test]
    fn test_pagination_requires_placeholder() {
        let mut bad = source();
        bad.list_url = "https://directory.example/companies".to_string();
        let err = SelectorAdapter::new("x", bad, &HttpConfig::default()).err().unwrap();
        assert!(matches!(err, IngestError::Config(_)));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let mut bad = source();
        bad.item = "div[".to_string();
        let err = SelectorAdapter::new("x", bad, &HttpConfig::default()).err().unwrap();
        assert!(matches!(err, IngestError::Adapter(_)));
    }

    #[test]
    fn test_page_url() {
        assert_eq!(
            adapter().page_url(2),
            "https://directory.example/companies?page=2"
        );
    }
}
