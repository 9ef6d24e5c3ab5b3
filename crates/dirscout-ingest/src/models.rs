//! Records flowing between pipeline stages
//!
//! ```text
//! SourceRecord ──details──▶ DetailRecord ──registry──▶ EnrichedRecord ──social──▶ FinalRecord
//!                                                        (1 ─▶ 1..n)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel stored in place of a profile URL after a hard failure
pub const PROFILE_ERROR: &str = "ERROR";

/// Entry of a directory listing; identity is `link`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub name: String,
    pub link: String,
}

/// Attributes an adapter extracts from a detail page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Site-specific fields with no dedicated slot
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// A listed entity plus its detail-page attributes; identity is `link`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub name: String,
    pub link: String,
    #[serde(flatten)]
    pub fields: DetailFields,
}

impl DetailRecord {
    pub fn new(source: &SourceRecord, fields: DetailFields) -> Self {
        Self {
            name: source.name.clone(),
            link: source.link.clone(),
            fields,
        }
    }

    /// Postal code if present and non-blank
    pub fn postal_code(&self) -> Option<&str> {
        non_blank(self.fields.postal_code.as_deref())
    }

    /// Website if present and non-blank
    pub fn website(&self) -> Option<&str> {
        non_blank(self.fields.website.as_deref())
    }
}

/// Registry-derived part of a match record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryMatch {
    /// `ENT-NNNNN`
    pub entity_id: String,
    /// SIREN number
    pub legal_id: String,
    pub legal_name: String,
    #[serde(default)]
    pub trading_name: Option<String>,
    pub registered_address: String,
    pub postal_code: String,
    pub city: String,
    pub department: String,
    pub region: String,
    pub activity_code: String,
    pub sector: String,
    pub revenue: Option<f64>,
    pub revenue_year: Option<i32>,
    pub revenue_bracket: String,
    pub headcount: String,
    pub website: String,
    /// Bare domain derived from `website`
    pub domain: String,
}

/// Physical person attached to a matched legal entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// `PER-NNNNN`
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub company_name: String,
    /// Owning entity id
    pub company_id: String,
}

/// Output of registry enrichment: a match record or a placeholder.
///
/// Placeholders carry `registry: null` and no principals; they only mark the
/// detail record as processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    /// Detail record this was derived from, unmodified
    pub provenance: DetailRecord,
    pub registry: Option<RegistryMatch>,
    #[serde(default)]
    pub principals: Vec<Principal>,
}

impl EnrichedRecord {
    pub fn placeholder(detail: DetailRecord) -> Self {
        Self {
            provenance: detail,
            registry: None,
            principals: Vec::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.registry.is_none()
    }

    /// Resume identity: the original scraped name
    pub fn original_name(&self) -> &str {
        &self.provenance.name
    }

    pub fn legal_id(&self) -> Option<&str> {
        self.registry.as_ref().map(|r| r.legal_id.as_str())
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.registry.as_ref().map(|r| r.entity_id.as_str())
    }

    pub fn website(&self) -> Option<&str> {
        non_blank(self.registry.as_ref().map(|r| r.website.as_str()))
            .or_else(|| self.provenance.website())
    }
}

/// Result of a social-profile lookup.
///
/// Persisted as a plain string: the URL, `""` for not found, or `"ERROR"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProfileLookup {
    Found(String),
    NotFound,
    /// Hard failure; never retried once checkpointed
    Error,
}

impl ProfileLookup {
    pub fn as_str(&self) -> &str {
        match self {
            ProfileLookup::Found(url) => url,
            ProfileLookup::NotFound => "",
            ProfileLookup::Error => PROFILE_ERROR,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ProfileLookup::Found(_))
    }
}

impl From<String> for ProfileLookup {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" => ProfileLookup::NotFound,
            PROFILE_ERROR => ProfileLookup::Error,
            _ => ProfileLookup::Found(value),
        }
    }
}

impl From<ProfileLookup> for String {
    fn from(value: ProfileLookup) -> Self {
        match value {
            ProfileLookup::Found(url) => url,
            other => other.as_str().to_string(),
        }
    }
}

/// Match record plus its discovered social profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalRecord {
    #[serde(flatten)]
    pub entity: EnrichedRecord,
    pub profile_url: ProfileLookup,
}

impl FinalRecord {
    pub fn original_name(&self) -> &str {
        self.entity.original_name()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detail(name: &str) -> DetailRecord {
        DetailRecord {
            name: name.to_string(),
            link: format!("https://dir.example/{}", name.to_lowercase()),
            fields: DetailFields::default(),
        }
    }

    #[test]
    fn test_placeholder_serializes_null_registry() {
        let record = EnrichedRecord::placeholder(detail("Acme"));
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["registry"], json!(null));
        assert_eq!(value["principals"], json!([]));
        assert_eq!(value["provenance"]["name"], json!("Acme"));
        assert!(record.legal_id().is_none());
    }

    #[test]
    fn test_profile_lookup_persists_as_string() {
        let mut record = FinalRecord {
            entity: EnrichedRecord::placeholder(detail("Acme")),
            profile_url: ProfileLookup::Error,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["profile_url"], json!("ERROR"));

        record.profile_url = ProfileLookup::NotFound;
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["profile_url"], json!(""));

        let back: FinalRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.profile_url, ProfileLookup::NotFound);
    }

    #[test]
    fn test_detail_fields_flatten_extras() {
        let value = json!({
            "name": "Acme",
            "link": "https://dir.example/acme",
            "website": "https://acme.fr",
            "postal_code": "75002",
            "founded": "2015"
        });
        let record: DetailRecord = serde_json::from_value(value).unwrap();

        assert_eq!(record.website(), Some("https://acme.fr"));
        assert_eq!(record.postal_code(), Some("75002"));
        assert_eq!(record.fields.extra.get("founded").map(String::as_str), Some("2015"));
    }

    #[test]
    fn test_blank_fields_are_absent() {
        let mut record = detail("Acme");
        record.fields.postal_code = Some("   ".to_string());
        assert!(record.postal_code().is_none());
    }
}
