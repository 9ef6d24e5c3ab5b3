//! Company registry collaborators
//!
//! [`RegistrySearch`] looks legal units up by name and postal code;
//! [`GeoLabels`] turns department and region codes into names. Default
//! implementations talk to the public `recherche-entreprises` and
//! `geo.api.gouv.fr` APIs.

pub mod geo;
pub mod labels;
pub mod models;
pub mod sirene;

use async_trait::async_trait;

use crate::error::Result;

pub use geo::GeoClient;
pub use models::{Candidate, FinancialYear, Officer, Siege};
pub use sirene::SireneClient;

/// Parameters of one registry lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryQuery {
    pub name: String,
    pub postal_code: String,
    /// Administrative status ("A" = active)
    pub status: String,
    pub revenue_min: u64,
    pub revenue_max: u64,
}

/// Legal-unit search
#[async_trait]
pub trait RegistrySearch: Send + Sync {
    /// Candidates matching the query, unfiltered by name
    async fn search(&self, query: &RegistryQuery) -> Result<Vec<Candidate>>;
}

/// Department and region code to label resolution
#[async_trait]
pub trait GeoLabels: Send + Sync {
    async fn department(&self, code: &str) -> Result<String>;
    async fn region(&self, code: &str) -> Result<String>;
}
