//! Sequential identifier issuance
//!
//! Counters are seeded from what a checkpoint already holds and threaded
//! through the enrichment state explicitly. Ids depend on assignment order,
//! not on content.

/// Prefix of entity ids
pub const ENTITY_PREFIX: &str = "ENT";
/// Prefix of principal ids
pub const PRINCIPAL_PREFIX: &str = "PER";

/// Monotonic `PREFIX-NNNNN` id generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdCounter {
    prefix: &'static str,
    issued: u64,
}

impl IdCounter {
    /// Counter whose next id follows `already_issued` previous ones
    pub fn seeded(prefix: &'static str, already_issued: usize) -> Self {
        Self {
            prefix,
            issued: already_issued as u64,
        }
    }

    /// Issue the next id
    pub fn issue(&mut self) -> String {
        self.issued += 1;
        format!("{}-{:05}", self.prefix, self.issued)
    }

    /// Number of ids accounted for so far, including the seed
    pub fn issued(&self) -> u64 {
        self.issued
    }
}
