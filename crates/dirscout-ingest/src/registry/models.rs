//! Wire models of the `recherche-entreprises` search API
//!
//! Only the fields the enrichment stage reads are modelled; everything is
//! optional because the API omits or nulls fields freely.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `type_dirigeant` value of natural persons
pub const NATURAL_PERSON: &str = "personne physique";

/// Top-level search response
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<Candidate>,
    #[serde(default)]
    pub total_results: Option<u64>,
}

/// One legal unit returned by the search
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Candidate {
    /// SIREN number
    pub siren: String,
    #[serde(default)]
    pub nom_complet: Option<String>,
    #[serde(default)]
    pub nom_raison_sociale: Option<String>,
    #[serde(default)]
    pub sigle: Option<String>,
    #[serde(default)]
    pub siege: Siege,
    /// Financial history keyed by year ("2022")
    #[serde(default)]
    pub finances: Option<BTreeMap<String, FinancialYear>>,
    #[serde(default)]
    pub dirigeants: Vec<Officer>,
    #[serde(default)]
    pub activite_principale: Option<String>,
    /// NAF section letter (A–U)
    #[serde(default)]
    pub section_activite_principale: Option<String>,
    /// INSEE headcount bracket code
    #[serde(default)]
    pub tranche_effectif_salarie: Option<String>,
}

impl Candidate {
    /// Legal name plus every trading name the registry knows
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = [
            self.nom_complet.as_deref(),
            self.nom_raison_sociale.as_deref(),
            self.sigle.as_deref(),
            self.siege.nom_commercial.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if let Some(signs) = &self.siege.liste_enseignes {
            names.extend(signs.iter().map(String::as_str));
        }
        names
    }

    /// First trading name, if any
    pub fn trading_name(&self) -> Option<&str> {
        self.siege
            .nom_commercial
            .as_deref()
            .or_else(|| {
                self.siege
                    .liste_enseignes
                    .as_ref()
                    .and_then(|signs| signs.first().map(String::as_str))
            })
            .filter(|n| !n.trim().is_empty())
    }
}

/// Registered head office
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Siege {
    #[serde(default)]
    pub siret: Option<String>,
    #[serde(default)]
    pub adresse: Option<String>,
    #[serde(default)]
    pub code_postal: Option<String>,
    #[serde(default)]
    pub libelle_commune: Option<String>,
    #[serde(default)]
    pub departement: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub nom_commercial: Option<String>,
    #[serde(default)]
    pub liste_enseignes: Option<Vec<String>>,
    #[serde(default)]
    pub tranche_effectif_salarie: Option<String>,
}

/// Figures of one fiscal year
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FinancialYear {
    /// Revenue (chiffre d'affaires)
    #[serde(default)]
    pub ca: Option<f64>,
    #[serde(default)]
    pub resultat_net: Option<f64>,
}

/// Director or officer
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Officer {
    #[serde(default)]
    pub nom: Option<String>,
    #[serde(default)]
    pub prenoms: Option<String>,
    #[serde(default)]
    pub qualite: Option<String>,
    /// "personne physique" or "personne morale"
    #[serde(default)]
    pub type_dirigeant: Option<String>,
    #[serde(default)]
    pub denomination: Option<String>,
}

impl Officer {
    pub fn is_natural_person(&self) -> bool {
        self.type_dirigeant
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(NATURAL_PERSON))
    }
}

/// Response of the geographic API for one department or region
#[derive(Debug, Clone, Deserialize)]
pub struct GeoArea {
    pub nom: String,
}
