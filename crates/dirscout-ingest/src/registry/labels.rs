//! Static code-to-label tables and financial derivations

use std::collections::BTreeMap;

use super::models::FinancialYear;

/// INSEE headcount bracket ("tranche d'effectif salarié") label
pub fn headcount_label(code: &str) -> &'static str {
    match code {
        "NN" => "Non employeur",
        "00" => "0 salarié",
        "01" => "1 ou 2 salariés",
        "02" => "3 à 5 salariés",
        "03" => "6 à 9 salariés",
        "11" => "10 à 19 salariés",
        "12" => "20 à 49 salariés",
        "21" => "50 à 99 salariés",
        "22" => "100 à 199 salariés",
        "31" => "200 à 249 salariés",
        "32" => "250 à 499 salariés",
        "41" => "500 à 999 salariés",
        "42" => "1 000 à 1 999 salariés",
        "51" => "2 000 à 4 999 salariés",
        "52" => "5 000 à 9 999 salariés",
        "53" => "10 000 salariés et plus",
        _ => "",
    }
}

/// NAF rev. 2 section label
pub fn sector_label(section: &str) -> &'static str {
    match section {
        "A" => "Agriculture, sylviculture et pêche",
        "B" => "Industries extractives",
        "C" => "Industrie manufacturière",
        "D" => "Production et distribution d'électricité, de gaz, de vapeur et d'air conditionné",
        "E" => "Production et distribution d'eau ; assainissement, gestion des déchets et dépollution",
        "F" => "Construction",
        "G" => "Commerce ; réparation d'automobiles et de motocycles",
        "H" => "Transports et entreposage",
        "I" => "Hébergement et restauration",
        "J" => "Information et communication",
        "K" => "Activités financières et d'assurance",
        "L" => "Activités immobilières",
        "M" => "Activités spécialisées, scientifiques et techniques",
        "N" => "Activités de services administratifs et de soutien",
        "O" => "Administration publique",
        "P" => "Enseignement",
        "Q" => "Santé humaine et action sociale",
        "R" => "Arts, spectacles et activités récréatives",
        "S" => "Autres activités de services",
        "T" => "Activités des ménages en tant qu'employeurs",
        "U" => "Activités extra-territoriales",
        _ => "",
    }
}

/// Revenue bracket label, in euros
pub fn revenue_bracket(revenue: f64) -> &'static str {
    const M: f64 = 1_000_000.0;
    match revenue {
        r if r < 0.0 => "",
        r if r < 2.0 * M => "Moins de 2 M€",
        r if r < 10.0 * M => "2 à 10 M€",
        r if r < 50.0 * M => "10 à 50 M€",
        r if r < 100.0 * M => "50 à 100 M€",
        r if r < 300.0 * M => "100 à 300 M€",
        r if r < 1_000.0 * M => "300 M€ à 1 Md€",
        _ => "1 Md€ et plus",
    }
}

/// Figures derived from the most recent fiscal year
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestFinancials {
    pub year: Option<i32>,
    pub revenue: Option<f64>,
    pub revenue_bracket: String,
    pub headcount: String,
}

/// Derive latest-year figures.
///
/// The latest year is the largest numeric key of the history; non-numeric
/// keys are ignored. Without history every field stays empty, headcount
/// included.
pub fn latest_financials(
    history: Option<&BTreeMap<String, FinancialYear>>,
    headcount_code: Option<&str>,
) -> LatestFinancials {
    let latest = history.and_then(|h| {
        h.iter()
            .filter_map(|(year, figures)| year.trim().parse::<i32>().ok().map(|y| (y, figures)))
            .max_by_key(|(year, _)| *year)
    });

    let Some((year, figures)) = latest else {
        return LatestFinancials::default();
    };

    let revenue = figures.ca;
    LatestFinancials {
        year: Some(year),
        revenue,
        revenue_bracket: revenue.map(revenue_bracket).unwrap_or_default().to_string(),
        headcount: headcount_code.map(headcount_label).unwrap_or_default().to_string(),
    }
}
