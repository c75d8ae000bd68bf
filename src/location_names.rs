//! Port name mapping for display
//! Maps UN/LOCODEs to (city, country) and formats routes

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::country_names::{get_country_name, UNKNOWN};

/// Port info: (city, country)
pub static PORT_NAMES: LazyLock<HashMap<&'static str, (&'static str, &'static str)>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // Europe
    m.insert("DEHAM", ("Hamburg", "Germany"));
    m.insert("NLRTM", ("Rotterdam", "Netherlands"));
    m.insert("BEANR", ("Antwerp", "Belgium"));
    m.insert("ITGOA", ("Genoa", "Italy"));
    m.insert("FRLEH", ("Le Havre", "France"));
    m.insert("ESBCN", ("Barcelona", "Spain"));
    m.insert("GBSOU", ("Southampton", "United Kingdom"));
    m.insert("SEGOT", ("Gothenburg", "Sweden"));
    m.insert("FIHEL", ("Helsinki", "Finland"));
    m.insert("EETLL", ("Tallinn", "Estonia"));
    m.insert("SIKOP", ("Koper", "Slovenia"));
    m.insert("ROCND", ("Constanta", "Romania"));

    // Asia / Middle East
    m.insert("CNSHA", ("Shanghai", "China"));
    m.insert("CNNBO", ("Ningbo", "China"));
    m.insert("HKHKG", ("Hong Kong", "Hong Kong"));
    m.insert("SGSIN", ("Singapore", "Singapore"));
    m.insert("AEJEA", ("Jebel Ali", "UAE"));
    m.insert("OMSOH", ("Sohar", "Oman"));

    // Americas
    m.insert("USLAX", ("Los Angeles", "United States"));
    m.insert("USHOU", ("Houston", "United States"));
    m.insert("BRSSZ", ("Santos", "Brazil"));
    m.insert("CLSAI", ("San Antonio", "Chile"));
    m.insert("COCTG", ("Cartagena", "Colombia"));
    m.insert("CRPMN", ("Puerto Moín", "Costa Rica"));
    m.insert("CRCAL", ("Puerto Caldera", "Costa Rica"));

    // Oceania
    m.insert("AUSYD", ("Sydney", "Australia"));
    m.insert("AUFRE", ("Fremantle", "Australia"));
    m.insert("NZAKL", ("Auckland", "New Zealand"));

    m
});

/// Resolve a locode to `(city, country)`.
///
/// Unmapped locodes use the locode itself as the city and resolve the country
/// from the first two characters.
pub fn get_port_info(locode: Option<&str>) -> (String, String) {
    let locode = match locode.map(str::trim) {
        Some(l) if !l.is_empty() => l.to_ascii_uppercase(),
        _ => return (UNKNOWN.to_string(), UNKNOWN.to_string()),
    };

    if let Some((city, country)) = PORT_NAMES.get(locode.as_str()) {
        return (city.to_string(), country.to_string());
    }

    let prefix: String = locode.chars().take(2).collect();
    let country = get_country_name(Some(prefix.as_str()));
    (locode, country)
}

/// Format a route between two countries (e.g., "China → Germany")
pub fn format_route(origin_country: &str, dest_country: &str) -> String {
    format!("{} → {}", origin_country, dest_country)
}
