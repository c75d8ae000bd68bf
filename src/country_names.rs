//! Country name mapping for display
//! Maps 2-letter ISO country codes to country names

use std::collections::HashMap;
use std::sync::LazyLock;

/// Name used when a code is missing entirely
pub const UNKNOWN: &str = "Unknown";

/// Country name mapping - ISO 3166 alpha-2 code to display name
pub static COUNTRY_NAMES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // Asia / Middle East
    m.insert("CN", "China");
    m.insert("HK", "Hong Kong");
    m.insert("TW", "Taiwan");
    m.insert("JP", "Japan");
    m.insert("KR", "South Korea");
    m.insert("SG", "Singapore");
    m.insert("MY", "Malaysia");
    m.insert("TH", "Thailand");
    m.insert("ID", "Indonesia");
    m.insert("PH", "Philippines");
    m.insert("VN", "Vietnam");
    m.insert("IN", "India");
    m.insert("OM", "Oman");
    m.insert("SA", "Saudi Arabia");
    m.insert("BH", "Bahrain");
    m.insert("AE", "UAE");
    m.insert("TR", "Turkey");

    // Europe
    m.insert("DE", "Germany");
    m.insert("ES", "Spain");
    m.insert("IT", "Italy");
    m.insert("FR", "France");
    m.insert("NL", "Netherlands");
    m.insert("BE", "Belgium");
    m.insert("GB", "United Kingdom");
    m.insert("PT", "Portugal");
    m.insert("FI", "Finland");
    m.insert("SE", "Sweden");
    m.insert("NO", "Norway");
    m.insert("DK", "Denmark");
    m.insert("PL", "Poland");
    m.insert("CZ", "Czech Republic");
    m.insert("AT", "Austria");
    m.insert("CH", "Switzerland");
    m.insert("GR", "Greece");
    m.insert("RO", "Romania");
    m.insert("HU", "Hungary");
    m.insert("BG", "Bulgaria");
    m.insert("EE", "Estonia");
    m.insert("LV", "Latvia");
    m.insert("LT", "Lithuania");
    m.insert("SI", "Slovenia");
    m.insert("HR", "Croatia");
    m.insert("SK", "Slovakia");
    m.insert("IE", "Ireland");
    m.insert("RU", "Russia");
    m.insert("UA", "Ukraine");

    // Americas
    m.insert("US", "United States");
    m.insert("CA", "Canada");
    m.insert("MX", "Mexico");
    m.insert("BR", "Brazil");
    m.insert("CL", "Chile");
    m.insert("PE", "Peru");
    m.insert("AR", "Argentina");
    m.insert("CO", "Colombia");
    m.insert("EC", "Ecuador");
    m.insert("VE", "Venezuela");
    m.insert("PA", "Panama");
    m.insert("CR", "Costa Rica");

    // Africa / Oceania
    m.insert("MZ", "Mozambique");
    m.insert("EG", "Egypt");
    m.insert("ZA", "South Africa");
    m.insert("MA", "Morocco");
    m.insert("TN", "Tunisia");
    m.insert("KE", "Kenya");
    m.insert("AU", "Australia");
    m.insert("NZ", "New Zealand");

    m
});

/// Resolve a country code to its display name.
///
/// Missing or blank codes resolve to `"Unknown"`; unmapped codes pass
/// through unchanged.
pub fn get_country_name(code: Option<&str>) -> String {
    let code = match code.map(str::trim) {
        Some(c) if !c.is_empty() => c,
        _ => return UNKNOWN.to_string(),
    };

    COUNTRY_NAMES
        .get(code.to_ascii_uppercase().as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| code.to_string())
}
