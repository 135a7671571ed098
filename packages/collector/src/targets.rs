//! Crawl target generation.
//!
//! Pure expansion of a search request into an ordered set of page-fetch
//! tasks: outer loop keywords, inner loop countries, inner-inner loop page
//! numbers. No side effects.

use crate::types::{CountryConfig, CrawlTarget, SearchRequest};

/// Country search configurations for supported markets.
///
/// Lookup is case-insensitive on the country name. Unknown names fall back
/// to [`default_country_config`] rather than failing the request.
const COUNTRY_TABLE: &[(&str, &str, &str, &str, &str)] = &[
    // name, domain, geo, currency, locale
    ("united states", "www.linkedin.com", "United States", "USD", "en_US"),
    ("united kingdom", "uk.linkedin.com", "United Kingdom", "GBP", "en_GB"),
    ("canada", "ca.linkedin.com", "Canada", "CAD", "en_CA"),
    ("germany", "de.linkedin.com", "Germany", "EUR", "de_DE"),
    ("france", "fr.linkedin.com", "France", "EUR", "fr_FR"),
    ("netherlands", "nl.linkedin.com", "Netherlands", "EUR", "nl_NL"),
    ("spain", "es.linkedin.com", "Spain", "EUR", "es_ES"),
    ("india", "in.linkedin.com", "India", "INR", "en_IN"),
    ("australia", "au.linkedin.com", "Australia", "AUD", "en_AU"),
    ("singapore", "sg.linkedin.com", "Singapore", "SGD", "en_SG"),
    ("brazil", "br.linkedin.com", "Brazil", "BRL", "pt_BR"),
    ("switzerland", "ch.linkedin.com", "Switzerland", "CHF", "de_CH"),
];

/// Generic configuration used when a country name is not recognized.
pub fn default_country_config(name: &str) -> CountryConfig {
    CountryConfig {
        domain: "www.linkedin.com".to_string(),
        geo: name.to_string(),
        currency: "USD".to_string(),
        locale: "en_US".to_string(),
    }
}

/// Resolve a country name to its search configuration.
pub fn country_config(name: &str) -> CountryConfig {
    let needle = name.trim().to_lowercase();
    COUNTRY_TABLE
        .iter()
        .find(|(key, ..)| *key == needle)
        .map(|(_, domain, geo, currency, locale)| CountryConfig {
            domain: domain.to_string(),
            geo: geo.to_string(),
            currency: currency.to_string(),
            locale: locale.to_string(),
        })
        .unwrap_or_else(|| default_country_config(name.trim()))
}

/// Split a comma-separated request field into trimmed, non-empty parts.
pub fn split_terms(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Expand a search request into the full ordered target sequence.
pub fn expand(request: &SearchRequest, max_pages: u32) -> Vec<CrawlTarget> {
    let keywords = split_terms(&request.search_text);
    let countries = split_terms(&request.location_text);

    let mut targets =
        Vec::with_capacity(keywords.len() * countries.len() * max_pages as usize);

    for keyword in &keywords {
        for country in &countries {
            let config = country_config(country);
            for page_number in 0..max_pages {
                targets.push(CrawlTarget {
                    keyword: keyword.clone(),
                    country: country.clone(),
                    config: config.clone(),
                    page_number,
                });
            }
        }
    }

    targets
}
