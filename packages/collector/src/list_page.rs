//! List-page fetching and parsing.
//!
//! Given one crawl target this module builds the deterministic search URL,
//! loads it through a [`Session`] and extracts one [`JobRecord`] per listing
//! element. Per-field extraction is best-effort: a missing sub-element
//! yields an empty string, never a dropped record. Only a listing with no
//! usable link at all is invalid.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::session::Session;
use crate::types::{CrawlTarget, JobRecord};

/// Listings per result page; the paging offset is `page_number * PAGE_SIZE`.
pub const PAGE_SIZE: u32 = 25;

/// Result of fetching one list page.
#[derive(Debug)]
pub enum PageResult {
    /// Valid listings were extracted.
    Listings(Vec<JobRecord>),
    /// The page parsed cleanly but yielded zero valid records. A legitimate
    /// terminal state for the target, not an error: the orchestrator stops
    /// paginating and moves on.
    Exhausted,
}

/// Build the deterministic search URL for a target.
pub fn search_url(target: &CrawlTarget, time_filter_seconds: Option<u64>) -> FetchResult<String> {
    let base = format!("https://{}/jobs/search/", target.config.domain);
    let start = (target.page_number * PAGE_SIZE).to_string();

    let mut params: Vec<(&str, String)> = vec![
        ("keywords", target.keyword.clone()),
        ("start", start),
    ];
    if !target.config.geo.is_empty() {
        params.push(("location", target.config.geo.clone()));
    }
    if let Some(seconds) = time_filter_seconds {
        params.push(("f_TPR", format!("r{}", seconds)));
    }

    let url = Url::parse_with_params(&base, params.iter().map(|(k, v)| (*k, v.as_str())))
        .map_err(|_| FetchError::InvalidUrl { url: base.clone() })?;

    Ok(url.to_string())
}

/// Fetch and parse one list page.
pub async fn fetch_list_page<S: Session + ?Sized>(
    session: &S,
    target: &CrawlTarget,
    time_filter_seconds: Option<u64>,
) -> FetchResult<PageResult> {
    let url = search_url(target, time_filter_seconds)?;
    let page = session.navigate(&url).await?;
    Ok(parse_listings(&page.html, target))
}

/// Ordered fallback selectors for the result container's listing elements.
const LISTING_SELECTORS: &[&str] = &[
    "ul.jobs-search__results-list > li",
    "div.base-card",
    "li.jobs-search-results__list-item",
];

/// Parse all listings out of a result page.
pub fn parse_listings(html: &str, target: &CrawlTarget) -> PageResult {
    let document = Html::parse_document(html);

    let mut records = Vec::new();
    for selector_str in LISTING_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let cards: Vec<_> = document.select(&selector).collect();
        if cards.is_empty() {
            continue;
        }

        for card in cards {
            if let Some(record) = parse_card(card, target) {
                records.push(record);
            }
        }
        break;
    }

    if records.is_empty() {
        tracing::debug!(
            keyword = %target.keyword,
            country = %target.country,
            page = target.page_number,
            "list page exhausted"
        );
        PageResult::Exhausted
    } else {
        PageResult::Listings(records)
    }
}

/// Extract one record from a listing card. Returns `None` only when the
/// card carries neither a deep link nor a fallback link.
fn parse_card(card: ElementRef<'_>, target: &CrawlTarget) -> Option<JobRecord> {
    let link = first_attr(card, &["a.base-card__full-link"], "href")
        .or_else(|| first_attr(card, &["a"], "href"))?;

    let mut record = JobRecord::new(link)
        .with_search_context(target.keyword.clone(), target.country.clone());

    record.title = first_text(card, &["h3.base-search-card__title", "h3"]);
    record.company = first_text(card, &["h4.base-search-card__subtitle a", "h4"]);
    record.company_url =
        first_attr(card, &["h4.base-search-card__subtitle a"], "href").unwrap_or_default();
    record.location = first_text(card, &["span.job-search-card__location"]);
    record.posted_date = first_attr(card, &["time"], "datetime")
        .unwrap_or_else(|| first_text(card, &["time"]));
    record.description = first_text(card, &["p.base-search-card__metadata", "p"]);
    record.img = first_attr(card, &["img"], "data-delayed-url")
        .or_else(|| first_attr(card, &["img"], "src"))
        .unwrap_or_default();
    record.country = target.config.geo.clone();
    record.currency = target.config.currency.clone();

    Some(record)
}

/// First non-empty text content among an ordered selector chain.
pub fn first_text(scope: ElementRef<'_>, selectors: &[&str]) -> String {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = scope.select(&selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

/// First present attribute value among an ordered selector chain.
pub fn first_attr(scope: ElementRef<'_>, selectors: &[&str], attr: &str) -> Option<String> {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(value) = scope
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr(attr))
        {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::country_config;
    use crate::types::CrawlTarget;

    fn target(page: u32) -> CrawlTarget {
        CrawlTarget {
            keyword: "CFA".to_string(),
            country: "United States".to_string(),
            config: country_config("United States"),
            page_number: page,
        }
    }

    const LIST_FIXTURE: &str = r#"
        <html><body>
        <ul class="jobs-search__results-list">
          <li>
            <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/analyst-4012345678">Analyst</a>
            <h3 class="base-search-card__title"> Credit Analyst </h3>
            <h4 class="base-search-card__subtitle"><a href="https://www.linkedin.com/company/acme">Acme Corp</a></h4>
            <span class="job-search-card__location">New York, NY</span>
            <time datetime="2026-08-20">3 days ago</time>
          </li>
          <li>
            <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/4012345679">Untitled</a>
          </li>
          <li>
            <span class="job-search-card__location">No link here</span>
          </li>
        </ul>
        </body></html>
    "#;

    #[test]
    fn search_url_is_deterministic() {
        let url = search_url(&target(2), Some(86_400)).unwrap();
        assert!(url.starts_with("https://www.linkedin.com/jobs/search/?"));
        assert!(url.contains("keywords=CFA"));
        assert!(url.contains("start=50"));
        // parse_with_params form-encodes, so spaces become '+'.
        assert!(url.contains("location=United+States"));
        assert!(url.contains("f_TPR=r86400"));
    }

    #[test]
    fn parses_listings_best_effort() {
        let PageResult::Listings(records) = parse_listings(LIST_FIXTURE, &target(0)) else {
            panic!("expected listings");
        };

        // The linkless card is dropped, the sparse one kept.
        assert_eq!(records.len(), 2);

        let full = &records[0];
        assert_eq!(full.title, "Credit Analyst");
        assert_eq!(full.company, "Acme Corp");
        assert_eq!(full.company_url, "https://www.linkedin.com/company/acme");
        assert_eq!(full.location, "New York, NY");
        assert_eq!(full.posted_date, "2026-08-20");
        assert_eq!(full.id, "4012345678");
        assert_eq!(full.input_keyword, "CFA");
        assert_eq!(full.search_country, "United States");

        let sparse = &records[1];
        assert_eq!(sparse.title, "");
        assert_eq!(sparse.company, "");
        assert_eq!(sparse.id, "4012345679");
    }

    #[test]
    fn empty_page_signals_exhausted() {
        let result = parse_listings("<html><body><div>nothing</div></body></html>", &target(1));
        assert!(matches!(result, PageResult::Exhausted));
    }

    #[test]
    fn page_of_invalid_cards_signals_exhausted() {
        let html = r#"
            <ul class="jobs-search__results-list">
              <li><span>no links at all</span></li>
            </ul>
        "#;
        assert!(matches!(
            parse_listings(html, &target(0)),
            PageResult::Exhausted
        ));
    }
}
