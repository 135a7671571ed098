//! Core data types flowing through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// The canonical unit flowing through every stage of the pipeline.
///
/// Fields follow the best-effort convention: extraction that finds nothing
/// yields an empty string, never a missing field. The lowercased, trimmed
/// `url` is the dedup key across every cache tier; two records with the
/// same normalized URL are the same job no matter which keyword/country
/// pair discovered them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Stable id: the site-provided entity identifier embedded in the URL,
    /// or a hash of the normalized URL when none is present.
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub company_url: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub currency: String,
    /// ISO-8601 date the posting went live, as reported by the listing.
    #[serde(default)]
    pub posted_date: String,
    /// ISO-8601 date this record was extracted.
    pub extracted_date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub detailed_description: String,
    #[serde(default)]
    pub compensation: String,
    #[serde(default)]
    pub recruiter_name: String,
    #[serde(default)]
    pub recruiter_role: String,
    #[serde(default)]
    pub recruiter_photo: String,
    #[serde(default)]
    pub recruiter_profile_url: String,
    #[serde(default)]
    pub img: String,
    #[serde(default)]
    pub referral: String,
    pub url: String,
    #[serde(default)]
    pub search_country: String,
    #[serde(default)]
    pub input_keyword: String,
    /// Additional discovered fields, kept for export.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl JobRecord {
    /// Create a record from the minimum a list page yields.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: derive_id(&url),
            title: String::new(),
            company: String::new(),
            company_url: String::new(),
            location: String::new(),
            country: String::new(),
            city: String::new(),
            region: String::new(),
            currency: String::new(),
            posted_date: String::new(),
            extracted_date: Utc::now().format("%Y-%m-%d").to_string(),
            description: String::new(),
            detailed_description: String::new(),
            compensation: String::new(),
            recruiter_name: String::new(),
            recruiter_role: String::new(),
            recruiter_photo: String::new(),
            recruiter_profile_url: String::new(),
            img: String::new(),
            referral: String::new(),
            url,
            search_country: String::new(),
            input_keyword: String::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = company.into();
        self
    }

    pub fn with_search_context(
        mut self,
        keyword: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        self.input_keyword = keyword.into();
        self.search_country = country.into();
        self
    }

    /// Fill every enrichment field with the legacy `Error: <message>`
    /// placeholder so downstream consumers can rely on field presence and
    /// branch only on the prefix convention.
    pub fn with_failure(mut self, message: &str) -> Self {
        let placeholder = format!("Error: {}", message);
        self.description = placeholder.clone();
        self.detailed_description = placeholder.clone();
        self.compensation = placeholder.clone();
        self.recruiter_name = placeholder.clone();
        self.recruiter_role = placeholder;
        self
    }

    /// Whether any enrichment field carries the failure placeholder.
    pub fn is_failed(&self) -> bool {
        self.description.starts_with("Error: ")
    }
}

/// Derive a stable record id from the job URL.
///
/// Listing URLs embed a numeric entity id as the last path segment suffix
/// (`/jobs/view/senior-analyst-4012345678`). When no digit run is found the
/// id falls back to a truncated sha256 of the normalized URL.
pub fn derive_id(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let trailing_digits: String = path
        .trim_end_matches('/')
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    if trailing_digits.len() >= 6 {
        return trailing_digits;
    }

    let normalized = url.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(&digest[..8])
}

/// One (keyword, country, page) unit of work for the list-page fetcher.
///
/// Created by the generator, consumed once by the fetcher, discarded after
/// the page is parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlTarget {
    pub keyword: String,
    pub country: String,
    pub config: CountryConfig,
    pub page_number: u32,
}

/// Per-country search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryConfig {
    /// Site domain serving this country's listings.
    pub domain: String,
    /// Location string the search endpoint expects.
    pub geo: String,
    pub currency: String,
    pub locale: String,
}

/// Raw search request as received from the trigger interface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Comma-separated keywords.
    pub search_text: String,
    /// Comma-separated country names.
    pub location_text: String,
    /// Recency filter in seconds (e.g. 86400 for the last day).
    #[serde(default)]
    pub time_filter_seconds: Option<u64>,
}

/// Ordered progress events emitted by the orchestrator for streaming
/// consumers. Serialized with a `type` tag for the SSE boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProgressEvent {
    #[serde(rename_all = "camelCase")]
    Log {
        message: String,
        timestamp: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        percentage: Option<u8>,
    },
    Error { message: String },
    #[serde(rename_all = "camelCase")]
    Complete {
        job_count: usize,
        countries: Vec<String>,
        keywords: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
}

impl ProgressEvent {
    pub fn log(message: impl Into<String>) -> Self {
        ProgressEvent::Log {
            message: message.into(),
            timestamp: Utc::now(),
            stage: None,
            percentage: None,
        }
    }

    pub fn log_stage(
        message: impl Into<String>,
        stage: impl Into<String>,
        percentage: u8,
    ) -> Self {
        ProgressEvent::Log {
            message: message.into(),
            timestamp: Utc::now(),
            stage: Some(stage.into()),
            percentage: Some(percentage),
        }
    }

    /// SSE event name for this variant.
    pub fn event_name(&self) -> &'static str {
        match self {
            ProgressEvent::Log { .. } => "log",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Complete { .. } => "complete",
        }
    }

    /// Whether the stream should close after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Error { .. } | ProgressEvent::Complete { .. }
        )
    }
}

/// Final accounting for one collection run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Unique URLs discovered across all list pages.
    pub discovered: usize,
    /// Jobs whose detail page was enriched successfully.
    pub succeeded: usize,
    /// Jobs recorded with a failure placeholder.
    pub failed: usize,
    /// Records newly committed to the archive.
    pub archived: usize,
    /// Records skipped because a dedup tier already knew their URL.
    pub skipped_duplicates: usize,
    pub keywords: Vec<String>,
    pub countries: Vec<String>,
}
