//! Pre-aggregated monthly statistics.
//!
//! Counters are updated incrementally as each record is committed, never
//! recomputed from raw shards. Historical aggregation across archives sums
//! these objects field-by-field, which keeps it O(months) rather than
//! O(jobs).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::JobRecord;

/// Aggregate counters for one month (or, after merging, any span).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStats {
    pub total_jobs: u64,
    pub by_country: BTreeMap<String, u64>,
    pub by_keyword: BTreeMap<String, u64>,
    pub by_company: BTreeMap<String, u64>,
    pub by_location: BTreeMap<String, u64>,
    pub by_seniority: BTreeMap<String, u64>,
    pub by_salary_band: BTreeMap<String, u64>,
    pub remote_jobs: u64,
    pub with_compensation: u64,
    pub with_recruiter: u64,
}

impl MonthlyStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one committed record into the counters.
    pub fn record(&mut self, job: &JobRecord) {
        self.total_jobs += 1;
        bump(&mut self.by_country, &job.search_country);
        bump(&mut self.by_keyword, &job.input_keyword);
        bump(&mut self.by_company, &job.company);
        bump(&mut self.by_location, &job.location);
        bump(&mut self.by_seniority, seniority_of(&job.title));

        if is_remote(&job.location) || is_remote(&job.title) {
            self.remote_jobs += 1;
        }

        if has_value(&job.compensation) {
            self.with_compensation += 1;
            bump(&mut self.by_salary_band, &salary_band(&job.compensation));
        }
        if has_value(&job.recruiter_name) {
            self.with_recruiter += 1;
        }
    }

    /// Field-by-field sum with another stats object.
    pub fn merge(&mut self, other: &MonthlyStats) {
        self.total_jobs += other.total_jobs;
        merge_map(&mut self.by_country, &other.by_country);
        merge_map(&mut self.by_keyword, &other.by_keyword);
        merge_map(&mut self.by_company, &other.by_company);
        merge_map(&mut self.by_location, &other.by_location);
        merge_map(&mut self.by_seniority, &other.by_seniority);
        merge_map(&mut self.by_salary_band, &other.by_salary_band);
        self.remote_jobs += other.remote_jobs;
        self.with_compensation += other.with_compensation;
        self.with_recruiter += other.with_recruiter;
    }
}

fn bump(map: &mut BTreeMap<String, u64>, key: &str) {
    let key = key.trim();
    if key.is_empty() {
        return;
    }
    *map.entry(key.to_string()).or_insert(0) += 1;
}

fn merge_map(into: &mut BTreeMap<String, u64>, from: &BTreeMap<String, u64>) {
    for (key, count) in from {
        *into.entry(key.clone()).or_insert(0) += count;
    }
}

/// Non-empty and not a failure placeholder.
fn has_value(field: &str) -> bool {
    !field.trim().is_empty() && !field.starts_with("Error: ")
}

/// Seniority bucket from title keywords.
fn seniority_of(title: &str) -> &'static str {
    let lower = title.to_lowercase();
    if lower.contains("intern") {
        "intern"
    } else if lower.contains("junior") || lower.contains("entry") || lower.contains("graduate") {
        "junior"
    } else if lower.contains("director") || lower.contains("vp") || lower.contains("head of") {
        "executive"
    } else if lower.contains("senior") || lower.contains("lead") || lower.contains("principal") {
        "senior"
    } else {
        "mid"
    }
}

fn is_remote(text: &str) -> bool {
    text.to_lowercase().contains("remote")
}

/// Classify the pay period of a compensation string.
///
/// Defaults to "annual" when no period keyword is present. That default is
/// a known heuristic approximation carried over from production data, not
/// a guaranteed classification.
pub fn salary_period(compensation: &str) -> &'static str {
    // Whitespace-insensitive so "$40 / hr" and "$5,000 / mo" classify the
    // same as their compact spellings.
    let lower: String = compensation.to_lowercase().split_whitespace().collect();
    if lower.contains("hour") || lower.contains("/hr") || lower.contains("hr.") {
        "hourly"
    } else if lower.contains("month") || lower.contains("/mo") {
        "monthly"
    } else {
        "annual"
    }
}

/// Bucket a compensation string by its first figure, annualized.
pub fn salary_band(compensation: &str) -> String {
    let Some(figure) = first_figure(compensation) else {
        return "unspecified".to_string();
    };

    let annual = match salary_period(compensation) {
        "hourly" => figure * 2080.0,
        "monthly" => figure * 12.0,
        _ => figure,
    };

    match annual as u64 {
        0..=49_999 => "<50k",
        50_000..=99_999 => "50k-100k",
        100_000..=149_999 => "100k-150k",
        150_000..=199_999 => "150k-200k",
        _ => "200k+",
    }
    .to_string()
}

/// First numeric figure in a compensation string, commas stripped.
fn first_figure(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    let mut digits = String::new();
    let mut seen_digit = false;

    for c in cleaned.chars() {
        if c.is_ascii_digit() || (c == '.' && seen_digit) {
            digits.push(c);
            seen_digit = true;
        } else if seen_digit {
            break;
        }
    }

    if !seen_digit {
        return None;
    }
    let value: f64 = digits.parse().ok()?;

    // "95k" style figures.
    let suffix_at = cleaned.find(&digits).map(|i| i + digits.len());
    if let Some(i) = suffix_at {
        if cleaned[i..].trim_start().starts_with(['k', 'K']) {
            return Some(value * 1000.0);
        }
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(title: &str, location: &str, compensation: &str) -> JobRecord {
        let mut record = JobRecord::new("https://example.com/jobs/view/123456")
            .with_title(title)
            .with_company("Acme")
            .with_search_context("CFA", "Canada");
        record.location = location.to_string();
        record.compensation = compensation.to_string();
        record
    }

    #[test]
    fn record_updates_all_counters() {
        let mut stats = MonthlyStats::new();
        stats.record(&job("Senior Analyst", "Remote - Toronto", "$120,000 per year"));

        assert_eq!(stats.total_jobs, 1);
        assert_eq!(stats.by_country["Canada"], 1);
        assert_eq!(stats.by_keyword["CFA"], 1);
        assert_eq!(stats.by_seniority["senior"], 1);
        assert_eq!(stats.by_salary_band["100k-150k"], 1);
        assert_eq!(stats.remote_jobs, 1);
        assert_eq!(stats.with_compensation, 1);
    }

    #[test]
    fn error_placeholder_does_not_count_as_compensation() {
        let mut stats = MonthlyStats::new();
        stats.record(&job("Analyst", "London", "Error: navigation timeout"));
        assert_eq!(stats.with_compensation, 0);
        assert_eq!(stats.total_jobs, 1);
    }

    #[test]
    fn merge_sums_field_by_field() {
        let mut a = MonthlyStats::new();
        a.record(&job("Junior Analyst", "Berlin", "€55,000"));
        let mut b = MonthlyStats::new();
        b.record(&job("Junior Trader", "Berlin", ""));

        a.merge(&b);
        assert_eq!(a.total_jobs, 2);
        assert_eq!(a.by_location["Berlin"], 2);
        assert_eq!(a.by_seniority["junior"], 2);
        assert_eq!(a.with_compensation, 1);
    }

    #[test]
    fn salary_period_defaults_to_annual() {
        assert_eq!(salary_period("$40 per hour"), "hourly");
        assert_eq!(salary_period("$5,000 / mo"), "monthly");
        // No keyword at all: documented annual default.
        assert_eq!(salary_period("$90,000 - $110,000"), "annual");
    }

    #[test]
    fn salary_bands_annualize_hourly_figures() {
        assert_eq!(salary_band("$40 per hour"), "50k-100k");
        assert_eq!(salary_band("$210,000 base"), "200k+");
        assert_eq!(salary_band("95k plus bonus"), "50k-100k");
        assert_eq!(salary_band("competitive"), "unspecified");
    }
}
