//! Archive manifest schema.
//!
//! The manifest is the single source of truth for which months and day
//! shards exist; no shard is ever read without resolving it here first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MANIFEST_VERSION: &str = "1.0";

/// Top-level archive index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub updated_at: DateTime<Utc>,
    /// Month currently receiving writes, `YYYY-MM`.
    pub current_month: String,
    pub months: BTreeMap<String, MonthEntry>,
    /// Finalized months available for historical aggregation.
    pub available_months: Vec<String>,
    pub total_jobs_all_time: u64,
}

impl Manifest {
    pub fn new(current_month: impl Into<String>) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            updated_at: Utc::now(),
            current_month: current_month.into(),
            months: BTreeMap::new(),
            available_months: Vec::new(),
            total_jobs_all_time: 0,
        }
    }

    /// Get or create the entry for a month key.
    pub fn month_entry(&mut self, month: &str) -> &mut MonthEntry {
        self.months
            .entry(month.to_string())
            .or_insert_with(|| MonthEntry::new(month))
    }

    /// Freeze a month: mark it archived and list it for aggregation.
    pub fn finalize_month(&mut self, month: &str) {
        if let Some(entry) = self.months.get_mut(month) {
            entry.archived = true;
        }
        if !self.available_months.iter().any(|m| m == month) {
            self.available_months.push(month.to_string());
            self.available_months.sort();
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// One month of day shards plus its pre-computed statistics object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthEntry {
    /// Key of the month's statistics object.
    pub stats: String,
    pub total_jobs: u64,
    pub days: Vec<DayShard>,
    #[serde(default)]
    pub archived: bool,
}

impl MonthEntry {
    pub fn new(month: &str) -> Self {
        Self {
            stats: stats_key(month),
            total_jobs: 0,
            days: Vec::new(),
            archived: false,
        }
    }

    pub fn day_mut(&mut self, date: &str) -> Option<&mut DayShard> {
        self.days.iter_mut().find(|d| d.date == date)
    }
}

/// One day's worth of archived records: a lightweight metadata object and
/// a heavyweight descriptions object, joined by record id at read time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DayShard {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Key of the metadata object.
    pub metadata: String,
    /// Key of the descriptions object.
    pub descriptions: String,
    pub job_count: u64,
    pub metadata_bytes: u64,
    pub descriptions_bytes: u64,
}

impl DayShard {
    pub fn new(date: &str) -> Self {
        Self {
            date: date.to_string(),
            metadata: metadata_key(date),
            descriptions: descriptions_key(date),
            job_count: 0,
            metadata_bytes: 0,
            descriptions_bytes: 0,
        }
    }
}

/// Month key (`YYYY-MM`) for a day key (`YYYY-MM-DD`).
pub fn month_of(date: &str) -> String {
    date.chars().take(7).collect()
}

pub fn stats_key(month: &str) -> String {
    format!("{}/stats.json", month)
}

pub fn metadata_key(date: &str) -> String {
    format!("{}/{}-metadata.ndjson.gz", month_of(date), date)
}

pub fn descriptions_key(date: &str) -> String {
    format!("{}/{}-descriptions.ndjson.gz", month_of(date), date)
}
