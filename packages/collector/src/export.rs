//! Tabular export shaping.
//!
//! Builds the artifact handed to the notification sink: a fixed
//! priority-ordered column set first, then any additional discovered
//! fields appended alphabetically.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::Result;
use crate::types::JobRecord;

/// Columns every export leads with, in this order.
pub const PRIORITY_COLUMNS: &[&str] = &[
    "title",
    "company",
    "location",
    "country",
    "currency",
    "postedDate",
    "description",
    "compensation",
    "recruiterName",
    "recruiterRole",
    "url",
    "companyUrl",
    "img",
    "referral",
    "detailedDescription",
];

/// Full column order for a record set: the priority set, then every other
/// discovered field alphabetically.
pub fn column_order(rows: &[Value]) -> Vec<String> {
    let mut extras: BTreeSet<String> = BTreeSet::new();
    for row in rows {
        if let Value::Object(obj) = row {
            for key in obj.keys() {
                if !PRIORITY_COLUMNS.contains(&key.as_str()) {
                    extras.insert(key.clone());
                }
            }
        }
    }

    PRIORITY_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(extras)
        .collect()
}

/// Serialize records to CSV bytes with the canonical column order.
pub fn to_csv(records: &[JobRecord]) -> Result<Vec<u8>> {
    let rows: Vec<Value> = records
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<_, _>>()?;
    let columns = column_order(&rows);

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;

    for row in &rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| match row.get(column) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect();
        writer.write_record(&cells)?;
    }

    Ok(writer
        .into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))?)
}

/// Conventional filename for a run's export artifact.
pub fn export_filename(date: &str) -> String {
    format!("jobs-{}.csv", date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_columns_lead_extras_follow_alphabetically() {
        let mut record = JobRecord::new("https://example.com/jobs/view/123456");
        record
            .extra
            .insert("zebraField".to_string(), "z".to_string());
        record
            .extra
            .insert("appleField".to_string(), "a".to_string());

        let rows = vec![serde_json::to_value(&record).unwrap()];
        let columns = column_order(&rows);

        assert_eq!(&columns[..2], &["title".to_string(), "company".to_string()]);
        // Flattened standard extras like `id` sort in with discovered ones.
        let apple = columns.iter().position(|c| c == "appleField").unwrap();
        let zebra = columns.iter().position(|c| c == "zebraField").unwrap();
        assert!(apple > PRIORITY_COLUMNS.len() - 1);
        assert!(apple < zebra);
    }

    #[test]
    fn csv_round_trips_headers_and_cells() {
        let mut record = JobRecord::new("https://example.com/jobs/view/123456")
            .with_title("Credit Analyst")
            .with_company("Acme, Inc.");
        record.compensation = "$95,000".to_string();

        let bytes = to_csv(std::slice::from_ref(&record)).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("title,company,location"));

        let row = lines.next().unwrap();
        // Comma in the company name is quoted, not split.
        assert!(row.contains("\"Acme, Inc.\""));
        assert!(row.contains("Credit Analyst"));
    }

    #[test]
    fn export_filename_is_dated() {
        assert_eq!(export_filename("2026-08-24"), "jobs-2026-08-24.csv");
    }
}
