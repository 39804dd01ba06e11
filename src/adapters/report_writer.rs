use crate::domain::model::Report;
use crate::domain::ports::Storage;
use crate::utils::error::{DedupError, Result};

pub const REPORT_FILE: &str = "dedup_report.json";
pub const DELETE_LIST_FILE: &str = "delete_list.csv";

pub struct ReportWriter<S: Storage> {
    storage: S,
    write_csv: bool,
}

impl<S: Storage> ReportWriter<S> {
    pub fn new(storage: S, write_csv: bool) -> Self {
        Self { storage, write_csv }
    }

    /// Writes the JSON report and, if enabled, the delete-list CSV. Returns
    /// the names of the files written.
    pub async fn write(&self, report: &Report) -> Result<Vec<&'static str>> {
        let mut written = Vec::new();

        let json = serde_json::to_vec_pretty(report)?;
        self.storage.write_file(REPORT_FILE, &json).await?;
        written.push(REPORT_FILE);

        if self.write_csv {
            let csv = delete_list_csv(report)?;
            self.storage.write_file(DELETE_LIST_FILE, &csv).await?;
            written.push(DELETE_LIST_FILE);
        }

        tracing::debug!("Report files written: {:?}", written);
        Ok(written)
    }
}

/// One row per deleted place, with the survivor it lost to.
pub fn delete_list_csv(report: &Report) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["id", "name", "reason", "survivor_id", "group_index"])?;
    for entry in &report.delete_list {
        writer.write_record([
            entry.id.as_str(),
            entry.name.as_str(),
            entry.reason.as_str(),
            entry.survivor_id.as_str(),
            entry.group_index.to_string().as_str(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| DedupError::IoError(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ApplySummary, Classification, DeleteEntry, ReportCounts};
    use chrono::Utc;

    fn report() -> Report {
        Report {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            dry_run: true,
            total_scanned: 2,
            valid_places: 2,
            counts: ReportCounts::default(),
            groups: Vec::new(),
            delete_list: vec![DeleteEntry {
                id: "b".to_string(),
                name: "Caffè Gilli, Firenze".to_string(),
                reason: Classification::ExactDuplicate,
                survivor_id: "a".to_string(),
                group_index: 0,
            }],
            needs_coordinate_enrichment: Vec::new(),
            ambiguous_buckets: Vec::new(),
            merge_conflicts: Vec::new(),
            invalid_records: Vec::new(),
            apply: ApplySummary::default(),
        }
    }

    #[test]
    fn test_delete_list_csv_quotes_names() {
        let csv = String::from_utf8(delete_list_csv(&report()).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "id,name,reason,survivor_id,group_index");
        assert_eq!(lines[1], "b,\"Caffè Gilli, Firenze\",exact_duplicate,a,0");
    }
}
