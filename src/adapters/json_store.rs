use crate::adapters::rest_store::parse_rows;
use crate::domain::model::{DeleteOutcome, FetchedPlaces, Place};
use crate::domain::ports::PlaceStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;

/// Place store over a JSON array file. Deletes rewrite the file, keeping rows
/// that could not be parsed as they were.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_rows(&self) -> Result<Vec<Value>> {
        let data = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(|v| v.as_str())
}

#[async_trait]
impl PlaceStore for JsonFileStore {
    async fn fetch_all_places(&self) -> Result<Vec<Place>> {
        Ok(self.fetch_with_rejects().await?.places)
    }

    async fn fetch_with_rejects(&self) -> Result<FetchedPlaces> {
        let rows = self.read_rows().await?;
        let mut fetched = FetchedPlaces::default();
        parse_rows(rows, &mut fetched);
        tracing::debug!(
            "Read {} places from {} ({} rejected)",
            fetched.places.len(),
            self.path.display(),
            fetched.rejected.len()
        );
        Ok(fetched)
    }

    async fn delete_places(&self, ids: &[String]) -> Result<DeleteOutcome> {
        let rows = self.read_rows().await?;
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();

        let (removed, kept): (Vec<Value>, Vec<Value>) = rows
            .into_iter()
            .partition(|row| row_id(row).is_some_and(|id| wanted.contains(id)));

        let json = serde_json::to_vec_pretty(&kept)?;
        tokio::fs::write(&self.path, json).await?;

        let removed_ids: HashSet<&str> = removed.iter().filter_map(row_id).collect();
        let mut outcome = DeleteOutcome::default();
        for id in ids {
            if removed_ids.contains(id.as_str()) {
                outcome.succeeded.push(id.clone());
            } else {
                outcome.failed.push((id.clone(), "not found".to_string()));
            }
        }
        Ok(outcome)
    }
}
