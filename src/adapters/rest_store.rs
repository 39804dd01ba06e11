use crate::domain::model::{DeleteOutcome, FetchedPlaces, InvalidRecord, Place};
use crate::domain::ports::PlaceStore;
use crate::utils::error::{DedupError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::collections::HashSet;
use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    /// Base REST URL, e.g. `https://project.example.co/rest/v1`.
    pub endpoint: String,
    pub table: String,
    pub api_key: Option<String>,
    /// Rows per GET; keep at or below the backend's max-rows setting.
    pub page_size: usize,
    pub timeout_seconds: Option<u64>,
}

/// Place store backed by a PostgREST-style HTTP table.
pub struct RestStore {
    config: RestStoreConfig,
    client: Client,
}

impl RestStore {
    pub fn new(config: RestStoreConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn table_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.table
        )
    }

    fn authorize(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(key) = &self.config.api_key {
            request = request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key));
        }
        if let Some(timeout) = self.config.timeout_seconds {
            request = request.timeout(Duration::from_secs(timeout));
        }
        request
    }

    async fn fetch_page(&self, offset: usize) -> Result<Vec<serde_json::Value>> {
        let request = self
            .client
            .get(self.table_url())
            .query(&[("select", "*"), ("order", "id.asc")])
            .query(&[("offset", offset), ("limit", self.config.page_size.max(1))]);

        let response = self.authorize(request).send().await?;
        let status = response.status();
        tracing::debug!("📡 GET offset {} -> {}", offset, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DedupError::store(
                "fetch",
                format!("HTTP {} at offset {}: {}", status, offset, body),
            ));
        }

        Ok(response.json().await?)
    }
}

fn in_filter(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

/// Parse raw store rows one by one. A bad row is set aside with its reason
/// instead of failing the whole fetch.
pub(crate) fn parse_rows(rows: Vec<serde_json::Value>, fetched: &mut FetchedPlaces) {
    for row in rows {
        let id = row
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("<unknown>")
            .to_string();
        match serde_json::from_value::<Place>(row) {
            Ok(place) => fetched.places.push(place),
            Err(e) => {
                tracing::warn!("⚠️ Skipping unparseable place row {}: {}", id, e);
                fetched.rejected.push(InvalidRecord {
                    id,
                    reason: format!("unparseable row: {}", e),
                });
            }
        }
    }
}

#[async_trait]
impl PlaceStore for RestStore {
    async fn fetch_all_places(&self) -> Result<Vec<Place>> {
        Ok(self.fetch_with_rejects().await?.places)
    }

    async fn fetch_with_rejects(&self) -> Result<FetchedPlaces> {
        let mut fetched = FetchedPlaces::default();
        let mut offset = 0;

        // 後端可能有 max-rows 上限，頁面比 page_size 短不代表結束；只有空頁才停
        loop {
            let rows = self.fetch_page(offset).await?;
            if rows.is_empty() {
                break;
            }
            offset += rows.len();
            parse_rows(rows, &mut fetched);
        }

        tracing::debug!(
            "Fetched {} rows from {} ({} rejected)",
            offset,
            self.table_url(),
            fetched.rejected.len()
        );
        Ok(fetched)
    }

    async fn delete_places(&self, ids: &[String]) -> Result<DeleteOutcome> {
        if ids.is_empty() {
            return Ok(DeleteOutcome::default());
        }

        let request = self
            .client
            .delete(self.table_url())
            .query(&[("id", in_filter(ids))])
            .header("Prefer", "return=representation");

        let response = self.authorize(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DedupError::store(
                "delete",
                format!("HTTP {}: {}", status, body),
            ));
        }

        let rows: Vec<serde_json::Value> = response.json().await?;
        let deleted: HashSet<&str> = rows
            .iter()
            .filter_map(|row| row.get("id").and_then(|v| v.as_str()))
            .collect();

        let mut outcome = DeleteOutcome::default();
        for id in ids {
            if deleted.contains(id.as_str()) {
                outcome.succeeded.push(id.clone());
            } else {
                outcome
                    .failed
                    .push((id.clone(), "not deleted (already gone?)".to_string()));
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_filter_quotes_ids() {
        let ids = vec!["a1".to_string(), "b\"2".to_string()];
        assert_eq!(in_filter(&ids), r#"in.("a1","b\"2")"#);
    }

    #[test]
    fn test_parse_rows_sets_bad_rows_aside() {
        let rows = vec![
            serde_json::json!({"id": "a", "name": "Caffè Gilli", "latitude": 43.7713,
                "longitude": 11.254, "created_at": "2024-01-01T00:00:00Z"}),
            serde_json::json!({"id": "b", "name": "No coordinates",
                "created_at": "2024-01-01T00:00:00Z"}),
            serde_json::json!({"name": "No id"}),
        ];
        let mut fetched = FetchedPlaces::default();
        parse_rows(rows, &mut fetched);

        assert_eq!(fetched.places.len(), 1);
        let rejected: Vec<&str> = fetched.rejected.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(rejected, vec!["b", "<unknown>"]);
        assert!(fetched.rejected[0].reason.contains("latitude"));
    }

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let store = RestStore::new(RestStoreConfig {
            endpoint: "https://db.example.com/rest/v1/".to_string(),
            table: "places".to_string(),
            api_key: None,
            page_size: DEFAULT_PAGE_SIZE,
            timeout_seconds: None,
        });
        assert_eq!(store.table_url(), "https://db.example.com/rest/v1/places");
    }
}
