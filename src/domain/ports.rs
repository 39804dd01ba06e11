use crate::domain::model::{DeleteOutcome, FetchedPlaces, Place};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Where reports and exports are written.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// The persistence port the engine runs against.
#[async_trait]
pub trait PlaceStore: Send + Sync {
    /// Every place in the backend, paging past any row limit.
    async fn fetch_all_places(&self) -> Result<Vec<Place>>;

    /// Like `fetch_all_places`, but also reports rows the store could not
    /// parse so they show up in the run report. Stores that cannot hold
    /// malformed rows keep the default.
    async fn fetch_with_rejects(&self) -> Result<FetchedPlaces> {
        Ok(FetchedPlaces {
            places: self.fetch_all_places().await?,
            rejected: Vec::new(),
        })
    }

    /// Delete one batch. `Err` means the whole batch failed; per-id failures
    /// go in the outcome.
    async fn delete_places(&self, ids: &[String]) -> Result<DeleteOutcome>;
}
