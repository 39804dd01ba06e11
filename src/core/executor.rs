use crate::domain::model::{ApplySummary, DeleteEntry};
use crate::domain::ports::PlaceStore;

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Applies a delete-list to a store in fixed-size batches.
///
/// A failing batch is logged and counted, and the next batch still runs, so
/// the summary always says how far the run got. Deletes are idempotent, so
/// re-running against a fresh fetch picks up whatever is left.
pub struct BatchExecutor<'a, S: PlaceStore + ?Sized> {
    store: &'a S,
    batch_size: usize,
}

impl<'a, S: PlaceStore + ?Sized> BatchExecutor<'a, S> {
    pub fn new(store: &'a S, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn apply(&self, delete_list: &[DeleteEntry]) -> ApplySummary {
        let mut summary = ApplySummary::default();
        if delete_list.is_empty() {
            tracing::info!("Nothing to delete");
            return summary;
        }

        let total_batches = delete_list.len().div_ceil(self.batch_size);
        for (n, batch) in delete_list.chunks(self.batch_size).enumerate() {
            let ids: Vec<String> = batch.iter().map(|entry| entry.id.clone()).collect();
            summary.batches += 1;
            summary.attempted += ids.len();

            // 每筆刪除都以 info 記錄，作為審計紀錄
            for entry in batch {
                tracing::info!(
                    "🗑️ Deleting {} ({:?}) as {} of {}",
                    entry.id,
                    entry.name,
                    entry.reason.as_str(),
                    entry.survivor_id
                );
            }

            match self.store.delete_places(&ids).await {
                Ok(outcome) => {
                    summary.succeeded += outcome.succeeded.len();
                    summary.failed += outcome.failed.len();
                    if !outcome.failed.is_empty() {
                        tracing::warn!(
                            "⚠️ Batch {}/{}: {} of {} ids failed",
                            n + 1,
                            total_batches,
                            outcome.failed.len(),
                            ids.len()
                        );
                    }
                    summary.failures.extend(outcome.failed);
                    tracing::info!(
                        "🗑️ Batch {}/{}: deleted {} places ({}/{} total)",
                        n + 1,
                        total_batches,
                        outcome.succeeded.len(),
                        summary.succeeded,
                        delete_list.len()
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "❌ Batch {}/{} failed ({} ids): {}",
                        n + 1,
                        total_batches,
                        ids.len(),
                        e
                    );
                    summary.failed_batches += 1;
                    summary.failed += ids.len();
                    let message = e.to_string();
                    summary
                        .failures
                        .extend(ids.into_iter().map(|id| (id, message.clone())));
                }
            }
        }

        summary
    }
}
