use crate::adapters::report_writer::ReportWriter;
use crate::core::classify::{classify, Thresholds};
use crate::core::executor::{BatchExecutor, DEFAULT_BATCH_SIZE};
use crate::domain::model::{ApplySummary, FetchedPlaces, Place, Report, ReportCounts};
use crate::domain::ports::{PlaceStore, Storage};
use crate::utils::error::Result;
use crate::utils::monitor::RunMonitor;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub batch_size: usize,
    /// Classify and report, but never call the store's delete.
    pub dry_run: bool,
    pub thresholds: Thresholds,
    /// Reference time for the age bonus; `None` means the start of the run.
    pub now: Option<DateTime<Utc>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
            thresholds: Thresholds::default(),
            now: None,
        }
    }
}

pub struct DedupEngine<S: PlaceStore> {
    store: S,
    monitor: Mutex<RunMonitor>,
}

impl<S: PlaceStore> DedupEngine<S> {
    pub fn new(store: S) -> Self {
        Self::new_with_monitoring(store, false)
    }

    pub fn new_with_monitoring(store: S, monitor_enabled: bool) -> Self {
        Self {
            store,
            monitor: Mutex::new(RunMonitor::new(monitor_enabled)),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn finish_phase(&self, phase: &str) {
        if let Ok(mut monitor) = self.monitor.lock() {
            monitor.finish_phase(phase);
        }
    }

    /// Fetch the full place set. A failure aborts the run: classifying a
    /// partial set is not safe.
    pub async fn fetch(&self) -> Result<FetchedPlaces> {
        tracing::info!("📥 Fetching places...");
        let fetched = self.store.fetch_with_rejects().await.map_err(|e| {
            tracing::error!("❌ Fetch failed, aborting run: {}", e);
            e
        })?;
        tracing::info!(
            "📥 Fetched {} places ({} unparseable rows)",
            fetched.places.len(),
            fetched.rejected.len()
        );
        self.finish_phase("fetch");
        Ok(fetched)
    }

    /// Classify and build the delete-list without touching the store. The
    /// returned report has an empty apply summary.
    pub fn plan(&self, fetched: FetchedPlaces, options: &RunOptions) -> Report {
        let started_at = Utc::now();
        let now = options.now.unwrap_or(started_at);
        let FetchedPlaces { places, rejected } = fetched;
        tracing::info!(
            "🚀 Starting dedup run over {} places (batch size {}, dry run: {})",
            places.len(),
            options.batch_size,
            options.dry_run
        );

        let classified = classify(&places, &options.thresholds, now);
        self.finish_phase("classify");

        let mut counts = ReportCounts::default();
        for group in &classified.groups {
            counts.record(group);
        }

        let mut invalid_records = rejected;
        let total_scanned = places.len() + invalid_records.len();
        invalid_records.extend(classified.invalid_records);

        Report {
            started_at,
            finished_at: Utc::now(),
            dry_run: options.dry_run,
            total_scanned,
            valid_places: classified.valid_places,
            counts,
            groups: classified.groups,
            delete_list: classified.delete_list,
            needs_coordinate_enrichment: classified.needs_coordinate_enrichment,
            ambiguous_buckets: classified.ambiguous_buckets,
            merge_conflicts: classified.merge_conflicts,
            invalid_records,
            apply: ApplySummary::default(),
        }
    }

    /// Apply the report's delete-list in batches, unless this is a dry run.
    /// Delete failures are recorded in the report rather than returned.
    pub async fn apply(&self, report: &mut Report, options: &RunOptions) {
        if options.dry_run {
            tracing::info!(
                "🔍 DRY RUN - {} places would be deleted",
                report.delete_list.len()
            );
            return;
        }

        let executor = BatchExecutor::new(&self.store, options.batch_size);
        report.apply = executor.apply(&report.delete_list).await;
        report.finished_at = Utc::now();
        self.finish_phase("apply");

        if report.apply.failed > 0 {
            tracing::warn!(
                "⚠️ {} of {} deletes failed; re-run to retry the remainder",
                report.apply.failed,
                report.apply.attempted
            );
        }
    }

    /// Plan and apply over an already loaded place set.
    pub async fn run(&self, places: Vec<Place>, options: &RunOptions) -> Report {
        let fetched = FetchedPlaces {
            places,
            rejected: Vec::new(),
        };
        let mut report = self.plan(fetched, options);
        self.apply(&mut report, options).await;
        self.log_summary(&report);
        report
    }

    /// Fetch, plan and apply. Only a fetch failure is an error.
    pub async fn fetch_and_run(&self, options: &RunOptions) -> Result<Report> {
        let fetched = self.fetch().await?;
        let mut report = self.plan(fetched, options);
        self.apply(&mut report, options).await;
        self.log_summary(&report);
        Ok(report)
    }

    /// Like [`fetch_and_run`](Self::fetch_and_run), but the report and
    /// delete-list are written before anything is deleted, and again with the
    /// apply results afterwards. If the first write fails nothing is deleted.
    pub async fn fetch_and_run_audited<W: Storage>(
        &self,
        options: &RunOptions,
        writer: &ReportWriter<W>,
    ) -> Result<Report> {
        let fetched = self.fetch().await?;
        let mut report = self.plan(fetched, options);

        writer.write(&report).await.map_err(|e| {
            tracing::error!("❌ Could not write the delete plan, nothing was deleted: {}", e);
            e
        })?;
        tracing::info!("📝 Delete plan written ({} entries)", report.delete_list.len());

        if !options.dry_run {
            self.apply(&mut report, options).await;
            writer.write(&report).await?;
        }

        self.log_summary(&report);
        Ok(report)
    }

    fn log_summary(&self, report: &Report) {
        tracing::info!(
            "✅ Scanned {}: {} exact duplicate groups, {} chain groups, {} near-distinct groups, {} held for review, {} deleted, {} failed",
            report.total_scanned,
            report.counts.exact_duplicate.groups,
            report.counts.chain_or_branch.groups,
            report.counts.coincidental_proximity.groups,
            report.merge_conflicts.len(),
            report.apply.succeeded,
            report.apply.failed
        );
        if let Ok(monitor) = self.monitor.lock() {
            monitor.log_final_stats();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::DeleteOutcome;
    use crate::utils::error::DedupError;
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct FailingFetchStore;

    #[async_trait]
    impl PlaceStore for FailingFetchStore {
        async fn fetch_all_places(&self) -> Result<Vec<Place>> {
            Err(DedupError::store("fetch", "connection refused"))
        }

        async fn delete_places(&self, _ids: &[String]) -> Result<DeleteOutcome> {
            panic!("delete must not be called when fetch fails");
        }
    }

    struct CountingStore {
        places: Vec<Place>,
        deletes: Mutex<usize>,
    }

    #[async_trait]
    impl PlaceStore for CountingStore {
        async fn fetch_all_places(&self) -> Result<Vec<Place>> {
            Ok(self.places.clone())
        }

        async fn delete_places(&self, ids: &[String]) -> Result<DeleteOutcome> {
            *self.deletes.lock().unwrap() += 1;
            Ok(DeleteOutcome {
                succeeded: ids.to_vec(),
                failed: Vec::new(),
            })
        }
    }

    fn place(id: &str, lat: f64) -> Place {
        Place {
            id: id.to_string(),
            name: "Caffè Gilli".to_string(),
            latitude: lat,
            longitude: 11.2540,
            city: Some("Florence".to_string()),
            country: Some("Italy".to_string()),
            source: None,
            source_detail: None,
            google_place_id: None,
            website: None,
            category: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal() {
        let engine = DedupEngine::new(FailingFetchStore);
        let err = engine
            .fetch_and_run(&RunOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_dry_run_never_deletes() {
        let store = CountingStore {
            places: vec![place("a", 43.7713), place("b", 43.77131)],
            deletes: Mutex::new(0),
        };
        let engine = DedupEngine::new(store);
        let options = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };

        let report = engine.fetch_and_run(&options).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.delete_list.len(), 1);
        assert_eq!(report.apply, ApplySummary::default());
        assert_eq!(*engine.store().deletes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_report_counts_and_apply_summary() {
        let store = CountingStore {
            places: vec![place("a", 43.7713), place("b", 43.77131), place("c", 43.77132)],
            deletes: Mutex::new(0),
        };
        let engine = DedupEngine::new(store);

        let report = engine
            .fetch_and_run(&RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.total_scanned, 3);
        assert_eq!(report.counts.exact_duplicate.groups, 1);
        assert_eq!(report.counts.exact_duplicate.records, 3);
        assert_eq!(report.apply.attempted, 2);
        assert_eq!(report.apply.succeeded, 2);
        assert_eq!(*engine.store().deletes.lock().unwrap(), 1);
    }

    struct RejectingStore;

    #[async_trait]
    impl PlaceStore for RejectingStore {
        async fn fetch_all_places(&self) -> Result<Vec<Place>> {
            Ok(self.fetch_with_rejects().await?.places)
        }

        async fn fetch_with_rejects(&self) -> Result<FetchedPlaces> {
            Ok(FetchedPlaces {
                places: vec![place("a", 43.7713)],
                rejected: vec![crate::domain::model::InvalidRecord {
                    id: "broken".to_string(),
                    reason: "missing field `latitude`".to_string(),
                }],
            })
        }

        async fn delete_places(&self, _ids: &[String]) -> Result<DeleteOutcome> {
            Ok(DeleteOutcome::default())
        }
    }

    #[tokio::test]
    async fn test_rejected_rows_are_counted_in_report() {
        let engine = DedupEngine::new(RejectingStore);
        let report = engine
            .fetch_and_run(&RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.total_scanned, 2);
        assert_eq!(report.valid_places, 1);
        assert_eq!(report.invalid_records.len(), 1);
        assert_eq!(report.invalid_records[0].id, "broken");
    }

    /// Storage that refuses every write.
    struct ReadOnlyStorage;

    impl Storage for ReadOnlyStorage {
        async fn read_file(&self, _path: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn write_file(&self, path: &str, _data: &[u8]) -> Result<()> {
            Err(DedupError::IoError(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("read-only: {}", path),
            )))
        }
    }

    #[tokio::test]
    async fn test_unwritable_report_means_nothing_is_deleted() {
        let store = CountingStore {
            places: vec![place("a", 43.7713), place("b", 43.77131)],
            deletes: Mutex::new(0),
        };
        let engine = DedupEngine::new(store);
        let writer = ReportWriter::new(ReadOnlyStorage, true);

        let result = engine
            .fetch_and_run_audited(&RunOptions::default(), &writer)
            .await;

        assert!(matches!(result, Err(DedupError::IoError(_))));
        assert_eq!(*engine.store().deletes.lock().unwrap(), 0);
    }
}
