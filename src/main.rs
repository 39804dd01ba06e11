use clap::Parser;
use place_dedup::adapters::rest_store::DEFAULT_PAGE_SIZE;
use place_dedup::utils::error::ErrorSeverity;
use place_dedup::utils::{logger, validation::Validate};
use place_dedup::{
    CliConfig, DedupConfig, DedupEngine, DedupError, JsonFileStore, LocalStorage, PlaceStore,
    Report, ReportWriter, RestStore, RestStoreConfig, StoreConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 先解析設定，日誌格式可能來自 TOML 的 [monitoring] json_logs
    let resolved = cli.resolve().and_then(|config| {
        config.validate()?;
        Ok(config)
    });
    let json_logs = match &resolved {
        Ok(config) => config.monitoring.json_logs,
        Err(_) => cli.json_logs,
    };
    if json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting place-dedup");

    let config = match resolved {
        Ok(config) => config,
        Err(e) => exit_with(e),
    };
    tracing::debug!("Resolved config: {:?}", config);

    let result = match &config.store {
        StoreConfig::Json { path } => run_with(JsonFileStore::new(path), &config).await,
        StoreConfig::Rest {
            endpoint,
            table,
            api_key,
            page_size,
            timeout_seconds,
        } => {
            let store = RestStore::new(RestStoreConfig {
                endpoint: endpoint.clone(),
                table: table.clone(),
                api_key: api_key.clone(),
                page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE),
                timeout_seconds: *timeout_seconds,
            });
            run_with(store, &config).await
        }
    };

    match result {
        Ok(report) => {
            print_summary(&report, &config);
            if report.apply.failed > 0 {
                // 部分批次失敗：報告已寫出，重跑即可處理剩餘的紀錄
                std::process::exit(2);
            }
            Ok(())
        }
        Err(e) => exit_with(e),
    }
}

async fn run_with<S: PlaceStore>(store: S, config: &DedupConfig) -> place_dedup::Result<Report> {
    let engine = DedupEngine::new_with_monitoring(store, config.monitoring.enabled);
    let writer = ReportWriter::new(
        LocalStorage::new(config.output.path.clone()),
        config.output.write_csv,
    );
    let report = engine
        .fetch_and_run_audited(&config.run_options(), &writer)
        .await?;
    tracing::info!("📁 Report written to {}", config.output.path);

    Ok(report)
}

fn print_summary(report: &Report, config: &DedupConfig) {
    println!("📋 Dedup Summary:");
    println!("  Scanned: {} ({} valid)", report.total_scanned, report.valid_places);
    println!(
        "  Exact duplicates: {} groups / {} places",
        report.counts.exact_duplicate.groups, report.counts.exact_duplicate.records
    );
    println!(
        "  Chains / branches: {} groups / {} places",
        report.counts.chain_or_branch.groups, report.counts.chain_or_branch.records
    );
    println!(
        "  Near but distinct: {} groups / {} places",
        report.counts.coincidental_proximity.groups, report.counts.coincidental_proximity.records
    );
    println!("  Need coordinates: {}", report.needs_coordinate_enrichment.len());
    println!("  Invalid records: {}", report.invalid_records.len());
    println!("  Held for review: {}", report.merge_conflicts.len());

    if report.dry_run {
        println!("  🔍 DRY RUN: {} places would be deleted", report.delete_list.len());
    } else {
        println!(
            "  Deleted: {}/{} ({} failed in {} failed batches)",
            report.apply.succeeded,
            report.apply.attempted,
            report.apply.failed,
            report.apply.failed_batches
        );
    }
    println!("  Report: {}", config.output.path);
}

fn exit_with(e: DedupError) -> ! {
    tracing::error!(
        "❌ Dedup run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2, // 可重試
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
