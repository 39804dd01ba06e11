use place_dedup::adapters::report_writer::{DELETE_LIST_FILE, REPORT_FILE};
use place_dedup::domain::ports::Storage;
use place_dedup::utils::validation::Validate;
use place_dedup::{
    DedupConfig, DedupEngine, JsonFileStore, LocalStorage, PlaceStore, Report, ReportWriter,
    StoreConfig,
};
use tempfile::TempDir;

const PLACES: &str = r#"[
    {"id": "gilli-1", "name": "Caffè Gilli", "latitude": 43.7713, "longitude": 11.254,
     "city": "Florence", "country": "Italy", "source": "wikidata",
     "createdAt": "2024-01-01T00:00:00Z"},
    {"id": "gilli-2", "name": "Caffe Gilli", "latitude": 43.77132, "longitude": 11.254,
     "city": "Florence", "country": "Italy", "source": "google_maps",
     "googlePlaceId": "ChIJ-gilli", "website": "https://gilli.it",
     "createdAt": "2024-05-01T00:00:00Z"},
    {"id": "sb-1", "name": "Starbucks", "latitude": 43.7700, "longitude": 11.2500,
     "city": "Florence", "country": "Italy", "createdAt": "2024-01-01T00:00:00Z"},
    {"id": "sb-2", "name": "Starbucks", "latitude": 43.7880, "longitude": 11.2500,
     "city": "Florence", "country": "Italy", "createdAt": "2024-01-02T00:00:00Z"},
    {"id": "shake", "name": "Shake Café", "latitude": 0.0, "longitude": 0.0,
     "city": "Florence", "country": "Italy", "createdAt": "2024-01-03T00:00:00Z"}
]"#;

fn write_config(dir: &TempDir, places_path: &str, output_path: &str, dry_run: bool) -> String {
    let config = format!(
        r#"
[store]
type = "json"
path = "{places_path}"

[dedup]
exact_radius_m = 10.0
chain_radius_m = 50.0

[run]
batch_size = 10
dry_run = {dry_run}

[output]
path = "{output_path}"
write_csv = true
"#
    );
    let path = dir.path().join("dedup.toml");
    std::fs::write(&path, config).unwrap();
    path.to_str().unwrap().to_string()
}

async fn run_from_config(config: &DedupConfig) -> Report {
    let StoreConfig::Json { path } = &config.store else {
        panic!("expected a json store");
    };
    let engine = DedupEngine::new(JsonFileStore::new(path));
    let writer = ReportWriter::new(
        LocalStorage::new(config.output.path.clone()),
        config.output.write_csv,
    );
    engine
        .fetch_and_run_audited(&config.run_options(), &writer)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_end_to_end_with_json_file_and_report_output() {
    let temp_dir = TempDir::new().unwrap();
    let places_path = temp_dir.path().join("places.json");
    std::fs::write(&places_path, PLACES).unwrap();
    let output_path = temp_dir.path().join("out");

    let config_path = write_config(
        &temp_dir,
        places_path.to_str().unwrap(),
        output_path.to_str().unwrap(),
        false,
    );
    let config = DedupConfig::from_file(&config_path).unwrap();
    assert!(config.validate().is_ok());

    let report = run_from_config(&config).await;

    // the Google-verified record wins despite being newer
    assert_eq!(report.delete_list.len(), 1);
    assert_eq!(report.delete_list[0].id, "gilli-1");
    assert_eq!(report.delete_list[0].survivor_id, "gilli-2");
    assert_eq!(report.apply.succeeded, 1);

    let remaining = JsonFileStore::new(&places_path)
        .fetch_all_places()
        .await
        .unwrap();
    let ids: Vec<&str> = remaining.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["gilli-2", "sb-1", "sb-2", "shake"]);

    let storage = LocalStorage::new(output_path.clone());
    let json = storage.read_file(REPORT_FILE).await.unwrap();
    let saved: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(saved["counts"]["chain_or_branch"]["groups"], 1);
    assert_eq!(saved["needs_coordinate_enrichment"][0]["id"], "shake");

    let csv = String::from_utf8(storage.read_file(DELETE_LIST_FILE).await.unwrap()).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("id,name,reason,survivor_id,group_index")
    );
    assert_eq!(lines.next(), Some("gilli-1,Caffè Gilli,exact_duplicate,gilli-2,0"));
    assert_eq!(lines.next(), None);

    // a second pass finds nothing left to delete
    let second = run_from_config(&config).await;
    assert!(second.delete_list.is_empty());
    assert_eq!(second.counts.chain_or_branch.groups, 1);
}

#[tokio::test]
async fn test_dry_run_leaves_file_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let places_path = temp_dir.path().join("places.json");
    std::fs::write(&places_path, PLACES).unwrap();
    let output_path = temp_dir.path().join("out");

    let config_path = write_config(
        &temp_dir,
        places_path.to_str().unwrap(),
        output_path.to_str().unwrap(),
        true,
    );
    let config = DedupConfig::from_file(&config_path).unwrap();
    let report = run_from_config(&config).await;

    assert!(report.dry_run);
    assert_eq!(report.delete_list.len(), 1);
    assert_eq!(std::fs::read_to_string(&places_path).unwrap(), PLACES);
    assert!(output_path.join(REPORT_FILE).exists());
}

#[tokio::test]
async fn test_unwritable_output_aborts_before_deleting() {
    let temp_dir = TempDir::new().unwrap();
    let places_path = temp_dir.path().join("places.json");
    std::fs::write(&places_path, PLACES).unwrap();
    // a regular file where the output directory should be
    let blocked = temp_dir.path().join("not-a-dir");
    std::fs::write(&blocked, "").unwrap();

    let mut config = DedupConfig::with_store(StoreConfig::Json {
        path: places_path.to_str().unwrap().to_string(),
    });
    config.output.path = blocked.to_str().unwrap().to_string();

    let engine = DedupEngine::new(JsonFileStore::new(&places_path));
    let writer = ReportWriter::new(LocalStorage::new(config.output.path.clone()), true);
    let result = engine
        .fetch_and_run_audited(&config.run_options(), &writer)
        .await;

    assert!(result.is_err());
    assert_eq!(std::fs::read_to_string(&places_path).unwrap(), PLACES);
}
