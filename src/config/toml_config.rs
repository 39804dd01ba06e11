use crate::adapters::rest_store::DEFAULT_PAGE_SIZE;
use crate::core::classify::Thresholds;
use crate::core::engine::RunOptions;
use crate::core::executor::DEFAULT_BATCH_SIZE;
use crate::utils::error::{DedupError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub dedup: Thresholds,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    Json {
        path: String,
    },
    Rest {
        endpoint: String,
        #[serde(default = "default_table")]
        table: String,
        api_key: Option<String>,
        page_size: Option<usize>,
        timeout_seconds: Option<u64>,
    },
}

fn default_table() -> String {
    "places".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub batch_size: usize,
    pub dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
    pub write_csv: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "./output".to_string(),
            write_csv: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub json_logs: bool,
}

impl DedupConfig {
    pub fn with_store(store: StoreConfig) -> Self {
        Self {
            store,
            dedup: Thresholds::default(),
            run: RunConfig::default(),
            output: OutputConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed)?)
    }

    /// 替換環境變數 (例如 ${PLACE_DEDUP_API_KEY})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| DedupError::config(format!("env pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            batch_size: self.run.batch_size,
            dry_run: self.run.dry_run,
            thresholds: self.dedup.clone(),
            now: None,
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        match &self.store {
            StoreConfig::Json { path } => {
                validation::validate_path("store.path", path)?;
                validation::validate_file_extension("store.path", path, &["json"])?;
            }
            StoreConfig::Rest {
                endpoint,
                table,
                api_key,
                page_size,
                ..
            } => {
                validation::validate_url("store.endpoint", endpoint)?;
                validation::validate_non_empty_string("store.table", table)?;
                if let Some(key) = api_key {
                    if key.starts_with("${") {
                        return Err(DedupError::InvalidConfigValueError {
                            field: "store.api_key".to_string(),
                            value: key.clone(),
                            reason: "environment variable is not set".to_string(),
                        });
                    }
                }
                validation::validate_positive_number(
                    "store.page_size",
                    page_size.unwrap_or(DEFAULT_PAGE_SIZE),
                    1,
                )?;
            }
        }

        validation::validate_positive_number("run.batch_size", self.run.batch_size, 1)?;
        validation::validate_path("output.path", &self.output.path)?;

        let t = &self.dedup;
        for (field, value) in [
            ("dedup.exact_radius_m", t.exact_radius_m),
            ("dedup.chain_radius_m", t.chain_radius_m),
            ("dedup.fuzzy_radius_m", t.fuzzy_radius_m),
            ("dedup.near_distinct_radius_m", t.near_distinct_radius_m),
        ] {
            validation::validate_range(field, value, 0.0, 100_000.0)?;
        }
        for (field, value) in [
            ("dedup.same_city_similarity", t.same_city_similarity),
            ("dedup.nearby_similarity", t.nearby_similarity),
            ("dedup.distinct_similarity", t.distinct_similarity),
        ] {
            validation::validate_range(field, value, 0.0, 1.0)?;
        }
        validation::validate_range("dedup.coordinate_decimals", t.coordinate_decimals, 0, 10)?;

        if t.exact_radius_m > t.chain_radius_m {
            return Err(DedupError::InvalidConfigValueError {
                field: "dedup.exact_radius_m".to_string(),
                value: t.exact_radius_m.to_string(),
                reason: format!(
                    "must not exceed dedup.chain_radius_m ({})",
                    t.chain_radius_m
                ),
            });
        }

        Ok(())
    }
}

impl Validate for DedupConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = DedupConfig::from_toml_str(
            r#"
[store]
type = "json"
path = "places.json"
"#,
        )
        .unwrap();

        assert_eq!(
            config.store,
            StoreConfig::Json {
                path: "places.json".to_string()
            }
        );
        assert_eq!(config.run.batch_size, 100);
        assert!(!config.run.dry_run);
        assert_eq!(config.dedup, Thresholds::default());
        assert!(config.output.write_csv);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_rest_config() {
        let config = DedupConfig::from_toml_str(
            r#"
[store]
type = "rest"
endpoint = "https://db.example.com/rest/v1"
table = "pois"
page_size = 500

[dedup]
exact_radius_m = 5.0
nearby_similarity = 0.65

[run]
batch_size = 50
dry_run = true

[output]
path = "./reports"
write_csv = false

[monitoring]
enabled = true
"#,
        )
        .unwrap();

        match &config.store {
            StoreConfig::Rest {
                table, page_size, ..
            } => {
                assert_eq!(table, "pois");
                assert_eq!(*page_size, Some(500));
            }
            other => panic!("unexpected store {:?}", other),
        }
        assert_eq!(config.dedup.exact_radius_m, 5.0);
        assert_eq!(config.dedup.chain_radius_m, 50.0);
        assert_eq!(config.dedup.nearby_similarity, 0.65);

        let options = config.run_options();
        assert_eq!(options.batch_size, 50);
        assert!(options.dry_run);
        assert!(config.monitoring.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("PLACE_DEDUP_TEST_KEY", "secret-123");
        let config = DedupConfig::from_toml_str(
            r#"
[store]
type = "rest"
endpoint = "https://db.example.com/rest/v1"
api_key = "${PLACE_DEDUP_TEST_KEY}"
"#,
        )
        .unwrap();

        match config.store {
            StoreConfig::Rest { api_key, table, .. } => {
                assert_eq!(api_key.as_deref(), Some("secret-123"));
                assert_eq!(table, "places");
            }
            other => panic!("unexpected store {:?}", other),
        }
    }

    #[test]
    fn test_unset_env_var_fails_validation() {
        let config = DedupConfig::from_toml_str(
            r#"
[store]
type = "rest"
endpoint = "https://db.example.com/rest/v1"
api_key = "${PLACE_DEDUP_SURELY_UNSET_VAR}"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = DedupConfig::with_store(StoreConfig::Json {
            path: "places.json".to_string(),
        });
        config.run.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = DedupConfig::with_store(StoreConfig::Json {
            path: "places.csv".to_string(),
        });
        assert!(config.validate().is_err());

        config.store = StoreConfig::Json {
            path: "places.json".to_string(),
        };
        config.dedup.exact_radius_m = 80.0;
        assert!(config.validate().is_err());

        config.dedup.exact_radius_m = 10.0;
        config.dedup.same_city_similarity = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[store]\ntype = \"json\"\npath = \"data/places.json\"").unwrap();

        let config = DedupConfig::from_file(file.path()).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_store_type_is_a_parse_error() {
        let err = DedupConfig::from_toml_str("[store]\ntype = \"mongo\"\n").unwrap_err();
        assert!(matches!(err, DedupError::TomlError(_)));
    }
}
