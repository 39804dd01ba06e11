use crate::adapters::rest_store::DEFAULT_PAGE_SIZE;
use crate::config::toml_config::{DedupConfig, StoreConfig};
use crate::utils::error::{DedupError, Result};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "place-dedup")]
#[command(about = "Find and remove duplicate places across imported sources")]
pub struct CliConfig {
    /// Path to a TOML config file; flags below override it
    #[arg(short, long)]
    pub config: Option<String>,

    /// Read places from a JSON array file
    #[arg(long, conflicts_with = "endpoint")]
    pub input: Option<String>,

    /// PostgREST-style base URL of the place table
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Table name (default "places")
    #[arg(long)]
    pub table: Option<String>,

    #[arg(long, env = "PLACE_DEDUP_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long)]
    pub page_size: Option<usize>,

    /// Ids per delete request
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Classify and report without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long)]
    pub output_path: Option<String>,

    /// Skip writing delete_list.csv
    #[arg(long)]
    pub no_csv: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Log CPU and memory per phase")]
    pub monitor: bool,
}

impl CliConfig {
    fn store_from_flags(&self) -> Option<StoreConfig> {
        if let Some(path) = &self.input {
            return Some(StoreConfig::Json { path: path.clone() });
        }
        self.endpoint.as_ref().map(|endpoint| StoreConfig::Rest {
            endpoint: endpoint.clone(),
            table: self.table.clone().unwrap_or_else(|| "places".to_string()),
            api_key: self.api_key.clone(),
            page_size: Some(self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)),
            timeout_seconds: None,
        })
    }

    /// Merge the optional config file with command line overrides.
    pub fn resolve(&self) -> Result<DedupConfig> {
        let mut config = match (&self.config, self.store_from_flags()) {
            (Some(path), flag_store) => {
                let mut config = DedupConfig::from_file(path)?;
                if let Some(store) = flag_store {
                    config.store = store;
                }
                config
            }
            (None, Some(store)) => DedupConfig::with_store(store),
            (None, None) => {
                return Err(DedupError::MissingConfigError {
                    field: "--config, --input or --endpoint".to_string(),
                })
            }
        };

        // REST 相關旗標也要覆蓋設定檔中的 store
        if let StoreConfig::Rest {
            table,
            api_key,
            page_size,
            ..
        } = &mut config.store
        {
            if let Some(flag) = &self.table {
                *table = flag.clone();
            }
            if let Some(flag) = &self.api_key {
                *api_key = Some(flag.clone());
            }
            if let Some(flag) = self.page_size {
                *page_size = Some(flag);
            }
        }

        if let Some(batch_size) = self.batch_size {
            config.run.batch_size = batch_size;
        }
        if self.dry_run {
            config.run.dry_run = true;
        }
        if let Some(path) = &self.output_path {
            config.output.path = path.clone();
        }
        if self.no_csv {
            config.output.write_csv = false;
        }
        if self.monitor {
            config.monitoring.enabled = true;
        }
        if self.json_logs {
            config.monitoring.json_logs = true;
        }

        Ok(config)
    }
}
