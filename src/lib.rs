pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{DedupConfig, StoreConfig};

pub use adapters::{JsonFileStore, LocalStorage, ReportWriter, RestStore, RestStoreConfig};
pub use core::classify::{classify, Thresholds};
pub use core::engine::{DedupEngine, RunOptions};
pub use domain::model::{Classification, Place, Report};
pub use domain::ports::PlaceStore;
pub use utils::error::{DedupError, Result};
