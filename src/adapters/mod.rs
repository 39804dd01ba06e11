// Adapters layer: concrete place stores and report output.

pub mod json_store;
pub mod local_storage;
pub mod report_writer;
pub mod rest_store;

pub use json_store::JsonFileStore;
pub use local_storage::LocalStorage;
pub use report_writer::ReportWriter;
pub use rest_store::{RestStore, RestStoreConfig};
