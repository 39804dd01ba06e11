use thiserror::Error;

#[derive(Error, Debug)]
pub enum DedupError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Store {operation} failed: {message}")]
    StoreError { operation: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Storage,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DedupError {
    pub fn store(operation: &str, message: impl Into<String>) -> Self {
        DedupError::StoreError {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        DedupError::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DedupError::ConfigError { .. }
            | DedupError::MissingConfigError { .. }
            | DedupError::InvalidConfigValueError { .. }
            | DedupError::TomlError(_) => ErrorCategory::Configuration,
            DedupError::HttpError(_) => ErrorCategory::Network,
            DedupError::StoreError { .. } => ErrorCategory::Storage,
            DedupError::CsvError(_) | DedupError::SerializationError(_) => ErrorCategory::Data,
            DedupError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DedupError::HttpError(_) | DedupError::StoreError { .. } => ErrorSeverity::Medium,
            DedupError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the config file and command line flags, then run again"
            }
            ErrorCategory::Network => {
                "Check that the store endpoint is reachable and the API key is valid, then re-run"
            }
            ErrorCategory::Storage => {
                "Re-run the job; places that were already deleted drop out of the next fetch"
            }
            ErrorCategory::Data => "Inspect the input records for malformed fields",
            ErrorCategory::System => "Check file permissions and free disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            DedupError::HttpError(_) => "Could not talk to the place store".to_string(),
            DedupError::StoreError { operation, .. } => {
                format!("The place store rejected the {} request", operation)
            }
            DedupError::MissingConfigError { field } => {
                format!("Missing required setting '{}'", field)
            }
            DedupError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DedupError>;
