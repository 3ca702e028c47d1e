use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Output {} rejected: {message}", .path.display())]
    OutputConflictError { path: PathBuf, message: String },

    #[error("Cannot read input directory {}: {source}", .path.display())]
    InputDirectoryError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Output,
    Network,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::HttpError(_) => ErrorCategory::Network,
            EtlError::CsvError(_) | EtlError::SerializationError(_) => ErrorCategory::Data,
            EtlError::IoError(_) | EtlError::OutputConflictError { .. } => ErrorCategory::Output,
            EtlError::InputDirectoryError { .. } => ErrorCategory::Input,
            EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Output => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::Input => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "Check the command line flags or the TOML config file",
            ErrorCategory::Input => "Make sure the input directory exists and is readable",
            ErrorCategory::Output => "Make sure the output directory is writable and has free space",
            ErrorCategory::Network => "Check the geocoding endpoint and API key, then run again",
            ErrorCategory::Data => "Inspect the offending file for a broken delimiter or encoding",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::InputDirectoryError { path, .. } => {
                format!("Input directory {} could not be read", path.display())
            }
            EtlError::MissingConfigError { field } => {
                format!("Missing setting '{}'", field)
            }
            EtlError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

/// Per-row failure. Never aborts a file, only increments its error counter.
#[derive(Error, Debug)]
pub enum RowError {
    #[error("line {line}: row is not valid UTF-8")]
    InvalidUtf8 { line: u64 },

    #[error("line {line}: missing required field '{field}'")]
    MissingField { line: u64, field: &'static str },

    #[error("line {line}: cannot serialize meta: {source}")]
    Meta {
        line: u64,
        #[source]
        source: serde_json::Error,
    },
}

impl RowError {
    pub fn line(&self) -> u64 {
        match self {
            RowError::InvalidUtf8 { line }
            | RowError::MissingField { line, .. }
            | RowError::Meta { line, .. } => *line,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
