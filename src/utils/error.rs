use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeriesError {
    #[error("Invalid period label '{label}': {reason}")]
    InvalidPeriod { label: String, reason: String },

    #[error("Mixed date granularity: start '{start}' and end '{end}' must both be MM-YYYY or both be YYYY")]
    MixedGranularity { start: String, end: String },

    #[error("Reversed date range: start '{start}' is later than end '{end}'")]
    ReversedRange { start: String, end: String },

    #[error("Unknown raster source: {source_id}")]
    UnknownRasterSource { source_id: String },

    #[error("Unknown band '{band}' in raster source {source_id}")]
    UnknownBand { source_id: String, band: String },

    #[error("Region source error ({locator}): {message}")]
    RegionSource { locator: String, message: String },

    #[error("Raster backend error (status {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Statistics export failed for {output}: {message}")]
    ExportError { output: String, message: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

/// 錯誤分類，對應輸入錯誤、外部協作者錯誤、配置錯誤與系統錯誤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Collaborator,
    Configuration,
    System,
}

impl SeriesError {
    pub fn invalid_period(label: &str, reason: impl Into<String>) -> Self {
        SeriesError::InvalidPeriod {
            label: label.to_string(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SeriesError::InvalidPeriod { .. }
            | SeriesError::MixedGranularity { .. }
            | SeriesError::ReversedRange { .. } => ErrorCategory::Input,
            SeriesError::UnknownRasterSource { .. }
            | SeriesError::UnknownBand { .. }
            | SeriesError::RegionSource { .. }
            | SeriesError::Backend { .. }
            | SeriesError::ExportError { .. }
            | SeriesError::ApiError(_)
            | SeriesError::CsvError(_) => ErrorCategory::Collaborator,
            SeriesError::ConfigError { .. }
            | SeriesError::InvalidConfigValueError { .. }
            | SeriesError::MissingConfigError { .. }
            | SeriesError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            SeriesError::IoError(_) | SeriesError::SerializationError(_) => ErrorCategory::System,
        }
    }

    /// 給終端使用者看的簡短訊息
    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Input => format!("Invalid date range input: {}", self),
            ErrorCategory::Collaborator => format!("An external data service failed: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SeriesError::InvalidPeriod { .. } => {
                "Use MM-YYYY for months (e.g. 04-2014) or YYYY for years (e.g. 2014)"
            }
            SeriesError::MixedGranularity { .. } => {
                "Give start and end dates in the same format, both months or both years"
            }
            SeriesError::ReversedRange { .. } => "Swap the start and end dates",
            SeriesError::UnknownRasterSource { .. } => {
                "Check the raster collection identifier against the backend catalog"
            }
            SeriesError::UnknownBand { .. } => "Check the band name exists in the collection",
            SeriesError::RegionSource { .. } => {
                "Check the region file exists and each line reads name,latitude,longitude"
            }
            SeriesError::Backend { .. } | SeriesError::ApiError(_) => {
                "Check the backend endpoint and credentials, then rerun"
            }
            SeriesError::ExportError { .. } | SeriesError::CsvError(_) | SeriesError::IoError(_) => {
                "Check the output directory is writable and has free space"
            }
            SeriesError::SerializationError(_) => "The backend returned an unexpected payload",
            SeriesError::ConfigError { .. }
            | SeriesError::InvalidConfigValueError { .. }
            | SeriesError::MissingConfigError { .. }
            | SeriesError::ConfigValidationError { .. } => {
                "Review the configuration file and command line flags"
            }
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Input => 2,
            ErrorCategory::Configuration => 1,
            ErrorCategory::Collaborator => 4,
            ErrorCategory::System => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, SeriesError>;
