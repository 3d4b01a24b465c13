//! Error types.

use chrono::NaiveDate;

#[derive(thiserror::Error, Debug)]
pub enum ReconError {
    #[error("Wrapped anyhow error: {0}")]
    AnyhowError(#[from] anyhow::Error),
    #[error("Country not found: {0}")]
    CountryNotFound(String),
    #[error("Metric not found: {0}")]
    MetricNotFound(String),
    #[error("Date {date} not found in the {metric} series")]
    DateNotFound { metric: String, date: NaiveDate },
    #[error("No value for {country} on {date} in the {metric} series")]
    MissingValue {
        metric: String,
        country: String,
        date: NaiveDate,
    },
    #[error("Onset date {date} of {country} is outside the date axis")]
    OnsetOutOfRange { country: String, date: NaiveDate },
    #[error("No observations for {country} in the {metric} series")]
    NoObservations { metric: String, country: String },
    #[error("Failed to parse date: {0}")]
    DateParse(String),
    #[error("Missing column: {0}")]
    MissingColumn(String),
    #[error("Alias target '{0}' is also an alias key")]
    ChainedAlias(String),
    #[error("Expected {expected} matching topics for the curated exclusion list, found {found}")]
    TopicCountMismatch { expected: usize, found: usize },
    #[error("No case count files matching '{0}'")]
    NoCaseFiles(String),
    #[error("Wrapped polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
    #[error("Wrapped calamine error: {0}")]
    ExcelError(#[from] calamine::Error),
    #[error("Invalid glob pattern: {0}")]
    GlobPattern(#[from] glob::PatternError),
    #[error("Failed to read glob entry: {0}")]
    GlobEntry(#[from] glob::GlobError),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReconError>;
