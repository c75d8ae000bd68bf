//! Error types for the analytics core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A column every statistic depends on is absent from the source.
    #[error("mandatory column `{0}` is missing from the source")]
    MissingColumn(&'static str),

    /// The workbook has no sheet with the expected export name.
    #[error("workbook {path} has no sheet named '{sheet}'")]
    MissingSheet { path: String, sheet: &'static str },

    /// Too few qualifying rows for the query. Callers render "no data".
    #[error("insufficient data: {available} routes available, {requested} clusters requested")]
    InsufficientData { available: usize, requested: usize },

    #[error("cluster count must be at least 1, got {0}")]
    InvalidClusterCount(usize),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl AnalyticsError {
    /// True for the "not enough data" condition, as opposed to a fatal error.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, AnalyticsError::InsufficientData { .. })
    }
}
