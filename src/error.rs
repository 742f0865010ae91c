use std::path::PathBuf;
use thiserror::Error;

/// Errors raised at the ingestion and storage boundary.
///
/// The analytics functions themselves never fail; anything that reaches them has
/// already been parsed and validated here.
#[derive(Error, Debug)]
pub enum DashboardError {
    /// SQLite errors from the record store
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// CSV reading/writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input file does not exist
    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A column the ingestion step cannot do without
    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}
