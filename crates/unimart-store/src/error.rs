use thiserror::Error;
use unimart_shared::{Categorize, ErrorCategory};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Local database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The platform reported no home or data directory.
    #[error("No data directory available on this device")]
    NoDataDir,

    #[error("Could not prepare the database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema upgrade to v{version} failed: {reason}")]
    Migration { version: u32, reason: String },

    /// Stored settings no longer match the settings record.
    #[error("Stored settings are unreadable: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stored session has a bad timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

impl Categorize for StoreError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Unknown
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
