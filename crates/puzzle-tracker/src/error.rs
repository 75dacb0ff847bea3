//! Error types for the tracker builder

use std::path::PathBuf;

use thiserror::Error;
use tracker_sheets_xlsx::XlsxError;

/// Result type alias using [`TrackerError`]
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors that abort a tracker build
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A tier's dataset file does not exist
    #[error("input file not found: {}", path.display())]
    InputMissing { path: PathBuf },

    /// The dataset file exists but could not be read
    #[error("failed to read input file {}", path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dataset is not a JSON array of records with `title` and `url` text
    #[error("malformed input file {}: {source}", path.display())]
    InputMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read
    #[error("failed to read config file {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`crate::TrackerConfig`]
    #[error("failed to parse config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Workbook model error
    #[error("worksheet error: {0}")]
    Sheet(#[from] tracker_sheets_core::Error),

    /// The workbook could not be serialised or moved into place
    #[error("failed to write {}", path.display())]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: XlsxError,
    },
}
