//! Puzzle datasets and tracker rows

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::error::{Result, TrackerError};

/// A puzzle as it appears in a dataset file; other fields are ignored
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PuzzleRecord {
    pub title: String,
    pub url: String,
}

/// One data row of a tier worksheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerRow {
    /// 1-based position within the tier
    pub number: u32,
    pub title: String,
    pub difficulty: String,
    pub url: String,
    pub status: String,
    pub date_solved: String,
    pub notes: String,
}

/// Read a dataset file: a JSON array of objects with `title` and `url` strings
pub fn load_dataset(path: &Path) -> Result<Vec<PuzzleRecord>> {
    let text = fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => TrackerError::InputMissing {
            path: path.to_path_buf(),
        },
        _ => TrackerError::InputRead {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let records: Vec<PuzzleRecord> =
        serde_json::from_str(&text).map_err(|source| TrackerError::InputMalformed {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Number records in input order and attach the tier's fixed fields
pub fn annotate(records: Vec<PuzzleRecord>, difficulty: &str, status: &str) -> Vec<TrackerRow> {
    records
        .into_iter()
        .zip(1..)
        .map(|(record, number)| TrackerRow {
            number,
            title: record.title,
            difficulty: difficulty.to_string(),
            url: record.url,
            status: status.to_string(),
            date_solved: String::new(),
            notes: String::new(),
        })
        .collect()
}
