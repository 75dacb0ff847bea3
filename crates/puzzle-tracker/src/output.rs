//! Atomic workbook output

use std::path::Path;

use log::debug;
use tempfile::NamedTempFile;
use tracker_sheets_core::Workbook;
use tracker_sheets_xlsx::{XlsxError, XlsxWriter};

use crate::error::{Result, TrackerError};

/// Write `workbook` to `path`, replacing any existing file only on success
///
/// The package is written to a temporary file next to `path` and renamed over
/// it once complete. On failure the temporary file is removed and `path` is
/// left untouched.
pub fn write_atomic(workbook: &Workbook, path: &Path) -> Result<()> {
    write_via_temp(workbook, path).map_err(|source| TrackerError::OutputWriteFailure {
        path: path.to_path_buf(),
        source,
    })
}

fn write_via_temp(workbook: &Workbook, path: &Path) -> std::result::Result<(), XlsxError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    debug!("writing workbook to {}", temp.path().display());
    XlsxWriter::write(workbook, temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| XlsxError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn workbook() -> Workbook {
        let mut wb = Workbook::empty();
        wb.add_worksheet_with_name("Easy").unwrap();
        wb
    }

    #[test]
    fn test_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.xlsx");
        fs::write(&path, b"old contents").unwrap();

        write_atomic(&workbook(), &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], b"PK");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failure_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.xlsx");

        // A workbook without sheets cannot be serialised
        let result = write_atomic(&Workbook::empty(), &path);

        assert!(matches!(result, Err(TrackerError::OutputWriteFailure { .. })));
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("tracker.xlsx");

        let result = write_atomic(&workbook(), &path);
        assert!(matches!(result, Err(TrackerError::OutputWriteFailure { .. })));
    }
}
