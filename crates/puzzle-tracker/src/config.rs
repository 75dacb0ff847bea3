//! Tracker configuration
//!
//! [`TrackerConfig::default`] reproduces the standard tracker: four tiers read
//! from `easy.json`, `medium.json`, `hard.json` and `deadly.json`, written to
//! `brainstellar_tracker.xlsx`. A JSON config file may override any field;
//! missing fields keep their defaults.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracker_sheets_core::workbook::check_sheet_name;
use tracker_sheets_core::{CellAddress, Color, HorizontalAlignment, Style};

use crate::error::{Result, TrackerError};

/// Default output workbook path
pub const DEFAULT_OUTPUT: &str = "brainstellar_tracker.xlsx";

/// Longest inline list a spreadsheet application accepts for a dropdown
const MAX_LIST_SOURCE_LEN: usize = 255;

/// Builder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Directory holding the `<dataset>.json` files
    pub input_dir: PathBuf,
    /// Workbook to create or replace
    pub output: PathBuf,
    /// Tiers in sheet order
    pub tiers: Vec<TierConfig>,
    /// Status vocabulary in summary order; the first entry is the initial status
    pub statuses: Vec<StatusConfig>,
    /// Column widths in characters, keyed by column letter
    pub column_widths: BTreeMap<String, f64>,
    /// Prompt shown when a Status cell is selected
    pub status_prompt: String,
    /// Alert shown when a Status cell receives a value outside the list
    pub status_error: String,
}

/// One dataset and the worksheet it becomes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Dataset identifier; the file read is `<dataset>.json`
    pub dataset: String,
    /// Worksheet name, also written as each record's difficulty
    pub sheet: String,
}

/// A status value and its highlight colors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConfig {
    pub name: String,
    /// Background color, `#RRGGBB`
    pub fill: String,
    /// Text color, `#RRGGBB`
    pub font_color: String,
}

impl TierConfig {
    pub fn new(dataset: impl Into<String>, sheet: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            sheet: sheet.into(),
        }
    }
}

impl StatusConfig {
    pub fn new(
        name: impl Into<String>,
        fill: impl Into<String>,
        font_color: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            fill: fill.into(),
            font_color: font_color.into(),
        }
    }

    /// Bold, centered text in the status colors
    pub fn highlight_style(&self) -> Result<Style> {
        Ok(Style::new()
            .fill_color(parse_color(&self.fill)?)
            .font_color(parse_color(&self.font_color)?)
            .bold(true)
            .horizontal_alignment(HorizontalAlignment::Center))
    }
}

fn parse_color(hex: &str) -> Result<Color> {
    Color::from_hex(hex)
        .ok_or_else(|| TrackerError::InvalidConfig(format!("invalid color '{}'", hex)))
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let column_widths = [
            ("A", 6.0),
            ("B", 30.0),
            ("C", 10.0),
            ("D", 50.0),
            ("E", 12.0),
            ("F", 15.0),
            ("G", 30.0),
        ]
        .into_iter()
        .map(|(letter, width)| (letter.to_string(), width))
        .collect();

        Self {
            input_dir: PathBuf::from("."),
            output: PathBuf::from(DEFAULT_OUTPUT),
            tiers: vec![
                TierConfig::new("easy", "Easy"),
                TierConfig::new("medium", "Medium"),
                TierConfig::new("hard", "Hard"),
                TierConfig::new("deadly", "Deadly"),
            ],
            statuses: vec![
                StatusConfig::new("To Solve", "#FFC000", "#000000"),
                StatusConfig::new("Solved", "#00B050", "#FFFFFF"),
                StatusConfig::new("Revisit", "#FF0000", "#FFFFFF"),
            ],
            column_widths,
            status_prompt: "Select a status".into(),
            status_error: "Choose from the list only".into(),
        }
    }
}

impl TrackerConfig {
    /// Load a config file; fields it omits keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TrackerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| TrackerError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Path of a tier's dataset file
    pub fn dataset_path(&self, tier: &TierConfig) -> PathBuf {
        self.input_dir.join(format!("{}.json", tier.dataset))
    }

    /// Status names in summary order
    pub fn status_names(&self) -> impl Iterator<Item = &str> {
        self.statuses.iter().map(|s| s.name.as_str())
    }

    /// Status every record starts with
    pub fn initial_status(&self) -> Result<&str> {
        self.statuses
            .first()
            .map(|s| s.name.as_str())
            .ok_or_else(|| TrackerError::InvalidConfig("no statuses configured".into()))
    }

    /// Column widths as zero-based column indices
    pub fn resolved_column_widths(&self) -> Result<Vec<(u16, f64)>> {
        self.column_widths
            .iter()
            .map(|(letters, &width)| {
                let col = CellAddress::letters_to_column(letters).map_err(|e| {
                    TrackerError::InvalidConfig(format!("column '{}': {}", letters, e))
                })?;
                if !(width.is_finite() && width >= 0.0) {
                    return Err(TrackerError::InvalidConfig(format!(
                        "column '{}' has invalid width {}",
                        letters, width
                    )));
                }
                Ok((col, width))
            })
            .collect()
    }

    /// Check the configuration before anything is read or written
    pub fn validate(&self) -> Result<()> {
        if self.tiers.is_empty() {
            return Err(TrackerError::InvalidConfig("no tiers configured".into()));
        }

        let mut sheets = HashSet::new();
        for tier in &self.tiers {
            if tier.dataset.is_empty() {
                return Err(TrackerError::InvalidConfig(format!(
                    "tier '{}' has no dataset",
                    tier.sheet
                )));
            }
            check_sheet_name(&tier.sheet)
                .map_err(|e| TrackerError::InvalidConfig(e.to_string()))?;
            if !sheets.insert(tier.sheet.to_lowercase()) {
                return Err(TrackerError::InvalidConfig(format!(
                    "duplicate sheet name '{}'",
                    tier.sheet
                )));
            }
        }

        if self.statuses.is_empty() {
            return Err(TrackerError::InvalidConfig("no statuses configured".into()));
        }
        let mut names = HashSet::new();
        for status in &self.statuses {
            // Statuses are joined into a quoted, comma-separated dropdown list
            if status.name.is_empty()
                || status.name.contains([',', '"'])
                || status.name.contains(char::is_control)
            {
                return Err(TrackerError::InvalidConfig(format!(
                    "status {:?} must be non-empty and free of commas, quotes and control characters",
                    status.name
                )));
            }
            if !names.insert(status.name.as_str()) {
                return Err(TrackerError::InvalidConfig(format!(
                    "duplicate status '{}'",
                    status.name
                )));
            }
            status.highlight_style()?;
        }
        for text in [&self.status_prompt, &self.status_error] {
            if text.contains(char::is_control) {
                return Err(TrackerError::InvalidConfig(format!(
                    "validation message {:?} contains control characters",
                    text
                )));
            }
        }

        let list_len = self.status_names().collect::<Vec<_>>().join(",").len();
        if list_len > MAX_LIST_SOURCE_LEN {
            return Err(TrackerError::InvalidConfig(format!(
                "status list is {} characters long (max {})",
                list_len, MAX_LIST_SOURCE_LEN
            )));
        }

        self.resolved_column_widths()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = TrackerConfig::default();
        config.validate().unwrap();

        let sheets: Vec<_> = config.tiers.iter().map(|t| t.sheet.as_str()).collect();
        assert_eq!(sheets, ["Easy", "Medium", "Hard", "Deadly"]);
        assert_eq!(
            config.status_names().collect::<Vec<_>>(),
            ["To Solve", "Solved", "Revisit"]
        );
        assert_eq!(config.initial_status().unwrap(), "To Solve");
        assert_eq!(
            config.dataset_path(&config.tiers[0]),
            Path::new(".").join("easy.json")
        );
    }

    #[test]
    fn test_default_column_widths() {
        let widths = TrackerConfig::default().resolved_column_widths().unwrap();
        assert_eq!(
            widths,
            [
                (0, 6.0),
                (1, 30.0),
                (2, 10.0),
                (3, 50.0),
                (4, 12.0),
                (5, 15.0),
                (6, 30.0)
            ]
        );
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: TrackerConfig =
            serde_json::from_str(r#"{"output": "out.xlsx", "tiers": [{"dataset": "easy", "sheet": "Warmup"}]}"#)
                .unwrap();

        assert_eq!(config.output, PathBuf::from("out.xlsx"));
        assert_eq!(config.tiers, [TierConfig::new("easy", "Warmup")]);
        assert_eq!(config.statuses, TrackerConfig::default().statuses);
        assert_eq!(config.status_prompt, "Select a status");
    }

    #[test]
    fn test_rejects_duplicate_sheets() {
        let mut config = TrackerConfig::default();
        config.tiers.push(TierConfig::new("bonus", "easy"));
        assert!(matches!(
            config.validate(),
            Err(TrackerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_bad_values() {
        let cases: [fn(&mut TrackerConfig); 15] = [
            |c| c.tiers.clear(),
            |c| c.statuses.clear(),
            |c| c.tiers[0].sheet = "Easy/1".into(),
            |c| c.tiers[0].sheet = "x".repeat(32),
            |c| c.statuses[1].name = "To Solve".into(),
            |c| c.statuses[1].name = "Solved, twice".into(),
            |c| c.statuses[2].fill = "red".into(),
            |c| {
                c.column_widths.insert("A1".into(), 4.0);
            },
            |c| {
                c.column_widths.insert("H".into(), -1.0);
            },
            |c| c.statuses[0].name = "x".repeat(300),
            |c| c.tiers[1].sheet = "'Bonus".into(),
            |c| c.tiers[2].sheet = "history".into(),
            |c| c.statuses[1].name = "Sol\u{7}ved".into(),
            |c| c.status_prompt = "Pick\u{1}".into(),
            |c| c.tiers[0].sheet = "Easy\n".into(),
        ];

        for (i, mutate) in cases.iter().enumerate() {
            let mut config = TrackerConfig::default();
            mutate(&mut config);
            assert!(
                matches!(config.validate(), Err(TrackerError::InvalidConfig(_))),
                "case {} should be rejected",
                i
            );
        }
    }

    #[test]
    fn test_from_file_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = TrackerConfig::from_file(dir.path().join("nope.json"));
        assert!(matches!(missing, Err(TrackerError::ConfigRead { .. })));

        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        let bad = TrackerConfig::from_file(&path);
        assert!(matches!(bad, Err(TrackerError::ConfigParse { .. })));
    }
}
