//! Tracker workbook builder
//!
//! Each tier becomes one worksheet: a header row, one row per puzzle, status
//! highlighting and a dropdown on the Status column, and a summary block.

use std::path::{Path, PathBuf};

use log::info;
use tracker_sheets_core::{
    CellRange, ConditionalFormatRule, DataValidation, HorizontalAlignment, Style, Workbook,
    Worksheet,
};

use crate::config::{TierConfig, TrackerConfig};
use crate::dataset::{annotate, load_dataset, TrackerRow};
use crate::error::Result;
use crate::output::write_atomic;
use crate::summary::{write_summary, SummaryLayout, SummaryStyles};

/// Table header labels, in column order
pub const HEADERS: [&str; 7] = [
    "Q.No",
    "Title",
    "Difficulty",
    "URL",
    "Status",
    "Date Solved",
    "Notes",
];

/// Zero-based column of the Status field
pub const STATUS_COL: u16 = 4;

/// Builds tracker workbooks from a validated [`TrackerConfig`]
#[derive(Debug)]
pub struct TrackerBuilder {
    config: TrackerConfig,
}

impl TrackerBuilder {
    /// Validate `config` and wrap it in a builder
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Read and annotate one tier's dataset
    pub fn load_tier(&self, tier: &TierConfig) -> Result<Vec<TrackerRow>> {
        let records = load_dataset(&self.config.dataset_path(tier))?;
        Ok(annotate(records, &tier.sheet, self.config.initial_status()?))
    }

    /// Load every tier and lay out the whole workbook in memory
    ///
    /// Nothing is written; the first failing tier aborts the build.
    pub fn build_workbook(&self) -> Result<Workbook> {
        let mut workbook = Workbook::empty();
        for tier in &self.config.tiers {
            let rows = self.load_tier(tier)?;
            let sheet = self.build_sheet(&tier.sheet, &rows)?;
            info!("tier '{}': {} puzzles", tier.sheet, rows.len());
            workbook.add_existing_worksheet(sheet)?;
        }
        Ok(workbook)
    }

    /// Lay out one tier worksheet
    pub fn build_sheet(&self, name: &str, rows: &[TrackerRow]) -> Result<Worksheet> {
        let mut sheet = Worksheet::new(name);

        let header_style = Style::new().bold(true);
        for (col, label) in (0u16..).zip(HEADERS) {
            sheet.set_cell_value_at(0, col, label)?;
            sheet.set_cell_style_at(0, col, &header_style)?;
        }

        let status_style = Style::new().horizontal_alignment(HorizontalAlignment::Center);
        for (row, record) in (1u32..).zip(rows) {
            sheet.set_cell_value_at(row, 0, record.number)?;
            sheet.set_cell_value_at(row, 1, record.title.as_str())?;
            sheet.set_cell_value_at(row, 2, record.difficulty.as_str())?;
            sheet.set_cell_value_at(row, 3, record.url.as_str())?;
            sheet.set_cell_value_at(row, STATUS_COL, record.status.as_str())?;
            sheet.set_cell_style_at(row, STATUS_COL, &status_style)?;
            // Date Solved and Notes start blank
            for (col, value) in [(5, &record.date_solved), (6, &record.notes)] {
                if !value.is_empty() {
                    sheet.set_cell_value_at(row, col, value.as_str())?;
                }
            }
        }

        sheet.set_freeze_panes(1, 0);
        for (col, width) in self.config.resolved_column_widths()? {
            sheet.set_column_width(col, width);
        }

        let layout = SummaryLayout::new(STATUS_COL, rows.len() as u32, self.config.statuses.len());
        let highlights = self
            .config
            .statuses
            .iter()
            .map(|status| status.highlight_style())
            .collect::<Result<Vec<_>>>()?;

        if !rows.is_empty() {
            self.add_status_rules(&mut sheet, layout.status_range(), &highlights);
        }

        let statuses: Vec<&str> = self.config.status_names().collect();
        write_summary(&mut sheet, &layout, &statuses, &SummaryStyles::new(highlights))?;

        Ok(sheet)
    }

    /// Case-sensitive highlighting and the dropdown over the Status cells
    fn add_status_rules(&self, sheet: &mut Worksheet, range: CellRange, highlights: &[Style]) {
        // Relative to the first cell; applied down the whole range
        let first_cell = range.start;
        for ((priority, status), highlight) in (1u32..).zip(&self.config.statuses).zip(highlights) {
            let formula = format!(
                "EXACT({},\"{}\")",
                first_cell,
                status.name.replace('"', "\"\"")
            );
            sheet.add_conditional_format(
                ConditionalFormatRule::expression(formula)
                    .with_range(range)
                    .with_priority(priority)
                    .with_format(highlight.clone()),
            );
        }

        sheet.add_data_validation(
            DataValidation::list_of(self.config.status_names())
                .with_range(range)
                .with_input_message("", self.config.status_prompt.as_str())
                .with_error_message("", self.config.status_error.as_str()),
        );
    }

    /// Build the workbook and atomically write it to the configured output
    pub fn run(&self) -> Result<PathBuf> {
        let workbook = self.build_workbook()?;
        write_atomic(&workbook, &self.config.output)?;
        info!("wrote {}", self.config.output.display());
        Ok(self.config.output.clone())
    }
}

/// Build and write the tracker described by `config`
pub fn run(config: TrackerConfig) -> Result<PathBuf> {
    TrackerBuilder::new(config)?.run()
}

/// Console line printed after a successful run
pub fn completion_message(output: &Path) -> String {
    format!("Created {} with color-coded Status column.", output.display())
}
