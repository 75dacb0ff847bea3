//! Summary block beneath a tier table
//!
//! The block sits in the Status column and the two columns to its right:
//!
//! ```text
//! | SUMMARY (merged)                 |
//! | Status   | Count   | Percentage  |
//! | To Solve | =count  | =percentage |   one row per status
//! | TOTAL    | N       | 100%        |
//! ```
//!
//! Counts and percentages are formulas over the Status data range, so they
//! follow later edits of the Status cells.

use tracker_sheets_core::{CellAddress, CellRange, HorizontalAlignment, Style, Worksheet};

use crate::error::Result;

/// Display format for percentages, one decimal place with a literal percent sign
pub const PERCENT_FORMAT: &str = "0.0\"%\"";

/// Blank rows between the last table row and the summary title
const GAP_ROWS: u32 = 1;

/// Row positions (zero-based) of a summary block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryLayout {
    /// Status column; Count and Percentage follow it
    pub status_col: u16,
    /// First data row of the table
    pub first_data_row: u32,
    /// Number of data rows
    pub data_rows: u32,
    /// Number of status rows in the block
    pub status_count: u32,
}

impl SummaryLayout {
    pub fn new(status_col: u16, data_rows: u32, status_count: usize) -> Self {
        Self {
            status_col,
            first_data_row: 1,
            data_rows,
            status_count: status_count as u32,
        }
    }

    /// Status cells of the table; a single row when the table is empty
    pub fn status_range(&self) -> CellRange {
        let last = self.first_data_row + self.data_rows.max(1) - 1;
        CellRange::column(self.status_col, self.first_data_row, last)
    }

    pub fn title_row(&self) -> u32 {
        // The header row when there is no data
        let last_table_row = self.first_data_row + self.data_rows - 1;
        last_table_row + GAP_ROWS + 1
    }

    pub fn header_row(&self) -> u32 {
        self.title_row() + 1
    }

    /// Row of the `index`th status
    pub fn status_row(&self, index: usize) -> u32 {
        self.header_row() + 1 + index as u32
    }

    pub fn total_row(&self) -> u32 {
        self.header_row() + 1 + self.status_count
    }

    pub fn count_col(&self) -> u16 {
        self.status_col + 1
    }

    pub fn percentage_col(&self) -> u16 {
        self.status_col + 2
    }
}

/// Case-sensitive count of `status` over `range`
///
/// `COUNTIF` ignores case, so each cell is compared with `EXACT`. The range is
/// always written as `start:end`, also when it is a single cell.
pub fn count_formula(range: &CellRange, status: &str) -> String {
    format!(
        "=SUMPRODUCT(--EXACT({}:{},\"{}\"))",
        range.start,
        range.end,
        status.replace('"', "\"\"")
    )
}

/// Percentage of `total` that `count` represents, 0 when the count is 0
pub fn percentage_formula(count: &CellAddress, total: &CellAddress) -> String {
    format!("=IF({count}=0,0,{count}/{total}*100)")
}

/// Styles used inside the block
#[derive(Debug, Clone)]
pub struct SummaryStyles {
    pub title: Style,
    pub header: Style,
    pub total: Style,
    /// One highlight per status, in block order
    pub statuses: Vec<Style>,
}

impl SummaryStyles {
    pub fn new(statuses: Vec<Style>) -> Self {
        let heading = Style::new()
            .bold(true)
            .horizontal_alignment(HorizontalAlignment::Center);
        Self {
            title: heading.clone(),
            header: heading.clone(),
            total: heading,
            statuses,
        }
    }
}

/// Write the summary block for `statuses` into `sheet`
pub fn write_summary(
    sheet: &mut Worksheet,
    layout: &SummaryLayout,
    statuses: &[&str],
    styles: &SummaryStyles,
) -> Result<()> {
    let (status_col, count_col, pct_col) =
        (layout.status_col, layout.count_col(), layout.percentage_col());

    let title_row = layout.title_row();
    sheet.set_cell_value_at(title_row, status_col, "SUMMARY")?;
    let title_range = CellRange::from_indices(title_row, status_col, title_row, pct_col);
    sheet.set_range_style(&title_range, &styles.title)?;
    sheet.merge_cells(&title_range)?;

    let header_row = layout.header_row();
    for (col, label) in [(status_col, "Status"), (count_col, "Count"), (pct_col, "Percentage")] {
        sheet.set_cell_value_at(header_row, col, label)?;
        sheet.set_cell_style_at(header_row, col, &styles.header)?;
    }

    let range = layout.status_range();
    let total_cell = CellAddress::new(layout.total_row(), count_col);
    for (index, status) in statuses.iter().enumerate() {
        let row = layout.status_row(index);
        let count_cell = CellAddress::new(row, count_col);

        sheet.set_cell_value_at(row, status_col, *status)?;
        sheet.set_cell_formula_at(row, count_col, &count_formula(&range, status))?;
        sheet.set_cell_formula_at(row, pct_col, &percentage_formula(&count_cell, &total_cell))?;

        let highlight = styles.statuses.get(index).cloned().unwrap_or_default();
        sheet.set_cell_style_at(row, status_col, &highlight)?;
        sheet.set_cell_style_at(row, count_col, &highlight)?;
        sheet.set_cell_style_at(row, pct_col, &highlight.number_format(PERCENT_FORMAT))?;
    }

    let total_row = layout.total_row();
    sheet.set_cell_value_at(total_row, status_col, "TOTAL")?;
    sheet.set_cell_value_at(total_row, count_col, layout.data_rows)?;
    sheet.set_cell_value_at(total_row, pct_col, "100%")?;
    for col in [status_col, count_col, pct_col] {
        sheet.set_cell_style_at(total_row, col, &styles.total)?;
    }

    Ok(())
}
