//! Worksheet type

use std::collections::BTreeMap;

use crate::cell::{CellAddress, CellData, CellRange, CellValue};
use crate::conditional_format::ConditionalFormatRule;
use crate::error::{Error, Result};
use crate::style::{Style, StylePool};
use crate::validation::DataValidation;
use crate::{MAX_COLS, MAX_ROWS};

/// Default column width in characters
pub const DEFAULT_COLUMN_WIDTH: f64 = 8.43;

/// A worksheet (single sheet in a workbook)
#[derive(Debug)]
pub struct Worksheet {
    /// Sheet name
    name: String,
    /// Cells keyed by (row, col); ordered so rows serialize top to bottom
    cells: BTreeMap<(u32, u16), CellData>,
    /// Cell styles referenced by `CellData::style_index`
    styles: StylePool,
    /// Column widths in characters
    column_widths: BTreeMap<u16, f64>,
    /// Merged regions
    merged_regions: Vec<CellRange>,
    /// Freeze pane settings
    freeze_panes: Option<FreezePanes>,
    /// Data validations
    data_validations: Vec<DataValidation>,
    /// Conditional formatting rules
    conditional_formats: Vec<ConditionalFormatRule>,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
            styles: StylePool::new(),
            column_widths: BTreeMap::new(),
            merged_regions: Vec::new(),
            freeze_panes: None,
            data_validations: Vec::new(),
            conditional_formats: Vec::new(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    // === Cell Access ===

    /// Get a cell by address string (e.g., "A1")
    pub fn cell(&self, address: &str) -> Result<Option<&CellData>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cell_at(addr.row, addr.col))
    }

    /// Get a cell by row and column indices
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellData> {
        self.cells.get(&(row, col))
    }

    /// Get cell value (convenience method)
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.get_value_at(addr.row, addr.col))
    }

    /// Get cell value by indices
    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cells
            .get(&(row, col))
            .map(|c| c.value.clone())
            .unwrap_or(CellValue::Empty)
    }

    /// Get a cell's style index by row/column.
    ///
    /// Returns 0 if the cell does not exist or has the default style.
    pub fn cell_style_index_at(&self, row: u32, col: u16) -> u32 {
        self.cells.get(&(row, col)).map(|c| c.style_index).unwrap_or(0)
    }

    /// Get a style by its index in this worksheet's style pool.
    pub fn style_by_index(&self, style_index: u32) -> Option<&Style> {
        self.styles.get(style_index)
    }

    /// Get the non-default style applied to a cell, if any.
    pub fn cell_style_at(&self, row: u32, col: u16) -> Option<&Style> {
        match self.cell_style_index_at(row, col) {
            0 => None,
            idx => self.style_by_index(idx),
        }
    }

    /// Get the non-default style applied to a cell by address, if any.
    pub fn cell_style(&self, address: &str) -> Result<Option<&Style>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cell_style_at(addr.row, addr.col))
    }

    // === Cell Modification ===

    /// Set a cell value by address string
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    /// Set a cell value by row and column indices
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        self.validate_cell_position(row, col)?;
        self.cells.entry((row, col)).or_default().value = value.into();
        Ok(())
    }

    /// Set a cell formula by address string
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_formula_at(addr.row, addr.col, formula)
    }

    /// Set a cell formula by row and column indices
    pub fn set_cell_formula_at(&mut self, row: u32, col: u16, formula: &str) -> Result<()> {
        self.set_cell_value_at(row, col, CellValue::formula(formula))
    }

    /// Set a cell style by address string
    pub fn set_cell_style(&mut self, address: &str, style: &Style) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_style_at(addr.row, addr.col, style)
    }

    /// Set a cell style by row and column indices
    pub fn set_cell_style_at(&mut self, row: u32, col: u16, style: &Style) -> Result<()> {
        self.validate_cell_position(row, col)?;
        let style_index = self.styles.get_or_insert(style.clone());
        self.cells.entry((row, col)).or_default().style_index = style_index;
        Ok(())
    }

    /// Apply a style to every cell of a range
    pub fn set_range_style(&mut self, range: &CellRange, style: &Style) -> Result<()> {
        for addr in range.cells() {
            self.set_cell_style_at(addr.row, addr.col, style)?;
        }
        Ok(())
    }

    /// Get the used range (bounds of all non-empty cells)
    pub fn used_range(&self) -> Option<CellRange> {
        let mut cells = self.cells.iter().filter(|(_, c)| !c.is_empty());
        let (&(first_row, first_col), _) = cells.next()?;
        let (mut min_col, mut max_row, mut max_col) = (first_col, first_row, first_col);
        for (&(row, col), _) in cells {
            min_col = min_col.min(col);
            max_col = max_col.max(col);
            max_row = max_row.max(row);
        }
        Some(CellRange::from_indices(first_row, min_col, max_row, max_col))
    }

    // === Columns ===

    /// Get column width
    pub fn column_width(&self, col: u16) -> f64 {
        self.column_widths
            .get(&col)
            .copied()
            .unwrap_or(DEFAULT_COLUMN_WIDTH)
    }

    /// Set column width
    pub fn set_column_width(&mut self, col: u16, width: f64) {
        self.column_widths.insert(col, width);
    }

    /// Get all custom column widths (column index → width in characters).
    pub fn custom_column_widths(&self) -> &BTreeMap<u16, f64> {
        &self.column_widths
    }

    // === Merged Cells ===

    /// Get merged regions
    pub fn merged_regions(&self) -> &[CellRange] {
        &self.merged_regions
    }

    /// Merge cells
    pub fn merge_cells(&mut self, range: &CellRange) -> Result<()> {
        if self.merged_regions.iter().any(|existing| range.overlaps(existing)) {
            return Err(Error::MergedCellConflict(range.to_string()));
        }
        self.merged_regions.push(*range);
        Ok(())
    }

    // === Freeze Panes ===

    /// Get freeze pane settings
    pub fn freeze_panes(&self) -> Option<&FreezePanes> {
        self.freeze_panes.as_ref()
    }

    /// Set freeze panes; `row`/`col` are the first unfrozen row and column
    pub fn set_freeze_panes(&mut self, row: u32, col: u16) {
        if row == 0 && col == 0 {
            self.freeze_panes = None;
        } else {
            self.freeze_panes = Some(FreezePanes { row, col });
        }
    }

    // === Data Validation ===

    /// Add a data validation rule
    pub fn add_data_validation(&mut self, validation: DataValidation) {
        self.data_validations.push(validation);
    }

    /// Get all data validations
    pub fn data_validations(&self) -> &[DataValidation] {
        &self.data_validations
    }

    /// Get the data validation that applies to a cell, if any
    pub fn data_validation_at(&self, row: u32, col: u16) -> Option<&DataValidation> {
        self.data_validations
            .iter()
            .find(|dv| dv.applies_to(row, col))
    }

    // === Conditional Formatting ===

    /// Add a conditional formatting rule
    pub fn add_conditional_format(&mut self, rule: ConditionalFormatRule) {
        self.conditional_formats.push(rule);
    }

    /// Get all conditional formatting rules
    pub fn conditional_formats(&self) -> &[ConditionalFormatRule] {
        &self.conditional_formats
    }

    /// Get all rules that apply to a cell, in priority order
    pub fn conditional_formats_at(&self, row: u32, col: u16) -> Vec<&ConditionalFormatRule> {
        let mut rules: Vec<_> = self
            .conditional_formats
            .iter()
            .filter(|r| r.applies_to(row, col))
            .collect();
        rules.sort_by_key(|r| r.priority);
        rules
    }

    // === Helper Methods ===

    fn validate_cell_position(&self, row: u32, col: u16) -> Result<()> {
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }
        if col >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(col as u32, MAX_COLS - 1));
        }
        Ok(())
    }

    /// Get the number of stored cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Check if the worksheet is empty
    pub fn is_empty(&self) -> bool {
        self.cells.values().all(CellData::is_empty)
    }

    /// Iterate over all stored cells in row-major order
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.cells.iter().map(|(&(row, col), cell)| (row, col, cell))
    }

    /// Iterate over all formula cells: (row, col, formula_text)
    pub fn formula_cells(&self) -> impl Iterator<Item = (u32, u16, &str)> {
        self.iter_cells()
            .filter_map(|(row, col, cell)| cell.value.formula_text().map(|f| (row, col, f)))
    }

    /// Get the worksheet's style pool
    pub fn style_pool(&self) -> &StylePool {
        &self.styles
    }
}

/// Freeze pane settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezePanes {
    /// Freeze row (first unfrozen row)
    pub row: u32,
    /// Freeze column (first unfrozen column)
    pub col: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;

    #[test]
    fn test_new_worksheet() {
        let ws = Worksheet::new("Easy");
        assert_eq!(ws.name(), "Easy");
        assert!(ws.is_empty());
        assert!(ws.freeze_panes().is_none());
    }

    #[test]
    fn test_set_cell_values() {
        let mut ws = Worksheet::new("Test");

        ws.set_cell_value("A1", "Q.No").unwrap();
        ws.set_cell_value("A2", 1.0).unwrap();
        ws.set_cell_value("B2", true).unwrap();

        assert_eq!(ws.get_value("A1").unwrap().as_string(), Some("Q.No"));
        assert_eq!(ws.get_value("A2").unwrap().as_number(), Some(1.0));
        assert_eq!(ws.get_value_at(1, 1), CellValue::Boolean(true));
        assert_eq!(ws.get_value_at(9, 9), CellValue::Empty);
    }

    #[test]
    fn test_set_cell_formula() {
        let mut ws = Worksheet::new("Test");

        ws.set_cell_formula("F5", "SUMPRODUCT(--EXACT(E2:E3,\"Solved\"))")
            .unwrap();

        let value = ws.get_value("F5").unwrap();
        assert!(value.is_formula());
        assert_eq!(
            value.formula_text(),
            Some("=SUMPRODUCT(--EXACT(E2:E3,\"Solved\"))")
        );
        assert_eq!(ws.formula_cells().count(), 1);
    }

    #[test]
    fn test_style_keeps_value() {
        let mut ws = Worksheet::new("Test");
        let bold = Style::new().bold(true);

        ws.set_cell_value("A1", "Title").unwrap();
        ws.set_cell_style("A1", &bold).unwrap();
        ws.set_cell_style("B1", &bold).unwrap();

        assert_eq!(ws.get_value("A1").unwrap().as_string(), Some("Title"));
        assert_eq!(ws.cell_style("A1").unwrap(), Some(&bold));
        assert_eq!(ws.cell_style_index_at(0, 0), ws.cell_style_index_at(0, 1));
        assert_eq!(ws.style_pool().len(), 2);
    }

    #[test]
    fn test_set_range_style() {
        let mut ws = Worksheet::new("Test");
        let fill = Style::new().fill_color(Color::RED);

        ws.set_range_style(&CellRange::parse("E5:G5").unwrap(), &fill)
            .unwrap();

        assert_eq!(ws.cell_style_at(4, 4), Some(&fill));
        assert_eq!(ws.cell_style_at(4, 6), Some(&fill));
        assert_eq!(ws.cell_style_at(4, 7), None);
    }

    #[test]
    fn test_used_range() {
        let mut ws = Worksheet::new("Test");
        assert!(ws.used_range().is_none());

        ws.set_cell_value("B2", 1.0).unwrap();
        ws.set_cell_value("D5", 2.0).unwrap();
        ws.set_cell_value("A3", 3.0).unwrap();

        assert_eq!(ws.used_range(), Some(CellRange::parse("A2:D5").unwrap()));
    }

    #[test]
    fn test_column_width() {
        let mut ws = Worksheet::new("Test");
        assert_eq!(ws.column_width(3), DEFAULT_COLUMN_WIDTH);

        ws.set_column_width(3, 50.0);
        assert_eq!(ws.column_width(3), 50.0);
        assert_eq!(ws.custom_column_widths().len(), 1);
    }

    #[test]
    fn test_merge_conflict() {
        let mut ws = Worksheet::new("Test");
        ws.merge_cells(&CellRange::parse("E4:G4").unwrap()).unwrap();

        let err = ws.merge_cells(&CellRange::parse("F4:F6").unwrap());
        assert!(matches!(err, Err(Error::MergedCellConflict(_))));
        assert_eq!(ws.merged_regions().len(), 1);
    }

    #[test]
    fn test_freeze_panes() {
        let mut ws = Worksheet::new("Test");
        ws.set_freeze_panes(1, 0);
        assert_eq!(ws.freeze_panes(), Some(&FreezePanes { row: 1, col: 0 }));

        ws.set_freeze_panes(0, 0);
        assert!(ws.freeze_panes().is_none());
    }

    #[test]
    fn test_out_of_bounds() {
        let mut ws = Worksheet::new("Test");
        assert!(matches!(
            ws.set_cell_value_at(MAX_ROWS, 0, 1.0),
            Err(Error::RowOutOfBounds(..))
        ));
        assert!(matches!(
            ws.set_cell_value_at(0, MAX_COLS, 1.0),
            Err(Error::ColumnOutOfBounds(..))
        ));
    }

    #[test]
    fn test_rules_at_cell() {
        let mut ws = Worksheet::new("Test");
        let range = CellRange::parse("E2:E4").unwrap();
        ws.add_conditional_format(
            ConditionalFormatRule::expression("B").with_range(range).with_priority(2),
        );
        ws.add_conditional_format(
            ConditionalFormatRule::expression("A").with_range(range).with_priority(1),
        );
        ws.add_data_validation(DataValidation::list("X,Y").with_range(range));

        let rules = ws.conditional_formats_at(2, 4);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].priority, 1);
        assert!(ws.data_validation_at(2, 4).is_some());
        assert!(ws.data_validation_at(0, 4).is_none());
    }
}
