//! Cell-related types
//!
//! - [`CellValue`] - the value stored in a cell
//! - [`CellAddress`] / [`CellRange`] - A1-style locations
//! - [`CellData`] - value plus style index

mod address;
mod value;

pub use address::{CellAddress, CellRange};
pub use value::CellValue;

/// Complete data for a single cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellData {
    /// The cell's value
    pub value: CellValue,
    /// Index into the worksheet's style pool (0 = default style)
    pub style_index: u32,
}

impl CellData {
    /// Create a new cell with a value and default style
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            style_index: 0,
        }
    }

    /// Check if this cell carries neither a value nor a style
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.style_index == 0
    }
}

impl Default for CellData {
    fn default() -> Self {
        Self::new(CellValue::Empty)
    }
}
