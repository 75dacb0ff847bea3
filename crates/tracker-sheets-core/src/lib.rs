//! # tracker-sheets-core
//!
//! In-memory workbook model for the puzzle tracker.
//!
//! This crate holds everything a generated tracker workbook is made of:
//! - [`CellValue`] - cell contents (numbers, text, booleans, live formulas)
//! - [`CellAddress`] and [`CellRange`] - A1-style addressing
//! - [`Style`] - fonts, fills, alignment and number formats
//! - [`ConditionalFormatRule`] and [`DataValidation`] - per-range cell behaviour
//! - [`Workbook`], [`Worksheet`] - the document itself
//!
//! ## Example
//!
//! ```rust
//! use tracker_sheets_core::{CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let index = workbook.add_worksheet_with_name("Easy").unwrap();
//! let sheet = workbook.worksheet_mut(index).unwrap();
//!
//! sheet.set_cell_value("A1", "Q.No").unwrap();
//! sheet.set_cell_value_at(1, 0, CellValue::Number(1.0)).unwrap();
//! sheet.set_cell_formula("F4", "=SUMPRODUCT(--EXACT(E2:E2,\"Solved\"))").unwrap();
//! ```

pub mod cell;
pub mod conditional_format;
pub mod error;
pub mod style;
pub mod validation;
pub mod workbook;
pub mod worksheet;

pub use cell::{CellAddress, CellData, CellRange, CellValue};
pub use conditional_format::{CfOperator, CfRuleType, ConditionalFormatRule};
pub use error::{Error, Result};
pub use validation::{DataValidation, ValidationErrorStyle, ValidationType};
pub use workbook::Workbook;
pub use worksheet::{FreezePanes, Worksheet};

pub use style::{
    Alignment, Color, FillStyle, FontStyle, HorizontalAlignment, NumberFormat, Style, StylePool,
    VerticalAlignment,
};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
