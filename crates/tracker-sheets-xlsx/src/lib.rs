//! # tracker-sheets-xlsx
//!
//! XLSX (Office Open XML) writer for tracker-sheets workbooks, plus a reader
//! for the parts the writer emits.

pub mod error;
pub mod reader;
pub mod writer;

mod styles;

pub use error::{XlsxError, XlsxResult};
pub use reader::XlsxReader;
pub use writer::XlsxWriter;
