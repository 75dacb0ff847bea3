//! Data validation
//!
//! Data validation restricts what a user may type into a range and can show
//! a prompt on selection and an alert on invalid input.
//!
//! ## Example
//!
//! ```rust
//! use tracker_sheets_core::{CellRange, DataValidation, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! let validation = DataValidation::list_of(["To Solve", "Solved", "Revisit"])
//!     .with_range(CellRange::parse("E2:E10").unwrap())
//!     .with_input_message("", "Select a status")
//!     .with_error_message("", "Choose from the list only");
//!
//! sheet.add_data_validation(validation);
//! ```

use crate::cell::CellRange;

/// Data validation rule for cells
#[derive(Debug, Clone, PartialEq)]
pub struct DataValidation {
    /// Type of validation
    pub validation_type: ValidationType,
    /// Cell ranges this validation applies to
    pub ranges: Vec<CellRange>,
    /// Allow blank/empty cells
    pub allow_blank: bool,
    /// Show the in-cell dropdown for list validation
    pub show_dropdown: bool,

    /// Show input message when cell is selected
    pub show_input_message: bool,
    /// Input message title
    pub input_title: Option<String>,
    /// Input message text
    pub input_message: Option<String>,

    /// Show error alert when invalid data entered
    pub show_error_alert: bool,
    /// Error alert style
    pub error_style: ValidationErrorStyle,
    /// Error alert title
    pub error_title: Option<String>,
    /// Error alert message
    pub error_message: Option<String>,
}

impl Default for DataValidation {
    fn default() -> Self {
        Self {
            validation_type: ValidationType::Custom {
                formula: "TRUE".into(),
            },
            ranges: Vec::new(),
            allow_blank: true,
            show_dropdown: true,
            show_input_message: false,
            input_title: None,
            input_message: None,
            show_error_alert: true,
            error_style: ValidationErrorStyle::Stop,
            error_title: None,
            error_message: None,
        }
    }
}

impl DataValidation {
    /// Create a list validation (dropdown)
    ///
    /// `source` is either a comma-separated list of values ("Yes,No") or a
    /// range reference starting with `=` ("=Lists!$A$1:$A$3").
    pub fn list(source: impl Into<String>) -> Self {
        Self {
            validation_type: ValidationType::List {
                source: source.into(),
            },
            ..Self::default()
        }
    }

    /// Create a list validation from individual values
    pub fn list_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let source = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        Self::list(source)
    }

    /// Add a cell range to this validation
    pub fn with_range(mut self, range: CellRange) -> Self {
        self.ranges.push(range);
        self
    }

    /// Set an input message (shown when cell is selected); an empty title is omitted
    pub fn with_input_message(
        mut self,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.show_input_message = true;
        self.input_title = non_empty(title.into());
        self.input_message = Some(message.into());
        self
    }

    /// Set an error message (shown when invalid data entered); an empty title is omitted
    pub fn with_error_message(
        mut self,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.show_error_alert = true;
        self.error_title = non_empty(title.into());
        self.error_message = Some(message.into());
        self
    }

    /// Check if this validation applies to a specific cell
    pub fn applies_to(&self, row: u32, col: u16) -> bool {
        self.ranges.iter().any(|r| r.contains(row, col))
    }

    /// Inline list values, if this is a comma-separated list validation
    pub fn list_values(&self) -> Option<Vec<&str>> {
        match &self.validation_type {
            ValidationType::List { source } if !source.starts_with('=') => {
                Some(source.split(',').collect())
            }
            _ => None,
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Types of data validation
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationType {
    /// Must be from a list
    List {
        /// Either comma-separated values or a range reference
        source: String,
    },

    /// Custom formula validation
    Custom {
        /// Formula that returns TRUE/FALSE
        formula: String,
    },
}

impl ValidationType {
    /// Get the XLSX type string for this validation type
    pub fn xlsx_type(&self) -> &'static str {
        match self {
            ValidationType::List { .. } => "list",
            ValidationType::Custom { .. } => "custom",
        }
    }
}

/// Error alert styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationErrorStyle {
    /// Reject invalid data (default)
    #[default]
    Stop,
    /// Warn but allow
    Warning,
    /// Just inform
    Information,
}

impl ValidationErrorStyle {
    /// Get the XLSX error style string
    pub fn xlsx_style(&self) -> &'static str {
        match self {
            ValidationErrorStyle::Stop => "stop",
            ValidationErrorStyle::Warning => "warning",
            ValidationErrorStyle::Information => "information",
        }
    }

    /// Parse from XLSX style string
    pub fn from_xlsx(s: &str) -> Option<Self> {
        match s {
            "stop" => Some(ValidationErrorStyle::Stop),
            "warning" => Some(ValidationErrorStyle::Warning),
            "information" => Some(ValidationErrorStyle::Information),
            _ => None,
        }
    }
}
