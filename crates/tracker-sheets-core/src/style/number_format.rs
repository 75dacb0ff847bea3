//! Number format types

/// Number format for cell display
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NumberFormat {
    /// General format (default)
    #[default]
    General,

    /// Built-in format by ID
    BuiltIn(u32),

    /// Custom format string (e.g., `0.0"%"`)
    Custom(String),
}

impl NumberFormat {
    /// First id available to custom formats in an XLSX package
    pub const FIRST_CUSTOM_ID: u32 = 164;

    /// Create a number format from a format string
    pub fn from_string<S: Into<String>>(format: S) -> Self {
        NumberFormat::Custom(format.into())
    }

    /// Check for the general format
    pub fn is_general(&self) -> bool {
        matches!(self, NumberFormat::General | NumberFormat::BuiltIn(0))
    }
}
