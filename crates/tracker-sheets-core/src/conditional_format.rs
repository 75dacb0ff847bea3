//! Conditional formatting
//!
//! A rule attaches a differential [`Style`] to one or more ranges; the
//! spreadsheet application applies it to each cell for which the rule holds.
//!
//! ## Example
//!
//! ```rust
//! use tracker_sheets_core::{CellRange, ConditionalFormatRule, Workbook};
//! use tracker_sheets_core::style::{Color, Style};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! // Case-sensitive match on the first cell of the range; the reference
//! // shifts with each cell the rule is applied to.
//! let rule = ConditionalFormatRule::expression("EXACT(E2,\"Solved\")")
//!     .with_range(CellRange::parse("E2:E20").unwrap())
//!     .with_format(Style::new().fill_color(Color::rgb(0, 176, 80)));
//!
//! sheet.add_conditional_format(rule);
//! ```

use crate::cell::CellRange;
use crate::style::Style;

/// A conditional formatting rule
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalFormatRule {
    /// Rule type
    pub rule_type: CfRuleType,
    /// Cell ranges this rule applies to
    pub ranges: Vec<CellRange>,
    /// Priority (lower = higher priority)
    pub priority: u32,
    /// Stop processing further rules if this one matches
    pub stop_if_true: bool,
    /// Format to apply when rule matches
    pub format: Option<Style>,
}

impl ConditionalFormatRule {
    /// Create a new conditional format rule
    pub fn new(rule_type: CfRuleType) -> Self {
        Self {
            rule_type,
            ranges: Vec::new(),
            priority: 1,
            stop_if_true: false,
            format: None,
        }
    }

    /// Highlight cells where a formula evaluates to TRUE
    pub fn expression(formula: impl Into<String>) -> Self {
        Self::new(CfRuleType::Expression {
            formula: formula.into(),
        })
    }

    /// Add a cell range to this rule
    pub fn with_range(mut self, range: CellRange) -> Self {
        self.ranges.push(range);
        self
    }

    /// Set the format to apply when rule matches
    pub fn with_format(mut self, style: Style) -> Self {
        self.format = Some(style);
        self
    }

    /// Set the priority (lower = higher priority)
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set whether to stop processing further rules if this one matches
    pub fn with_stop_if_true(mut self, stop: bool) -> Self {
        self.stop_if_true = stop;
        self
    }

    /// Check if this rule applies to a specific cell
    pub fn applies_to(&self, row: u32, col: u16) -> bool {
        self.ranges.iter().any(|r| r.contains(row, col))
    }
}

/// Types of conditional formatting rules
#[derive(Debug, Clone, PartialEq)]
pub enum CfRuleType {
    /// Cell value comparison (e.g., "equal to \"Solved\"")
    CellIs {
        operator: CfOperator,
        formula1: String,
        formula2: Option<String>,
    },

    /// Formula evaluates to TRUE, relative to the top-left cell of the range
    Expression { formula: String },
}

impl CfRuleType {
    /// Get the XLSX type string for this rule type
    pub fn xlsx_type(&self) -> &'static str {
        match self {
            CfRuleType::CellIs { .. } => "cellIs",
            CfRuleType::Expression { .. } => "expression",
        }
    }
}

/// Comparison operators for "cell is" rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfOperator {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    Between,
}

impl CfOperator {
    /// Get the XLSX operator string
    pub fn xlsx_operator(&self) -> &'static str {
        match self {
            CfOperator::Equal => "equal",
            CfOperator::NotEqual => "notEqual",
            CfOperator::GreaterThan => "greaterThan",
            CfOperator::LessThan => "lessThan",
            CfOperator::Between => "between",
        }
    }

    /// Parse from XLSX operator string
    pub fn from_xlsx(s: &str) -> Option<Self> {
        match s {
            "equal" => Some(CfOperator::Equal),
            "notEqual" => Some(CfOperator::NotEqual),
            "greaterThan" => Some(CfOperator::GreaterThan),
            "lessThan" => Some(CfOperator::LessThan),
            "between" => Some(CfOperator::Between),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;

    #[test]
    fn test_expression_rule() {
        let rule = ConditionalFormatRule::expression("EXACT(E2,\"Revisit\")")
            .with_range(CellRange::parse("E2:E10").unwrap())
            .with_priority(3);

        assert_eq!(rule.rule_type.xlsx_type(), "expression");
        assert_eq!(rule.priority, 3);
        assert_eq!(rule.ranges.len(), 1);
    }

    #[test]
    fn test_applies_to() {
        let rule = ConditionalFormatRule::expression("TRUE")
            .with_range(CellRange::parse("E2:E10").unwrap());

        assert!(rule.applies_to(1, 4)); // E2
        assert!(rule.applies_to(9, 4)); // E10
        assert!(!rule.applies_to(0, 4)); // E1 header
        assert!(!rule.applies_to(1, 5)); // F2
    }

    #[test]
    fn test_with_format() {
        let rule = ConditionalFormatRule::expression("TRUE")
            .with_format(Style::new().fill_color(Color::RED));
        assert_eq!(rule.format, Some(Style::new().fill_color(Color::RED)));
    }

    #[test]
    fn test_operator_strings() {
        assert_eq!(CfOperator::Equal.xlsx_operator(), "equal");
        assert_eq!(CfOperator::from_xlsx("between"), Some(CfOperator::Between));
        assert_eq!(CfOperator::from_xlsx("bogus"), None);
    }
}
