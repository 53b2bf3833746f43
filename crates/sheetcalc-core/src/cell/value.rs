//! Cell value types

use std::fmt;

/// Represents the value stored in a cell
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellValue {
    /// Empty cell (no value)
    Empty,

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),

    /// Numeric value
    Number(f64),

    /// String value
    Text(String),

    /// Formula stored as literal text (e.g., "=SUM(A1:A10)")
    Formula {
        /// Original formula text
        text: String,
    },

    /// Instance of a shared-formula template owned by the worksheet
    ///
    /// The per-cell formula text is materialized on demand by shifting the
    /// template's relative references from the template origin to this cell.
    Shared {
        /// Index into the worksheet's shared-formula table
        index: u32,
    },
}

impl CellValue {
    /// Create a new formula value
    pub fn formula<S: Into<String>>(text: S) -> Self {
        CellValue::Formula { text: text.into() }
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Check if the cell carries a formula (literal or shared instance)
    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula { .. } | CellValue::Shared { .. })
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Boolean(true) => write!(f, "TRUE"),
            CellValue::Boolean(false) => write!(f, "FALSE"),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Formula { text } => write!(f, "{}", text),
            CellValue::Shared { index } => write!(f, "<shared:{}>", index),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}
