//! # sheetcalc-core
//!
//! Workbook and worksheet model for the sheetcalc calculation-order engine.
//!
//! This crate provides the collaborator types the dependency-chain builder
//! traverses:
//! - [`CellAddress`] and [`CellRange`] - cell addressing with `$` anchors
//! - [`CellValue`] - cell contents, including literal and shared formulas
//! - [`Workbook`], [`Worksheet`] - the document structures
//! - [`NamedRange`] - symbolic names with sheet/workbook scoping
//! - [`Table`] - table geometry for structured references
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc_core::Workbook;
//!
//! let mut wb = Workbook::new();
//! let sheet = wb.add_sheet("Sheet1").unwrap();
//! let ws = wb.sheet_mut(sheet).unwrap();
//! ws.set_value("B1", 3.0).unwrap();
//! ws.set_formula("A1", "=B1+1").unwrap();
//! ```

pub mod cell;
pub mod error;
pub mod named_range;
pub mod shared;
pub mod table;
pub mod workbook;
pub mod worksheet;

// Re-exports for convenience
pub use cell::{split_sheet_prefix, CellAddress, CellRange, CellRangeIterator, CellValue};
pub use error::{Error, Result};
pub use named_range::{NameBody, NameScope, NamedRange, NamedRangeCollection};
pub use table::{Table, TableArea};
pub use workbook::Workbook;
pub use worksheet::{SharedFormula, Worksheet};

/// Maximum number of rows in a worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
