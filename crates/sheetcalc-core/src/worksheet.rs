//! Worksheet type

use crate::cell::{CellAddress, CellRange, CellValue};
use crate::error::{Error, Result};
use crate::shared::shift_references;
use crate::{MAX_COLS, MAX_ROWS};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// A shared-formula template anchored at an origin cell
#[derive(Debug, Clone)]
pub struct SharedFormula {
    /// Template formula text as stored at the origin
    pub text: String,
    /// The cell the template is anchored at
    pub origin: CellAddress,
}

/// A single worksheet
///
/// Cells are stored row-major in a `BTreeMap` so that enumeration order is
/// deterministic, which the dependency-chain builder relies on for
/// reproducible calculation orders.
#[derive(Debug, Clone)]
pub struct Worksheet {
    name: String,
    is_chart: bool,
    cells: BTreeMap<(u32, u16), CellValue>,
    shared_formulas: Vec<SharedFormula>,
}

impl Worksheet {
    /// Create a new empty worksheet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_chart: false,
            cells: BTreeMap::new(),
            shared_formulas: Vec::new(),
        }
    }

    /// Create a chart sheet (carries no formula cells of its own and is
    /// skipped by workbook-wide chain builds)
    pub fn new_chart(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_chart: true,
            cells: BTreeMap::new(),
            shared_formulas: Vec::new(),
        }
    }

    /// The sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the sheet
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Whether this is a chart sheet
    pub fn is_chart(&self) -> bool {
        self.is_chart
    }

    fn validate_position(row: u32, col: u16) -> Result<()> {
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }
        if col >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
        }
        Ok(())
    }

    /// Set a cell value by A1-style address
    pub fn set_value<V: Into<CellValue>>(&mut self, addr: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(addr)?;
        self.set_value_at(addr.row, addr.col, value)
    }

    /// Set a cell value by row/column indices
    pub fn set_value_at<V: Into<CellValue>>(&mut self, row: u32, col: u16, value: V) -> Result<()> {
        Self::validate_position(row, col)?;
        let value = value.into();
        if value.is_empty() {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), value);
        }
        Ok(())
    }

    /// Set a formula by A1-style address
    pub fn set_formula(&mut self, addr: &str, text: impl Into<String>) -> Result<()> {
        self.set_value(addr, CellValue::formula(text.into()))
    }

    /// Define a shared formula over a range.
    ///
    /// The template is anchored at the range's top-left cell; every cell in
    /// the range becomes an instance expanded on demand via relative offset
    /// substitution.
    pub fn set_shared_formula(&mut self, range: &str, text: impl Into<String>) -> Result<()> {
        let range = CellRange::parse(range)?;
        let index = self.shared_formulas.len() as u32;
        self.shared_formulas.push(SharedFormula {
            text: text.into(),
            origin: CellAddress::new(range.start.row, range.start.col),
        });
        for (row, col) in range.cells() {
            self.cells.insert((row, col), CellValue::Shared { index });
        }
        Ok(())
    }

    /// Get a cell's value, if the cell exists
    pub fn value_at(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells.get(&(row, col))
    }

    /// Check whether a cell is empty (absent or explicitly empty)
    pub fn is_empty_at(&self, row: u32, col: u16) -> bool {
        self.cells
            .get(&(row, col))
            .map(|v| v.is_empty())
            .unwrap_or(true)
    }

    /// The formula text at a cell, materializing shared instances.
    ///
    /// Shared instances borrow when the cell is the template origin and
    /// allocate only when references actually shift.
    pub fn formula_text_at(&self, row: u32, col: u16) -> Option<Cow<'_, str>> {
        match self.cells.get(&(row, col))? {
            CellValue::Formula { text } => Some(Cow::Borrowed(text)),
            CellValue::Shared { index } => {
                let shared = self.shared_formulas.get(*index as usize)?;
                let dr = row as i64 - shared.origin.row as i64;
                let dc = col as i64 - shared.origin.col as i64;
                if dr == 0 && dc == 0 {
                    Some(Cow::Borrowed(&shared.text))
                } else {
                    Some(Cow::Owned(shift_references(&shared.text, dr, dc)))
                }
            }
            _ => None,
        }
    }

    /// Replace a cell's stored value, returning the previous one.
    ///
    /// Used by the chain builder to install a placeholder formula around a
    /// dynamic-address evaluation; callers must restore the returned value.
    pub fn replace_cell_value(&mut self, row: u32, col: u16, value: CellValue) -> Option<CellValue> {
        self.cells.insert((row, col), value)
    }

    /// Remove a cell entirely
    pub fn clear_cell(&mut self, row: u32, col: u16) -> Option<CellValue> {
        self.cells.remove(&(row, col))
    }

    /// Iterate over all formula-bearing cell positions, row-major
    pub fn formula_cells(&self) -> impl Iterator<Item = (u32, u16)> + '_ {
        self.cells
            .iter()
            .filter(|(_, v)| v.is_formula())
            .map(|(&(row, col), _)| (row, col))
    }

    /// Iterate over formula-bearing cell positions inside a range, row-major
    pub fn formula_cells_in(&self, range: CellRange) -> impl Iterator<Item = (u32, u16)> + '_ {
        self.cells
            .range((range.start.row, 0)..=(range.end.row, u16::MAX))
            .filter(move |(&(row, col), v)| v.is_formula() && range.contains(row, col))
            .map(|(&(row, col), _)| (row, col))
    }

    /// The bounding range of all non-empty cells, if any
    pub fn used_range(&self) -> Option<CellRange> {
        let mut iter = self.cells.keys();
        let &(first_row, first_col) = iter.next()?;
        let (mut min_row, mut max_row) = (first_row, first_row);
        let (mut min_col, mut max_col) = (first_col, first_col);
        for &(row, col) in iter {
            min_row = min_row.min(row);
            max_row = max_row.max(row);
            min_col = min_col.min(col);
            max_col = max_col.max(col);
        }
        Some(CellRange::from_indices(min_row, min_col, max_row, max_col))
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}
