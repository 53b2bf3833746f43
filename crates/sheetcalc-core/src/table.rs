//! Table geometry for structured references
//!
//! Only the geometry needed to rewrite a structured reference into absolute
//! row/column bounds lives here; table data is ordinary cell data on the
//! owning worksheet.

use crate::cell::CellRange;

/// Area selector inside a structured reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableArea {
    /// `[#All]` - headers, data and totals
    All,
    /// `[#Data]` - data rows only (the default when no selector is given)
    Data,
    /// `[#Headers]` - the header row
    Headers,
    /// `[#Totals]` - the totals row
    Totals,
    /// `[#This Row]` - the data row intersecting the calling cell
    ThisRow,
}

/// A table definition: name, owning sheet and current bounds
#[derive(Debug, Clone)]
pub struct Table {
    /// Table name (case-insensitive lookup)
    pub name: String,
    /// Index of the owning worksheet
    pub sheet: usize,
    /// Current bounds including header and totals rows when present
    pub range: CellRange,
    /// Column names, left to right
    pub columns: Vec<String>,
    /// Whether the first row of `range` is a header row
    pub header_row: bool,
    /// Whether the last row of `range` is a totals row
    pub totals_row: bool,
}

impl Table {
    /// Create a table with a header row and no totals row
    pub fn new(
        name: impl Into<String>,
        sheet: usize,
        range: CellRange,
        columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            sheet,
            range,
            columns,
            header_row: true,
            totals_row: false,
        }
    }

    /// The data rows (bounds minus header and totals rows), if any remain
    pub fn data_range(&self) -> Option<CellRange> {
        let mut start_row = self.range.start.row;
        let mut end_row = self.range.end.row;
        if self.header_row {
            start_row += 1;
        }
        if self.totals_row {
            end_row = end_row.checked_sub(1)?;
        }
        if start_row > end_row {
            return None;
        }
        Some(CellRange::from_indices(
            start_row,
            self.range.start.col,
            end_row,
            self.range.end.col,
        ))
    }

    /// Absolute column index for a named column
    pub fn column_index(&self, name: &str) -> Option<u16> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .map(|i| self.range.start.col + i as u16)
    }

    /// Rewrite a structured reference into absolute bounds.
    ///
    /// `first_col`/`last_col` restrict the span to one column or a column
    /// range; `ctx_row` anchors `#This Row` at the calling cell. Returns
    /// `None` when the selection is empty (no data rows, unknown column, or
    /// a `#This Row` outside the table).
    pub fn resolve(
        &self,
        area: TableArea,
        first_col: Option<&str>,
        last_col: Option<&str>,
        ctx_row: Option<u32>,
    ) -> Option<CellRange> {
        let rows = match area {
            TableArea::All => self.range,
            TableArea::Data => self.data_range()?,
            TableArea::Headers => {
                if !self.header_row {
                    return None;
                }
                CellRange::from_indices(
                    self.range.start.row,
                    self.range.start.col,
                    self.range.start.row,
                    self.range.end.col,
                )
            }
            TableArea::Totals => {
                if !self.totals_row {
                    return None;
                }
                CellRange::from_indices(
                    self.range.end.row,
                    self.range.start.col,
                    self.range.end.row,
                    self.range.end.col,
                )
            }
            TableArea::ThisRow => {
                let row = ctx_row?;
                let data = self.data_range()?;
                if row < data.start.row || row > data.end.row {
                    return None;
                }
                CellRange::from_indices(row, self.range.start.col, row, self.range.end.col)
            }
        };

        let (start_col, end_col) = match (first_col, last_col) {
            (None, _) => (rows.start.col, rows.end.col),
            (Some(first), None) => {
                let col = self.column_index(first)?;
                (col, col)
            }
            (Some(first), Some(last)) => {
                let a = self.column_index(first)?;
                let b = self.column_index(last)?;
                (a.min(b), a.max(b))
            }
        };

        Some(CellRange::from_indices(
            rows.start.row,
            start_col,
            rows.end.row,
            end_col,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        // A1:C5, header in row 1, data rows 2-5
        Table::new(
            "Sales",
            0,
            CellRange::parse("A1:C5").unwrap(),
            vec!["Region".into(), "Qty".into(), "Amount".into()],
        )
    }

    #[test]
    fn test_data_range_excludes_header() {
        let t = sample();
        assert_eq!(t.data_range().unwrap().to_a1_string(), "A2:C5");
    }

    #[test]
    fn test_resolve_column() {
        let t = sample();
        let r = t.resolve(TableArea::Data, Some("Qty"), None, None).unwrap();
        assert_eq!(r.to_a1_string(), "B2:B5");

        let r = t
            .resolve(TableArea::Data, Some("Qty"), Some("Amount"), None)
            .unwrap();
        assert_eq!(r.to_a1_string(), "B2:C5");
    }

    #[test]
    fn test_resolve_this_row() {
        let t = sample();
        let r = t
            .resolve(TableArea::ThisRow, Some("Amount"), None, Some(2))
            .unwrap();
        assert_eq!(r.to_a1_string(), "C3");

        // Header row is not a data row
        assert!(t
            .resolve(TableArea::ThisRow, Some("Amount"), None, Some(0))
            .is_none());
    }

    #[test]
    fn test_resolve_unknown_column() {
        let t = sample();
        assert!(t.resolve(TableArea::Data, Some("Nope"), None, None).is_none());
    }

    #[test]
    fn test_resolve_totals_absent() {
        let t = sample();
        assert!(t.resolve(TableArea::Totals, None, None, None).is_none());
    }
}
