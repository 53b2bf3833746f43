//! Workbook type - the main document structure

use crate::error::{Error, Result};
use crate::named_range::{NameScope, NamedRange, NamedRangeCollection};
use crate::table::Table;
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// A workbook: ordered worksheets plus workbook-level names and tables
#[derive(Debug, Default)]
pub struct Workbook {
    worksheets: Vec<Worksheet>,
    named_ranges: NamedRangeCollection,
    tables: Vec<Table>,
}

impl Workbook {
    /// Create a new empty workbook with no worksheets
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Get a worksheet by index
    pub fn sheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Get a mutable worksheet by index
    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    /// Find a sheet index by name (case-insensitive, as in formulas)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.worksheets
            .iter()
            .position(|ws| ws.name().eq_ignore_ascii_case(name))
    }

    /// Iterate over all worksheets in order
    pub fn sheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Add a new worksheet, returning its index
    pub fn add_sheet(&mut self, name: &str) -> Result<usize> {
        self.validate_sheet_name(name)?;
        self.worksheets.push(Worksheet::new(name));
        Ok(self.worksheets.len() - 1)
    }

    /// Add a chart sheet, returning its index
    pub fn add_chart_sheet(&mut self, name: &str) -> Result<usize> {
        self.validate_sheet_name(name)?;
        self.worksheets.push(Worksheet::new_chart(name));
        Ok(self.worksheets.len() - 1)
    }

    // ==================== Named ranges ====================

    /// Define a workbook-scoped name
    pub fn define_name(&mut self, name: &str, refers_to: &str) -> Result<()> {
        self.named_ranges
            .define(name, refers_to, NameScope::Workbook)
            .map(|_| ())
            .map_err(Error::InvalidName)
    }

    /// Define a sheet-scoped name
    pub fn define_name_for_sheet(
        &mut self,
        name: &str,
        refers_to: &str,
        sheet_index: usize,
    ) -> Result<()> {
        if sheet_index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(sheet_index, self.worksheets.len()));
        }
        self.named_ranges
            .define(name, refers_to, NameScope::Sheet(sheet_index))
            .map(|_| ())
            .map_err(Error::InvalidName)
    }

    /// Look up a name following the scoping rules (sheet-local shadows global)
    pub fn named_range(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.named_ranges.get(name, current_sheet)
    }

    /// The named range collection
    pub fn named_ranges(&self) -> &NamedRangeCollection {
        &self.named_ranges
    }

    // ==================== Tables ====================

    /// Register a table; errors on a duplicate name
    pub fn add_table(&mut self, table: Table) -> Result<()> {
        if self.table(&table.name).is_some() {
            return Err(Error::InvalidTable(format!(
                "table '{}' already exists",
                table.name
            )));
        }
        if table.sheet >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(table.sheet, self.worksheets.len()));
        }
        self.tables.push(table);
        Ok(())
    }

    /// Look up a table by name (case-insensitive)
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("sheet name cannot be empty".into()));
        }
        if name.len() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }
        if self.sheet_index(name).is_some() {
            return Err(Error::DuplicateSheetName(name.into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellRange;

    #[test]
    fn test_sheet_lookup_case_insensitive() {
        let mut wb = Workbook::new();
        wb.add_sheet("Sheet1").unwrap();
        wb.add_sheet("Data").unwrap();

        assert_eq!(wb.sheet_index("data"), Some(1));
        assert_eq!(wb.sheet_index("SHEET1"), Some(0));
        assert_eq!(wb.sheet_index("Missing"), None);
    }

    #[test]
    fn test_duplicate_sheet_name() {
        let mut wb = Workbook::new();
        wb.add_sheet("Sheet1").unwrap();
        assert!(wb.add_sheet("sheet1").is_err());
        assert!(wb.add_sheet("").is_err());
    }

    #[test]
    fn test_chart_sheet() {
        let mut wb = Workbook::new();
        wb.add_sheet("Sheet1").unwrap();
        let idx = wb.add_chart_sheet("Chart1").unwrap();
        assert!(wb.sheet(idx).unwrap().is_chart());
    }

    #[test]
    fn test_table_lookup() {
        let mut wb = Workbook::new();
        wb.add_sheet("Sheet1").unwrap();
        wb.add_table(Table::new(
            "Sales",
            0,
            CellRange::parse("A1:C5").unwrap(),
            vec!["Region".into(), "Qty".into(), "Amount".into()],
        ))
        .unwrap();

        assert!(wb.table("sales").is_some());
        assert!(wb
            .add_table(Table::new(
                "SALES",
                0,
                CellRange::parse("E1:F2").unwrap(),
                vec![]
            ))
            .is_err());
    }
}
