//! Named range definitions
//!
//! Named ranges bind a symbolic identifier to a formula, a static value, or
//! an address, scoped either to one sheet or to the whole workbook.
//!
//! # Example
//!
//! ```text
//! // Define a name "TaxRate" that refers to cell B1
//! workbook.define_name("TaxRate", "Sheet1!$B$1")?;
//!
//! // Use it in a formula
//! =Price * TaxRate
//! ```

use std::collections::HashMap;

/// Scope of a named range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NameScope {
    /// Available throughout the workbook (global)
    Workbook,
    /// Scoped to a specific sheet (local)
    Sheet(usize),
}

/// Classification of what a name's body refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameBody<'a> {
    /// A formula expression (body starts with `=`), given without the `=`
    Formula(&'a str),
    /// A static literal (number, quoted string, TRUE/FALSE); nothing to schedule
    Constant,
    /// An address body, possibly sheet-qualified and possibly relative
    Address(&'a str),
}

/// A named range definition
///
/// Names are case-insensitive. The body (`refers_to`) is stored as text and
/// classified on demand:
/// - `Sheet1!$A$1` or `$A$1:$D$10` - address
/// - `0.0725` or `"label"` or `TRUE` - static value
/// - `=SUM(Sales)` - formula
#[derive(Debug, Clone)]
pub struct NamedRange {
    /// The name (e.g., "SalesData", "TaxRate")
    pub name: String,
    /// Scope of this name (workbook-wide or sheet-specific)
    pub scope: NameScope,
    /// What the name refers to, stored as text
    pub refers_to: String,
    /// Stable index assigned at definition time, used as the name's identity
    /// in dependency-chain nodes
    pub index: u32,
    /// Whether this name is hidden from the UI
    pub hidden: bool,
}

impl NamedRange {
    /// Classify the body of this name
    pub fn body(&self) -> NameBody<'_> {
        let text = self.refers_to.trim();
        if let Some(expr) = text.strip_prefix('=') {
            return NameBody::Formula(expr);
        }
        if text.parse::<f64>().is_ok()
            || text.starts_with('"')
            || text.eq_ignore_ascii_case("TRUE")
            || text.eq_ignore_ascii_case("FALSE")
        {
            return NameBody::Constant;
        }
        NameBody::Address(text)
    }

    /// Check if the body is a formula (starts with =)
    pub fn is_formula(&self) -> bool {
        matches!(self.body(), NameBody::Formula(_))
    }

    /// The sheet this name is anchored to, if sheet-scoped
    pub fn anchor_sheet(&self) -> Option<usize> {
        match self.scope {
            NameScope::Sheet(idx) => Some(idx),
            NameScope::Workbook => None,
        }
    }
}

/// Collection of named ranges
///
/// Insertion-ordered so that chain seeding is deterministic, with a
/// case-insensitive lookup index on the side. Each name keeps the stable
/// index it was assigned at definition time.
#[derive(Debug, Default, Clone)]
pub struct NamedRangeCollection {
    entries: Vec<NamedRange>,
    lookup: HashMap<String, usize>,
}

impl NamedRangeCollection {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self::default()
    }

    fn make_key(name: &str, scope: NameScope) -> String {
        let name_lower = name.to_lowercase();
        match scope {
            NameScope::Workbook => name_lower,
            NameScope::Sheet(idx) => format!("{}:sheet:{}", name_lower, idx),
        }
    }

    /// Define a new named range; errors if the name already exists in scope
    pub fn define(
        &mut self,
        name: impl Into<String>,
        refers_to: impl Into<String>,
        scope: NameScope,
    ) -> Result<u32, String> {
        let name = name.into();
        let key = Self::make_key(&name, scope);
        if self.lookup.contains_key(&key) {
            return Err(format!("Named range '{}' already exists in this scope", name));
        }

        let index = self.entries.len() as u32;
        self.entries.push(NamedRange {
            name,
            scope,
            refers_to: refers_to.into(),
            index,
            hidden: false,
        });
        self.lookup.insert(key, index as usize);
        Ok(index)
    }

    /// Get a name following the scoping rules: sheet-scoped for the current
    /// sheet first, then workbook-scoped
    pub fn get(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        let sheet_key = Self::make_key(name, NameScope::Sheet(current_sheet));
        if let Some(&ix) = self.lookup.get(&sheet_key) {
            return Some(&self.entries[ix]);
        }
        let workbook_key = Self::make_key(name, NameScope::Workbook);
        self.lookup.get(&workbook_key).map(|&ix| &self.entries[ix])
    }

    /// Get a name by exact scope
    pub fn get_scoped(&self, name: &str, scope: NameScope) -> Option<&NamedRange> {
        let key = Self::make_key(name, scope);
        self.lookup.get(&key).map(|&ix| &self.entries[ix])
    }

    /// Get a name by its stable index
    pub fn get_by_index(&self, index: u32) -> Option<&NamedRange> {
        self.entries.get(index as usize)
    }

    /// Iterate over all names in definition order
    pub fn iter(&self) -> impl Iterator<Item = &NamedRange> {
        self.entries.iter()
    }

    /// All workbook-scoped names, in definition order
    pub fn workbook_names(&self) -> impl Iterator<Item = &NamedRange> {
        self.entries
            .iter()
            .filter(|n| n.scope == NameScope::Workbook)
    }

    /// All names scoped to a specific sheet, in definition order
    pub fn sheet_names(&self, sheet_index: usize) -> impl Iterator<Item = &NamedRange> {
        self.entries
            .iter()
            .filter(move |n| n.scope == NameScope::Sheet(sheet_index))
    }

    /// Number of defined names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_classification() {
        let mut coll = NamedRangeCollection::new();
        coll.define("Rate", "$C$1", NameScope::Workbook).unwrap();
        coll.define("Tax", "0.0725", NameScope::Workbook).unwrap();
        coll.define("Total", "=SUM(A1:A10)", NameScope::Workbook)
            .unwrap();
        coll.define("Flag", "TRUE", NameScope::Workbook).unwrap();

        assert_eq!(
            coll.get("Rate", 0).unwrap().body(),
            NameBody::Address("$C$1")
        );
        assert_eq!(coll.get("Tax", 0).unwrap().body(), NameBody::Constant);
        assert_eq!(
            coll.get("Total", 0).unwrap().body(),
            NameBody::Formula("SUM(A1:A10)")
        );
        assert_eq!(coll.get("Flag", 0).unwrap().body(), NameBody::Constant);
    }

    #[test]
    fn test_scope_precedence() {
        let mut coll = NamedRangeCollection::new();
        coll.define("Rate", "0.05", NameScope::Workbook).unwrap();
        coll.define("Rate", "0.08", NameScope::Sheet(0)).unwrap();

        // Sheet 0 sees the sheet-scoped version, sheet 1 the global one
        assert_eq!(coll.get("Rate", 0).unwrap().refers_to, "0.08");
        assert_eq!(coll.get("Rate", 1).unwrap().refers_to, "0.05");
    }

    #[test]
    fn test_case_insensitive_and_duplicates() {
        let mut coll = NamedRangeCollection::new();
        coll.define("TaxRate", "0.05", NameScope::Workbook).unwrap();

        assert!(coll.get("taxrate", 0).is_some());
        assert!(coll.get("TAXRATE", 0).is_some());
        assert!(coll
            .define("TAXRATE", "0.10", NameScope::Workbook)
            .is_err());
    }

    #[test]
    fn test_stable_indices() {
        let mut coll = NamedRangeCollection::new();
        let a = coll.define("A", "$A$1", NameScope::Workbook).unwrap();
        let b = coll.define("B", "$B$1", NameScope::Sheet(2)).unwrap();

        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(coll.get_by_index(b).unwrap().name, "B");
        assert_eq!(coll.get_by_index(b).unwrap().anchor_sheet(), Some(2));
    }
}
