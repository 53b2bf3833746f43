//! Reference resolution
//!
//! Turns address, table-reference and name tokens into concrete sheet/range
//! targets. Resolution is total: anything that does not resolve (unknown
//! sheet, unknown table column, off-grid relative name body) yields `None`
//! and contributes no dependency edge.

use crate::node::NodeId;
use lazy_regex::regex_captures;
use sheetcalc_core::{
    split_sheet_prefix, CellAddress, CellRange, NameBody, NamedRange, TableArea, Workbook,
};

/// The cell a formula is being expanded for
#[derive(Debug, Clone, Copy)]
pub struct CellContext {
    /// Sheet the formula belongs to
    pub sheet: usize,
    /// Row of the calling cell
    pub row: u32,
    /// Column of the calling cell
    pub col: u16,
}

impl CellContext {
    /// Context for a formula cell node
    pub fn new(sheet: usize, row: u32, col: u16) -> Self {
        Self { sheet, row, col }
    }

    /// The node identity of the calling cell
    pub fn node_id(&self) -> NodeId {
        NodeId::Cell {
            sheet: self.sheet,
            row: self.row,
            col: self.col,
        }
    }
}

/// A resolved reference: a concrete range on a concrete sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressTarget {
    /// Sheet the range lives on
    pub sheet: usize,
    /// The resolved bounds
    pub range: CellRange,
    /// Whether the source text carried an explicit sheet qualifier
    pub explicit_sheet: bool,
}

/// What a name token resolved to
#[derive(Debug)]
pub enum NameTarget<'a> {
    /// The name's body is a formula to expand in the name's own context
    Formula {
        /// The resolved definition
        name: &'a NamedRange,
        /// Context sheet for expanding the body
        sheet: usize,
    },
    /// The name's body is an address
    Address(AddressTarget),
    /// The name's body is a static literal; nothing to schedule
    Constant,
}

/// Resolve an address token against the workbook.
///
/// Handles sheet qualifiers, plain cells, ranges, and whole-column spans
/// like `A:A` (clamped to the target sheet's used range). Unknown sheets
/// and empty column spans resolve to `None`.
pub fn resolve_address(workbook: &Workbook, ctx: CellContext, text: &str) -> Option<AddressTarget> {
    let (sheet_name, rest) = split_sheet_prefix(text);
    let explicit_sheet = sheet_name.is_some();
    let sheet = match sheet_name {
        Some(name) => workbook.sheet_index(&name)?,
        None => ctx.sheet,
    };

    if let Ok(range) = CellRange::parse(rest) {
        return Some(AddressTarget {
            sheet,
            range,
            explicit_sheet,
        });
    }

    // Whole-column span: clamp the rows to the sheet's used range
    let (_, first, last) = regex_captures!(r"^\$?([A-Za-z]{1,3}):\$?([A-Za-z]{1,3})$", rest)?;
    let a = CellAddress::letters_to_column(first).ok()?;
    let b = CellAddress::letters_to_column(last).ok()?;
    let used = workbook.sheet(sheet)?.used_range()?;
    Some(AddressTarget {
        sheet,
        range: CellRange::from_indices(used.start.row, a.min(b), used.end.row, a.max(b)),
        explicit_sheet,
    })
}

/// Resolve a table-structured reference like `Sales[Amount]` or
/// `Sales[[#This Row],[Qty]]`.
///
/// `#This Row` only anchors when the calling cell sits on the table's own
/// sheet; otherwise there is no current row and the reference is unresolved.
pub fn resolve_table_ref(
    workbook: &Workbook,
    ctx: CellContext,
    text: &str,
) -> Option<AddressTarget> {
    let bracket = text.find('[')?;
    let table = workbook.table(&text[..bracket])?;
    let spec = &text[bracket..];
    if !spec.starts_with('[') || !spec.ends_with(']') {
        return None;
    }
    let inner = spec[1..spec.len() - 1].trim();

    let mut area: Option<TableArea> = None;
    let mut first_col: Option<&str> = None;
    let mut last_col: Option<&str> = None;

    if inner.is_empty() {
        // Table[] selects the data body
    } else if !inner.starts_with('[') {
        // Single bare item: an area selector or a column name
        match parse_area(inner) {
            Some(a) => area = Some(a),
            None => first_col = Some(inner),
        }
    } else {
        // Multi-item spec: bracketed items separated by ',' or ':'
        let mut rest = inner;
        let mut span_follows = false;
        while !rest.is_empty() {
            let rest2 = rest.strip_prefix('[')?;
            let close = rest2.find(']')?;
            let item = rest2[..close].trim();
            rest = rest2[close + 1..].trim_start();

            if let Some(a) = parse_area(item) {
                area = Some(a);
            } else if span_follows && first_col.is_some() {
                last_col = Some(item);
            } else {
                first_col = Some(item);
            }

            span_follows = false;
            if let Some(r) = rest.strip_prefix(':') {
                span_follows = true;
                rest = r.trim_start();
            } else if let Some(r) = rest.strip_prefix(',') {
                rest = r.trim_start();
            } else if !rest.is_empty() {
                return None;
            }
        }
    }

    let area = area.unwrap_or(TableArea::Data);
    let ctx_row = if ctx.sheet == table.sheet {
        Some(ctx.row)
    } else {
        None
    };
    let range = table.resolve(area, first_col, last_col, ctx_row)?;
    Some(AddressTarget {
        sheet: table.sheet,
        range,
        explicit_sheet: true,
    })
}

fn parse_area(item: &str) -> Option<TableArea> {
    if item.eq_ignore_ascii_case("#All") {
        Some(TableArea::All)
    } else if item.eq_ignore_ascii_case("#Data") {
        Some(TableArea::Data)
    } else if item.eq_ignore_ascii_case("#Headers") {
        Some(TableArea::Headers)
    } else if item.eq_ignore_ascii_case("#Totals") {
        Some(TableArea::Totals)
    } else if item.eq_ignore_ascii_case("#This Row") || item == "@" {
        Some(TableArea::ThisRow)
    } else {
        None
    }
}

/// Resolve a name token following the scoping rules.
///
/// Precedence: explicit sheet qualifier, then a name scoped to the calling
/// sheet, then a workbook-global name. A sheet-scoped hit rebinds the
/// expansion context to its anchor sheet. Relative address bodies are
/// adjusted by the calling cell's position. External-workbook references
/// (`[Book2]Name`) never resolve.
pub fn resolve_name<'a>(
    workbook: &'a Workbook,
    ctx: CellContext,
    text: &str,
) -> Option<NameTarget<'a>> {
    if text.starts_with('[') {
        return None;
    }

    let (sheet_name, bare) = split_sheet_prefix(text);
    let named = match sheet_name {
        Some(ref qualifier) => {
            let idx = workbook.sheet_index(qualifier)?;
            let names = workbook.named_ranges();
            names
                .get_scoped(bare, sheetcalc_core::NameScope::Sheet(idx))
                .or_else(|| names.get_scoped(bare, sheetcalc_core::NameScope::Workbook))?
        }
        None => workbook.named_range(bare, ctx.sheet)?,
    };

    // A sheet-scoped name expands against its own sheet
    let anchor_sheet = named.anchor_sheet().unwrap_or(ctx.sheet);

    match named.body() {
        NameBody::Formula(_) => Some(NameTarget::Formula {
            name: named,
            sheet: anchor_sheet,
        }),
        NameBody::Constant => Some(NameTarget::Constant),
        NameBody::Address(body) => {
            let anchor_ctx = CellContext::new(anchor_sheet, ctx.row, ctx.col);
            let target = resolve_address(workbook, anchor_ctx, body)?;
            // Relative components of a name body are offsets from the
            // calling cell
            let start = target.range.start.offset(ctx.row as i64, ctx.col as i64)?;
            let end = target.range.end.offset(ctx.row as i64, ctx.col as i64)?;
            Some(NameTarget::Address(AddressTarget {
                sheet: target.sheet,
                range: CellRange::new(start, end),
                explicit_sheet: target.explicit_sheet,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetcalc_core::Table;

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        wb.add_sheet("Sheet1").unwrap();
        wb.add_sheet("Data").unwrap();
        wb
    }

    #[test]
    fn test_resolve_plain_and_qualified_address() {
        let wb = workbook();
        let ctx = CellContext::new(0, 0, 0);

        let t = resolve_address(&wb, ctx, "B2:C3").unwrap();
        assert_eq!(t.sheet, 0);
        assert!(!t.explicit_sheet);
        assert_eq!(t.range.to_a1_string(), "B2:C3");

        let t = resolve_address(&wb, ctx, "Data!A1").unwrap();
        assert_eq!(t.sheet, 1);
        assert!(t.explicit_sheet);

        assert!(resolve_address(&wb, ctx, "Missing!A1").is_none());
    }

    #[test]
    fn test_resolve_column_span_clamps_to_used_range() {
        let mut wb = workbook();
        let ws = wb.sheet_mut(0).unwrap();
        ws.set_value("A3", 1.0).unwrap();
        ws.set_value("B7", 2.0).unwrap();

        let ctx = CellContext::new(0, 0, 0);
        let t = resolve_address(&wb, ctx, "A:A").unwrap();
        assert_eq!(t.range.to_a1_string(), "A3:A7");

        // Empty sheet has no used range to clamp to
        assert!(resolve_address(&wb, ctx, "Data!A:A").is_none());
    }

    #[test]
    fn test_resolve_table_ref_forms() {
        let mut wb = workbook();
        wb.add_table(Table::new(
            "Sales",
            1,
            CellRange::parse("A1:C5").unwrap(),
            vec!["Region".into(), "Qty".into(), "Amount".into()],
        ))
        .unwrap();

        let ctx = CellContext::new(0, 0, 0);

        let t = resolve_table_ref(&wb, ctx, "Sales[Amount]").unwrap();
        assert_eq!(t.sheet, 1);
        assert_eq!(t.range.to_a1_string(), "C2:C5");

        let t = resolve_table_ref(&wb, ctx, "Sales[]").unwrap();
        assert_eq!(t.range.to_a1_string(), "A2:C5");

        let t = resolve_table_ref(&wb, ctx, "Sales[#All]").unwrap();
        assert_eq!(t.range.to_a1_string(), "A1:C5");

        let t = resolve_table_ref(&wb, ctx, "Sales[[#Headers],[Qty]]").unwrap();
        assert_eq!(t.range.to_a1_string(), "B1");

        let t = resolve_table_ref(&wb, ctx, "Sales[[Qty]:[Amount]]").unwrap();
        assert_eq!(t.range.to_a1_string(), "B2:C5");

        assert!(resolve_table_ref(&wb, ctx, "Sales[Nope]").is_none());
        assert!(resolve_table_ref(&wb, ctx, "Missing[Qty]").is_none());
    }

    #[test]
    fn test_this_row_needs_same_sheet() {
        let mut wb = workbook();
        wb.add_table(Table::new(
            "Sales",
            1,
            CellRange::parse("A1:C5").unwrap(),
            vec!["Region".into(), "Qty".into(), "Amount".into()],
        ))
        .unwrap();

        // Calling cell on the table's sheet, data row 3
        let ctx = CellContext::new(1, 2, 4);
        let t = resolve_table_ref(&wb, ctx, "Sales[[#This Row],[Amount]]").unwrap();
        assert_eq!(t.range.to_a1_string(), "C3");

        // From another sheet there is no current row
        let ctx = CellContext::new(0, 2, 4);
        assert!(resolve_table_ref(&wb, ctx, "Sales[[#This Row],[Amount]]").is_none());
    }

    #[test]
    fn test_resolve_name_scoping() {
        let mut wb = workbook();
        wb.define_name("Rate", "Sheet1!$B$1").unwrap();
        wb.define_name_for_sheet("Rate", "Data!$C$1", 1).unwrap();

        // From sheet 0 the global name wins
        let ctx = CellContext::new(0, 0, 0);
        match resolve_name(&wb, ctx, "Rate").unwrap() {
            NameTarget::Address(t) => {
                assert_eq!(t.sheet, 0);
                assert_eq!(t.range.to_a1_string(), "$B$1");
            }
            other => panic!("unexpected target: {:?}", other),
        }

        // From sheet 1 the sheet-scoped name shadows it
        let ctx = CellContext::new(1, 0, 0);
        match resolve_name(&wb, ctx, "Rate").unwrap() {
            NameTarget::Address(t) => {
                assert_eq!(t.sheet, 1);
                assert_eq!(t.range.to_a1_string(), "$C$1");
            }
            other => panic!("unexpected target: {:?}", other),
        }

        // Explicit qualifier reaches the sheet scope from anywhere
        let ctx = CellContext::new(0, 0, 0);
        match resolve_name(&wb, ctx, "Data!Rate").unwrap() {
            NameTarget::Address(t) => assert_eq!(t.sheet, 1),
            other => panic!("unexpected target: {:?}", other),
        }

        assert!(resolve_name(&wb, ctx, "Unknown").is_none());
        assert!(resolve_name(&wb, ctx, "[Book2]Rate").is_none());
    }

    #[test]
    fn test_relative_name_body_shifts_with_caller() {
        let mut wb = workbook();
        // Fully relative body: tracks the calling cell
        wb.define_name("Here", "A1").unwrap();

        let ctx = CellContext::new(0, 4, 3);
        match resolve_name(&wb, ctx, "Here").unwrap() {
            NameTarget::Address(t) => assert_eq!(t.range.to_a1_string(), "D5"),
            other => panic!("unexpected target: {:?}", other),
        }

        // Anchored components stay put no matter who calls
        wb.define_name("Origin", "$A$1").unwrap();
        match resolve_name(&wb, CellContext::new(0, 9, 9), "Origin").unwrap() {
            NameTarget::Address(t) => assert_eq!(t.range.to_a1_string(), "$A$1"),
            other => panic!("unexpected target: {:?}", other),
        }
    }

    #[test]
    fn test_name_body_kinds() {
        let mut wb = workbook();
        wb.define_name("Tax", "0.0725").unwrap();
        wb.define_name("Total", "=SUM(Sheet1!$A$1:$A$10)").unwrap();

        let ctx = CellContext::new(0, 0, 0);
        assert!(matches!(
            resolve_name(&wb, ctx, "Tax").unwrap(),
            NameTarget::Constant
        ));
        assert!(matches!(
            resolve_name(&wb, ctx, "Total").unwrap(),
            NameTarget::Formula { sheet: 0, .. }
        ));
    }
}
