//! Chain node identity and per-node traversal state

use crate::tokenizer::Token;
use sheetcalc_core::{CellAddress, Workbook};
use std::sync::Arc;

/// Identity of a dependency-chain node
///
/// Cells are identified by position, names by the stable index assigned at
/// definition time plus their scope sheet. `Adhoc` is the root of a
/// free-standing expression build; there is at most one per build and it is
/// never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    /// A formula cell at a grid position
    Cell {
        /// Owning sheet index
        sheet: usize,
        /// Row index (0-based)
        row: u32,
        /// Column index (0-based)
        col: u16,
    },
    /// A formula-bodied defined name
    Name {
        /// Scope sheet, `None` for workbook-scoped names
        sheet: Option<usize>,
        /// Stable index in the workbook's name collection
        index: u32,
    },
    /// The root of an ad hoc expression build
    Adhoc,
}

impl NodeId {
    /// Pack the identity into a single `u64` for O(1) membership tests.
    ///
    /// Cells use `sheet << 34 | row << 14 | col` (20 bits of row headroom
    /// above the 2^20 grid, 14 bits of column). Names set bit 62 so the two
    /// spaces cannot collide; `Adhoc` is the all-ones sentinel.
    pub fn encode(&self) -> u64 {
        match *self {
            NodeId::Cell { sheet, row, col } => {
                ((sheet as u64) << 34) | ((row as u64) << 14) | col as u64
            }
            NodeId::Name { sheet, index } => {
                let scope = match sheet {
                    Some(s) => s as u64 + 1,
                    None => 0,
                };
                (1 << 62) | (scope << 32) | index as u64
            }
            NodeId::Adhoc => u64::MAX,
        }
    }

    /// Human-readable form for error messages and logs
    pub fn display(&self, workbook: &Workbook) -> String {
        match *self {
            NodeId::Cell { sheet, row, col } => {
                let addr = CellAddress::new(row, col);
                match workbook.sheet(sheet) {
                    Some(ws) => format!("{}!{}", ws.name(), addr),
                    None => addr.to_string(),
                }
            }
            NodeId::Name { index, .. } => workbook
                .named_ranges()
                .get_by_index(index)
                .map(|n| n.name.clone())
                .unwrap_or_else(|| format!("<name #{}>", index)),
            NodeId::Adhoc => "<expression>".to_string(),
        }
    }
}

/// A resumable walk over the formula cells of a resolved range.
///
/// When the traversal descends into a child it parks the remaining cells
/// here and picks them up again after the child's subtree is finished.
#[derive(Debug, Clone)]
pub struct RangeCursor {
    /// Sheet the range lives on
    pub sheet: usize,
    /// Formula-bearing positions in the range, row-major
    pub cells: Vec<(u32, u16)>,
    /// Next position to visit
    pub pos: usize,
}

impl RangeCursor {
    /// Build a cursor over the formula cells of a range
    pub fn new(sheet: usize, cells: Vec<(u32, u16)>) -> Self {
        Self {
            sheet,
            cells,
            pos: 0,
        }
    }

    /// The next unvisited position, advancing the cursor
    pub fn next(&mut self) -> Option<(u32, u16)> {
        let cell = self.cells.get(self.pos).copied()?;
        self.pos += 1;
        Some(cell)
    }
}

/// A node in the dependency chain with its in-flight traversal state
///
/// Once the build completes only `id` and the position fields matter; the
/// token list and cursor exist so the iterative traversal can suspend a node
/// mid-expansion and resume it later.
#[derive(Debug, Clone)]
pub struct FormulaCell {
    /// Node identity
    pub id: NodeId,
    /// Context sheet the formula is evaluated against
    pub sheet: usize,
    /// Context row (0 for name and ad hoc nodes)
    pub row: u32,
    /// Context column (0 for name and ad hoc nodes)
    pub col: u16,
    /// The formula text this node was built from
    pub formula: String,
    /// Token stream, filled lazily on first visit
    pub tokens: Option<Arc<Vec<Token>>>,
    /// Next token to examine
    pub token_ix: usize,
    /// In-flight range expansion, if any
    pub cursor: Option<RangeCursor>,
}

impl FormulaCell {
    /// Create a fresh node; tokens are attached when the traversal reaches it
    pub fn new(id: NodeId, sheet: usize, row: u32, col: u16, formula: String) -> Self {
        Self {
            id,
            sheet,
            row,
            col,
            formula,
            tokens: None,
            token_ix: 0,
            cursor: None,
        }
    }
}
