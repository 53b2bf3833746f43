//! Dependency-chain builder
//!
//! Walks formula token streams depth-first and emits every reachable formula
//! node in post-order, which is exactly dependencies-before-dependents. The
//! traversal is iterative: each in-progress node keeps its own token position
//! and an optional in-flight range cursor, and an explicit stack of arena
//! indices stands in for the call stack, so deep reference chains cannot
//! overflow.
//!
//! Cycle policy is asymmetric. A cell cycle is an error by default but can be
//! tolerated (the closing edge is dropped and every participant still gets
//! scheduled); a name cycle is always an error, because a name's body is
//! expanded in-place and has no cell of its own to break the loop at.

use crate::cache::TokenCache;
use crate::chain::DependencyChain;
use crate::error::{ChainError, ChainResult};
use crate::evaluate::LiveEvaluator;
use crate::node::{FormulaCell, NodeId, RangeCursor};
use crate::resolver::{
    resolve_address, resolve_name, resolve_table_ref, AddressTarget, CellContext, NameTarget,
};
use crate::tokenizer::{tokenize, Token, TokenKind};
use ahash::AHashSet;
use once_cell::sync::Lazy;
use sheetcalc_core::{CellRange, CellValue, Workbook};
use std::sync::Arc;

/// Functions whose reference target is only known at evaluation time
static DYNAMIC_FUNCTIONS: Lazy<AHashSet<&'static str>> =
    Lazy::new(|| ["OFFSET"].into_iter().collect());

/// Build-time options
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainOptions {
    /// Tolerate cell cycles by dropping the closing edge instead of failing.
    /// Name cycles are fatal regardless.
    pub allow_circular_references: bool,
}

/// One step of the traversal loop
enum Step {
    /// A new child node was added; suspend the current node and expand it
    Descend(usize),
    /// The current node has no references left; it is finished
    Done,
}

/// Builds dependency chains over a workbook
///
/// The builder borrows a [`TokenCache`] so that repeated builds over the
/// same workbook skip re-tokenizing unchanged formulas, and optionally a
/// [`LiveEvaluator`] for dynamic addressing.
pub struct ChainBuilder<'a> {
    options: ChainOptions,
    cache: &'a mut dyn TokenCache,
    evaluator: Option<&'a dyn LiveEvaluator>,
}

impl<'a> ChainBuilder<'a> {
    /// Create a builder with default options
    pub fn new(cache: &'a mut dyn TokenCache) -> Self {
        Self::with_options(cache, ChainOptions::default())
    }

    /// Create a builder with explicit options
    pub fn with_options(cache: &'a mut dyn TokenCache, options: ChainOptions) -> Self {
        Self {
            options,
            cache,
            evaluator: None,
        }
    }

    /// Attach a live evaluator for dynamic-address functions
    pub fn with_evaluator(mut self, evaluator: &'a dyn LiveEvaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Build the chain for every formula cell plus every workbook-global
    /// formula name. Chart sheets carry no formulas and are skipped.
    pub fn build_workbook(&mut self, workbook: &mut Workbook) -> ChainResult<DependencyChain> {
        let mut seeds = Vec::new();
        for sheet_ix in 0..workbook.sheet_count() {
            if let Some(ws) = workbook.sheet(sheet_ix) {
                if ws.is_chart() {
                    continue;
                }
                collect_cell_seeds(ws, sheet_ix, None, &mut seeds);
            }
        }
        for name in workbook.named_ranges().workbook_names() {
            if name.is_formula() {
                seeds.push(name_seed(name));
            }
        }
        self.run(workbook, seeds)
    }

    /// Build the chain for one sheet's formula cells plus the names scoped
    /// to that sheet
    pub fn build_sheet(
        &mut self,
        workbook: &mut Workbook,
        sheet: usize,
    ) -> ChainResult<DependencyChain> {
        let mut seeds = Vec::new();
        {
            let ws = workbook.sheet(sheet).ok_or(
                sheetcalc_core::Error::SheetOutOfBounds(sheet, workbook.sheet_count()),
            )?;
            collect_cell_seeds(ws, sheet, None, &mut seeds);
        }
        for name in workbook.named_ranges().sheet_names(sheet) {
            if name.is_formula() {
                seeds.push(name_seed(name));
            }
        }
        self.run(workbook, seeds)
    }

    /// Build the chain for the formula cells inside one range
    pub fn build_range(
        &mut self,
        workbook: &mut Workbook,
        sheet: usize,
        range: CellRange,
    ) -> ChainResult<DependencyChain> {
        let mut seeds = Vec::new();
        {
            let ws = workbook.sheet(sheet).ok_or(
                sheetcalc_core::Error::SheetOutOfBounds(sheet, workbook.sheet_count()),
            )?;
            collect_cell_seeds(ws, sheet, Some(range), &mut seeds);
        }
        self.run(workbook, seeds)
    }

    /// Build the chain for a free-standing expression evaluated against a
    /// sheet. The expression itself becomes an ad hoc root node; its token
    /// stream is never cached.
    pub fn build_formula(
        &mut self,
        workbook: &mut Workbook,
        sheet: usize,
        formula: &str,
    ) -> ChainResult<DependencyChain> {
        let seed = FormulaCell::new(NodeId::Adhoc, sheet, 0, 0, formula.to_string());
        self.run(workbook, vec![seed])
    }

    // === Traversal ===

    fn run(
        &mut self,
        workbook: &mut Workbook,
        seeds: Vec<FormulaCell>,
    ) -> ChainResult<DependencyChain> {
        let mut chain = DependencyChain::new();
        for seed in seeds {
            if chain.contains(seed.id) {
                continue;
            }
            let root = chain.add(seed);
            self.follow(workbook, &mut chain, root)?;
        }
        log::debug!("dependency chain built with {} nodes", chain.len());
        Ok(chain)
    }

    /// Expand one root's subtree with an explicit stack
    fn follow(
        &mut self,
        workbook: &mut Workbook,
        chain: &mut DependencyChain,
        root: usize,
    ) -> ChainResult<()> {
        let mut stack = vec![root];
        while let Some(&current) = stack.last() {
            let tokens = self.ensure_tokens(chain, current)?;
            match self.advance(workbook, chain, current, &stack, &tokens)? {
                Step::Descend(child) => stack.push(child),
                Step::Done => {
                    chain.push_order(current);
                    stack.pop();
                }
            }
        }
        Ok(())
    }

    /// Attach the node's token stream, consulting the cache first
    fn ensure_tokens(
        &mut self,
        chain: &mut DependencyChain,
        ix: usize,
    ) -> ChainResult<Arc<Vec<Token>>> {
        if let Some(tokens) = chain.node(ix).tokens.as_ref() {
            return Ok(Arc::clone(tokens));
        }

        let id = chain.node(ix).id;
        // The ad hoc identity is shared by every expression build, so it
        // must never hit the cache
        let cached = if id == NodeId::Adhoc {
            None
        } else {
            self.cache.get(id)
        };
        let tokens = match cached {
            Some(tokens) => tokens,
            None => {
                let tokens = Arc::new(tokenize(&chain.node(ix).formula)?);
                if id != NodeId::Adhoc {
                    self.cache.set(id, Arc::clone(&tokens));
                }
                tokens
            }
        };
        chain.node_mut(ix).tokens = Some(Arc::clone(&tokens));
        Ok(tokens)
    }

    /// Move the current node forward until it descends or finishes
    fn advance(
        &mut self,
        workbook: &mut Workbook,
        chain: &mut DependencyChain,
        current: usize,
        stack: &[usize],
        tokens: &[Token],
    ) -> ChainResult<Step> {
        loop {
            if let Some(step) = self.drain_cursor(workbook, chain, current, stack)? {
                return Ok(step);
            }

            let ix = chain.node(current).token_ix;
            let token = match tokens.get(ix) {
                Some(token) => token.clone(),
                None => return Ok(Step::Done),
            };
            chain.node_mut(current).token_ix = ix + 1;

            let node = chain.node(current);
            let ctx = CellContext::new(node.sheet, node.row, node.col);
            let own_id = node.id;

            match token.kind {
                TokenKind::Address => {
                    let Some(target) = resolve_address(workbook, ctx, &token.text) else {
                        continue;
                    };
                    // A bare single-cell self-reference cannot produce a
                    // finite expansion, so fail (or drop it) right here
                    if !target.explicit_sheet && target.range.is_single_cell() {
                        if let NodeId::Cell { sheet, row, col } = own_id {
                            if target.sheet == sheet
                                && target.range.start.row == row
                                && target.range.start.col == col
                            {
                                if self.options.allow_circular_references {
                                    log::debug!(
                                        "dropping self-reference at {}",
                                        own_id.display(workbook)
                                    );
                                    continue;
                                }
                                return Err(ChainError::CircularReference(
                                    own_id.display(workbook),
                                ));
                            }
                        }
                    }
                    install_cursor(workbook, chain, current, target);
                }
                TokenKind::TableRef => {
                    if let Some(target) = resolve_table_ref(workbook, ctx, &token.text) {
                        install_cursor(workbook, chain, current, target);
                    }
                }
                TokenKind::Name => {
                    enum Resolved {
                        Skip,
                        Range(AddressTarget),
                        Body {
                            id: NodeId,
                            sheet: usize,
                            body: String,
                        },
                    }
                    let resolved = match resolve_name(workbook, ctx, &token.text) {
                        None | Some(NameTarget::Constant) => Resolved::Skip,
                        Some(NameTarget::Address(target)) => Resolved::Range(target),
                        Some(NameTarget::Formula { name, sheet }) => Resolved::Body {
                            id: NodeId::Name {
                                sheet: name.anchor_sheet(),
                                index: name.index,
                            },
                            sheet,
                            body: name.refers_to.clone(),
                        },
                    };
                    match resolved {
                        Resolved::Skip => {}
                        Resolved::Range(target) => {
                            install_cursor(workbook, chain, current, target)
                        }
                        Resolved::Body { id, sheet, body } => {
                            if let Some(existing) = chain.position(id) {
                                if existing == current || stack.contains(&existing) {
                                    return Err(ChainError::CircularReference(
                                        id.display(workbook),
                                    ));
                                }
                                // already scheduled elsewhere
                            } else {
                                let child =
                                    chain.add(FormulaCell::new(id, sheet, 0, 0, body));
                                return Ok(Step::Descend(child));
                            }
                        }
                    }
                }
                TokenKind::Function => {
                    if DYNAMIC_FUNCTIONS.contains(token.text.to_ascii_uppercase().as_str()) {
                        self.expand_dynamic_call(workbook, chain, current, tokens, ix)?;
                    }
                }
                _ => {}
            }
        }
    }

    /// Step the active range cursor; a new formula cell suspends the current
    /// node and descends
    fn drain_cursor(
        &mut self,
        workbook: &Workbook,
        chain: &mut DependencyChain,
        current: usize,
        stack: &[usize],
    ) -> ChainResult<Option<Step>> {
        loop {
            let next = match chain.node_mut(current).cursor.as_mut() {
                Some(cursor) => {
                    let sheet = cursor.sheet;
                    cursor.next().map(|(row, col)| (sheet, row, col))
                }
                None => return Ok(None),
            };
            let Some((sheet, row, col)) = next else {
                chain.node_mut(current).cursor = None;
                return Ok(None);
            };

            let id = NodeId::Cell { sheet, row, col };
            if let Some(existing) = chain.position(id) {
                if existing == current || stack.contains(&existing) {
                    if self.options.allow_circular_references {
                        log::debug!(
                            "dropping circular edge into {}",
                            id.display(workbook)
                        );
                        continue;
                    }
                    return Err(ChainError::CircularReference(id.display(workbook)));
                }
                // already in the chain
                continue;
            }

            let Some(text) = workbook
                .sheet(sheet)
                .and_then(|ws| ws.formula_text_at(row, col))
            else {
                continue;
            };
            let text = text.into_owned();
            let child = chain.add(FormulaCell::new(id, sheet, row, col, text));
            return Ok(Some(Step::Descend(child)));
        }
    }

    /// Resolve a dynamic-address call by evaluating it in cell context.
    ///
    /// The enclosing formula is swapped for a placeholder with every dynamic
    /// call replaced by `0` while the extracted call is evaluated, so an
    /// evaluator that reads the calling cell cannot recurse into it. The
    /// original value is restored on every path.
    fn expand_dynamic_call(
        &mut self,
        workbook: &mut Workbook,
        chain: &mut DependencyChain,
        current: usize,
        tokens: &[Token],
        call_ix: usize,
    ) -> ChainResult<()> {
        let Some(end) = matching_paren(tokens, call_ix + 1) else {
            return Ok(());
        };
        // The argument tokens belong to the evaluator, not the walk
        chain.node_mut(current).token_ix = end + 1;

        let Some(evaluator) = self.evaluator else {
            return Ok(());
        };
        let NodeId::Cell { sheet, row, col } = chain.node(current).id else {
            return Ok(());
        };

        let mut expr = String::from("=");
        for token in &tokens[call_ix..=end] {
            expr.push_str(&token.text);
        }
        let placeholder = with_dynamic_placeholders(tokens);

        let prev = match workbook.sheet_mut(sheet) {
            Some(ws) => ws.replace_cell_value(row, col, CellValue::formula(placeholder)),
            None => return Ok(()),
        };
        let result = evaluator.evaluate(workbook, sheet, row, col, &expr);
        if let Some(ws) = workbook.sheet_mut(sheet) {
            match prev {
                Some(value) => {
                    ws.replace_cell_value(row, col, value);
                }
                None => {
                    ws.clear_cell(row, col);
                }
            }
        }

        if let Some(addr) = result {
            let ctx = CellContext::new(sheet, row, col);
            if let Some(target) = resolve_address(workbook, ctx, addr.trim()) {
                install_cursor(workbook, chain, current, target);
            }
        }
        Ok(())
    }
}

/// Park the formula cells of a resolved range on the node
fn install_cursor(
    workbook: &Workbook,
    chain: &mut DependencyChain,
    current: usize,
    target: AddressTarget,
) {
    let cells: Vec<(u32, u16)> = match workbook.sheet(target.sheet) {
        Some(ws) => ws.formula_cells_in(target.range).collect(),
        None => Vec::new(),
    };
    if !cells.is_empty() {
        chain.node_mut(current).cursor = Some(RangeCursor::new(target.sheet, cells));
    }
}

fn collect_cell_seeds(
    ws: &sheetcalc_core::Worksheet,
    sheet: usize,
    range: Option<CellRange>,
    seeds: &mut Vec<FormulaCell>,
) {
    let positions: Vec<(u32, u16)> = match range {
        Some(range) => ws.formula_cells_in(range).collect(),
        None => ws.formula_cells().collect(),
    };
    for (row, col) in positions {
        if let Some(text) = ws.formula_text_at(row, col) {
            seeds.push(FormulaCell::new(
                NodeId::Cell { sheet, row, col },
                sheet,
                row,
                col,
                text.into_owned(),
            ));
        }
    }
}

fn name_seed(name: &sheetcalc_core::NamedRange) -> FormulaCell {
    FormulaCell::new(
        NodeId::Name {
            sheet: name.anchor_sheet(),
            index: name.index,
        },
        name.anchor_sheet().unwrap_or(0),
        0,
        0,
        name.refers_to.clone(),
    )
}

/// Find the close paren matching the open paren at `open`
fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    if tokens.get(open)?.kind != TokenKind::OpenParen {
        return None;
    }
    let mut depth = 0usize;
    for (ix, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::OpenParen => depth += 1,
            TokenKind::CloseParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(ix);
                }
            }
            _ => {}
        }
    }
    None
}

/// Reassemble a formula with every dynamic-address call replaced by `0`
fn with_dynamic_placeholders(tokens: &[Token]) -> String {
    let mut out = String::from("=");
    let mut ix = 0;
    while ix < tokens.len() {
        let token = &tokens[ix];
        if token.kind == TokenKind::Function
            && DYNAMIC_FUNCTIONS.contains(token.text.to_ascii_uppercase().as_str())
        {
            if let Some(end) = matching_paren(tokens, ix + 1) {
                out.push('0');
                ix = end + 1;
                continue;
            }
        }
        out.push_str(&token.text);
        ix += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryTokenCache;

    #[test]
    fn test_matching_paren() {
        let tokens = tokenize("=SUM(A1,MAX(B1,C1))").unwrap();
        // token 1 is SUM's open paren, the matching close is the last token
        assert_eq!(matching_paren(&tokens, 1), Some(tokens.len() - 1));
        assert_eq!(matching_paren(&tokens, 0), None);
    }

    #[test]
    fn test_dynamic_placeholders() {
        let tokens = tokenize("=OFFSET(A1,1,0)+B2*OFFSET(C3,0,1)").unwrap();
        assert_eq!(with_dynamic_placeholders(&tokens), "=0+B2*0");

        let tokens = tokenize("=SUM(A1:A3)").unwrap();
        assert_eq!(with_dynamic_placeholders(&tokens), "=SUM(A1:A3)");
    }

    #[test]
    fn test_simple_dependency_order() {
        let mut wb = Workbook::new();
        let s = wb.add_sheet("Sheet1").unwrap();
        let ws = wb.sheet_mut(s).unwrap();
        ws.set_formula("A1", "=B1+1").unwrap();
        ws.set_formula("B1", "=C1*2").unwrap();
        ws.set_value("C1", 3.0).unwrap();

        let mut cache = MemoryTokenCache::new();
        let chain = ChainBuilder::new(&mut cache).build_workbook(&mut wb).unwrap();

        let order: Vec<_> = chain.calc_order().collect();
        assert_eq!(
            order,
            vec![
                NodeId::Cell {
                    sheet: 0,
                    row: 0,
                    col: 1
                },
                NodeId::Cell {
                    sheet: 0,
                    row: 0,
                    col: 0
                },
            ]
        );
    }

    #[test]
    fn test_self_reference_fails_fast() {
        let mut wb = Workbook::new();
        wb.add_sheet("Sheet1").unwrap();
        wb.sheet_mut(0).unwrap().set_formula("A1", "=A1+1").unwrap();

        let mut cache = MemoryTokenCache::new();
        let err = ChainBuilder::new(&mut cache)
            .build_workbook(&mut wb)
            .unwrap_err();
        assert!(matches!(err, ChainError::CircularReference(_)));
    }

    #[test]
    fn test_self_reference_tolerated() {
        let mut wb = Workbook::new();
        wb.add_sheet("Sheet1").unwrap();
        wb.sheet_mut(0).unwrap().set_formula("A1", "=A1+1").unwrap();

        let mut cache = MemoryTokenCache::new();
        let options = ChainOptions {
            allow_circular_references: true,
        };
        let chain = ChainBuilder::with_options(&mut cache, options)
            .build_workbook(&mut wb)
            .unwrap();
        assert_eq!(chain.calc_order().count(), 1);
    }
}
