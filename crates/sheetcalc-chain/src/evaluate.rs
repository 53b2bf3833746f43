//! Live evaluation hook for dynamic addressing
//!
//! `OFFSET` computes its target at evaluation time, so the chain builder
//! cannot resolve it from text alone. The builder extracts the `OFFSET(...)`
//! call, hands it to a [`LiveEvaluator`] supplied by the host, and expands
//! the address string the evaluator returns. Without an evaluator the call
//! simply contributes no edge.

use sheetcalc_core::Workbook;

/// Host-supplied evaluator for dynamic-address expressions
pub trait LiveEvaluator {
    /// Evaluate an expression in the context of a cell.
    ///
    /// `formula` is a complete expression with a leading `=`. Returns the
    /// resulting address string (e.g. `"B2"` or `"Sheet2!B2:C4"`), or `None`
    /// when the expression cannot be evaluated to an address.
    fn evaluate(
        &self,
        workbook: &Workbook,
        sheet: usize,
        row: u32,
        col: u16,
        formula: &str,
    ) -> Option<String>;
}
