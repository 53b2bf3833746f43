//! Shared-formula expansion
//!
//! A shared formula is stored once as a template anchored at an origin cell;
//! every other cell in the shared span stores only a reference to the
//! template. Materializing the per-cell text shifts each unanchored cell
//! reference by the instance's offset from the origin.

use crate::cell::CellAddress;

/// Shift every relative cell reference in `formula` by the given deltas.
///
/// Anchored components (`$`) do not move. References pushed off the grid are
/// replaced with `#REF!`. String literals, sheet-name quotes, function names
/// and plain names pass through untouched.
pub fn shift_references(formula: &str, row_delta: i64, col_delta: i64) -> String {
    if row_delta == 0 && col_delta == 0 {
        return formula.to_string();
    }

    let mut out = String::with_capacity(formula.len());
    let bytes = formula.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;

        // String literal: copy verbatim, "" escapes a quote
        if c == '"' {
            let start = i;
            i += 1;
            while i < bytes.len() {
                if bytes[i] == b'"' {
                    if bytes.get(i + 1) == Some(&b'"') {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            out.push_str(&formula[start..i]);
            continue;
        }

        // Quoted sheet name: copy verbatim, '' escapes a quote
        if c == '\'' {
            let start = i;
            i += 1;
            while i < bytes.len() {
                if bytes[i] == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            out.push_str(&formula[start..i]);
            continue;
        }

        // Candidate reference or identifier run
        if c == '$' || c.is_ascii_alphanumeric() || c == '_' {
            let start = i;
            while i < bytes.len() {
                let rc = bytes[i] as char;
                if rc == '$' || rc.is_ascii_alphanumeric() || rc == '_' || rc == '.' {
                    i += 1;
                } else {
                    break;
                }
            }
            let run = &formula[start..i];
            let is_call = bytes.get(i) == Some(&b'(');

            if !is_call {
                if let Ok(addr) = CellAddress::parse(run) {
                    match addr.offset(row_delta, col_delta) {
                        Some(shifted) => out.push_str(&shifted.to_a1_string()),
                        None => out.push_str("#REF!"),
                    }
                    continue;
                }
            }
            out.push_str(run);
            continue;
        }

        out.push(c);
        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_relative_refs() {
        assert_eq!(shift_references("=F4+1", 1, 0), "=F5+1");
        assert_eq!(shift_references("=A1*B2", 2, 1), "=B3*C4");
    }

    #[test]
    fn test_anchors_stay_put() {
        assert_eq!(shift_references("=$A$1+B1", 3, 0), "=$A$1+B4");
        assert_eq!(shift_references("=A$1+$B2", 1, 1), "=B$1+$B3");
    }

    #[test]
    fn test_ranges_and_functions() {
        assert_eq!(shift_references("=SUM(A1:A10)", 1, 0), "=SUM(A2:A11)");
        // LOG10 is a call, not a reference to cell LOG10
        assert_eq!(shift_references("=LOG10(A1)", 1, 0), "=LOG10(A2)");
    }

    #[test]
    fn test_strings_and_names_untouched() {
        assert_eq!(
            shift_references("=\"A1 stays\"&C1", 1, 0),
            "=\"A1 stays\"&C2"
        );
        assert_eq!(shift_references("=Rate*B1", 1, 0), "=Rate*B2");
        assert_eq!(shift_references("='My Sheet'!A1", 1, 0), "='My Sheet'!A2");
    }

    #[test]
    fn test_off_grid_becomes_ref_error() {
        assert_eq!(shift_references("=A1", -1, 0), "=#REF!");
    }

    #[test]
    fn test_zero_delta_is_identity() {
        assert_eq!(shift_references("=F4+1", 0, 0), "=F4+1");
    }
}
