//! Cell address and range types

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// A cell address (e.g., "A1", "$B$2")
///
/// Column letters run A-XFD, row numbers 1-1048576. A `$` prefix anchors the
/// row or column so it survives relative adjustment (shared formulas, relative
/// named ranges).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellAddress {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ..., XFD=16383)
    pub col: u16,
    /// Whether the row reference is anchored ($)
    pub row_absolute: bool,
    /// Whether the column reference is anchored ($)
    pub col_absolute: bool,
}

impl CellAddress {
    /// Create a new cell address with relative references
    pub fn new(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// Create a fully anchored address ($A$1 style)
    pub fn absolute(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: true,
            col_absolute: true,
        }
    }

    /// Parse a cell address from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use sheetcalc_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("A1").unwrap();
    /// assert_eq!((addr.row, addr.col), (0, 0));
    ///
    /// let addr = CellAddress::parse("$B$2").unwrap();
    /// assert!(addr.row_absolute && addr.col_absolute);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }

        let bytes = s.as_bytes();
        let mut pos = 0;

        let col_absolute = if bytes.first() == Some(&b'$') {
            pos += 1;
            true
        } else {
            false
        };

        let col_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        if pos == col_start {
            return Err(Error::InvalidAddress(format!(
                "no column letters in '{}'",
                s
            )));
        }
        let col = Self::letters_to_column(&s[col_start..pos])?;

        let row_absolute = if bytes.get(pos) == Some(&b'$') {
            pos += 1;
            true
        } else {
            false
        };

        let row_str = &s[pos..];
        if row_str.is_empty() {
            return Err(Error::InvalidAddress(format!("no row number in '{}'", s)));
        }
        let row: u32 = row_str
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", s)))?;

        // Rows are 1-based in display, 0-based internally
        if row == 0 {
            return Err(Error::InvalidAddress(format!(
                "row number must be >= 1 in '{}'",
                s
            )));
        }
        let row = row - 1;

        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }

        Ok(Self {
            row,
            col,
            row_absolute,
            col_absolute,
        })
    }

    /// Convert column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
    pub fn column_to_letters(col: u16) -> String {
        let mut result = String::new();
        let mut n = col as u32 + 1;

        while n > 0 {
            n -= 1;
            let c = ((n % 26) as u8 + b'A') as char;
            result.insert(0, c);
            n /= 26;
        }

        result
    }

    /// Convert column letters to index (A = 0, Z = 25, AA = 26, etc.)
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!(
                    "invalid column letter '{}'",
                    c
                )));
            }
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
            if col > MAX_COLS as u32 {
                return Err(Error::ColumnOutOfBounds(MAX_COLS, MAX_COLS - 1));
            }
        }

        Ok((col - 1) as u16)
    }

    /// Shift this address by a signed row/column delta, honoring anchors.
    ///
    /// Anchored components do not move. Returns `None` when the shifted
    /// address would leave the grid.
    pub fn offset(&self, row_delta: i64, col_delta: i64) -> Option<Self> {
        let row = if self.row_absolute {
            self.row as i64
        } else {
            self.row as i64 + row_delta
        };
        let col = if self.col_absolute {
            self.col as i64
        } else {
            self.col as i64 + col_delta
        };

        if row < 0 || row >= MAX_ROWS as i64 || col < 0 || col >= MAX_COLS as i64 {
            return None;
        }

        Some(Self {
            row: row as u32,
            col: col as u16,
            row_absolute: self.row_absolute,
            col_absolute: self.col_absolute,
        })
    }

    /// Format as A1-style string
    pub fn to_a1_string(&self) -> String {
        let mut result = String::new();

        if self.col_absolute {
            result.push('$');
        }
        result.push_str(&Self::column_to_letters(self.col));

        if self.row_absolute {
            result.push('$');
        }
        result.push_str(&(self.row + 1).to_string());

        result
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A rectangular range of cells (e.g., "A1:B10")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRange {
    /// Start address (top-left after normalization)
    pub start: CellAddress,
    /// End address (bottom-right after normalization)
    pub end: CellAddress,
}

impl CellRange {
    /// Create a new range, normalized so start is top-left
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        let (start_row, end_row) = if start.row <= end.row {
            (start.row, end.row)
        } else {
            (end.row, start.row)
        };
        let (start_col, end_col) = if start.col <= end.col {
            (start.col, end.col)
        } else {
            (end.col, start.col)
        };

        Self {
            start: CellAddress {
                row: start_row,
                col: start_col,
                ..start
            },
            end: CellAddress {
                row: end_row,
                col: end_col,
                ..end
            },
        }
    }

    /// Create a range from row/column indices
    pub fn from_indices(start_row: u32, start_col: u16, end_row: u32, end_col: u16) -> Self {
        Self::new(
            CellAddress::new(start_row, start_col),
            CellAddress::new(end_row, end_col),
        )
    }

    /// Create a single-cell range
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Parse a range from A1:B10 notation (a bare address is a 1x1 range)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(colon_pos) = s.find(':') {
            let start = CellAddress::parse(&s[..colon_pos])?;
            let end = CellAddress::parse(&s[colon_pos + 1..])?;
            Ok(Self::new(start, end))
        } else {
            Ok(Self::single(CellAddress::parse(s)?))
        }
    }

    /// Check if a cell position is within this range
    pub fn contains(&self, row: u32, col: u16) -> bool {
        row >= self.start.row && row <= self.end.row && col >= self.start.col && col <= self.end.col
    }

    /// Number of rows in the range
    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Number of columns in the range
    pub fn col_count(&self) -> u16 {
        self.end.col - self.start.col + 1
    }

    /// Whether the range covers exactly one cell
    pub fn is_single_cell(&self) -> bool {
        self.start.row == self.end.row && self.start.col == self.end.col
    }

    /// Intersection with another range, if any
    pub fn intersect(&self, other: &CellRange) -> Option<CellRange> {
        let start_row = self.start.row.max(other.start.row);
        let start_col = self.start.col.max(other.start.col);
        let end_row = self.end.row.min(other.end.row);
        let end_col = self.end.col.min(other.end.col);

        if start_row > end_row || start_col > end_col {
            return None;
        }
        Some(CellRange::from_indices(start_row, start_col, end_row, end_col))
    }

    /// Iterate over all cell positions in the range, row by row
    pub fn cells(&self) -> CellRangeIterator {
        CellRangeIterator {
            range: *self,
            current_row: self.start.row,
            current_col: self.start.col,
            done: false,
        }
    }

    /// Format as A1:B10 string
    pub fn to_a1_string(&self) -> String {
        if self.start == self.end {
            self.start.to_a1_string()
        } else {
            format!("{}:{}", self.start.to_a1_string(), self.end.to_a1_string())
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Iterator over cell positions in a range
pub struct CellRangeIterator {
    range: CellRange,
    current_row: u32,
    current_col: u16,
    done: bool,
}

impl Iterator for CellRangeIterator {
    type Item = (u32, u16);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let pos = (self.current_row, self.current_col);

        if self.current_col < self.range.end.col {
            self.current_col += 1;
        } else if self.current_row < self.range.end.row {
            self.current_col = self.range.start.col;
            self.current_row += 1;
        } else {
            self.done = true;
        }

        Some(pos)
    }
}

/// Split an optional sheet qualifier off a reference string.
///
/// `Sheet1!A1` yields `(Some("Sheet1"), "A1")`; `'My Sheet'!A1:B2` yields
/// `(Some("My Sheet"), "A1:B2")` with the quotes stripped and doubled quotes
/// unescaped. Text without a `!` is returned unchanged.
pub fn split_sheet_prefix(text: &str) -> (Option<String>, &str) {
    if let Some(rest) = text.strip_prefix('\'') {
        // Quoted sheet name: scan for the closing quote, '' escapes one quote
        let mut name = String::new();
        let mut chars = rest.char_indices();
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if rest[i + 1..].starts_with('\'') {
                    name.push('\'');
                    chars.next();
                } else if rest[i + 1..].starts_with('!') {
                    return (Some(name), &rest[i + 2..]);
                } else {
                    break;
                }
            } else {
                name.push(c);
            }
        }
        (None, text)
    } else if let Some(bang) = text.find('!') {
        (Some(text[..bang].to_string()), &text[bang + 1..])
    } else {
        (None, text)
    }
}
