//! Formula tokenizer
//!
//! A single-pass scanner that turns formula text into an ordered sequence of
//! typed tokens. The tokenizer is re-entrant and side-effect free; it only
//! distinguishes lexical shape. Whether an identifier is really a defined
//! name, or an address lands inside the grid, is the resolver's business.

use crate::error::{ChainError, ChainResult};
use lazy_regex::regex_is_match;

/// Token kinds relevant to dependency-chain building
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Cell or range address, possibly sheet-qualified ("A1", "$B$2",
    /// "A1:B10", "Sheet2!A1", "'My Sheet'!A1:B2", "A:A")
    Address,
    /// Name reference, possibly sheet-qualified ("Rate", "Sheet2!Rate")
    Name,
    /// Table-structured reference ("Sales[Amount]", "Sales[[#This Row],[Qty]]")
    TableRef,
    /// Function name (identifier followed by an opening parenthesis)
    Function,
    /// Opening grouping marker
    OpenParen,
    /// Closing grouping marker
    CloseParen,
    /// Argument separator
    Separator,
    /// String literal, stored with its quotes
    StringLiteral,
    /// Generic operand (number, boolean, error literal)
    Operand,
    /// Operator or other punctuation
    Operator,
}

/// A single token: kind plus the literal source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// What the token is
    pub kind: TokenKind,
    /// Literal text as it appeared in the formula
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Lexical test for a cell or cell-range address (bounds checked later)
fn is_cell_or_range(text: &str) -> bool {
    regex_is_match!(
        r"^\$?[A-Za-z]{1,3}\$?[0-9]+(:\$?[A-Za-z]{1,3}\$?[0-9]+)?$",
        text
    )
}

/// Lexical test for a whole-column span like "A:A" or "$B:$D"
fn is_column_span(text: &str) -> bool {
    regex_is_match!(r"^\$?[A-Za-z]{1,3}:\$?[A-Za-z]{1,3}$", text)
}

/// Lexical test for the left half of a possible column span
fn is_column_letters(text: &str) -> bool {
    regex_is_match!(r"^\$?[A-Za-z]{1,3}$", text)
}

/// Tokenize formula text (with or without the leading `=`)
pub fn tokenize(formula: &str) -> ChainResult<Vec<Token>> {
    let text = formula.trim();
    let text = text.strip_prefix('=').unwrap_or(text);

    let mut scanner = Scanner {
        input: text,
        pos: 0,
        formula,
    };
    scanner.run()
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    /// Original formula, for error reporting
    formula: &'a str,
}

impl<'a> Scanner<'a> {
    fn run(&mut self) -> ChainResult<Vec<Token>> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
                continue;
            }

            match c {
                '"' => tokens.push(self.scan_string()?),
                '(' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::OpenParen, "("));
                }
                ')' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::CloseParen, ")"));
                }
                ',' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::Separator, ","));
                }
                '\'' => tokens.push(self.scan_quoted_sheet_ref()?),
                '#' => tokens.push(self.scan_error_literal()),
                '0'..='9' => tokens.push(self.scan_number()),
                '.' if self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) => {
                    tokens.push(self.scan_number());
                }
                _ if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                    tokens.push(self.scan_identifier_or_ref()?);
                }
                '+' | '-' | '*' | '/' | '^' | '&' | '%' | '=' | ':' | ';' | '{' | '}' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::Operator, c.to_string()));
                }
                '<' | '>' => {
                    self.advance();
                    let mut op = c.to_string();
                    if let Some(next @ ('=' | '>')) = self.peek() {
                        if !(c == '>' && next == '>') {
                            op.push(next);
                            self.advance();
                        }
                    }
                    tokens.push(Token::new(TokenKind::Operator, op));
                }
                _ => {
                    return Err(self.malformed(format!("unexpected character '{}'", c)));
                }
            }
        }

        Ok(tokens)
    }

    // === Scanning primitives ===

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn malformed(&self, reason: String) -> ChainError {
        ChainError::MalformedFormula {
            formula: self.formula.to_string(),
            reason,
        }
    }

    // === Token scanners ===

    fn scan_string(&mut self) -> ChainResult<Token> {
        let start = self.pos;
        self.advance(); // opening quote

        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    // "" escapes a quote inside the literal
                    if self.peek() == Some('"') {
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(_) => self.advance(),
                None => return Err(self.malformed("unterminated string literal".into())),
            }
        }

        Ok(Token::new(
            TokenKind::StringLiteral,
            &self.input[start..self.pos],
        ))
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;

        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') {
            self.advance();
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if self.peek().map_or(false, |c| c == 'e' || c == 'E') {
            let mark = self.pos;
            self.advance();
            if self.peek().map_or(false, |c| c == '+' || c == '-') {
                self.advance();
            }
            if self.peek().map_or(false, |c| c.is_ascii_digit()) {
                while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                    self.advance();
                }
            } else {
                // not an exponent after all
                self.pos = mark;
            }
        }

        Token::new(TokenKind::Operand, &self.input[start..self.pos])
    }

    fn scan_error_literal(&mut self) -> Token {
        let start = self.pos;
        self.advance(); // '#'
        while self.peek().map_or(false, |c| {
            c.is_ascii_alphanumeric() || c == '!' || c == '/' || c == '?'
        }) {
            self.advance();
        }
        Token::new(TokenKind::Operand, &self.input[start..self.pos])
    }

    /// Scan a run of reference/identifier characters from the current position
    fn scan_run(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().map_or(false, |c| {
            c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.'
        }) {
            self.advance();
        }
        &self.input[start..self.pos]
    }

    /// Scan a reference run, merging `:` continuations that form a range or a
    /// whole-column span into a single run
    fn scan_ref_run(&mut self) -> &'a str {
        let start = self.pos;
        let first = self.scan_run();

        if self.peek() == Some(':') {
            let mark = self.pos;
            self.advance();
            let second = self.scan_run();
            let merged = &self.input[start..self.pos];
            let is_range = is_cell_or_range(merged) || is_column_span(merged);
            // Guard against "A:" followed by something that is not a span half
            if is_range && !first.is_empty() && !second.is_empty() {
                return merged;
            }
            self.pos = mark;
        }

        &self.input[start..self.pos]
    }

    fn scan_quoted_sheet_ref(&mut self) -> ChainResult<Token> {
        let start = self.pos;
        self.advance(); // opening quote

        loop {
            match self.peek() {
                Some('\'') => {
                    self.advance();
                    // '' escapes a quote inside the sheet name
                    if self.peek() == Some('\'') {
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(_) => self.advance(),
                None => return Err(self.malformed("unterminated sheet name quote".into())),
            }
        }

        if self.peek() != Some('!') {
            return Err(self.malformed("quoted sheet name must be followed by '!'".into()));
        }
        self.advance(); // '!'

        let rest = self.scan_ref_run();
        let kind = if is_cell_or_range(rest) || is_column_span(rest) {
            TokenKind::Address
        } else {
            TokenKind::Name
        };
        Ok(Token::new(kind, &self.input[start..self.pos]))
    }

    fn scan_identifier_or_ref(&mut self) -> ChainResult<Token> {
        let start = self.pos;
        let run = self.scan_run();

        match self.peek() {
            // Sheet-qualified reference or name
            Some('!') => {
                self.advance();
                let rest = self.scan_ref_run();
                let kind = if is_cell_or_range(rest) || is_column_span(rest) {
                    TokenKind::Address
                } else {
                    TokenKind::Name
                };
                Ok(Token::new(kind, &self.input[start..self.pos]))
            }
            // Table-structured reference: consume the bracket spec, nested
            // brackets included
            Some('[') => {
                let mut depth = 0usize;
                loop {
                    match self.peek() {
                        Some('[') => {
                            depth += 1;
                            self.advance();
                        }
                        Some(']') => {
                            depth -= 1;
                            self.advance();
                            if depth == 0 {
                                break;
                            }
                        }
                        Some(_) => self.advance(),
                        None => {
                            return Err(
                                self.malformed("unterminated table reference bracket".into())
                            )
                        }
                    }
                }
                Ok(Token::new(TokenKind::TableRef, &self.input[start..self.pos]))
            }
            // Function call (the parenthesis becomes its own token)
            Some('(') => Ok(Token::new(TokenKind::Function, run)),
            _ => {
                // Possible range continuation: "A1:B2" or column span "A:A"
                if self.peek() == Some(':')
                    && (is_cell_or_range(run) || is_column_letters(run))
                {
                    let mark = self.pos;
                    self.advance();
                    let second = self.scan_run();
                    let merged = &self.input[start..self.pos];
                    if !second.is_empty()
                        && (is_cell_or_range(merged) || is_column_span(merged))
                    {
                        return Ok(Token::new(TokenKind::Address, merged));
                    }
                    self.pos = mark;
                }

                let upper = run.to_ascii_uppercase();
                if upper == "TRUE" || upper == "FALSE" {
                    return Ok(Token::new(TokenKind::Operand, run));
                }
                if is_cell_or_range(run) {
                    return Ok(Token::new(TokenKind::Address, run));
                }
                Ok(Token::new(TokenKind::Name, run))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(formula: &str) -> Vec<TokenKind> {
        tokenize(formula).unwrap().iter().map(|t| t.kind).collect()
    }

    fn texts(formula: &str) -> Vec<String> {
        tokenize(formula)
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_simple_arithmetic() {
        assert_eq!(
            kinds("=A1+B1*2"),
            vec![
                TokenKind::Address,
                TokenKind::Operator,
                TokenKind::Address,
                TokenKind::Operator,
                TokenKind::Operand,
            ]
        );
    }

    #[test]
    fn test_function_call() {
        let tokens = tokenize("=SUM(A1:A10,B1)").unwrap();
        assert_eq!(tokens[0], Token::new(TokenKind::Function, "SUM"));
        assert_eq!(tokens[1].kind, TokenKind::OpenParen);
        assert_eq!(tokens[2], Token::new(TokenKind::Address, "A1:A10"));
        assert_eq!(tokens[3].kind, TokenKind::Separator);
        assert_eq!(tokens[4], Token::new(TokenKind::Address, "B1"));
        assert_eq!(tokens[5].kind, TokenKind::CloseParen);
    }

    #[test]
    fn test_sheet_qualified() {
        assert_eq!(
            texts("=Sheet2!A1+'My Sheet'!B2:C3"),
            vec!["Sheet2!A1", "+", "'My Sheet'!B2:C3"]
        );
        assert_eq!(
            kinds("=Sheet2!A1+'My Sheet'!B2:C3"),
            vec![TokenKind::Address, TokenKind::Operator, TokenKind::Address]
        );
    }

    #[test]
    fn test_sheet_qualified_name() {
        let tokens = tokenize("=Sheet2!Rate*2").unwrap();
        assert_eq!(tokens[0], Token::new(TokenKind::Name, "Sheet2!Rate"));
    }

    #[test]
    fn test_names_vs_addresses() {
        assert_eq!(kinds("=Rate*2")[0], TokenKind::Name);
        assert_eq!(kinds("=$B$2")[0], TokenKind::Address);
        // LOG10 followed by '(' is a function, not cell LOG10
        assert_eq!(kinds("=LOG10(100)")[0], TokenKind::Function);
        // An underscore keeps it a name
        assert_eq!(kinds("=A1_Total")[0], TokenKind::Name);
    }

    #[test]
    fn test_column_span() {
        let tokens = tokenize("=SUM(A:A)").unwrap();
        assert_eq!(tokens[2], Token::new(TokenKind::Address, "A:A"));
    }

    #[test]
    fn test_table_reference() {
        let tokens = tokenize("=SUM(Sales[Amount])").unwrap();
        assert_eq!(tokens[2], Token::new(TokenKind::TableRef, "Sales[Amount]"));

        let tokens = tokenize("=Sales[[#This Row],[Qty]]*2").unwrap();
        assert_eq!(
            tokens[0],
            Token::new(TokenKind::TableRef, "Sales[[#This Row],[Qty]]")
        );
    }

    #[test]
    fn test_string_literal_kept_verbatim() {
        let tokens = tokenize("=\"a \"\"quoted\"\" cell: A1\"&B1").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].text, "\"a \"\"quoted\"\" cell: A1\"");
        assert_eq!(tokens[2], Token::new(TokenKind::Address, "B1"));
    }

    #[test]
    fn test_booleans_and_errors_are_operands() {
        assert_eq!(kinds("=TRUE"), vec![TokenKind::Operand]);
        assert_eq!(kinds("=#REF!"), vec![TokenKind::Operand]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(texts("=1.5e3+.25"), vec!["1.5e3", "+", ".25"]);
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(texts("=A1<=B1"), vec!["A1", "<=", "B1"]);
        assert_eq!(texts("=A1<>B1"), vec!["A1", "<>", "B1"]);
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            tokenize("=\"unterminated"),
            Err(ChainError::MalformedFormula { .. })
        ));
        assert!(matches!(
            tokenize("=Sales[Amount"),
            Err(ChainError::MalformedFormula { .. })
        ));
        assert!(matches!(
            tokenize("='Sheet"),
            Err(ChainError::MalformedFormula { .. })
        ));
    }

    #[test]
    fn test_empty_formula() {
        assert!(tokenize("=").unwrap().is_empty());
        assert!(tokenize("").unwrap().is_empty());
    }
}
