//! Query tokenizer
//!
//! Splits a free-text query into typed tokens in a single left-to-right
//! pass. The grammar is deliberately small:
//!
//! - `[...]` is a unit tag, e.g. `[kΩ]`
//! - `<...>` is a stock tag holding a number or range, e.g. `<10-50>`
//! - a word starting with a digit is a number; a number directly followed
//!   by `[` fuses with the unit tag (`4.7[kΩ]`)
//! - anything else up to the next whitespace is text
//!
//! The stream always ends with exactly one [`TokenKind::Eof`], or with a
//! [`TokenKind::Error`] when a bracket is never closed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::FusedIterator;

use super::error::SearchError;

/// The kind of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Text,
    Number,
    Unit,
    Stock,
    Eof,
    Error,
}

impl TokenKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Unit => "unit",
            Self::Stock => "stock",
            Self::Eof => "eof",
            Self::Error => "error",
        }
    }

    /// Whether this kind ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Eof | Self::Error)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Byte offsets of a token in the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A classified slice of the query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Exactly the covered input, brackets included
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }

    /// Text with the surrounding brackets removed for unit and stock tags
    pub fn inner(&self) -> &str {
        match self.kind {
            TokenKind::Unit | TokenKind::Stock => {
                let mut chars = self.text.chars();
                chars.next();
                chars.next_back();
                chars.as_str()
            }
            _ => &self.text,
        }
    }

    /// The error an `Error` token stands for
    pub fn as_error(&self) -> Option<SearchError> {
        if self.kind != TokenKind::Error {
            return None;
        }
        Some(SearchError::UnterminatedBracket {
            delimiter: self.text.chars().next().unwrap_or('['),
            offset: self.span.start,
        })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.kind, self.text)
    }
}

/// Single-pass scanner over a query string
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    /// A number stopped on `[`; the next token is its unit tag
    fused_unit: bool,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            fused_unit: false,
            finished: false,
        }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(is_space) {
            self.pos += 1;
        }
    }

    fn emit(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(
            kind,
            &self.input[start..self.pos],
            Span::new(start, self.pos),
        )
    }

    fn scan_token(&mut self) -> Token {
        if std::mem::take(&mut self.fused_unit) {
            return self.scan_bracket(b']', TokenKind::Unit);
        }

        self.skip_whitespace();
        match self.peek() {
            None => self.emit(TokenKind::Eof, self.pos),
            Some(b'[') => self.scan_bracket(b']', TokenKind::Unit),
            Some(b'<') => self.scan_bracket(b'>', TokenKind::Stock),
            Some(b'0'..=b'9') => self.scan_number(),
            Some(_) => self.scan_text(),
        }
    }

    // Delimiters are ASCII, so every stop position is a char boundary.
    fn scan_bracket(&mut self, close: u8, kind: TokenKind) -> Token {
        let start = self.pos;
        let rest = &self.input.as_bytes()[start + 1..];
        match rest.iter().position(|&b| b == close) {
            Some(offset) => {
                self.pos = start + 1 + offset + 1;
                self.emit(kind, start)
            }
            None => {
                self.pos = self.input.len();
                self.emit(TokenKind::Error, start)
            }
        }
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_space(b) {
                break;
            }
            if b == b'[' {
                self.fused_unit = true;
                break;
            }
            self.pos += 1;
        }
        self.emit(TokenKind::Number, start)
    }

    fn scan_text(&mut self) -> Token {
        let start = self.pos;
        while self.peek().is_some_and(|b| !is_space(b)) {
            self.pos += 1;
        }
        self.emit(TokenKind::Text, start)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.scan_token();
        self.finished = token.kind.is_terminal();
        Some(token)
    }
}

impl FusedIterator for Lexer<'_> {}

/// Control characters and space separate tokens
fn is_space(b: u8) -> bool {
    b <= b' '
}

/// Tokenize a whole query, terminal token included
pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_and_text(input: &str) -> Vec<(TokenKind, String)> {
        tokenize(input)
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_mixed_query() {
        assert_eq!(
            kinds_and_text("4.7[kΩ] resistor <10->"),
            vec![
                (TokenKind::Number, "4.7".to_string()),
                (TokenKind::Unit, "[kΩ]".to_string()),
                (TokenKind::Text, "resistor".to_string()),
                (TokenKind::Stock, "<10->".to_string()),
                (TokenKind::Eof, String::new()),
            ]
        );
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert_eq!(kinds_and_text(""), vec![(TokenKind::Eof, String::new())]);
        assert_eq!(
            kinds_and_text(" \t\n "),
            vec![(TokenKind::Eof, String::new())]
        );
    }

    #[test]
    fn test_spans_cover_the_input() {
        let input = "  10k [Ω]";
        let tokens = tokenize(input);
        assert_eq!(tokens[0].span, Span::new(2, 5));
        assert_eq!(&input[tokens[1].span.start..tokens[1].span.end], "[Ω]");
        assert_eq!(tokens[2].span, Span::new(input.len(), input.len()));
    }

    #[test]
    fn test_brackets_may_contain_spaces() {
        let tokens = tokenize("[k Ω] <1 - 5>");
        assert_eq!(tokens[0].text, "[k Ω]");
        assert_eq!(tokens[1].text, "<1 - 5>");
    }

    #[test]
    fn test_text_is_only_broken_by_whitespace() {
        assert_eq!(
            kinds_and_text("smd[0805] x<y"),
            vec![
                (TokenKind::Text, "smd[0805]".to_string()),
                (TokenKind::Text, "x<y".to_string()),
                (TokenKind::Eof, String::new()),
            ]
        );
    }

    #[test]
    fn test_number_keeps_suffix_until_whitespace() {
        let tokens = tokenize("100nF 2N2222");
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].text, "100nF");
        assert_eq!(tokens[1].kind, TokenKind::Number);
        assert_eq!(tokens[1].text, "2N2222");
    }

    #[test]
    fn test_unterminated_unit_is_an_error() {
        let tokens = tokenize("resistor [kΩ");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].kind, TokenKind::Error);
        assert_eq!(tokens[1].text, "[kΩ");
        assert_eq!(
            tokens[1].as_error(),
            Some(SearchError::UnterminatedBracket {
                delimiter: '[',
                offset: 9
            })
        );
    }

    #[test]
    fn test_unterminated_fused_unit_is_an_error() {
        let tokens = tokenize("4.7[k");
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[1].kind, TokenKind::Error);
    }

    #[test]
    fn test_unterminated_stock_is_an_error() {
        let tokens = tokenize("<10");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(
            tokens[0].as_error(),
            Some(SearchError::UnterminatedBracket {
                delimiter: '<',
                offset: 0
            })
        );
    }

    #[test]
    fn test_inner_strips_brackets() {
        let tokens = tokenize("[kΩ] <1k-2k> word");
        assert_eq!(tokens[0].inner(), "kΩ");
        assert_eq!(tokens[1].inner(), "1k-2k");
        assert_eq!(tokens[2].inner(), "word");
    }

    #[test]
    fn test_stream_is_fused_after_terminal_token() {
        let mut lexer = Lexer::new("a");
        assert_eq!(lexer.next().map(|t| t.kind), Some(TokenKind::Text));
        assert_eq!(lexer.next().map(|t| t.kind), Some(TokenKind::Eof));
        assert!(lexer.next().is_none());
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_exactly_one_terminal_token() {
        for input in ["", "a b c", "1[k] <2>", "[open", "x <", "4.7[kΩ]"] {
            let tokens = tokenize(input);
            let terminals = tokens.iter().filter(|t| t.kind.is_terminal()).count();
            assert_eq!(terminals, 1, "input {input:?}");
            assert!(tokens.last().unwrap().kind.is_terminal());
        }
    }
}
