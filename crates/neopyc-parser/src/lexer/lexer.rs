//! Lexer for the Python subset.
//!
//! The [`Lexer`] turns source text into [`Token`]s, synthesising the layout
//! tokens `Newline`, `Indent` and `Dedent` from line breaks and leading
//! whitespace the way Python's tokenizer does. Line structure is suspended
//! inside brackets and after a backslash continuation.
//!
//! Lexemes are copied into the arena, so the source string can be dropped
//! after lexing.

use std::collections::VecDeque;

use bumpalo::Bump;
use neopyc_core::{CompilerError, Span};

use super::cursor::{Cursor, is_ident_continue, is_ident_start};
use super::token::{Token, TokenKind, lookup_keyword};

const TAB_WIDTH: u32 = 8;

/// Multi-character operators, longest first so the scan is greedy.
const OPERATORS: &[(&str, TokenKind)] = &[
    ("**=", TokenKind::DoubleStarEqual),
    ("//=", TokenKind::DoubleSlashEqual),
    (">>=", TokenKind::RightShiftEqual),
    ("<<=", TokenKind::LeftShiftEqual),
    ("...", TokenKind::Ellipsis),
    ("->", TokenKind::Arrow),
    (":=", TokenKind::Walrus),
    ("**", TokenKind::DoubleStar),
    ("//", TokenKind::DoubleSlash),
    ("<<", TokenKind::LeftShift),
    (">>", TokenKind::RightShift),
    ("<=", TokenKind::LessEqual),
    (">=", TokenKind::GreaterEqual),
    ("==", TokenKind::EqualEqual),
    ("!=", TokenKind::NotEqual),
    ("+=", TokenKind::PlusEqual),
    ("-=", TokenKind::MinusEqual),
    ("*=", TokenKind::StarEqual),
    ("/=", TokenKind::SlashEqual),
    ("%=", TokenKind::PercentEqual),
    ("@=", TokenKind::AtEqual),
    ("&=", TokenKind::AmpersandEqual),
    ("|=", TokenKind::PipeEqual),
    ("^=", TokenKind::CaretEqual),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("@", TokenKind::At),
    ("&", TokenKind::Ampersand),
    ("|", TokenKind::Pipe),
    ("^", TokenKind::Caret),
    ("~", TokenKind::Tilde),
    ("<", TokenKind::Less),
    (">", TokenKind::Greater),
    ("=", TokenKind::Equal),
    ("(", TokenKind::LeftParen),
    (")", TokenKind::RightParen),
    ("[", TokenKind::LeftBracket),
    ("]", TokenKind::RightBracket),
    ("{", TokenKind::LeftBrace),
    ("}", TokenKind::RightBrace),
    (",", TokenKind::Comma),
    (":", TokenKind::Colon),
    (".", TokenKind::Dot),
    (";", TokenKind::Semicolon),
];

/// Lexer for Python-syntax source code.
///
/// The `'src` lifetime is the source being lexed; `'ast` is the arena the
/// lexemes are copied into.
pub struct Lexer<'src, 'ast> {
    cursor: Cursor<'src>,
    arena: &'ast Bump,
    /// Tokens already produced but not yet handed out.
    pending: VecDeque<Token<'ast>>,
    /// Column widths of the open indentation levels; always starts with 0.
    indents: Vec<u32>,
    bracket_depth: u32,
    at_line_start: bool,
    /// Whether a token other than layout has been produced on this line.
    line_has_tokens: bool,
    finished: bool,
    errors: Vec<CompilerError>,
}

impl<'src, 'ast> Lexer<'src, 'ast> {
    pub fn new(source: &'src str, arena: &'ast Bump) -> Self {
        Self {
            cursor: Cursor::new(source),
            arena,
            pending: VecDeque::with_capacity(4),
            indents: vec![0],
            bracket_depth: 0,
            at_line_start: true,
            line_has_tokens: false,
            finished: false,
            errors: Vec::new(),
        }
    }

    /// Take accumulated errors, leaving an empty vec.
    pub fn take_errors(&mut self) -> Vec<CompilerError> {
        std::mem::take(&mut self.errors)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Consume and return the next token. Returns `Eof` forever once the
    /// input is exhausted.
    pub fn next_token(&mut self) -> Token<'ast> {
        if self.pending.is_empty() {
            self.fill();
        }
        match self.pending.pop_front() {
            Some(token) => token,
            None => self.make_eof(),
        }
    }

    /// Lex the whole input, ending with a single `Eof` token.
    pub fn tokenize(mut self) -> (Vec<Token<'ast>>, Vec<CompilerError>) {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        (tokens, self.errors)
    }

    // =========================================
    // Line structure
    // =========================================

    /// Produce at least one token into `pending`.
    fn fill(&mut self) {
        if self.finished {
            let eof = self.make_eof();
            self.pending.push_back(eof);
            return;
        }

        loop {
            if self.at_line_start && self.bracket_depth == 0 {
                self.read_indentation();
                if !self.pending.is_empty() {
                    return;
                }
            }

            self.skip_inline_whitespace();

            if self.cursor.is_eof() {
                self.finish();
                return;
            }

            if self.cursor.check(|c| c == '\n' || c == '\r') {
                let span = Span::new(self.cursor.line(), self.cursor.column(), 1);
                self.consume_line_break();
                if self.bracket_depth > 0 || !self.line_has_tokens {
                    continue;
                }
                self.push_layout(TokenKind::Newline, span);
                self.at_line_start = true;
                self.line_has_tokens = false;
                return;
            }

            let token = self.scan_token();
            self.line_has_tokens = true;
            self.pending.push_back(token);
            return;
        }
    }

    /// Measure the indentation of the next logical line, skipping blank and
    /// comment-only lines, and queue `Indent`/`Dedent` tokens.
    fn read_indentation(&mut self) {
        loop {
            let mut width = 0u32;
            loop {
                match self.cursor.peek() {
                    Some(' ') => width += 1,
                    Some('\t') => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                    Some('\x0c') => width = 0,
                    _ => break,
                }
                self.cursor.advance();
            }

            match self.cursor.peek() {
                None => {
                    self.at_line_start = false;
                    return;
                }
                Some('#') => {
                    self.cursor.eat_while(|c| c != '\n' && c != '\r');
                    continue;
                }
                Some('\n') | Some('\r') => {
                    self.consume_line_break();
                    continue;
                }
                Some(_) => {}
            }

            self.at_line_start = false;
            let span = Span::point(self.cursor.line(), self.cursor.column());
            let current = self.indents.last().copied().unwrap_or(0);

            if width > current {
                self.indents.push(width);
                self.push_layout(TokenKind::Indent, span);
            } else if width < current {
                while self.indents.last().is_some_and(|&level| level > width) {
                    self.indents.pop();
                    self.push_layout(TokenKind::Dedent, span);
                }
                if self.indents.last().copied().unwrap_or(0) != width {
                    self.error("unindent does not match any outer indentation level", span);
                }
            }
            return;
        }
    }

    /// Skip spaces, comments and backslash line continuations.
    fn skip_inline_whitespace(&mut self) {
        loop {
            match self.cursor.peek() {
                Some(' ') | Some('\t') | Some('\x0c') => {
                    self.cursor.advance();
                }
                Some('#') => {
                    self.cursor.eat_while(|c| c != '\n' && c != '\r');
                }
                Some('\\') if matches!(self.cursor.peek_nth(1), Some('\n') | Some('\r')) => {
                    self.cursor.advance();
                    self.consume_line_break();
                }
                Some('\u{FEFF}') => {
                    self.cursor.advance();
                }
                _ => return,
            }
        }
    }

    fn consume_line_break(&mut self) {
        if self.cursor.eat('\r') {
            self.cursor.eat('\n');
        } else {
            self.cursor.eat('\n');
        }
    }

    /// Close the final line and every open indentation level.
    fn finish(&mut self) {
        let span = Span::point(self.cursor.line(), self.cursor.column());
        if self.line_has_tokens {
            self.push_layout(TokenKind::Newline, span);
            self.line_has_tokens = false;
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push_layout(TokenKind::Dedent, span);
        }
        let eof = self.make_eof();
        self.pending.push_back(eof);
        self.finished = true;
    }

    fn push_layout(&mut self, kind: TokenKind, span: Span) {
        let token = Token::new(kind, "", span);
        self.pending.push_back(token);
    }

    fn make_eof(&self) -> Token<'ast> {
        Token::new(
            TokenKind::Eof,
            "",
            Span::point(self.cursor.line(), self.cursor.column()),
        )
    }

    fn make_token(&self, kind: TokenKind, line: u32, col: u32, start: u32) -> Token<'ast> {
        let text = self.cursor.slice_from(start);
        let span = Span::new(line, col, text.len() as u32);
        Token::new(kind, self.arena.alloc_str(text), span)
    }

    fn error(&mut self, message: &str, span: Span) {
        self.errors.push(CompilerError::Syntax {
            message: message.to_string(),
            span,
        });
    }

    // =========================================
    // Token scanning
    // =========================================

    fn scan_token(&mut self) -> Token<'ast> {
        let line = self.cursor.line();
        let col = self.cursor.column();
        let start = self.cursor.offset();

        match self.cursor.peek() {
            Some(c) if is_ident_start(c) => self.scan_identifier(line, col, start),
            Some(c) if c.is_ascii_digit() => self.scan_number(line, col, start),
            Some('.') if self.cursor.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.scan_number(line, col, start)
            }
            Some('\'') | Some('"') => self.scan_string("", line, col, start),
            _ => self.scan_operator(line, col, start),
        }
    }

    fn scan_identifier(&mut self, line: u32, col: u32, start: u32) -> Token<'ast> {
        let ident = self.cursor.eat_while(is_ident_continue);

        if self.cursor.check(|c| c == '\'' || c == '"') && is_string_prefix(ident) {
            return self.scan_string(ident, line, col, start);
        }

        let kind = lookup_keyword(ident).unwrap_or(TokenKind::Identifier);
        self.make_token(kind, line, col, start)
    }

    fn scan_number(&mut self, line: u32, col: u32, start: u32) -> Token<'ast> {
        let radix_prefix = ["0x", "0X", "0o", "0O", "0b", "0B"]
            .iter()
            .any(|prefix| self.cursor.check_str(prefix));

        if radix_prefix {
            self.cursor.advance();
            self.cursor.advance();
            self.cursor.eat_while(|c| c.is_ascii_alphanumeric() || c == '_');
            return self.make_token(TokenKind::Int, line, col, start);
        }

        let mut kind = TokenKind::Int;
        self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');

        if self.cursor.peek() == Some('.') && !self.cursor.peek_nth(1).is_some_and(is_ident_start) {
            kind = TokenKind::Float;
            self.cursor.advance();
            self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
        }
        if self.cursor.check(|c| c == 'e' || c == 'E') {
            kind = TokenKind::Float;
            self.cursor.advance();
            if self.cursor.check(|c| c == '+' || c == '-') {
                self.cursor.advance();
            }
            self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
        }
        if self.cursor.check(|c| c == 'j' || c == 'J') {
            kind = TokenKind::Float;
            self.cursor.advance();
        }
        if self.cursor.check(is_ident_start) {
            let bad = self.cursor.eat_while(is_ident_continue);
            let span = Span::new(line, col, self.cursor.offset() - start);
            let message = format!("invalid character '{}' in number", bad.chars().next().unwrap_or('?'));
            self.error(&message, span);
            return self.make_token(TokenKind::Error, line, col, start);
        }

        self.make_token(kind, line, col, start)
    }

    /// Scan a string literal. `prefix` has already been consumed.
    fn scan_string(&mut self, prefix: &str, line: u32, col: u32, start: u32) -> Token<'ast> {
        let lower = prefix.to_ascii_lowercase();
        let kind = if lower.contains('b') {
            TokenKind::Bytes
        } else {
            TokenKind::Str
        };

        let Some(quote) = self.cursor.advance() else {
            return self.make_token(TokenKind::Error, line, col, start);
        };
        let triple_close: String = [quote; 3].iter().collect();
        let triple = self.cursor.check_str(&triple_close[..2]);
        if triple {
            self.cursor.advance();
            self.cursor.advance();
        }

        let terminated = loop {
            match self.cursor.peek() {
                None => break false,
                Some('\\') => {
                    self.cursor.advance();
                    self.cursor.advance();
                }
                Some('\n') | Some('\r') if !triple => break false,
                Some(c) if c == quote => {
                    if !triple {
                        self.cursor.advance();
                        break true;
                    }
                    if self.cursor.eat_str(&triple_close) {
                        break true;
                    }
                    self.cursor.advance();
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        };

        let span = Span::new(line, col, self.cursor.offset() - start);
        if !terminated {
            self.error("unterminated string literal", span);
            return self.make_token(TokenKind::Error, line, col, start);
        }
        if lower.contains('f') {
            self.errors.push(CompilerError::unsupported("f-string", span));
            return self.make_token(TokenKind::Error, line, col, start);
        }

        self.make_token(kind, line, col, start)
    }

    fn scan_operator(&mut self, line: u32, col: u32, start: u32) -> Token<'ast> {
        let matched = OPERATORS
            .iter()
            .find(|(text, _)| self.cursor.check_str(text))
            .map(|(text, kind)| (*text, *kind));

        let Some((text, kind)) = matched else {
            let ch = self.cursor.advance().unwrap_or('?');
            let span = Span::new(line, col, ch.len_utf8() as u32);
            self.error(&format!("unexpected character '{ch}'"), span);
            return self.make_token(TokenKind::Error, line, col, start);
        };

        self.cursor.eat_str(text);
        if kind.is_open_bracket() {
            self.bracket_depth += 1;
        } else if kind.is_close_bracket() {
            self.bracket_depth = self.bracket_depth.saturating_sub(1);
        }
        self.make_token(kind, line, col, start)
    }
}

fn is_string_prefix(ident: &str) -> bool {
    matches!(
        ident.to_ascii_lowercase().as_str(),
        "b" | "r" | "u" | "f" | "br" | "rb" | "fr" | "rf"
    )
}
