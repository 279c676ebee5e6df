//! Parser state and token helpers.

use bumpalo::Bump;
use neopyc_core::{CompilerError, NodeId, Span};

use crate::ast::{Module, NodeIdGen};
use crate::lexer::{Lexer, Token, TokenKind};

/// Recursive-descent parser over a pre-lexed token buffer.
///
/// Statement-level errors are recorded and parsing resumes at the next
/// line, so one run reports every syntax error it can find.
pub struct Parser<'ast> {
    tokens: Vec<Token<'ast>>,
    pos: usize,
    pub(super) arena: &'ast Bump,
    pub(super) ids: NodeIdGen,
    errors: Vec<CompilerError>,
}

impl<'ast> Parser<'ast> {
    fn new(source: &str, arena: &'ast Bump, ids: NodeIdGen) -> Self {
        let (tokens, errors) = Lexer::new(source, arena).tokenize();
        Self {
            tokens,
            pos: 0,
            arena,
            ids,
            errors,
        }
    }

    /// Parse a module with node ids starting at zero.
    pub fn parse(source: &str, arena: &'ast Bump) -> Result<Module<'ast>, Vec<CompilerError>> {
        let mut ids = NodeIdGen::new();
        Self::parse_with_ids(source, arena, &mut ids)
    }

    /// Parse a module, drawing node ids from a generator shared with the
    /// other modules of the compilation.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn parse_with_ids(
        source: &str,
        arena: &'ast Bump,
        ids: &mut NodeIdGen,
    ) -> Result<Module<'ast>, Vec<CompilerError>> {
        let mut parser = Parser::new(source, arena, std::mem::take(ids));
        let module = parser.parse_module();
        *ids = std::mem::take(&mut parser.ids);

        tracing::trace!(
            tokens = parser.tokens.len(),
            errors = parser.errors.len(),
            "parsed module"
        );

        if parser.errors.is_empty() {
            Ok(module)
        } else {
            Err(parser.errors)
        }
    }

    fn parse_module(&mut self) -> Module<'ast> {
        let start = self.peek().span;
        let mut body = bumpalo::collections::Vec::new_in(self.arena);

        while !self.check(TokenKind::Eof) {
            if self.eat(TokenKind::Newline).is_some() {
                continue;
            }
            if let Some(stray) = self.eat_any(&[TokenKind::Indent, TokenKind::Dedent]) {
                self.record(CompilerError::Syntax {
                    message: "unexpected indentation".to_string(),
                    span: stray.span,
                });
                continue;
            }
            if let Err(err) = self.parse_statement_into(&mut body) {
                self.record(err);
                self.synchronize();
            }
        }

        Module {
            body: body.into_bump_slice(),
            span: start,
        }
    }

    // =========================================
    // Token access
    // =========================================

    #[inline]
    pub(super) fn peek(&self) -> &Token<'ast> {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    #[inline]
    pub(super) fn peek_nth(&self, n: usize) -> &Token<'ast> {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + n).min(last)]
    }

    #[inline]
    pub(super) fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    pub(super) fn advance(&mut self) -> Token<'ast> {
        let token = *self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    pub(super) fn eat(&mut self, kind: TokenKind) -> Option<Token<'ast>> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    pub(super) fn eat_any(&mut self, kinds: &[TokenKind]) -> Option<Token<'ast>> {
        if kinds.contains(&self.peek().kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Consume a token of `kind` or fail with a syntax error naming `what`.
    pub(super) fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token<'ast>, CompilerError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    /// Syntax error for the current token.
    pub(super) fn unexpected(&self, expected: &str) -> CompilerError {
        let token = self.peek();
        let found = if token.lexeme.is_empty() {
            token.kind.describe().to_string()
        } else {
            format!("'{}'", token.lexeme)
        };
        CompilerError::Syntax {
            message: format!("expected {expected}, found {found}"),
            span: token.span,
        }
    }

    // =========================================
    // Nodes and errors
    // =========================================

    #[inline]
    pub(super) fn node_id(&mut self) -> NodeId {
        self.ids.fresh()
    }

    #[inline]
    pub(super) fn alloc<T>(&self, value: T) -> &'ast T {
        self.arena.alloc(value)
    }

    pub(super) fn record(&mut self, error: CompilerError) {
        self.errors.push(error);
    }

    pub(super) fn unsupported(&mut self, construct: &str, span: Span) {
        self.record(CompilerError::unsupported(construct, span));
    }

    /// Skip to the start of the next statement at the current indentation
    /// level, jumping over any block introduced by the skipped line.
    pub(super) fn synchronize(&mut self) {
        loop {
            match self.peek().kind {
                TokenKind::Eof | TokenKind::Dedent => return,
                TokenKind::Newline => {
                    self.advance();
                    if self.check(TokenKind::Indent) {
                        self.skip_block();
                    }
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skip an `Indent ... Dedent` block, including nested blocks.
    pub(super) fn skip_block(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.advance().kind {
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                TokenKind::Eof => return,
                _ => {}
            }
        }
    }
}
