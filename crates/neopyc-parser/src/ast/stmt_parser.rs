//! Statement parsing.
//!
//! Compound statements own an indented block; simple statements may be
//! chained on one line with `;`. Constructs outside the accepted subset
//! (`try`, `with`, `global`, ...) are reported as unsupported and skipped as
//! a whole so parsing continues after them.

use bumpalo::collections::Vec as BVec;
use neopyc_core::{CompilerError, Span};

use super::parser::Parser;
use crate::ast::expr::Expr;
use crate::ast::stmt::*;
use crate::ast::{BinaryOp, Ident};
use crate::lexer::TokenKind;

type PResult<T> = Result<T, CompilerError>;
type Body<'ast> = BVec<'ast, Stmt<'ast>>;

impl<'ast> Parser<'ast> {
    /// Parse one statement line (or compound statement) into `out`.
    pub(super) fn parse_statement_into(&mut self, out: &mut Body<'ast>) -> PResult<()> {
        let token = *self.peek();
        match token.kind {
            TokenKind::If => out.push(self.parse_if()?),
            TokenKind::While => out.push(self.parse_while()?),
            TokenKind::For => out.push(self.parse_for()?),
            TokenKind::Def => out.push(self.parse_function(&[])?),
            TokenKind::Class => out.push(self.parse_class()?),
            TokenKind::At => out.push(self.parse_decorated()?),
            TokenKind::Try => self.skip_compound("try statement", &[TokenKind::Except, TokenKind::Else, TokenKind::Finally]),
            TokenKind::With => self.skip_compound("with statement", &[]),
            TokenKind::Async => self.skip_compound("async definition", &[]),
            _ => self.parse_simple_statements(out)?,
        }
        Ok(())
    }

    /// Parse `small_stmt (';' small_stmt)* NEWLINE`.
    fn parse_simple_statements(&mut self, out: &mut Body<'ast>) -> PResult<()> {
        loop {
            if let Some(stmt) = self.parse_small_statement()? {
                out.push(stmt);
            }
            if self.eat(TokenKind::Semicolon).is_none() {
                break;
            }
            if self.check(TokenKind::Newline) || self.check(TokenKind::Eof) {
                break;
            }
        }
        if !self.check(TokenKind::Eof) {
            self.expect(TokenKind::Newline, "end of statement")?;
        }
        Ok(())
    }

    /// Parse a single simple statement. Unsupported statements are recorded
    /// and yield `None`.
    fn parse_small_statement(&mut self) -> PResult<Option<Stmt<'ast>>> {
        let token = *self.peek();
        let stmt = match token.kind {
            TokenKind::Pass => Stmt::Pass(self.advance().span),
            TokenKind::Break => Stmt::Break(self.advance().span),
            TokenKind::Continue => Stmt::Continue(self.advance().span),
            TokenKind::Return => self.parse_return()?,
            TokenKind::Import => self.parse_import()?,
            TokenKind::From => self.parse_from_import()?,
            TokenKind::Assert => self.parse_assert()?,
            TokenKind::Global
            | TokenKind::Nonlocal
            | TokenKind::Del
            | TokenKind::Raise
            | TokenKind::Yield => {
                let construct = format!("'{}' statement", token.lexeme);
                self.unsupported(&construct, token.span);
                self.skip_to_line_end();
                return Ok(None);
            }
            _ => self.parse_expression_statement()?,
        };
        Ok(Some(stmt))
    }

    fn parse_expression_statement(&mut self) -> PResult<Stmt<'ast>> {
        let first = self.parse_expr_list()?;

        if self.eat(TokenKind::Colon).is_some() {
            self.check_target(first)?;
            let annotation = self.parse_expr()?;
            let value = if self.eat(TokenKind::Equal).is_some() {
                Some(self.parse_expr_list()?)
            } else {
                None
            };
            let end = value.map_or(annotation.span(), |v| v.span());
            return Ok(Stmt::AnnAssign(self.alloc(AnnAssignStmt {
                target: first,
                annotation,
                value,
                span: first.span().to(end),
            })));
        }

        if let Some(op) = BinaryOp::from_augmented(self.peek().kind) {
            self.advance();
            self.check_target(first)?;
            let value = self.parse_expr_list()?;
            return Ok(Stmt::AugAssign(self.alloc(AugAssignStmt {
                target: first,
                op,
                value,
                span: first.span().to(value.span()),
            })));
        }

        if self.eat(TokenKind::Equal).is_some() {
            self.check_target(first)?;
            let value = self.parse_expr_list()?;
            if let Some(token) = self.eat(TokenKind::Equal) {
                return Err(CompilerError::unsupported("chained assignment", token.span));
            }
            return Ok(Stmt::Assign(self.alloc(AssignStmt {
                target: first,
                value,
                span: first.span().to(value.span()),
            })));
        }

        Ok(Stmt::Expr(self.alloc(ExprStmt {
            expr: first,
            span: first.span(),
        })))
    }

    /// Reject assignment targets that are not names, attributes or subscripts.
    fn check_target(&self, target: Expr<'ast>) -> PResult<()> {
        match target {
            Expr::Name(_) | Expr::Attribute(_) | Expr::Subscript(_) => Ok(()),
            Expr::Tuple(_) | Expr::List(_) => {
                Err(CompilerError::unsupported("tuple unpacking", target.span()))
            }
            other => Err(CompilerError::Syntax {
                message: format!("cannot assign to {}", other.describe()),
                span: other.span(),
            }),
        }
    }

    fn parse_return(&mut self) -> PResult<Stmt<'ast>> {
        let keyword = self.expect(TokenKind::Return, "'return'")?;
        let value = if self.starts_expression() {
            Some(self.parse_expr_list()?)
        } else {
            None
        };
        let span = value.map_or(keyword.span, |v| keyword.span.to(v.span()));
        Ok(Stmt::Return(self.alloc(ReturnStmt { value, span })))
    }

    fn parse_assert(&mut self) -> PResult<Stmt<'ast>> {
        let keyword = self.expect(TokenKind::Assert, "'assert'")?;
        let test = self.parse_expr()?;
        let msg = if self.eat(TokenKind::Comma).is_some() {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let end = msg.unwrap_or(test).span();
        Ok(Stmt::Assert(self.alloc(AssertStmt {
            test,
            msg,
            span: keyword.span.to(end),
        })))
    }

    // =========================================
    // Imports
    // =========================================

    fn parse_import(&mut self) -> PResult<Stmt<'ast>> {
        let keyword = self.expect(TokenKind::Import, "'import'")?;
        let mut names = BVec::new_in(self.arena);
        loop {
            names.push(self.parse_import_alias(true)?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        let end = names.last().map_or(keyword.span, |alias| alias.span);
        Ok(Stmt::Import(self.alloc(ImportStmt {
            names: names.into_bump_slice(),
            span: keyword.span.to(end),
        })))
    }

    fn parse_from_import(&mut self) -> PResult<Stmt<'ast>> {
        let keyword = self.expect(TokenKind::From, "'from'")?;

        let mut level = 0u32;
        while let Some(dots) = self.eat_any(&[TokenKind::Dot, TokenKind::Ellipsis]) {
            level += if dots.kind == TokenKind::Ellipsis { 3 } else { 1 };
        }
        let module = if self.check(TokenKind::Import) && level > 0 {
            ""
        } else {
            self.parse_dotted_name()?.0
        };

        self.expect(TokenKind::Import, "'import'")?;
        let id = self.node_id();

        if let Some(star) = self.eat(TokenKind::Star) {
            return Ok(Stmt::ImportFrom(self.alloc(ImportFromStmt {
                id,
                module,
                level,
                names: &[],
                span: keyword.span.to(star.span),
            })));
        }

        let parenthesized = self.eat(TokenKind::LeftParen).is_some();
        let mut names = BVec::new_in(self.arena);
        loop {
            names.push(self.parse_import_alias(false)?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
            if parenthesized && self.check(TokenKind::RightParen) {
                break;
            }
        }
        if parenthesized {
            self.expect(TokenKind::RightParen, "')'")?;
        }

        let end = names.last().map_or(keyword.span, |alias| alias.span);
        Ok(Stmt::ImportFrom(self.alloc(ImportFromStmt {
            id,
            module,
            level,
            names: names.into_bump_slice(),
            span: keyword.span.to(end),
        })))
    }

    fn parse_import_alias(&mut self, dotted: bool) -> PResult<ImportAlias<'ast>> {
        let (name, mut span) = if dotted {
            self.parse_dotted_name()?
        } else {
            let token = self.expect(TokenKind::Identifier, "name to import")?;
            (token.lexeme, token.span)
        };
        let asname = if self.eat(TokenKind::As).is_some() {
            let alias = self.expect(TokenKind::Identifier, "alias name")?;
            span = span.to(alias.span);
            Some(Ident::new(alias.lexeme, alias.span))
        } else {
            None
        };
        let id = self.node_id();
        Ok(ImportAlias {
            id,
            name,
            asname,
            span,
        })
    }

    /// `a.b.c`, returned as one arena string.
    fn parse_dotted_name(&mut self) -> PResult<(&'ast str, Span)> {
        let first = self.expect(TokenKind::Identifier, "module name")?;
        if !self.check(TokenKind::Dot) {
            return Ok((first.lexeme, first.span));
        }

        let mut name = String::from(first.lexeme);
        let mut span = first.span;
        while self.eat(TokenKind::Dot).is_some() {
            let part = self.expect(TokenKind::Identifier, "module name")?;
            name.push('.');
            name.push_str(part.lexeme);
            span = span.to(part.span);
        }
        Ok((self.arena.alloc_str(&name), span))
    }

    // =========================================
    // Compound statements
    // =========================================

    /// Parse `':' block`, where the block is either an indented suite or
    /// simple statements on the same line.
    fn parse_block(&mut self) -> PResult<&'ast [Stmt<'ast>]> {
        self.expect(TokenKind::Colon, "':'")?;
        let mut body = BVec::new_in(self.arena);

        if self.eat(TokenKind::Newline).is_none() {
            self.parse_simple_statements(&mut body)?;
            return Ok(body.into_bump_slice());
        }

        self.expect(TokenKind::Indent, "an indented block")?;
        while !self.check(TokenKind::Dedent) && !self.check(TokenKind::Eof) {
            if let Err(err) = self.parse_statement_into(&mut body) {
                self.record(err);
                self.synchronize();
            }
        }
        self.eat(TokenKind::Dedent);
        Ok(body.into_bump_slice())
    }

    fn parse_if(&mut self) -> PResult<Stmt<'ast>> {
        let keyword = self.expect(TokenKind::If, "'if'")?;
        let test = self.parse_expr()?;
        let body = self.parse_block()?;

        let mut elifs = BVec::new_in(self.arena);
        while let Some(elif) = self.eat(TokenKind::Elif) {
            let test = self.parse_expr()?;
            let body = self.parse_block()?;
            elifs.push(ElifClause {
                test,
                body,
                span: elif.span.to(test.span()),
            });
        }

        let orelse: &'ast [Stmt<'ast>] = if self.eat(TokenKind::Else).is_some() {
            self.parse_block()?
        } else {
            &[]
        };

        Ok(Stmt::If(self.alloc(IfStmt {
            test,
            body,
            elifs: elifs.into_bump_slice(),
            orelse,
            span: keyword.span.to(test.span()),
        })))
    }

    fn parse_while(&mut self) -> PResult<Stmt<'ast>> {
        let keyword = self.expect(TokenKind::While, "'while'")?;
        let test = self.parse_expr()?;
        let body = self.parse_block()?;
        self.reject_loop_else()?;
        Ok(Stmt::While(self.alloc(WhileStmt {
            test,
            body,
            span: keyword.span.to(test.span()),
        })))
    }

    fn parse_for(&mut self) -> PResult<Stmt<'ast>> {
        let keyword = self.expect(TokenKind::For, "'for'")?;
        let target = self.parse_for_target()?;
        self.expect(TokenKind::In, "'in'")?;
        let iter = self.parse_expr_list()?;
        let body = self.parse_block()?;
        self.reject_loop_else()?;
        Ok(Stmt::For(self.alloc(ForStmt {
            target,
            iter,
            body,
            span: keyword.span.to(iter.span()),
        })))
    }

    /// Loop targets stop before `in`, so they are parsed below the
    /// comparison level.
    fn parse_for_target(&mut self) -> PResult<Expr<'ast>> {
        let first = self.parse_binary(0)?;
        if self.check(TokenKind::Comma) {
            return Err(CompilerError::unsupported("tuple unpacking", first.span()));
        }
        self.check_target(first)?;
        Ok(first)
    }

    fn reject_loop_else(&mut self) -> PResult<()> {
        if let Some(token) = self.eat(TokenKind::Else) {
            self.parse_block()?;
            return Err(CompilerError::unsupported("loop 'else' clause", token.span));
        }
        Ok(())
    }

    fn parse_decorated(&mut self) -> PResult<Stmt<'ast>> {
        let mut decorators = BVec::new_in(self.arena);
        while self.eat(TokenKind::At).is_some() {
            decorators.push(self.parse_expr()?);
            self.expect(TokenKind::Newline, "newline after decorator")?;
        }

        if self.check(TokenKind::Class) {
            let span = decorators.first().map_or(self.peek().span, |d: &Expr<'ast>| d.span());
            self.unsupported("class decorator", span);
            return self.parse_class();
        }
        self.parse_function(decorators.into_bump_slice())
    }

    fn parse_function(&mut self, decorators: &'ast [Expr<'ast>]) -> PResult<Stmt<'ast>> {
        let keyword = self.expect(TokenKind::Def, "'def'")?;
        let name_token = self.expect(TokenKind::Identifier, "function name")?;
        let name = Ident::new(name_token.lexeme, name_token.span);

        self.expect(TokenKind::LeftParen, "'('")?;
        let mut params = BVec::new_in(self.arena);
        while !self.check(TokenKind::RightParen) {
            params.push(self.parse_param()?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RightParen, "')'")?;

        let returns = if self.eat(TokenKind::Arrow).is_some() {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let body = self.parse_block()?;
        let id = self.node_id();
        Ok(Stmt::FunctionDef(self.alloc(FunctionDef {
            id,
            name,
            params: params.into_bump_slice(),
            returns,
            body,
            decorators,
            public: false,
            span: keyword.span.to(name.span),
        })))
    }

    fn parse_param(&mut self) -> PResult<Param<'ast>> {
        if let Some(token) = self.eat_any(&[TokenKind::Star, TokenKind::DoubleStar, TokenKind::Slash]) {
            return Err(CompilerError::unsupported("variadic or positional-only parameters", token.span));
        }

        let name_token = self.expect(TokenKind::Identifier, "parameter name")?;
        let name = Ident::new(name_token.lexeme, name_token.span);
        let annotation = if self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_expr()?)
        } else {
            None
        };
        if let Some(token) = self.eat(TokenKind::Equal) {
            return Err(CompilerError::unsupported("default parameter value", token.span));
        }

        let span = annotation.map_or(name.span, |a| name.span.to(a.span()));
        let id = self.node_id();
        Ok(Param {
            id,
            name,
            annotation,
            span,
        })
    }

    fn parse_class(&mut self) -> PResult<Stmt<'ast>> {
        let keyword = self.expect(TokenKind::Class, "'class'")?;
        let name_token = self.expect(TokenKind::Identifier, "class name")?;
        let name = Ident::new(name_token.lexeme, name_token.span);

        let mut bases = BVec::new_in(self.arena);
        if self.eat(TokenKind::LeftParen).is_some() {
            while !self.check(TokenKind::RightParen) {
                bases.push(self.parse_expr()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RightParen, "')'")?;
        }

        let body = self.parse_block()?;
        let id = self.node_id();
        Ok(Stmt::ClassDef(self.alloc(ClassDef {
            id,
            name,
            bases: bases.into_bump_slice(),
            body,
            span: keyword.span.to(name.span),
        })))
    }

    // =========================================
    // Skipping unsupported constructs
    // =========================================

    /// Report a compound statement as unsupported and skip its header,
    /// block and any continuation clauses.
    fn skip_compound(&mut self, construct: &str, clauses: &[TokenKind]) {
        let span = self.peek().span;
        self.unsupported(construct, span);
        loop {
            self.synchronize();
            if !clauses.contains(&self.peek().kind) {
                return;
            }
        }
    }

    fn skip_to_line_end(&mut self) {
        while !matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof
        ) {
            self.advance();
        }
    }
}
