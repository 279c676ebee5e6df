//! Expression parsing.
//!
//! Boolean operators, `not`, comparisons and conditional expressions are
//! parsed by dedicated precedence levels; arithmetic and bitwise operators
//! use Pratt parsing driven by [`BinaryOp::binding_power`].

use bumpalo::collections::Vec as BVec;
use neopyc_core::{CompilerError, Span};

use super::parser::Parser;
use crate::ast::expr::*;
use crate::ast::literal::{IntValue, StringValue, decode_string, parse_int};
use crate::ast::{BinaryOp, BoolOp, Ident, UnaryOp};
use crate::lexer::TokenKind;

type PResult<T> = Result<T, CompilerError>;

impl<'ast> Parser<'ast> {
    /// Parse a comma separated expression list; more than one element (or a
    /// trailing comma) produces a tuple display.
    pub(super) fn parse_expr_list(&mut self) -> PResult<Expr<'ast>> {
        let first = self.parse_expr()?;
        if !self.check(TokenKind::Comma) {
            return Ok(first);
        }

        let mut elements = BVec::new_in(self.arena);
        elements.push(first);
        while self.eat(TokenKind::Comma).is_some() {
            if !self.starts_expression() {
                break;
            }
            elements.push(self.parse_expr()?);
        }
        let span = first.span().to(elements.last().map_or(first.span(), |e| e.span()));
        Ok(self.sequence(false, elements.into_bump_slice(), span))
    }

    /// Parse a single expression, including conditional expressions.
    pub(super) fn parse_expr(&mut self) -> PResult<Expr<'ast>> {
        if let Some(token) = self.eat(TokenKind::Lambda) {
            return Err(CompilerError::unsupported("lambda expression", token.span));
        }
        if let Some(token) = self.eat(TokenKind::Yield) {
            return Err(CompilerError::unsupported("yield expression", token.span));
        }

        let body = self.parse_or()?;
        if self.eat(TokenKind::If).is_none() {
            if let Some(token) = self.eat(TokenKind::Walrus) {
                return Err(CompilerError::unsupported("assignment expression", token.span));
            }
            return Ok(body);
        }

        let test = self.parse_or()?;
        self.expect(TokenKind::Else, "'else' in conditional expression")?;
        let orelse = self.parse_expr()?;
        let span = body.span().to(orelse.span());
        let id = self.node_id();
        Ok(Expr::IfExp(self.alloc(IfExpr {
            id,
            test,
            body,
            orelse,
            span,
        })))
    }

    fn parse_or(&mut self) -> PResult<Expr<'ast>> {
        let mut left = self.parse_and()?;
        while self.eat(TokenKind::Or).is_some() {
            let right = self.parse_and()?;
            left = self.bool_op(BoolOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expr<'ast>> {
        let mut left = self.parse_not()?;
        while self.eat(TokenKind::And).is_some() {
            let right = self.parse_not()?;
            left = self.bool_op(BoolOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> PResult<Expr<'ast>> {
        if let Some(token) = self.eat(TokenKind::Not) {
            let operand = self.parse_not()?;
            let span = token.span.to(operand.span());
            let id = self.node_id();
            return Ok(Expr::Unary(self.alloc(UnaryExpr {
                id,
                op: UnaryOp::Not,
                operand,
                span,
            })));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> PResult<Expr<'ast>> {
        let left = self.parse_binary(0)?;

        let mut ops = BVec::new_in(self.arena);
        let mut comparators = BVec::new_in(self.arena);
        while let Some(op) = self.comparison_operator() {
            ops.push(op);
            comparators.push(self.parse_binary(0)?);
        }

        let span = left.span().to(comparators.last().map_or(left.span(), |e| e.span()));
        match ops.len() {
            0 => Ok(left),
            1 => Ok(self.binary(left, ops[0], comparators[0])),
            _ => {
                let id = self.node_id();
                Ok(Expr::Compare(self.alloc(CompareExpr {
                    id,
                    left,
                    ops: ops.into_bump_slice(),
                    comparators: comparators.into_bump_slice(),
                    span,
                })))
            }
        }
    }

    /// Consume a comparison operator, including `not in` and `is not`.
    fn comparison_operator(&mut self) -> Option<BinaryOp> {
        let op = match self.peek().kind {
            TokenKind::EqualEqual => BinaryOp::Eq,
            TokenKind::NotEqual => BinaryOp::NotEq,
            TokenKind::Less => BinaryOp::Lt,
            TokenKind::LessEqual => BinaryOp::LtE,
            TokenKind::Greater => BinaryOp::Gt,
            TokenKind::GreaterEqual => BinaryOp::GtE,
            TokenKind::In => BinaryOp::In,
            TokenKind::Is => {
                self.advance();
                return Some(if self.eat(TokenKind::Not).is_some() {
                    BinaryOp::IsNot
                } else {
                    BinaryOp::Is
                });
            }
            TokenKind::Not if self.peek_nth(1).kind == TokenKind::In => {
                self.advance();
                self.advance();
                return Some(BinaryOp::NotIn);
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    /// Pratt loop over the arithmetic and bitwise operators.
    pub(super) fn parse_binary(&mut self, min_bp: u8) -> PResult<Expr<'ast>> {
        let mut lhs = self.parse_unary()?;

        while let Some(op) = BinaryOp::from_token(self.peek().kind) {
            let (l_bp, r_bp) = op.binding_power();
            if l_bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(r_bp)?;
            lhs = self.binary(lhs, op, rhs);
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr<'ast>> {
        if let Some(op) = UnaryOp::from_token(self.peek().kind) {
            let token = self.advance();
            let operand = self.parse_binary(UnaryOp::ARITHMETIC_BP)?;
            let span = token.span.to(operand.span());
            let id = self.node_id();
            return Ok(Expr::Unary(self.alloc(UnaryExpr {
                id,
                op,
                operand,
                span,
            })));
        }
        if let Some(token) = self.eat(TokenKind::Await) {
            return Err(CompilerError::unsupported("await expression", token.span));
        }

        let atom = self.parse_atom()?;
        self.parse_postfix(atom)
    }

    // =========================================
    // Postfix: calls, subscripts, attributes
    // =========================================

    fn parse_postfix(&mut self, mut expr: Expr<'ast>) -> PResult<Expr<'ast>> {
        loop {
            match self.peek().kind {
                TokenKind::LeftParen => expr = self.parse_call(expr)?,
                TokenKind::LeftBracket => expr = self.parse_subscript(expr)?,
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect(TokenKind::Identifier, "attribute name")?;
                    let span = expr.span().to(name.span);
                    let id = self.node_id();
                    expr = Expr::Attribute(self.alloc(AttributeExpr {
                        id,
                        value: expr,
                        attr: Ident::new(name.lexeme, name.span),
                        span,
                    }));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_call(&mut self, func: Expr<'ast>) -> PResult<Expr<'ast>> {
        self.expect(TokenKind::LeftParen, "'('")?;
        let mut args = BVec::new_in(self.arena);

        while !self.check(TokenKind::RightParen) {
            if let Some(star) = self.eat_any(&[TokenKind::Star, TokenKind::DoubleStar]) {
                return Err(CompilerError::unsupported("argument unpacking", star.span));
            }
            if self.check(TokenKind::Identifier) && self.peek_nth(1).kind == TokenKind::Equal {
                return Err(CompilerError::unsupported("keyword argument", self.peek().span));
            }
            let arg = self.parse_expr()?;
            if let Some(token) = self.eat(TokenKind::For) {
                return Err(CompilerError::unsupported("generator expression", token.span));
            }
            args.push(arg);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        let close = self.expect(TokenKind::RightParen, "')' to close the call")?;
        let span = func.span().to(close.span);
        let id = self.node_id();
        Ok(Expr::Call(self.alloc(CallExpr {
            id,
            func,
            args: args.into_bump_slice(),
            span,
        })))
    }

    fn parse_subscript(&mut self, value: Expr<'ast>) -> PResult<Expr<'ast>> {
        self.expect(TokenKind::LeftBracket, "'['")?;

        let lower = if self.check(TokenKind::Colon) {
            None
        } else {
            Some(self.parse_expr_list()?)
        };

        if self.eat(TokenKind::Colon).is_none() {
            let close = self.expect(TokenKind::RightBracket, "']'")?;
            let span = value.span().to(close.span);
            let index = lower.ok_or_else(|| self.unexpected("subscript"))?;
            let id = self.node_id();
            return Ok(Expr::Subscript(self.alloc(SubscriptExpr {
                id,
                value,
                index,
                span,
            })));
        }

        let upper = if self.check(TokenKind::RightBracket) || self.check(TokenKind::Colon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        if let Some(colon) = self.eat(TokenKind::Colon) {
            if !self.check(TokenKind::RightBracket) {
                return Err(CompilerError::unsupported("slice step", colon.span));
            }
        }
        let close = self.expect(TokenKind::RightBracket, "']'")?;
        let span = value.span().to(close.span);
        let id = self.node_id();
        Ok(Expr::Slice(self.alloc(SliceExpr {
            id,
            value,
            lower,
            upper,
            span,
        })))
    }

    // =========================================
    // Atoms
    // =========================================

    fn parse_atom(&mut self) -> PResult<Expr<'ast>> {
        let token = *self.peek();
        match token.kind {
            TokenKind::Identifier => {
                self.advance();
                let id = self.node_id();
                Ok(Expr::Name(self.alloc(NameExpr {
                    id,
                    name: token.lexeme,
                    span: token.span,
                })))
            }
            TokenKind::Int => {
                self.advance();
                let value = parse_int(token.lexeme).map_err(|message| CompilerError::Syntax {
                    message,
                    span: token.span,
                })?;
                let value = match value {
                    IntValue::Small(value) => Literal::Int(value),
                    IntValue::Big(value) => Literal::BigInt(self.arena.alloc_slice_copy(&value.to_signed_bytes_le())),
                };
                Ok(self.literal(value, token.span))
            }
            TokenKind::Float => {
                self.advance();
                Err(CompilerError::unsupported("floating point literal", token.span))
            }
            TokenKind::Str | TokenKind::Bytes => self.parse_strings(),
            TokenKind::True => {
                self.advance();
                Ok(self.literal(Literal::Bool(true), token.span))
            }
            TokenKind::False => {
                self.advance();
                Ok(self.literal(Literal::Bool(false), token.span))
            }
            TokenKind::None => {
                self.advance();
                Ok(self.literal(Literal::None, token.span))
            }
            TokenKind::Ellipsis => {
                self.advance();
                Err(CompilerError::unsupported("ellipsis", token.span))
            }
            TokenKind::LeftParen => self.parse_parenthesized(),
            TokenKind::LeftBracket => self.parse_list(),
            TokenKind::LeftBrace => self.parse_dict(),
            _ => Err(self.unexpected("expression")),
        }
    }

    /// Adjacent string literals concatenate, as in Python.
    fn parse_strings(&mut self) -> PResult<Expr<'ast>> {
        let first = *self.peek();
        let mut text = String::new();
        let mut bytes = Vec::new();
        let is_bytes = first.kind == TokenKind::Bytes;
        let mut span = first.span;

        while let Some(token) = self.eat_any(&[TokenKind::Str, TokenKind::Bytes]) {
            span = span.to(token.span);
            let decoded = decode_string(token.lexeme).map_err(|message| CompilerError::Syntax {
                message,
                span: token.span,
            })?;
            match (decoded, is_bytes) {
                (StringValue::Str(s), false) => text.push_str(&s),
                (StringValue::Bytes(b), true) => bytes.extend_from_slice(&b),
                _ => {
                    return Err(CompilerError::Syntax {
                        message: "cannot mix bytes and nonbytes literals".to_string(),
                        span: token.span,
                    });
                }
            }
        }

        let value = if is_bytes {
            Literal::Bytes(self.arena.alloc_slice_copy(&bytes))
        } else {
            Literal::Str(self.arena.alloc_str(&text))
        };
        Ok(self.literal(value, span))
    }

    fn parse_parenthesized(&mut self) -> PResult<Expr<'ast>> {
        let open = self.expect(TokenKind::LeftParen, "'('")?;
        if let Some(close) = self.eat(TokenKind::RightParen) {
            let empty: &[Expr<'ast>] = &[];
            return Ok(self.sequence(false, empty, open.span.to(close.span)));
        }

        let inner = self.parse_expr()?;
        if let Some(token) = self.eat(TokenKind::For) {
            return Err(CompilerError::unsupported("generator expression", token.span));
        }
        if !self.check(TokenKind::Comma) {
            self.expect(TokenKind::RightParen, "')'")?;
            return Ok(inner);
        }

        let mut elements = BVec::new_in(self.arena);
        elements.push(inner);
        while self.eat(TokenKind::Comma).is_some() {
            if self.check(TokenKind::RightParen) {
                break;
            }
            elements.push(self.parse_expr()?);
        }
        let close = self.expect(TokenKind::RightParen, "')'")?;
        Ok(self.sequence(false, elements.into_bump_slice(), open.span.to(close.span)))
    }

    fn parse_list(&mut self) -> PResult<Expr<'ast>> {
        let open = self.expect(TokenKind::LeftBracket, "'['")?;
        let mut elements = BVec::new_in(self.arena);

        while !self.check(TokenKind::RightBracket) {
            elements.push(self.parse_expr()?);
            if let Some(token) = self.eat(TokenKind::For) {
                return Err(CompilerError::unsupported("list comprehension", token.span));
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        let close = self.expect(TokenKind::RightBracket, "']'")?;
        Ok(self.sequence(true, elements.into_bump_slice(), open.span.to(close.span)))
    }

    fn parse_dict(&mut self) -> PResult<Expr<'ast>> {
        let open = self.expect(TokenKind::LeftBrace, "'{'")?;
        let mut keys = BVec::new_in(self.arena);
        let mut values = BVec::new_in(self.arena);

        while !self.check(TokenKind::RightBrace) {
            let key = self.parse_expr()?;
            if !self.check(TokenKind::Colon) {
                return Err(CompilerError::unsupported("set display", key.span()));
            }
            self.advance();
            let value = self.parse_expr()?;
            if let Some(token) = self.eat(TokenKind::For) {
                return Err(CompilerError::unsupported("dict comprehension", token.span));
            }
            keys.push(key);
            values.push(value);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        let close = self.expect(TokenKind::RightBrace, "'}'")?;
        let id = self.node_id();
        Ok(Expr::Dict(self.alloc(DictExpr {
            id,
            keys: keys.into_bump_slice(),
            values: values.into_bump_slice(),
            span: open.span.to(close.span),
        })))
    }

    // =========================================
    // Node construction
    // =========================================

    pub(super) fn literal(&mut self, value: Literal<'ast>, span: Span) -> Expr<'ast> {
        let id = self.node_id();
        Expr::Literal(self.alloc(LiteralExpr { id, value, span }))
    }

    fn binary(&mut self, left: Expr<'ast>, op: BinaryOp, right: Expr<'ast>) -> Expr<'ast> {
        let span = left.span().to(right.span());
        let id = self.node_id();
        Expr::Binary(self.alloc(BinaryExpr {
            id,
            left,
            op,
            right,
            span,
        }))
    }

    fn bool_op(&mut self, op: BoolOp, left: Expr<'ast>, right: Expr<'ast>) -> Expr<'ast> {
        let span = left.span().to(right.span());
        let id = self.node_id();
        Expr::BoolOp(self.alloc(BoolOpExpr {
            id,
            op,
            left,
            right,
            span,
        }))
    }

    fn sequence(&mut self, list: bool, elements: &'ast [Expr<'ast>], span: Span) -> Expr<'ast> {
        let id = self.node_id();
        let node = self.alloc(SequenceExpr { id, elements, span });
        if list { Expr::List(node) } else { Expr::Tuple(node) }
    }

    /// Whether the current token can begin an expression.
    pub(super) fn starts_expression(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Identifier
                | TokenKind::Int
                | TokenKind::Float
                | TokenKind::Str
                | TokenKind::Bytes
                | TokenKind::True
                | TokenKind::False
                | TokenKind::None
                | TokenKind::LeftParen
                | TokenKind::LeftBracket
                | TokenKind::LeftBrace
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::Tilde
                | TokenKind::Not
                | TokenKind::Lambda
                | TokenKind::Await
                | TokenKind::Ellipsis
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use bumpalo::Bump;

    fn parse_expr<'a>(arena: &'a Bump, source: &str) -> Expr<'a> {
        let module = Parser::parse(source, arena).expect("source parses");
        match module.body[0] {
            Stmt::Expr(stmt) => stmt.expr,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_precedence() {
        let arena = Bump::new();
        let Expr::Binary(add) = parse_expr(&arena, "1 + 2 * 3\n") else {
            panic!("expected binary");
        };
        assert_eq!(add.op, BinaryOp::Add);
        assert!(matches!(add.right, Expr::Binary(mul) if mul.op == BinaryOp::Mul));
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        let arena = Bump::new();
        let Expr::Unary(neg) = parse_expr(&arena, "-2 ** 2\n") else {
            panic!("expected unary");
        };
        assert_eq!(neg.op, UnaryOp::Neg);
        assert!(matches!(neg.operand, Expr::Binary(pow) if pow.op == BinaryOp::Pow));
    }

    #[test]
    fn single_comparison_is_binary() {
        let arena = Bump::new();
        let expr = parse_expr(&arena, "a is not None\n");
        assert!(matches!(expr, Expr::Binary(b) if b.op == BinaryOp::IsNot));
    }

    #[test]
    fn comparison_chain() {
        let arena = Bump::new();
        let Expr::Compare(cmp) = parse_expr(&arena, "a < b <= c\n") else {
            panic!("expected comparison chain");
        };
        assert_eq!(cmp.ops, &[BinaryOp::Lt, BinaryOp::LtE]);
        assert_eq!(cmp.comparators.len(), 2);
    }

    #[test]
    fn boolean_operators() {
        let arena = Bump::new();
        let Expr::BoolOp(or) = parse_expr(&arena, "a and b or not c\n") else {
            panic!("expected bool op");
        };
        assert_eq!(or.op, BoolOp::Or);
        assert!(matches!(or.left, Expr::BoolOp(and) if and.op == BoolOp::And));
        assert!(matches!(or.right, Expr::Unary(not) if not.op == UnaryOp::Not));
    }

    #[test]
    fn postfix_chain() {
        let arena = Bump::new();
        let Expr::Call(call) = parse_expr(&arena, "obj.items[0](x, y)\n") else {
            panic!("expected call");
        };
        assert_eq!(call.args.len(), 2);
        let Expr::Subscript(sub) = call.func else {
            panic!("expected subscript");
        };
        assert!(matches!(sub.value, Expr::Attribute(attr) if attr.attr.name == "items"));
    }

    #[test]
    fn slices() {
        let arena = Bump::new();
        let Expr::Slice(slice) = parse_expr(&arena, "s[1:]\n") else {
            panic!("expected slice");
        };
        assert!(slice.lower.is_some());
        assert!(slice.upper.is_none());

        let Expr::Slice(slice) = parse_expr(&arena, "s[:3]\n") else {
            panic!("expected slice");
        };
        assert!(slice.lower.is_none());
        assert!(slice.upper.is_some());
    }

    #[test]
    fn displays() {
        let arena = Bump::new();
        assert!(matches!(parse_expr(&arena, "[1, 2, 3]\n"), Expr::List(l) if l.elements.len() == 3));
        assert!(matches!(parse_expr(&arena, "(1,)\n"), Expr::Tuple(t) if t.elements.len() == 1));
        assert!(matches!(parse_expr(&arena, "()\n"), Expr::Tuple(t) if t.elements.is_empty()));
        assert!(matches!(parse_expr(&arena, "(1)\n"), Expr::Literal(_)));
        assert!(matches!(parse_expr(&arena, "{'a': 1, 'b': 2}\n"), Expr::Dict(d) if d.keys.len() == 2));
    }

    #[test]
    fn conditional_expression() {
        let arena = Bump::new();
        assert!(matches!(parse_expr(&arena, "a if c else b\n"), Expr::IfExp(_)));
    }

    #[test]
    fn string_concatenation() {
        let arena = Bump::new();
        let expr = parse_expr(&arena, "'ab' \"cd\"\n");
        assert_eq!(expr.as_literal(), Some(&Literal::Str("abcd")));
    }

    #[test]
    fn large_integer_literal() {
        let arena = Bump::new();
        let expr = parse_expr(&arena, "0xFFFFFFFFFFFFFFFFFF\n");
        assert_eq!(expr.as_literal(), Some(&Literal::Int(0xFF_FFFF_FFFF_FFFF_FFFF)));
    }

    #[test]
    fn integer_literal_beyond_i128() {
        let arena = Bump::new();
        let source = format!("{}\n", "1".repeat(45));
        let expr = parse_expr(&arena, &source);
        let Some(Literal::BigInt(bytes)) = expr.as_literal() else {
            panic!("expected a big integer literal, got {expr:?}");
        };
        let expected = num_bigint::BigInt::parse_bytes("1".repeat(45).as_bytes(), 10).unwrap();
        assert_eq!(num_bigint::BigInt::from_signed_bytes_le(bytes), expected);
    }

    #[test]
    fn unsupported_constructs_are_reported() {
        let arena = Bump::new();
        for source in ["lambda x: x\n", "[x for x in y]\n", "f(a=1)\n", "1.5\n", "{1, 2}\n"] {
            let errors = Parser::parse(source, &arena).unwrap_err();
            assert!(
                matches!(errors[0], neopyc_core::CompilerError::UnsupportedSyntax { .. }),
                "{source:?} gave {errors:?}"
            );
        }
    }

    #[test]
    fn node_ids_are_unique() {
        let arena = Bump::new();
        let Expr::Binary(bin) = parse_expr(&arena, "a + b\n") else {
            panic!("expected binary");
        };
        assert_ne!(bin.left.id(), bin.right.id());
        assert_ne!(bin.id, bin.left.id());
    }
}
