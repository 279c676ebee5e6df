//! Normalisation pass: rewrites syntactic sugar into the core statement set.
//!
//! The pass builds a new tree in the same arena; untouched subtrees are
//! shared with the input. After it runs, the tree has:
//!
//! - no `for` loops: each becomes hidden sequence/index variables and a
//!   `while` loop that advances the index at the top of the body
//! - no augmented assignments
//! - no `elif` clauses: they are nested `if` statements in `orelse`
//! - no decorators: `@public` sets [`FunctionDef::public`]
//! - no comparison chains: `a < b < c` is `a < b and b < c`
//! - no `pass` statements or docstrings

use bumpalo::Bump;
use bumpalo::collections::Vec as BVec;

use neopyc_core::{CompilerError, Diagnostics, NodeId, Span};
use neopyc_parser::ast::*;

/// Rewrites a parsed module into its normalised form.
pub struct NormalizePass<'a, 'ast> {
    arena: &'ast Bump,
    ids: &'a mut NodeIdGen,
    diagnostics: &'a mut Diagnostics,
    /// Counter for hidden loop variables.
    hidden: usize,
}

impl<'a, 'ast> NormalizePass<'a, 'ast> {
    pub fn new(arena: &'ast Bump, ids: &'a mut NodeIdGen, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            arena,
            ids,
            diagnostics,
            hidden: 0,
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self, module: Module<'ast>) -> Module<'ast> {
        let body = self.block(module.body);
        tracing::trace!(loops = self.hidden, "normalised module");
        Module {
            body,
            span: module.span,
        }
    }

    // =========================================
    // Statements
    // =========================================

    fn block(&mut self, stmts: &'ast [Stmt<'ast>]) -> &'ast [Stmt<'ast>] {
        let mut out = BVec::with_capacity_in(stmts.len(), self.arena);
        for stmt in stmts {
            self.stmt(*stmt, &mut out);
        }
        out.into_bump_slice()
    }

    fn stmt(&mut self, stmt: Stmt<'ast>, out: &mut BVec<'ast, Stmt<'ast>>) {
        match stmt {
            Stmt::Pass(_) => {}
            Stmt::Expr(ExprStmt {
                expr: Expr::Literal(LiteralExpr {
                    value: Literal::Str(_), ..
                }),
                ..
            }) => {}
            Stmt::Expr(s) => {
                let expr = self.expr(s.expr);
                out.push(Stmt::Expr(self.arena.alloc(ExprStmt { expr, ..*s })));
            }
            Stmt::Assign(s) => {
                let target = self.expr(s.target);
                let value = self.expr(s.value);
                out.push(Stmt::Assign(self.arena.alloc(AssignStmt { target, value, ..*s })));
            }
            Stmt::AnnAssign(s) => {
                let value = s.value.map(|value| self.expr(value));
                out.push(Stmt::AnnAssign(self.arena.alloc(AnnAssignStmt { value, ..*s })));
            }
            Stmt::AugAssign(s) => self.augmented(s, out),
            Stmt::Return(s) => {
                let value = s.value.map(|value| self.expr(value));
                out.push(Stmt::Return(self.arena.alloc(ReturnStmt { value, ..*s })));
            }
            Stmt::If(s) => out.push(Stmt::If(self.if_chain(s.test, s.body, s.elifs, s.orelse, s.span))),
            Stmt::While(s) => {
                let test = self.expr(s.test);
                let body = self.block(s.body);
                out.push(Stmt::While(self.arena.alloc(WhileStmt { test, body, span: s.span })));
            }
            Stmt::For(s) => self.for_loop(s, out),
            Stmt::Assert(s) => {
                let test = self.expr(s.test);
                let msg = s.msg.map(|msg| self.expr(msg));
                out.push(Stmt::Assert(self.arena.alloc(AssertStmt { test, msg, span: s.span })));
            }
            Stmt::FunctionDef(def) => out.push(Stmt::FunctionDef(self.function(def))),
            Stmt::ClassDef(class) => {
                let body = self.block(class.body);
                out.push(Stmt::ClassDef(self.arena.alloc(ClassDef { body, ..*class })));
            }
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Import(_) | Stmt::ImportFrom(_) => out.push(stmt),
        }
    }

    /// `a op= b` becomes `a = a op b`; the target is evaluated twice.
    fn augmented(&mut self, s: &'ast AugAssignStmt<'ast>, out: &mut BVec<'ast, Stmt<'ast>>) {
        let target = self.expr(s.target);
        if !target.is_side_effect_free() {
            self.diagnostics.error(CompilerError::unsupported(
                "augmented assignment to a target with side effects",
                target.span(),
            ));
            return;
        }
        let right = self.expr(s.value);
        let id = self.fresh();
        let value = Expr::Binary(self.arena.alloc(BinaryExpr {
            id,
            left: target,
            op: s.op,
            right,
            span: s.span,
        }));
        out.push(Stmt::Assign(self.arena.alloc(AssignStmt {
            target,
            value,
            span: s.span,
        })));
    }

    fn if_chain(
        &mut self,
        test: Expr<'ast>,
        body: &'ast [Stmt<'ast>],
        elifs: &'ast [ElifClause<'ast>],
        orelse: &'ast [Stmt<'ast>],
        span: Span,
    ) -> &'ast IfStmt<'ast> {
        let test = self.expr(test);
        let body = self.block(body);
        let orelse = match elifs.split_first() {
            Some((first, rest)) => {
                let nested = self.if_chain(first.test, first.body, rest, orelse, first.span);
                self.arena.alloc_slice_copy(&[Stmt::If(nested)])
            }
            None => self.block(orelse),
        };
        self.arena.alloc(IfStmt {
            test,
            body,
            elifs: &[],
            orelse,
            span,
        })
    }

    /// Lower a `for` loop:
    ///
    /// ```text
    /// $seqN = seq                    $idxN = start
    /// $idxN = 0                      $stopN = stop
    /// while $idxN < len($seqN):      while $idxN < $stopN:
    ///     x = $seqN[$idxN]               x = $idxN
    ///     $idxN = $idxN + 1              $idxN = $idxN + 1
    ///     body                           body
    /// ```
    ///
    /// The right-hand form is used for `range(stop)` and `range(start, stop)`.
    fn for_loop(&mut self, s: &'ast ForStmt<'ast>, out: &mut BVec<'ast, Stmt<'ast>>) {
        let Expr::Name(_) = s.target else {
            self.diagnostics.error(CompilerError::unsupported(
                "loop target that is not a plain name",
                s.target.span(),
            ));
            return;
        };

        let n = self.hidden;
        self.hidden += 1;
        let span = s.span;
        let iter = self.expr(s.iter);
        let idx_name: &'ast str = self.arena.alloc_str(&format!("$idx{n}"));

        let (limit, item) = match range_bounds(iter) {
            Some(Ok((start, stop))) => {
                let stop_name: &'ast str = self.arena.alloc_str(&format!("$stop{n}"));
                let start = match start {
                    Some(start) => start,
                    None => self.int(0, span),
                };
                let idx = self.name(idx_name, span);
                out.push(self.assign(idx, start, span));
                let stop_var = self.name(stop_name, span);
                out.push(self.assign(stop_var, stop, span));

                let limit = self.name(stop_name, span);
                let item = self.name(idx_name, span);
                (limit, item)
            }
            Some(Err(call)) => {
                self.diagnostics
                    .error(CompilerError::unsupported("range() with a step", call.span));
                return;
            }
            None => {
                let seq_name: &'ast str = self.arena.alloc_str(&format!("$seq{n}"));
                let seq = self.name(seq_name, span);
                out.push(self.assign(seq, iter, span));
                let idx = self.name(idx_name, span);
                let zero = self.int(0, span);
                out.push(self.assign(idx, zero, span));

                let len = self.name("len", span);
                let seq_arg = self.name(seq_name, span);
                let limit = self.call(len, seq_arg, span);
                let seq_load = self.name(seq_name, span);
                let idx_load = self.name(idx_name, span);
                let id = self.fresh();
                let item = Expr::Subscript(self.arena.alloc(SubscriptExpr {
                    id,
                    value: seq_load,
                    index: idx_load,
                    span,
                }));
                (limit, item)
            }
        };

        let idx_test = self.name(idx_name, span);
        let test = self.binary(idx_test, BinaryOp::Lt, limit, span);

        let mut body = BVec::with_capacity_in(s.body.len() + 2, self.arena);
        body.push(self.assign(s.target, item, span));
        let idx_target = self.name(idx_name, span);
        let idx_load = self.name(idx_name, span);
        let one = self.int(1, span);
        let step = self.binary(idx_load, BinaryOp::Add, one, span);
        body.push(self.assign(idx_target, step, span));
        for stmt in s.body {
            self.stmt(*stmt, &mut body);
        }

        out.push(Stmt::While(self.arena.alloc(WhileStmt {
            test,
            body: body.into_bump_slice(),
            span,
        })));
    }

    fn function(&mut self, def: &'ast FunctionDef<'ast>) -> &'ast FunctionDef<'ast> {
        let mut public = def.public;
        for decorator in def.decorators {
            let is_public = match decorator {
                Expr::Name(name) => name.name == "public",
                Expr::Attribute(attr) => attr.attr.name == "public",
                _ => false,
            };
            if is_public {
                public = true;
            } else {
                self.diagnostics.error(CompilerError::unsupported(
                    format!("decorator '{}'", describe_decorator(decorator)),
                    decorator.span(),
                ));
            }
        }
        let body = self.block(def.body);
        self.arena.alloc(FunctionDef {
            body,
            decorators: &[],
            public,
            ..*def
        })
    }

    // =========================================
    // Expressions
    // =========================================

    fn expr(&mut self, expr: Expr<'ast>) -> Expr<'ast> {
        self.rewrite(expr).unwrap_or(expr)
    }

    /// The rewritten expression, or `None` if nothing inside changed.
    fn rewrite(&mut self, expr: Expr<'ast>) -> Option<Expr<'ast>> {
        match expr {
            Expr::Literal(_) | Expr::Name(_) => None,
            Expr::Compare(cmp) => Some(self.comparison_chain(cmp)),
            Expr::Binary(e) => {
                let (left, right) = self.pair(e.left, e.right)?;
                Some(Expr::Binary(self.arena.alloc(BinaryExpr { left, right, ..*e })))
            }
            Expr::BoolOp(e) => {
                let (left, right) = self.pair(e.left, e.right)?;
                Some(Expr::BoolOp(self.arena.alloc(BoolOpExpr { left, right, ..*e })))
            }
            Expr::Unary(e) => {
                let operand = self.rewrite(e.operand)?;
                Some(Expr::Unary(self.arena.alloc(UnaryExpr { operand, ..*e })))
            }
            Expr::Call(e) => {
                let func = self.rewrite(e.func);
                let args = self.rewrite_all(e.args);
                if func.is_none() && args.is_none() {
                    return None;
                }
                Some(Expr::Call(self.arena.alloc(CallExpr {
                    func: func.unwrap_or(e.func),
                    args: args.unwrap_or(e.args),
                    ..*e
                })))
            }
            Expr::Attribute(e) => {
                let value = self.rewrite(e.value)?;
                Some(Expr::Attribute(self.arena.alloc(AttributeExpr { value, ..*e })))
            }
            Expr::Subscript(e) => {
                let (value, index) = self.pair(e.value, e.index)?;
                Some(Expr::Subscript(self.arena.alloc(SubscriptExpr { value, index, ..*e })))
            }
            Expr::Slice(e) => {
                let value = self.rewrite(e.value);
                let lower = e.lower.and_then(|lower| self.rewrite(lower));
                let upper = e.upper.and_then(|upper| self.rewrite(upper));
                if value.is_none() && lower.is_none() && upper.is_none() {
                    return None;
                }
                Some(Expr::Slice(self.arena.alloc(SliceExpr {
                    value: value.unwrap_or(e.value),
                    lower: lower.or(e.lower),
                    upper: upper.or(e.upper),
                    ..*e
                })))
            }
            Expr::List(e) => {
                let elements = self.rewrite_all(e.elements)?;
                Some(Expr::List(self.arena.alloc(SequenceExpr { elements, ..*e })))
            }
            Expr::Tuple(e) => {
                let elements = self.rewrite_all(e.elements)?;
                Some(Expr::Tuple(self.arena.alloc(SequenceExpr { elements, ..*e })))
            }
            Expr::Dict(e) => {
                let keys = self.rewrite_all(e.keys);
                let values = self.rewrite_all(e.values);
                if keys.is_none() && values.is_none() {
                    return None;
                }
                Some(Expr::Dict(self.arena.alloc(DictExpr {
                    keys: keys.unwrap_or(e.keys),
                    values: values.unwrap_or(e.values),
                    ..*e
                })))
            }
            Expr::IfExp(e) => {
                let test = self.rewrite(e.test);
                let body = self.rewrite(e.body);
                let orelse = self.rewrite(e.orelse);
                if test.is_none() && body.is_none() && orelse.is_none() {
                    return None;
                }
                Some(Expr::IfExp(self.arena.alloc(IfExpr {
                    test: test.unwrap_or(e.test),
                    body: body.unwrap_or(e.body),
                    orelse: orelse.unwrap_or(e.orelse),
                    ..*e
                })))
            }
        }
    }

    fn pair(&mut self, left: Expr<'ast>, right: Expr<'ast>) -> Option<(Expr<'ast>, Expr<'ast>)> {
        let new_left = self.rewrite(left);
        let new_right = self.rewrite(right);
        if new_left.is_none() && new_right.is_none() {
            return None;
        }
        Some((new_left.unwrap_or(left), new_right.unwrap_or(right)))
    }

    fn rewrite_all(&mut self, exprs: &'ast [Expr<'ast>]) -> Option<&'ast [Expr<'ast>]> {
        let rewritten: Vec<Option<Expr<'ast>>> = exprs.iter().map(|expr| self.rewrite(*expr)).collect();
        if rewritten.iter().all(Option::is_none) {
            return None;
        }
        let merged = rewritten
            .into_iter()
            .zip(exprs)
            .map(|(new, old)| new.unwrap_or(*old));
        Some(self.arena.alloc_slice_fill_iter(merged))
    }

    /// `a < b < c` becomes `a < b and b < c`. Middle operands are evaluated
    /// twice, so they must be free of side effects.
    fn comparison_chain(&mut self, cmp: &'ast CompareExpr<'ast>) -> Expr<'ast> {
        let mut left = self.expr(cmp.left);
        let mut chain: Option<Expr<'ast>> = None;
        let last = cmp.ops.len().saturating_sub(1);

        for (i, (op, right)) in cmp.ops.iter().zip(cmp.comparators).enumerate() {
            let right = self.expr(*right);
            if i < last && !right.is_side_effect_free() {
                self.diagnostics.error(CompilerError::unsupported(
                    "comparison chain with an operand that has side effects",
                    right.span(),
                ));
            }
            let span = left.span().to(right.span());
            let test = self.binary(left, *op, right, span);
            chain = Some(match chain {
                None => test,
                Some(previous) => {
                    let id = self.fresh();
                    Expr::BoolOp(self.arena.alloc(BoolOpExpr {
                        id,
                        op: BoolOp::And,
                        left: previous,
                        right: test,
                        span: cmp.span,
                    }))
                }
            });
            left = right;
        }

        chain.unwrap_or(left)
    }

    // =========================================
    // Node builders
    // =========================================

    fn fresh(&mut self) -> NodeId {
        self.ids.fresh()
    }

    fn name(&mut self, name: &'ast str, span: Span) -> Expr<'ast> {
        let id = self.fresh();
        Expr::Name(self.arena.alloc(NameExpr { id, name, span }))
    }

    fn int(&mut self, value: i128, span: Span) -> Expr<'ast> {
        let id = self.fresh();
        Expr::Literal(self.arena.alloc(LiteralExpr {
            id,
            value: Literal::Int(value),
            span,
        }))
    }

    fn binary(&mut self, left: Expr<'ast>, op: BinaryOp, right: Expr<'ast>, span: Span) -> Expr<'ast> {
        let id = self.fresh();
        Expr::Binary(self.arena.alloc(BinaryExpr {
            id,
            left,
            op,
            right,
            span,
        }))
    }

    fn call(&mut self, func: Expr<'ast>, arg: Expr<'ast>, span: Span) -> Expr<'ast> {
        let id = self.fresh();
        let args = self.arena.alloc_slice_copy(&[arg]);
        Expr::Call(self.arena.alloc(CallExpr { id, func, args, span }))
    }

    fn assign(&self, target: Expr<'ast>, value: Expr<'ast>, span: Span) -> Stmt<'ast> {
        Stmt::Assign(self.arena.alloc(AssignStmt { target, value, span }))
    }
}

/// Bounds of a `range(...)` call: `Ok((start, stop))`, or `Err` for a call
/// with a step.
fn range_bounds<'ast>(
    iter: Expr<'ast>,
) -> Option<Result<(Option<Expr<'ast>>, Expr<'ast>), &'ast CallExpr<'ast>>> {
    let Expr::Call(call) = iter else {
        return None;
    };
    if call.func.as_name() != Some("range") {
        return None;
    }
    match call.args {
        [stop] => Some(Ok((None, *stop))),
        [start, stop] => Some(Ok((Some(*start), *stop))),
        _ => Some(Err(call)),
    }
}

fn describe_decorator(decorator: &Expr<'_>) -> String {
    match decorator {
        Expr::Name(name) => name.name.to_string(),
        Expr::Attribute(attr) => attr.attr.name.to_string(),
        Expr::Call(call) => describe_decorator(&call.func),
        other => other.describe().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize<'a>(arena: &'a Bump, source: &str) -> (Module<'a>, Diagnostics) {
        let mut ids = NodeIdGen::new();
        let module = Parser::parse_with_ids(source, arena, &mut ids).expect("parses");
        let mut diagnostics = Diagnostics::new();
        let module = NormalizePass::new(arena, &mut ids, &mut diagnostics).run(module);
        (module, diagnostics)
    }

    #[test]
    fn pass_and_docstrings_are_removed() {
        let arena = Bump::new();
        let (module, diags) = normalize(&arena, "\"\"\"doc\"\"\"\ndef f():\n    \"\"\"doc\"\"\"\n    pass\n");
        assert!(!diags.has_errors());
        assert_eq!(module.body.len(), 1);
        let Stmt::FunctionDef(def) = module.body[0] else {
            panic!("expected a function");
        };
        assert!(def.body.is_empty());
    }

    #[test]
    fn augmented_assignment_becomes_binary() {
        let arena = Bump::new();
        let (module, _) = normalize(&arena, "x = 1\nx += 2\n");
        let Stmt::Assign(assign) = module.body[1] else {
            panic!("expected an assignment");
        };
        let Expr::Binary(bin) = assign.value else {
            panic!("expected a binary value");
        };
        assert_eq!(bin.op, BinaryOp::Add);
        assert_eq!(bin.left.id(), assign.target.id());
    }

    #[test]
    fn augmented_assignment_rejects_side_effects() {
        let arena = Bump::new();
        let (_, diags) = normalize(&arena, "a[f()] += 1\n");
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn elif_nests_in_orelse() {
        let arena = Bump::new();
        let (module, _) = normalize(&arena, "if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n");
        let Stmt::If(outer) = module.body[0] else {
            panic!("expected if");
        };
        assert!(outer.elifs.is_empty());
        let [Stmt::If(inner)] = outer.orelse else {
            panic!("expected nested if");
        };
        assert_eq!(inner.test.as_name(), Some("b"));
        assert_eq!(inner.orelse.len(), 1);
    }

    #[test]
    fn for_over_sequence_becomes_while() {
        let arena = Bump::new();
        let (module, diags) = normalize(&arena, "for x in items:\n    print(x)\n");
        assert!(!diags.has_errors());
        assert_eq!(module.body.len(), 3);

        let Stmt::Assign(seq) = module.body[0] else {
            panic!("expected sequence assignment");
        };
        assert_eq!(seq.target.as_name(), Some("$seq0"));
        let Stmt::While(w) = module.body[2] else {
            panic!("expected while");
        };
        let Expr::Binary(test) = w.test else {
            panic!("expected comparison");
        };
        assert_eq!(test.op, BinaryOp::Lt);
        assert!(matches!(test.right, Expr::Call(_)));

        // item, index step, then the original body
        assert_eq!(w.body.len(), 3);
        let Stmt::Assign(item) = w.body[0] else {
            panic!("expected item assignment");
        };
        assert_eq!(item.target.as_name(), Some("x"));
        assert!(matches!(item.value, Expr::Subscript(_)));
    }

    #[test]
    fn for_over_range_uses_a_stop_variable() {
        let arena = Bump::new();
        let (module, _) = normalize(&arena, "for i in range(2, 10):\n    pass\n");
        let Stmt::Assign(start) = module.body[0] else {
            panic!("expected start assignment");
        };
        assert_eq!(start.target.as_name(), Some("$idx0"));
        assert!(matches!(start.value.as_literal(), Some(Literal::Int(2))));
        let Stmt::While(w) = module.body[2] else {
            panic!("expected while");
        };
        let Expr::Binary(test) = w.test else {
            panic!("expected comparison");
        };
        assert_eq!(test.right.as_name(), Some("$stop0"));
        assert_eq!(w.body.len(), 2);
    }

    #[test]
    fn range_with_step_is_rejected() {
        let arena = Bump::new();
        let (_, diags) = normalize(&arena, "for i in range(0, 10, 2):\n    pass\n");
        assert!(matches!(diags.errors(), [CompilerError::UnsupportedSyntax { .. }]));
    }

    #[test]
    fn public_decorator_sets_flag() {
        let arena = Bump::new();
        let (module, diags) = normalize(&arena, "@public\ndef f():\n    return\n@other\ndef g():\n    return\n");
        let Stmt::FunctionDef(f) = module.body[0] else {
            panic!("expected a function");
        };
        assert!(f.public);
        assert!(f.decorators.is_empty());
        assert_eq!(diags.error_count(), 1);
        assert!(diags.errors()[0].to_string().contains("decorator 'other'"));
    }

    #[test]
    fn comparison_chain_becomes_and() {
        let arena = Bump::new();
        let (module, diags) = normalize(&arena, "x = a < b <= c\n");
        assert!(!diags.has_errors());
        let Stmt::Assign(assign) = module.body[0] else {
            panic!("expected an assignment");
        };
        let Expr::BoolOp(and) = assign.value else {
            panic!("expected and");
        };
        assert_eq!(and.op, BoolOp::And);
        let (Expr::Binary(first), Expr::Binary(second)) = (and.left, and.right) else {
            panic!("expected two comparisons");
        };
        assert_eq!(first.op, BinaryOp::Lt);
        assert_eq!(second.op, BinaryOp::LtE);
        assert_eq!(first.right.id(), second.left.id());
    }

    #[test]
    fn comparison_chain_rejects_side_effecting_middle() {
        let arena = Bump::new();
        let (_, diags) = normalize(&arena, "x = a < f() < c\n");
        assert_eq!(diags.error_count(), 1);
    }
}
