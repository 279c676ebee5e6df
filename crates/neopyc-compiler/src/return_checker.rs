//! Return path verification for functions with a non-`None` return type.
//!
//! The check runs on the normalised AST, before any code exists. A block
//! returns on every path when one of its statements does:
//!
//! - `return`
//! - `if` whose body and `else` branch both return
//! - `while True:` without a `break` that targets it
//! - `assert False`

use neopyc_parser::ast::{Expr, Literal, Stmt};

/// Verifies that every path through a function body ends in `return`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnChecker;

impl ReturnChecker {
    pub fn new() -> Self {
        Self
    }

    pub fn all_paths_return(&self, body: &[Stmt<'_>]) -> bool {
        body.iter().any(|stmt| self.always_returns(stmt))
    }

    fn always_returns(&self, stmt: &Stmt<'_>) -> bool {
        match stmt {
            Stmt::Return(_) => true,
            Stmt::If(s) => {
                let orelse_returns = if s.elifs.is_empty() {
                    self.all_paths_return(s.orelse)
                } else {
                    s.elifs.iter().all(|elif| self.all_paths_return(elif.body))
                        && self.all_paths_return(s.orelse)
                };
                self.all_paths_return(s.body) && orelse_returns
            }
            Stmt::While(s) => is_true(&s.test) && !breaks(s.body),
            Stmt::Assert(s) => is_false(&s.test),
            _ => false,
        }
    }
}

fn is_true(expr: &Expr<'_>) -> bool {
    matches!(expr.as_literal(), Some(Literal::Bool(true)))
}

fn is_false(expr: &Expr<'_>) -> bool {
    matches!(expr.as_literal(), Some(Literal::Bool(false)))
}

/// Whether a loop body contains a `break` for that loop. Nested loops own
/// their breaks.
fn breaks(body: &[Stmt<'_>]) -> bool {
    body.iter().any(|stmt| match stmt {
        Stmt::Break(_) => true,
        Stmt::If(s) => breaks(s.body) || s.elifs.iter().any(|elif| breaks(elif.body)) || breaks(s.orelse),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use neopyc_parser::Parser;

    use super::*;

    fn returns(source: &str) -> bool {
        let arena = Bump::new();
        let module = Parser::parse(source, &arena).expect("parses");
        let Stmt::FunctionDef(def) = module.body[0] else {
            panic!("expected a function");
        };
        ReturnChecker::new().all_paths_return(def.body)
    }

    #[test]
    fn plain_return() {
        assert!(returns("def f() -> int:\n    x = 1\n    return x\n"));
        assert!(!returns("def f() -> int:\n    x = 1\n"));
    }

    #[test]
    fn if_needs_both_branches() {
        assert!(returns(
            "def f(a: bool) -> int:\n    if a:\n        return 1\n    else:\n        return 2\n"
        ));
        assert!(!returns("def f(a: bool) -> int:\n    if a:\n        return 1\n"));
        assert!(!returns(
            "def f(a: bool, b: bool) -> int:\n    if a:\n        return 1\n    elif b:\n        return 2\n"
        ));
        assert!(returns(
            "def f(a: bool, b: bool) -> int:\n    if a:\n        return 1\n    elif b:\n        return 2\n    else:\n        return 3\n"
        ));
    }

    #[test]
    fn infinite_loops() {
        assert!(returns("def f() -> int:\n    while True:\n        pass\n"));
        assert!(!returns(
            "def f(a: bool) -> int:\n    while True:\n        if a:\n            break\n"
        ));
        assert!(!returns("def f(a: bool) -> int:\n    while a:\n        return 1\n"));
        assert!(returns(
            "def f(a: bool) -> int:\n    while True:\n        while a:\n            break\n"
        ));
    }

    #[test]
    fn failing_assert() {
        assert!(returns("def f() -> int:\n    assert False\n"));
    }
}
