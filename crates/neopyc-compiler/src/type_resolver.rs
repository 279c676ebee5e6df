//! Type resolution for annotation expressions.
//!
//! Annotations are ordinary expressions in the AST. [`TypeResolver`] turns
//! them into [`Type`]s by looking names up in a scope chain:
//!
//! - `int`, `str`, `bytes`, `bool`, `None`, `Any`
//! - `List[T]`, `Dict[K, V]`, `Tuple[A, B]`, `Union[A, B]`, `Optional[T]`
//!   and the lowercase `list[T]`, `dict[K, V]`, `tuple[T]`
//! - `A | B`
//! - class names, also as string forward references (`"Token"`)
//! - package members such as `typing.List`

use neopyc_core::{CompilerError, ScopeId, Span, Type};
use neopyc_parser::ast::{BinaryOp, Expr, Literal};

use crate::symbols::{ClassKind, Symbol, SymbolTable, TypeConstructor};

/// Resolves annotation expressions against a scope.
pub struct TypeResolver<'a> {
    symbols: &'a SymbolTable,
    scope: ScopeId,
}

impl<'a> TypeResolver<'a> {
    pub fn new(symbols: &'a SymbolTable, scope: ScopeId) -> Self {
        Self { symbols, scope }
    }

    pub fn resolve(&self, annotation: &Expr<'_>) -> Result<Type, CompilerError> {
        match annotation {
            Expr::Literal(lit) => match lit.value {
                Literal::None => Ok(Type::None),
                Literal::Str(name) => self.resolve_name(name.trim(), lit.span),
                _ => Err(not_a_type(annotation)),
            },
            Expr::Name(name) => self.resolve_name(name.name, name.span),
            Expr::Attribute(attr) => {
                let scope = self.package_scope(&attr.value).ok_or_else(|| not_a_type(annotation))?;
                let symbol = self.symbols.lookup_local(scope, attr.attr.name).ok_or_else(|| {
                    CompilerError::UnresolvedReference {
                        name: attr.attr.name.to_string(),
                        span: attr.attr.span,
                    }
                })?;
                self.symbol_type(symbol, attr.attr.name, attr.span)
            }
            Expr::Subscript(sub) => {
                let ctor = self.constructor(&sub.value)?;
                let args: Vec<Type> = match sub.index {
                    Expr::Tuple(tuple) => tuple
                        .elements
                        .iter()
                        .map(|element| self.resolve(element))
                        .collect::<Result<_, _>>()?,
                    single => vec![self.resolve(&single)?],
                };
                apply(ctor, args, sub.span)
            }
            Expr::Binary(bin) if bin.op == BinaryOp::BitOr => {
                let left = self.resolve(&bin.left)?;
                let right = self.resolve(&bin.right)?;
                Ok(Type::union([left, right]))
            }
            _ => Err(not_a_type(annotation)),
        }
    }

    fn resolve_name(&self, name: &str, span: Span) -> Result<Type, CompilerError> {
        let symbol = self
            .symbols
            .lookup(self.scope, name)
            .ok_or_else(|| CompilerError::UnresolvedReference {
                name: name.to_string(),
                span,
            })?;
        self.symbol_type(symbol, name, span)
    }

    fn symbol_type(&self, symbol: neopyc_core::SymbolId, name: &str, span: Span) -> Result<Type, CompilerError> {
        match self.symbols.symbol(symbol) {
            Symbol::Class(ClassKind::Builtin(ctor)) => Ok(ctor.base_type()),
            Symbol::Class(ClassKind::User(class)) => Ok(Type::Class(class.ty.clone())),
            other => Err(CompilerError::unsupported(
                format!("'{name}' is a {} and cannot be used as a type", other.kind_name()),
                span,
            )),
        }
    }

    /// The builtin type constructor a subscripted annotation starts from.
    fn constructor(&self, expr: &Expr<'_>) -> Result<&'a TypeConstructor, CompilerError> {
        let (symbol, span) = match expr {
            Expr::Name(name) => (self.symbols.lookup(self.scope, name.name), name.span),
            Expr::Attribute(attr) => (
                self.package_scope(&attr.value)
                    .and_then(|scope| self.symbols.lookup_local(scope, attr.attr.name)),
                attr.span,
            ),
            _ => return Err(not_a_type(expr)),
        };
        match symbol.map(|symbol| self.symbols.symbol(symbol)) {
            Some(Symbol::Class(ClassKind::Builtin(ctor))) => Ok(ctor),
            Some(_) => Err(CompilerError::unsupported("subscript of a non-generic type", span)),
            None => Err(CompilerError::UnresolvedReference {
                name: describe_path(expr),
                span,
            }),
        }
    }

    /// Scope of the package an attribute annotation reaches into.
    fn package_scope(&self, expr: &Expr<'_>) -> Option<ScopeId> {
        let symbol = match expr {
            Expr::Name(name) => self.symbols.lookup(self.scope, name.name)?,
            Expr::Attribute(attr) => {
                let scope = self.package_scope(&attr.value)?;
                self.symbols.lookup_local(scope, attr.attr.name)?
            }
            _ => return None,
        };
        match self.symbols.symbol(symbol) {
            Symbol::Import(import) => Some(import.scope),
            _ => None,
        }
    }
}

fn apply(ctor: &TypeConstructor, mut args: Vec<Type>, span: Span) -> Result<Type, CompilerError> {
    let arity = |expected: usize, name: &str| {
        CompilerError::unsupported(format!("'{name}' takes {expected} type argument(s)"), span)
    };
    match ctor {
        TypeConstructor::List => match args.pop() {
            Some(item) if args.is_empty() => Ok(Type::list(item)),
            _ => Err(arity(1, "List")),
        },
        TypeConstructor::Dict => match (args.pop(), args.pop()) {
            (Some(value), Some(key)) if args.is_empty() => Ok(Type::dict(key, value)),
            _ => Err(arity(2, "Dict")),
        },
        TypeConstructor::Tuple => Ok(Type::tuple(Type::union(args))),
        TypeConstructor::Union => Ok(Type::union(args)),
        TypeConstructor::Optional => match args.pop() {
            Some(inner) if args.is_empty() => Ok(Type::optional(inner)),
            _ => Err(arity(1, "Optional")),
        },
        TypeConstructor::Concrete(ty) => Err(CompilerError::unsupported(
            format!("type '{ty}' does not take type arguments"),
            span,
        )),
    }
}

fn not_a_type(expr: &Expr<'_>) -> CompilerError {
    CompilerError::unsupported(format!("{} as a type annotation", expr.describe()), expr.span())
}

fn describe_path(expr: &Expr<'_>) -> String {
    match expr {
        Expr::Name(name) => name.name.to_string(),
        Expr::Attribute(attr) => format!("{}.{}", describe_path(&attr.value), attr.attr.name),
        other => other.describe().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use neopyc_parser::Parser;
    use neopyc_parser::ast::Stmt;

    use super::*;
    use crate::builtins::Builtins;
    use crate::symbols::{Import, SymbolEntry};

    /// Parse `x: <annotation>` and resolve the annotation in a scope that
    /// sees the builtins and the `typing` package.
    fn resolve(annotation: &str) -> Result<Type, CompilerError> {
        let arena = Bump::new();
        let source = format!("x: {annotation}\n");
        let module = Parser::parse(&source, &arena).expect("parses");
        let Stmt::AnnAssign(stmt) = module.body[0] else {
            panic!("expected an annotated assignment");
        };

        let mut symbols = SymbolTable::new();
        let builtins = Builtins::seed(&mut symbols);
        let typing = builtins.package("typing").unwrap();
        let scope = symbols.add_scope(Some(symbols.root()), crate::symbols::ScopeKind::Package);
        for name in ["List", "Dict", "Optional", "Union", "Tuple", "Any"] {
            let symbol = symbols.lookup_local(typing, name).unwrap();
            symbols.bind(scope, name, symbol);
        }
        let import = Symbol::Import(Import { scope: typing, module: None });
        symbols.define(scope, SymbolEntry::new("typing", import));

        TypeResolver::new(&symbols, scope).resolve(&stmt.annotation)
    }

    #[test]
    fn primitive_names() {
        assert_eq!(resolve("int").unwrap(), Type::Int);
        assert_eq!(resolve("bytes").unwrap(), Type::Bytes);
        assert_eq!(resolve("None").unwrap(), Type::None);
        assert_eq!(resolve("Any").unwrap(), Type::Any);
    }

    #[test]
    fn generic_collections() {
        assert_eq!(resolve("List[int]").unwrap(), Type::list(Type::Int));
        assert_eq!(resolve("list[str]").unwrap(), Type::list(Type::Str));
        assert_eq!(
            resolve("Dict[str, List[int]]").unwrap(),
            Type::dict(Type::Str, Type::list(Type::Int))
        );
        assert_eq!(resolve("dict").unwrap(), Type::dict(Type::Any, Type::Any));
        assert_eq!(resolve("Tuple[int, int]").unwrap(), Type::tuple(Type::Int));
    }

    #[test]
    fn unions_and_optionals() {
        assert_eq!(resolve("Optional[int]").unwrap(), Type::optional(Type::Int));
        assert_eq!(resolve("int | None").unwrap(), Type::optional(Type::Int));
        assert_eq!(
            resolve("Union[int, str]").unwrap(),
            Type::union([Type::Int, Type::Str])
        );
        assert_eq!(resolve("typing.List[bool]").unwrap(), Type::list(Type::Bool));
    }

    #[test]
    fn forward_reference_strings() {
        assert_eq!(resolve("'int'").unwrap(), Type::Int);
    }

    #[test]
    fn errors() {
        assert!(matches!(
            resolve("Missing"),
            Err(CompilerError::UnresolvedReference { name, .. }) if name == "Missing"
        ));
        assert!(matches!(resolve("Dict[int]"), Err(CompilerError::UnsupportedSyntax { .. })));
        assert!(matches!(resolve("int[str]"), Err(CompilerError::UnsupportedSyntax { .. })));
        assert!(matches!(resolve("len"), Err(CompilerError::UnsupportedSyntax { .. })));
        assert!(matches!(resolve("1"), Err(CompilerError::UnsupportedSyntax { .. })));
    }
}
