//! Declaration pass: create symbols for everything a module defines.
//!
//! The pass runs in two phases so that definitions may refer to each other
//! in any order:
//!
//! 1. Walk the top level in source order. Imports are resolved (and
//!    analysed, if new) as they are met; functions, classes, class fields
//!    and module globals get symbols with placeholder types.
//! 2. Resolve every annotation: field types, global types, parameter and
//!    return types. Locals of each function are collected and given slots.
//!
//! Function bodies are not looked at beyond collecting assignment targets;
//! that is the type checker's job.

use std::mem;

use rustc_hash::{FxHashMap, FxHashSet};

use neopyc_core::{
    ClassType, CompilerError, CompilerWarning, Constant, DefaultValue, ModuleId, NodeId, ScopeId, Span, SymbolId,
    Type,
};
use neopyc_parser::ast::{AnnAssignStmt, AttributeExpr, ClassDef, Expr, FunctionDef, Literal, Stmt, UnaryOp};
use num_bigint::BigInt;

use crate::context::CompilationContext;
use crate::symbols::{
    ClassKind, Method, Property, ScopeKind, Symbol, SymbolEntry, SymbolFlags, UserClass, Variable, VariableKind,
};
use crate::type_resolver::TypeResolver;

/// Constant value of a literal expression, including negated integers.
pub(crate) fn literal_constant(expr: &Expr<'_>) -> Option<Constant> {
    match expr {
        Expr::Literal(lit) => Some(lit.value.to_constant()),
        Expr::Unary(unary) if unary.op == UnaryOp::Neg => match unary.operand.as_literal() {
            Some(Literal::Int(value)) => Some(Constant::integer(-BigInt::from(*value))),
            Some(Literal::BigInt(bytes)) => Some(Constant::integer(-BigInt::from_signed_bytes_le(bytes))),
            _ => None,
        },
        _ => None,
    }
}

/// How a module-level name is assigned.
#[derive(Debug)]
struct GlobalUse<'ast> {
    origin: NodeId,
    span: Span,
    count: usize,
    annotation: Option<Expr<'ast>>,
    /// Value of the first assignment, when it is an unannotated literal at
    /// the top level.
    literal: Option<Constant>,
}

/// A local variable collected from a function body.
#[derive(Debug)]
struct LocalUse<'ast> {
    name: &'ast str,
    origin: NodeId,
    span: Span,
    annotation: Option<Expr<'ast>>,
}

pub struct DeclarationPass<'a, 'ast> {
    ctx: &'a mut CompilationContext<'ast>,
    module: ModuleId,
    scope: ScopeId,
    is_entry: bool,
    /// Functions and methods whose signatures are resolved in phase 2.
    functions: Vec<(SymbolId, &'ast FunctionDef<'ast>)>,
    /// Class fields whose types are resolved in phase 2.
    fields: Vec<(SymbolId, &'ast AnnAssignStmt<'ast>)>,
    /// Annotated globals and instance fields whose types are resolved in
    /// phase 2.
    annotated: Vec<(SymbolId, Expr<'ast>)>,
    /// Module-level symbols defined here rather than imported.
    own: FxHashSet<SymbolId>,
}

impl<'a, 'ast> DeclarationPass<'a, 'ast> {
    pub fn new(ctx: &'a mut CompilationContext<'ast>, module: ModuleId) -> Self {
        let info = ctx.module(module);
        let scope = info.scope;
        let is_entry = info.is_entry;
        Self {
            ctx,
            module,
            scope,
            is_entry,
            functions: Vec::new(),
            fields: Vec::new(),
            annotated: Vec::new(),
            own: FxHashSet::default(),
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self) {
        let body: &'ast [Stmt<'ast>] = self.ctx.module(self.module).ast.body;

        for stmt in body.iter().copied() {
            match stmt {
                Stmt::Import(import) => self.ctx.import_modules(self.module, import),
                Stmt::ImportFrom(import) => self.ctx.import_names(self.module, import),
                Stmt::FunctionDef(def) => {
                    self.declare_function(def, None, self.scope);
                }
                Stmt::ClassDef(class) => self.declare_class(class),
                _ => {}
            }
        }
        self.declare_globals(body);

        for (field, stmt) in mem::take(&mut self.fields) {
            self.resolve_field(field, stmt);
        }
        for (symbol, annotation) in mem::take(&mut self.annotated) {
            let ty = self.resolve(annotation);
            match self.ctx.symbols.symbol_mut(symbol) {
                Symbol::Variable(var) => {
                    var.ty = ty;
                    var.needs_inference = false;
                }
                Symbol::Property(property) => property.ty = ty,
                _ => {}
            }
        }
        let functions = mem::take(&mut self.functions);
        for (method, def) in &functions {
            self.resolve_function(*method, def);
        }

        tracing::debug!(
            module = %self.ctx.module(self.module).name,
            functions = functions.len(),
            "declarations collected"
        );
    }

    // =========================================
    // Phase 1
    // =========================================

    fn declare_function(&mut self, def: &'ast FunctionDef<'ast>, class: Option<SymbolId>, target: ScopeId) -> SymbolId {
        let mut flags = SymbolFlags::empty();
        if self.is_entry {
            flags |= SymbolFlags::DEFINED_BY_ENTRY;
        }
        if def.public {
            flags |= SymbolFlags::PUBLIC;
        }
        if class.is_some() && def.name.name == "__init__" {
            flags |= SymbolFlags::IS_INIT;
        }
        if class.is_none() {
            self.warn_shadowing(def.name.name, def.name.span);
        }

        let method = Method::new(self.scope, self.module);
        let entry = SymbolEntry::new(def.name.name, Symbol::Method(method))
            .with_origin(def.id, def.name.span)
            .with_flags(flags);
        let (symbol, _) = self.ctx.symbols.define(target, entry);
        if target == self.scope {
            self.own.insert(symbol);
        }

        let scope = self.ctx.symbols.add_scope(Some(self.scope), ScopeKind::Function(symbol));
        if let Symbol::Method(method) = self.ctx.symbols.symbol_mut(symbol) {
            method.scope = scope;
            method.class = class;
        }
        self.ctx.model.bind(def.id, symbol);
        self.functions.push((symbol, def));
        symbol
    }

    fn declare_class(&mut self, class: &'ast ClassDef<'ast>) {
        let name = class.name.name;
        if let Some(base) = class.bases.first() {
            self.ctx
                .diagnostics
                .error(CompilerError::unsupported("class inheritance", base.span()));
        }
        self.warn_shadowing(name, class.name.span);

        let placeholder = UserClass {
            ty: ClassType::new(SymbolId::new(0), name),
            fields: Vec::new(),
            methods: Vec::new(),
            init: None,
            scope: self.scope,
        };
        let mut entry = SymbolEntry::new(name, Symbol::Class(ClassKind::User(placeholder)))
            .with_origin(class.id, class.name.span);
        if self.is_entry {
            entry = entry.with_flags(SymbolFlags::DEFINED_BY_ENTRY);
        }
        let (symbol, _) = self.ctx.symbols.define(self.scope, entry);
        self.own.insert(symbol);
        let class_scope = self.ctx.symbols.add_scope(None, ScopeKind::Class(symbol));
        self.ctx.model.bind(class.id, symbol);

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut init = None;
        let mut init_def = None;

        for stmt in class.body.iter().copied() {
            match stmt {
                Stmt::AnnAssign(field) => {
                    if let Some(property) = self.declare_field(symbol, class_scope, fields.len(), field) {
                        fields.push(property);
                    }
                }
                Stmt::FunctionDef(def) => {
                    let method = self.declare_function(def, Some(symbol), class_scope);
                    if self.ctx.symbols.get(method).flags.contains(SymbolFlags::IS_INIT) {
                        init = Some(method);
                        init_def = Some(def);
                    }
                    methods.push(method);
                }
                other => self
                    .ctx
                    .diagnostics
                    .error(CompilerError::unsupported("statement in a class body", other.span())),
            }
        }

        if let Some(def) = init_def {
            self.declare_instance_fields(symbol, class_scope, def, &mut fields);
        }

        if let Symbol::Class(ClassKind::User(user)) = self.ctx.symbols.symbol_mut(symbol) {
            user.ty = ClassType::new(symbol, name);
            user.scope = class_scope;
            user.fields = fields;
            user.methods = methods;
            user.init = init;
        }
    }

    fn declare_field(
        &mut self,
        class: SymbolId,
        class_scope: ScopeId,
        index: usize,
        field: &'ast AnnAssignStmt<'ast>,
    ) -> Option<SymbolId> {
        let Expr::Name(name) = field.target else {
            self.ctx.diagnostics.error(CompilerError::unsupported(
                "class field that is not a plain name",
                field.target.span(),
            ));
            return None;
        };
        let default = match field.value {
            None => Constant::None,
            Some(value) => match literal_constant(&value) {
                Some(constant) => constant,
                None => {
                    self.ctx
                        .diagnostics
                        .error(CompilerError::unsupported("field default that is not a literal", value.span()));
                    return None;
                }
            },
        };
        if self.ctx.symbols.lookup_local(class_scope, name.name).is_some() {
            self.ctx.diagnostics.error(CompilerError::unsupported(
                format!("redefinition of field '{}'", name.name),
                name.span,
            ));
            return None;
        }

        let property = Property {
            index,
            ty: Type::Any,
            default: DefaultValue::Constant(default),
            class,
            needs_inference: false,
        };
        let entry = SymbolEntry::new(name.name, Symbol::Property(property)).with_origin(name.id, name.span);
        let (symbol, _) = self.ctx.symbols.define(class_scope, entry);
        self.ctx.model.bind(name.id, symbol);
        self.fields.push((symbol, field));
        Some(symbol)
    }

    /// `self.<name> = value` in `__init__` declares a field after the class
    /// level ones, in order of first assignment. The field starts out null
    /// and its type comes from the annotation or literal of that first
    /// assignment, else from the type checker.
    fn declare_instance_fields(
        &mut self,
        class: SymbolId,
        class_scope: ScopeId,
        init: &'ast FunctionDef<'ast>,
        fields: &mut Vec<SymbolId>,
    ) {
        let Some(receiver) = init.params.first() else {
            return;
        };
        let mut uses = Vec::new();
        collect_instance_fields(init.body, receiver.name.name, &mut uses);

        for (attr, annotation, value) in uses {
            if self.ctx.symbols.lookup_local(class_scope, attr.attr.name).is_some() {
                continue;
            }
            let literal = value.as_ref().and_then(literal_constant);
            let ty = match (&annotation, &literal) {
                (None, Some(constant)) => constant.ty(),
                _ => Type::Any,
            };
            let property = Property {
                index: fields.len(),
                ty,
                default: DefaultValue::Constant(Constant::None),
                class,
                needs_inference: annotation.is_none() && literal.is_none(),
            };
            let entry = SymbolEntry::new(attr.attr.name, Symbol::Property(property))
                .with_origin(attr.id, attr.attr.span);
            let (symbol, _) = self.ctx.symbols.define(class_scope, entry);
            if let Some(annotation) = annotation {
                self.annotated.push((symbol, annotation));
            }
            fields.push(symbol);
        }
    }

    /// Give every name assigned at module level a symbol. A name assigned
    /// exactly once, by an unannotated literal at the top level, becomes an
    /// inlined constant; every other name gets a static field.
    fn declare_globals(&mut self, body: &'ast [Stmt<'ast>]) {
        let mut order: Vec<(&'ast str, GlobalUse<'ast>)> = Vec::new();
        let mut index: FxHashMap<&'ast str, usize> = FxHashMap::default();
        collect_globals(body, false, &mut order, &mut index);

        for (name, usage) in order {
            if let Some(existing) = self.ctx.symbols.lookup_local(self.scope, name) {
                let symbol = self.ctx.symbols.symbol(existing);
                if !matches!(symbol, Symbol::Variable(_)) {
                    let kind = symbol.kind_name();
                    self.ctx.diagnostics.error(CompilerError::unsupported(
                        format!("assignment to {kind} '{name}'"),
                        usage.span,
                    ));
                    continue;
                }
            }
            if !name.starts_with('$') {
                self.warn_shadowing(name, usage.span);
            }

            let constant = match (&usage.literal, usage.count, &usage.annotation) {
                (Some(value), 1, None) if !name.starts_with('$') => Some(value.clone()),
                _ => None,
            };
            let variable = match constant {
                Some(value) => Variable::new(value.ty(), VariableKind::Constant(value)),
                None => Variable::inferred(VariableKind::Global(self.ctx.add_global())),
            };
            let mut entry = SymbolEntry::new(name, Symbol::Variable(variable)).with_origin(usage.origin, usage.span);
            if self.is_entry {
                entry = entry.with_flags(SymbolFlags::DEFINED_BY_ENTRY);
            }
            let (symbol, _) = self.ctx.symbols.define(self.scope, entry);
            self.own.insert(symbol);
            if let Some(annotation) = usage.annotation {
                self.annotated.push((symbol, annotation));
            }
        }
    }

    fn warn_shadowing(&mut self, name: &str, span: Span) {
        let root = self.ctx.symbols.root();
        if self.ctx.symbols.lookup_local(root, name).is_some() {
            self.ctx.diagnostics.warning(CompilerWarning::NameShadowing {
                name: name.to_string(),
                span,
            });
        }
    }

    /// Parameters and locals also hide the names this module imports.
    fn warn_local_shadowing(&mut self, name: &str, span: Span) {
        let imported = self
            .ctx
            .symbols
            .lookup_local(self.scope, name)
            .is_some_and(|symbol| !self.own.contains(&symbol));
        if imported {
            self.ctx.diagnostics.warning(CompilerWarning::NameShadowing {
                name: name.to_string(),
                span,
            });
        } else {
            self.warn_shadowing(name, span);
        }
    }

    // =========================================
    // Phase 2
    // =========================================

    fn resolve(&mut self, annotation: Expr<'ast>) -> Type {
        match TypeResolver::new(&self.ctx.symbols, self.scope).resolve(&annotation) {
            Ok(ty) => ty,
            Err(error) => {
                self.ctx.diagnostics.error(error);
                Type::Any
            }
        }
    }

    fn resolve_field(&mut self, field: SymbolId, stmt: &'ast AnnAssignStmt<'ast>) {
        let ty = self.resolve(stmt.annotation);
        let Symbol::Property(property) = self.ctx.symbols.symbol_mut(field) else {
            return;
        };
        property.ty = ty.clone();

        let Some(value) = stmt.value else {
            property.default = ty.default_value();
            return;
        };
        if let DefaultValue::Constant(constant) = &property.default {
            let actual = constant.ty();
            if !ty.is_type_of(&actual) {
                self.ctx
                    .diagnostics
                    .error(CompilerError::mismatched(&ty, &actual, value.span()));
            }
        }
    }

    fn resolve_function(&mut self, symbol: SymbolId, def: &'ast FunctionDef<'ast>) {
        let (scope, class) = match self.ctx.symbols.symbol(symbol) {
            Symbol::Method(method) => (method.scope, method.class),
            _ => return,
        };

        let mut args = Vec::with_capacity(def.params.len());
        for (index, param) in def.params.iter().enumerate() {
            let ty = match (param.annotation, class) {
                (Some(annotation), _) => self.resolve(annotation),
                (None, Some(class)) if index == 0 && param.name.name == "self" => self.ctx.symbols.get(class).ty(),
                (None, _) => Type::Any,
            };
            let variable = Variable::new(ty, VariableKind::Argument(index));
            let entry =
                SymbolEntry::new(param.name.name, Symbol::Variable(variable)).with_origin(param.id, param.name.span);
            let (arg, evicted) = self.ctx.symbols.define(scope, entry);
            if evicted.is_some() {
                self.ctx.diagnostics.error(CompilerError::unsupported(
                    format!("duplicate parameter '{}'", param.name.name),
                    param.span,
                ));
            }
            self.ctx.model.bind(param.id, arg);
            if !(class.is_some() && index == 0 && param.name.name == "self") {
                self.warn_local_shadowing(param.name.name, param.name.span);
            }
            args.push(arg);
        }

        let return_type = match def.returns {
            Some(annotation) => self.resolve(annotation),
            None => Type::None,
        };

        let mut uses = Vec::new();
        collect_locals(def.body, &mut uses);
        let mut locals = Vec::with_capacity(uses.len());
        for usage in uses {
            if self.ctx.symbols.lookup_local(scope, usage.name).is_some() {
                continue;
            }
            if !usage.name.starts_with('$') {
                self.warn_local_shadowing(usage.name, usage.span);
            }
            let kind = VariableKind::Local(locals.len());
            let variable = match usage.annotation {
                Some(annotation) => Variable::new(self.resolve(annotation), kind),
                None => Variable::inferred(kind),
            };
            let entry =
                SymbolEntry::new(usage.name, Symbol::Variable(variable)).with_origin(usage.origin, usage.span);
            let (local, _) = self.ctx.symbols.define(scope, entry);
            locals.push(local);
        }

        tracing::trace!(
            function = def.name.name,
            args = args.len(),
            locals = locals.len(),
            "resolved signature"
        );
        if let Symbol::Method(method) = self.ctx.symbols.symbol_mut(symbol) {
            method.args = args;
            method.locals = locals;
            method.return_type = return_type;
        }
    }
}

fn collect_instance_fields<'ast>(
    stmts: &'ast [Stmt<'ast>],
    receiver: &str,
    uses: &mut Vec<(&'ast AttributeExpr<'ast>, Option<Expr<'ast>>, Option<Expr<'ast>>)>,
) {
    for stmt in stmts {
        let (target, annotation, value) = match stmt {
            Stmt::Assign(s) => (s.target, None, Some(s.value)),
            Stmt::AnnAssign(s) => (s.target, Some(s.annotation), s.value),
            Stmt::If(s) => {
                collect_instance_fields(s.body, receiver, uses);
                collect_instance_fields(s.orelse, receiver, uses);
                continue;
            }
            Stmt::While(s) => {
                collect_instance_fields(s.body, receiver, uses);
                continue;
            }
            _ => continue,
        };
        let Expr::Attribute(attr) = target else {
            continue;
        };
        let owned = matches!(attr.value, Expr::Name(name) if name.name == receiver);
        if owned && !uses.iter().any(|(seen, ..)| seen.attr.name == attr.attr.name) {
            uses.push((attr, annotation, value));
        }
    }
}

fn collect_globals<'ast>(
    stmts: &'ast [Stmt<'ast>],
    nested: bool,
    order: &mut Vec<(&'ast str, GlobalUse<'ast>)>,
    index: &mut FxHashMap<&'ast str, usize>,
) {
    for stmt in stmts {
        let (target, annotation, value) = match stmt {
            Stmt::Assign(s) => (s.target, None, Some(s.value)),
            Stmt::AnnAssign(s) => (s.target, Some(s.annotation), s.value),
            Stmt::If(s) => {
                collect_globals(s.body, true, order, index);
                collect_globals(s.orelse, true, order, index);
                continue;
            }
            Stmt::While(s) => {
                collect_globals(s.body, true, order, index);
                continue;
            }
            _ => continue,
        };
        let Expr::Name(name) = target else {
            continue;
        };

        match index.get(name.name) {
            Some(&position) => {
                let usage = &mut order[position].1;
                usage.count += 1;
                if usage.annotation.is_none() {
                    usage.annotation = annotation;
                }
            }
            None => {
                let literal = match (nested, annotation, value) {
                    (false, None, Some(value)) => literal_constant(&value),
                    _ => None,
                };
                index.insert(name.name, order.len());
                order.push((
                    name.name,
                    GlobalUse {
                        origin: name.id,
                        span: name.span,
                        count: 1,
                        annotation,
                        literal,
                    },
                ));
            }
        }
    }
}

fn collect_locals<'ast>(stmts: &'ast [Stmt<'ast>], out: &mut Vec<LocalUse<'ast>>) {
    for stmt in stmts {
        let (target, annotation) = match stmt {
            Stmt::Assign(s) => (s.target, None),
            Stmt::AnnAssign(s) => (s.target, Some(s.annotation)),
            Stmt::If(s) => {
                collect_locals(s.body, out);
                collect_locals(s.orelse, out);
                continue;
            }
            Stmt::While(s) => {
                collect_locals(s.body, out);
                continue;
            }
            _ => continue,
        };
        let Expr::Name(name) = target else {
            continue;
        };
        match out.iter_mut().find(|usage| usage.name == name.name) {
            Some(usage) => {
                if usage.annotation.is_none() {
                    usage.annotation = annotation;
                }
            }
            None => out.push(LocalUse {
                name: name.name,
                origin: name.id,
                span: name.span,
                annotation,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use bumpalo::Bump;

    use super::*;
    use crate::loader::MemoryLoader;

    fn declare<'a>(arena: &'a Bump, loader: &'a MemoryLoader) -> CompilationContext<'a> {
        let mut ctx = CompilationContext::new(arena, loader, "p");
        ctx.analyse_entry(Path::new("p/main.py"));
        ctx
    }

    fn lookup<'c>(ctx: &'c CompilationContext<'_>, name: &str) -> &'c Symbol {
        let scope = ctx.entry().unwrap().scope;
        ctx.symbols.symbol(ctx.symbols.lookup_local(scope, name).unwrap())
    }

    #[test]
    fn functions_get_typed_signatures() {
        let arena = Bump::new();
        let loader = MemoryLoader::new().with_file(
            "p/main.py",
            "@public\ndef add(a: int, b) -> int:\n    c = a\n    d: str = 'x'\n    c = 2\n    return c\n",
        );
        let ctx = declare(&arena, &loader);
        assert!(!ctx.diagnostics.has_errors(), "{:?}", ctx.diagnostics.errors());

        let scope = ctx.entry().unwrap().scope;
        let add = ctx.symbols.lookup_local(scope, "add").unwrap();
        let entry = ctx.symbols.get(add);
        assert!(entry.flags.contains(SymbolFlags::PUBLIC | SymbolFlags::DEFINED_BY_ENTRY));

        let Symbol::Method(method) = &entry.symbol else {
            panic!("expected a method");
        };
        assert_eq!(method.return_type, Type::Int);
        assert_eq!(method.args.len(), 2);
        assert_eq!(ctx.symbols.get(method.args[0]).ty(), Type::Int);
        assert_eq!(ctx.symbols.get(method.args[1]).ty(), Type::Any);

        let names: Vec<&str> = method
            .locals
            .iter()
            .map(|local| ctx.symbols.get(*local).name.as_str())
            .collect();
        assert_eq!(names, vec!["c", "d"]);
        assert!(matches!(
            ctx.symbols.symbol(method.locals[1]),
            Symbol::Variable(Variable { kind: VariableKind::Local(1), ty: Type::Str, .. })
        ));
    }

    #[test]
    fn same_named_locals_live_in_separate_scopes() {
        let arena = Bump::new();
        let loader = MemoryLoader::new().with_file(
            "p/main.py",
            "def f() -> int:\n    x = 1\n    return x\ndef g() -> int:\n    y = 0\n    x = 2\n    return x\n",
        );
        let ctx = declare(&arena, &loader);
        let local_x = |function: &str| {
            let Symbol::Method(method) = lookup(&ctx, function) else {
                panic!("expected a method");
            };
            let x = ctx.symbols.lookup_local(method.scope, "x").unwrap();
            match ctx.symbols.symbol(x) {
                Symbol::Variable(var) => (x, var.kind.clone()),
                _ => panic!("x is not a variable"),
            }
        };
        let (f_x, f_kind) = local_x("f");
        let (g_x, g_kind) = local_x("g");
        assert_ne!(f_x, g_x);
        assert_eq!(f_kind, VariableKind::Local(0));
        assert_eq!(g_kind, VariableKind::Local(1));
    }

    #[test]
    fn globals_and_constants() {
        let arena = Bump::new();
        let loader = MemoryLoader::new().with_file(
            "p/main.py",
            "LIMIT = 10\nNEG = -3\ncounter = 0\ncounter = counter + 1\nowner: bytes = b'\\x01'\nflag: bool\n",
        );
        let ctx = declare(&arena, &loader);
        assert!(!ctx.diagnostics.has_errors(), "{:?}", ctx.diagnostics.errors());

        assert!(matches!(
            lookup(&ctx, "LIMIT"),
            Symbol::Variable(Variable { kind: VariableKind::Constant(Constant::Int(10)), .. })
        ));
        assert!(matches!(
            lookup(&ctx, "NEG"),
            Symbol::Variable(Variable { kind: VariableKind::Constant(Constant::Int(-3)), .. })
        ));
        assert!(matches!(
            lookup(&ctx, "counter"),
            Symbol::Variable(Variable { kind: VariableKind::Global(0), .. })
        ));
        assert!(matches!(
            lookup(&ctx, "owner"),
            Symbol::Variable(Variable { kind: VariableKind::Global(1), ty: Type::Bytes, .. })
        ));
        assert!(matches!(
            lookup(&ctx, "flag"),
            Symbol::Variable(Variable { kind: VariableKind::Global(2), ty: Type::Bool, .. })
        ));
        assert_eq!(ctx.global_count(), 3);
    }

    #[test]
    fn classes_declare_fields_and_methods() {
        let arena = Bump::new();
        let loader = MemoryLoader::new().with_file(
            "p/main.py",
            "class Point:\n    x: int = 1\n    y: int\n    def __init__(self, y: int):\n        self.y = y\n    def sum(self) -> int:\n        return self.x + self.y\n",
        );
        let ctx = declare(&arena, &loader);
        assert!(!ctx.diagnostics.has_errors(), "{:?}", ctx.diagnostics.errors());

        let Symbol::Class(ClassKind::User(class)) = lookup(&ctx, "Point") else {
            panic!("expected a class");
        };
        assert_eq!(class.fields.len(), 2);
        assert_eq!(class.methods.len(), 2);
        let init = class.init.unwrap();
        assert!(ctx.symbols.get(init).flags.contains(SymbolFlags::IS_INIT));

        let Symbol::Property(y) = ctx.symbols.symbol(class.fields[1]) else {
            panic!("expected a field");
        };
        assert_eq!(y.index, 1);
        assert_eq!(y.default, DefaultValue::Constant(Constant::Int(0)));

        let Symbol::Method(sum) = ctx.symbols.symbol(class.methods[1]) else {
            panic!("expected a method");
        };
        assert_eq!(ctx.symbols.get(sum.args[0]).ty(), Type::Class(class.ty.clone()));
        // Methods are reached through the class, not the module.
        assert!(ctx.symbols.lookup_local(ctx.entry().unwrap().scope, "sum").is_none());
    }

    #[test]
    fn init_assignments_declare_fields() {
        let arena = Bump::new();
        let loader = MemoryLoader::new().with_file(
            "p/main.py",
            "class Wallet:\n    limit: int = 10\n\n    \
             def __init__(self, owner: bytes):\n        \
                 self.owner = owner\n        \
                 self.count: int = 0\n        \
                 if owner:\n            \
                     self.count = 1\n            \
                     self.flag = True\n        \
                 self.limit = 5\n",
        );
        let ctx = declare(&arena, &loader);
        assert!(!ctx.diagnostics.has_errors(), "{:?}", ctx.diagnostics.errors());

        let Symbol::Class(ClassKind::User(class)) = lookup(&ctx, "Wallet") else {
            panic!("expected a class");
        };
        let fields: Vec<(&str, usize, Type, bool)> = class
            .fields
            .iter()
            .map(|field| match ctx.symbols.symbol(*field) {
                Symbol::Property(property) => (
                    ctx.symbols.get(*field).name.as_str(),
                    property.index,
                    property.ty.clone(),
                    property.needs_inference,
                ),
                other => panic!("expected a field, got {other:?}"),
            })
            .collect();
        assert_eq!(fields, [
            ("limit", 0, Type::Int, false),
            ("owner", 1, Type::Bytes, false),
            ("count", 2, Type::Int, false),
            ("flag", 3, Type::Bool, false),
        ]);
    }

    #[test]
    fn class_restrictions() {
        let arena = Bump::new();
        let loader = MemoryLoader::new().with_file(
            "p/main.py",
            "class A(object):\n    x: int = len('a')\n    y = 1\n",
        );
        let ctx = declare(&arena, &loader);
        assert_eq!(ctx.diagnostics.error_count(), 3);
    }

    #[test]
    fn shadowing_builtins_warns() {
        let arena = Bump::new();
        let loader = MemoryLoader::new().with_file("p/main.py", "def len(x: int) -> int:\n    return x\n");
        let ctx = declare(&arena, &loader);
        assert!(matches!(
            ctx.diagnostics.warnings(),
            [CompilerWarning::NameShadowing { name, .. }] if name == "len"
        ));
    }

    #[test]
    fn locals_and_parameters_shadowing_imports_warn() {
        let arena = Bump::new();
        let loader = MemoryLoader::new().with_file(
            "p/main.py",
            "from interop.runtime import check_witness\n\n\
             def f(a: int) -> int:\n    check_witness = a\n    return check_witness\n\n\
             def g(len: int) -> int:\n    return len\n\n\
             def h(a: int) -> int:\n    f = a\n    return f\n",
        );
        let ctx = declare(&arena, &loader);
        let shadowed: Vec<&str> = ctx
            .diagnostics
            .warnings()
            .iter()
            .filter_map(|warning| match warning {
                CompilerWarning::NameShadowing { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(shadowed, ["check_witness", "len"]);
    }

    #[test]
    fn field_default_must_match_annotation() {
        let arena = Bump::new();
        let loader = MemoryLoader::new().with_file("p/main.py", "class A:\n    x: int = 'no'\n");
        let ctx = declare(&arena, &loader);
        assert!(matches!(
            ctx.diagnostics.errors(),
            [CompilerError::MismatchedTypes { .. }]
        ));
    }
}
