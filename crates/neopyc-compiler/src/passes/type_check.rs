//! Type checking pass.
//!
//! Assigns a static type to every expression of a module, resolves names,
//! attributes, operators and call targets, and records the results in the
//! [`SemanticModel`](crate::semantic::SemanticModel) for the code generator.
//! Unannotated variables take the type of their first assignment.
//!
//! The pass reports every problem it finds and keeps going; an expression
//! that fails to check is given type `Any` so one mistake does not cascade.

use neopyc_core::{
    CompilerError, CompilerWarning, ModuleId, NodeId, ScopeId, Span, StackItemType, SymbolId, Type,
};
use neopyc_parser::ast::{
    AttributeExpr, BinaryExpr, BinaryOp, BoolOpExpr, CallExpr, Expr, FunctionDef, Literal, Stmt, SubscriptExpr,
    UnaryExpr,
};

use crate::builtins::TemplateOp::Op;
use crate::builtins::operators::{self, Operation};
use crate::bytecode::Opcode;
use crate::context::CompilationContext;
use crate::return_checker::ReturnChecker;
use crate::semantic::{Callee, Intrinsic};
use crate::symbols::{ClassKind, Symbol};

/// The function whose body is being checked.
#[derive(Debug, Clone)]
struct FunctionFrame {
    return_type: Type,
}

/// A resolved call target with its declared parameters.
struct Signature {
    callee: Callee,
    name: String,
    params: Vec<(String, Type)>,
    returns: Type,
}

pub struct TypeCheckPass<'a, 'ast> {
    ctx: &'a mut CompilationContext<'ast>,
    module: ModuleId,
    module_scope: ScopeId,
    /// Innermost scope for name lookups.
    scope: ScopeId,
    function: Option<FunctionFrame>,
    loop_depth: usize,
}

impl<'a, 'ast> TypeCheckPass<'a, 'ast> {
    pub fn new(ctx: &'a mut CompilationContext<'ast>, module: ModuleId) -> Self {
        let scope = ctx.module(module).scope;
        Self {
            ctx,
            module,
            module_scope: scope,
            scope,
            function: None,
            loop_depth: 0,
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self) {
        let body: &'ast [Stmt<'ast>] = self.ctx.module(self.module).ast.body;
        let errors_before = self.ctx.diagnostics.error_count();

        let top_level: Vec<Stmt<'ast>> = body
            .iter()
            .copied()
            .filter(|stmt| {
                !matches!(
                    stmt,
                    Stmt::FunctionDef(_) | Stmt::ClassDef(_) | Stmt::Import(_) | Stmt::ImportFrom(_)
                )
            })
            .collect();
        self.check_block(&top_level);

        // `__init__` first, so the fields it declares are typed before use.
        for init in [true, false] {
            for stmt in body.iter().copied() {
                match stmt {
                    Stmt::FunctionDef(def) if !init => self.check_function(def),
                    Stmt::ClassDef(class) => {
                        for member in class.body.iter().copied() {
                            if let Stmt::FunctionDef(def) = member {
                                if (def.name.name == "__init__") == init {
                                    self.check_function(def);
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        tracing::debug!(
            module = %self.ctx.module(self.module).name,
            errors = self.ctx.diagnostics.error_count() - errors_before,
            "type checked"
        );
    }

    fn check_function(&mut self, def: &'ast FunctionDef<'ast>) {
        let Some(symbol) = self.ctx.model.binding(def.id) else {
            return;
        };
        let Symbol::Method(method) = self.ctx.symbols.symbol(symbol) else {
            return;
        };
        let scope = method.scope;
        let return_type = method.return_type.clone();

        self.scope = scope;
        self.loop_depth = 0;
        self.function = Some(FunctionFrame {
            return_type: return_type.clone(),
        });
        self.check_block(def.body);

        if !return_type.is_type_of(&Type::None) && !ReturnChecker::new().all_paths_return(def.body) {
            self.ctx.diagnostics.error(CompilerError::MissingReturn {
                function: def.name.name.to_string(),
                span: def.name.span,
            });
        }

        self.function = None;
        self.scope = self.module_scope;
    }

    // =========================================
    // Statements
    // =========================================

    fn check_block(&mut self, stmts: &[Stmt<'ast>]) {
        let mut terminated = false;
        for stmt in stmts {
            if terminated {
                self.ctx
                    .diagnostics
                    .warning(CompilerWarning::UnreachableCode { span: stmt.span() });
                terminated = false;
            }
            self.check_stmt(stmt);
            if stmt.is_terminal() {
                terminated = true;
            }
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt<'ast>) {
        match stmt {
            Stmt::Expr(s) => {
                self.check_expr(&s.expr);
            }
            Stmt::Assign(s) => self.check_assign(&s.target, &s.value),
            Stmt::AnnAssign(s) => match s.value {
                Some(value) => self.check_assign(&s.target, &value),
                None if matches!(s.target, Expr::Name(_)) => {
                    self.check_expr(&s.target);
                }
                None => self.ctx.diagnostics.error(CompilerError::unsupported(
                    "annotation without a value on a non-name target",
                    s.span,
                )),
            },
            Stmt::Return(s) => {
                let Some(frame) = self.function.clone() else {
                    self.ctx.diagnostics.error(CompilerError::MisplacedStatement {
                        statement: "return".into(),
                        context: "function".into(),
                        span: s.span,
                    });
                    return;
                };
                match s.value {
                    Some(value) => {
                        self.check_expr(&value);
                        self.coerce(&value, &frame.return_type);
                    }
                    None if !frame.return_type.is_type_of(&Type::None) => {
                        self.ctx
                            .diagnostics
                            .error(CompilerError::mismatched(&frame.return_type, Type::None, s.span));
                    }
                    None => {}
                }
            }
            Stmt::If(s) => {
                self.check_expr(&s.test);
                self.check_block(s.body);
                self.check_block(s.orelse);
            }
            Stmt::While(s) => {
                self.check_expr(&s.test);
                self.loop_depth += 1;
                self.check_block(s.body);
                self.loop_depth -= 1;
            }
            Stmt::Break(span) | Stmt::Continue(span) => {
                if self.loop_depth == 0 {
                    let statement = if matches!(stmt, Stmt::Break(_)) { "break" } else { "continue" };
                    self.ctx.diagnostics.error(CompilerError::MisplacedStatement {
                        statement: statement.into(),
                        context: "loop".into(),
                        span: *span,
                    });
                }
            }
            Stmt::Pass(_) => {}
            Stmt::Assert(s) => {
                self.check_expr(&s.test);
                if let Some(msg) = s.msg {
                    self.check_expr(&msg);
                    self.coerce(&msg, &Type::Str);
                }
            }
            Stmt::FunctionDef(def) => self
                .ctx
                .diagnostics
                .error(CompilerError::unsupported("nested function definition", def.span)),
            Stmt::ClassDef(class) => self
                .ctx
                .diagnostics
                .error(CompilerError::unsupported("nested class definition", class.span)),
            Stmt::Import(_) | Stmt::ImportFrom(_) => self
                .ctx
                .diagnostics
                .error(CompilerError::unsupported("import inside a block", stmt.span())),
            Stmt::AugAssign(_) | Stmt::For(_) => self.ctx.diagnostics.error(CompilerError::Internal {
                message: format!("statement at {} was not normalised", stmt.span()),
            }),
        }
    }

    fn check_assign(&mut self, target: &Expr<'ast>, value: &Expr<'ast>) {
        let actual = self.check_expr(value);
        match target {
            Expr::Name(name) => {
                let Some(symbol) = self.lookup_or_report(name.name, name.span) else {
                    return;
                };
                self.ctx.model.bind(name.id, symbol);
                let kind = self.ctx.symbols.symbol(symbol).kind_name();
                let Symbol::Variable(var) = self.ctx.symbols.symbol_mut(symbol) else {
                    self.ctx.diagnostics.error(CompilerError::unsupported(
                        format!("assignment to {kind} '{}'", name.name),
                        name.span,
                    ));
                    return;
                };
                if var.needs_inference {
                    var.ty = if actual.is_none() { Type::Any } else { actual };
                    var.needs_inference = false;
                }
                let declared = var.ty.clone();
                self.ctx.model.set_type(name.id, declared.clone());
                self.coerce(value, &declared);
            }
            Expr::Attribute(attr) => {
                let Some(declared) = self.check_attribute_target(attr, actual) else {
                    return;
                };
                self.coerce(value, &declared);
            }
            Expr::Subscript(sub) => {
                let container = self.check_expr(&sub.value);
                self.check_expr(&sub.index);
                let writable = matches!(container, Type::Any | Type::List(_) | Type::Dict(..));
                let (Some(key), Some(item), true) = (container.key_type(), container.item_type(), writable) else {
                    self.ctx.diagnostics.error(CompilerError::NotSupportedOperation {
                        operator: "item assignment".into(),
                        operands: format!("'{container}'"),
                        span: sub.span,
                    });
                    return;
                };
                self.coerce(&sub.index, &key);
                self.coerce(value, &item);
                self.ctx.model.set_type(sub.id, item);
            }
            other => self
                .ctx
                .diagnostics
                .error(CompilerError::unsupported(format!("assignment to a {}", other.describe()), other.span())),
        }
    }

    /// Check `obj.field` as an assignment target, returning the field type.
    /// A field declared without a type takes the type of `actual`.
    fn check_attribute_target(&mut self, attr: &AttributeExpr<'ast>, actual: Type) -> Option<Type> {
        if self.import_scope_of(&attr.value).is_some() {
            self.ctx.diagnostics.error(CompilerError::unsupported(
                "assignment to a member of another module",
                attr.span,
            ));
            return None;
        }
        let owner = self.check_expr(&attr.value);
        let (symbol, mut ty) = self.property(&owner, attr)?;
        if let Symbol::Property(property) = self.ctx.symbols.symbol_mut(symbol) {
            if property.needs_inference {
                property.ty = if actual.is_none() { Type::Any } else { actual };
                property.needs_inference = false;
                ty = property.ty.clone();
            }
        }
        self.ctx.model.bind(attr.id, symbol);
        self.ctx.model.set_type(attr.id, ty.clone());
        Some(ty)
    }

    // =========================================
    // Expressions
    // =========================================

    /// Type an expression and record the type.
    fn check_expr(&mut self, expr: &Expr<'ast>) -> Type {
        let ty = self.infer(expr);
        self.ctx.model.set_type(expr.id(), ty.clone());
        ty
    }

    fn infer(&mut self, expr: &Expr<'ast>) -> Type {
        match expr {
            Expr::Literal(lit) => lit.value.to_constant().ty(),
            Expr::Name(name) => self.check_name(name.id, name.name, name.span),
            Expr::Attribute(attr) => self.check_attribute(attr),
            Expr::Binary(bin) => self.check_binary(bin),
            Expr::Unary(unary) => self.check_unary(unary),
            Expr::BoolOp(bool_op) => self.check_bool_op(bool_op),
            Expr::Compare(cmp) => {
                self.ctx.diagnostics.error(CompilerError::Internal {
                    message: format!("comparison chain at {} was not normalised", cmp.span),
                });
                Type::Any
            }
            Expr::Call(call) => self.check_call(call),
            Expr::Subscript(sub) => self.check_subscript(sub),
            Expr::Slice(slice) => {
                let ty = self.check_expr(&slice.value);
                for bound in [slice.lower, slice.upper].into_iter().flatten() {
                    self.check_expr(&bound);
                    self.coerce(&bound, &Type::Int);
                }
                if matches!(ty, Type::Str | Type::Bytes) {
                    ty
                } else {
                    self.ctx.diagnostics.error(CompilerError::NotSupportedOperation {
                        operator: "slice".into(),
                        operands: format!("'{ty}'"),
                        span: slice.span,
                    });
                    Type::Any
                }
            }
            Expr::List(seq) => Type::list(self.element_type(seq.elements)),
            Expr::Tuple(seq) => Type::tuple(self.element_type(seq.elements)),
            Expr::Dict(dict) => {
                let key = self.element_type(dict.keys);
                let value = self.element_type(dict.values);
                Type::dict(key, value)
            }
            Expr::IfExp(if_exp) => {
                self.check_expr(&if_exp.test);
                let body = self.check_expr(&if_exp.body);
                let orelse = self.check_expr(&if_exp.orelse);
                Type::union([body, orelse])
            }
        }
    }

    fn element_type(&mut self, elements: &[Expr<'ast>]) -> Type {
        let types: Vec<Type> = elements.iter().map(|element| self.check_expr(element)).collect();
        Type::union(types)
    }

    fn check_name(&mut self, id: NodeId, name: &str, span: Span) -> Type {
        let Some(symbol) = self.lookup_or_report(name, span) else {
            return Type::Any;
        };
        match self.ctx.symbols.symbol(symbol) {
            Symbol::Variable(var) => {
                let ty = if var.needs_inference { Type::Any } else { var.ty.clone() };
                self.ctx.model.bind(id, symbol);
                ty
            }
            other => {
                let kind = other.kind_name();
                self.ctx
                    .diagnostics
                    .error(CompilerError::unsupported(format!("{kind} '{name}' used as a value"), span));
                Type::Any
            }
        }
    }

    fn check_attribute(&mut self, attr: &AttributeExpr<'ast>) -> Type {
        if let Some(scope) = self.import_scope_of(&attr.value) {
            let Some(symbol) = self.ctx.symbols.lookup_local(scope, attr.attr.name) else {
                self.report_unresolved(dotted_attribute(attr), attr.span);
                return Type::Any;
            };
            return match self.ctx.symbols.symbol(symbol) {
                Symbol::Variable(var) => {
                    let ty = if var.needs_inference { Type::Any } else { var.ty.clone() };
                    self.ctx.model.bind(attr.id, symbol);
                    ty
                }
                other => {
                    let kind = other.kind_name();
                    self.ctx.diagnostics.error(CompilerError::unsupported(
                        format!("{kind} '{}' used as a value", attr.attr.name),
                        attr.span,
                    ));
                    Type::Any
                }
            };
        }

        let owner = self.check_expr(&attr.value);
        match self.property(&owner, attr) {
            Some((symbol, ty)) => {
                self.ctx.model.bind(attr.id, symbol);
                ty
            }
            None => Type::Any,
        }
    }

    /// The field `attr` names on a value of type `owner`.
    fn property(&mut self, owner: &Type, attr: &AttributeExpr<'ast>) -> Option<(SymbolId, Type)> {
        let Type::Class(class) = owner else {
            self.ctx.diagnostics.error(CompilerError::UnresolvedReference {
                name: format!("{owner}.{}", attr.attr.name),
                span: attr.span,
            });
            return None;
        };
        let Symbol::Class(ClassKind::User(user)) = self.ctx.symbols.symbol(class.id) else {
            return None;
        };
        match self.ctx.symbols.lookup_local(user.scope, attr.attr.name) {
            Some(symbol) => match self.ctx.symbols.symbol(symbol) {
                Symbol::Property(property) => Some((symbol, property.ty.clone())),
                _ => {
                    self.ctx.diagnostics.error(CompilerError::unsupported(
                        format!("method '{}' used as a value", attr.attr.name),
                        attr.span,
                    ));
                    None
                }
            },
            None => {
                self.ctx.diagnostics.error(CompilerError::UnresolvedReference {
                    name: format!("{}.{}", class.name, attr.attr.name),
                    span: attr.span,
                });
                None
            }
        }
    }

    fn check_binary(&mut self, bin: &BinaryExpr<'ast>) -> Type {
        let left = self.check_expr(&bin.left);
        let right = self.check_expr(&bin.right);

        let operation = match bin.op {
            BinaryOp::Is | BinaryOp::IsNot => Some(identity(bin, &left, &right)),
            op => operators::binary(op, &left, &right),
        };
        match operation {
            Some(operation) => {
                let result = operation.result.clone();
                self.ctx.model.set_operation(bin.id, operation);
                result
            }
            None => {
                self.ctx.diagnostics.error(CompilerError::NotSupportedOperation {
                    operator: bin.op.as_str().to_string(),
                    operands: format!("'{left}' and '{right}'"),
                    span: bin.span,
                });
                Type::Any
            }
        }
    }

    fn check_unary(&mut self, unary: &UnaryExpr<'ast>) -> Type {
        let operand = self.check_expr(&unary.operand);
        match operators::unary(unary.op, &operand) {
            Some(operation) => {
                let result = operation.result.clone();
                self.ctx.model.set_operation(unary.id, operation);
                result
            }
            None => {
                self.ctx.diagnostics.error(CompilerError::NotSupportedOperation {
                    operator: unary.op.as_str().to_string(),
                    operands: format!("'{operand}'"),
                    span: unary.span,
                });
                Type::Any
            }
        }
    }

    fn check_bool_op(&mut self, bool_op: &BoolOpExpr<'ast>) -> Type {
        self.check_expr(&bool_op.left);
        self.check_expr(&bool_op.right);
        Type::Bool
    }

    fn check_subscript(&mut self, sub: &SubscriptExpr<'ast>) -> Type {
        let container = self.check_expr(&sub.value);
        self.check_expr(&sub.index);
        let (Some(key), Some(item)) = (container.key_type(), container.item_type()) else {
            self.ctx.diagnostics.error(CompilerError::NotSupportedOperation {
                operator: "[]".into(),
                operands: format!("'{container}'"),
                span: sub.span,
            });
            return Type::Any;
        };
        self.coerce(&sub.index, &key);
        item
    }

    // =========================================
    // Calls
    // =========================================

    fn check_call(&mut self, call: &CallExpr<'ast>) -> Type {
        let Some(signature) = self.resolve_callee(call) else {
            for arg in call.args {
                self.check_expr(arg);
            }
            return Type::Any;
        };

        let arg_types: Vec<Type> = call.args.iter().map(|arg| self.check_expr(arg)).collect();
        if call.args.len() < signature.params.len() {
            let (param, _) = &signature.params[call.args.len()];
            self.ctx.diagnostics.error(CompilerError::UnfilledArgument {
                callee: signature.name.clone(),
                param: param.clone(),
                span: call.span,
            });
        } else if call.args.len() > signature.params.len() {
            self.ctx.diagnostics.error(CompilerError::UnexpectedArgument {
                callee: signature.name.clone(),
                span: call.args[signature.params.len()].span(),
            });
        }
        for (arg, (_, expected)) in call.args.iter().zip(&signature.params) {
            self.coerce(arg, expected);
        }

        let returns = match signature.callee {
            Callee::Builtin(id) => self.ctx.builtins.get(id).return_type(&arg_types),
            _ => signature.returns,
        };
        self.ctx.model.set_callee(call.id, signature.callee);
        returns
    }

    fn resolve_callee(&mut self, call: &CallExpr<'ast>) -> Option<Signature> {
        match call.func {
            Expr::Name(name) => {
                let symbol = self.lookup_or_report(name.name, name.span)?;
                self.ctx.model.bind(name.id, symbol);
                self.signature(symbol, name.name, call.func.span())
            }
            Expr::Attribute(attr) => {
                if let Some(scope) = self.import_scope_of(&attr.value) {
                    let Some(symbol) = self.ctx.symbols.lookup_local(scope, attr.attr.name) else {
                        self.report_unresolved(dotted_attribute(attr), attr.span);
                        return None;
                    };
                    self.ctx.model.bind(attr.id, symbol);
                    return self.signature(symbol, attr.attr.name, attr.span);
                }

                let receiver = self.check_expr(&attr.value);
                self.method_signature(&receiver, attr)
            }
            other => {
                self.ctx
                    .diagnostics
                    .error(CompilerError::unsupported(format!("call of a {}", other.describe()), other.span()));
                None
            }
        }
    }

    /// Signature of a function, builtin or class named directly.
    fn signature(&mut self, symbol: SymbolId, name: &str, span: Span) -> Option<Signature> {
        match self.ctx.symbols.symbol(symbol) {
            Symbol::Method(method) => Some(Signature {
                callee: Callee::Method(symbol),
                name: name.to_string(),
                params: self.params(&method.args),
                returns: method.return_type.clone(),
            }),
            Symbol::Builtin(id) => {
                let builtin = self.ctx.builtins.get(*id);
                Some(Signature {
                    callee: Callee::Builtin(*id),
                    name: name.to_string(),
                    params: builtin
                        .params
                        .iter()
                        .map(|(param, ty)| (param.to_string(), ty.clone()))
                        .collect(),
                    returns: Type::Any,
                })
            }
            Symbol::Class(ClassKind::User(class)) => {
                let params = match class.init.map(|init| self.ctx.symbols.symbol(init)) {
                    Some(Symbol::Method(init)) => self.params(init.args.get(1..).unwrap_or_default()),
                    _ => Vec::new(),
                };
                Some(Signature {
                    callee: Callee::Constructor(symbol),
                    name: name.to_string(),
                    params,
                    returns: Type::Class(class.ty.clone()),
                })
            }
            other => {
                let kind = other.kind_name();
                self.ctx
                    .diagnostics
                    .error(CompilerError::unsupported(format!("call of {kind} '{name}'"), span));
                None
            }
        }
    }

    /// Signature of `receiver.attr(...)`.
    fn method_signature(&mut self, receiver: &Type, attr: &AttributeExpr<'ast>) -> Option<Signature> {
        let name = attr.attr.name;
        let intrinsic = |intrinsic, params: Vec<(String, Type)>, returns| Signature {
            callee: Callee::Intrinsic(intrinsic),
            name: name.to_string(),
            params,
            returns,
        };
        match (receiver, name) {
            (Type::List(item), "append") => {
                return Some(intrinsic(Intrinsic::Append, vec![("item".into(), (**item).clone())], Type::None));
            }
            (Type::Dict(key, _), "keys") => {
                return Some(intrinsic(Intrinsic::Keys, Vec::new(), Type::list((**key).clone())));
            }
            (Type::Dict(_, value), "values") => {
                return Some(intrinsic(Intrinsic::Values, Vec::new(), Type::list((**value).clone())));
            }
            _ => {}
        }

        let method = match receiver {
            Type::Class(class) => match self.ctx.symbols.symbol(class.id) {
                Symbol::Class(ClassKind::User(user)) => self.ctx.symbols.lookup_local(user.scope, name),
                _ => None,
            },
            _ => None,
        };
        let Some(method) = method else {
            self.ctx.diagnostics.error(CompilerError::UnresolvedReference {
                name: format!("{receiver}.{name}"),
                span: attr.span,
            });
            return None;
        };
        let Symbol::Method(target) = self.ctx.symbols.symbol(method) else {
            self.ctx.diagnostics.error(CompilerError::unsupported(
                format!("call of field '{name}'"),
                attr.span,
            ));
            return None;
        };
        let Some((_, bound)) = target.args.split_first() else {
            self.ctx.diagnostics.error(CompilerError::unsupported(
                format!("method '{name}' without a 'self' parameter"),
                attr.span,
            ));
            return None;
        };
        let signature = Signature {
            callee: Callee::BoundMethod(method),
            name: name.to_string(),
            params: self.params(bound),
            returns: target.return_type.clone(),
        };
        self.ctx.model.bind(attr.id, method);
        Some(signature)
    }

    fn params(&self, args: &[SymbolId]) -> Vec<(String, Type)> {
        args.iter()
            .map(|arg| {
                let entry = self.ctx.symbols.get(*arg);
                (entry.name.clone(), entry.ty())
            })
            .collect()
    }

    // =========================================
    // Helpers
    // =========================================

    /// Check that the value of `expr` is accepted as `expected`, recording
    /// an implicit cast where one applies.
    fn coerce(&mut self, expr: &Expr<'ast>, expected: &Type) -> bool {
        let actual = self.ctx.model.type_of(expr.id()).cloned().unwrap_or(Type::Any);
        if !expected.is_type_of(&actual) {
            self.ctx
                .diagnostics
                .error(CompilerError::mismatched(expected, &actual, expr.span()));
            return false;
        }
        if *expected == Type::Int && actual == Type::Bool {
            self.ctx.model.add_cast(expr.id(), Type::Int);
        }
        true
    }

    fn lookup_or_report(&mut self, name: &str, span: Span) -> Option<SymbolId> {
        let symbol = self.ctx.symbols.lookup(self.scope, name);
        if symbol.is_none() {
            self.ctx.diagnostics.error(CompilerError::UnresolvedReference {
                name: name.to_string(),
                span,
            });
        }
        symbol
    }

    fn report_unresolved(&mut self, name: String, span: Span) {
        self.ctx
            .diagnostics
            .error(CompilerError::UnresolvedReference { name, span });
    }

    /// Scope of the module or package an expression names, if it names one.
    fn import_scope_of(&self, expr: &Expr<'ast>) -> Option<ScopeId> {
        let symbol = match expr {
            Expr::Name(name) => self.ctx.symbols.lookup(self.scope, name.name)?,
            Expr::Attribute(attr) => {
                let scope = self.import_scope_of(&attr.value)?;
                self.ctx.symbols.lookup_local(scope, attr.attr.name)?
            }
            _ => return None,
        };
        match self.ctx.symbols.symbol(symbol) {
            Symbol::Import(import) => Some(import.scope),
            _ => None,
        }
    }
}

/// `x is None`, `x is not None` and identity between other values.
fn identity(bin: &BinaryExpr<'_>, left: &Type, right: &Type) -> Operation {
    let against_none = matches!(bin.left.as_literal(), Some(Literal::None))
        || matches!(bin.right.as_literal(), Some(Literal::None));
    let negate = bin.op == BinaryOp::IsNot;
    let template = match (against_none, negate) {
        (true, false) => vec![Op(Opcode::IsNull)],
        (true, true) => vec![Op(Opcode::IsNull), Op(Opcode::Not)],
        (false, _) => {
            let numeric = left.stack_item() == StackItemType::Integer && right.stack_item() == StackItemType::Integer;
            match (numeric, negate) {
                (true, false) => vec![Op(Opcode::NumEqual)],
                (true, true) => vec![Op(Opcode::NumNotEqual)],
                (false, false) => vec![Op(Opcode::Equal)],
                (false, true) => vec![Op(Opcode::NotEqual)],
            }
        }
    };
    Operation {
        result: Type::Bool,
        template,
    }
}

fn dotted_attribute(attr: &AttributeExpr<'_>) -> String {
    format!("{}.{}", dotted(&attr.value), attr.attr.name)
}

fn dotted(expr: &Expr<'_>) -> String {
    match expr {
        Expr::Name(name) => name.name.to_string(),
        Expr::Attribute(attr) => dotted_attribute(attr),
        other => other.describe().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use bumpalo::Bump;

    use super::*;
    use crate::loader::MemoryLoader;

    fn check<'a>(arena: &'a Bump, loader: &'a MemoryLoader) -> CompilationContext<'a> {
        let mut ctx = CompilationContext::new(arena, loader, "p");
        ctx.analyse_entry(Path::new("p/main.py"));
        ctx
    }

    fn errors_of(source: &str) -> Vec<CompilerError> {
        let arena = Bump::new();
        let loader = MemoryLoader::new().with_file("p/main.py", source);
        let ctx = check(&arena, &loader);
        ctx.diagnostics.errors().to_vec()
    }

    #[test]
    fn well_typed_module_has_no_errors() {
        let errors = errors_of(
            "from interop import storage, runtime\n\
             TOTAL: int = 0\n\
             @public\n\
             def deposit(owner: bytes, amount: int) -> bool:\n    \
                 if not runtime.check_witness(owner):\n        \
                     return False\n    \
                 balance = to_int(storage.get(owner)) + amount\n    \
                 storage.put(owner, balance)\n    \
                 return True\n",
        );
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn first_assignment_fixes_the_type() {
        let errors = errors_of("def f() -> int:\n    x = 1\n    x = 'a'\n    return x\n");
        assert!(matches!(
            errors.as_slice(),
            [CompilerError::MismatchedTypes { expected, actual, .. }] if expected == "int" && actual == "str"
        ));
    }

    #[test]
    fn init_fixes_instance_field_types() {
        let errors = errors_of(
            "def read(w: Wallet) -> bytes:\n    return w.owner\n\n\
             class Wallet:\n    def __init__(self, owner: bytes):\n        self.owner = owner\n\n\
             def bad(w: Wallet) -> int:\n    return w.owner\n",
        );
        assert!(matches!(
            errors.as_slice(),
            [CompilerError::MismatchedTypes { expected, actual, .. }] if expected == "int" && actual == "bytes"
        ));
    }

    #[test]
    fn arity_errors() {
        let errors = errors_of(
            "def g(a: int, b: int) -> int:\n    return a\n\
             def f() -> int:\n    x = g(1)\n    return g(1, 2, 3)\n",
        );
        assert!(matches!(
            errors.as_slice(),
            [
                CompilerError::UnfilledArgument { param, .. },
                CompilerError::UnexpectedArgument { callee, .. },
            ] if param == "b" && callee == "g"
        ));
    }

    #[test]
    fn bool_argument_is_cast_to_int() {
        let arena = Bump::new();
        let loader = MemoryLoader::new().with_file(
            "p/main.py",
            "def g(a: int) -> int:\n    return a\ndef f() -> int:\n    return g(True)\n",
        );
        let ctx = check(&arena, &loader);
        assert!(!ctx.diagnostics.has_errors(), "{:?}", ctx.diagnostics.errors());

        let Stmt::FunctionDef(f) = ctx.entry().unwrap().ast.body[1] else {
            panic!("expected a function");
        };
        let Stmt::Return(ret) = f.body[0] else {
            panic!("expected a return");
        };
        let Some(Expr::Call(call)) = ret.value else {
            panic!("expected a call");
        };
        assert!(matches!(ctx.model.callee(call.id), Some(Callee::Method(_))));
        assert_eq!(ctx.model.cast(call.args[0].id()), Some(&Type::Int));
        assert_eq!(ctx.model.type_of(call.id), Some(&Type::Int));
    }

    #[test]
    fn unsupported_operand_pairs() {
        let errors = errors_of("x = 'a' - 1\n");
        assert!(matches!(
            errors.as_slice(),
            [CompilerError::NotSupportedOperation { operator, .. }] if operator == "-"
        ));
    }

    #[test]
    fn unresolved_names() {
        let errors = errors_of("def f() -> int:\n    return missing\n");
        assert!(matches!(
            errors.as_slice(),
            [CompilerError::UnresolvedReference { name, .. }] if name == "missing"
        ));
    }

    #[test]
    fn misplaced_statements() {
        let errors = errors_of("return 1\nbreak\n");
        assert!(matches!(
            errors.as_slice(),
            [
                CompilerError::MisplacedStatement { statement: ret, .. },
                CompilerError::MisplacedStatement { statement: brk, context, .. },
            ] if ret == "return" && brk == "break" && context == "loop"
        ));
    }

    #[test]
    fn missing_return_and_unreachable_code() {
        let arena = Bump::new();
        let loader = MemoryLoader::new().with_file(
            "p/main.py",
            "def f(a: bool) -> int:\n    if a:\n        return 1\n\
             def g() -> int:\n    return 1\n    x = 2\n",
        );
        let ctx = check(&arena, &loader);
        assert!(matches!(
            ctx.diagnostics.errors(),
            [CompilerError::MissingReturn { function, .. }] if function == "f"
        ));
        assert!(matches!(
            ctx.diagnostics.warnings(),
            [CompilerWarning::UnreachableCode { .. }]
        ));
    }

    #[test]
    fn optional_return_needs_no_explicit_return() {
        let errors = errors_of("from typing import Optional\ndef f(a: bool) -> Optional[int]:\n    if a:\n        return 1\n");
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn immutable_sequences_reject_item_assignment() {
        let errors = errors_of("def f(s: str, b: bytes):\n    s[0] = 'a'\n    b[0] = 1\n");
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|err| matches!(err, CompilerError::NotSupportedOperation { .. })));
    }

    #[test]
    fn classes_fields_and_methods() {
        let errors = errors_of(
            "class Counter:\n    value: int\n    def __init__(self, start: int):\n        self.value = start\n    \
                 def bump(self, by: int) -> int:\n        self.value = self.value + by\n        return self.value\n\
             def run() -> int:\n    c = Counter(1)\n    return c.bump(2)\n",
        );
        assert!(errors.is_empty(), "{errors:?}");

        let errors = errors_of(
            "class Counter:\n    value: int\n    def __init__(self, start: int):\n        self.value = start\n\
             def run() -> int:\n    c = Counter()\n    c.value = 'x'\n    return c.missing\n",
        );
        assert!(matches!(
            errors.as_slice(),
            [
                CompilerError::UnfilledArgument { .. },
                CompilerError::MismatchedTypes { .. },
                CompilerError::UnresolvedReference { name, .. },
            ] if name == "Counter.missing"
        ));
    }

    #[test]
    fn collection_intrinsics() {
        let errors = errors_of(
            "from typing import Dict, List\n\
             def f(d: Dict[str, int]) -> List[int]:\n    items: List[int] = []\n    items.append(1)\n    \
                 keys = d.keys()\n    return d.values()\n",
        );
        assert!(errors.is_empty(), "{errors:?}");

        let errors = errors_of("def f(x: List[int]):\n    x.append('a')\nfrom typing import List\n");
        assert!(errors.iter().any(|err| matches!(err, CompilerError::MismatchedTypes { .. })));
    }

    #[test]
    fn identity_against_none() {
        let arena = Bump::new();
        let loader = MemoryLoader::new().with_file(
            "p/main.py",
            "from typing import Optional\ndef f(x: Optional[int]) -> bool:\n    return x is not None\n",
        );
        let ctx = check(&arena, &loader);
        assert!(!ctx.diagnostics.has_errors(), "{:?}", ctx.diagnostics.errors());

        let Stmt::FunctionDef(f) = ctx.entry().unwrap().ast.body[1] else {
            panic!("expected a function");
        };
        let Stmt::Return(ret) = f.body[0] else {
            panic!("expected a return");
        };
        let operation = ctx.model.operation(ret.value.unwrap().id()).unwrap();
        assert_eq!(operation.template, vec![Op(Opcode::IsNull), Op(Opcode::Not)]);
    }

    #[test]
    fn nested_definitions_are_rejected() {
        let errors = errors_of("def f():\n    def g():\n        return\n");
        assert!(matches!(errors.as_slice(), [CompilerError::UnsupportedSyntax { .. }]));
    }
}
