//! Code generation.
//!
//! [`CodeGenerator`] turns an analysed program into one Neo N3 script.
//! Modules are generated in import order starting from the entry module;
//! within a module, functions and class methods follow source order. A
//! synthetic `_initialize` method runs the top-level statements of every
//! module, dependencies first, and sets up the static fields holding the
//! module globals.
//!
//! Calls are emitted against method symbols and resolved to addresses once
//! the callee has been generated, so generation order does not matter for
//! correctness.

mod call;
mod context;
mod expr;
mod function;
mod stmt;

pub use context::{CodeGenContext, MethodBounds};
pub use function::FunctionCompiler;

use neopyc_core::{CodegenError, SymbolId, Type};
use neopyc_parser::ast::{Expr, FunctionDef, Stmt};

use crate::bytecode::Opcode;
use crate::context::CompilationContext;
use crate::symbols::{MethodState, Symbol, SymbolFlags, Variable, VariableKind};

type Result<T> = std::result::Result<T, CodegenError>;

/// Name of the method the VM runs before any entry point.
pub const INITIALIZE: &str = "_initialize";

/// A generated method as it appears in the contract.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub name: String,
    /// Address of the first instruction.
    pub start: u32,
    /// Address of the last instruction.
    pub end: u32,
    /// Exported entry point.
    pub public: bool,
    pub args: Vec<(String, Type)>,
    pub return_type: Type,
}

/// Output of [`CodeGenerator::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCode {
    pub bytecode: Vec<u8>,
    pub methods: Vec<MethodInfo>,
}

struct GeneratedMethod {
    name: String,
    bounds: MethodBounds,
    public: bool,
    args: Vec<(String, Type)>,
    return_type: Type,
}

pub struct CodeGenerator<'a, 'ast> {
    ctx: &'a mut CompilationContext<'ast>,
    code: CodeGenContext,
    methods: Vec<GeneratedMethod>,
}

impl<'a, 'ast> CodeGenerator<'a, 'ast> {
    pub fn new(ctx: &'a mut CompilationContext<'ast>) -> Self {
        Self {
            ctx,
            code: CodeGenContext::new(),
            methods: Vec::new(),
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn generate(mut self) -> Result<GeneratedCode> {
        for module in self.ctx.generation_order() {
            let info = self.ctx.module(module);
            let (body, scope): (&'ast [Stmt<'ast>], _) = (info.ast.body, info.scope);
            tracing::debug!(module = %info.name, "generating module");

            for stmt in body {
                match stmt {
                    Stmt::FunctionDef(def) => {
                        let Some(symbol) = self.ctx.model.binding(def.id) else {
                            continue;
                        };
                        // A later definition with the same name replaced this one.
                        if self.ctx.symbols.lookup_local(scope, def.name.name) != Some(symbol) {
                            tracing::trace!(function = def.name.name, "skipping redefined function");
                            continue;
                        }
                        self.generate_method(symbol, def)?;
                    }
                    Stmt::ClassDef(class) => {
                        for member in class.body {
                            if let Stmt::FunctionDef(def) = member {
                                let Some(symbol) = self.ctx.model.binding(def.id) else {
                                    continue;
                                };
                                self.generate_method(symbol, def)?;
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        self.generate_initialize()?;

        let code = self.code.code();
        let methods = self
            .methods
            .into_iter()
            .map(|method| MethodInfo {
                start: code.address_of(method.bounds.entry),
                end: code.address_of(method.bounds.exit),
                name: method.name,
                public: method.public,
                args: method.args,
                return_type: method.return_type,
            })
            .collect();
        let bytecode = self.code.finish()?;
        tracing::debug!(bytes = bytecode.len(), "code generation finished");

        Ok(GeneratedCode { bytecode, methods })
    }

    fn generate_method(&mut self, symbol: SymbolId, def: &'ast FunctionDef<'ast>) -> Result<()> {
        let entry = self.ctx.symbols.get(symbol);
        let Symbol::Method(method) = &entry.symbol else {
            return Err(CodegenError::Unexpected(format!("'{}' is not a function", entry.name)));
        };
        if method.state != MethodState::NotStarted {
            return Err(CodegenError::MethodAlreadyGenerated(entry.name.clone()));
        }

        let name = match method.class {
            Some(class) => format!("{}.{}", self.ctx.symbols.get(class).name, entry.name),
            None => entry.name.clone(),
        };
        let public = entry.flags.contains(SymbolFlags::PUBLIC | SymbolFlags::DEFINED_BY_ENTRY);
        let args: Vec<(String, Type)> = method
            .args
            .iter()
            .map(|arg| {
                let arg = self.ctx.symbols.get(*arg);
                (arg.name.clone(), arg.ty())
            })
            .collect();
        let locals = method.locals.len();
        let return_type = method.return_type.clone();

        self.set_state(symbol, MethodState::Generating);
        self.code.begin_method(&name, args.len(), locals, return_type.clone())?;
        FunctionCompiler::new(self.ctx, &mut self.code, return_type.clone()).compile_block(def.body)?;
        let bounds = self.code.end_method()?;

        self.set_state(
            symbol,
            MethodState::Ended {
                entry: bounds.entry,
                exit: bounds.exit,
            },
        );
        self.code.emitter().code_mut().register_method_entry(symbol, bounds.entry)?;
        self.methods.push(GeneratedMethod {
            name,
            bounds,
            public,
            args,
            return_type,
        });
        Ok(())
    }

    /// Top-level statements of every module, dependencies first.
    fn generate_initialize(&mut self) -> Result<()> {
        let mut statements: Vec<Stmt<'ast>> = Vec::new();
        for module in self.ctx.initialization_order() {
            let body: &'ast [Stmt<'ast>] = self.ctx.module(module).ast.body;
            statements.extend(body.iter().copied().filter(|stmt| {
                !matches!(
                    stmt,
                    Stmt::FunctionDef(_) | Stmt::ClassDef(_) | Stmt::Import(_) | Stmt::ImportFrom(_)
                ) && !self.assigns_constant(stmt)
            }));
        }

        let globals = self.ctx.global_count();
        if globals == 0 && statements.is_empty() {
            return Ok(());
        }

        self.code.begin_method(INITIALIZE, 0, 0, Type::None)?;
        if globals > 0 {
            let count = u8::try_from(globals).map_err(|_| CodegenError::SlotOutOfRange(globals))?;
            self.code.emitter().emit_with_data(Opcode::InitSSlot, vec![count])?;
        }
        FunctionCompiler::new(self.ctx, &mut self.code, Type::None).compile_block(&statements)?;
        let bounds = self.code.end_method()?;

        // The VM invokes it on its own, so it is listed with the entry points.
        self.methods.push(GeneratedMethod {
            name: INITIALIZE.to_string(),
            bounds,
            public: true,
            args: Vec::new(),
            return_type: Type::None,
        });
        Ok(())
    }

    /// `NAME = literal` for a module constant, which is inlined at every use.
    fn assigns_constant(&self, stmt: &Stmt<'ast>) -> bool {
        let Stmt::Assign(assign) = stmt else {
            return false;
        };
        let Expr::Name(name) = assign.target else {
            return false;
        };
        self.ctx.model.binding(name.id).is_some_and(|symbol| {
            matches!(
                self.ctx.symbols.symbol(symbol),
                Symbol::Variable(Variable {
                    kind: VariableKind::Constant(_),
                    ..
                })
            )
        })
    }

    fn set_state(&mut self, symbol: SymbolId, state: MethodState) {
        if let Symbol::Method(method) = self.ctx.symbols.symbol_mut(symbol) {
            method.state = state;
        }
    }
}

#[cfg(test)]
mod tests;
