//! Builtin functions, types and packages.
//!
//! A builtin function is a descriptor: a name, typed parameters, a return
//! type and the instruction template spliced in at each call. Arguments are
//! pushed in reverse order before the template runs, so the first argument
//! is on top of the stack.
//!
//! [`Builtins::seed`] pre-populates the root scope of a [`SymbolTable`] with
//! the builtin type names and functions, and creates a scope for each
//! importable package (`typing`, `builtin`, `interop.*`).

mod interop;
pub mod operators;

use rustc_hash::FxHashMap;

use neopyc_core::{Constant, ScopeId, StackItemType, Type};

use crate::bytecode::Opcode;
use crate::symbols::{
    ClassKind, Import, ScopeKind, Symbol, SymbolEntry, SymbolFlags, SymbolTable, TypeConstructor, Variable,
    VariableKind,
};

/// Identifies a builtin function descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuiltinId(u16);

impl BuiltinId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One step of an instruction template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateOp {
    Op(Opcode),
    Convert(StackItemType),
    PushInt(i128),
    PushData(&'static [u8]),
    Syscall(&'static str),
}

/// How the result type of a builtin call is determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    Fixed(Type),
    /// The type of the first argument (`abs`, `min`, `max`).
    FirstArgument,
}

/// Descriptor of a builtin function.
#[derive(Debug, Clone)]
pub struct BuiltinMethod {
    pub name: &'static str,
    pub params: Vec<(&'static str, Type)>,
    pub returns: ReturnType,
    pub template: Vec<TemplateOp>,
}

impl BuiltinMethod {
    pub fn new(name: &'static str, params: Vec<(&'static str, Type)>, returns: Type, template: Vec<TemplateOp>) -> Self {
        Self {
            name,
            params,
            returns: ReturnType::Fixed(returns),
            template,
        }
    }

    pub fn return_type(&self, args: &[Type]) -> Type {
        match &self.returns {
            ReturnType::Fixed(ty) => ty.clone(),
            ReturnType::FirstArgument => args.first().cloned().unwrap_or(Type::Any),
        }
    }
}

/// Member of a builtin package.
#[derive(Debug, Clone)]
pub(crate) enum PackageMember {
    Method(BuiltinMethod),
    Constant(&'static str, Constant),
}

/// The builtin catalog of one compilation.
#[derive(Debug, Default)]
pub struct Builtins {
    methods: Vec<BuiltinMethod>,
    packages: FxHashMap<String, ScopeId>,
}

impl Builtins {
    /// Register every builtin in `symbols` and return the catalog.
    pub fn seed(symbols: &mut SymbolTable) -> Self {
        let mut builtins = Builtins::default();
        let root = symbols.root();

        for (name, ctor) in [
            ("int", TypeConstructor::Concrete(Type::Int)),
            ("bool", TypeConstructor::Concrete(Type::Bool)),
            ("str", TypeConstructor::Concrete(Type::Str)),
            ("bytes", TypeConstructor::Concrete(Type::Bytes)),
            ("list", TypeConstructor::List),
            ("dict", TypeConstructor::Dict),
            ("tuple", TypeConstructor::Tuple),
        ] {
            define_builtin(symbols, root, name, Symbol::Class(ClassKind::Builtin(ctor)));
        }

        for method in core_functions() {
            let name = method.name;
            let id = builtins.add_method(method);
            define_builtin(symbols, root, name, Symbol::Builtin(id));
        }

        let typing = builtins.add_package(symbols, "typing");
        for (name, ctor) in [
            ("Any", TypeConstructor::Concrete(Type::Any)),
            ("List", TypeConstructor::List),
            ("Dict", TypeConstructor::Dict),
            ("Tuple", TypeConstructor::Tuple),
            ("Union", TypeConstructor::Union),
            ("Optional", TypeConstructor::Optional),
        ] {
            define_builtin(symbols, typing, name, Symbol::Class(ClassKind::Builtin(ctor)));
        }

        let builtin = builtins.add_package(symbols, "builtin");
        if let Some(public) = symbols.lookup_local(root, "public") {
            symbols.bind(builtin, "public", public);
        }

        let interop = builtins.add_package(symbols, "interop");
        for (name, members) in [
            ("storage", interop::storage()),
            ("runtime", interop::runtime()),
            ("crypto", interop::crypto()),
        ] {
            let scope = builtins.add_package(symbols, &format!("interop.{name}"));
            for member in members {
                builtins.add_member(symbols, scope, member);
            }
            let import = Symbol::Import(Import { scope, module: None });
            define_builtin(symbols, interop, name, import);
        }

        builtins
    }

    pub fn get(&self, id: BuiltinId) -> &BuiltinMethod {
        &self.methods[id.index()]
    }

    /// Scope of a builtin package by dotted name.
    pub fn package(&self, name: &str) -> Option<ScopeId> {
        self.packages.get(name).copied()
    }

    fn add_method(&mut self, method: BuiltinMethod) -> BuiltinId {
        let id = BuiltinId(self.methods.len() as u16);
        self.methods.push(method);
        id
    }

    fn add_package(&mut self, symbols: &mut SymbolTable, name: &str) -> ScopeId {
        let scope = symbols.add_scope(None, ScopeKind::Package);
        self.packages.insert(name.to_string(), scope);
        scope
    }

    fn add_member(&mut self, symbols: &mut SymbolTable, scope: ScopeId, member: PackageMember) {
        match member {
            PackageMember::Method(method) => {
                let name = method.name;
                let id = self.add_method(method);
                define_builtin(symbols, scope, name, Symbol::Builtin(id));
            }
            PackageMember::Constant(name, value) => {
                let variable = Variable::new(value.ty(), VariableKind::Constant(value));
                define_builtin(symbols, scope, name, Symbol::Variable(variable));
            }
        }
    }
}

fn define_builtin(symbols: &mut SymbolTable, scope: ScopeId, name: &str, symbol: Symbol) {
    let entry = SymbolEntry::new(name, symbol).with_flags(SymbolFlags::BUILTIN);
    symbols.define(scope, entry);
}

/// Functions available without an import.
fn core_functions() -> Vec<BuiltinMethod> {
    use TemplateOp::*;

    let sized = Type::union([
        Type::Str,
        Type::Bytes,
        Type::list(Type::Any),
        Type::tuple(Type::Any),
        Type::dict(Type::Any, Type::Any),
    ]);

    vec![
        BuiltinMethod::new("len", vec![("obj", sized)], Type::Int, vec![Op(Opcode::Size)]),
        BuiltinMethod {
            name: "abs",
            params: vec![("x", Type::Int)],
            returns: ReturnType::FirstArgument,
            template: vec![Op(Opcode::Abs)],
        },
        BuiltinMethod {
            name: "min",
            params: vec![("a", Type::Int), ("b", Type::Int)],
            returns: ReturnType::FirstArgument,
            template: vec![Op(Opcode::Min)],
        },
        BuiltinMethod {
            name: "max",
            params: vec![("a", Type::Int), ("b", Type::Int)],
            returns: ReturnType::FirstArgument,
            template: vec![Op(Opcode::Max)],
        },
        BuiltinMethod::new(
            "to_int",
            vec![("value", Type::Bytes)],
            Type::Int,
            vec![Convert(StackItemType::Integer)],
        ),
        BuiltinMethod::new(
            "to_bytes",
            vec![("value", Type::union([Type::Int, Type::Str]))],
            Type::Bytes,
            vec![Convert(StackItemType::ByteString)],
        ),
        BuiltinMethod::new("to_str", vec![("value", Type::Bytes)], Type::Str, vec![]),
        BuiltinMethod::new(
            "print",
            vec![("message", Type::Str)],
            Type::None,
            vec![Syscall("System.Runtime.Log")],
        ),
        BuiltinMethod::new("public", vec![], Type::None, vec![]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (SymbolTable, Builtins) {
        let mut symbols = SymbolTable::new();
        let builtins = Builtins::seed(&mut symbols);
        (symbols, builtins)
    }

    fn builtin_named(symbols: &SymbolTable, builtins: &Builtins, scope: ScopeId, name: &str) -> BuiltinMethod {
        match symbols.symbol(symbols.lookup_local(scope, name).unwrap()) {
            Symbol::Builtin(id) => builtins.get(*id).clone(),
            other => panic!("{name} is a {}", other.kind_name()),
        }
    }

    #[test]
    fn root_scope_has_types_and_functions() {
        let (symbols, builtins) = seeded();
        let root = symbols.root();

        assert!(matches!(
            symbols.symbol(symbols.lookup(root, "int").unwrap()),
            Symbol::Class(ClassKind::Builtin(TypeConstructor::Concrete(Type::Int)))
        ));
        let len = builtin_named(&symbols, &builtins, root, "len");
        assert_eq!(len.template, vec![TemplateOp::Op(Opcode::Size)]);
        assert!(len.params[0].1.is_type_of(&Type::list(Type::Int)));
        assert!(symbols.get(symbols.lookup(root, "print").unwrap()).flags.contains(SymbolFlags::BUILTIN));
        assert!(symbols.lookup(root, "List").is_none());
    }

    #[test]
    fn packages_are_registered() {
        let (symbols, builtins) = seeded();
        let typing = builtins.package("typing").unwrap();
        assert!(symbols.lookup_local(typing, "Optional").is_some());

        let storage = builtins.package("interop.storage").unwrap();
        let put = builtin_named(&symbols, &builtins, storage, "put");
        assert_eq!(put.params.len(), 2);
        assert_eq!(
            put.template,
            vec![
                TemplateOp::Syscall("System.Storage.GetContext"),
                TemplateOp::Syscall("System.Storage.Put"),
            ]
        );

        let interop = builtins.package("interop").unwrap();
        let runtime = symbols.lookup_local(interop, "runtime").unwrap();
        let Symbol::Import(import) = symbols.symbol(runtime) else {
            panic!("runtime is not a package");
        };
        assert_eq!(Some(import.scope), builtins.package("interop.runtime"));
    }

    #[test]
    fn trigger_constants() {
        let (symbols, builtins) = seeded();
        let runtime = builtins.package("interop.runtime").unwrap();
        let application = symbols.lookup_local(runtime, "APPLICATION").unwrap();
        assert!(matches!(
            symbols.symbol(application),
            Symbol::Variable(Variable { kind: VariableKind::Constant(Constant::Int(0x40)), .. })
        ));
    }

    #[test]
    fn first_argument_return_type() {
        let (symbols, builtins) = seeded();
        let abs = builtin_named(&symbols, &builtins, symbols.root(), "abs");
        assert_eq!(abs.return_type(&[Type::Int]), Type::Int);
        assert_eq!(abs.return_type(&[]), Type::Any);
    }
}
