//! Symbol kinds.

use bitflags::bitflags;

use neopyc_core::{ClassType, Constant, DefaultValue, ModuleId, NodeId, ScopeId, Span, SymbolId, Type};

use crate::bytecode::CodeId;
use crate::builtins::BuiltinId;

bitflags! {
    /// Properties of a symbol that do not depend on its kind.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SymbolFlags: u8 {
        /// Declared in the entry module (cleared when merged by an import).
        const DEFINED_BY_ENTRY = 1 << 0;
        /// Exported contract method (`@public`).
        const PUBLIC = 1 << 1;
        /// Pre-seeded by the compiler.
        const BUILTIN = 1 << 2;
        /// A class's `__init__`.
        const IS_INIT = 1 << 3;
    }
}

/// A named entry of the symbol arena.
#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub name: String,
    pub symbol: Symbol,
    /// The AST node that introduced the symbol; `None` for builtins.
    pub origin: Option<NodeId>,
    pub span: Span,
    pub flags: SymbolFlags,
}

impl SymbolEntry {
    pub fn new(name: impl Into<String>, symbol: Symbol) -> Self {
        Self {
            name: name.into(),
            symbol,
            origin: None,
            span: Span::default(),
            flags: SymbolFlags::empty(),
        }
    }

    pub fn with_origin(mut self, origin: NodeId, span: Span) -> Self {
        self.origin = Some(origin);
        self.span = span;
        self
    }

    pub fn with_flags(mut self, flags: SymbolFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// The type of a value of this symbol, `Any` for symbols that are not
    /// values.
    pub fn ty(&self) -> Type {
        match &self.symbol {
            Symbol::Variable(var) => var.ty.clone(),
            Symbol::Property(prop) => prop.ty.clone(),
            Symbol::Method(method) => method.return_type.clone(),
            Symbol::Class(ClassKind::User(class)) => Type::Class(class.ty.clone()),
            Symbol::Class(ClassKind::Builtin(ctor)) => ctor.base_type(),
            Symbol::Import(_) | Symbol::Builtin(_) => Type::Any,
        }
    }
}

/// What a name refers to.
#[derive(Debug, Clone)]
pub enum Symbol {
    Variable(Variable),
    Method(Method),
    Class(ClassKind),
    /// A field of a user class.
    Property(Property),
    /// A module or builtin package bound by `import`.
    Import(Import),
    Builtin(BuiltinId),
}

impl Symbol {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Symbol::Variable(_) => "variable",
            Symbol::Method(_) => "function",
            Symbol::Class(_) => "class",
            Symbol::Property(_) => "field",
            Symbol::Import(_) => "module",
            Symbol::Builtin(_) => "builtin function",
        }
    }
}

// =========================================================================
// Variables
// =========================================================================

/// Where a variable lives at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableKind {
    Argument(usize),
    Local(usize),
    /// A static field of the contract.
    Global(usize),
    /// Inlined at every use.
    Constant(Constant),
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub ty: Type,
    pub kind: VariableKind,
    /// Unannotated and not assigned yet; the first assignment fixes the type.
    pub needs_inference: bool,
}

impl Variable {
    pub fn new(ty: Type, kind: VariableKind) -> Self {
        Self {
            ty,
            kind,
            needs_inference: false,
        }
    }

    pub fn inferred(kind: VariableKind) -> Self {
        Self {
            ty: Type::Any,
            kind,
            needs_inference: true,
        }
    }
}

// =========================================================================
// Methods
// =========================================================================

/// Code generation progress of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MethodState {
    #[default]
    NotStarted,
    Generating,
    Ended { entry: CodeId, exit: CodeId },
}

#[derive(Debug, Clone)]
pub struct Method {
    /// Parameters in declaration order.
    pub args: Vec<SymbolId>,
    /// Locals in slot order.
    pub locals: Vec<SymbolId>,
    pub return_type: Type,
    /// Scope holding the parameters and locals.
    pub scope: ScopeId,
    /// The class this method belongs to.
    pub class: Option<SymbolId>,
    pub module: ModuleId,
    pub state: MethodState,
}

impl Method {
    pub fn new(scope: ScopeId, module: ModuleId) -> Self {
        Self {
            args: Vec::new(),
            locals: Vec::new(),
            return_type: Type::None,
            scope,
            class: None,
            module,
            state: MethodState::NotStarted,
        }
    }

    /// Entry and exit instructions once generated.
    pub fn bounds(&self) -> Option<(CodeId, CodeId)> {
        match self.state {
            MethodState::Ended { entry, exit } => Some((entry, exit)),
            _ => None,
        }
    }
}

// =========================================================================
// Classes
// =========================================================================

#[derive(Debug, Clone)]
pub enum ClassKind {
    /// A builtin type name usable in annotations.
    Builtin(TypeConstructor),
    User(UserClass),
}

/// How a builtin type name turns into a [`Type`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeConstructor {
    /// A complete type such as `int` or bare `list`.
    Concrete(Type),
    /// `List[T]`
    List,
    /// `Dict[K, V]`
    Dict,
    /// `Tuple[T, ...]`
    Tuple,
    /// `Union[A, B, ...]`
    Union,
    /// `Optional[T]`
    Optional,
}

impl TypeConstructor {
    /// The type the name stands for when used without subscript.
    pub fn base_type(&self) -> Type {
        match self {
            TypeConstructor::Concrete(ty) => ty.clone(),
            TypeConstructor::List => Type::list(Type::Any),
            TypeConstructor::Dict => Type::dict(Type::Any, Type::Any),
            TypeConstructor::Tuple => Type::tuple(Type::Any),
            TypeConstructor::Union | TypeConstructor::Optional => Type::Any,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserClass {
    pub ty: ClassType,
    /// Fields in struct order.
    pub fields: Vec<SymbolId>,
    pub methods: Vec<SymbolId>,
    pub init: Option<SymbolId>,
    /// Scope holding the fields and methods by name.
    pub scope: ScopeId,
}

/// A class field: its index in the struct, type and initial value.
#[derive(Debug, Clone)]
pub struct Property {
    pub index: usize,
    pub ty: Type,
    pub default: DefaultValue,
    pub class: SymbolId,
    /// Assigned in `__init__` without an annotation or literal; the first
    /// assignment the type checker meets fixes the type.
    pub needs_inference: bool,
}

// =========================================================================
// Imports
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Import {
    /// Scope whose names are reached through attribute access.
    pub scope: ScopeId,
    /// The analysed module, `None` for builtin packages.
    pub module: Option<ModuleId>,
}
