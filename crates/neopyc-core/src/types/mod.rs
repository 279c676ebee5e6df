//! The static type model.
//!
//! Every expression the compiler accepts is assigned a [`Type`]. Types know
//! how they are represented on the VM stack, what value an uninitialised
//! slot of that type holds, and which other types they accept.

mod stack_item;

pub use stack_item::StackItemType;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::{Constant, SymbolId};

/// A user-defined class, identified by the symbol that declares it.
///
/// Equality and hashing only consider the id; the name is carried for
/// diagnostics.
#[derive(Debug, Clone)]
pub struct ClassType {
    pub id: SymbolId,
    pub name: Rc<str>,
}

impl ClassType {
    pub fn new(id: SymbolId, name: &str) -> Self {
        Self {
            id,
            name: Rc::from(name),
        }
    }
}

impl PartialEq for ClassType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClassType {}

impl Hash for ClassType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A static type.
///
/// Tuples are homogeneous sequences: `Tuple[int, str]` is modelled as a
/// tuple of `Union[int, str]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Any,
    None,
    Bool,
    Int,
    Str,
    Bytes,
    List(Box<Type>),
    Dict(Box<Type>, Box<Type>),
    Tuple(Box<Type>),
    Union(Vec<Type>),
    Class(ClassType),
    /// An opaque host object such as a storage context.
    Interop(&'static str),
}

/// The value an uninitialised variable or field of a type starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    Constant(Constant),
    EmptyArray,
    EmptyMap,
}

impl Type {
    pub fn list(item: Type) -> Type {
        Type::List(Box::new(item))
    }

    pub fn tuple(item: Type) -> Type {
        Type::Tuple(Box::new(item))
    }

    pub fn dict(key: Type, value: Type) -> Type {
        Type::Dict(Box::new(key), Box::new(value))
    }

    pub fn optional(inner: Type) -> Type {
        Type::union([inner, Type::None])
    }

    /// Build a normalised union: nested unions are flattened, duplicates
    /// removed, `Any` absorbs everything and a single member collapses to
    /// itself. An empty union is `Any`.
    pub fn union(types: impl IntoIterator<Item = Type>) -> Type {
        let mut members: Vec<Type> = Vec::new();
        for ty in types {
            let flattened = match ty {
                Type::Union(inner) => inner,
                other => vec![other],
            };
            for member in flattened {
                if member == Type::Any {
                    return Type::Any;
                }
                if !members.contains(&member) {
                    members.push(member);
                }
            }
        }
        match members.len() {
            0 => Type::Any,
            1 => members.pop().unwrap_or(Type::Any),
            _ => Type::Union(members),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Any)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Type::None)
    }

    /// Whether the type stands for several possible runtime shapes, in which
    /// case no implicit conversion is ever emitted for it.
    pub fn is_generic(&self) -> bool {
        match self {
            Type::Any => true,
            Type::Union(_) => self.stack_item() == StackItemType::Any,
            _ => false,
        }
    }

    /// Whether a value of type `other` may be used where `self` is expected.
    pub fn is_type_of(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Any, _) | (_, Type::Any) => true,
            (_, Type::Union(members)) => members.iter().all(|m| self.is_type_of(m)),
            (Type::Union(members), _) => members.iter().any(|m| m.is_type_of(other)),
            (Type::Int, Type::Bool) => true,
            (Type::List(a), Type::List(b)) | (Type::Tuple(a), Type::Tuple(b)) => {
                a.is_type_of(b)
            }
            (Type::Dict(k1, v1), Type::Dict(k2, v2)) => k1.is_type_of(k2) && v1.is_type_of(v2),
            _ => self == other,
        }
    }

    /// Representation of values of this type on the VM stack.
    pub fn stack_item(&self) -> StackItemType {
        match self {
            Type::Any | Type::None => StackItemType::Any,
            Type::Bool => StackItemType::Boolean,
            Type::Int => StackItemType::Integer,
            Type::Str | Type::Bytes => StackItemType::ByteString,
            Type::List(_) | Type::Tuple(_) => StackItemType::Array,
            Type::Dict(..) => StackItemType::Map,
            Type::Class(_) => StackItemType::Struct,
            Type::Interop(_) => StackItemType::InteropInterface,
            Type::Union(members) => {
                let mut kinds = members.iter().filter(|m| !m.is_none()).map(Type::stack_item);
                match kinds.next() {
                    Some(first) if kinds.all(|k| k == first) => first,
                    _ => StackItemType::Any,
                }
            }
        }
    }

    /// Value held by a slot of this type before its first assignment.
    pub fn default_value(&self) -> DefaultValue {
        match self {
            Type::Bool => DefaultValue::Constant(Constant::Bool(false)),
            Type::Int => DefaultValue::Constant(Constant::Int(0)),
            Type::Str => DefaultValue::Constant(Constant::Str(String::new())),
            Type::Bytes => DefaultValue::Constant(Constant::Bytes(Vec::new())),
            Type::List(_) | Type::Tuple(_) => DefaultValue::EmptyArray,
            Type::Dict(..) => DefaultValue::EmptyMap,
            _ => DefaultValue::Constant(Constant::None),
        }
    }

    /// Type produced by indexing a value of this type, if indexable.
    pub fn item_type(&self) -> Option<Type> {
        match self {
            Type::Any => Some(Type::Any),
            Type::Str => Some(Type::Str),
            Type::Bytes => Some(Type::Int),
            Type::List(item) | Type::Tuple(item) => Some((**item).clone()),
            Type::Dict(_, value) => Some((**value).clone()),
            _ => None,
        }
    }

    /// Type an index into a value of this type must have.
    pub fn key_type(&self) -> Option<Type> {
        match self {
            Type::Any => Some(Type::Any),
            Type::Str | Type::Bytes | Type::List(_) | Type::Tuple(_) => Some(Type::Int),
            Type::Dict(key, _) => Some((**key).clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "Any"),
            Type::None => write!(f, "None"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Str => write!(f, "str"),
            Type::Bytes => write!(f, "bytes"),
            Type::List(item) => write!(f, "List[{item}]"),
            Type::Tuple(item) => write!(f, "Tuple[{item}]"),
            Type::Dict(key, value) => write!(f, "Dict[{key}, {value}]"),
            Type::Union(members) => {
                write!(f, "Union[")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{member}")?;
                }
                write!(f, "]")
            }
            Type::Class(class) => write!(f, "{}", class.name),
            Type::Interop(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_normalises() {
        assert_eq!(Type::union([Type::Int, Type::Int]), Type::Int);
        assert_eq!(Type::union([Type::Int, Type::Any]), Type::Any);
        assert_eq!(Type::union(Vec::new()), Type::Any);
        assert_eq!(
            Type::union([Type::Union(vec![Type::Int, Type::Str]), Type::Str]),
            Type::Union(vec![Type::Int, Type::Str])
        );
    }

    #[test]
    fn int_accepts_bool_but_not_str() {
        assert!(Type::Int.is_type_of(&Type::Bool));
        assert!(!Type::Bool.is_type_of(&Type::Int));
        assert!(!Type::Int.is_type_of(&Type::Str));
    }

    #[test]
    fn optional_accepts_none_and_inner() {
        let opt = Type::optional(Type::Str);
        assert!(opt.is_type_of(&Type::None));
        assert!(opt.is_type_of(&Type::Str));
        assert!(!opt.is_type_of(&Type::Int));
        assert!(!Type::Str.is_type_of(&opt));
    }

    #[test]
    fn collections_compare_items() {
        assert!(Type::list(Type::Int).is_type_of(&Type::list(Type::Bool)));
        assert!(Type::list(Type::Int).is_type_of(&Type::list(Type::Any)));
        assert!(!Type::list(Type::Int).is_type_of(&Type::list(Type::Str)));
        assert!(
            Type::dict(Type::Str, Type::Int).is_type_of(&Type::dict(Type::Str, Type::Int))
        );
        assert!(!Type::list(Type::Int).is_type_of(&Type::tuple(Type::Int)));
    }

    #[test]
    fn classes_compare_by_id() {
        let a = Type::Class(ClassType::new(SymbolId::new(1), "A"));
        let renamed = Type::Class(ClassType::new(SymbolId::new(1), "Alias"));
        let b = Type::Class(ClassType::new(SymbolId::new(2), "A"));
        assert!(a.is_type_of(&renamed));
        assert!(!a.is_type_of(&b));
    }

    #[test]
    fn stack_items() {
        assert_eq!(Type::Str.stack_item(), StackItemType::ByteString);
        assert_eq!(Type::Bytes.stack_item(), StackItemType::ByteString);
        assert_eq!(Type::dict(Type::Int, Type::Int).stack_item(), StackItemType::Map);
        assert_eq!(Type::optional(Type::Int).stack_item(), StackItemType::Integer);
        assert_eq!(
            Type::union([Type::Int, Type::Str]).stack_item(),
            StackItemType::Any
        );
    }

    #[test]
    fn generic_types() {
        assert!(Type::Any.is_generic());
        assert!(Type::union([Type::Int, Type::Str]).is_generic());
        assert!(!Type::union([Type::Str, Type::Bytes]).is_generic());
        assert!(!Type::Int.is_generic());
    }

    #[test]
    fn defaults() {
        assert_eq!(
            Type::Int.default_value(),
            DefaultValue::Constant(Constant::Int(0))
        );
        assert_eq!(Type::list(Type::Int).default_value(), DefaultValue::EmptyArray);
        assert_eq!(
            Type::dict(Type::Str, Type::Int).default_value(),
            DefaultValue::EmptyMap
        );
    }

    #[test]
    fn indexing() {
        assert_eq!(Type::Bytes.item_type(), Some(Type::Int));
        assert_eq!(Type::Str.item_type(), Some(Type::Str));
        assert_eq!(
            Type::dict(Type::Str, Type::Bool).key_type(),
            Some(Type::Str)
        );
        assert_eq!(Type::Int.item_type(), None);
    }

    #[test]
    fn display() {
        assert_eq!(Type::dict(Type::Str, Type::list(Type::Int)).to_string(), "Dict[str, List[int]]");
        assert_eq!(Type::optional(Type::Int).to_string(), "Union[int, None]");
    }
}
