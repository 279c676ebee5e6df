//! Compile-time literal values.

use std::fmt;

use num_bigint::{BigInt, Sign};

use crate::Type;

/// A literal value known at compile time.
///
/// Produced by the parser for literals, by the optimizer when folding, and
/// carried by constant variables and type defaults.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i128),
    /// An integer outside the `i128` range.
    BigInt(BigInt),
    Str(String),
    Bytes(Vec<u8>),
}

impl Constant {
    /// An integer constant, as `Int` whenever the value fits.
    pub fn integer(value: BigInt) -> Constant {
        match i128::try_from(&value) {
            Ok(small) => Constant::Int(small),
            Err(_) => Constant::BigInt(value),
        }
    }

    /// The static type of this value.
    pub fn ty(&self) -> Type {
        match self {
            Constant::None => Type::None,
            Constant::Bool(_) => Type::Bool,
            Constant::Int(_) | Constant::BigInt(_) => Type::Int,
            Constant::Str(_) => Type::Str,
            Constant::Bytes(_) => Type::Bytes,
        }
    }

    /// Python truthiness of the value.
    pub fn is_truthy(&self) -> bool {
        match self {
            Constant::None => false,
            Constant::Bool(b) => *b,
            Constant::Int(v) => *v != 0,
            Constant::BigInt(v) => v.sign() != Sign::NoSign,
            Constant::Str(s) => !s.is_empty(),
            Constant::Bytes(b) => !b.is_empty(),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::None => write!(f, "None"),
            Constant::Bool(true) => write!(f, "True"),
            Constant::Bool(false) => write!(f, "False"),
            Constant::Int(v) => write!(f, "{v}"),
            Constant::BigInt(v) => write!(f, "{v}"),
            Constant::Str(s) => write!(f, "{s:?}"),
            Constant::Bytes(bytes) => {
                write!(f, "b'")?;
                for byte in bytes {
                    match byte {
                        b' '..=b'~' if *byte != b'\'' && *byte != b'\\' => {
                            write!(f, "{}", *byte as char)?
                        }
                        _ => write!(f, "\\x{byte:02x}")?,
                    }
                }
                write!(f, "'")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_types() {
        assert_eq!(Constant::Int(300).ty(), Type::Int);
        assert_eq!(Constant::Bool(true).ty(), Type::Bool);
        assert_eq!(Constant::None.ty(), Type::None);
    }

    #[test]
    fn integers_narrow_when_they_fit() {
        assert_eq!(Constant::integer(BigInt::from(-5)), Constant::Int(-5));
        let huge: BigInt = BigInt::from(i128::MAX) * 4;
        assert_eq!(Constant::integer(huge.clone()), Constant::BigInt(huge.clone()));
        assert_eq!(Constant::BigInt(huge).ty(), Type::Int);
    }

    #[test]
    fn truthiness() {
        assert!(!Constant::Int(0).is_truthy());
        assert!(Constant::Str("a".into()).is_truthy());
        assert!(!Constant::Bytes(Vec::new()).is_truthy());
    }

    #[test]
    fn bytes_display_escapes_non_printable() {
        let value = Constant::Bytes(vec![b'a', 0x00, b'\'']);
        assert_eq!(value.to_string(), "b'a\\x00\\x27'");
    }
}
