//! VM stack item kinds.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Runtime representation of a value on the VM evaluation stack.
///
/// The discriminants are the byte values the VM uses as operands of
/// `CONVERT` and `ISTYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum StackItemType {
    Any = 0x00,
    Pointer = 0x10,
    Boolean = 0x20,
    Integer = 0x21,
    ByteString = 0x28,
    Buffer = 0x30,
    Array = 0x40,
    Struct = 0x41,
    Map = 0x48,
    InteropInterface = 0x60,
}

impl StackItemType {
    /// Whether values of this kind are primitive (convertible between each
    /// other with `CONVERT`).
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            StackItemType::Boolean | StackItemType::Integer | StackItemType::ByteString
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_bytes() {
        assert_eq!(u8::from(StackItemType::Integer), 0x21);
        assert_eq!(StackItemType::try_from(0x48).ok(), Some(StackItemType::Map));
        assert!(StackItemType::try_from(0x99).is_err());
    }

    #[test]
    fn primitives() {
        assert!(StackItemType::ByteString.is_primitive());
        assert!(!StackItemType::Array.is_primitive());
    }
}
