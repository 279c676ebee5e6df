//! Neo N3 operation codes.
//!
//! Each instruction is one opcode byte followed by its operand. Operands are
//! either fixed-width (jump offsets, slot indices, syscall ids) or a
//! length prefix followed by that many data bytes (`PUSHDATA1/2/4`).

use num_enum::{IntoPrimitive, TryFromPrimitive};

use neopyc_core::CodegenError;

use crate::symbols::VariableKind;

/// Neo N3 instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    // =========================================================================
    // Constants
    // =========================================================================
    PushInt8 = 0x00,
    PushInt16 = 0x01,
    PushInt32 = 0x02,
    PushInt64 = 0x03,
    PushInt128 = 0x04,
    PushInt256 = 0x05,
    PushT = 0x08,
    PushF = 0x09,
    PushA = 0x0A,
    PushNull = 0x0B,
    PushData1 = 0x0C,
    PushData2 = 0x0D,
    PushData4 = 0x0E,
    PushM1 = 0x0F,
    Push0 = 0x10,
    Push1 = 0x11,
    Push2 = 0x12,
    Push3 = 0x13,
    Push4 = 0x14,
    Push5 = 0x15,
    Push6 = 0x16,
    Push7 = 0x17,
    Push8 = 0x18,
    Push9 = 0x19,
    Push10 = 0x1A,
    Push11 = 0x1B,
    Push12 = 0x1C,
    Push13 = 0x1D,
    Push14 = 0x1E,
    Push15 = 0x1F,
    Push16 = 0x20,

    // =========================================================================
    // Flow control
    // =========================================================================
    Nop = 0x21,
    Jmp = 0x22,
    JmpL = 0x23,
    JmpIf = 0x24,
    JmpIfL = 0x25,
    JmpIfNot = 0x26,
    JmpIfNotL = 0x27,
    JmpEq = 0x28,
    JmpEqL = 0x29,
    JmpNe = 0x2A,
    JmpNeL = 0x2B,
    JmpGt = 0x2C,
    JmpGtL = 0x2D,
    JmpGe = 0x2E,
    JmpGeL = 0x2F,
    JmpLt = 0x30,
    JmpLtL = 0x31,
    JmpLe = 0x32,
    JmpLeL = 0x33,
    Call = 0x34,
    CallL = 0x35,
    CallA = 0x36,
    CallT = 0x37,
    Abort = 0x38,
    Assert = 0x39,
    Throw = 0x3A,
    Try = 0x3B,
    TryL = 0x3C,
    EndTry = 0x3D,
    EndTryL = 0x3E,
    EndFinally = 0x3F,
    Ret = 0x40,
    Syscall = 0x41,

    // =========================================================================
    // Stack
    // =========================================================================
    Depth = 0x43,
    Drop = 0x45,
    Nip = 0x46,
    XDrop = 0x48,
    Clear = 0x49,
    Dup = 0x4A,
    Over = 0x4B,
    Pick = 0x4D,
    Tuck = 0x4E,
    Swap = 0x50,
    Rot = 0x51,
    Roll = 0x52,
    Reverse3 = 0x53,
    Reverse4 = 0x54,
    ReverseN = 0x55,

    // =========================================================================
    // Slots
    // =========================================================================
    InitSSlot = 0x56,
    InitSlot = 0x57,
    LdSFld0 = 0x58,
    LdSFld1 = 0x59,
    LdSFld2 = 0x5A,
    LdSFld3 = 0x5B,
    LdSFld4 = 0x5C,
    LdSFld5 = 0x5D,
    LdSFld6 = 0x5E,
    LdSFld = 0x5F,
    StSFld0 = 0x60,
    StSFld1 = 0x61,
    StSFld2 = 0x62,
    StSFld3 = 0x63,
    StSFld4 = 0x64,
    StSFld5 = 0x65,
    StSFld6 = 0x66,
    StSFld = 0x67,
    LdLoc0 = 0x68,
    LdLoc1 = 0x69,
    LdLoc2 = 0x6A,
    LdLoc3 = 0x6B,
    LdLoc4 = 0x6C,
    LdLoc5 = 0x6D,
    LdLoc6 = 0x6E,
    LdLoc = 0x6F,
    StLoc0 = 0x70,
    StLoc1 = 0x71,
    StLoc2 = 0x72,
    StLoc3 = 0x73,
    StLoc4 = 0x74,
    StLoc5 = 0x75,
    StLoc6 = 0x76,
    StLoc = 0x77,
    LdArg0 = 0x78,
    LdArg1 = 0x79,
    LdArg2 = 0x7A,
    LdArg3 = 0x7B,
    LdArg4 = 0x7C,
    LdArg5 = 0x7D,
    LdArg6 = 0x7E,
    LdArg = 0x7F,
    StArg0 = 0x80,
    StArg1 = 0x81,
    StArg2 = 0x82,
    StArg3 = 0x83,
    StArg4 = 0x84,
    StArg5 = 0x85,
    StArg6 = 0x86,
    StArg = 0x87,

    // =========================================================================
    // Splice
    // =========================================================================
    NewBuffer = 0x88,
    MemCpy = 0x89,
    Cat = 0x8B,
    Substr = 0x8C,
    Left = 0x8D,
    Right = 0x8E,

    // =========================================================================
    // Bitwise logic
    // =========================================================================
    Invert = 0x90,
    And = 0x91,
    Or = 0x92,
    Xor = 0x93,
    Equal = 0x97,
    NotEqual = 0x98,

    // =========================================================================
    // Arithmetic
    // =========================================================================
    Sign = 0x99,
    Abs = 0x9A,
    Negate = 0x9B,
    Inc = 0x9C,
    Dec = 0x9D,
    Add = 0x9E,
    Sub = 0x9F,
    Mul = 0xA0,
    Div = 0xA1,
    Mod = 0xA2,
    Pow = 0xA3,
    Sqrt = 0xA4,
    ModMul = 0xA5,
    ModPow = 0xA6,
    Shl = 0xA8,
    Shr = 0xA9,
    Not = 0xAA,
    BoolAnd = 0xAB,
    BoolOr = 0xAC,
    Nz = 0xB1,
    NumEqual = 0xB3,
    NumNotEqual = 0xB4,
    Lt = 0xB5,
    Le = 0xB6,
    Gt = 0xB7,
    Ge = 0xB8,
    Min = 0xB9,
    Max = 0xBA,
    Within = 0xBB,

    // =========================================================================
    // Compound types
    // =========================================================================
    PackMap = 0xBE,
    PackStruct = 0xBF,
    Pack = 0xC0,
    Unpack = 0xC1,
    NewArray0 = 0xC2,
    NewArray = 0xC3,
    NewArrayT = 0xC4,
    NewStruct0 = 0xC5,
    NewStruct = 0xC6,
    NewMap = 0xC8,
    Size = 0xCA,
    HasKey = 0xCB,
    Keys = 0xCC,
    Values = 0xCD,
    PickItem = 0xCE,
    Append = 0xCF,
    SetItem = 0xD0,
    ReverseItems = 0xD1,
    Remove = 0xD2,
    ClearItems = 0xD3,
    PopItem = 0xD4,

    // =========================================================================
    // Types
    // =========================================================================
    IsNull = 0xD8,
    IsType = 0xD9,
    Convert = 0xDB,

    // =========================================================================
    // Extensions
    // =========================================================================
    AbortMsg = 0xE0,
    AssertMsg = 0xE1,
}

/// Layout of the operand that follows an opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSize {
    /// Exactly this many bytes (zero for most opcodes).
    Fixed(usize),
    /// A little-endian length of this many bytes, then the payload.
    Prefix(usize),
}

impl Opcode {
    pub fn operand_size(self) -> OperandSize {
        use Opcode::*;
        match self {
            PushInt8 | Jmp | JmpIf | JmpIfNot | JmpEq | JmpNe | JmpGt | JmpGe | JmpLt | JmpLe
            | Call | EndTry | InitSSlot | LdSFld | StSFld | LdLoc | StLoc | LdArg | StArg
            | NewArrayT | IsType | Convert => OperandSize::Fixed(1),
            PushInt16 | CallT | Try | InitSlot => OperandSize::Fixed(2),
            PushInt32 | PushA | JmpL | JmpIfL | JmpIfNotL | JmpEqL | JmpNeL | JmpGtL | JmpGeL
            | JmpLtL | JmpLeL | CallL | EndTryL | Syscall => OperandSize::Fixed(4),
            PushInt64 | TryL => OperandSize::Fixed(8),
            PushInt128 => OperandSize::Fixed(16),
            PushInt256 => OperandSize::Fixed(32),
            PushData1 => OperandSize::Prefix(1),
            PushData2 => OperandSize::Prefix(2),
            PushData4 => OperandSize::Prefix(4),
            _ => OperandSize::Fixed(0),
        }
    }

    /// Conditional and unconditional jumps, short or long.
    pub fn is_jump(self) -> bool {
        let byte = u8::from(self);
        (u8::from(Opcode::Jmp)..=u8::from(Opcode::JmpLeL)).contains(&byte)
    }

    pub fn is_call(self) -> bool {
        matches!(self, Opcode::Call | Opcode::CallL)
    }

    /// Whether the operand is a relative offset to another instruction.
    pub fn has_target(self) -> bool {
        self.is_jump() || self.is_call()
    }

    /// Long (4-byte offset) form of a branch.
    pub fn is_long(self) -> bool {
        self.has_target() && self.operand_size() == OperandSize::Fixed(4)
    }

    /// The 4-byte offset variant of a short branch; other opcodes are
    /// returned unchanged.
    pub fn to_long(self) -> Opcode {
        if self.has_target() && !self.is_long() {
            // Every short branch is immediately followed by its long form.
            Opcode::try_from(u8::from(self) + 1).unwrap_or(self)
        } else {
            self
        }
    }

    /// The opcode pushing a small integer, for values in `-1..=16`.
    pub fn push_small_int(value: i128) -> Option<Opcode> {
        match value {
            -1 => Some(Opcode::PushM1),
            0..=16 => Opcode::try_from(u8::from(Opcode::Push0) + value as u8).ok(),
            _ => None,
        }
    }

    /// The small integer pushed by a `PUSHM1`..`PUSH16` opcode.
    pub fn small_int_value(self) -> Option<i128> {
        let byte = u8::from(self);
        if self == Opcode::PushM1 {
            Some(-1)
        } else if (u8::from(Opcode::Push0)..=u8::from(Opcode::Push16)).contains(&byte) {
            Some(i128::from(byte - u8::from(Opcode::Push0)))
        } else {
            None
        }
    }

    /// Push-data opcode able to carry a payload of `len` bytes.
    pub fn push_data_for(len: usize) -> Result<Opcode, CodegenError> {
        if len <= u8::MAX as usize {
            Ok(Opcode::PushData1)
        } else if len <= u16::MAX as usize {
            Ok(Opcode::PushData2)
        } else if len <= u32::MAX as usize {
            Ok(Opcode::PushData4)
        } else {
            Err(CodegenError::PayloadTooLarge(len))
        }
    }
}

/// Instruction loading a variable of the given kind.
///
/// Returns the opcode and its operand: slots `0..=6` use the compact
/// opcodes, higher slots carry the index as an explicit byte.
pub fn load_opcode(kind: &VariableKind) -> Result<(Opcode, Vec<u8>), CodegenError> {
    match kind {
        VariableKind::Argument(slot) => slot_opcode(Opcode::LdArg0, Opcode::LdArg, *slot),
        VariableKind::Local(slot) => slot_opcode(Opcode::LdLoc0, Opcode::LdLoc, *slot),
        VariableKind::Global(slot) => slot_opcode(Opcode::LdSFld0, Opcode::LdSFld, *slot),
        VariableKind::Constant(_) => Err(CodegenError::Unexpected(
            "constants are pushed, not loaded from a slot".to_string(),
        )),
    }
}

/// Instruction storing the top of the stack into a variable.
pub fn store_opcode(kind: &VariableKind) -> Result<(Opcode, Vec<u8>), CodegenError> {
    match kind {
        VariableKind::Argument(slot) => slot_opcode(Opcode::StArg0, Opcode::StArg, *slot),
        VariableKind::Local(slot) => slot_opcode(Opcode::StLoc0, Opcode::StLoc, *slot),
        VariableKind::Global(slot) => slot_opcode(Opcode::StSFld0, Opcode::StSFld, *slot),
        VariableKind::Constant(_) => Err(CodegenError::Unexpected(
            "cannot store into a constant".to_string(),
        )),
    }
}

fn slot_opcode(compact: Opcode, explicit: Opcode, slot: usize) -> Result<(Opcode, Vec<u8>), CodegenError> {
    match slot {
        0..=6 => {
            let opcode = Opcode::try_from(u8::from(compact) + slot as u8)
                .map_err(|_| CodegenError::SlotOutOfRange(slot))?;
            Ok((opcode, Vec::new()))
        }
        7..=255 => Ok((explicit, vec![slot as u8])),
        _ => Err(CodegenError::SlotOutOfRange(slot)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_bytes() {
        assert_eq!(u8::from(Opcode::Push0), 0x10);
        assert_eq!(u8::from(Opcode::Ret), 0x40);
        assert_eq!(u8::from(Opcode::Convert), 0xDB);
        assert_eq!(Opcode::try_from(0xCE).ok(), Some(Opcode::PickItem));
    }

    #[test]
    fn operand_sizes() {
        assert_eq!(Opcode::Add.operand_size(), OperandSize::Fixed(0));
        assert_eq!(Opcode::Jmp.operand_size(), OperandSize::Fixed(1));
        assert_eq!(Opcode::JmpL.operand_size(), OperandSize::Fixed(4));
        assert_eq!(Opcode::InitSlot.operand_size(), OperandSize::Fixed(2));
        assert_eq!(Opcode::Syscall.operand_size(), OperandSize::Fixed(4));
        assert_eq!(Opcode::PushData2.operand_size(), OperandSize::Prefix(2));
    }

    #[test]
    fn short_branches_widen() {
        assert_eq!(Opcode::Jmp.to_long(), Opcode::JmpL);
        assert_eq!(Opcode::JmpIfNot.to_long(), Opcode::JmpIfNotL);
        assert_eq!(Opcode::JmpNe.to_long(), Opcode::JmpNeL);
        assert_eq!(Opcode::Call.to_long(), Opcode::CallL);
        assert_eq!(Opcode::JmpL.to_long(), Opcode::JmpL);
        assert_eq!(Opcode::Add.to_long(), Opcode::Add);
        assert!(Opcode::JmpLeL.is_long());
        assert!(!Opcode::Syscall.has_target());
    }

    #[test]
    fn small_integers() {
        assert_eq!(Opcode::push_small_int(-1), Some(Opcode::PushM1));
        assert_eq!(Opcode::push_small_int(0), Some(Opcode::Push0));
        assert_eq!(Opcode::push_small_int(16), Some(Opcode::Push16));
        assert_eq!(Opcode::push_small_int(17), None);
        assert_eq!(Opcode::push_small_int(-2), None);
        assert_eq!(Opcode::Push7.small_int_value(), Some(7));
        assert_eq!(Opcode::Add.small_int_value(), None);
    }

    #[test]
    fn slot_selection() {
        assert_eq!(
            load_opcode(&VariableKind::Local(3)),
            Ok((Opcode::LdLoc3, Vec::new()))
        );
        assert_eq!(
            store_opcode(&VariableKind::Argument(6)),
            Ok((Opcode::StArg6, Vec::new()))
        );
        assert_eq!(
            load_opcode(&VariableKind::Global(7)),
            Ok((Opcode::LdSFld, vec![7]))
        );
        assert_eq!(
            store_opcode(&VariableKind::Local(300)),
            Err(CodegenError::SlotOutOfRange(300))
        );
    }

    #[test]
    fn push_data_width() {
        assert_eq!(Opcode::push_data_for(10), Ok(Opcode::PushData1));
        assert_eq!(Opcode::push_data_for(256), Ok(Opcode::PushData2));
        assert_eq!(Opcode::push_data_for(70_000), Ok(Opcode::PushData4));
    }
}
