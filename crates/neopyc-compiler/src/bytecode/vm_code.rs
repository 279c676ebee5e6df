//! Emitted instructions.

use std::fmt;

use neopyc_core::SymbolId;

use super::{OperandSize, Opcode};

/// Identifies an instruction in a [`CodeMap`](super::CodeMap).
///
/// Ids are stable: moving or inserting instructions changes their address
/// but never their id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeId(u32);

impl CodeId {
    #[inline]
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for CodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code#{}", self.0)
    }
}

/// What a branch or call instruction refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Another instruction.
    Code(CodeId),
    /// The entry of a method, known once that method is generated.
    Method(SymbolId),
}

/// One instruction: opcode, operand bytes and, for branches and calls, the
/// instruction it refers to.
///
/// The operand of a branch is derived from its target whenever addresses
/// change; it is never written directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmCode {
    pub opcode: Opcode,
    pub data: Vec<u8>,
    pub target: Option<Target>,
}

impl VmCode {
    /// An instruction with no operand.
    pub fn new(opcode: Opcode) -> Self {
        Self::with_data(opcode, Vec::new())
    }

    pub fn with_data(opcode: Opcode, data: Vec<u8>) -> Self {
        Self {
            opcode,
            data,
            target: None,
        }
    }

    /// A branch whose operand is a zeroed placeholder until its target is
    /// resolved.
    pub fn branch(opcode: Opcode, target: Option<Target>) -> Self {
        let width = match opcode.operand_size() {
            OperandSize::Fixed(width) => width,
            OperandSize::Prefix(_) => 0,
        };
        Self {
            opcode,
            data: vec![0; width],
            target,
        }
    }

    pub fn call(method: SymbolId) -> Self {
        Self::branch(Opcode::Call, Some(Target::Method(method)))
    }

    /// Encoded length in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        1 + self.data.len()
    }

    /// Switch a short branch to its long form.
    pub(crate) fn widen(&mut self) {
        self.opcode = self.opcode.to_long();
        self.data = vec![0; 4];
    }

    /// Write a relative offset into the operand, returning `false` if it
    /// does not fit the current form.
    pub(crate) fn encode_offset(&mut self, offset: i64) -> bool {
        if self.opcode.is_long() {
            match i32::try_from(offset) {
                Ok(offset) => {
                    self.data = offset.to_le_bytes().to_vec();
                    true
                }
                Err(_) => false,
            }
        } else {
            match i8::try_from(offset) {
                Ok(offset) => {
                    self.data = offset.to_le_bytes().to_vec();
                    true
                }
                Err(_) => false,
            }
        }
    }

    /// The relative offset currently encoded in a branch operand.
    pub fn offset(&self) -> Option<i64> {
        match self.data.as_slice() {
            [b] if self.opcode.has_target() => Some(i64::from(*b as i8)),
            [a, b, c, d] if self.opcode.has_target() => {
                Some(i64::from(i32::from_le_bytes([*a, *b, *c, *d])))
            }
            _ => None,
        }
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.opcode.into());
        out.extend_from_slice(&self.data);
    }
}
