//! Decoding of emitted bytecode, for inspection and tests.

use std::fmt;

use super::{OperandSize, Opcode};

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub address: u32,
    pub opcode: Opcode,
    /// Operand bytes, including the length prefix of `PUSHDATA`.
    pub operand: Vec<u8>,
}

impl Instruction {
    /// Absolute address a branch or call lands on.
    pub fn target(&self) -> Option<u32> {
        if !self.opcode.has_target() {
            return None;
        }
        let offset = match self.operand.as_slice() {
            [b] => i64::from(*b as i8),
            [a, b, c, d] => i64::from(i32::from_le_bytes([*a, *b, *c, *d])),
            _ => return None,
        };
        u32::try_from(i64::from(self.address) + offset).ok()
    }

    /// Payload of a `PUSHDATA` instruction without its length prefix.
    pub fn data(&self) -> Option<&[u8]> {
        match self.opcode.operand_size() {
            OperandSize::Prefix(width) => self.operand.get(width..),
            OperandSize::Fixed(_) => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04} {:?}", self.address, self.opcode)?;
        if let Some(target) = self.target() {
            write!(f, " -> {target:04}")
        } else if !self.operand.is_empty() {
            write!(f, " ")?;
            for byte in &self.operand {
                write!(f, "{byte:02x}")?;
            }
            Ok(())
        } else {
            Ok(())
        }
    }
}

/// Decode a byte sequence. Unknown opcode bytes are skipped and a truncated
/// trailing instruction ends the listing.
pub fn disassemble(bytes: &[u8]) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let Ok(opcode) = Opcode::try_from(bytes[offset]) else {
            offset += 1;
            continue;
        };
        let operand_start = offset + 1;
        let operand_len = match opcode.operand_size() {
            OperandSize::Fixed(width) => width,
            OperandSize::Prefix(width) => {
                let Some(prefix) = bytes.get(operand_start..operand_start + width) else {
                    break;
                };
                let mut len = [0u8; 8];
                len[..width].copy_from_slice(prefix);
                width + u64::from_le_bytes(len) as usize
            }
        };
        let Some(operand) = bytes.get(operand_start..operand_start + operand_len) else {
            break;
        };
        instructions.push(Instruction {
            address: offset as u32,
            opcode,
            operand: operand.to_vec(),
        });
        offset = operand_start + operand_len;
    }

    instructions
}

/// The opcodes of a byte sequence, operands skipped.
pub fn opcodes(bytes: &[u8]) -> Vec<Opcode> {
    disassemble(bytes).into_iter().map(|instruction| instruction.opcode).collect()
}
