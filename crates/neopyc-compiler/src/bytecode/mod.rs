//! Bytecode types for the Neo N3 code generator.
//!
//! - [`Opcode`] - the instruction set
//! - [`VmCode`] - one emitted instruction, with its branch target
//! - [`CodeMap`] - the ordered instruction buffer and address resolver
//! - [`encode_int`] / [`decode_int`] - VM integer encoding
//! - [`disassemble`] - decoding of emitted bytes

mod code_map;
mod disasm;
mod integer;
mod opcode;
mod vm_code;

pub use code_map::CodeMap;
pub use disasm::{Instruction, disassemble, opcodes};
pub use integer::{decode_int, encode_int};
pub use opcode::{OperandSize, Opcode, load_opcode, store_opcode};
pub use vm_code::{CodeId, Target, VmCode};
