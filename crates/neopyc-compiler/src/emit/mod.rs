//! Instruction emitter.
//!
//! [`Emitter`] wraps the [`CodeMap`] with the instruction patterns the code
//! generator needs: literal pushes, slot access, syscalls, forward and
//! backward branches and loop exits.
//!
//! # Example
//!
//! ```
//! use neopyc_compiler::emit::Emitter;
//! use neopyc_compiler::bytecode::Opcode;
//!
//! let mut emitter = Emitter::new();
//! emitter.emit_push_int(1).unwrap();
//! emitter.emit_push_int(2).unwrap();
//! emitter.emit(Opcode::Add).unwrap();
//! emitter.emit(Opcode::Ret).unwrap();
//!
//! assert_eq!(emitter.finish().unwrap(), vec![0x11, 0x12, 0x9E, 0x40]);
//! ```

mod jumps;

pub use jumps::{JumpManager, LoopContext};

use sha2::{Digest, Sha256};
use thiserror::Error;

use neopyc_core::{CodegenError, Constant, DefaultValue, StackItemType, SymbolId};
use num_bigint::BigInt;

use crate::bytecode::{CodeId, CodeMap, Opcode, Target, VmCode, encode_int, load_opcode, store_opcode};
use crate::symbols::VariableKind;

/// Emits instructions into a [`CodeMap`].
#[derive(Debug, Default)]
pub struct Emitter {
    code: CodeMap,
    jumps: JumpManager,
    /// Position of the first instruction of the method being emitted.
    method_start: usize,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code(&self) -> &CodeMap {
        &self.code
    }

    pub fn code_mut(&mut self) -> &mut CodeMap {
        &mut self.code
    }

    // ==========================================================================
    // Basic emission
    // ==========================================================================

    pub fn emit(&mut self, opcode: Opcode) -> Result<CodeId, CodegenError> {
        self.code.insert(VmCode::new(opcode))
    }

    pub fn emit_with_data(&mut self, opcode: Opcode, data: Vec<u8>) -> Result<CodeId, CodegenError> {
        self.code.insert(VmCode::with_data(opcode, data))
    }

    /// Start a new method at the current end of the code. Its first
    /// instruction is reachable whatever precedes it.
    pub fn start_method(&mut self) -> usize {
        self.method_start = self.code.len();
        self.method_start
    }

    /// Whether control can reach the next emitted instruction: the last
    /// instruction is not a `RET`, or some branch lands right here.
    pub fn is_reachable(&self) -> bool {
        if self.code.len() == self.method_start {
            return true;
        }
        match self.code.last() {
            Some(last) => self.code.get(last).opcode != Opcode::Ret || self.code.has_pending(),
            None => true,
        }
    }

    // ==========================================================================
    // Literals
    // ==========================================================================

    /// Push an integer. `-1..=16` use a single opcode; anything else is
    /// pushed as data and converted. Returns the first instruction.
    pub fn emit_push_int(&mut self, value: i128) -> Result<CodeId, CodegenError> {
        if let Some(opcode) = Opcode::push_small_int(value) {
            return self.emit(opcode);
        }
        let first = self.emit_push_data(&encode_int(value))?;
        self.emit_convert(StackItemType::Integer)?;
        Ok(first)
    }

    /// Push an integer outside the `i128` range.
    pub fn emit_push_big_int(&mut self, value: &BigInt) -> Result<CodeId, CodegenError> {
        let first = self.emit_push_data(&value.to_signed_bytes_le())?;
        self.emit_convert(StackItemType::Integer)?;
        Ok(first)
    }

    pub fn emit_push_bool(&mut self, value: bool) -> Result<CodeId, CodegenError> {
        self.emit(if value { Opcode::PushT } else { Opcode::PushF })
    }

    pub fn emit_push_null(&mut self) -> Result<CodeId, CodegenError> {
        self.emit(Opcode::PushNull)
    }

    /// Push a byte string with the narrowest `PUSHDATA` able to carry it.
    pub fn emit_push_data(&mut self, bytes: &[u8]) -> Result<CodeId, CodegenError> {
        let opcode = Opcode::push_data_for(bytes.len())?;
        let prefix = match opcode {
            Opcode::PushData1 => vec![bytes.len() as u8],
            Opcode::PushData2 => (bytes.len() as u16).to_le_bytes().to_vec(),
            _ => (bytes.len() as u32).to_le_bytes().to_vec(),
        };
        let mut data = prefix;
        data.extend_from_slice(bytes);
        self.emit_with_data(opcode, data)
    }

    pub fn emit_push_constant(&mut self, constant: &Constant) -> Result<CodeId, CodegenError> {
        match constant {
            Constant::None => self.emit_push_null(),
            Constant::Bool(value) => self.emit_push_bool(*value),
            Constant::Int(value) => self.emit_push_int(*value),
            Constant::BigInt(value) => self.emit_push_big_int(value),
            Constant::Str(value) => self.emit_push_data(value.as_bytes()),
            Constant::Bytes(value) => self.emit_push_data(value),
        }
    }

    /// Push the value a slot or field of some type starts out with.
    pub fn emit_default(&mut self, default: &DefaultValue) -> Result<CodeId, CodegenError> {
        match default {
            DefaultValue::Constant(constant) => self.emit_push_constant(constant),
            DefaultValue::EmptyArray => self.emit(Opcode::NewArray0),
            DefaultValue::EmptyMap => self.emit(Opcode::NewMap),
        }
    }

    pub fn emit_convert(&mut self, target: StackItemType) -> Result<CodeId, CodegenError> {
        self.emit_with_data(Opcode::Convert, vec![target.into()])
    }

    pub fn emit_syscall(&mut self, interop: &str) -> Result<CodeId, CodegenError> {
        self.emit_with_data(Opcode::Syscall, interop_id(interop).to_vec())
    }

    // ==========================================================================
    // Stack and slots
    // ==========================================================================

    /// Copy the item `depth` places from the top (1 is the top itself).
    pub fn emit_duplicate(&mut self, depth: usize) -> Result<CodeId, CodegenError> {
        match depth {
            0 => Err(CodegenError::Unexpected("cannot duplicate at depth 0".to_string())),
            1 => self.emit(Opcode::Dup),
            2 => self.emit(Opcode::Over),
            _ => {
                let first = self.emit_push_int(depth as i128 - 1)?;
                self.emit(Opcode::Pick)?;
                Ok(first)
            }
        }
    }

    pub fn emit_load(&mut self, kind: &VariableKind) -> Result<CodeId, CodegenError> {
        if let VariableKind::Constant(constant) = kind {
            return self.emit_push_constant(constant);
        }
        let (opcode, data) = load_opcode(kind)?;
        self.emit_with_data(opcode, data)
    }

    pub fn emit_store(&mut self, kind: &VariableKind) -> Result<CodeId, CodegenError> {
        let (opcode, data) = store_opcode(kind)?;
        self.emit_with_data(opcode, data)
    }

    // ==========================================================================
    // Branches
    // ==========================================================================

    /// Emit a branch, or nothing if the current point is unreachable.
    ///
    /// With no target the branch waits for [`CodeMap::target_next`] or
    /// [`CodeMap::set_target`].
    pub fn emit_jump(&mut self, opcode: Opcode, target: Option<CodeId>) -> Result<Option<CodeId>, CodegenError> {
        if !self.is_reachable() {
            return Ok(None);
        }
        let code = VmCode::branch(opcode, target.map(Target::Code));
        self.code.insert(code).map(Some)
    }

    /// Emit a branch to the next instruction emitted after the ones that
    /// follow it, e.g. the end of an `if` body.
    pub fn emit_jump_forward(&mut self, opcode: Opcode) -> Result<Option<CodeId>, CodegenError> {
        self.emit_jump(opcode, None)
    }

    /// Resolve forward branches to the next emitted instruction.
    pub fn land_here(&mut self, jumps: impl IntoIterator<Item = Option<CodeId>>) {
        for jump in jumps.into_iter().flatten() {
            self.code.target_next(jump);
        }
    }

    pub fn emit_call(&mut self, method: SymbolId) -> Result<CodeId, CodegenError> {
        self.code.insert(VmCode::call(method))
    }

    // ==========================================================================
    // Loops
    // ==========================================================================

    pub fn enter_loop(&mut self) {
        self.jumps.enter_loop();
    }

    pub fn exit_loop(&mut self) -> LoopContext {
        self.jumps.exit_loop()
    }

    pub fn in_loop(&self) -> bool {
        self.jumps.in_loop()
    }

    pub fn emit_break(&mut self) -> Result<(), CodegenError> {
        if !self.jumps.in_loop() {
            return Err(BreakError::NotInLoop("break").into());
        }
        if let Some(jump) = self.emit_jump_forward(Opcode::Jmp)? {
            self.jumps.add_break(jump)?;
        }
        Ok(())
    }

    pub fn emit_continue(&mut self) -> Result<(), CodegenError> {
        if !self.jumps.in_loop() {
            return Err(BreakError::NotInLoop("continue").into());
        }
        if let Some(jump) = self.emit_jump_forward(Opcode::Jmp)? {
            self.jumps.add_continue(jump)?;
        }
        Ok(())
    }

    // ==========================================================================
    // Output
    // ==========================================================================

    pub fn finish(self) -> Result<Vec<u8>, CodegenError> {
        self.code.to_bytes()
    }
}

/// Operand of `SYSCALL` for an interop service: the first four bytes of the
/// SHA-256 digest of its name.
pub fn interop_id(name: &str) -> [u8; 4] {
    let digest = Sha256::digest(name.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// `break` or `continue` outside of a loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BreakError {
    #[error("'{0}' statement not inside a loop")]
    NotInLoop(&'static str),
}

impl From<BreakError> for CodegenError {
    fn from(err: BreakError) -> Self {
        CodegenError::Unexpected(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::decode_int;

    fn opcodes(emitter: &Emitter) -> Vec<Opcode> {
        emitter.code().iter().map(|(_, code)| code.opcode).collect()
    }

    #[test]
    fn small_integers_use_one_opcode() {
        for value in -1..=16 {
            let mut emitter = Emitter::new();
            emitter.emit_push_int(value).unwrap();
            let ops = opcodes(&emitter);
            assert_eq!(ops.len(), 1);
            assert_eq!(ops[0].small_int_value(), Some(value));
        }
    }

    #[test]
    fn large_integers_are_pushed_as_data() {
        for value in [17, -2, 255, 1_000_000, -70_000] {
            let mut emitter = Emitter::new();
            emitter.emit_push_int(value).unwrap();
            let codes: Vec<&VmCode> = emitter.code().iter().map(|(_, c)| c).collect();
            assert_eq!(codes.len(), 2);
            assert_eq!(codes[0].opcode, Opcode::PushData1);
            let len = codes[0].data[0] as usize;
            assert_eq!(decode_int(&codes[0].data[1..=len]), Some(value));
            assert_eq!(codes[1].opcode, Opcode::Convert);
            assert_eq!(codes[1].data, vec![0x21]);
        }
    }

    #[test]
    fn big_integers_keep_their_two_complement_bytes() {
        let value: BigInt = -(BigInt::from(1) << 200usize);
        let mut emitter = Emitter::new();
        emitter.emit_push_constant(&Constant::BigInt(value.clone())).unwrap();
        let codes: Vec<&VmCode> = emitter.code().iter().map(|(_, c)| c).collect();
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0].opcode, Opcode::PushData1);
        assert_eq!(codes[0].data[0], 26);
        assert_eq!(BigInt::from_signed_bytes_le(&codes[0].data[1..]), value);
        assert_eq!(codes[1].opcode, Opcode::Convert);
    }

    #[test]
    fn push_data_prefix_matches_opcode_width() {
        let mut emitter = Emitter::new();
        emitter.emit_push_data(b"abc").unwrap();
        emitter.emit_push_data(&[7u8; 300]).unwrap();
        let codes: Vec<&VmCode> = emitter.code().iter().map(|(_, c)| c).collect();

        assert_eq!(codes[0].opcode, Opcode::PushData1);
        assert_eq!(codes[0].data, vec![3, b'a', b'b', b'c']);
        assert_eq!(codes[1].opcode, Opcode::PushData2);
        assert_eq!(&codes[1].data[..2], &300u16.to_le_bytes());
        assert_eq!(codes[1].data.len(), 302);
    }

    #[test]
    fn defaults() {
        let mut emitter = Emitter::new();
        emitter.emit_default(&DefaultValue::EmptyMap).unwrap();
        emitter.emit_default(&DefaultValue::EmptyArray).unwrap();
        emitter.emit_default(&DefaultValue::Constant(Constant::Int(0))).unwrap();
        assert_eq!(opcodes(&emitter), vec![Opcode::NewMap, Opcode::NewArray0, Opcode::Push0]);
    }

    #[test]
    fn duplicate_depths() {
        let mut emitter = Emitter::new();
        emitter.emit_duplicate(1).unwrap();
        emitter.emit_duplicate(2).unwrap();
        emitter.emit_duplicate(4).unwrap();
        assert_eq!(
            opcodes(&emitter),
            vec![Opcode::Dup, Opcode::Over, Opcode::Push3, Opcode::Pick]
        );
    }

    #[test]
    fn jumps_after_ret_are_dropped() {
        let mut emitter = Emitter::new();
        emitter.emit(Opcode::Ret).unwrap();
        assert!(!emitter.is_reachable());
        assert_eq!(emitter.emit_jump_forward(Opcode::Jmp).unwrap(), None);
    }

    #[test]
    fn method_start_is_reachable() {
        let mut emitter = Emitter::new();
        emitter.emit(Opcode::Ret).unwrap();
        assert_eq!(emitter.start_method(), 1);
        assert!(emitter.is_reachable());
        assert!(emitter.emit_jump_forward(Opcode::Jmp).unwrap().is_some());
    }

    #[test]
    fn pending_branch_keeps_code_reachable() {
        let mut emitter = Emitter::new();
        emitter.emit(Opcode::PushT).unwrap();
        let skip = emitter.emit_jump_forward(Opcode::JmpIf).unwrap();
        emitter.land_here([skip]);
        emitter.emit(Opcode::Ret).unwrap();
        // The branch resolved to the RET itself.
        assert!(!emitter.is_reachable());

        let jump = emitter.emit_jump_forward(Opcode::Jmp).unwrap();
        assert!(jump.is_none());
    }

    #[test]
    fn loop_exits() {
        let mut emitter = Emitter::new();
        assert!(emitter.emit_break().is_err());

        emitter.enter_loop();
        emitter.emit_break().unwrap();
        emitter.emit_continue().unwrap();
        let ctx = emitter.exit_loop();
        assert_eq!(ctx.break_jumps.len(), 1);
        assert_eq!(ctx.continue_jumps.len(), 1);
    }

    #[test]
    fn syscall_ids() {
        assert_eq!(interop_id("System.Runtime.Log"), [0xCF, 0xE7, 0x47, 0x96]);
        assert_eq!(interop_id("System.Storage.GetContext"), [0x9B, 0xF6, 0x67, 0xCE]);
    }
}
