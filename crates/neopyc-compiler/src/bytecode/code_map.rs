//! The instruction/address model.
//!
//! [`CodeMap`] is the output buffer of the code generator. Instructions are
//! stored in an arena and kept in an emission order; every instruction's
//! address is the sum of the sizes of the instructions before it. Branches
//! and calls refer to their target by id and their operands are re-encoded
//! whenever addresses change.
//!
//! A branch whose target has not been emitted yet is parked in the
//! missing-target worklist under the address it will land on. The first
//! instruction emitted at or past that address becomes its target.

use rustc_hash::FxHashMap;

use neopyc_core::{CodegenError, SymbolId};

use super::{CodeId, Target, VmCode};

/// Ordered, mutable sequence of emitted instructions with their addresses.
#[derive(Debug, Default)]
pub struct CodeMap {
    codes: Vec<VmCode>,
    order: Vec<CodeId>,
    /// Address of each code, indexed by id.
    addresses: Vec<u32>,
    /// Position in `order` of each code, indexed by id.
    positions: Vec<usize>,
    size: u32,
    /// Pending branches keyed by target address, ascending.
    missing: Vec<(u32, Vec<CodeId>)>,
    method_entries: FxHashMap<SymbolId, CodeId>,
}

impl CodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Total size in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn get(&self, id: CodeId) -> &VmCode {
        &self.codes[id.index()]
    }

    pub fn address_of(&self, id: CodeId) -> u32 {
        self.addresses[id.index()]
    }

    pub fn position_of(&self, id: CodeId) -> usize {
        self.positions[id.index()]
    }

    /// The instruction at an index of the emission order.
    pub fn at_position(&self, position: usize) -> Option<CodeId> {
        self.order.get(position).copied()
    }

    /// The instruction starting exactly at `address`.
    pub fn code_at(&self, address: u32) -> Option<CodeId> {
        let position = self
            .order
            .binary_search_by_key(&address, |id| self.addresses[id.index()])
            .ok()?;
        Some(self.order[position])
    }

    pub fn last(&self) -> Option<CodeId> {
        self.order.last().copied()
    }

    /// Instructions in address order.
    pub fn iter(&self) -> impl Iterator<Item = (CodeId, &VmCode)> + '_ {
        self.order.iter().map(|&id| (id, &self.codes[id.index()]))
    }

    // =========================================================================
    // Emission
    // =========================================================================

    /// Append an instruction.
    ///
    /// Pending branches waiting for an address at or before the new
    /// instruction's address are resolved to it.
    pub fn insert(&mut self, code: VmCode) -> Result<CodeId, CodegenError> {
        let id = CodeId::new(self.codes.len() as u32);
        let address = self.size;
        let needs_encoding = code.target.is_some();

        self.size += code.size() as u32;
        self.codes.push(code);
        self.addresses.push(address);
        self.positions.push(self.order.len());
        self.order.push(id);

        let resolved = self.take_missing_up_to(address);
        for &branch in &resolved {
            self.codes[branch.index()].target = Some(Target::Code(id));
        }

        if needs_encoding || !resolved.is_empty() {
            self.relocate()?;
        }
        Ok(id)
    }

    /// Insert an instruction in front of `anchor`, shifting every later
    /// instruction and every pending target address by its size.
    pub fn insert_before(&mut self, anchor: CodeId, code: VmCode) -> Result<CodeId, CodegenError> {
        let id = CodeId::new(self.codes.len() as u32);
        let position = self.position_of(anchor);

        self.codes.push(code);
        self.addresses.push(0);
        self.positions.push(0);
        self.order.insert(position, id);

        self.relocate()?;
        Ok(id)
    }

    /// Move the instructions from `first` to `last` (inclusive, in address
    /// order) to the end of the map.
    pub fn move_to_end(&mut self, first: CodeId, last: CodeId) -> Result<(), CodegenError> {
        let start = self.position_of(first);
        let end = self.position_of(last);
        if start > end {
            return Err(CodegenError::Unexpected(format!(
                "cannot move range {first:?}..={last:?}: bounds are reversed"
            )));
        }

        let moved: Vec<CodeId> = self.order.drain(start..=end).collect();
        self.order.extend(moved);
        self.relocate()
    }

    // =========================================================================
    // Targets
    // =========================================================================

    /// Point `branch` at the instruction starting at `target_address`.
    ///
    /// An address at or past the end is recorded as missing and resolved by
    /// a later [`insert`](Self::insert).
    pub fn update(&mut self, branch: CodeId, target_address: u32) -> Result<(), CodegenError> {
        self.forget_missing(branch);

        if target_address >= self.size {
            self.add_missing(target_address, branch);
            return Ok(());
        }

        let target = self
            .code_at(target_address)
            .ok_or(CodegenError::InvalidJumpTarget(target_address))?;
        self.codes[branch.index()].target = Some(Target::Code(target));
        self.relocate()
    }

    /// Point `branch` at a known instruction.
    pub fn set_target(&mut self, branch: CodeId, target: CodeId) -> Result<(), CodegenError> {
        self.forget_missing(branch);
        self.codes[branch.index()].target = Some(Target::Code(target));
        self.relocate()
    }

    /// Point `branch` at whatever instruction is emitted next.
    pub fn target_next(&mut self, branch: CodeId) {
        self.forget_missing(branch);
        self.add_missing(self.size, branch);
    }

    /// Whether some branch is waiting for the next emitted instruction.
    pub fn has_pending(&self) -> bool {
        !self.missing.is_empty()
    }

    /// Detach the branches waiting for the next instruction.
    ///
    /// Used when a block is about to be moved: the branches that would
    /// land right after it are re-attached with
    /// [`resume_pending`](Self::resume_pending) once the move is done.
    pub fn suspend_pending(&mut self) -> Vec<CodeId> {
        let size = self.size;
        let mut suspended = Vec::new();
        self.missing.retain_mut(|(address, branches)| {
            if *address <= size {
                suspended.append(branches);
                false
            } else {
                true
            }
        });
        suspended
    }

    pub fn resume_pending(&mut self, branches: Vec<CodeId>) {
        for branch in branches {
            self.add_missing(self.size, branch);
        }
    }

    /// Record where a method starts so calls to it can be encoded.
    pub fn register_method_entry(&mut self, method: SymbolId, entry: CodeId) -> Result<(), CodegenError> {
        self.method_entries.insert(method, entry);
        self.relocate()
    }

    pub fn method_entry(&self, method: SymbolId) -> Option<CodeId> {
        self.method_entries.get(&method).copied()
    }

    /// Branches and calls whose target address is still unknown.
    pub fn unresolved_count(&self) -> usize {
        let pending: usize = self.missing.iter().map(|(_, branches)| branches.len()).sum();
        let dangling = self
            .order
            .iter()
            .filter(|id| {
                let code = &self.codes[id.index()];
                code.opcode.has_target() && self.target_address(**id).is_none()
            })
            .count();
        dangling.max(pending)
    }

    /// The final byte sequence.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodegenError> {
        let unresolved = self.unresolved_count();
        if unresolved > 0 {
            return Err(CodegenError::UnresolvedTargets(unresolved));
        }

        let mut bytes = Vec::with_capacity(self.size as usize);
        for (_, code) in self.iter() {
            code.write_to(&mut bytes);
        }
        Ok(bytes)
    }

    // =========================================================================
    // Address computation
    // =========================================================================

    /// Recompute every address and re-encode every branch operand, widening
    /// short branches whose offset no longer fits until nothing changes.
    fn relocate(&mut self) -> Result<(), CodegenError> {
        let old_size = self.size;

        loop {
            let mut address = 0u32;
            for (position, id) in self.order.iter().enumerate() {
                self.positions[id.index()] = position;
                self.addresses[id.index()] = address;
                address += self.codes[id.index()].size() as u32;
            }
            self.size = address;

            let mut widened = false;
            for position in 0..self.order.len() {
                let id = self.order[position];
                let Some(target_address) = self.target_address(id) else {
                    continue;
                };
                let offset = i64::from(target_address) - i64::from(self.addresses[id.index()]);
                let code = &mut self.codes[id.index()];
                if !code.encode_offset(offset) {
                    if code.opcode.is_long() {
                        return Err(CodegenError::Unexpected(format!(
                            "branch offset {offset} does not fit 32 bits"
                        )));
                    }
                    code.widen();
                    widened = true;
                }
            }

            if !widened {
                break;
            }
        }

        if self.size != old_size {
            let delta = i64::from(self.size) - i64::from(old_size);
            for (address, _) in &mut self.missing {
                *address = (i64::from(*address) + delta).max(0) as u32;
            }
        }
        Ok(())
    }

    fn target_address(&self, id: CodeId) -> Option<u32> {
        match self.codes[id.index()].target? {
            Target::Code(target) => Some(self.addresses[target.index()]),
            Target::Method(method) => self
                .method_entries
                .get(&method)
                .map(|entry| self.addresses[entry.index()]),
        }
    }

    fn add_missing(&mut self, address: u32, branch: CodeId) {
        match self.missing.binary_search_by_key(&address, |(key, _)| *key) {
            Ok(index) => self.missing[index].1.push(branch),
            Err(index) => self.missing.insert(index, (address, vec![branch])),
        }
    }

    fn forget_missing(&mut self, branch: CodeId) {
        for (_, branches) in &mut self.missing {
            branches.retain(|b| *b != branch);
        }
        self.missing.retain(|(_, branches)| !branches.is_empty());
    }

    fn take_missing_up_to(&mut self, address: u32) -> Vec<CodeId> {
        let split = self.missing.partition_point(|(key, _)| *key <= address);
        self.missing
            .drain(..split)
            .flat_map(|(_, branches)| branches)
            .collect()
    }
}
