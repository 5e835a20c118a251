//! Subroutines recovered by control-flow analysis

use crate::arch::w65c816::DecodedInstruction;
use crate::memory::CpuAddress;
use serde::Serialize;
use std::collections::BTreeSet;

/// A region of code reachable from one or more call sites or entry points.
///
/// A subroutine is made of every instruction reachable from its head without
/// passing through a call: fallthrough, branches, and jumps all extend it.
/// Its instructions need not be contiguous.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Subroutine {
    /// The address the subroutine was first reached at.
    start: CpuAddress,

    /// ROM offset of the head instruction.
    head_offset: usize,

    name: Option<String>,

    /// Decoded instructions, ordered by address.
    instructions: Vec<DecodedInstruction>,

    /// Every address callers or entry points used to get in.
    entries: BTreeSet<CpuAddress>,

    /// Addresses of the instructions control leaves the subroutine through.
    exits: BTreeSet<CpuAddress>,

    /// Statically known call targets.
    calls: BTreeSet<CpuAddress>,
}

impl Subroutine {
    pub(crate) fn from_parts(
        start: CpuAddress,
        head_offset: usize,
        name: Option<String>,
        mut instructions: Vec<DecodedInstruction>,
        entries: BTreeSet<CpuAddress>,
        exits: BTreeSet<CpuAddress>,
        calls: BTreeSet<CpuAddress>,
    ) -> Self {
        instructions.sort_by_key(|i| i.address());

        Subroutine {
            start,
            head_offset,
            name,
            instructions,
            entries,
            exits,
            calls,
        }
    }

    pub fn start(&self) -> CpuAddress {
        self.start
    }

    /// Exclusive end of the highest-addressed instruction.
    pub fn end(&self) -> CpuAddress {
        match self.instructions.last() {
            Some(last) => CpuAddress::from_u24(last.address().to_u24() + last.len() as u32),
            None => self.start,
        }
    }

    pub fn head_offset(&self) -> usize {
        self.head_offset
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The given name, or `sub_BB_AAAA` after the start address.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("sub_{:02X}_{:04X}", self.start.bank(), self.start.addr()),
        }
    }

    pub fn instructions(&self) -> &[DecodedInstruction] {
        &self.instructions
    }

    pub fn entries(&self) -> &BTreeSet<CpuAddress> {
        &self.entries
    }

    pub fn exits(&self) -> &BTreeSet<CpuAddress> {
        &self.exits
    }

    pub fn calls(&self) -> &BTreeSet<CpuAddress> {
        &self.calls
    }

    /// True if an instruction of this subroutine covers `addr`.
    pub fn contains(&self, addr: CpuAddress) -> bool {
        let after = self
            .instructions
            .partition_point(|i| i.address() <= addr);

        match after.checked_sub(1).and_then(|i| self.instructions.get(i)) {
            Some(instr) => addr.to_u24() < instr.address().to_u24() + instr.len() as u32,
            None => false,
        }
    }

    /// Total size of the decoded instructions.
    pub fn len_bytes(&self) -> usize {
        self.instructions.iter().map(|i| i.len()).sum()
    }

    pub(crate) fn add_entries(&mut self, entries: impl IntoIterator<Item = CpuAddress>) {
        self.entries.extend(entries);
    }

    /// Drop instructions `keep` rejects, along with any exits they were.
    pub(crate) fn retain_instructions(&mut self, mut keep: impl FnMut(&DecodedInstruction) -> bool) {
        self.instructions.retain(|i| keep(i));

        let instructions = &self.instructions;
        self.exits
            .retain(|exit| instructions.iter().any(|i| i.address() == *exit));
    }

    /// Fold in what another analysis found for the same head.
    ///
    /// Entry, exit and call sets are unioned. Instructions are left alone;
    /// whoever decoded the head first owns the body.
    pub(crate) fn absorb(&mut self, other: Subroutine) {
        self.entries.extend(other.entries);
        self.exits.extend(other.exits);
        self.calls.extend(other.calls);

        if self.name.is_none() {
            self.name = other.name;
        }
    }
}
