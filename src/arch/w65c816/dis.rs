//! 65C816 instruction decoder

use crate::analysis::{DecodeError, Flow};
use crate::arch::w65c816::table::{InstructionDescriptor, OpcodeTable};
use crate::arch::w65c816::types::{
    AddressingMode, InstructionCategory, Mnemonic, WidthState,
};
use crate::memory::CpuAddress;
use bitflags::bitflags;
use serde::Serialize;
use std::fmt;

bitflags! {
    /// Control-flow classification of a decoded instruction, derived purely
    /// from its mnemonic and addressing mode.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
    pub struct InstrFlags: u8 {
        const BRANCH = 0x01;
        const JUMP = 0x02;
        const CALL = 0x04;
        const RETURN = 0x08;
        const CONDITIONAL = 0x10;
        /// Destination is read from memory and cannot be resolved statically.
        const INDIRECT = 0x20;
        /// Execution does not continue past this instruction (BRK, STP, WDM).
        const HALT = 0x40;
    }
}

fn classify(mnemonic: Mnemonic, mode: AddressingMode) -> InstrFlags {
    use Mnemonic::*;

    let mut flags = match mnemonic {
        Jsr | Jsl => InstrFlags::CALL,
        Rts | Rtl | Rti => InstrFlags::RETURN,
        Jmp | Jml => InstrFlags::JUMP,
        Bra | Brl => InstrFlags::JUMP | InstrFlags::BRANCH,
        Brk | Stp | Wdm => InstrFlags::HALT,
        m if m.is_conditional_branch() => InstrFlags::BRANCH | InstrFlags::CONDITIONAL,
        _ => InstrFlags::empty(),
    };

    if flags.intersects(InstrFlags::CALL | InstrFlags::JUMP) && mode.is_indirect_jump_mode() {
        flags |= InstrFlags::INDIRECT;
    }

    flags
}

/// One instruction, decoded at a known ROM offset and CPU address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecodedInstruction {
    rom_offset: usize,
    address: CpuAddress,
    opcode: u8,
    mnemonic: Mnemonic,
    mode: AddressingMode,
    category: InstructionCategory,
    operand: Vec<u8>,

    /// Operand bytes read as a little-endian integer.
    value: u32,

    /// Statically known destination of a branch, jump, call, or PER.
    target: Option<CpuAddress>,

    flags: InstrFlags,

    /// Width state in effect for the instruction that follows this one.
    width_after: WidthState,
}

impl DecodedInstruction {
    pub fn rom_offset(&self) -> usize {
        self.rom_offset
    }

    pub fn address(&self) -> CpuAddress {
        self.address
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn mnemonic(&self) -> Mnemonic {
        self.mnemonic
    }

    pub fn mode(&self) -> AddressingMode {
        self.mode
    }

    pub fn category(&self) -> InstructionCategory {
        self.category
    }

    pub fn operand_bytes(&self) -> &[u8] {
        &self.operand
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn target(&self) -> Option<CpuAddress> {
        self.target
    }

    pub fn flags(&self) -> InstrFlags {
        self.flags
    }

    pub fn width_after(&self) -> WidthState {
        self.width_after
    }

    /// Encoded length, opcode included.
    pub fn len(&self) -> usize {
        1 + self.operand.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Address of the byte after this instruction, inside the same bank.
    pub fn end_address(&self) -> CpuAddress {
        self.address.wrapping_add(self.len() as u16)
    }

    pub fn is_branch(&self) -> bool {
        self.flags.contains(InstrFlags::BRANCH)
    }

    pub fn is_jump(&self) -> bool {
        self.flags.contains(InstrFlags::JUMP)
    }

    pub fn is_call(&self) -> bool {
        self.flags.contains(InstrFlags::CALL)
    }

    pub fn is_return(&self) -> bool {
        self.flags.contains(InstrFlags::RETURN)
    }

    pub fn is_conditional(&self) -> bool {
        self.flags.contains(InstrFlags::CONDITIONAL)
    }

    pub fn is_indirect(&self) -> bool {
        self.flags.contains(InstrFlags::INDIRECT)
    }

    /// How control leaves this instruction.
    pub fn flow(&self) -> Flow {
        let f = self.flags;

        if f.contains(InstrFlags::CALL) {
            Flow::Call
        } else if f.contains(InstrFlags::RETURN) {
            Flow::Returning
        } else if f.contains(InstrFlags::HALT) {
            Flow::Halting
        } else if f.contains(InstrFlags::JUMP) && f.contains(InstrFlags::INDIRECT) {
            Flow::Indirect
        } else if f.contains(InstrFlags::JUMP) {
            Flow::Branching(false)
        } else if f.contains(InstrFlags::CONDITIONAL) {
            Flow::Branching(true)
        } else {
            Flow::Normal
        }
    }

    /// A data location this instruction statically names.
    ///
    /// Only long operands carry their own bank; absolute operands are
    /// relative to the data bank register, which is unknown here.
    pub fn data_address(&self) -> Option<CpuAddress> {
        if !self.flags.is_empty() {
            return None;
        }

        match self.mode {
            AddressingMode::AbsoluteLong | AddressingMode::AbsoluteLongX => {
                Some(CpuAddress::from_u24(self.value))
            }
            AddressingMode::Relative16 => self.target,
            _ => None,
        }
    }
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use AddressingMode::*;

        let v = self.value;
        let imm = |f: &mut fmt::Formatter<'_>| match self.operand.len() {
            2 => write!(f, " #${:04X}", v),
            _ => write!(f, " #${:02X}", v),
        };

        write!(f, "{}", self.mnemonic)?;

        match self.mode {
            Implied => Ok(()),
            Accumulator => write!(f, " A"),
            ImmediateM | ImmediateX | Immediate8 => imm(f),
            Direct => write!(f, " ${:02X}", v),
            DirectX => write!(f, " ${:02X},X", v),
            DirectY => write!(f, " ${:02X},Y", v),
            DirectIndirect => write!(f, " (${:02X})", v),
            DirectIndirectLong => write!(f, " [${:02X}]", v),
            DirectIndexedIndirect => write!(f, " (${:02X},X)", v),
            DirectIndirectIndexed => write!(f, " (${:02X}),Y", v),
            DirectIndirectLongIndexed => write!(f, " [${:02X}],Y", v),
            Absolute => write!(f, " ${:04X}", v),
            AbsoluteX => write!(f, " ${:04X},X", v),
            AbsoluteY => write!(f, " ${:04X},Y", v),
            AbsoluteIndirect => write!(f, " (${:04X})", v),
            AbsoluteIndirectLong => write!(f, " [${:04X}]", v),
            AbsoluteIndexedIndirect => write!(f, " (${:04X},X)", v),
            AbsoluteLong => write!(f, " ${:06X}", v),
            AbsoluteLongX => write!(f, " ${:06X},X", v),
            Relative8 | Relative16 => match self.target {
                Some(t) => write!(f, " ${:04X}", t.addr()),
                None => Ok(()),
            },
            StackRelative => write!(f, " ${:02X},S", v),
            StackRelativeIndirectIndexed => write!(f, " (${:02X},S),Y", v),
            BlockMove => write!(
                f,
                " ${:02X},${:02X}",
                self.operand.get(1).copied().unwrap_or(0),
                self.operand.first().copied().unwrap_or(0)
            ),
        }
    }
}

/// Table-driven decoder.
///
/// A `Decoder` carries no state of its own beyond the table it reads, so
/// decoding is a pure function of its arguments.
#[derive(Copy, Clone, Debug)]
pub struct Decoder<'t> {
    table: &'t OpcodeTable,
}

impl Default for Decoder<'static> {
    fn default() -> Self {
        Decoder::new(OpcodeTable::shared())
    }
}

impl<'t> Decoder<'t> {
    pub fn new(table: &'t OpcodeTable) -> Self {
        Decoder { table }
    }

    pub fn table(&self) -> &'t OpcodeTable {
        self.table
    }

    /// Decode the instruction starting at `bytes[position]`, which the CPU
    /// sees at `pc`, with registers sized according to `width`.
    ///
    /// Exactly `descriptor.length_for(width)` bytes are consumed. If fewer
    /// than that remain in `bytes`, `DecodeError::Truncated` is returned;
    /// nothing past the end of the slice is ever read.
    pub fn decode_one(
        &self,
        bytes: &[u8],
        position: usize,
        pc: CpuAddress,
        width: WidthState,
    ) -> Result<DecodedInstruction, DecodeError> {
        let opcode = *bytes.get(position).ok_or(DecodeError::Truncated {
            offset: position,
            needed: 1,
            available: 0,
        })?;
        let desc = self.table.lookup(opcode);
        let length = desc.length_for(width);
        let available = bytes.len() - position;

        if available < length {
            return Err(DecodeError::Truncated {
                offset: position,
                needed: length,
                available,
            });
        }

        let operand = bytes[position + 1..position + length].to_vec();
        let value = operand
            .iter()
            .rev()
            .fold(0u32, |acc, byte| (acc << 8) | *byte as u32);

        Ok(DecodedInstruction {
            rom_offset: position,
            address: pc,
            opcode,
            mnemonic: desc.mnemonic,
            mode: desc.mode,
            category: desc.category,
            target: resolve_target(desc, pc, length, value),
            flags: classify(desc.mnemonic, desc.mode),
            width_after: next_width(desc, width, value),
            operand,
            value,
        })
    }
}

fn resolve_target(
    desc: &InstructionDescriptor,
    pc: CpuAddress,
    length: usize,
    value: u32,
) -> Option<CpuAddress> {
    use AddressingMode::*;
    use Mnemonic::*;

    let next = pc.wrapping_add(length as u16);

    match (desc.mnemonic, desc.mode) {
        (_, Relative8) => Some(next.wrapping_offset(value as u8 as i8 as i32)),
        (_, Relative16) => Some(next.wrapping_offset(value as u16 as i16 as i32)),
        (Jmp, Absolute) | (Jsr, Absolute) => Some(pc.with_addr(value as u16)),
        (Jml, AbsoluteLong) | (Jsl, AbsoluteLong) => Some(CpuAddress::from_u24(value)),
        _ => None,
    }
}

fn next_width(desc: &InstructionDescriptor, width: WidthState, value: u32) -> WidthState {
    match desc.mnemonic {
        Mnemonic::Rep => width.apply_rep(value as u8),
        Mnemonic::Sep => width.apply_sep(value as u8),
        _ => width,
    }
}

/// Decode with the process-wide opcode table.
pub fn decode_one(
    bytes: &[u8],
    position: usize,
    pc: CpuAddress,
    width: WidthState,
) -> Result<DecodedInstruction, DecodeError> {
    Decoder::default().decode_one(bytes, position, pc, width)
}

/// Decode up to `count` instructions in a straight line, threading the width
/// state from each instruction to the next.
///
/// Decoding stops early at the end of `bytes` or at the first instruction
/// that does not fall through. The error of a truncated tail is returned
/// alongside whatever decoded cleanly before it.
pub fn decode_linear(
    decoder: &Decoder<'_>,
    bytes: &[u8],
    position: usize,
    pc: CpuAddress,
    width: WidthState,
    count: usize,
) -> (Vec<DecodedInstruction>, Option<DecodeError>) {
    let mut out = Vec::new();
    let mut position = position;
    let mut pc = pc;
    let mut width = width;

    while out.len() < count && position < bytes.len() {
        match decoder.decode_one(bytes, position, pc, width) {
            Ok(instr) => {
                position += instr.len();
                pc = instr.end_address();
                width = instr.width_after();

                let keep_going = instr.flow().is_nonfinal();
                out.push(instr);

                if !keep_going {
                    break;
                }
            }
            Err(e) => return (out, Some(e)),
        }
    }

    (out, None)
}
