//! The 65C816 opcode map

use crate::arch::w65c816::types::{
    AddressingMode, InstructionCategory, Mnemonic, StatusFlags, WidthState,
};
use serde::Serialize;

use AddressingMode::*;
use Mnemonic::*;

/// Every opcode byte, in order, with its mnemonic, addressing mode, and
/// base cycle count (8-bit registers, native mode, no page crossings).
#[rustfmt::skip]
static OPCODE_MAP: [(Mnemonic, AddressingMode, u8); 256] = [
    // 0x00
    (Brk, Immediate8, 7), (Ora, DirectIndexedIndirect, 6), (Cop, Immediate8, 7), (Ora, StackRelative, 4),
    (Tsb, Direct, 5), (Ora, Direct, 3), (Asl, Direct, 5), (Ora, DirectIndirectLong, 6),
    (Php, Implied, 3), (Ora, ImmediateM, 2), (Asl, Accumulator, 2), (Phd, Implied, 4),
    (Tsb, Absolute, 6), (Ora, Absolute, 4), (Asl, Absolute, 6), (Ora, AbsoluteLong, 5),
    // 0x10
    (Bpl, Relative8, 2), (Ora, DirectIndirectIndexed, 5), (Ora, DirectIndirect, 5), (Ora, StackRelativeIndirectIndexed, 7),
    (Trb, Direct, 5), (Ora, DirectX, 4), (Asl, DirectX, 6), (Ora, DirectIndirectLongIndexed, 6),
    (Clc, Implied, 2), (Ora, AbsoluteY, 4), (Inc, Accumulator, 2), (Tcs, Implied, 2),
    (Trb, Absolute, 6), (Ora, AbsoluteX, 4), (Asl, AbsoluteX, 7), (Ora, AbsoluteLongX, 5),
    // 0x20
    (Jsr, Absolute, 6), (And, DirectIndexedIndirect, 6), (Jsl, AbsoluteLong, 8), (And, StackRelative, 4),
    (Bit, Direct, 3), (And, Direct, 3), (Rol, Direct, 5), (And, DirectIndirectLong, 6),
    (Plp, Implied, 4), (And, ImmediateM, 2), (Rol, Accumulator, 2), (Pld, Implied, 5),
    (Bit, Absolute, 4), (And, Absolute, 4), (Rol, Absolute, 6), (And, AbsoluteLong, 5),
    // 0x30
    (Bmi, Relative8, 2), (And, DirectIndirectIndexed, 5), (And, DirectIndirect, 5), (And, StackRelativeIndirectIndexed, 7),
    (Bit, DirectX, 4), (And, DirectX, 4), (Rol, DirectX, 6), (And, DirectIndirectLongIndexed, 6),
    (Sec, Implied, 2), (And, AbsoluteY, 4), (Dec, Accumulator, 2), (Tsc, Implied, 2),
    (Bit, AbsoluteX, 4), (And, AbsoluteX, 4), (Rol, AbsoluteX, 7), (And, AbsoluteLongX, 5),
    // 0x40
    (Rti, Implied, 6), (Eor, DirectIndexedIndirect, 6), (Wdm, Immediate8, 2), (Eor, StackRelative, 4),
    (Mvp, BlockMove, 7), (Eor, Direct, 3), (Lsr, Direct, 5), (Eor, DirectIndirectLong, 6),
    (Pha, Implied, 3), (Eor, ImmediateM, 2), (Lsr, Accumulator, 2), (Phk, Implied, 3),
    (Jmp, Absolute, 3), (Eor, Absolute, 4), (Lsr, Absolute, 6), (Eor, AbsoluteLong, 5),
    // 0x50
    (Bvc, Relative8, 2), (Eor, DirectIndirectIndexed, 5), (Eor, DirectIndirect, 5), (Eor, StackRelativeIndirectIndexed, 7),
    (Mvn, BlockMove, 7), (Eor, DirectX, 4), (Lsr, DirectX, 6), (Eor, DirectIndirectLongIndexed, 6),
    (Cli, Implied, 2), (Eor, AbsoluteY, 4), (Phy, Implied, 3), (Tcd, Implied, 2),
    (Jml, AbsoluteLong, 4), (Eor, AbsoluteX, 4), (Lsr, AbsoluteX, 7), (Eor, AbsoluteLongX, 5),
    // 0x60
    (Rts, Implied, 6), (Adc, DirectIndexedIndirect, 6), (Per, Relative16, 6), (Adc, StackRelative, 4),
    (Stz, Direct, 3), (Adc, Direct, 3), (Ror, Direct, 5), (Adc, DirectIndirectLong, 6),
    (Pla, Implied, 4), (Adc, ImmediateM, 2), (Ror, Accumulator, 2), (Rtl, Implied, 6),
    (Jmp, AbsoluteIndirect, 5), (Adc, Absolute, 4), (Ror, Absolute, 6), (Adc, AbsoluteLong, 5),
    // 0x70
    (Bvs, Relative8, 2), (Adc, DirectIndirectIndexed, 5), (Adc, DirectIndirect, 5), (Adc, StackRelativeIndirectIndexed, 7),
    (Stz, DirectX, 4), (Adc, DirectX, 4), (Ror, DirectX, 6), (Adc, DirectIndirectLongIndexed, 6),
    (Sei, Implied, 2), (Adc, AbsoluteY, 4), (Ply, Implied, 4), (Tdc, Implied, 2),
    (Jmp, AbsoluteIndexedIndirect, 6), (Adc, AbsoluteX, 4), (Ror, AbsoluteX, 7), (Adc, AbsoluteLongX, 5),
    // 0x80
    (Bra, Relative8, 3), (Sta, DirectIndexedIndirect, 6), (Brl, Relative16, 4), (Sta, StackRelative, 4),
    (Sty, Direct, 3), (Sta, Direct, 3), (Stx, Direct, 3), (Sta, DirectIndirectLong, 6),
    (Dey, Implied, 2), (Bit, ImmediateM, 2), (Txa, Implied, 2), (Phb, Implied, 3),
    (Sty, Absolute, 4), (Sta, Absolute, 4), (Stx, Absolute, 4), (Sta, AbsoluteLong, 5),
    // 0x90
    (Bcc, Relative8, 2), (Sta, DirectIndirectIndexed, 6), (Sta, DirectIndirect, 5), (Sta, StackRelativeIndirectIndexed, 7),
    (Sty, DirectX, 4), (Sta, DirectX, 4), (Stx, DirectY, 4), (Sta, DirectIndirectLongIndexed, 6),
    (Tya, Implied, 2), (Sta, AbsoluteY, 5), (Txs, Implied, 2), (Txy, Implied, 2),
    (Stz, Absolute, 4), (Sta, AbsoluteX, 5), (Stz, AbsoluteX, 5), (Sta, AbsoluteLongX, 5),
    // 0xA0
    (Ldy, ImmediateX, 2), (Lda, DirectIndexedIndirect, 6), (Ldx, ImmediateX, 2), (Lda, StackRelative, 4),
    (Ldy, Direct, 3), (Lda, Direct, 3), (Ldx, Direct, 3), (Lda, DirectIndirectLong, 6),
    (Tay, Implied, 2), (Lda, ImmediateM, 2), (Tax, Implied, 2), (Plb, Implied, 4),
    (Ldy, Absolute, 4), (Lda, Absolute, 4), (Ldx, Absolute, 4), (Lda, AbsoluteLong, 5),
    // 0xB0
    (Bcs, Relative8, 2), (Lda, DirectIndirectIndexed, 5), (Lda, DirectIndirect, 5), (Lda, StackRelativeIndirectIndexed, 7),
    (Ldy, DirectX, 4), (Lda, DirectX, 4), (Ldx, DirectY, 4), (Lda, DirectIndirectLongIndexed, 6),
    (Clv, Implied, 2), (Lda, AbsoluteY, 4), (Tsx, Implied, 2), (Tyx, Implied, 2),
    (Ldy, AbsoluteX, 4), (Lda, AbsoluteX, 4), (Ldx, AbsoluteY, 4), (Lda, AbsoluteLongX, 5),
    // 0xC0
    (Cpy, ImmediateX, 2), (Cmp, DirectIndexedIndirect, 6), (Rep, Immediate8, 3), (Cmp, StackRelative, 4),
    (Cpy, Direct, 3), (Cmp, Direct, 3), (Dec, Direct, 5), (Cmp, DirectIndirectLong, 6),
    (Iny, Implied, 2), (Cmp, ImmediateM, 2), (Dex, Implied, 2), (Wai, Implied, 3),
    (Cpy, Absolute, 4), (Cmp, Absolute, 4), (Dec, Absolute, 6), (Cmp, AbsoluteLong, 5),
    // 0xD0
    (Bne, Relative8, 2), (Cmp, DirectIndirectIndexed, 5), (Cmp, DirectIndirect, 5), (Cmp, StackRelativeIndirectIndexed, 7),
    (Pei, DirectIndirect, 6), (Cmp, DirectX, 4), (Dec, DirectX, 6), (Cmp, DirectIndirectLongIndexed, 6),
    (Cld, Implied, 2), (Cmp, AbsoluteY, 4), (Phx, Implied, 3), (Stp, Implied, 3),
    (Jml, AbsoluteIndirectLong, 6), (Cmp, AbsoluteX, 4), (Dec, AbsoluteX, 7), (Cmp, AbsoluteLongX, 5),
    // 0xE0
    (Cpx, ImmediateX, 2), (Sbc, DirectIndexedIndirect, 6), (Sep, Immediate8, 3), (Sbc, StackRelative, 4),
    (Cpx, Direct, 3), (Sbc, Direct, 3), (Inc, Direct, 5), (Sbc, DirectIndirectLong, 6),
    (Inx, Implied, 2), (Sbc, ImmediateM, 2), (Nop, Implied, 2), (Xba, Implied, 3),
    (Cpx, Absolute, 4), (Sbc, Absolute, 4), (Inc, Absolute, 6), (Sbc, AbsoluteLong, 5),
    // 0xF0
    (Beq, Relative8, 2), (Sbc, DirectIndirectIndexed, 5), (Sbc, DirectIndirect, 5), (Sbc, StackRelativeIndirectIndexed, 7),
    (Pea, Absolute, 5), (Sbc, DirectX, 4), (Inc, DirectX, 6), (Sbc, DirectIndirectLongIndexed, 6),
    (Sed, Implied, 2), (Sbc, AbsoluteY, 4), (Plx, Implied, 4), (Xce, Implied, 2),
    (Jsr, AbsoluteIndexedIndirect, 8), (Sbc, AbsoluteX, 4), (Inc, AbsoluteX, 7), (Sbc, AbsoluteLongX, 5),
];

/// Static facts about one opcode byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InstructionDescriptor {
    pub opcode: u8,
    pub mnemonic: Mnemonic,
    pub mode: AddressingMode,

    /// Instruction length with 8-bit registers. Use `length_for` when the
    /// width state is known.
    pub length: u8,

    pub cycles: u8,
    pub flags: StatusFlags,
    pub category: InstructionCategory,
}

impl InstructionDescriptor {
    fn from_map(opcode: u8) -> Self {
        let (mnemonic, mode, cycles) = OPCODE_MAP[opcode as usize];

        // BIT #const only reports the zero flag; the memory forms copy N and V.
        let flags = if mnemonic == Mnemonic::Bit && mode == AddressingMode::ImmediateM {
            StatusFlags::Z
        } else {
            mnemonic.affected_flags()
        };

        InstructionDescriptor {
            opcode,
            mnemonic,
            mode,
            length: 1 + mode.operand_len(WidthState::EIGHT_BIT) as u8,
            cycles,
            flags,
            category: mnemonic.category(),
        }
    }

    /// Exact encoded length under the given width state.
    pub fn length_for(&self, width: WidthState) -> usize {
        1 + self.mode.operand_len(width)
    }

    /// True for opcodes with no defined behavior.
    pub fn is_reserved(&self) -> bool {
        self.category == InstructionCategory::Unknown
    }
}

/// Lookup table from opcode byte to descriptor.
///
/// The table is plain immutable data; a single instance can be shared by any
/// number of decoders or threads.
#[derive(Clone, Debug)]
pub struct OpcodeTable {
    descriptors: Vec<InstructionDescriptor>,
}

lazy_static! {
    static ref SHARED_TABLE: OpcodeTable = OpcodeTable::new();
}

impl Default for OpcodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OpcodeTable {
    pub fn new() -> Self {
        OpcodeTable {
            descriptors: (0..=u8::MAX).map(InstructionDescriptor::from_map).collect(),
        }
    }

    /// The process-wide table, built on first use.
    pub fn shared() -> &'static OpcodeTable {
        &SHARED_TABLE
    }

    pub fn lookup(&self, opcode: u8) -> &InstructionDescriptor {
        &self.descriptors[opcode as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstructionDescriptor> {
        self.descriptors.iter()
    }
}
