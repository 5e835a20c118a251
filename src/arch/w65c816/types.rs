//! Types used in modeling the 65C816 instruction set

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An operation mnemonic, ignoring its addressing mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mnemonic {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Bra,
    Brk,
    Brl,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cop,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jml,
    Jmp,
    Jsl,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Mvn,
    Mvp,
    Nop,
    Ora,
    Pea,
    Pei,
    Per,
    Pha,
    Phb,
    Phd,
    Phk,
    Php,
    Phx,
    Phy,
    Pla,
    Plb,
    Pld,
    Plp,
    Plx,
    Ply,
    Rep,
    Rol,
    Ror,
    Rti,
    Rtl,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sep,
    Sta,
    Stp,
    Stx,
    Sty,
    Stz,
    Tax,
    Tay,
    Tcd,
    Tcs,
    Tdc,
    Trb,
    Tsb,
    Tsc,
    Tsx,
    Txa,
    Txs,
    Txy,
    Tya,
    Tyx,
    Wai,
    /// Reserved for a future expansion that never shipped.
    Wdm,
    Xba,
    Xce,
}

impl Mnemonic {
    pub fn as_str(self) -> &'static str {
        use Mnemonic::*;

        match self {
            Adc => "ADC",
            And => "AND",
            Asl => "ASL",
            Bcc => "BCC",
            Bcs => "BCS",
            Beq => "BEQ",
            Bit => "BIT",
            Bmi => "BMI",
            Bne => "BNE",
            Bpl => "BPL",
            Bra => "BRA",
            Brk => "BRK",
            Brl => "BRL",
            Bvc => "BVC",
            Bvs => "BVS",
            Clc => "CLC",
            Cld => "CLD",
            Cli => "CLI",
            Clv => "CLV",
            Cmp => "CMP",
            Cop => "COP",
            Cpx => "CPX",
            Cpy => "CPY",
            Dec => "DEC",
            Dex => "DEX",
            Dey => "DEY",
            Eor => "EOR",
            Inc => "INC",
            Inx => "INX",
            Iny => "INY",
            Jml => "JML",
            Jmp => "JMP",
            Jsl => "JSL",
            Jsr => "JSR",
            Lda => "LDA",
            Ldx => "LDX",
            Ldy => "LDY",
            Lsr => "LSR",
            Mvn => "MVN",
            Mvp => "MVP",
            Nop => "NOP",
            Ora => "ORA",
            Pea => "PEA",
            Pei => "PEI",
            Per => "PER",
            Pha => "PHA",
            Phb => "PHB",
            Phd => "PHD",
            Phk => "PHK",
            Php => "PHP",
            Phx => "PHX",
            Phy => "PHY",
            Pla => "PLA",
            Plb => "PLB",
            Pld => "PLD",
            Plp => "PLP",
            Plx => "PLX",
            Ply => "PLY",
            Rep => "REP",
            Rol => "ROL",
            Ror => "ROR",
            Rti => "RTI",
            Rtl => "RTL",
            Rts => "RTS",
            Sbc => "SBC",
            Sec => "SEC",
            Sed => "SED",
            Sei => "SEI",
            Sep => "SEP",
            Sta => "STA",
            Stp => "STP",
            Stx => "STX",
            Sty => "STY",
            Stz => "STZ",
            Tax => "TAX",
            Tay => "TAY",
            Tcd => "TCD",
            Tcs => "TCS",
            Tdc => "TDC",
            Trb => "TRB",
            Tsb => "TSB",
            Tsc => "TSC",
            Tsx => "TSX",
            Txa => "TXA",
            Txs => "TXS",
            Txy => "TXY",
            Tya => "TYA",
            Tyx => "TYX",
            Wai => "WAI",
            Wdm => "WDM",
            Xba => "XBA",
            Xce => "XCE",
        }
    }

    /// The semantic category of the operation.
    pub fn category(self) -> InstructionCategory {
        use InstructionCategory as C;
        use Mnemonic::*;

        match self {
            Lda | Ldx | Ldy | Tax | Tay | Txa | Tya | Txy | Tyx | Tcd | Tdc | Tcs | Tsc | Tsx
            | Txs | Xba => C::Load,
            Sta | Stx | Sty | Stz | Mvn | Mvp => C::Store,
            Adc | Sbc | And | Ora | Eor | Cmp | Cpx | Cpy | Inc | Dec | Inx | Iny | Dex | Dey
            | Asl | Lsr | Rol | Ror | Bit | Tsb | Trb => C::Arithmetic,
            Bcc | Bcs | Beq | Bmi | Bne | Bpl | Bvc | Bvs | Bra | Brl | Jmp | Jml => C::Branch,
            Jsr | Jsl => C::Call,
            Rts | Rtl | Rti => C::Return,
            Pha | Phb | Phd | Phk | Php | Phx | Phy | Pla | Plb | Pld | Plp | Plx | Ply | Pea
            | Pei | Per => C::Stack,
            Clc | Cld | Cli | Clv | Sec | Sed | Sei | Rep | Sep | Xce | Nop | Wai | Stp | Brk
            | Cop => C::System,
            Wdm => C::Unknown,
        }
    }

    /// Status register bits the operation may change.
    pub fn affected_flags(self) -> StatusFlags {
        use Mnemonic::*;

        let nz = StatusFlags::N | StatusFlags::Z;

        match self {
            Adc | Sbc => nz | StatusFlags::V | StatusFlags::C,
            And | Ora | Eor => nz,
            Asl | Lsr | Rol | Ror => nz | StatusFlags::C,
            Bit => nz | StatusFlags::V,
            Cmp | Cpx | Cpy => nz | StatusFlags::C,
            Inc | Dec | Inx | Iny | Dex | Dey => nz,
            Lda | Ldx | Ldy => nz,
            Tax | Tay | Txa | Tya | Txy | Tyx | Tcd | Tdc | Tsc | Tsx | Xba => nz,
            Pla | Plx | Ply | Plb | Pld => nz,
            Tsb | Trb => StatusFlags::Z,
            Clc | Sec => StatusFlags::C,
            Cld | Sed => StatusFlags::D,
            Cli | Sei => StatusFlags::I,
            Clv => StatusFlags::V,
            Xce => StatusFlags::C | StatusFlags::M | StatusFlags::X,
            Rep | Sep | Plp | Rti => StatusFlags::all(),
            Brk | Cop => StatusFlags::D | StatusFlags::I,
            _ => StatusFlags::empty(),
        }
    }

    /// True for the eight flag-testing relative branches.
    pub fn is_conditional_branch(self) -> bool {
        use Mnemonic::*;

        matches!(self, Bcc | Bcs | Beq | Bmi | Bne | Bpl | Bvc | Bvs)
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operand encodings of the 65C816.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressingMode {
    Implied,
    Accumulator,
    /// `#const`, one or two bytes depending on the accumulator width.
    ImmediateM,
    /// `#const`, one or two bytes depending on the index width.
    ImmediateX,
    /// `#const`, always one byte (REP, SEP, and signature bytes).
    Immediate8,
    /// `dp`
    Direct,
    /// `dp,X`
    DirectX,
    /// `dp,Y`
    DirectY,
    /// `(dp)`
    DirectIndirect,
    /// `[dp]`
    DirectIndirectLong,
    /// `(dp,X)`
    DirectIndexedIndirect,
    /// `(dp),Y`
    DirectIndirectIndexed,
    /// `[dp],Y`
    DirectIndirectLongIndexed,
    /// `addr`
    Absolute,
    /// `addr,X`
    AbsoluteX,
    /// `addr,Y`
    AbsoluteY,
    /// `(addr)`
    AbsoluteIndirect,
    /// `[addr]`
    AbsoluteIndirectLong,
    /// `(addr,X)`
    AbsoluteIndexedIndirect,
    /// `long`
    AbsoluteLong,
    /// `long,X`
    AbsoluteLongX,
    /// 8-bit PC-relative displacement
    Relative8,
    /// 16-bit PC-relative displacement
    Relative16,
    /// `sr,S`
    StackRelative,
    /// `(sr,S),Y`
    StackRelativeIndirectIndexed,
    /// `srcbank,destbank` as written; encoded destination first.
    BlockMove,
}

impl AddressingMode {
    /// Number of operand bytes following the opcode in the given width
    /// state.
    pub fn operand_len(self, width: WidthState) -> usize {
        use AddressingMode::*;

        match self {
            Implied | Accumulator => 0,
            ImmediateM => width.accumulator.bytes(),
            ImmediateX => width.index.bytes(),
            Immediate8 | Direct | DirectX | DirectY | DirectIndirect | DirectIndirectLong
            | DirectIndexedIndirect | DirectIndirectIndexed | DirectIndirectLongIndexed
            | Relative8 | StackRelative | StackRelativeIndirectIndexed => 1,
            Absolute | AbsoluteX | AbsoluteY | AbsoluteIndirect | AbsoluteIndirectLong
            | AbsoluteIndexedIndirect | Relative16 | BlockMove => 2,
            AbsoluteLong | AbsoluteLongX => 3,
        }
    }

    /// True if the operand length depends on the processor width state.
    pub fn is_width_dependent(self) -> bool {
        matches!(self, AddressingMode::ImmediateM | AddressingMode::ImmediateX)
    }

    /// True for the indirect forms a jump can take, whose destination lives
    /// in memory rather than in the instruction stream.
    pub fn is_indirect_jump_mode(self) -> bool {
        matches!(
            self,
            AddressingMode::AbsoluteIndirect
                | AddressingMode::AbsoluteIndirectLong
                | AddressingMode::AbsoluteIndexedIndirect
        )
    }
}

/// Semantic grouping of operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionCategory {
    Load,
    Store,
    Arithmetic,
    Branch,
    Call,
    Return,
    Stack,
    System,
    Unknown,
}

bitflags! {
    /// Bits of the processor status register, P.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct StatusFlags: u8 {
        const N = 0x80;
        const V = 0x40;
        /// Accumulator and memory are 8 bits wide when set.
        const M = 0x20;
        /// Index registers are 8 bits wide when set.
        const X = 0x10;
        const D = 0x08;
        const I = 0x04;
        const Z = 0x02;
        const C = 0x01;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterWidth {
    Bits8,
    Bits16,
}

impl RegisterWidth {
    pub fn bytes(self) -> usize {
        match self {
            RegisterWidth::Bits8 => 1,
            RegisterWidth::Bits16 => 2,
        }
    }
}

/// The parts of P which change how instructions are encoded.
///
/// This is threaded through decoding explicitly: each decoded instruction
/// reports the width state that follows it, and the caller feeds that into
/// the next decode.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WidthState {
    pub accumulator: RegisterWidth,
    pub index: RegisterWidth,
}

impl Default for WidthState {
    /// Power-on and emulation mode run with 8-bit registers.
    fn default() -> Self {
        WidthState::EIGHT_BIT
    }
}

impl WidthState {
    pub const EIGHT_BIT: WidthState = WidthState {
        accumulator: RegisterWidth::Bits8,
        index: RegisterWidth::Bits8,
    };

    pub const SIXTEEN_BIT: WidthState = WidthState {
        accumulator: RegisterWidth::Bits16,
        index: RegisterWidth::Bits16,
    };

    pub fn new(accumulator: RegisterWidth, index: RegisterWidth) -> Self {
        WidthState { accumulator, index }
    }

    /// Width state after `REP #mask`: cleared M or X bits widen to 16 bits.
    pub fn apply_rep(self, mask: u8) -> Self {
        let flags = StatusFlags::from_bits_truncate(mask);
        let mut next = self;

        if flags.contains(StatusFlags::M) {
            next.accumulator = RegisterWidth::Bits16;
        }

        if flags.contains(StatusFlags::X) {
            next.index = RegisterWidth::Bits16;
        }

        next
    }

    /// Width state after `SEP #mask`: set M or X bits narrow to 8 bits.
    pub fn apply_sep(self, mask: u8) -> Self {
        let flags = StatusFlags::from_bits_truncate(mask);
        let mut next = self;

        if flags.contains(StatusFlags::M) {
            next.accumulator = RegisterWidth::Bits8;
        }

        if flags.contains(StatusFlags::X) {
            next.index = RegisterWidth::Bits8;
        }

        next
    }
}
