//! WDC 65C816, as found in the SFC/SNES
//!
//! The 65C816 is a 16-bit extension of the 6502 with a 24-bit address bus.
//! Two bits of the status register, M and X, select whether the accumulator
//! and index registers are 8 or 16 bits wide, and that choice changes how
//! many operand bytes an immediate instruction takes. Decoding therefore
//! needs a `WidthState` alongside the bytes; it is passed in and handed back
//! explicitly rather than kept anywhere global.

mod dis;
mod table;
mod types;

pub use dis::{decode_linear, decode_one, DecodedInstruction, Decoder, InstrFlags};
pub use table::{InstructionDescriptor, OpcodeTable};
pub use types::{
    AddressingMode, InstructionCategory, Mnemonic, RegisterWidth, StatusFlags, WidthState,
};
