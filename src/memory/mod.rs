//! Types which model the 65C816 address space and the ROM mapped into it.

mod pointer;
mod rom;

pub use pointer::CpuAddress;
pub use rom::RomImage;
