//! Platforms define how a program image appears on the CPU's address bus.
//!
//! Only the Super Famicom is supported, in its LoROM and HiROM variants.

pub mod sfc;

pub use sfc::{AddressTranslator, MappingMode, Vector, VectorTable, MAX_ROM_SIZE};
