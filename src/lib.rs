//! Static analysis of 65C816 code in Super Famicom ROM images.
//!
//! The pieces, leaf first:
//!
//!  * `arch::w65c816` decodes single instructions from bytes, a width state,
//!    and the opcode table
//!  * `platform::sfc` translates between ROM offsets and CPU addresses under
//!    the LoROM and HiROM mappings
//!  * `analysis` walks the program from its entry points, recovering
//!    subroutines and a cross-reference index
//!
//! The library never touches the filesystem. Loading images, locating
//! copier headers and formatting output are left to the caller.

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate serde_plain;

pub mod analysis;
pub mod arch;
pub mod input;
pub mod memory;
pub mod platform;
pub mod project;
