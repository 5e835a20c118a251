//! Processor architectures that sfcscan can decode.
//!
//! Only the 65C816 is implemented. Its opcode table is built once and shared
//! read-only by every decoder and analyzer in the process.

pub mod w65c816;
