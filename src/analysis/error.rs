//! Error types for decoding, address translation, and analysis

use crate::memory::CpuAddress;
use thiserror::Error;

/// Instruction decoding failed.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes remain in the image than the instruction at `offset`
    /// declares.
    #[error("instruction at offset {offset:#X} needs {needed} bytes, only {available} remain")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

/// Address translation failed.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The CPU address does not select ROM under the mapping in use.
    #[error("{0} is not backed by ROM")]
    OutOfWindow(CpuAddress),

    /// The ROM offset is past the end of the image or the mapping.
    #[error("ROM offset {0:#X} is outside the image")]
    OffsetOutOfRange(usize),

    /// The image is larger than the mapping can address.
    #[error("ROM of {size:#X} bytes exceeds the {limit:#X} byte limit of the mapping")]
    RomTooLarge { size: usize, limit: usize },

    #[error("ROM image is empty")]
    EmptyRom,

    /// The copier header claims more bytes than the file holds.
    #[error("header of {header} bytes does not fit in a {file} byte file")]
    HeaderTooLarge { header: usize, file: usize },
}

/// Analysis did not run to completion.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("analysis was cancelled after {steps} steps")]
    Cancelled { steps: usize },
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
