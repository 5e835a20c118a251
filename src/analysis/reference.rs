//! Types needed to analyze references

use crate::memory::CpuAddress;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// JSR or JSL to a subroutine.
    Call,

    /// Unconditional transfer: JMP, JML, BRA, or BRL.
    Jump,

    /// Conditional branch.
    Branch,

    /// A long operand, or PER, naming data in ROM.
    DataRead,
}

impl Display for ReferenceKind {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            ReferenceKind::Call => write!(f, "FUN"),
            ReferenceKind::Jump => write!(f, "LOC"),
            ReferenceKind::Branch => write!(f, "BRA"),
            ReferenceKind::DataRead => write!(f, "DAT"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    from: CpuAddress,
    to: CpuAddress,
    kind: ReferenceKind,
}

impl Reference {
    pub fn new(from: CpuAddress, to: CpuAddress, kind: ReferenceKind) -> Self {
        Reference { from, to, kind }
    }

    pub fn as_source(&self) -> CpuAddress {
        self.from
    }

    pub fn as_target(&self) -> CpuAddress {
        self.to
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }
}
