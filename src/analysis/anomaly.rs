//! Things analysis noticed but could not resolve

use crate::memory::CpuAddress;
use serde::Serialize;
use std::fmt;

/// A non-fatal event recorded during analysis for manual review.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind")]
pub enum Anomaly {
    /// Too few bytes remained for the instruction at `offset`, either at the
    /// end of the image or at the end of a bank. The byte is left
    /// unclassified and scanning resumes after it.
    Truncated { offset: usize, address: CpuAddress },

    /// A control-flow target, fallthrough, or entry point did not resolve
    /// to ROM. `from` is the referencing instruction, if there was one.
    OutOfWindow {
        from: Option<CpuAddress>,
        target: CpuAddress,
    },

    /// A jump or call through memory, whose destination is unknown.
    IndirectJump { at: CpuAddress },

    /// Decoding at `at` would overlap the instruction already decoded at
    /// `existing`. The existing boundary is kept.
    BoundaryConflict { at: CpuAddress, existing: CpuAddress },

    /// Control reached `target`, which is inside the subroutine starting at
    /// `owner` rather than at its head.
    EntryInsideSubroutine { target: CpuAddress, owner: CpuAddress },

    /// A reserved opcode was reached.
    ReservedOpcode { at: CpuAddress },

    /// Control reached `target`, a byte decoding already gave up on.
    IntoUnclassified {
        from: Option<CpuAddress>,
        target: CpuAddress,
    },
}

impl Anomaly {
    /// The address the anomaly is best reported at.
    pub fn location(&self) -> Option<CpuAddress> {
        match self {
            Anomaly::Truncated { address, .. } => Some(*address),
            Anomaly::OutOfWindow { from, .. } => *from,
            Anomaly::IndirectJump { at } => Some(*at),
            Anomaly::BoundaryConflict { at, .. } => Some(*at),
            Anomaly::EntryInsideSubroutine { target, .. } => Some(*target),
            Anomaly::ReservedOpcode { at } => Some(*at),
            Anomaly::IntoUnclassified { from, target } => from.or(Some(*target)),
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::Truncated { offset, address } => write!(
                f,
                "{}: truncated instruction at ROM offset {:#X}",
                address, offset
            ),
            Anomaly::OutOfWindow {
                from: Some(from),
                target,
            } => write!(f, "{}: {} is not ROM", from, target),
            Anomaly::OutOfWindow { from: None, target } => {
                write!(f, "entry point {} is not ROM", target)
            }
            Anomaly::IndirectJump { at } => write!(f, "{}: indirect jump, target unknown", at),
            Anomaly::BoundaryConflict { at, existing } => write!(
                f,
                "{}: overlaps instruction boundary at {}",
                at, existing
            ),
            Anomaly::EntryInsideSubroutine { target, owner } => write!(
                f,
                "{}: entered inside subroutine {}",
                target, owner
            ),
            Anomaly::ReservedOpcode { at } => write!(f, "{}: reserved opcode", at),
            Anomaly::IntoUnclassified {
                from: Some(from),
                target,
            } => write!(f, "{}: {} is not decodable", from, target),
            Anomaly::IntoUnclassified { from: None, target } => {
                write!(f, "{}: reached after decoding gave up", target)
            }
        }
    }
}
