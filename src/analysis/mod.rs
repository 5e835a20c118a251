//! Control-flow analysis of decoded program code

mod analyzer;
mod anomaly;
mod cancel;
mod error;
mod flow;
mod merge;
mod reference;
mod subroutine;
mod xref;

pub use analyzer::{AddressState, Analysis, ControlFlowAnalyzer, EntryPoint, UnclassifiedRange};
pub use anomaly::Anomaly;
pub use cancel::Cancellation;
pub use error::{AddressError, AnalysisError, DecodeError, Result};
pub use flow::Flow;
pub use merge::{analyze_regions, merge_analyses};
pub use reference::{Reference, ReferenceKind};
pub use subroutine::Subroutine;
pub use xref::CrossReferenceIndex;

#[cfg(test)]
mod tests;
