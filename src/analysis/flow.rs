//! Analysis of instruction control flow

use serde::Serialize;

/// Indicates what kind of control flow a particular instruction involves.
///
/// Control flow determines in what order instructions are executed within a
/// subroutine. This implies the notion of a "next" instruction, present at the
/// address directly after the given instruction, and zero or more alternative
/// destinations. Execution inside called subroutines, as well as interrupts,
/// is not considered for control flow analysis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Flow {
    /// Normal control flow.
    ///
    /// Instruction control predictably flows from the current instruction to
    /// the following instruction.
    Normal,

    /// Subroutine call.
    ///
    /// Control leaves for the callee and, once it returns, resumes at the
    /// following instruction.
    Call,

    /// Branching control flow.
    ///
    /// Control continues at a statically known destination. The boolean
    /// indicates whether the following instruction is also a possible
    /// successor, as it is for the flag-testing branches.
    Branching(bool),

    /// Returning control flow.
    ///
    /// Instruction control flow for this subroutine ends.
    Returning,

    /// Jump through a pointer held in memory.
    ///
    /// The destination cannot be known without executing the program, so
    /// control flow for this subroutine ends here as far as static analysis
    /// is concerned.
    Indirect,

    /// The processor stops, or traps into a handler that does not come back
    /// to the following instruction.
    Halting,
}

impl Flow {
    /// True if the following instruction is a possible successor.
    pub fn is_nonfinal(self) -> bool {
        use Flow::*;

        match self {
            Normal | Call => true,
            Branching(with_next) => with_next,
            Returning | Indirect | Halting => false,
        }
    }

    /// True if the instruction leaves the subroutine for good.
    pub fn is_exit(self) -> bool {
        matches!(self, Flow::Returning | Flow::Indirect | Flow::Halting)
    }
}
