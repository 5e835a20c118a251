//! Project file structures

mod program;
mod repr;

pub use program::{EntrySpec, Program};
pub use repr::Project;
