//! CLI commands

mod backref;
mod common;
mod dis;
mod main;
mod scan;
mod translate;

pub use backref::backref;
pub use dis::dis;
pub use main::main;
pub use scan::scan;
pub use translate::translate;
