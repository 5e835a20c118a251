//! Common utilities for command implementations

use clap::{App, Arg, SubCommand};
use sfcscan::analysis::{Analysis, ControlFlowAnalyzer, EntryPoint};
use sfcscan::arch::w65c816::OpcodeTable;
use sfcscan::memory::RomImage;
use sfcscan::platform::VectorTable;
use sfcscan::project::{Program, Project};
use std::str::FromStr;
use std::{fmt, fs, io};

/// Enumeration of all CLI commands
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum Command {
    Scan,
    Disassemble,
    Backreference,
    Translate,
}

impl Command {
    /// Enumerate all commands that sfcscan recognizes.
    pub fn enumerate() -> Vec<Self> {
        use Command::*;

        vec![Scan, Disassemble, Backreference, Translate]
    }

    /// Construct the subcommand object for this particular `Command`.
    pub fn into_clap_subcommand<'a, 'b>(self) -> App<'a, 'b> {
        match self {
            Command::Scan => SubCommand::with_name("scan")
                .about("Recover subroutines reachable from the vectors and any given addresses")
                .arg(
                    Arg::with_name("start_pc")
                        .value_name("$00:8000")
                        .index(1)
                        .multiple(true)
                        .help("Additional addresses to start analysis from"),
                )
                .arg(
                    Arg::with_name("json")
                        .long("json")
                        .help("Print the full analysis as JSON"),
                )
                .arg(
                    Arg::with_name("parallel")
                        .long("parallel")
                        .help("Analyze each entry point separately, in parallel, and merge"),
                ),
            Command::Disassemble => SubCommand::with_name("dis")
                .about("List code in a straight line from a given address")
                .arg(
                    Arg::with_name("start_pc")
                        .value_name("$00:8000")
                        .index(1)
                        .required(true)
                        .help("The address to list code from"),
                )
                .arg(
                    Arg::with_name("count")
                        .long("count")
                        .value_name("N")
                        .takes_value(true)
                        .help("Maximum number of instructions to list"),
                )
                .arg(
                    Arg::with_name("m16")
                        .long("m16")
                        .help("Start with a 16-bit accumulator"),
                )
                .arg(
                    Arg::with_name("x16")
                        .long("x16")
                        .help("Start with 16-bit index registers"),
                ),
            Command::Backreference => SubCommand::with_name("backref")
                .about("List backreferences to a given address")
                .arg(
                    Arg::with_name("start_pc")
                        .value_name("$00:8000")
                        .index(1)
                        .required(true)
                        .help("The address to list backreferences for"),
                ),
            Command::Translate => SubCommand::with_name("translate")
                .about("Convert between CPU addresses and ROM offsets")
                .arg(
                    Arg::with_name("address")
                        .value_name("$00:8000")
                        .index(1)
                        .required_unless("offset")
                        .help("The CPU address to find in ROM"),
                )
                .arg(
                    Arg::with_name("offset")
                        .long("offset")
                        .value_name("0x10000")
                        .takes_value(true)
                        .help("The ROM offset to find on the bus"),
                ),
        }
    }
}

impl FromStr for Command {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_ref() {
            "dis" => Ok(Command::Disassemble),
            "scan" => Ok(Command::Scan),
            "backref" => Ok(Command::Backreference),
            "backrefs" => Ok(Command::Backreference),
            "translate" => Ok(Command::Translate),
            _ => Err(()),
        }
    }
}

pub fn invalid_input<E: fmt::Display>(e: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
}

/// Pick the named (or default) program out of the project and layer the
/// command line on top of it.
pub fn resolve_program(
    project: &Project,
    version: Option<&str>,
    prog: Program,
) -> io::Result<Program> {
    let base = match version {
        Some(name) => project.program(name).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("There is no program named {} in the project.", name),
            )
        })?,
        None => project
            .default_program()
            .map(|(_, p)| p.clone())
            .unwrap_or_default(),
    };

    Ok(base.apply_override(&prog))
}

pub fn read_image(project: &Project, prog: &Program) -> io::Result<Vec<u8>> {
    let path = prog
        .image_path(project.base())
        .ok_or_else(|| invalid_input("Did not specify an image"))?;

    fs::read(path)
}

pub fn open_rom<'a>(prog: &Program, data: &'a [u8]) -> io::Result<RomImage<'a>> {
    let mapping = prog
        .mapping()
        .ok_or_else(|| invalid_input("Unspecified mapping mode, analysis cannot continue."))?;

    RomImage::new(data, prog.header(), mapping).map_err(invalid_input)
}

/// Run a full analysis of the program's ROM.
pub fn analyze(
    prog: &Program,
    rom: &RomImage<'_>,
    extra: impl IntoIterator<Item = EntryPoint>,
) -> io::Result<Analysis> {
    let mut analyzer = ControlFlowAnalyzer::new(rom, OpcodeTable::shared());

    if prog.use_vectors() {
        analyzer.add_vector_entries(&VectorTable::read(rom));
    }

    for entry in prog.iter_entries() {
        analyzer.add_entry_point(entry.to_entry_point());
    }

    for entry in extra {
        analyzer.add_entry_point(entry);
    }

    analyzer
        .run()
        .map_err(|e| io::Error::new(io::ErrorKind::Interrupted, e.to_string()))
}
