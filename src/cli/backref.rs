//! Backreference list command for sfcscan

use crate::cli::common::{analyze, invalid_input, open_rom, read_image};
use clap::ArgMatches;
use sfcscan::analysis::ReferenceKind;
use sfcscan::input;
use sfcscan::project::{Program, Project};
use std::io;

pub fn backref<'a>(project: &Project, prog: &Program, argv: &ArgMatches<'a>) -> io::Result<()> {
    let start_spec = argv
        .value_of("start_pc")
        .ok_or_else(|| invalid_input("Did not provide a start PC"))?;
    let target = input::parse_cpu_address(start_spec).map_err(invalid_input)?;

    let data = read_image(project, prog)?;
    let rom = open_rom(prog, &data)?;
    let analysis = analyze(prog, &rom, Vec::new())?;

    for (from, kind) in analysis.xrefs().get_references(target) {
        let sub = analysis.subroutine_containing(from);
        let instr = sub.and_then(|sub| sub.instructions().iter().find(|i| i.address() == from));
        let kind = match kind {
            ReferenceKind::Call => "Code, call",
            ReferenceKind::Jump => "Code, jump",
            ReferenceKind::Branch => "Code, branch",
            ReferenceKind::DataRead => "Data",
        };

        match (sub, instr) {
            (Some(sub), Some(instr)) => {
                println!("{} in {}: {} ({})", from, sub.label(), instr, kind)
            }
            _ => println!("{}: ??? ({})", from, kind),
        }
    }

    Ok(())
}
