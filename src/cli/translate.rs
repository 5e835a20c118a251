//! CLI command: translate

use crate::cli::common::{invalid_input, read_image};
use clap::ArgMatches;
use sfcscan::input;
use sfcscan::platform::{AddressTranslator, MAX_ROM_SIZE};
use sfcscan::project::{Program, Project};
use std::io;

pub fn translate<'a>(project: &Project, prog: &Program, argv: &ArgMatches<'a>) -> io::Result<()> {
    let mapping = prog
        .mapping()
        .ok_or_else(|| invalid_input("Unspecified mapping mode, cannot translate."))?;

    // Without an image, assume the largest ROM the mapping allows.
    let rom_size = match prog.image_path(project.base()) {
        Some(_) => read_image(project, prog)?
            .len()
            .saturating_sub(prog.header()),
        None => MAX_ROM_SIZE,
    };
    let translator = AddressTranslator::new(mapping, rom_size).map_err(invalid_input)?;

    if let Some(offset) = argv.value_of("offset") {
        let offset = input::parse_offset(offset).map_err(invalid_input)?;
        let addr = translator.rom_offset_to_cpu(offset).map_err(invalid_input)?;

        println!("{:#08X} -> {}", offset, addr);
    }

    if let Some(addr) = argv.value_of("address") {
        let addr = input::parse_cpu_address(addr).map_err(invalid_input)?;
        let offset = translator.try_cpu_to_rom_offset(addr).map_err(invalid_input)?;

        println!("{} -> {:#08X}", addr, offset);
    }

    Ok(())
}
