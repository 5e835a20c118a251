//! CLI command: dis

use crate::cli::common::{invalid_input, open_rom, read_image};
use clap::ArgMatches;
use sfcscan::arch::w65c816::{decode_linear, Decoder, RegisterWidth, WidthState};
use sfcscan::input;
use sfcscan::project::{Program, Project};
use std::io;

pub fn dis<'a>(project: &Project, prog: &Program, argv: &ArgMatches<'a>) -> io::Result<()> {
    let start_spec = argv
        .value_of("start_pc")
        .ok_or_else(|| invalid_input("Did not provide a start PC"))?;
    let start_pc = input::parse_cpu_address(start_spec).map_err(invalid_input)?;
    let count = match argv.value_of("count") {
        Some(count) => input::parse_offset(count).map_err(invalid_input)?,
        None => 64,
    };
    let width = |wide| {
        if wide {
            RegisterWidth::Bits16
        } else {
            RegisterWidth::Bits8
        }
    };
    let state = WidthState::new(width(argv.is_present("m16")), width(argv.is_present("x16")));

    let data = read_image(project, prog)?;
    let rom = open_rom(prog, &data)?;
    let offset = rom
        .translator()
        .try_cpu_to_rom_offset(start_pc)
        .map_err(invalid_input)?;

    // Stop at the end of the bank; the program counter wraps there.
    let bank_end = (offset + (0x1_0000 - start_pc.addr() as usize)).min(rom.len());
    let bytes = &rom.bytes()[..bank_end];

    let (listing, error) = decode_linear(&Decoder::default(), bytes, offset, start_pc, state, count);

    for instr in listing.iter() {
        let hex: Vec<String> = std::iter::once(instr.opcode())
            .chain(instr.operand_bytes().iter().copied())
            .map(|b| format!("{:02X}", b))
            .collect();

        println!("{}  {:<12} {}", instr.address(), hex.join(" "), instr);
    }

    if let Some(error) = error {
        eprintln!("{}", error);
    }

    Ok(())
}
