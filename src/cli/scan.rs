//! CLI command: scan

use crate::cli::common::{analyze, invalid_input, open_rom, read_image};
use clap::ArgMatches;
use sfcscan::analysis::{self, Analysis, Cancellation, EntryPoint};
use sfcscan::arch::w65c816::OpcodeTable;
use sfcscan::input;
use sfcscan::memory::RomImage;
use sfcscan::platform::VectorTable;
use sfcscan::project::{Program, Project};
use std::io;

/// Analyze every seed as its own region and merge the results.
fn scan_parallel(
    prog: &Program,
    rom: &RomImage<'_>,
    extra: Vec<EntryPoint>,
) -> io::Result<Analysis> {
    let vectors = if prog.use_vectors() {
        VectorTable::read(rom)
    } else {
        VectorTable::default()
    };

    let mut seeds: Vec<EntryPoint> = vectors
        .handlers()
        .map(|(vector, handler)| EntryPoint::new(handler).named(vector.name()))
        .collect();

    seeds.extend(prog.iter_entries().map(|e| e.to_entry_point()));
    seeds.extend(extra);

    let regions: Vec<Vec<EntryPoint>> = seeds.into_iter().map(|e| vec![e]).collect();

    analysis::analyze_regions(rom, OpcodeTable::shared(), &regions, &Cancellation::new())
        .map(|analysis| analysis.with_leading_anomalies(vectors.anomalies()))
        .map_err(|e| io::Error::new(io::ErrorKind::Interrupted, e.to_string()))
}

fn print_report(rom: &RomImage<'_>, analysis: &Analysis) {
    for sub in analysis.subroutines() {
        println!(
            "{}-{} ({}): {} bytes, {} instructions, {} entries, {} exits, {} calls",
            sub.start(),
            sub.end(),
            sub.label(),
            sub.len_bytes(),
            sub.instructions().len(),
            sub.entries().len(),
            sub.exits().len(),
            sub.calls().len()
        );
    }

    for anomaly in analysis.anomalies() {
        println!("warning: {}", anomaly);
    }

    let unclassified: usize = analysis.unclassified().iter().map(|r| r.len()).sum();

    println!(
        "{} subroutines, {} cross-references, {} of {} bytes unclassified in {} ranges",
        analysis.subroutines().len(),
        analysis.xrefs().len(),
        unclassified,
        rom.len(),
        analysis.unclassified().len()
    );
}

pub fn scan<'a>(project: &Project, prog: &Program, argv: &ArgMatches<'a>) -> io::Result<()> {
    let data = read_image(project, prog)?;
    let rom = open_rom(prog, &data)?;

    let extra = argv
        .values_of("start_pc")
        .into_iter()
        .flatten()
        .map(|spec| {
            input::parse_cpu_address(spec)
                .map(EntryPoint::new)
                .map_err(invalid_input)
        })
        .collect::<io::Result<Vec<_>>>()?;

    eprintln!("Starting scan of {} byte {} image", rom.len(), rom.mode());

    let analysis = if argv.is_present("parallel") {
        scan_parallel(prog, &rom, extra)?
    } else {
        analyze(prog, &rom, extra)?
    };

    if argv.is_present("json") {
        serde_json::to_writer_pretty(io::stdout(), &analysis)?;
        println!();
    } else {
        print_report(&rom, &analysis);
    }

    Ok(())
}
