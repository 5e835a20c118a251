//! CLI support for non-command bits

use crate::cli;
use crate::cli::common::{invalid_input, resolve_program, Command};
use clap::{Arg, ArgSettings};
use sfcscan::project;
use std::io;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Send library logs to stderr. `RUST_LOG` wins over `-v` when set.
fn init_logging(verbosity: u64) {
    let default = match verbosity {
        0 => "sfcscan=warn",
        1 => "sfcscan=info",
        2 => "sfcscan=debug",
        _ => "sfcscan=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

pub fn main() -> io::Result<()> {
    let mut app = app_from_crate!();
    app = app.arg(
        Arg::with_name("program")
            .long("program")
            .value_name("mygame")
            .takes_value(true)
            .help("Which program to analyze")
            .set(ArgSettings::Global),
    );
    app = project::Program::configure_app(app);
    app = app
        .arg(
            Arg::with_name("project")
                .long("project")
                .value_name("sfcscan.json")
                .takes_value(true)
                .help("The project file to load")
                .set(ArgSettings::Global),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Log more of what analysis is doing")
                .set(ArgSettings::Global),
        );

    for cmd in Command::enumerate().iter() {
        app = app.subcommand(cmd.into_clap_subcommand());
    }

    let matches = app.get_matches();

    init_logging(matches.occurrences_of("verbose"));

    let project_filename = matches.value_of("project").unwrap_or("sfcscan.json");
    let version = matches.value_of("program");
    let prog = project::Program::from_arg_matches(&matches).map_err(invalid_input)?;

    let (command, submatches) = matches.subcommand();
    let command = Command::from_str(command)
        .map_err(|_| invalid_input("No command given. Try --help."))?;
    let submatches =
        submatches.ok_or_else(|| invalid_input("No command given. Try --help."))?;

    let project = project::Project::read_or_default(project_filename)?;
    let prog = resolve_program(&project, version, prog)?;

    match command {
        Command::Scan => cli::scan(&project, &prog, submatches)?,
        Command::Disassemble => cli::dis(&project, &prog, submatches)?,
        Command::Backreference => cli::backref(&project, &prog, submatches)?,
        Command::Translate => cli::translate(&project, &prog, submatches)?,
    };

    Ok(())
}
