//! Program identifier

use crate::analysis::EntryPoint;
use crate::arch::w65c816::{RegisterWidth, WidthState};
use crate::input::{parse_offset, InputError};
use crate::memory::CpuAddress;
use crate::platform::MappingMode;
use clap::{App, Arg, ArgMatches, ArgSettings};
use relative_path::RelativePathBuf;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// An address the user knows to be code.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EntrySpec {
    address: CpuAddress,

    #[serde(default)]
    name: Option<String>,

    /// Accumulator is 16 bits wide on entry.
    #[serde(default)]
    m16: bool,

    /// Index registers are 16 bits wide on entry.
    #[serde(default)]
    x16: bool,
}

impl EntrySpec {
    pub fn new(address: CpuAddress) -> Self {
        EntrySpec {
            address,
            name: None,
            m16: false,
            x16: false,
        }
    }

    pub fn address(&self) -> CpuAddress {
        self.address
    }

    pub fn to_entry_point(&self) -> EntryPoint {
        let width = |wide| {
            if wide {
                RegisterWidth::Bits16
            } else {
                RegisterWidth::Bits8
            }
        };
        let entry = EntryPoint::new(self.address)
            .with_width(WidthState::new(width(self.m16), width(self.x16)));

        match &self.name {
            Some(name) => entry.named(name.clone()),
            None => entry,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    /// ROM image, relative to the project file.
    #[serde(default)]
    image: Option<RelativePathBuf>,

    #[serde(default)]
    mapping: Option<MappingMode>,

    /// Size of the copier header in front of the ROM data.
    #[serde(default)]
    header: Option<usize>,

    /// Whether to seed analysis from the interrupt vectors.
    #[serde(default)]
    vectors: Option<bool>,

    #[serde(default)]
    entries: Vec<EntrySpec>,

    #[serde(skip)]
    name: Option<String>,
}

impl Program {
    pub fn configure_app<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
        app.arg(
            Arg::with_name("image")
                .long("image")
                .value_name("game.sfc")
                .help("The ROM image file to analyze.")
                .takes_value(true)
                .set(ArgSettings::Global),
        )
        .arg(
            Arg::with_name("mapping")
                .long("mapping")
                .value_name("lorom|hirom")
                .help("How the ROM is mapped into the address space.")
                .takes_value(true)
                .set(ArgSettings::Global),
        )
        .arg(
            Arg::with_name("header")
                .long("header")
                .value_name("512")
                .help("Size of the copier header in front of the ROM data.")
                .takes_value(true)
                .set(ArgSettings::Global),
        )
        .arg(
            Arg::with_name("no_vectors")
                .long("no-vectors")
                .help("Do not start analysis from the interrupt vectors.")
                .set(ArgSettings::Global),
        )
    }

    /// Construct a Program from clap ArgMatches
    pub fn from_arg_matches(args: &ArgMatches) -> Result<Program, InputError> {
        let mapping = args
            .value_of("mapping")
            .map(|s| MappingMode::from_str(s).map_err(|_| InputError::BadMapping(s.to_string())))
            .transpose()?;
        let header = args.value_of("header").map(parse_offset).transpose()?;

        Ok(Program {
            image: args.value_of("image").map(RelativePathBuf::from),
            mapping,
            header,
            vectors: if args.is_present("no_vectors") {
                Some(false)
            } else {
                None
            },
            entries: Vec::new(),
            name: None,
        })
    }

    /// Where the image lives, resolving relative paths against `base`.
    pub fn image_path(&self, base: &Path) -> Option<PathBuf> {
        self.image.as_ref().map(|p| p.to_path(base))
    }

    pub fn set_image(&mut self, path: &str) {
        self.image = Some(RelativePathBuf::from(path));
    }

    pub fn mapping(&self) -> Option<MappingMode> {
        self.mapping
    }

    pub fn set_mapping(&mut self, mapping: MappingMode) {
        self.mapping = Some(mapping);
    }

    pub fn header(&self) -> usize {
        self.header.unwrap_or(0)
    }

    pub fn use_vectors(&self) -> bool {
        self.vectors.unwrap_or(true)
    }

    pub fn iter_entries(&self) -> impl Iterator<Item = &EntrySpec> {
        self.entries.iter()
    }

    pub fn add_entry(&mut self, entry: EntrySpec) {
        self.entries.push(entry);
    }

    pub fn as_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    /// Layer `other` on top of this program. Anything `other` specifies
    /// wins; entry points from both are kept.
    pub fn apply_override(&self, other: &Program) -> Program {
        Program {
            image: other.image.clone().or_else(|| self.image.clone()),
            mapping: other.mapping.or(self.mapping),
            header: other.header.or(self.header),
            vectors: other.vectors.or(self.vectors),
            entries: self
                .entries
                .iter()
                .chain(other.entries.iter())
                .cloned()
                .collect(),
            name: other.name.clone().or_else(|| self.name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_program() {
        let prog: Program = serde_json::from_str(
            r#"{
                "image": "roms/game.sfc",
                "mapping": "hirom",
                "header": 512,
                "entries": [
                    { "address": "$C0:1234", "name": "decompress", "m16": true }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(prog.mapping(), Some(MappingMode::HiROM));
        assert_eq!(prog.header(), 512);
        assert!(prog.use_vectors());
        assert_eq!(
            prog.image_path(Path::new("/work")),
            Some(PathBuf::from("/work/roms/game.sfc"))
        );

        let entry = prog.iter_entries().next().unwrap().to_entry_point();
        assert_eq!(entry.address(), CpuAddress::new(0xC0, 0x1234));
        assert_eq!(entry.name(), Some("decompress"));
        assert_eq!(
            entry.width(),
            WidthState::new(RegisterWidth::Bits16, RegisterWidth::Bits8)
        );
    }

    #[test]
    fn override_prefers_cli() {
        let mut file = Program::default();
        file.set_image("a.sfc");
        file.set_mapping(MappingMode::LoROM);
        file.add_entry(EntrySpec::new(CpuAddress::new(0, 0x8000)));

        let mut cli = Program::default();
        cli.set_mapping(MappingMode::HiROM);
        cli.add_entry(EntrySpec::new(CpuAddress::new(0, 0x9000)));

        let merged = file.apply_override(&cli);

        assert_eq!(merged.mapping(), Some(MappingMode::HiROM));
        assert_eq!(
            merged.image_path(Path::new("")),
            Some(PathBuf::from("a.sfc"))
        );
        assert_eq!(merged.iter_entries().count(), 2);
        assert_eq!(merged.header(), 0);
    }

    fn parse_args(argv: &[&str]) -> Result<Program, InputError> {
        let matches =
            Program::configure_app(App::new("sfcscan")).get_matches_from(argv.iter().copied());

        Program::from_arg_matches(&matches)
    }

    #[test]
    fn args_fill_program() {
        let prog = parse_args(&[
            "sfcscan",
            "--image",
            "game.sfc",
            "--mapping",
            "hirom",
            "--header",
            "0x200",
            "--no-vectors",
        ])
        .unwrap();

        assert_eq!(prog.mapping(), Some(MappingMode::HiROM));
        assert_eq!(prog.header(), 0x200);
        assert!(!prog.use_vectors());
        assert_eq!(
            prog.image_path(Path::new("")),
            Some(PathBuf::from("game.sfc"))
        );
    }

    #[test]
    fn bad_args_are_rejected() {
        assert_eq!(
            parse_args(&["sfcscan", "--header", "0x2OO"]).unwrap_err(),
            InputError::BadOffset("0x2OO".to_string())
        );
        assert_eq!(
            parse_args(&["sfcscan", "--mapping", "exhirom"]).unwrap_err(),
            InputError::BadMapping("exhirom".to_string())
        );
        assert_eq!(parse_args(&["sfcscan"]).unwrap(), Program::default());
    }
}
