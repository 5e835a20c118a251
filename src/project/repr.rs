//! Project configuration file representation

use crate::project::program::Program;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{fs, io};

/// In-memory representation of the current project configuration.
///
/// This file is typically read from a file named `sfcscan.json`, and it
/// lists every ROM image in the project along with how to analyze it.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Project {
    programs: BTreeMap<String, Program>,

    /// Directory image paths are resolved against.
    #[serde(skip)]
    base: PathBuf,
}

impl Project {
    pub fn read(filename: &str) -> io::Result<Self> {
        let project_file = fs::File::open(filename)?;
        let mut project: Self = serde_json::from_reader(project_file)?;

        for (name, prog) in project.programs.iter_mut() {
            if prog.as_name().is_none() {
                prog.set_name(name);
            }
        }

        project.base = Path::new(filename)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(project)
    }

    /// Read a project file, treating a missing file as an empty project.
    pub fn read_or_default(filename: &str) -> io::Result<Self> {
        match Self::read(filename) {
            Ok(project) => Ok(project),
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Get the program with the given name within the project.
    pub fn program(&self, name: &str) -> Option<&Program> {
        self.programs.get(name)
    }

    /// Get the project's default program: the first by name.
    pub fn default_program(&self) -> Option<(&String, &Program)> {
        self.programs.iter().next()
    }

    pub fn iter_programs(&self) -> impl Iterator<Item = (&str, &Program)> {
        self.programs.iter().map(|(k, v)| (k.as_str(), v))
    }
}
