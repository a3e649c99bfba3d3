pub mod manifest;

use std::{
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Logical name of a module as declared in its metadata.
///
/// This is usually, but not necessarily, the file stem of the module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleName(String);

impl ModuleName {
    pub fn new(s: String) -> Self {
        ModuleName(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ModuleName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ModuleName {
    fn from(s: String) -> Self {
        ModuleName(s)
    }
}

impl From<&str> for ModuleName {
    fn from(s: &str) -> Self {
        ModuleName(s.to_string())
    }
}

/// Four part version of a module, as stored in the Assembly and AssemblyRef tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct ModuleVersion {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
    pub revision: u16,
}

impl ModuleVersion {
    pub fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        ModuleVersion {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl Display for ModuleVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// A module known by its declared name and the file it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleDescriptor {
    name: ModuleName,
    path: PathBuf,
}

impl ModuleDescriptor {
    pub fn new(name: ModuleName, path: PathBuf) -> Self {
        ModuleDescriptor { name, path }
    }

    pub fn name(&self) -> &ModuleName {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

impl Display for ModuleDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.path.display())
    }
}
