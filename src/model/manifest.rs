use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{model::ModuleDescriptor, resolver::Closure};

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Startup manifest consumed by the runtime host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Declared name of the entry module.
    pub main: String,
    /// File names of every other file in the closure, in closure order.
    pub assembly_references: Vec<String>,
    pub linker_enabled: bool,
}

impl Manifest {
    pub fn new(entry: &ModuleDescriptor, closure: &Closure, linker_enabled: bool) -> Self {
        let assembly_references = closure
            .paths()
            .filter(|path| *path != entry.path())
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        Manifest {
            main: entry.name().to_string(),
            assembly_references,
            linker_enabled,
        }
    }

    pub fn from_file(file: &Path) -> Result<Manifest, ManifestError> {
        Manifest::from_str(&std::fs::read_to_string(file)?)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Manifest, ManifestError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, file: &Path) -> Result<(), ManifestError> {
        std::fs::write(file, self.to_json()?)?;
        Ok(())
    }
}
