use std::{error::Error, path::PathBuf};

use crate::{
    metadata::{MetadataReader, PeMetadataReader},
    AssemblyClosure,
};

const DEFAULT_MODULE_EXTENSION: &str = "dll";
const DEFAULT_SYMBOLS_EXTENSION: &str = "pdb";

#[derive(Default)]
pub struct AssemblyClosureBuilder {
    platform_directories: Vec<PathBuf>,
    module_extension: Option<String>,
    symbols_extension: Option<String>,
}

impl AssemblyClosureBuilder {
    /// Adds a directory whose modules make up the platform catalog.
    ///
    /// Directories are searched in the order they are added.
    pub fn platform_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.platform_directories.push(path.into());
        self
    }

    pub fn platform_directories<I, P>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        paths
            .into_iter()
            .fold(self, |builder, path| builder.platform_directory(path))
    }

    /// Extension of module files picked up from platform directories.
    ///
    /// Defaults to `dll`.
    pub fn module_extension(mut self, extension: impl Into<String>) -> Self {
        self.module_extension = Some(extension.into());
        self
    }

    /// Extension of debug-symbol files looked up next to resolved modules.
    ///
    /// Defaults to `pdb`.
    pub fn symbols_extension(mut self, extension: impl Into<String>) -> Self {
        self.symbols_extension = Some(extension.into());
        self
    }

    pub fn try_build(self) -> Result<AssemblyClosure, Box<dyn Error>> {
        self.try_build_with_reader(PeMetadataReader)
    }

    /// Builds with a different metadata reader, for other container formats.
    pub fn try_build_with_reader<R: MetadataReader>(
        self,
        reader: R,
    ) -> Result<AssemblyClosure<R>, Box<dyn Error>> {
        let Self {
            platform_directories,
            module_extension,
            symbols_extension,
        } = self;

        let module_extension = normalize_extension(
            module_extension.as_deref().unwrap_or(DEFAULT_MODULE_EXTENSION),
        )?;
        let symbols_extension = normalize_extension(
            symbols_extension
                .as_deref()
                .unwrap_or(DEFAULT_SYMBOLS_EXTENSION),
        )?;
        if module_extension.eq_ignore_ascii_case(&symbols_extension) {
            return Err(format!(
                "Module and symbols extensions must differ, both are `{module_extension}`"
            )
            .into());
        }

        Ok(AssemblyClosure {
            reader,
            platform_directories,
            module_extension,
            symbols_extension,
        })
    }
}

/// Accepts `dll` as well as `.dll`.
fn normalize_extension(extension: &str) -> Result<String, Box<dyn Error>> {
    let extension = extension.trim().trim_start_matches('.');
    if extension.is_empty() || extension.contains(['/', '\\', '.']) {
        return Err(format!("Invalid file extension `{extension}`").into());
    }
    Ok(extension.to_string())
}
