use std::path::{Path, PathBuf};

use log::info;

use crate::{
    catalog::{read_descriptor, Catalog, CatalogError},
    metadata::{HeaderInfo, MetadataError, MetadataReader, PeMetadataReader},
    model::{manifest::Manifest, ModuleDescriptor, ModuleName},
    resolver::{Closure, ClosureResolver},
};

mod builder;

pub use builder::AssemblyClosureBuilder;

pub struct AssemblyClosure<R = PeMetadataReader> {
    reader: R,
    platform_directories: Vec<PathBuf>,
    module_extension: String,
    symbols_extension: String,
}

/// Everything a module declares: its own name and version, and what it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub header: HeaderInfo,
    pub references: Vec<ModuleName>,
}

impl AssemblyClosure {
    pub fn builder() -> AssemblyClosureBuilder {
        AssemblyClosureBuilder::default()
    }
}

impl<R: MetadataReader> AssemblyClosure<R> {
    /// Computes the modules `entry` needs, choosing platform modules over the
    /// given application `references`, followed by their debug symbols.
    ///
    /// Fails only if `entry` or one of `references` cannot be read, or a
    /// platform directory cannot be listed.
    pub fn resolve<P: AsRef<Path>>(
        &self,
        entry: &Path,
        references: &[P],
    ) -> Result<Closure, CatalogError> {
        let (_, closure) = self.resolve_entry(entry, references)?;
        Ok(closure)
    }

    /// Resolves the closure of `entry` and describes it as a startup manifest.
    pub fn manifest<P: AsRef<Path>>(
        &self,
        entry: &Path,
        references: &[P],
        linker_enabled: bool,
    ) -> Result<Manifest, CatalogError> {
        let (entry, closure) = self.resolve_entry(entry, references)?;
        Ok(Manifest::new(&entry, &closure, linker_enabled))
    }

    /// Reads the header and references of a single module.
    pub fn inspect(&self, path: &Path) -> Result<ModuleInfo, MetadataError> {
        Ok(ModuleInfo {
            header: self.reader.read_header(path)?,
            references: self.reader.read_references(path)?,
        })
    }

    pub fn platform_directories(&self) -> &[PathBuf] {
        &self.platform_directories
    }

    pub fn module_extension(&self) -> &str {
        &self.module_extension
    }

    pub fn symbols_extension(&self) -> &str {
        &self.symbols_extension
    }

    fn resolve_entry<P: AsRef<Path>>(
        &self,
        entry: &Path,
        references: &[P],
    ) -> Result<(ModuleDescriptor, Closure), CatalogError> {
        let entry = read_descriptor(&self.reader, entry)?;
        let application = Catalog::from_files(&self.reader, references)?;
        let platform = Catalog::from_directories(
            &self.reader,
            &self.platform_directories,
            &self.module_extension,
        )?;
        info!(
            "Resolving {} against {} platform and {} application modules",
            entry,
            platform.len(),
            application.len()
        );

        let closure = ClosureResolver::new(&self.reader, &entry, &platform, &application)
            .resolve_with_symbols(&self.symbols_extension);
        Ok((entry, closure))
    }
}
