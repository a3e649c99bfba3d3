use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use log::{debug, trace};
use thiserror::Error;

use crate::{
    metadata::{MetadataError, MetadataReader},
    model::{ModuleDescriptor, ModuleName},
};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Unreadable input module {}: {source}", .path.display())]
    UnreadableModule {
        path: PathBuf,
        source: MetadataError,
    },
    #[error("Cannot list module directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// An ordered set of candidate modules, one per distinct input path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    modules: Vec<ModuleDescriptor>,
}

impl Catalog {
    /// Reads the declared name of every file in `paths`, keeping input order.
    pub fn from_files<R, I, P>(reader: &R, paths: I) -> Result<Catalog, CatalogError>
    where
        R: MetadataReader,
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut seen = HashSet::new();
        let mut modules = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if !seen.insert(path.to_path_buf()) {
                trace!("Skipping duplicate module path {}", path.display());
                continue;
            }
            modules.push(read_descriptor(reader, path)?);
        }
        Ok(Catalog { modules })
    }

    /// Collects every readable module directly inside `directories` whose
    /// extension is `extension`. Directories are not searched recursively and
    /// files that are not managed modules are skipped.
    pub fn from_directories<R, I, P>(
        reader: &R,
        directories: I,
        extension: &str,
    ) -> Result<Catalog, CatalogError>
    where
        R: MetadataReader,
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut seen = HashSet::new();
        let mut modules = Vec::new();
        for directory in directories {
            for path in find_module_files(directory.as_ref(), extension)? {
                if !seen.insert(path.clone()) {
                    continue;
                }
                // Platform directories also ship native libraries under the same extension.
                match read_descriptor(reader, &path) {
                    Ok(module) => modules.push(module),
                    Err(err) => debug!("Skipping platform file: {err}"),
                }
            }
        }
        Ok(Catalog { modules })
    }

    /// First module declaring `name`, if any.
    pub fn find(&self, name: &ModuleName) -> Option<&ModuleDescriptor> {
        self.modules.iter().find(|module| module.name() == name)
    }

    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl From<Vec<ModuleDescriptor>> for Catalog {
    fn from(modules: Vec<ModuleDescriptor>) -> Self {
        Catalog { modules }
    }
}

/// Builds a descriptor from the name the module declares, not its file name.
pub fn read_descriptor<R: MetadataReader>(
    reader: &R,
    path: &Path,
) -> Result<ModuleDescriptor, CatalogError> {
    let header = reader
        .read_header(path)
        .map_err(|source| CatalogError::UnreadableModule {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(
        "Read module {} {} from {}",
        header.name,
        header.version,
        path.display()
    );
    Ok(ModuleDescriptor::new(header.name, path.to_path_buf()))
}

fn find_module_files(directory: &Path, extension: &str) -> Result<Vec<PathBuf>, CatalogError> {
    let io_error = |source: std::io::Error| CatalogError::Directory {
        path: directory.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        let matches_extension = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension));
        if matches_extension && path.is_file() {
            files.push(path);
        }
    }
    // Directory order is filesystem dependent.
    files.sort();
    debug!(
        "Found {} module files in {}",
        files.len(),
        directory.display()
    );
    Ok(files)
}
