//! Reading module names and references out of managed PE images.

mod bytes;
mod pe;
mod root;
mod tables;

#[cfg(test)]
pub(crate) mod image_writer;

use std::path::Path;

use log::trace;
use thiserror::Error;

use crate::model::{ModuleName, ModuleVersion};

use self::{pe::PeImage, root::MetadataRoot, tables::TableStream};

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Not a PE image: {0}")]
    NotAnImage(&'static str),
    #[error("Image has no CLI header")]
    NoCliHeader,
    #[error("Metadata does not define an assembly")]
    NoAssembly,
    #[error("Malformed metadata: {0}")]
    Malformed(String),
    #[error("Read of {len} bytes at offset {offset} is out of bounds")]
    OutOfBounds { offset: usize, len: usize },
}

/// What a module declares about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    pub name: ModuleName,
    pub version: ModuleVersion,
}

/// Capability to introspect a module file.
///
/// Both operations open, read and close the file within the call.
pub trait MetadataReader {
    /// Reads the declared name of the module at `path`.
    fn read_header(&self, path: &Path) -> Result<HeaderInfo, MetadataError>;

    /// Reads the names of the modules referenced by the module at `path`, in
    /// declaration order.
    fn read_references(&self, path: &Path) -> Result<Vec<ModuleName>, MetadataError>;
}

impl<R: MetadataReader + ?Sized> MetadataReader for &R {
    fn read_header(&self, path: &Path) -> Result<HeaderInfo, MetadataError> {
        (**self).read_header(path)
    }

    fn read_references(&self, path: &Path) -> Result<Vec<ModuleName>, MetadataError> {
        (**self).read_references(path)
    }
}

/// Reads ECMA-335 metadata from PE32 and PE32+ images.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeMetadataReader;

impl MetadataReader for PeMetadataReader {
    fn read_header(&self, path: &Path) -> Result<HeaderInfo, MetadataError> {
        let image = std::fs::read(path)?;
        AssemblyMetadata::parse(&image)?.header()
    }

    fn read_references(&self, path: &Path) -> Result<Vec<ModuleName>, MetadataError> {
        let image = std::fs::read(path)?;
        AssemblyMetadata::parse(&image)?.references()
    }
}

const ASSEMBLY_VERSION_COLUMN: usize = 1;
const ASSEMBLY_NAME_COLUMN: usize = 7;
const ASSEMBLY_REF_NAME_COLUMN: usize = 6;

struct AssemblyMetadata<'a> {
    tables: TableStream<'a>,
    strings: &'a [u8],
}

impl<'a> AssemblyMetadata<'a> {
    fn parse(image: &'a [u8]) -> Result<Self, MetadataError> {
        let metadata = PeImage::parse(image)?.cli_metadata()?;
        let root = MetadataRoot::parse(metadata)?;
        trace!("Metadata version {}", root.version);
        Ok(AssemblyMetadata {
            tables: TableStream::parse(root.tables)?,
            strings: root.strings,
        })
    }

    fn header(&self) -> Result<HeaderInfo, MetadataError> {
        if self.tables.row_count(tables::ASSEMBLY) == 0 {
            return Err(MetadataError::NoAssembly);
        }
        let row = self.tables.row(tables::ASSEMBLY, 0)?;
        Ok(HeaderInfo {
            name: ModuleName::new(self.string(row[ASSEMBLY_NAME_COLUMN])?.to_string()),
            version: version(&row[ASSEMBLY_VERSION_COLUMN..ASSEMBLY_VERSION_COLUMN + 4]),
        })
    }

    fn references(&self) -> Result<Vec<ModuleName>, MetadataError> {
        (0..self.tables.row_count(tables::ASSEMBLY_REF))
            .map(|index| -> Result<ModuleName, MetadataError> {
                let row = self.tables.row(tables::ASSEMBLY_REF, index)?;
                Ok(ModuleName::new(
                    self.string(row[ASSEMBLY_REF_NAME_COLUMN])?.to_string(),
                ))
            })
            .collect()
    }

    fn string(&self, index: u32) -> Result<&'a str, MetadataError> {
        bytes::read_cstr(self.strings, index as usize)
    }
}

fn version(parts: &[u32]) -> ModuleVersion {
    let part = |index: usize| parts.get(index).copied().unwrap_or(0) as u16;
    ModuleVersion::new(part(0), part(1), part(2), part(3))
}
