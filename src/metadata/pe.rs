//! PE/COFF container parsing, just enough to locate the CLI metadata.

use log::trace;

use super::{
    bytes::{read_u16, read_u32, slice},
    MetadataError,
};

const DOS_SIGNATURE: &[u8] = b"MZ";
const PE_SIGNATURE: &[u8] = b"PE\0\0";
const LFANEW_OFFSET: usize = 0x3c;
const COFF_HEADER_SIZE: usize = 20;
const SECTION_HEADER_SIZE: usize = 40;
const DATA_DIRECTORY_SIZE: usize = 8;

const PE32_MAGIC: u16 = 0x10b;
const PE32_PLUS_MAGIC: u16 = 0x20b;

const CLI_HEADER_DIRECTORY: usize = 14;
// Offset of the metadata data directory inside the CLI header.
const CLI_METADATA_DIRECTORY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DataDirectory {
    rva: u32,
    size: u32,
}

#[derive(Debug, Clone, Copy)]
struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_size: u32,
    raw_pointer: u32,
}

impl Section {
    fn contains(&self, rva: u32) -> bool {
        let extent = self.virtual_size.max(self.raw_size);
        rva >= self.virtual_address && rva - self.virtual_address < extent
    }
}

/// A parsed PE image borrowing the file contents.
pub(super) struct PeImage<'a> {
    bytes: &'a [u8],
    sections: Vec<Section>,
    cli_header: Option<DataDirectory>,
}

impl<'a> PeImage<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, MetadataError> {
        if bytes.get(..DOS_SIGNATURE.len()) != Some(DOS_SIGNATURE) {
            return Err(MetadataError::NotAnImage("missing DOS signature"));
        }
        let pe_offset = read_u32(bytes, LFANEW_OFFSET)? as usize;
        if slice(bytes, pe_offset, PE_SIGNATURE.len()).ok() != Some(PE_SIGNATURE) {
            return Err(MetadataError::NotAnImage("missing PE signature"));
        }

        let coff = pe_offset + PE_SIGNATURE.len();
        let number_of_sections = read_u16(bytes, coff + 2)?;
        let optional_header_size = read_u16(bytes, coff + 16)? as usize;

        let optional_header = coff + COFF_HEADER_SIZE;
        let (count_offset, directories_offset) = match read_u16(bytes, optional_header)? {
            PE32_MAGIC => (92, 96),
            PE32_PLUS_MAGIC => (108, 112),
            _ => return Err(MetadataError::NotAnImage("unknown optional header magic")),
        };

        let directory_count = read_u32(bytes, optional_header + count_offset)? as usize;
        let cli_directory_offset = directories_offset + CLI_HEADER_DIRECTORY * DATA_DIRECTORY_SIZE;
        let cli_header = if directory_count > CLI_HEADER_DIRECTORY
            && cli_directory_offset + DATA_DIRECTORY_SIZE <= optional_header_size
        {
            let at = optional_header + cli_directory_offset;
            Some(DataDirectory {
                rva: read_u32(bytes, at)?,
                size: read_u32(bytes, at + 4)?,
            })
        } else {
            None
        };

        let section_table = optional_header + optional_header_size;
        let sections = (0..number_of_sections as usize)
            .map(|index| {
                let at = section_table + index * SECTION_HEADER_SIZE;
                Ok(Section {
                    virtual_size: read_u32(bytes, at + 8)?,
                    virtual_address: read_u32(bytes, at + 12)?,
                    raw_size: read_u32(bytes, at + 16)?,
                    raw_pointer: read_u32(bytes, at + 20)?,
                })
            })
            .collect::<Result<Vec<_>, MetadataError>>()?;

        trace!(
            "PE image with {} sections, CLI header {:?}",
            sections.len(),
            cli_header
        );

        Ok(PeImage {
            bytes,
            sections,
            cli_header,
        })
    }

    pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        self.sections
            .iter()
            .find(|section| section.contains(rva))
            .map(|section| (rva - section.virtual_address) as usize + section.raw_pointer as usize)
    }

    /// Returns the raw CLI metadata blob, starting at the metadata root.
    pub fn cli_metadata(&self) -> Result<&'a [u8], MetadataError> {
        let cli_header = self
            .cli_header
            .filter(|directory| directory.rva != 0)
            .ok_or(MetadataError::NoCliHeader)?;
        let header = self.read_directory(cli_header)?;
        let metadata = DataDirectory {
            rva: read_u32(header, CLI_METADATA_DIRECTORY)?,
            size: read_u32(header, CLI_METADATA_DIRECTORY + 4)?,
        };
        if metadata.rva == 0 {
            return Err(MetadataError::NoCliHeader);
        }
        self.read_directory(metadata)
    }

    fn read_directory(&self, directory: DataDirectory) -> Result<&'a [u8], MetadataError> {
        let offset = self.rva_to_offset(directory.rva).ok_or_else(|| {
            MetadataError::Malformed(format!(
                "RVA {:#x} is not covered by any section",
                directory.rva
            ))
        })?;
        slice(self.bytes, offset, directory.size as usize)
    }
}
