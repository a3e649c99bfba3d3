//! The metadata root and its stream headers (ECMA-335 II.24.2.1).

use log::trace;

use super::{
    bytes::{read_cstr, read_u16, read_u32, slice},
    MetadataError,
};

const METADATA_SIGNATURE: u32 = 0x424a_5342;

pub(super) struct MetadataRoot<'a> {
    pub version: &'a str,
    pub tables: &'a [u8],
    pub strings: &'a [u8],
}

impl<'a> MetadataRoot<'a> {
    pub fn parse(metadata: &'a [u8]) -> Result<Self, MetadataError> {
        if read_u32(metadata, 0)? != METADATA_SIGNATURE {
            return Err(MetadataError::Malformed(
                "missing metadata root signature".to_string(),
            ));
        }
        let version_length = read_u32(metadata, 12)? as usize;
        let version = read_cstr(slice(metadata, 16, version_length)?, 0).unwrap_or_default();

        let mut offset = 16 + version_length;
        let stream_count = read_u16(metadata, offset + 2)?;
        offset += 4;

        let mut tables = None;
        let mut strings = None;
        for _ in 0..stream_count {
            let stream_offset = read_u32(metadata, offset)? as usize;
            let stream_size = read_u32(metadata, offset + 4)? as usize;
            let name = read_cstr(metadata, offset + 8)?;
            trace!("Metadata stream {name} at {stream_offset:#x}, {stream_size} bytes");

            let data = slice(metadata, stream_offset, stream_size)?;
            match name {
                "#~" | "#-" => tables = Some(data),
                "#Strings" => strings = Some(data),
                _ => {}
            }
            // The name is NUL terminated and padded to a four byte boundary.
            offset += 8 + (name.len() + 4) / 4 * 4;
        }

        Ok(MetadataRoot {
            version,
            tables: tables
                .ok_or_else(|| MetadataError::Malformed("missing table stream".to_string()))?,
            strings: strings
                .ok_or_else(|| MetadataError::Malformed("missing strings heap".to_string()))?,
        })
    }
}
