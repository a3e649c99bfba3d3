//! Bounds-checked little-endian reads over an in-memory image.

use super::MetadataError;

pub(super) fn slice(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], MetadataError> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(MetadataError::OutOfBounds { offset, len })
}

pub(super) fn read_u8(bytes: &[u8], offset: usize) -> Result<u8, MetadataError> {
    bytes
        .get(offset)
        .copied()
        .ok_or(MetadataError::OutOfBounds { offset, len: 1 })
}

pub(super) fn read_u16(bytes: &[u8], offset: usize) -> Result<u16, MetadataError> {
    let mut buf = [0u8; 2];
    buf.copy_from_slice(slice(bytes, offset, 2)?);
    Ok(u16::from_le_bytes(buf))
}

pub(super) fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, MetadataError> {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(slice(bytes, offset, 4)?);
    Ok(u32::from_le_bytes(buf))
}

pub(super) fn read_u64(bytes: &[u8], offset: usize) -> Result<u64, MetadataError> {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(slice(bytes, offset, 8)?);
    Ok(u64::from_le_bytes(buf))
}

/// Reads a NUL terminated UTF-8 string starting at `offset`.
pub(super) fn read_cstr(bytes: &[u8], offset: usize) -> Result<&str, MetadataError> {
    let tail = bytes
        .get(offset..)
        .ok_or(MetadataError::OutOfBounds { offset, len: 1 })?;
    let end = tail.iter().position(|b| *b == 0).ok_or_else(|| {
        MetadataError::Malformed(format!("unterminated string at offset {offset}"))
    })?;
    std::str::from_utf8(&tail[..end])
        .map_err(|err| MetadataError::Malformed(format!("invalid string at offset {offset}: {err}")))
}
