//! Writes small but well-formed managed PE images for tests.

use std::path::Path;

use crate::model::ModuleVersion;

use super::tables::{ASSEMBLY, ASSEMBLY_REF, MODULE, TYPE_REF};

const FILE_ALIGNMENT: usize = 0x200;
const SECTION_RVA: u32 = 0x2000;
const PE_OFFSET: usize = 0x80;
const CLI_HEADER_SIZE: usize = 72;
const METADATA_VERSION: &[u8] = b"v4.0.30319\0\0";

pub(crate) struct ImageWriter {
    name: String,
    version: ModuleVersion,
    references: Vec<String>,
    managed: bool,
    assembly: bool,
    pe32_plus: bool,
    wide_heaps: bool,
    type_refs: u32,
}

impl ImageWriter {
    pub fn new(name: &str) -> Self {
        ImageWriter {
            name: name.to_string(),
            version: ModuleVersion::new(1, 0, 0, 0),
            references: vec![],
            managed: true,
            assembly: true,
            pe32_plus: false,
            wide_heaps: false,
            type_refs: 0,
        }
    }

    /// An image without a CLI header, like a native library.
    pub fn native() -> Self {
        ImageWriter {
            managed: false,
            ..Self::new("")
        }
    }

    pub fn version(mut self, version: ModuleVersion) -> Self {
        self.version = version;
        self
    }

    pub fn reference(mut self, name: &str) -> Self {
        self.references.push(name.to_string());
        self
    }

    pub fn references(self, names: &[&str]) -> Self {
        names.iter().fold(self, |writer, name| writer.reference(name))
    }

    pub fn pe32_plus(mut self, pe32_plus: bool) -> Self {
        self.pe32_plus = pe32_plus;
        self
    }

    pub fn wide_heaps(mut self, wide_heaps: bool) -> Self {
        self.wide_heaps = wide_heaps;
        self
    }

    /// Adds rows to the TypeRef table, which precedes the Assembly tables.
    pub fn type_refs(mut self, count: u32) -> Self {
        self.type_refs = count;
        self
    }

    pub fn without_assembly(mut self) -> Self {
        self.assembly = false;
        self
    }

    pub fn write(&self, path: &Path) {
        std::fs::write(path, self.build()).unwrap();
    }

    pub fn build(&self) -> Vec<u8> {
        let text = if self.managed {
            self.cli_section()
        } else {
            vec![0xc3; 16]
        };
        self.image(text)
    }

    fn image(&self, text: Vec<u8>) -> Vec<u8> {
        let (magic, machine, optional_header_size, count_offset, directories_offset) =
            if self.pe32_plus {
                (0x20b, 0x8664, 240, 108, 112)
            } else {
                (0x10b, 0x14c, 224, 92, 96)
            };

        let mut image = vec![0u8; FILE_ALIGNMENT];
        image[..2].copy_from_slice(b"MZ");
        put_u32(&mut image, 0x3c, PE_OFFSET as u32);
        image[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");

        let coff = PE_OFFSET + 4;
        put_u16(&mut image, coff, machine);
        put_u16(&mut image, coff + 2, 1);
        put_u16(&mut image, coff + 16, optional_header_size as u16);
        put_u16(&mut image, coff + 18, 0x2102);

        let optional = coff + 20;
        put_u16(&mut image, optional, magic);
        put_u32(&mut image, optional + count_offset, 16);
        if self.managed {
            let cli = optional + directories_offset + 14 * 8;
            put_u32(&mut image, cli, SECTION_RVA);
            put_u32(&mut image, cli + 4, CLI_HEADER_SIZE as u32);
        }

        let section = optional + optional_header_size;
        let raw_size = text.len().div_ceil(FILE_ALIGNMENT) * FILE_ALIGNMENT;
        image[section..section + 5].copy_from_slice(b".text");
        put_u32(&mut image, section + 8, text.len() as u32);
        put_u32(&mut image, section + 12, SECTION_RVA);
        put_u32(&mut image, section + 16, raw_size as u32);
        put_u32(&mut image, section + 20, FILE_ALIGNMENT as u32);

        image.extend_from_slice(&text);
        image.resize(FILE_ALIGNMENT + raw_size, 0);
        image
    }

    fn cli_section(&self) -> Vec<u8> {
        let metadata = self.metadata();
        let mut text = vec![0u8; CLI_HEADER_SIZE];
        put_u32(&mut text, 0, CLI_HEADER_SIZE as u32);
        put_u16(&mut text, 4, 2);
        put_u16(&mut text, 6, 5);
        put_u32(&mut text, 8, SECTION_RVA + CLI_HEADER_SIZE as u32);
        put_u32(&mut text, 12, metadata.len() as u32);
        put_u32(&mut text, 16, 1);
        text.extend_from_slice(&metadata);
        text
    }

    fn metadata(&self) -> Vec<u8> {
        let mut strings = vec![0u8];
        let tables = self.tables(&mut strings);
        let strings = padded(strings);
        let streams: [(&[u8], &[u8]); 2] =
            [(b"#~\0\0", &tables), (b"#Strings\0\0\0\0", &strings)];

        let mut metadata = Vec::new();
        push_u32(&mut metadata, 0x424a_5342);
        push_u16(&mut metadata, 1);
        push_u16(&mut metadata, 1);
        push_u32(&mut metadata, 0);
        push_u32(&mut metadata, METADATA_VERSION.len() as u32);
        metadata.extend_from_slice(METADATA_VERSION);
        push_u16(&mut metadata, 0);
        push_u16(&mut metadata, streams.len() as u16);

        let headers_size: usize = streams.iter().map(|(name, _)| 8 + name.len()).sum();
        let mut offset = metadata.len() + headers_size;
        for (name, data) in &streams {
            push_u32(&mut metadata, offset as u32);
            push_u32(&mut metadata, data.len() as u32);
            metadata.extend_from_slice(name);
            offset += data.len();
        }
        for (_, data) in &streams {
            metadata.extend_from_slice(data);
        }
        metadata
    }

    fn tables(&self, strings: &mut Vec<u8>) -> Vec<u8> {
        let mut present = vec![(MODULE, 1u32)];
        if self.type_refs > 0 {
            present.push((TYPE_REF, self.type_refs));
        }
        if self.assembly {
            present.push((ASSEMBLY, 1));
        }
        if !self.references.is_empty() {
            present.push((ASSEMBLY_REF, self.references.len() as u32));
        }

        let heap_sizes = if self.wide_heaps { 0x07 } else { 0x00 };
        let valid = present
            .iter()
            .fold(0u64, |valid, (table, _)| valid | (1u64 << table));
        let mut data = vec![0, 0, 0, 0, 2, 0, heap_sizes, 1];
        data.extend_from_slice(&valid.to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes());
        for (_, rows) in &present {
            data.extend_from_slice(&rows.to_le_bytes());
        }

        // Module
        push_u16(&mut data, 0);
        let module_name = intern(strings, &format!("{}.dll", self.name));
        self.heap_index(&mut data, module_name);
        for _ in 0..3 {
            self.heap_index(&mut data, 0);
        }

        for index in 0..self.type_refs {
            push_u16(&mut data, 0x04);
            let type_name = intern(strings, &format!("Type{index}"));
            self.heap_index(&mut data, type_name);
            self.heap_index(&mut data, 0);
        }

        if self.assembly {
            push_u32(&mut data, 0x8004);
            push_u16(&mut data, self.version.major);
            push_u16(&mut data, self.version.minor);
            push_u16(&mut data, self.version.build);
            push_u16(&mut data, self.version.revision);
            push_u32(&mut data, 0);
            self.heap_index(&mut data, 0);
            let name = intern(strings, &self.name);
            self.heap_index(&mut data, name);
            self.heap_index(&mut data, 0);
        }

        for reference in &self.references {
            for part in [1, 0, 0, 0] {
                push_u16(&mut data, part);
            }
            push_u32(&mut data, 0);
            self.heap_index(&mut data, 0);
            let name = intern(strings, reference);
            self.heap_index(&mut data, name);
            self.heap_index(&mut data, 0);
            self.heap_index(&mut data, 0);
        }

        padded(data)
    }

    fn heap_index(&self, data: &mut Vec<u8>, index: u32) {
        if self.wide_heaps {
            push_u32(data, index);
        } else {
            push_u16(data, index as u16);
        }
    }
}

fn intern(strings: &mut Vec<u8>, value: &str) -> u32 {
    let index = strings.len() as u32;
    strings.extend_from_slice(value.as_bytes());
    strings.push(0);
    index
}

fn padded(mut data: Vec<u8>) -> Vec<u8> {
    data.resize(data.len().div_ceil(4) * 4, 0);
    data
}

fn push_u16(data: &mut Vec<u8>, value: u16) {
    data.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(data: &mut Vec<u8>, value: u32) {
    data.extend_from_slice(&value.to_le_bytes());
}

fn put_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
