//! The `#~` metadata table stream (ECMA-335 II.24.2.6).
//!
//! Rows are variable width: heap indexes, table indexes and coded indexes are
//! two or four bytes depending on heap sizes and row counts. To reach a table
//! every preceding table's row width has to be known, so the column schemas of
//! all tables up to `AssemblyRef` are listed here.

use super::{
    bytes::{read_u16, read_u32, read_u64, read_u8},
    MetadataError,
};

pub(super) const MODULE: usize = 0x00;
pub(super) const TYPE_REF: usize = 0x01;
pub(super) const TYPE_DEF: usize = 0x02;
pub(super) const FIELD_PTR: usize = 0x03;
pub(super) const FIELD: usize = 0x04;
pub(super) const METHOD_PTR: usize = 0x05;
pub(super) const METHOD_DEF: usize = 0x06;
pub(super) const PARAM_PTR: usize = 0x07;
pub(super) const PARAM: usize = 0x08;
pub(super) const INTERFACE_IMPL: usize = 0x09;
pub(super) const MEMBER_REF: usize = 0x0a;
pub(super) const CONSTANT: usize = 0x0b;
pub(super) const CUSTOM_ATTRIBUTE: usize = 0x0c;
pub(super) const FIELD_MARSHAL: usize = 0x0d;
pub(super) const DECL_SECURITY: usize = 0x0e;
pub(super) const CLASS_LAYOUT: usize = 0x0f;
pub(super) const FIELD_LAYOUT: usize = 0x10;
pub(super) const STAND_ALONE_SIG: usize = 0x11;
pub(super) const EVENT_MAP: usize = 0x12;
pub(super) const EVENT_PTR: usize = 0x13;
pub(super) const EVENT: usize = 0x14;
pub(super) const PROPERTY_MAP: usize = 0x15;
pub(super) const PROPERTY_PTR: usize = 0x16;
pub(super) const PROPERTY: usize = 0x17;
pub(super) const METHOD_SEMANTICS: usize = 0x18;
pub(super) const METHOD_IMPL: usize = 0x19;
pub(super) const MODULE_REF: usize = 0x1a;
pub(super) const TYPE_SPEC: usize = 0x1b;
pub(super) const IMPL_MAP: usize = 0x1c;
pub(super) const FIELD_RVA: usize = 0x1d;
pub(super) const ENC_LOG: usize = 0x1e;
pub(super) const ENC_MAP: usize = 0x1f;
pub(super) const ASSEMBLY: usize = 0x20;
pub(super) const ASSEMBLY_PROCESSOR: usize = 0x21;
pub(super) const ASSEMBLY_OS: usize = 0x22;
pub(super) const ASSEMBLY_REF: usize = 0x23;
const FILE: usize = 0x26;
const EXPORTED_TYPE: usize = 0x27;
const MANIFEST_RESOURCE: usize = 0x28;
const GENERIC_PARAM: usize = 0x2a;
const METHOD_SPEC: usize = 0x2b;
const GENERIC_PARAM_CONSTRAINT: usize = 0x2c;

const TABLE_COUNT: usize = 64;
// Placeholder for tag values that do not map to a table.
const NOT_USED: usize = TABLE_COUNT;

const HEAP_STRINGS_WIDE: u8 = 0x01;
const HEAP_GUID_WIDE: u8 = 0x02;
const HEAP_BLOB_WIDE: u8 = 0x04;
const EXTRA_DATA: u8 = 0x40;

#[derive(Debug, Clone, Copy)]
enum Column {
    Fixed(usize),
    StringIndex,
    GuidIndex,
    BlobIndex,
    TableIndex(usize),
    CodedIndex(&'static [usize]),
}

use Column::{BlobIndex, CodedIndex, Fixed, GuidIndex, StringIndex, TableIndex};

const TYPE_DEF_OR_REF: &[usize] = &[TYPE_DEF, TYPE_REF, TYPE_SPEC];
const HAS_CONSTANT: &[usize] = &[FIELD, PARAM, PROPERTY];
const HAS_CUSTOM_ATTRIBUTE: &[usize] = &[
    METHOD_DEF,
    FIELD,
    TYPE_REF,
    TYPE_DEF,
    PARAM,
    INTERFACE_IMPL,
    MEMBER_REF,
    MODULE,
    DECL_SECURITY,
    PROPERTY,
    EVENT,
    STAND_ALONE_SIG,
    MODULE_REF,
    TYPE_SPEC,
    ASSEMBLY,
    ASSEMBLY_REF,
    FILE,
    EXPORTED_TYPE,
    MANIFEST_RESOURCE,
    GENERIC_PARAM,
    GENERIC_PARAM_CONSTRAINT,
    METHOD_SPEC,
];
const HAS_FIELD_MARSHAL: &[usize] = &[FIELD, PARAM];
const HAS_DECL_SECURITY: &[usize] = &[TYPE_DEF, METHOD_DEF, ASSEMBLY];
const MEMBER_REF_PARENT: &[usize] = &[TYPE_DEF, TYPE_REF, MODULE_REF, METHOD_DEF, TYPE_SPEC];
const HAS_SEMANTICS: &[usize] = &[EVENT, PROPERTY];
const METHOD_DEF_OR_REF: &[usize] = &[METHOD_DEF, MEMBER_REF];
const MEMBER_FORWARDED: &[usize] = &[FIELD, METHOD_DEF];
const CUSTOM_ATTRIBUTE_TYPE: &[usize] = &[NOT_USED, NOT_USED, METHOD_DEF, MEMBER_REF, NOT_USED];
const RESOLUTION_SCOPE: &[usize] = &[MODULE, MODULE_REF, ASSEMBLY_REF, TYPE_REF];

/// Column layout of the tables preceding and including `AssemblyRef`.
fn columns(table: usize) -> Option<&'static [Column]> {
    const MODULE_COLUMNS: &[Column] = &[Fixed(2), StringIndex, GuidIndex, GuidIndex, GuidIndex];
    const TYPE_REF_COLUMNS: &[Column] = &[CodedIndex(RESOLUTION_SCOPE), StringIndex, StringIndex];
    const TYPE_DEF_COLUMNS: &[Column] = &[
        Fixed(4),
        StringIndex,
        StringIndex,
        CodedIndex(TYPE_DEF_OR_REF),
        TableIndex(FIELD),
        TableIndex(METHOD_DEF),
    ];
    const FIELD_PTR_COLUMNS: &[Column] = &[TableIndex(FIELD)];
    const FIELD_COLUMNS: &[Column] = &[Fixed(2), StringIndex, BlobIndex];
    const METHOD_PTR_COLUMNS: &[Column] = &[TableIndex(METHOD_DEF)];
    const METHOD_DEF_COLUMNS: &[Column] =
        &[Fixed(4), Fixed(2), Fixed(2), StringIndex, BlobIndex, TableIndex(PARAM)];
    const PARAM_PTR_COLUMNS: &[Column] = &[TableIndex(PARAM)];
    const PARAM_COLUMNS: &[Column] = &[Fixed(2), Fixed(2), StringIndex];
    const INTERFACE_IMPL_COLUMNS: &[Column] = &[TableIndex(TYPE_DEF), CodedIndex(TYPE_DEF_OR_REF)];
    const MEMBER_REF_COLUMNS: &[Column] = &[CodedIndex(MEMBER_REF_PARENT), StringIndex, BlobIndex];
    // Type is a single byte followed by a padding byte.
    const CONSTANT_COLUMNS: &[Column] = &[Fixed(2), CodedIndex(HAS_CONSTANT), BlobIndex];
    const CUSTOM_ATTRIBUTE_COLUMNS: &[Column] = &[
        CodedIndex(HAS_CUSTOM_ATTRIBUTE),
        CodedIndex(CUSTOM_ATTRIBUTE_TYPE),
        BlobIndex,
    ];
    const FIELD_MARSHAL_COLUMNS: &[Column] = &[CodedIndex(HAS_FIELD_MARSHAL), BlobIndex];
    const DECL_SECURITY_COLUMNS: &[Column] = &[Fixed(2), CodedIndex(HAS_DECL_SECURITY), BlobIndex];
    const CLASS_LAYOUT_COLUMNS: &[Column] = &[Fixed(2), Fixed(4), TableIndex(TYPE_DEF)];
    const FIELD_LAYOUT_COLUMNS: &[Column] = &[Fixed(4), TableIndex(FIELD)];
    const STAND_ALONE_SIG_COLUMNS: &[Column] = &[BlobIndex];
    const EVENT_MAP_COLUMNS: &[Column] = &[TableIndex(TYPE_DEF), TableIndex(EVENT)];
    const EVENT_PTR_COLUMNS: &[Column] = &[TableIndex(EVENT)];
    const EVENT_COLUMNS: &[Column] = &[Fixed(2), StringIndex, CodedIndex(TYPE_DEF_OR_REF)];
    const PROPERTY_MAP_COLUMNS: &[Column] = &[TableIndex(TYPE_DEF), TableIndex(PROPERTY)];
    const PROPERTY_PTR_COLUMNS: &[Column] = &[TableIndex(PROPERTY)];
    const PROPERTY_COLUMNS: &[Column] = &[Fixed(2), StringIndex, BlobIndex];
    const METHOD_SEMANTICS_COLUMNS: &[Column] =
        &[Fixed(2), TableIndex(METHOD_DEF), CodedIndex(HAS_SEMANTICS)];
    const METHOD_IMPL_COLUMNS: &[Column] = &[
        TableIndex(TYPE_DEF),
        CodedIndex(METHOD_DEF_OR_REF),
        CodedIndex(METHOD_DEF_OR_REF),
    ];
    const MODULE_REF_COLUMNS: &[Column] = &[StringIndex];
    const TYPE_SPEC_COLUMNS: &[Column] = &[BlobIndex];
    const IMPL_MAP_COLUMNS: &[Column] =
        &[Fixed(2), CodedIndex(MEMBER_FORWARDED), StringIndex, TableIndex(MODULE_REF)];
    const FIELD_RVA_COLUMNS: &[Column] = &[Fixed(4), TableIndex(FIELD)];
    const ENC_LOG_COLUMNS: &[Column] = &[Fixed(4), Fixed(4)];
    const ENC_MAP_COLUMNS: &[Column] = &[Fixed(4)];
    const ASSEMBLY_COLUMNS: &[Column] = &[
        Fixed(4),
        Fixed(2),
        Fixed(2),
        Fixed(2),
        Fixed(2),
        Fixed(4),
        BlobIndex,
        StringIndex,
        StringIndex,
    ];
    const ASSEMBLY_PROCESSOR_COLUMNS: &[Column] = &[Fixed(4)];
    const ASSEMBLY_OS_COLUMNS: &[Column] = &[Fixed(4), Fixed(4), Fixed(4)];
    const ASSEMBLY_REF_COLUMNS: &[Column] = &[
        Fixed(2),
        Fixed(2),
        Fixed(2),
        Fixed(2),
        Fixed(4),
        BlobIndex,
        StringIndex,
        StringIndex,
        BlobIndex,
    ];

    let columns = match table {
        MODULE => MODULE_COLUMNS,
        TYPE_REF => TYPE_REF_COLUMNS,
        TYPE_DEF => TYPE_DEF_COLUMNS,
        FIELD_PTR => FIELD_PTR_COLUMNS,
        FIELD => FIELD_COLUMNS,
        METHOD_PTR => METHOD_PTR_COLUMNS,
        METHOD_DEF => METHOD_DEF_COLUMNS,
        PARAM_PTR => PARAM_PTR_COLUMNS,
        PARAM => PARAM_COLUMNS,
        INTERFACE_IMPL => INTERFACE_IMPL_COLUMNS,
        MEMBER_REF => MEMBER_REF_COLUMNS,
        CONSTANT => CONSTANT_COLUMNS,
        CUSTOM_ATTRIBUTE => CUSTOM_ATTRIBUTE_COLUMNS,
        FIELD_MARSHAL => FIELD_MARSHAL_COLUMNS,
        DECL_SECURITY => DECL_SECURITY_COLUMNS,
        CLASS_LAYOUT => CLASS_LAYOUT_COLUMNS,
        FIELD_LAYOUT => FIELD_LAYOUT_COLUMNS,
        STAND_ALONE_SIG => STAND_ALONE_SIG_COLUMNS,
        EVENT_MAP => EVENT_MAP_COLUMNS,
        EVENT_PTR => EVENT_PTR_COLUMNS,
        EVENT => EVENT_COLUMNS,
        PROPERTY_MAP => PROPERTY_MAP_COLUMNS,
        PROPERTY_PTR => PROPERTY_PTR_COLUMNS,
        PROPERTY => PROPERTY_COLUMNS,
        METHOD_SEMANTICS => METHOD_SEMANTICS_COLUMNS,
        METHOD_IMPL => METHOD_IMPL_COLUMNS,
        MODULE_REF => MODULE_REF_COLUMNS,
        TYPE_SPEC => TYPE_SPEC_COLUMNS,
        IMPL_MAP => IMPL_MAP_COLUMNS,
        FIELD_RVA => FIELD_RVA_COLUMNS,
        ENC_LOG => ENC_LOG_COLUMNS,
        ENC_MAP => ENC_MAP_COLUMNS,
        ASSEMBLY => ASSEMBLY_COLUMNS,
        ASSEMBLY_PROCESSOR => ASSEMBLY_PROCESSOR_COLUMNS,
        ASSEMBLY_OS => ASSEMBLY_OS_COLUMNS,
        ASSEMBLY_REF => ASSEMBLY_REF_COLUMNS,
        _ => return None,
    };
    Some(columns)
}

/// Number of tag bits a coded index over `tables` reserves.
fn tag_bits(tables: &[usize]) -> u32 {
    usize::BITS - tables.len().saturating_sub(1).leading_zeros()
}

pub(super) struct TableStream<'a> {
    data: &'a [u8],
    heap_sizes: u8,
    rows: [u32; TABLE_COUNT],
    tables_start: usize,
}

impl<'a> TableStream<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, MetadataError> {
        let heap_sizes = read_u8(data, 6)?;
        let valid = read_u64(data, 8)?;

        let mut rows = [0u32; TABLE_COUNT];
        let mut offset = 24;
        for (table, count) in rows.iter_mut().enumerate() {
            if valid & (1u64 << table) != 0 {
                *count = read_u32(data, offset)?;
                offset += 4;
            }
        }
        if heap_sizes & EXTRA_DATA != 0 {
            offset += 4;
        }

        Ok(TableStream {
            data,
            heap_sizes,
            rows,
            tables_start: offset,
        })
    }

    pub fn row_count(&self, table: usize) -> u32 {
        self.rows.get(table).copied().unwrap_or(0)
    }

    /// Reads every column of a row as an integer. `index` is zero based.
    pub fn row(&self, table: usize, index: u32) -> Result<Vec<u32>, MetadataError> {
        if index >= self.row_count(table) {
            return Err(MetadataError::Malformed(format!(
                "row {index} of table {table:#04x} does not exist"
            )));
        }
        let columns = columns(table).ok_or_else(|| unsupported(table))?;
        let mut offset = self.table_offset(table)? + index as usize * self.row_size(columns);

        columns
            .iter()
            .map(|column| -> Result<u32, MetadataError> {
                let size = self.column_size(column);
                let value = match size {
                    2 => read_u16(self.data, offset)? as u32,
                    _ => read_u32(self.data, offset)?,
                };
                offset += size;
                Ok(value)
            })
            .collect()
    }

    fn table_offset(&self, table: usize) -> Result<usize, MetadataError> {
        (0..table)
            .filter(|preceding| self.row_count(*preceding) != 0)
            .try_fold(self.tables_start, |offset, preceding| -> Result<usize, MetadataError> {
                let columns = columns(preceding).ok_or_else(|| unsupported(preceding))?;
                Ok(offset + self.row_count(preceding) as usize * self.row_size(columns))
            })
    }

    fn row_size(&self, columns: &[Column]) -> usize {
        columns.iter().map(|column| self.column_size(column)).sum()
    }

    fn column_size(&self, column: &Column) -> usize {
        match column {
            Fixed(size) => *size,
            StringIndex => self.heap_index_size(HEAP_STRINGS_WIDE),
            GuidIndex => self.heap_index_size(HEAP_GUID_WIDE),
            BlobIndex => self.heap_index_size(HEAP_BLOB_WIDE),
            TableIndex(table) => {
                if self.row_count(*table) < (1 << 16) {
                    2
                } else {
                    4
                }
            }
            CodedIndex(tables) => {
                let limit = 1u32 << (16 - tag_bits(tables));
                let max_rows = tables
                    .iter()
                    .map(|table| self.row_count(*table))
                    .max()
                    .unwrap_or(0);
                if max_rows < limit {
                    2
                } else {
                    4
                }
            }
        }
    }

    fn heap_index_size(&self, flag: u8) -> usize {
        if self.heap_sizes & flag != 0 {
            4
        } else {
            2
        }
    }
}

fn unsupported(table: usize) -> MetadataError {
    MetadataError::Malformed(format!("unsupported metadata table {table:#04x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn coded_index_tag_bits() {
        assert_eq!(tag_bits(TYPE_DEF_OR_REF), 2);
        assert_eq!(tag_bits(HAS_CUSTOM_ATTRIBUTE), 5);
        assert_eq!(tag_bits(HAS_FIELD_MARSHAL), 1);
        assert_eq!(tag_bits(CUSTOM_ATTRIBUTE_TYPE), 3);
        assert_eq!(tag_bits(RESOLUTION_SCOPE), 2);
        assert_eq!(tag_bits(MEMBER_REF_PARENT), 3);
    }

    #[test]
    fn every_table_up_to_assembly_ref_has_a_schema() {
        for table in MODULE..=ASSEMBLY_REF {
            assert!(columns(table).is_some(), "table {table:#04x}");
        }
        assert!(columns(FILE).is_none());
    }

    fn stream(heap_sizes: u8, rows: &[(usize, u32)]) -> Vec<u8> {
        let valid = rows
            .iter()
            .fold(0u64, |valid, (table, _)| valid | (1u64 << table));
        let mut data = vec![0, 0, 0, 0, 2, 0, heap_sizes, 1];
        data.extend_from_slice(&valid.to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes());
        for (_, count) in rows {
            data.extend_from_slice(&count.to_le_bytes());
        }
        data
    }

    #[test]
    fn wide_indexes_follow_heap_sizes_and_row_counts() {
        let data = stream(HEAP_STRINGS_WIDE | HEAP_BLOB_WIDE, &[(TYPE_DEF, 1 << 14)]);
        let tables = TableStream::parse(&data).unwrap();

        assert_eq!(tables.column_size(&StringIndex), 4);
        assert_eq!(tables.column_size(&GuidIndex), 2);
        assert_eq!(tables.column_size(&BlobIndex), 4);
        assert_eq!(tables.column_size(&TableIndex(TYPE_DEF)), 2);
        // 2^14 rows no longer fit next to two tag bits.
        assert_eq!(tables.column_size(&CodedIndex(TYPE_DEF_OR_REF)), 4);
        assert_eq!(tables.column_size(&CodedIndex(HAS_FIELD_MARSHAL)), 2);
    }

    #[test]
    fn table_offset_skips_preceding_rows() {
        let data = stream(0, &[(MODULE, 1), (TYPE_REF, 3), (ASSEMBLY, 1)]);
        let tables = TableStream::parse(&data).unwrap();

        // Header, valid and sorted masks, then three row counts.
        assert_eq!(tables.tables_start, 24 + 12);
        assert_eq!(
            tables.table_offset(ASSEMBLY).unwrap(),
            tables.tables_start + 10 + 3 * 6
        );
    }

    #[test]
    fn extra_data_dword_is_skipped() {
        let mut data = stream(EXTRA_DATA, &[(MODULE, 1)]);
        data.extend_from_slice(&0u32.to_le_bytes());
        let tables = TableStream::parse(&data).unwrap();
        assert_eq!(tables.tables_start, 24 + 4 + 4);
    }

    #[test]
    fn missing_rows_are_errors() {
        let data = stream(0, &[(MODULE, 1)]);
        let tables = TableStream::parse(&data).unwrap();
        assert!(tables.row(ASSEMBLY, 0).is_err());
        // The Module row itself lies past the end of this stream.
        assert!(tables.row(MODULE, 0).is_err());
    }
}
