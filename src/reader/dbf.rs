// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Decoder for the attribute table (`.dbf`).

use crate::{
    ShapefileResult,
    error::Details,
    record::{Date, FieldType, Record, interpret_field},
    reader::{next_int, next_str},
    unpack::{DEFAULT_ENCODINGS, layout_len, unpack, unpack_with_encodings},
};
use encoding_rs::Encoding;
use std::{
    fmt::Write as _,
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

/// Byte length of the attribute table's fixed header.
const TABLE_HEADER_LEN: usize = 32;

/// Byte length of one field descriptor.
const DESCRIPTOR_LEN: usize = 32;

/// The field descriptor area must end with a carriage return.
const DESCRIPTOR_TERMINATOR: u8 = 0x0D;

/// One column of the attribute table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub width: usize,
    pub decimal_count: u8,
}

#[derive(Clone, Copy, Debug)]
struct DbfHeader {
    last_update: Date,
    record_count: usize,
    header_length: usize,
    record_length: usize,
}

/// Reader over an attribute table.
///
/// The header and field descriptors are decoded eagerly on construction; records
/// are decoded on demand. Every field is first decoded as raw text using the
/// configured encoding fallback list and then interpreted according to its declared
/// type; a field whose text fails to interpret is omitted from its record rather
/// than aborting the table.
pub struct DbfReader<R> {
    source: R,
    header: DbfHeader,
    /// All columns, including the synthetic leading deletion-flag column.
    fields: Vec<FieldDescriptor>,
    /// Per-record decode layout derived from the field widths.
    record_layout: String,
    encodings: Vec<&'static Encoding>,
}

impl DbfReader<File> {
    pub fn open(path: impl AsRef<Path>) -> ShapefileResult<Self> {
        let file = File::open(path.as_ref()).map_err(|source| Details::OpenFile {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::new(file)
    }
}

impl<R: Read + Seek> DbfReader<R> {
    pub fn new(source: R) -> ShapefileResult<Self> {
        let mut reader = Self {
            source,
            header: DbfHeader {
                last_update: Date {
                    year: 1900,
                    month: 1,
                    day: 1,
                },
                record_count: 0,
                header_length: 0,
                record_length: 0,
            },
            fields: Vec::new(),
            record_layout: String::new(),
            encodings: DEFAULT_ENCODINGS.to_vec(),
        };
        reader.header = reader.read_header()?;
        reader.fields = reader.read_field_descriptors()?;
        reader.record_layout = reader.build_record_layout()?;
        Ok(reader)
    }

    /// Replace the text-encoding fallback list tried when decoding field text.
    ///
    /// The format declares no encoding, so by default the legacy Western code page
    /// is tried first and UTF-8 second.
    pub fn with_encodings(mut self, encodings: Vec<&'static Encoding>) -> Self {
        self.encodings = encodings;
        self
    }

    /// Number of records the table declares.
    pub fn record_count(&self) -> usize {
        self.header.record_count
    }

    /// The table's last-update date.
    pub fn last_update(&self) -> Date {
        self.header.last_update
    }

    /// The real columns, without the synthetic deletion-flag column.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields[1..]
    }

    fn read_header(&mut self) -> ShapefileResult<DbfHeader> {
        self.source
            .seek(SeekFrom::Start(0))
            .map_err(Details::Seek)?;

        let buf = self.read_buf(TABLE_HEADER_LEN)?;
        let mut values = unpack(&buf, "<xBBBihh20x").map(Vec::into_iter)?;

        let year_offset = next_int(&mut values)?;
        let month = next_int(&mut values)?;
        let day = next_int(&mut values)?;
        let record_count = next_int(&mut values)?;
        let header_length = next_int(&mut values)?;
        let record_length = next_int(&mut values)?;

        Ok(DbfHeader {
            last_update: Date {
                year: 1900 + year_offset as i32,
                month: month as u8,
                day: day as u8,
            },
            record_count: usize::try_from(record_count).unwrap_or(0),
            header_length: usize::try_from(header_length).unwrap_or(0),
            record_length: usize::try_from(record_length).unwrap_or(0),
        })
    }

    fn read_field_descriptors(&mut self) -> ShapefileResult<Vec<FieldDescriptor>> {
        let descriptor_count =
            self.header.header_length.saturating_sub(TABLE_HEADER_LEN + 1) / DESCRIPTOR_LEN;

        // The soft-delete marker byte preceding every record's real fields gets a
        // synthetic one-byte Character column so record layout and output stay
        // aligned.
        let mut fields = Vec::with_capacity(descriptor_count + 1);
        fields.push(FieldDescriptor {
            name: "DeletionFlag".to_string(),
            field_type: FieldType::Character,
            width: 1,
            decimal_count: 0,
        });

        for _ in 0..descriptor_count {
            let buf = self.read_buf(DESCRIPTOR_LEN)?;
            let mut values = unpack_with_encodings(&buf, "<11sc4xBB14x", &self.encodings)
                .map(Vec::into_iter)?;

            let raw_name = next_str(&mut values)?;
            let type_code = next_str(&mut values)?;
            let width = next_int(&mut values)?;
            let decimal_count = next_int(&mut values)?;

            let name = raw_name
                .split('\0')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            let code = type_code.chars().next().unwrap_or('\0');
            let field_type =
                FieldType::from_code(code).ok_or(Details::UnknownFieldType(code))?;

            fields.push(FieldDescriptor {
                name,
                field_type,
                width: width as usize,
                decimal_count: decimal_count as u8,
            });
        }

        let terminator = self.read_buf(1)?[0];
        if terminator != DESCRIPTOR_TERMINATOR {
            return Err(Details::MissingFieldTerminator(terminator).into());
        }

        Ok(fields)
    }

    /// Concatenate every field width into the per-record text layout and verify it
    /// against the declared record length.
    fn build_record_layout(&self) -> ShapefileResult<String> {
        let mut layout = String::from("<");
        for field in &self.fields {
            let _ = write!(layout, "{}s", field.width);
        }

        let computed = layout_len(&layout)?;
        if computed != self.header.record_length {
            return Err(Details::RecordWidthMismatch {
                declared: self.header.record_length,
                computed,
            }
            .into());
        }

        Ok(layout)
    }

    /// Decode every record in declared order.
    pub fn read_all_records(&mut self) -> ShapefileResult<Vec<Record>> {
        (0..self.header.record_count)
            .map(|ordinal| self.read_record(ordinal))
            .collect()
    }

    /// Decode the record at `ordinal`.
    pub fn read_record(&mut self, ordinal: usize) -> ShapefileResult<Record> {
        if ordinal >= self.header.record_count {
            return Err(Details::IndexOutOfBounds {
                index: ordinal,
                count: self.header.record_count,
            }
            .into());
        }

        let offset = self.header.header_length + self.header.record_length * ordinal;
        self.read_record_at(offset as u64)
    }

    /// Decode exactly one record at a caller-supplied absolute byte offset.
    pub fn read_record_at(&mut self, offset: u64) -> ShapefileResult<Record> {
        self.source
            .seek(SeekFrom::Start(offset))
            .map_err(Details::Seek)?;
        let buf = self.read_buf(self.header.record_length)?;
        let values = unpack_with_encodings(&buf, &self.record_layout, &self.encodings)?;

        let mut fields = Vec::with_capacity(self.fields.len().saturating_sub(1));
        for (position, (descriptor, value)) in self.fields.iter().zip(values).enumerate() {
            // The leading deletion-flag column never reaches the output.
            if position == 0 {
                continue;
            }

            let text = value.into_string()?;
            if let Some(value) =
                interpret_field(descriptor.field_type, &text, descriptor.decimal_count > 0)
            {
                fields.push((descriptor.name.clone(), value));
            }
        }

        Ok(Record::new(fields))
    }

    fn read_buf(&mut self, len: usize) -> ShapefileResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.source
            .read_exact(&mut buf)
            .map_err(Details::ReadBytes)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Details, record::FieldValue};
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    /// Build a table fixture. Each record is the raw field text, without the
    /// deletion-flag byte; it is padded to each field's width here.
    fn dbf_bytes(fields: &[(&str, char, usize, u8)], records: &[Vec<&[u8]>]) -> Vec<u8> {
        let header_length = 32 + 32 * fields.len() + 1;
        let record_length: usize = 1 + fields.iter().map(|f| f.2).sum::<usize>();

        let mut bytes = Vec::new();
        bytes.push(0x03);
        bytes.extend_from_slice(&[124, 1, 15]); // 2024-01-15
        bytes.extend_from_slice(&(records.len() as i32).to_le_bytes());
        bytes.extend_from_slice(&(header_length as i16).to_le_bytes());
        bytes.extend_from_slice(&(record_length as i16).to_le_bytes());
        bytes.extend_from_slice(&[0u8; 20]);

        for (name, type_code, width, decimals) in fields {
            let mut descriptor = [0u8; 32];
            descriptor[..name.len()].copy_from_slice(name.as_bytes());
            descriptor[11] = *type_code as u8;
            descriptor[16] = *width as u8;
            descriptor[17] = *decimals;
            bytes.extend_from_slice(&descriptor);
        }
        bytes.push(0x0D);

        for record in records {
            bytes.push(b' '); // not deleted
            for ((_, _, width, _), text) in fields.iter().zip(record) {
                let mut cell = vec![b' '; *width];
                cell[..text.len()].copy_from_slice(text);
                bytes.extend_from_slice(&cell);
            }
        }

        bytes
    }

    fn reader(bytes: Vec<u8>) -> Result<DbfReader<Cursor<Vec<u8>>>> {
        Ok(DbfReader::new(Cursor::new(bytes))?)
    }

    #[test]
    fn header_metadata_is_exposed() -> Result<()> {
        let bytes = dbf_bytes(&[("NAME", 'C', 5, 0)], &[vec![b"abc"]]);
        let dbf = reader(bytes)?;

        assert_eq!(dbf.record_count(), 1);
        assert_eq!(
            dbf.last_update(),
            Date {
                year: 2024,
                month: 1,
                day: 15
            }
        );
        assert_eq!(dbf.fields().len(), 1);
        assert_eq!(dbf.fields()[0].name, "NAME");
        assert_eq!(dbf.fields()[0].field_type, FieldType::Character);
        Ok(())
    }

    #[test]
    fn bad_date_field_is_omitted_but_others_survive() -> Result<()> {
        let fields = [
            ("NAME", 'C', 6, 0),
            ("BORN", 'D', 8, 0),
            ("POP", 'N', 6, 0),
        ];
        let bytes = dbf_bytes(&fields, &[vec![b"otter", b"19xx0101", b"42"]]);
        let record = reader(bytes)?.read_record(0)?;

        assert_eq!(record.get("BORN"), None);
        assert_eq!(
            record.get("NAME"),
            Some(&FieldValue::Character("otter".to_string()))
        );
        assert_eq!(record.get("POP"), Some(&FieldValue::Int(42)));
        assert_eq!(record.len(), 2);
        Ok(())
    }

    #[test]
    fn good_date_field_decodes() -> Result<()> {
        let bytes = dbf_bytes(&[("BORN", 'D', 8, 0)], &[vec![b"19870615"]]);
        let record = reader(bytes)?.read_record(0)?;
        assert_eq!(
            record.get("BORN"),
            Some(&FieldValue::Date(Date {
                year: 1987,
                month: 6,
                day: 15
            }))
        );
        Ok(())
    }

    #[test]
    fn logical_fields_are_never_omitted() -> Result<()> {
        let fields = [("A", 'L', 1, 0), ("B", 'L', 1, 0), ("C", 'L', 1, 0)];
        let bytes = dbf_bytes(&fields, &[vec![b"y", b"F", b" "]]);
        let record = reader(bytes)?.read_record(0)?;

        assert_eq!(record.get("A"), Some(&FieldValue::Bool(true)));
        assert_eq!(record.get("B"), Some(&FieldValue::Bool(false)));
        assert_eq!(record.get("C"), Some(&FieldValue::Bool(false)));
        Ok(())
    }

    #[test]
    fn numeric_fields_follow_the_decimal_rules() -> Result<()> {
        let fields = [
            ("INT", 'N', 6, 0),
            ("REAL", 'N', 6, 2),
            ("DOT", 'N', 6, 0),
            ("BLANK", 'N', 6, 0),
            ("FLT", 'F', 8, 0),
        ];
        let bytes = dbf_bytes(
            &fields,
            &[vec![b"7", b"3", b"2.5", b"", b"-1.25"]],
        );
        let record = reader(bytes)?.read_record(0)?;

        assert_eq!(record.get("INT"), Some(&FieldValue::Int(7)));
        assert_eq!(record.get("REAL"), Some(&FieldValue::Double(3.0)));
        assert_eq!(record.get("DOT"), Some(&FieldValue::Double(2.5)));
        assert_eq!(
            record.get("BLANK"),
            Some(&FieldValue::Character(String::new()))
        );
        assert_eq!(record.get("FLT"), Some(&FieldValue::Double(-1.25)));
        Ok(())
    }

    #[test]
    fn legacy_code_page_text_decodes() -> Result<()> {
        // "café" in Windows-1252.
        let bytes = dbf_bytes(&[("NAME", 'C', 6, 0)], &[vec![&[0x63, 0x61, 0x66, 0xE9]]]);
        let record = reader(bytes)?.read_record(0)?;
        assert_eq!(
            record.get("NAME"),
            Some(&FieldValue::Character("café".to_string()))
        );
        Ok(())
    }

    #[test]
    fn read_all_records_decodes_in_declared_order() -> Result<()> {
        let fields = [("N", 'N', 4, 0)];
        let bytes = dbf_bytes(&fields, &[vec![b"1"], vec![b"2"], vec![b"3"]]);
        let records = reader(bytes)?.read_all_records()?;

        let values: Vec<_> = records
            .iter()
            .map(|r| r.get("N").and_then(FieldValue::as_int))
            .collect();
        assert_eq!(values, vec![Some(1), Some(2), Some(3)]);
        Ok(())
    }

    #[test]
    fn record_at_absolute_offset_matches_ordinal_read() -> Result<()> {
        let fields = [("N", 'N', 4, 0)];
        let bytes = dbf_bytes(&fields, &[vec![b"1"], vec![b"2"]]);
        let mut dbf = reader(bytes)?;

        let by_ordinal = dbf.read_record(1)?;
        // header (32) + one descriptor (32) + terminator (1) + one record (5).
        let by_offset = dbf.read_record_at(70)?;
        assert_eq!(by_ordinal, by_offset);
        Ok(())
    }

    #[test]
    fn ordinal_out_of_bounds_is_fatal() -> Result<()> {
        let bytes = dbf_bytes(&[("N", 'N', 4, 0)], &[vec![b"1"]]);
        let err = reader(bytes)?.read_record(1).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::IndexOutOfBounds { index: 1, count: 1 }
        ));
        Ok(())
    }

    #[test]
    fn missing_terminator_is_fatal() {
        let mut bytes = dbf_bytes(&[("N", 'N', 4, 0)], &[vec![b"1"]]);
        // Corrupt the terminator after the single descriptor.
        bytes[64] = 0x20;
        let err = DbfReader::new(Cursor::new(bytes)).map(|_| ()).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::MissingFieldTerminator(0x20)
        ));
    }

    #[test]
    fn width_sum_must_match_declared_record_length() {
        let mut bytes = dbf_bytes(&[("N", 'N', 4, 0)], &[vec![b"1"]]);
        // Bump the declared record length without touching the widths.
        bytes[10..12].copy_from_slice(&9i16.to_le_bytes());
        let err = DbfReader::new(Cursor::new(bytes)).map(|_| ()).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::RecordWidthMismatch {
                declared: 9,
                computed: 5
            }
        ));
    }

    #[test]
    fn unknown_field_type_is_fatal() {
        let bytes = dbf_bytes(&[("N", 'X', 4, 0)], &[vec![b"1"]]);
        let err = DbfReader::new(Cursor::new(bytes)).map(|_| ()).unwrap_err();
        assert!(matches!(err.details(), Details::UnknownFieldType('X')));
    }
}
