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

//! Readers for the shapefile triplet.
//!
//! The three files of a shapefile share a base name: the geometry stream
//! (`.shp`), the attribute table (`.dbf`) and the offset index (`.shx`).
//! [`ShapefileReader`] composes the per-file readers and enforces the one
//! invariant that spans files: the geometry stream and the attribute table hold
//! the same number of records.

pub mod dbf;
pub mod shp;
pub mod shx;

pub use dbf::{DbfReader, FieldDescriptor};
pub use shp::ShpReader;
pub use shx::ShxReader;

use crate::{
    ShapefileResult,
    error::Details,
    record::Record,
    types::{BoundingBox, MeasureRange, Shape},
    unpack::Value,
};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    path::{Path, PathBuf},
};

/// Pull the next value off an unpacked sequence as an integer.
///
/// The layout string fixes the number of decoded values, so exhaustion here is a
/// programming error, not a data error.
pub(crate) fn next_int(values: &mut impl Iterator<Item = Value>) -> ShapefileResult<i64> {
    next_value(values).into_int()
}

/// Pull the next value off an unpacked sequence as a double.
pub(crate) fn next_double(values: &mut impl Iterator<Item = Value>) -> ShapefileResult<f64> {
    next_value(values).into_double()
}

/// Pull the next value off an unpacked sequence as text.
pub(crate) fn next_str(values: &mut impl Iterator<Item = Value>) -> ShapefileResult<String> {
    next_value(values).into_string()
}

fn next_value(values: &mut impl Iterator<Item = Value>) -> Value {
    values
        .next()
        .unwrap_or_else(|| unreachable!("the layout string fixes the value count"))
}

/// The three co-located paths making up one shapefile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapefilePath {
    shp: PathBuf,
    dbf: PathBuf,
    shx: PathBuf,
}

impl ShapefilePath {
    pub fn new(shp: impl Into<PathBuf>, dbf: impl Into<PathBuf>, shx: impl Into<PathBuf>) -> Self {
        Self {
            shp: shp.into(),
            dbf: dbf.into(),
            shx: shx.into(),
        }
    }

    /// Build the triplet from one base path by swapping in the conventional
    /// extensions.
    pub fn with_base(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            shp: base.with_extension("shp"),
            dbf: base.with_extension("dbf"),
            shx: base.with_extension("shx"),
        }
    }

    pub fn shp(&self) -> &Path {
        &self.shp
    }

    pub fn dbf(&self) -> &Path {
        &self.dbf
    }

    pub fn shx(&self) -> &Path {
        &self.shx
    }
}

/// Everything a shapefile holds, decoded.
///
/// `shapes` and `records` are parallel: entry *i* of each describes record *i*.
/// A `None` shape is a null geometry record, which the format allows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shapefile {
    pub bbox: BoundingBox,
    pub z_range: Option<MeasureRange>,
    pub m_range: Option<MeasureRange>,
    pub shapes: Vec<Option<Shape>>,
    pub records: Vec<Record>,
}

impl Shapefile {
    /// The shapes zipped with their attribute records.
    pub fn shapes_and_records(&self) -> impl Iterator<Item = (&Option<Shape>, &Record)> {
        self.shapes.iter().zip(&self.records)
    }
}

/// Handle over an open shapefile triplet.
///
/// All three files are opened eagerly so that a missing or malformed member
/// fails at [`open`](Self::open) time. Each per-file reader owns its file handle
/// and releases it when the `ShapefileReader` is dropped.
pub struct ShapefileReader {
    shp: ShpReader<File>,
    dbf: DbfReader<File>,
    shx: ShxReader,
}

impl ShapefileReader {
    /// Open all three files and decode their headers.
    pub fn open(path: &ShapefilePath) -> ShapefileResult<Self> {
        Ok(Self {
            shp: ShpReader::open(path.shp())?,
            dbf: DbfReader::open(path.dbf())?,
            shx: ShxReader::open(path.shx())?,
        })
    }

    /// The field descriptors of the attribute table, in table order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        self.dbf.fields()
    }

    /// Decode the full geometry and attribute lists.
    ///
    /// Fails with [`Details::RecordCountMismatch`] when the two files disagree
    /// on the record count; the result is never silently truncated or padded.
    pub fn read_all(&mut self) -> ShapefileResult<Shapefile> {
        let shapes = self.shp.read_all_shapes()?;
        let records = self.dbf.read_all_records()?;

        if shapes.len() != records.len() {
            return Err(Details::RecordCountMismatch {
                shapes: shapes.len(),
                records: records.len(),
            }
            .into());
        }

        Ok(Shapefile {
            bbox: *self.shp.bounding_box(),
            z_range: self.shp.z_range(),
            m_range: self.shp.m_range(),
            shapes,
            records,
        })
    }

    /// Decode exactly one geometry record and its attribute record, without
    /// materializing the rest of either file.
    ///
    /// The geometry offset is resolved through the offset index; the attribute
    /// record is located by ordinal, since the two files share ordinals but not
    /// byte layout.
    pub fn read_one(&mut self, ordinal: usize) -> ShapefileResult<(Option<Shape>, Record)> {
        let offset = self.shx.offset_of(ordinal)?;

        // The index can point at end-of-stream when it holds more entries than
        // the geometry stream has records.
        let (shape, _) = self
            .shp
            .read_shape_at(offset)?
            .ok_or(Details::IndexOutOfBounds {
                index: ordinal,
                count: self.shx.len(),
            })?;
        let record = self.dbf.read_record(ordinal)?;

        Ok((shape, record))
    }
}
