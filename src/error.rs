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

use crate::{types::ShapeType, unpack::ValueKind};
use std::path::PathBuf;

/// Errors encountered while decoding a shapefile triplet.
///
/// To inspect the details of the error use [`details`](Self::details) or
/// [`into_details`](Self::into_details) to get a [`Details`] which contains more precise
/// error information.
///
/// See [`Details`] for all possible errors.
#[derive(thiserror::Error, Debug)]
#[repr(transparent)]
#[error(transparent)]
pub struct Error {
    details: Box<Details>,
}

impl Error {
    pub fn new(details: Details) -> Self {
        Self {
            details: Box::new(details),
        }
    }

    pub fn details(&self) -> &Details {
        &self.details
    }

    pub fn into_details(self) -> Details {
        *self.details
    }
}

impl From<Details> for Error {
    fn from(details: Details) -> Self {
        Self::new(details)
    }
}

/// All the errors this crate can produce.
///
/// Boxed inside [`Error`] to keep the `Result` types small.
#[derive(thiserror::Error, Debug)]
pub enum Details {
    #[error("Failed to open {}: {source}", path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to seek: {0}")]
    Seek(#[source] std::io::Error),

    #[error("Failed to read bytes: {0}")]
    ReadBytes(#[source] std::io::Error),

    /// The byte length implied by a layout string does not match the buffer it was
    /// applied to.
    #[error("Layout '{layout}' describes {expected} byte(s) but buffer holds {actual}")]
    LayoutMismatch {
        layout: String,
        expected: usize,
        actual: usize,
    },

    #[error("Unsupported field type token '{0}' in layout string")]
    UnsupportedField(char),

    #[error("Native byte order ('@') is not supported in layout strings")]
    NativeByteOrder,

    #[error("Expected a {expected} value but decoded a {actual}")]
    UnexpectedValueKind {
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("Text bytes {0:?} could not be decoded with any of the configured encodings")]
    DecodeText(Vec<u8>),

    #[error("Unknown shape type code {0}")]
    UnknownShapeType(i32),

    /// A record declared a shape type other than the file-level one (or null).
    #[error("Record {ordinal} has shape type {record:?} but the file declares {file:?}")]
    ShapeTypeMismatch {
        ordinal: i32,
        file: ShapeType,
        record: ShapeType,
    },

    #[error("Unknown multipatch part type code {0}")]
    UnknownPatchKind(i32),

    #[error("Negative count {0} in geometry record")]
    NegativeCount(i32),

    #[error("Unknown attribute field type code '{0}'")]
    UnknownFieldType(char),

    /// The attribute table's field descriptor area did not end with the expected
    /// carriage-return terminator byte.
    #[error("Attribute table field descriptors end with {0:#04x}, expected 0x0d")]
    MissingFieldTerminator(u8),

    #[error("Attribute field widths sum to {computed} byte(s) but the header declares {declared}")]
    RecordWidthMismatch { declared: usize, computed: usize },

    #[error("Record index {index} is out of bounds ({count} record(s))")]
    IndexOutOfBounds { index: usize, count: usize },

    #[error("Geometry stream has {shapes} shape(s) but attribute table has {records} record(s)")]
    RecordCountMismatch { shapes: usize, records: usize },
}
