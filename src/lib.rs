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

//! # shapefile-reader
//!
//! A decoder for the ESRI shapefile format, the triplet of files (`.shp`,
//! `.dbf`, `.shx`) that legacy GIS tools use to exchange vector data.
//!
//! The geometry stream (`.shp`) holds shapes of one of thirteen kinds, from
//! bare points to multi-surface patches, optionally carrying elevation (Z) and
//! measure (M) values. The attribute table (`.dbf`) holds one typed record per
//! shape. The offset index (`.shx`) maps record ordinals to byte offsets in the
//! geometry stream for random access.
//!
//! # Reading a shapefile
//!
//! ```no_run
//! use shapefile_reader::{ShapefilePath, ShapefileReader};
//!
//! # fn main() -> Result<(), shapefile_reader::Error> {
//! let mut reader = ShapefileReader::open(&ShapefilePath::with_base("rivers.shp"))?;
//!
//! let shapefile = reader.read_all()?;
//! for (shape, record) in shapefile.shapes_and_records() {
//!     match shape {
//!         Some(shape) => println!("{:?}: {:?}", shape.shape_type(), record.get("NAME")),
//!         None => println!("null geometry"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Single records can be decoded without materializing the rest of the file:
//!
//! ```no_run
//! # use shapefile_reader::{ShapefilePath, ShapefileReader};
//! # fn main() -> Result<(), shapefile_reader::Error> {
//! # let mut reader = ShapefileReader::open(&ShapefilePath::with_base("rivers.shp"))?;
//! let (shape, record) = reader.read_one(42)?;
//! # Ok(())
//! # }
//! ```
//!
//! The per-file readers [`ShpReader`], [`DbfReader`] and [`ShxReader`] are also
//! public for callers that only care about one member of the triplet, as is the
//! [`unpack`] module, a small structured-byte-unpacking primitive driven by
//! `struct`-style layout strings.
//!
//! # Malformed input
//!
//! Shapefiles in the wild routinely carry wrong declared lengths; the readers
//! measure the files instead of trusting the headers, logging a warning through
//! the [`log`] facade when the two disagree. Attribute text that fails to parse
//! is omitted from its record rather than failing the read. Structural damage
//! (unknown shape kinds, broken field descriptors, index/table record count
//! disagreement) is always a hard [`Error`].

pub mod error;
pub mod reader;
pub mod record;
pub mod types;
pub mod unpack;

pub use error::Error;
pub use reader::{
    DbfReader, FieldDescriptor, Shapefile, ShapefilePath, ShapefileReader, ShpReader, ShxReader,
};
pub use record::{Date, FieldType, FieldValue, Record};
pub use types::{
    BoundingBox, HasParts, MeasureRange, MultiPatch, MultiPoint, MultiPointM, MultiPointZ,
    PatchKind, Point, PointM, PointZ, PolyLine, PolyLineM, PolyLineZ, Polygon, PolygonM, PolygonZ,
    Shape, ShapeType,
};

/// A convenience type alias for `Result`s returned by this crate.
pub type ShapefileResult<T> = Result<T, Error>;
