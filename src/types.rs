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

//! The decoded geometry data model.
//!
//! A [`Shape`] is one decoded geometry record, one of the 13 kinds the format
//! defines. Shapes are built once by the decoder and are immutable afterwards. The
//! part-bearing kinds expose their flat point array, their part-start indices, and a
//! derived points-grouped-by-part view through [`HasParts`].

use serde::{Deserialize, Serialize};
use strum_macros::{Display, FromRepr};

/// Numeric geometry-kind codes as stored in the stream.
///
/// The set is closed; an unlisted code is a structural error, never an extension
/// point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, FromRepr, Serialize, Deserialize)]
#[repr(i32)]
pub enum ShapeType {
    NullShape = 0,
    Point = 1,
    PolyLine = 3,
    Polygon = 5,
    MultiPoint = 8,
    PointZ = 11,
    PolyLineZ = 13,
    PolygonZ = 15,
    MultiPointZ = 18,
    PointM = 21,
    PolyLineM = 23,
    PolygonM = 25,
    MultiPointM = 28,
    MultiPatch = 31,
}

/// Axis-aligned extent rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    pub const ZERO: Self = Self {
        x_min: 0.0,
        y_min: 0.0,
        x_max: 0.0,
        y_max: 0.0,
    };
}

/// A closed `min..=max` interval for Z or M values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasureRange {
    pub min: f64,
    pub max: f64,
}

impl MeasureRange {
    /// Build a range from a decoded pair; `min > max` is the format's way of saying
    /// "no such range".
    pub fn from_min_max(min: f64, max: f64) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }
}

/// A pair of double-precision coordinates in the order X, Y.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// An ordered set of vertices in one or more parts; a part is a connected sequence
/// of two or more points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolyLine {
    pub bbox: BoundingBox,
    pub parts: Vec<usize>,
    pub points: Vec<Point>,
}

/// One or more rings; a ring is a closed, non-self-intersecting loop. The rings of a
/// polygon are its parts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub bbox: BoundingBox,
    pub parts: Vec<usize>,
    pub points: Vec<Point>,
}

/// A set of points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultiPoint {
    pub bbox: BoundingBox,
    pub points: Vec<Point>,
}

/// A triplet of coordinates in the order X, Y, Z plus an optional measure.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointZ {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub m: Option<f64>,
}

/// A [`PolyLine`] whose vertices carry Z values and, optionally, measures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolyLineZ {
    pub bbox: BoundingBox,
    pub parts: Vec<usize>,
    pub points: Vec<Point>,
    pub z_range: MeasureRange,
    pub z_values: Vec<f64>,
    pub m_range: Option<MeasureRange>,
    pub m_values: Option<Vec<Option<f64>>>,
}

/// A [`Polygon`] whose vertices carry Z values and, optionally, measures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolygonZ {
    pub bbox: BoundingBox,
    pub parts: Vec<usize>,
    pub points: Vec<Point>,
    pub z_range: MeasureRange,
    pub z_values: Vec<f64>,
    pub m_range: Option<MeasureRange>,
    pub m_values: Option<Vec<Option<f64>>>,
}

/// A set of [`PointZ`]s.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultiPointZ {
    pub bbox: BoundingBox,
    pub points: Vec<Point>,
    pub z_range: MeasureRange,
    pub z_values: Vec<f64>,
    pub m_range: Option<MeasureRange>,
    pub m_values: Option<Vec<Option<f64>>>,
}

/// A pair of coordinates in the order X, Y plus a measure M.
///
/// Unlike the Z kinds, the measure of a `PointM` is always present and is not
/// subject to the no-data sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointM {
    pub x: f64,
    pub y: f64,
    pub m: f64,
}

/// A [`PolyLine`] whose vertices optionally carry measures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolyLineM {
    pub bbox: BoundingBox,
    pub parts: Vec<usize>,
    pub points: Vec<Point>,
    pub m_range: Option<MeasureRange>,
    pub m_values: Option<Vec<Option<f64>>>,
}

/// A [`Polygon`] whose vertices optionally carry measures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolygonM {
    pub bbox: BoundingBox,
    pub parts: Vec<usize>,
    pub points: Vec<Point>,
    pub m_range: Option<MeasureRange>,
    pub m_values: Option<Vec<Option<f64>>>,
}

/// A set of [`PointM`]s.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultiPointM {
    pub bbox: BoundingBox,
    pub points: Vec<Point>,
    pub m_range: Option<MeasureRange>,
    pub m_values: Option<Vec<Option<f64>>>,
}

/// How the vertices of one multipatch part are to be interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, FromRepr, Serialize, Deserialize)]
#[repr(i32)]
pub enum PatchKind {
    TriangleStrip = 0,
    TriangleFan = 1,
    OuterRing = 2,
    InnerRing = 3,
    FirstRing = 4,
    Ring = 5,
}

/// A collection of surface patches. Each part describes one surface and carries a
/// [`PatchKind`] controlling how its vertex order is interpreted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultiPatch {
    pub bbox: BoundingBox,
    pub parts: Vec<usize>,
    pub part_kinds: Vec<PatchKind>,
    pub points: Vec<Point>,
    pub z_range: MeasureRange,
    pub z_values: Vec<f64>,
    pub m_range: Option<MeasureRange>,
    pub m_values: Option<Vec<Option<f64>>>,
}

/// One decoded geometry record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Point(Point),
    PolyLine(PolyLine),
    Polygon(Polygon),
    MultiPoint(MultiPoint),
    PointZ(PointZ),
    PolyLineZ(PolyLineZ),
    PolygonZ(PolygonZ),
    MultiPointZ(MultiPointZ),
    PointM(PointM),
    PolyLineM(PolyLineM),
    PolygonM(PolygonM),
    MultiPointM(MultiPointM),
    MultiPatch(MultiPatch),
}

impl Shape {
    /// The kind code this shape was decoded from.
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Point(_) => ShapeType::Point,
            Shape::PolyLine(_) => ShapeType::PolyLine,
            Shape::Polygon(_) => ShapeType::Polygon,
            Shape::MultiPoint(_) => ShapeType::MultiPoint,
            Shape::PointZ(_) => ShapeType::PointZ,
            Shape::PolyLineZ(_) => ShapeType::PolyLineZ,
            Shape::PolygonZ(_) => ShapeType::PolygonZ,
            Shape::MultiPointZ(_) => ShapeType::MultiPointZ,
            Shape::PointM(_) => ShapeType::PointM,
            Shape::PolyLineM(_) => ShapeType::PolyLineM,
            Shape::PolygonM(_) => ShapeType::PolygonM,
            Shape::MultiPointM(_) => ShapeType::MultiPointM,
            Shape::MultiPatch(_) => ShapeType::MultiPatch,
        }
    }

    /// The per-shape bounding box, for the kinds that carry one.
    ///
    /// The point kinds have no box of their own.
    pub fn bounding_box(&self) -> Option<&BoundingBox> {
        match self {
            Shape::Point(_) | Shape::PointZ(_) | Shape::PointM(_) => None,
            Shape::PolyLine(s) => Some(&s.bbox),
            Shape::Polygon(s) => Some(&s.bbox),
            Shape::MultiPoint(s) => Some(&s.bbox),
            Shape::PolyLineZ(s) => Some(&s.bbox),
            Shape::PolygonZ(s) => Some(&s.bbox),
            Shape::MultiPointZ(s) => Some(&s.bbox),
            Shape::PolyLineM(s) => Some(&s.bbox),
            Shape::PolygonM(s) => Some(&s.bbox),
            Shape::MultiPointM(s) => Some(&s.bbox),
            Shape::MultiPatch(s) => Some(&s.bbox),
        }
    }

    /// A part-bearing view of this shape, for the kinds that have parts.
    pub fn as_parts(&self) -> Option<&dyn HasParts> {
        match self {
            Shape::PolyLine(s) => Some(s),
            Shape::Polygon(s) => Some(s),
            Shape::PolyLineZ(s) => Some(s),
            Shape::PolygonZ(s) => Some(s),
            Shape::PolyLineM(s) => Some(s),
            Shape::PolygonM(s) => Some(s),
            Shape::MultiPatch(s) => Some(s),
            Shape::Point(_)
            | Shape::MultiPoint(_)
            | Shape::PointZ(_)
            | Shape::MultiPointZ(_)
            | Shape::PointM(_)
            | Shape::MultiPointM(_) => None,
        }
    }
}

/// Shared view over the part-bearing shape kinds.
pub trait HasParts {
    /// The flat vertex array.
    fn points(&self) -> &[Point];

    /// Index into [`points`](Self::points) at which each part starts. The first
    /// entry is always 0.
    fn parts(&self) -> &[usize];

    /// The vertex array split at each part-start index beyond the first.
    ///
    /// A single part yields one group spanning all points; the last group always
    /// runs to the end of the point array.
    fn points_by_parts(&self) -> Vec<&[Point]> {
        let points = self.points();
        let parts = self.parts();

        if parts.len() <= 1 {
            return vec![points];
        }

        let mut groups = Vec::with_capacity(parts.len());
        let mut start = 0usize;
        for &end in &parts[1..] {
            let end = end.min(points.len());
            groups.push(&points[start.min(end)..end]);
            start = end;
        }
        groups.push(&points[start.min(points.len())..]);
        groups
    }
}

macro_rules! impl_has_parts {
    ($($kind:ty),+ $(,)?) => {
        $(impl HasParts for $kind {
            fn points(&self) -> &[Point] {
                &self.points
            }

            fn parts(&self) -> &[usize] {
                &self.parts
            }
        })+
    };
}

impl_has_parts!(PolyLine, Polygon, PolyLineZ, PolygonZ, PolyLineM, PolygonM, MultiPatch);
