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

//! Decoder for the geometry stream (`.shp`).

use crate::{
    ShapefileResult,
    error::Details,
    reader::{next_double, next_int},
    types::{
        BoundingBox, MeasureRange, MultiPatch, MultiPoint, MultiPointM, MultiPointZ, PatchKind,
        Point, PointM, PointZ, PolyLine, PolyLineM, PolyLineZ, Polygon, PolygonM, PolygonZ, Shape,
        ShapeType,
    },
    unpack::unpack,
};
use log::warn;
use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

/// Byte length of the 100-byte file prologue shared by `.shp` and `.shx`.
pub(crate) const FILE_HEADER_LEN: u64 = 100;

/// Raw measures below this are "no data" rather than literal values.
const MEASURE_NO_DATA: f64 = -1e38;

#[derive(Clone, Debug)]
struct ShpHeader {
    /// Measured stream length in bytes; the declared header length is not trusted.
    file_length: u64,
    shape_type: ShapeType,
    bbox: BoundingBox,
    z_range: Option<MeasureRange>,
    m_range: Option<MeasureRange>,
}

/// Reader over a geometry stream.
///
/// The header is decoded eagerly on construction; records are decoded on demand,
/// either sequentially via [`read_all_shapes`](Self::read_all_shapes) or one at a
/// time via [`read_shape_at`](Self::read_shape_at). The reader owns its source
/// exclusively and releases it when dropped.
pub struct ShpReader<R> {
    source: R,
    header: ShpHeader,
}

impl ShpReader<File> {
    pub fn open(path: impl AsRef<Path>) -> ShapefileResult<Self> {
        let file = File::open(path.as_ref()).map_err(|source| Details::OpenFile {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::new(file)
    }
}

impl<R: Read + Seek> ShpReader<R> {
    pub fn new(source: R) -> ShapefileResult<Self> {
        let mut reader = Self {
            source,
            header: ShpHeader {
                file_length: 0,
                shape_type: ShapeType::NullShape,
                bbox: BoundingBox::ZERO,
                z_range: None,
                m_range: None,
            },
        };
        reader.header = reader.read_header()?;
        Ok(reader)
    }

    /// The file-level bounding box.
    pub fn bounding_box(&self) -> &BoundingBox {
        &self.header.bbox
    }

    /// The file-level Z range, if the header declares one.
    pub fn z_range(&self) -> Option<MeasureRange> {
        self.header.z_range
    }

    /// The file-level M range, if the header declares one.
    pub fn m_range(&self) -> Option<MeasureRange> {
        self.header.m_range
    }

    /// The kind every non-null record in this stream must have.
    pub fn shape_type(&self) -> ShapeType {
        self.header.shape_type
    }

    fn read_header(&mut self) -> ShapefileResult<ShpHeader> {
        // The declared length lives at byte 24 of the prologue.
        self.seek(24)?;

        let buf = self.read_buf(4)?;
        let mut values = unpack(&buf, ">i").map(Vec::into_iter)?;
        let declared_length = next_int(&mut values)? as u64 * 2;

        let buf = self.read_buf(8)?;
        let mut values = unpack(&buf, "<ii").map(Vec::into_iter)?;
        let _version = next_int(&mut values)?;
        let raw_shape_type = next_int(&mut values)? as i32;
        let shape_type = ShapeType::from_repr(raw_shape_type)
            .ok_or(Details::UnknownShapeType(raw_shape_type))?;

        let bbox = self.read_bounding_box()?;

        let buf = self.read_buf(32)?;
        let mut values = unpack(&buf, "<4d").map(Vec::into_iter)?;
        let z_range = MeasureRange::from_min_max(next_double(&mut values)?, next_double(&mut values)?);
        let m_range = MeasureRange::from_min_max(next_double(&mut values)?, next_double(&mut values)?);

        // The declared length is informational only; the measured stream length is
        // the ground truth for record iteration.
        let file_length = self
            .source
            .seek(SeekFrom::End(0))
            .map_err(Details::Seek)?;
        if file_length != declared_length {
            warn!(
                "Geometry stream declares {declared_length} byte(s) but measures {file_length}; \
                 using the measured length"
            );
        }

        Ok(ShpHeader {
            file_length,
            shape_type,
            bbox,
            z_range,
            m_range,
        })
    }

    /// Decode every record, in stream order. A null record decodes to `None`.
    pub fn read_all_shapes(&mut self) -> ShapefileResult<Vec<Option<Shape>>> {
        let mut offset = FILE_HEADER_LEN;
        let mut shapes = Vec::new();

        while let Some((shape, next_offset)) = self.read_shape_at(offset)? {
            shapes.push(shape);
            offset = next_offset;
        }

        Ok(shapes)
    }

    /// Decode exactly one record at `offset`, returning the shape and the offset of
    /// the record after it.
    ///
    /// Returns `Ok(None)` when `offset` is already the end of the stream. The next
    /// offset is computed from the record header alone, so iteration stays on track
    /// even when a record's payload is structurally bad.
    pub fn read_shape_at(
        &mut self,
        offset: u64,
    ) -> ShapefileResult<Option<(Option<Shape>, u64)>> {
        if offset == self.header.file_length {
            return Ok(None);
        }

        self.seek(offset)?;

        let buf = self.read_buf(8)?;
        let mut values = unpack(&buf, ">2i").map(Vec::into_iter)?;
        let ordinal = next_int(&mut values)? as i32;
        let content_words = next_int(&mut values)? as i32;
        if content_words < 0 {
            return Err(Details::NegativeCount(content_words).into());
        }
        let next_offset = offset + 8 + content_words as u64 * 2;

        let buf = self.read_buf(4)?;
        let mut values = unpack(&buf, "<i").map(Vec::into_iter)?;
        let raw_shape_type = next_int(&mut values)? as i32;
        let shape_type = ShapeType::from_repr(raw_shape_type)
            .ok_or(Details::UnknownShapeType(raw_shape_type))?;

        if shape_type == ShapeType::NullShape {
            // A null record has no payload and is not an error.
            return Ok(Some((None, next_offset)));
        }
        if shape_type != self.header.shape_type {
            return Err(Details::ShapeTypeMismatch {
                ordinal,
                file: self.header.shape_type,
                record: shape_type,
            }
            .into());
        }

        let shape = match shape_type {
            ShapeType::Point => Shape::Point(self.read_point()?),
            ShapeType::PolyLine => {
                let (bbox, parts, points) = self.read_poly_base()?;
                Shape::PolyLine(PolyLine { bbox, parts, points })
            }
            ShapeType::Polygon => {
                let (bbox, parts, points) = self.read_poly_base()?;
                Shape::Polygon(Polygon { bbox, parts, points })
            }
            ShapeType::MultiPoint => {
                let (bbox, points) = self.read_multi_point_base()?;
                Shape::MultiPoint(MultiPoint { bbox, points })
            }
            ShapeType::PointZ => Shape::PointZ(self.read_point_z()?),
            ShapeType::PolyLineZ => {
                let (bbox, parts, points) = self.read_poly_base()?;
                let (z_range, z_values, m_range, m_values) = self.read_z_block(points.len())?;
                Shape::PolyLineZ(PolyLineZ {
                    bbox,
                    parts,
                    points,
                    z_range,
                    z_values,
                    m_range,
                    m_values,
                })
            }
            ShapeType::PolygonZ => {
                let (bbox, parts, points) = self.read_poly_base()?;
                let (z_range, z_values, m_range, m_values) = self.read_z_block(points.len())?;
                Shape::PolygonZ(PolygonZ {
                    bbox,
                    parts,
                    points,
                    z_range,
                    z_values,
                    m_range,
                    m_values,
                })
            }
            ShapeType::MultiPointZ => {
                let (bbox, points) = self.read_multi_point_base()?;
                let (z_range, z_values, m_range, m_values) = self.read_z_block(points.len())?;
                Shape::MultiPointZ(MultiPointZ {
                    bbox,
                    points,
                    z_range,
                    z_values,
                    m_range,
                    m_values,
                })
            }
            ShapeType::PointM => {
                let point = self.read_point()?;
                let m = self.read_double()?;
                Shape::PointM(PointM {
                    x: point.x,
                    y: point.y,
                    m,
                })
            }
            ShapeType::PolyLineM => {
                let (bbox, parts, points) = self.read_poly_base()?;
                let (m_range, m_values) = self.read_m_block(points.len())?;
                Shape::PolyLineM(PolyLineM {
                    bbox,
                    parts,
                    points,
                    m_range,
                    m_values,
                })
            }
            ShapeType::PolygonM => {
                let (bbox, parts, points) = self.read_poly_base()?;
                let (m_range, m_values) = self.read_m_block(points.len())?;
                Shape::PolygonM(PolygonM {
                    bbox,
                    parts,
                    points,
                    m_range,
                    m_values,
                })
            }
            ShapeType::MultiPointM => {
                let (bbox, points) = self.read_multi_point_base()?;
                let (m_range, m_values) = self.read_m_block(points.len())?;
                Shape::MultiPointM(MultiPointM {
                    bbox,
                    points,
                    m_range,
                    m_values,
                })
            }
            ShapeType::MultiPatch => Shape::MultiPatch(self.read_multi_patch()?),
            ShapeType::NullShape => unreachable!("null records return before payload decoding"),
        };

        Ok(Some((Some(shape), next_offset)))
    }

    fn read_point(&mut self) -> ShapefileResult<Point> {
        let buf = self.read_buf(16)?;
        let mut values = unpack(&buf, "<2d").map(Vec::into_iter)?;
        Ok(Point {
            x: next_double(&mut values)?,
            y: next_double(&mut values)?,
        })
    }

    fn read_point_z(&mut self) -> ShapefileResult<PointZ> {
        let buf = self.read_buf(32)?;
        let mut values = unpack(&buf, "<4d").map(Vec::into_iter)?;
        let x = next_double(&mut values)?;
        let y = next_double(&mut values)?;
        let z = next_double(&mut values)?;
        let m = next_double(&mut values)?;
        Ok(PointZ {
            x,
            y,
            z,
            m: (m >= MEASURE_NO_DATA).then_some(m),
        })
    }

    /// Bounding box, part-start indices and point array shared by the poly kinds.
    fn read_poly_base(&mut self) -> ShapefileResult<(BoundingBox, Vec<usize>, Vec<Point>)> {
        let bbox = self.read_bounding_box()?;

        let part_count = self.read_count()?;
        let point_count = self.read_count()?;

        let parts = self.read_part_indices(part_count)?;
        let points = self.read_points(point_count)?;

        Ok((bbox, parts, points))
    }

    fn read_multi_point_base(&mut self) -> ShapefileResult<(BoundingBox, Vec<Point>)> {
        let bbox = self.read_bounding_box()?;
        let point_count = self.read_count()?;
        let points = self.read_points(point_count)?;
        Ok((bbox, points))
    }

    fn read_multi_patch(&mut self) -> ShapefileResult<MultiPatch> {
        let bbox = self.read_bounding_box()?;

        let part_count = self.read_count()?;
        let point_count = self.read_count()?;

        let parts = self.read_part_indices(part_count)?;

        let mut part_kinds = Vec::with_capacity(part_count);
        for raw in self.read_i32_array(part_count)? {
            let raw = raw as i32;
            part_kinds
                .push(PatchKind::from_repr(raw).ok_or(Details::UnknownPatchKind(raw))?);
        }

        let points = self.read_points(point_count)?;
        let (z_range, z_values, m_range, m_values) = self.read_z_block(points.len())?;

        Ok(MultiPatch {
            bbox,
            parts,
            part_kinds,
            points,
            z_range,
            z_values,
            m_range,
            m_values,
        })
    }

    /// Z range and values plus, when the file-level M range is present, the M range
    /// and sentinel-filtered M values.
    #[allow(clippy::type_complexity)]
    fn read_z_block(
        &mut self,
        point_count: usize,
    ) -> ShapefileResult<(
        MeasureRange,
        Vec<f64>,
        Option<MeasureRange>,
        Option<Vec<Option<f64>>>,
    )> {
        let (z_range, z_values) = self.read_measure_array(point_count)?;
        let (m_range, m_values) = self.read_m_block(point_count)?;
        Ok((z_range, z_values, m_range, m_values))
    }

    /// M range and sentinel-filtered values, present only when the file header
    /// declares a global M range.
    #[allow(clippy::type_complexity)]
    fn read_m_block(
        &mut self,
        point_count: usize,
    ) -> ShapefileResult<(Option<MeasureRange>, Option<Vec<Option<f64>>>)> {
        if self.header.m_range.is_none() {
            return Ok((None, None));
        }

        let (range, values) = self.read_measure_array(point_count)?;
        let values = values
            .into_iter()
            .map(|m| (m >= MEASURE_NO_DATA).then_some(m))
            .collect();
        Ok((Some(range), Some(values)))
    }

    fn read_bounding_box(&mut self) -> ShapefileResult<BoundingBox> {
        let buf = self.read_buf(32)?;
        let mut values = unpack(&buf, "<4d").map(Vec::into_iter)?;
        Ok(BoundingBox {
            x_min: next_double(&mut values)?,
            y_min: next_double(&mut values)?,
            x_max: next_double(&mut values)?,
            y_max: next_double(&mut values)?,
        })
    }

    fn read_double(&mut self) -> ShapefileResult<f64> {
        let buf = self.read_buf(8)?;
        let mut values = unpack(&buf, "<d").map(Vec::into_iter)?;
        next_double(&mut values)
    }

    /// A part or point count; negative counts are a structural error.
    fn read_count(&mut self) -> ShapefileResult<usize> {
        let buf = self.read_buf(4)?;
        let mut values = unpack(&buf, "<i").map(Vec::into_iter)?;
        let count = next_int(&mut values)? as i32;
        usize::try_from(count).map_err(|_| Details::NegativeCount(count).into())
    }

    fn read_i32_array(&mut self, count: usize) -> ShapefileResult<Vec<i64>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let buf = self.read_buf(count * 4)?;
        let values = unpack(&buf, &format!("<{count}i"))?;
        values.into_iter().map(|v| v.into_int()).collect()
    }

    fn read_part_indices(&mut self, count: usize) -> ShapefileResult<Vec<usize>> {
        self.read_i32_array(count)?
            .into_iter()
            .map(|raw| usize::try_from(raw).map_err(|_| Details::NegativeCount(raw as i32).into()))
            .collect()
    }

    fn read_points(&mut self, count: usize) -> ShapefileResult<Vec<Point>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let buf = self.read_buf(count * 16)?;
        let doubles = count * 2;
        let mut values = unpack(&buf, &format!("<{doubles}d")).map(Vec::into_iter)?;

        let mut points = Vec::with_capacity(count);
        for _ in 0..count {
            points.push(Point {
                x: next_double(&mut values)?,
                y: next_double(&mut values)?,
            });
        }
        Ok(points)
    }

    /// A `(min, max)` pair followed by `count` raw doubles. Consumes nothing when
    /// `count` is zero.
    fn read_measure_array(&mut self, count: usize) -> ShapefileResult<(MeasureRange, Vec<f64>)> {
        if count == 0 {
            return Ok((MeasureRange { min: 0.0, max: 0.0 }, Vec::new()));
        }

        let buf = self.read_buf(16)?;
        let mut values = unpack(&buf, "<2d").map(Vec::into_iter)?;
        let range = MeasureRange {
            min: next_double(&mut values)?,
            max: next_double(&mut values)?,
        };

        let buf = self.read_buf(count * 8)?;
        let mut values = unpack(&buf, &format!("<{count}d")).map(Vec::into_iter)?;
        let mut array = Vec::with_capacity(count);
        for _ in 0..count {
            array.push(next_double(&mut values)?);
        }

        Ok((range, array))
    }

    fn seek(&mut self, offset: u64) -> ShapefileResult<()> {
        self.source
            .seek(SeekFrom::Start(offset))
            .map_err(Details::Seek)?;
        Ok(())
    }

    fn read_buf(&mut self, len: usize) -> ShapefileResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.source
            .read_exact(&mut buf)
            .map_err(Details::ReadBytes)?;
        Ok(buf)
    }
}
