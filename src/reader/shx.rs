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

//! Decoder for the offset index (`.shx`).

use crate::{
    ShapefileResult,
    error::Details,
    reader::{next_int, shp::FILE_HEADER_LEN},
    unpack::unpack,
};
use log::warn;
use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

/// Reader over the offset index: an ordinal to byte-offset table for O(1) random
/// access into the geometry stream.
///
/// The whole table is small (8 bytes per record) and is decoded eagerly on
/// construction.
pub struct ShxReader {
    offsets: Vec<u64>,
}

impl ShxReader {
    pub fn open(path: impl AsRef<Path>) -> ShapefileResult<Self> {
        let file = File::open(path.as_ref()).map_err(|source| Details::OpenFile {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::new(file)
    }

    pub fn new<R: Read + Seek>(mut source: R) -> ShapefileResult<Self> {
        let offsets = read_offsets(&mut source)?;
        Ok(Self { offsets })
    }

    /// Number of records in the index.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Byte offset of record `ordinal` in the geometry stream.
    ///
    /// Fails with [`Details::IndexOutOfBounds`] for an ordinal at or past the record
    /// count.
    pub fn offset_of(&self, ordinal: usize) -> ShapefileResult<u64> {
        self.offsets
            .get(ordinal)
            .copied()
            .ok_or_else(|| {
                Details::IndexOutOfBounds {
                    index: ordinal,
                    count: self.offsets.len(),
                }
                .into()
            })
    }
}

fn read_offsets<R: Read + Seek>(source: &mut R) -> ShapefileResult<Vec<u64>> {
    // Only the declared-length field of the prologue is used, at byte 24.
    source
        .seek(SeekFrom::Start(24))
        .map_err(Details::Seek)?;

    let mut buf = [0u8; 4];
    source.read_exact(&mut buf).map_err(Details::ReadBytes)?;
    let mut values = unpack(&buf, ">i").map(Vec::into_iter)?;
    let declared_length = next_int(&mut values)? * 2;
    let mut record_count =
        usize::try_from((declared_length - FILE_HEADER_LEN as i64) / 8).unwrap_or(0);

    // Same distrust of declared lengths as the geometry stream: measure the file
    // and recompute the count when the header disagrees.
    let end_of_file = source.seek(SeekFrom::End(0)).map_err(Details::Seek)?;
    let measured_count = (end_of_file.saturating_sub(FILE_HEADER_LEN) / 8) as usize;
    if record_count != measured_count {
        warn!(
            "Offset index declares {record_count} record(s) but measures {measured_count}; \
             using the measured count"
        );
        record_count = measured_count;
    }

    source
        .seek(SeekFrom::Start(FILE_HEADER_LEN))
        .map_err(Details::Seek)?;
    let mut body = vec![0u8; record_count * 8];
    source.read_exact(&mut body).map_err(Details::ReadBytes)?;

    let mut offsets = Vec::with_capacity(record_count);
    for chunk in body.chunks_exact(8) {
        let mut values = unpack(chunk, ">2i").map(Vec::into_iter)?;
        let offset_words = next_int(&mut values)?;
        // The paired content length is not retained; only the offset matters.
        offsets.push(offset_words as u64 * 2);
    }

    Ok(offsets)
}
