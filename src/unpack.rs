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

//! Generic fixed-layout binary decoder.
//!
//! [`unpack`] turns a byte buffer and a layout string into a sequence of typed
//! [`Value`]s, in the spirit of Python's `struct.unpack`. The layout string is an
//! optional byte-order marker followed by tokens of the form
//! `[decimal repeat-count][type letter]`:
//!
//! | Marker | Meaning |
//! |---|---|
//! | `<` or `=` | little-endian (the default when no marker is present) |
//! | `>` or `!` | big-endian |
//!
//! | Token | Width | Decodes to |
//! |---|---|---|
//! | `b` / `B` | 1 | signed / unsigned byte as [`Value::Int`] |
//! | `h` / `H` | 2 | signed / unsigned half-word as [`Value::Int`] |
//! | `i`, `l` / `I`, `L` | 4 | signed / unsigned word as [`Value::Int`] |
//! | `q` / `Q` | 8 | signed / unsigned double word as [`Value::Int`] |
//! | `f` / `d` | 4 / 8 | float / double as [`Value::Double`] |
//! | `?` | 1 | [`Value::Bool`] (non-zero is `true`) |
//! | `c` | 1 | one-byte [`Value::Str`] |
//! | `s` | repeat-count | text of repeat-count bytes as a single [`Value::Str`] |
//! | `x` | 1 | padding, no value produced |
//!
//! The byte-order marker applies to the multi-byte numeric tokens only; text is
//! decoded byte by byte and is never swapped. Text tokens try a list of encodings in
//! order, [`DEFAULT_ENCODINGS`] unless the caller supplies its own via
//! [`unpack_with_encodings`]; the shapefile attribute table declares no encoding, so
//! the legacy Western code page is tried first and UTF-8 second.

use crate::{ShapefileResult, error::Details};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use strum_macros::{Display, EnumDiscriminants};

/// The encodings tried, in order, when decoding text tokens: Windows-1252, then UTF-8.
pub const DEFAULT_ENCODINGS: &[&Encoding] = &[WINDOWS_1252, UTF_8];

/// A single scalar decoded from a byte buffer.
#[derive(Clone, Debug, PartialEq, EnumDiscriminants, Display)]
#[strum_discriminants(name(ValueKind), derive(Display))]
pub enum Value {
    /// Decoded text (`s` and `c` tokens).
    Str(String),
    /// A one-byte boolean (`?` token).
    Bool(bool),
    /// Any of the fixed-width integer tokens, widened to 64 bits.
    Int(i64),
    /// A 32- or 64-bit float (`f` and `d` tokens), widened to 64 bits.
    Double(f64),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Consume the value as an integer, or fail with
    /// [`Details::UnexpectedValueKind`].
    pub fn into_int(self) -> ShapefileResult<i64> {
        match self {
            Value::Int(i) => Ok(i),
            other => Err(Details::UnexpectedValueKind {
                expected: ValueKind::Int,
                actual: ValueKind::from(&other),
            }
            .into()),
        }
    }

    /// Consume the value as a double, or fail with
    /// [`Details::UnexpectedValueKind`].
    pub fn into_double(self) -> ShapefileResult<f64> {
        match self {
            Value::Double(d) => Ok(d),
            other => Err(Details::UnexpectedValueKind {
                expected: ValueKind::Double,
                actual: ValueKind::from(&other),
            }
            .into()),
        }
    }

    /// Consume the value as text, or fail with [`Details::UnexpectedValueKind`].
    pub fn into_string(self) -> ShapefileResult<String> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(Details::UnexpectedValueKind {
                expected: ValueKind::Str,
                actual: ValueKind::from(&other),
            }
            .into()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

/// Split the optional leading byte-order marker off a layout string.
fn byte_order(layout: &str) -> ShapefileResult<(ByteOrder, &str)> {
    let mut chars = layout.chars();
    match chars.next() {
        Some('<') | Some('=') => Ok((ByteOrder::Little, chars.as_str())),
        Some('>') | Some('!') => Ok((ByteOrder::Big, chars.as_str())),
        Some('@') => Err(Details::NativeByteOrder.into()),
        _ => Ok((ByteOrder::Little, layout)),
    }
}

/// Byte width of a non-`s` type token, or `None` for an unrecognized token.
fn token_width(token: char) -> Option<usize> {
    match token {
        'c' | 'b' | 'B' | '?' | 'x' => Some(1),
        'h' | 'H' => Some(2),
        'i' | 'l' | 'I' | 'L' | 'f' => Some(4),
        'q' | 'Q' | 'd' => Some(8),
        ' ' => Some(0),
        _ => None,
    }
}

/// Total number of bytes a layout string describes, the `struct.calcsize` analogue.
///
/// Fails with [`Details::UnsupportedField`] on an unrecognized type token.
pub fn layout_len(layout: &str) -> ShapefileResult<usize> {
    let (_, tokens) = byte_order(layout)?;
    let mut total = 0usize;
    let mut repeat = 0usize;

    for token in tokens.chars() {
        if let Some(digit) = token.to_digit(10) {
            repeat = repeat * 10 + digit as usize;
            continue;
        }
        if token == 's' {
            total += repeat.max(1);
        } else {
            match token_width(token) {
                Some(width) => total += width * repeat.max(1),
                None => return Err(Details::UnsupportedField(token).into()),
            }
        }
        repeat = 0;
    }

    Ok(total)
}

/// Decode `data` according to `layout` using [`DEFAULT_ENCODINGS`] for text.
pub fn unpack(data: &[u8], layout: &str) -> ShapefileResult<Vec<Value>> {
    unpack_with_encodings(data, layout, DEFAULT_ENCODINGS)
}

/// Decode `data` according to `layout`, trying `encodings` in order for `s` tokens.
///
/// Fails with [`Details::LayoutMismatch`] when the buffer length is not exactly the
/// layout's byte length and with [`Details::UnsupportedField`] for an unrecognized
/// type token.
pub fn unpack_with_encodings(
    data: &[u8],
    layout: &str,
    encodings: &[&'static Encoding],
) -> ShapefileResult<Vec<Value>> {
    let expected = layout_len(layout)?;
    if expected != data.len() {
        return Err(Details::LayoutMismatch {
            layout: layout.to_string(),
            expected,
            actual: data.len(),
        }
        .into());
    }

    let (order, tokens) = byte_order(layout)?;
    let mut values = Vec::new();
    let mut pos = 0usize;
    let mut repeat = 0usize;

    for token in tokens.chars() {
        if let Some(digit) = token.to_digit(10) {
            repeat = repeat * 10 + digit as usize;
            continue;
        }

        if token == 's' {
            let len = repeat.max(1);
            let text = decode_text(&data[pos..pos + len], encodings)?;
            values.push(Value::Str(text));
            pos += len;
            repeat = 0;
            continue;
        }

        for _ in 0..repeat.max(1) {
            match token {
                // The byte-order marker never applies to text.
                'c' => {
                    let text = decode_text(&data[pos..pos + 1], &[UTF_8])?;
                    values.push(Value::Str(text));
                    pos += 1;
                }
                'b' => {
                    values.push(Value::Int(data[pos] as i8 as i64));
                    pos += 1;
                }
                'B' => {
                    values.push(Value::Int(data[pos] as i64));
                    pos += 1;
                }
                '?' => {
                    values.push(Value::Bool(data[pos] != 0));
                    pos += 1;
                }
                'h' => {
                    let bytes = take::<2>(data, &mut pos);
                    let n = match order {
                        ByteOrder::Little => i16::from_le_bytes(bytes),
                        ByteOrder::Big => i16::from_be_bytes(bytes),
                    };
                    values.push(Value::Int(n as i64));
                }
                'H' => {
                    let bytes = take::<2>(data, &mut pos);
                    let n = match order {
                        ByteOrder::Little => u16::from_le_bytes(bytes),
                        ByteOrder::Big => u16::from_be_bytes(bytes),
                    };
                    values.push(Value::Int(n as i64));
                }
                'i' | 'l' => {
                    let bytes = take::<4>(data, &mut pos);
                    let n = match order {
                        ByteOrder::Little => i32::from_le_bytes(bytes),
                        ByteOrder::Big => i32::from_be_bytes(bytes),
                    };
                    values.push(Value::Int(n as i64));
                }
                'I' | 'L' => {
                    let bytes = take::<4>(data, &mut pos);
                    let n = match order {
                        ByteOrder::Little => u32::from_le_bytes(bytes),
                        ByteOrder::Big => u32::from_be_bytes(bytes),
                    };
                    values.push(Value::Int(n as i64));
                }
                'q' => {
                    let bytes = take::<8>(data, &mut pos);
                    let n = match order {
                        ByteOrder::Little => i64::from_le_bytes(bytes),
                        ByteOrder::Big => i64::from_be_bytes(bytes),
                    };
                    values.push(Value::Int(n));
                }
                'Q' => {
                    let bytes = take::<8>(data, &mut pos);
                    let n = match order {
                        ByteOrder::Little => u64::from_le_bytes(bytes),
                        ByteOrder::Big => u64::from_be_bytes(bytes),
                    };
                    values.push(Value::Int(n as i64));
                }
                'f' => {
                    let bytes = take::<4>(data, &mut pos);
                    let n = match order {
                        ByteOrder::Little => f32::from_le_bytes(bytes),
                        ByteOrder::Big => f32::from_be_bytes(bytes),
                    };
                    values.push(Value::Double(n as f64));
                }
                'd' => {
                    let bytes = take::<8>(data, &mut pos);
                    let n = match order {
                        ByteOrder::Little => f64::from_le_bytes(bytes),
                        ByteOrder::Big => f64::from_be_bytes(bytes),
                    };
                    values.push(Value::Double(n));
                }
                'x' => pos += 1,
                ' ' => {}
                other => return Err(Details::UnsupportedField(other).into()),
            }
        }
        repeat = 0;
    }

    Ok(values)
}

/// Copy the next `N` bytes out of `data` and advance `pos`.
///
/// The caller has already verified that the buffer length matches the layout.
fn take<const N: usize>(data: &[u8], pos: &mut usize) -> [u8; N] {
    let bytes = data[*pos..*pos + N]
        .try_into()
        .unwrap_or_else(|_| unreachable!("buffer length is checked against the layout"));
    *pos += N;
    bytes
}

/// Decode text trying each encoding in order; the first one that decodes the whole
/// buffer without malformed sequences wins.
fn decode_text(bytes: &[u8], encodings: &[&'static Encoding]) -> ShapefileResult<String> {
    for encoding in encodings {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return Ok(text.into_owned());
        }
    }
    Err(Details::DecodeText(bytes.to_vec()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Details;
    use anyhow::Result;
    use hex_literal::hex;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("<b", 1)]
    #[case("<B", 1)]
    #[case("<?", 1)]
    #[case("<c", 1)]
    #[case("<h", 2)]
    #[case("<H", 2)]
    #[case("<i", 4)]
    #[case("<l", 4)]
    #[case("<I", 4)]
    #[case("<L", 4)]
    #[case("<q", 8)]
    #[case("<Q", 8)]
    #[case("<f", 4)]
    #[case("<d", 8)]
    #[case("<x", 1)]
    #[case("<s", 1)]
    #[case("<11s", 11)]
    #[case("<4d", 32)]
    #[case(">2i", 8)]
    #[case("<xBBBihh20x", 32)]
    #[case("2d", 16)]
    fn layout_lengths(#[case] layout: &str, #[case] expected: usize) -> Result<()> {
        assert_eq!(layout_len(layout)?, expected);
        Ok(())
    }

    #[test]
    fn signed_integers_round_trip() -> Result<()> {
        let mut data = Vec::new();
        data.extend_from_slice(&(-5i8).to_le_bytes());
        data.extend_from_slice(&(-1234i16).to_le_bytes());
        data.extend_from_slice(&(-123456i32).to_le_bytes());
        data.extend_from_slice(&(-1234567890123i64).to_le_bytes());

        let values = unpack(&data, "<bhiq")?;
        assert_eq!(
            values,
            vec![
                Value::Int(-5),
                Value::Int(-1234),
                Value::Int(-123456),
                Value::Int(-1234567890123),
            ]
        );
        Ok(())
    }

    #[test]
    fn unsigned_integers_round_trip() -> Result<()> {
        let mut data = Vec::new();
        data.extend_from_slice(&250u8.to_le_bytes());
        data.extend_from_slice(&65000u16.to_le_bytes());
        data.extend_from_slice(&4000000000u32.to_le_bytes());
        data.extend_from_slice(&42u64.to_le_bytes());

        let values = unpack(&data, "<BHIQ")?;
        assert_eq!(
            values,
            vec![
                Value::Int(250),
                Value::Int(65000),
                Value::Int(4000000000),
                Value::Int(42),
            ]
        );
        Ok(())
    }

    #[test]
    fn floats_round_trip() -> Result<()> {
        let mut data = Vec::new();
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&(-2.25f64).to_le_bytes());

        let values = unpack(&data, "<fd")?;
        assert_eq!(values, vec![Value::Double(1.5), Value::Double(-2.25)]);
        Ok(())
    }

    #[test]
    fn big_endian_swaps_numerics() -> Result<()> {
        let mut data = Vec::new();
        data.extend_from_slice(&0x0102i16.to_be_bytes());
        data.extend_from_slice(&0x01020304i32.to_be_bytes());
        data.extend_from_slice(&3.5f64.to_be_bytes());

        let values = unpack(&data, ">hid")?;
        assert_eq!(
            values,
            vec![Value::Int(0x0102), Value::Int(0x01020304), Value::Double(3.5)]
        );
        Ok(())
    }

    #[test]
    fn repeat_counts_expand() -> Result<()> {
        let data = hex!("01 00 00 00 02 00 00 00 03 00 00 00");
        let values = unpack(&data, "<3i")?;
        assert_eq!(
            values,
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
        Ok(())
    }

    #[test]
    fn bool_and_char_round_trip() -> Result<()> {
        let data = hex!("01 00 41");
        let values = unpack(&data, "<2?c")?;
        assert_eq!(
            values,
            vec![
                Value::Bool(true),
                Value::Bool(false),
                Value::Str("A".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn padding_produces_no_value() -> Result<()> {
        let data = hex!("ff 07 00 00 00 ff");
        let values = unpack(&data, "<xix")?;
        assert_eq!(values, vec![Value::Int(7)]);
        Ok(())
    }

    #[test]
    fn text_token_consumes_repeat_count_bytes() -> Result<()> {
        let values = unpack(b"NAME\0\0\0", "<7s")?;
        assert_eq!(values, vec![Value::Str("NAME\0\0\0".to_string())]);
        Ok(())
    }

    #[test]
    fn text_is_never_byte_swapped() -> Result<()> {
        let values = unpack(b"AB", ">2s")?;
        assert_eq!(values, vec![Value::Str("AB".to_string())]);
        Ok(())
    }

    #[test]
    fn legacy_code_page_decodes_high_bytes() -> Result<()> {
        // 0xE9 is 'é' in Windows-1252 but malformed UTF-8.
        let values = unpack(&[0x63, 0x61, 0x66, 0xE9], "<4s")?;
        assert_eq!(values, vec![Value::Str("café".to_string())]);
        Ok(())
    }

    #[test]
    fn utf8_fallback_applies_when_preferred_encoding_fails() -> Result<()> {
        // A caller-supplied list with UTF-8 first still falls through on malformed
        // UTF-8 input.
        let values =
            unpack_with_encodings(&[0xE9], "<s", &[UTF_8, WINDOWS_1252])?;
        assert_eq!(values, vec![Value::Str("é".to_string())]);
        Ok(())
    }

    #[rstest]
    #[case("<i", 3)]
    #[case("<i", 5)]
    #[case("<2d", 15)]
    #[case(">2i", 7)]
    #[case("<11s", 10)]
    fn layout_mismatch_is_fatal(#[case] layout: &str, #[case] len: usize) {
        let data = vec![0u8; len];
        let err = unpack(&data, layout).unwrap_err();
        assert!(matches!(
            err.details(),
            Details::LayoutMismatch { .. }
        ));
    }

    #[test]
    fn unsupported_token_is_fatal() {
        let err = unpack(&[0u8; 4], "<z").unwrap_err();
        assert!(matches!(err.details(), Details::UnsupportedField('z')));
    }

    #[test]
    fn native_byte_order_is_rejected() {
        let err = unpack(&[0u8; 4], "@i").unwrap_err();
        assert!(matches!(err.details(), Details::NativeByteOrder));
    }

    #[test]
    fn missing_marker_defaults_to_little_endian() -> Result<()> {
        let values = unpack(&0x01020304i32.to_le_bytes(), "i")?;
        assert_eq!(values, vec![Value::Int(0x01020304)]);
        Ok(())
    }

    #[test]
    fn accessors_match_variants() {
        assert_eq!(Value::Int(7).as_int(), Some(7));
        assert_eq!(Value::Int(7).as_double(), None);
        assert_eq!(Value::Double(1.0).as_double(), Some(1.0));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Str("x".into()).as_str(), Some("x"));
    }

    #[test]
    fn into_int_reports_kind_mismatch() {
        let err = Value::Double(1.0).into_int().unwrap_err();
        assert!(matches!(
            err.details(),
            Details::UnexpectedValueKind { .. }
        ));
    }
}
