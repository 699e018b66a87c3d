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

//! The decoded attribute data model.
//!
//! A [`Record`] is an ordered list of named, typed values parallel to one geometry
//! record. A field whose source text fails to parse is *omitted* from the record
//! rather than stored as a null: looking it up by name returns `None`, exactly as if
//! the attribute table had no such column for that row.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// One-letter field type codes from the attribute table's field descriptors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum FieldType {
    Character,
    Date,
    Numeric,
    Floating,
    Logical,
    Memo,
}

impl FieldType {
    /// Map a descriptor's type letter to a [`FieldType`].
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'C' => Some(FieldType::Character),
            'D' => Some(FieldType::Date),
            'N' => Some(FieldType::Numeric),
            'F' => Some(FieldType::Floating),
            'L' => Some(FieldType::Logical),
            'M' => Some(FieldType::Memo),
            _ => None,
        }
    }
}

/// A calendar date as stored in the attribute table (no time zone, no time of day).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Date {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

impl Date {
    /// Parse an 8-digit `YYYYMMDD` string.
    ///
    /// Returns `None` for anything that is not exactly eight ASCII digits forming a
    /// plausible calendar date.
    pub fn parse_yyyymmdd(text: &str) -> Option<Self> {
        if text.len() != 8 || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let year = text[0..4].parse().ok()?;
        let month = text[4..6].parse().ok()?;
        let day = text[6..8].parse().ok()?;

        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }

        Some(Self { year, month, day })
    }
}

/// One typed attribute value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Character(String),
    Date(Date),
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Character(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            FieldValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Interpret one field's raw text according to its declared type.
///
/// `None` means the field is omitted from its record (soft parse failure); it never
/// aborts the record. `has_decimals` is the descriptor's decimal flag, which forces
/// a `Numeric` field to decode as a real number.
pub(crate) fn interpret_field(
    field_type: FieldType,
    raw: &str,
    has_decimals: bool,
) -> Option<FieldValue> {
    let text = raw.trim();

    match field_type {
        FieldType::Character | FieldType::Memo => Some(FieldValue::Character(text.to_string())),
        FieldType::Date => Date::parse_yyyymmdd(text).map(FieldValue::Date),
        FieldType::Numeric => {
            if text.is_empty() {
                // An all-blank numeric cell is kept as empty text, not dropped.
                Some(FieldValue::Character(String::new()))
            } else if has_decimals || text.contains('.') {
                text.parse().ok().map(FieldValue::Double)
            } else {
                text.parse().ok().map(FieldValue::Int)
            }
        }
        FieldType::Floating => text.parse().ok().map(FieldValue::Double),
        FieldType::Logical => Some(FieldValue::Bool(matches!(
            text,
            "T" | "t" | "Y" | "y"
        ))),
    }
}

/// An ordered list of named attribute values for one record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub(crate) fn new(fields: Vec<(String, FieldValue)>) -> Self {
        Self { fields }
    }

    /// Look up a field by name.
    ///
    /// `None` means the record has no such field, including the case where the field
    /// existed in the table but its text failed to parse.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// The fields in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl IntoIterator for Record {
    type Item = (String, FieldValue);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn date_parses_eight_digit_form() {
        assert_eq!(
            Date::parse_yyyymmdd("20240131"),
            Some(Date {
                year: 2024,
                month: 1,
                day: 31
            })
        );
    }

    #[rstest]
    #[case("2024013")]
    #[case("202401311")]
    #[case("2024AB31")]
    #[case("20241331")]
    #[case("20240100")]
    #[case("20240132")]
    #[case("")]
    fn date_rejects_malformed_text(#[case] text: &str) {
        assert_eq!(Date::parse_yyyymmdd(text), None);
    }

    #[test]
    fn character_fields_keep_text_even_when_empty() {
        assert_eq!(
            interpret_field(FieldType::Character, "  hello ", false),
            Some(FieldValue::Character("hello".to_string()))
        );
        assert_eq!(
            interpret_field(FieldType::Character, "   ", false),
            Some(FieldValue::Character(String::new()))
        );
    }

    #[test]
    fn bad_date_is_omitted() {
        assert_eq!(interpret_field(FieldType::Date, "not8dig", false), None);
    }

    #[rstest]
    #[case("T", true)]
    #[case("t", true)]
    #[case("Y", true)]
    #[case("y", true)]
    #[case("F", false)]
    #[case("N", false)]
    #[case("?", false)]
    #[case("", false)]
    #[case("  T  ", true)]
    fn logical_mapping(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(
            interpret_field(FieldType::Logical, text, false),
            Some(FieldValue::Bool(expected))
        );
    }

    #[test]
    fn numeric_interpretation() {
        assert_eq!(
            interpret_field(FieldType::Numeric, "  42 ", false),
            Some(FieldValue::Int(42))
        );
        assert_eq!(
            interpret_field(FieldType::Numeric, "3.25", false),
            Some(FieldValue::Double(3.25))
        );
        // The decimal flag forces a real even without a decimal point.
        assert_eq!(
            interpret_field(FieldType::Numeric, "42", true),
            Some(FieldValue::Double(42.0))
        );
        assert_eq!(
            interpret_field(FieldType::Numeric, "", false),
            Some(FieldValue::Character(String::new()))
        );
        assert_eq!(interpret_field(FieldType::Numeric, "4x2", false), None);
    }

    #[test]
    fn floating_interpretation() {
        assert_eq!(
            interpret_field(FieldType::Floating, " -1.5 ", false),
            Some(FieldValue::Double(-1.5))
        );
        assert_eq!(interpret_field(FieldType::Floating, "oops", false), None);
        assert_eq!(interpret_field(FieldType::Floating, "", false), None);
    }

    #[test]
    fn record_lookup_distinguishes_missing_fields() {
        let record = Record::new(vec![
            ("NAME".to_string(), FieldValue::Character("a".to_string())),
            ("POP".to_string(), FieldValue::Int(7)),
        ]);
        assert_eq!(record.get("POP"), Some(&FieldValue::Int(7)));
        assert_eq!(record.get("MISSING"), None);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn field_type_codes() {
        assert_eq!(FieldType::from_code('C'), Some(FieldType::Character));
        assert_eq!(FieldType::from_code('D'), Some(FieldType::Date));
        assert_eq!(FieldType::from_code('N'), Some(FieldType::Numeric));
        assert_eq!(FieldType::from_code('F'), Some(FieldType::Floating));
        assert_eq!(FieldType::from_code('L'), Some(FieldType::Logical));
        assert_eq!(FieldType::from_code('M'), Some(FieldType::Memo));
        assert_eq!(FieldType::from_code('X'), None);
    }
}
