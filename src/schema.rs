//! `F` line handling: the field-definition schema and the record splitter it drives.

use crate::error::{ErrorKind, FieldError};

/// Column types a field-definition line can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Id,
    Latitude,
    Longitude,
    Altitude,
    Symbol,
    TextChoice,
    TextPlace,
    Comment,
    Date,
    Time,
    SegFlag,
    Duration,
    Seconds,
    Distance,
    Speed,
    /// Unrecognized keyword. Decoders reject any data landing in one.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// Greedy whitespace-delimited token.
    Delimited,
    /// Exactly this many characters.
    Fixed(usize),
    /// Everything left on the line.
    RestOfLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub kind: FieldType,
    pub width: Width,
}

const DISTANCE_UNITS: [&str; 5] = ["km", "m", "miles", "ft", "nm"];
const SPEED_UNITS: [&str; 5] = ["km/h", "m/s", "mph", "ft/s", "knots"];

impl Column {
    /// Classify one keyword of a field-definition line.
    ///
    /// `ID` and `Symbol` take their width from the keyword itself, so `ID----`
    /// declares a six character column.
    fn from_keyword(keyword: &str) -> Self {
        let (kind, width) = if starts_with_ignore_case(keyword, "ID") {
            (FieldType::Id, Width::Fixed(keyword.chars().count()))
        } else if keyword.eq_ignore_ascii_case("Latitude") {
            (FieldType::Latitude, Width::Delimited)
        } else if keyword.eq_ignore_ascii_case("Longitude") {
            (FieldType::Longitude, Width::Delimited)
        } else if starts_with_ignore_case(keyword, "Alt") {
            (FieldType::Altitude, Width::Delimited)
        } else if starts_with_ignore_case(keyword, "Symbol") {
            (FieldType::Symbol, Width::Fixed(keyword.chars().count()))
        } else if keyword.eq_ignore_ascii_case("T") {
            (FieldType::TextChoice, Width::Fixed(1))
        } else if keyword.eq_ignore_ascii_case("O") {
            (FieldType::TextPlace, Width::Delimited)
        } else if keyword.eq_ignore_ascii_case("Comment") {
            (FieldType::Comment, Width::RestOfLine)
        } else if keyword.eq_ignore_ascii_case("Date") {
            (FieldType::Date, Width::Delimited)
        } else if keyword.eq_ignore_ascii_case("Time") {
            (FieldType::Time, Width::Delimited)
        } else if keyword.eq_ignore_ascii_case("S") {
            (FieldType::SegFlag, Width::Fixed(1))
        } else if keyword.eq_ignore_ascii_case("Duration") {
            (FieldType::Duration, Width::Delimited)
        } else if keyword.eq_ignore_ascii_case("seconds") {
            (FieldType::Seconds, Width::Delimited)
        } else if DISTANCE_UNITS.iter().any(|u| keyword.eq_ignore_ascii_case(u)) {
            (FieldType::Distance, Width::Delimited)
        } else if SPEED_UNITS.iter().any(|u| keyword.eq_ignore_ascii_case(u)) {
            (FieldType::Speed, Width::Delimited)
        } else {
            (FieldType::Other, Width::Delimited)
        };
        Self { kind, width }
    }
}

/// One raw field sliced out of a data line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    pub kind: FieldType,
    pub text: &'a str,
}

/// A data line split according to a [`Schema`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record<'a> {
    pub fields: Vec<Field<'a>>,
    /// Comment of a segment-start record (flag `1`). Columns after the flag are not read.
    pub segment_start: Option<&'a str>,
}

/// Ordered column layout declared by an `F` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Parse a whole `F` line, tag included.
    pub fn parse(line: &str) -> Result<Self, FieldError> {
        let mut columns: Vec<Column> = Vec::new();
        for keyword in line.split_ascii_whitespace().skip(1) {
            let column = Column::from_keyword(keyword);
            if column.kind != FieldType::Other && columns.iter().any(|c| c.kind == column.kind) {
                return Err(FieldError::with_token(ErrorKind::Field, keyword));
            }
            columns.push(column);
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Slice a data line (tag included) into one field per column.
    ///
    /// A segment flag of `1` swallows the rest of the line as its comment and
    /// ends the record early.
    pub fn split<'a>(&self, line: &'a str) -> Result<Record<'a>, FieldError> {
        let mut rest = line.get(1..).unwrap_or_default();
        let mut fields = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            if column.kind != FieldType::Comment && !rest.starts_with(is_blank) {
                return Err(FieldError::with_token(ErrorKind::BadSeparator, rest));
            }
            rest = rest.trim_start_matches(is_blank);

            if column.kind == FieldType::SegFlag {
                let mut chars = rest.chars();
                let flag = chars.next();
                let after = chars.as_str();
                if !after.is_empty() && !after.starts_with(is_blank) {
                    return Err(FieldError::with_token(ErrorKind::Value, rest));
                }
                match flag {
                    Some('1') => {
                        return Ok(Record {
                            fields,
                            segment_start: Some(after.get(1..).unwrap_or_default()),
                        });
                    }
                    Some('0') => {
                        fields.push(Field {
                            kind: FieldType::SegFlag,
                            text: "0",
                        });
                        rest = after;
                        continue;
                    }
                    _ => return Err(FieldError::with_token(ErrorKind::Value, rest)),
                }
            }

            let len = match column.width {
                Width::Delimited => rest.find(is_blank).unwrap_or(rest.len()),
                Width::RestOfLine => rest.len(),
                Width::Fixed(n) => rest
                    .char_indices()
                    .nth(n)
                    .map_or(rest.len(), |(offset, _)| offset),
            };
            let (text, tail) = rest.split_at(len);
            fields.push(Field {
                kind: column.kind,
                text,
            });
            rest = tail;
        }

        let leftover = rest.trim_start_matches(is_blank);
        if !leftover.is_empty() {
            return Err(FieldError::with_token(ErrorKind::Field, leftover));
        }
        Ok(Record {
            fields,
            segment_start: None,
        })
    }
}

pub(crate) fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}
