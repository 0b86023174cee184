//! Turn split records into model values.

use chrono::NaiveDateTime;

use crate::error::{ErrorKind, FieldError};
use crate::gpsu_types::*;
use crate::schema::{is_blank, FieldType, Schema};

type Result<T> = std::result::Result<T, FieldError>;

/// Decode a `W` line outside a route.
pub fn decode_waypoint(line: &str, schema: &Schema) -> Result<Waypoint> {
    ensure_content(line)?;
    let record = schema.split(line)?;

    let mut id = None;
    let mut lat = None;
    let mut lon = None;
    let mut symbol = "";
    let mut comment = "";
    let mut text_choice = TextChoice::default();
    let mut text_place = TextPlace::default();

    for field in &record.fields {
        match field.kind {
            FieldType::Id => id = Some(field.text),
            FieldType::Latitude => lat = Some(field.text),
            FieldType::Longitude => lon = Some(field.text),
            FieldType::Altitude => {}
            FieldType::Symbol => symbol = field.text,
            FieldType::TextChoice => {
                text_choice = field
                    .text
                    .chars()
                    .next()
                    .and_then(TextChoice::new)
                    .ok_or_else(|| FieldError::with_token(ErrorKind::Value, field.text))?;
            }
            FieldType::TextPlace => {
                text_place = TextPlace::from_code(field.text)
                    .ok_or_else(|| FieldError::with_token(ErrorKind::Value, field.text))?;
            }
            FieldType::Comment => comment = field.text,
            _ => return Err(FieldError::with_token(ErrorKind::Field, field.text)),
        }
    }

    let (Some(id), Some(lat), Some(lon)) = (id, lat, lon) else {
        return Err(FieldError::new(ErrorKind::Field));
    };

    Ok(Waypoint {
        id: id.trim_end().to_string(),
        coord: parse_coord(lat, lon)?,
        symbol: symbol.trim_end().to_string(),
        text_choice,
        text_place,
        comment: comment.to_string(),
    })
}

/// Decode an `R` line: a non-negative route number and an optional comment.
pub fn decode_route_header(line: &str) -> Result<Route> {
    ensure_content(line)?;
    let body = line.get(1..).unwrap_or_default().trim_start_matches(is_blank);

    let sign_len = usize::from(body.starts_with(['+', '-']));
    let digits_len = body[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return Err(FieldError::with_token(ErrorKind::Value, body));
    }

    let (number_text, rest) = body.split_at(sign_len + digits_len);
    if !rest.is_empty() && !rest.starts_with(is_blank) {
        return Err(FieldError::with_token(ErrorKind::Value, body));
    }
    let number = number_text
        .parse::<i64>()
        .ok()
        .and_then(|n| u32::try_from(n).ok())
        .filter(|&n| n <= Route::MAX_NUMBER)
        .ok_or_else(|| FieldError::with_token(ErrorKind::Value, number_text))?;

    Ok(Route {
        number,
        comment: rest.trim_start_matches(is_blank).to_string(),
        legs: Vec::new(),
    })
}

/// Decode a `W` line inside a route into the index of the waypoint it names.
///
/// Only waypoints already read can be referenced.
pub fn decode_leg(line: &str, schema: &Schema, waypoints: &[Waypoint]) -> Result<usize> {
    ensure_content(line)?;
    let record = schema.split(line)?;

    let id = record
        .fields
        .iter()
        .find(|f| f.kind == FieldType::Id)
        .map(|f| f.text.trim_end())
        .ok_or_else(|| FieldError::new(ErrorKind::Field))?;

    waypoints
        .iter()
        .position(|wp| wp.id == id)
        .ok_or_else(|| FieldError::with_token(ErrorKind::UnknownWaypoint, id))
}

/// Columns a plain (non segment-start) trackpoint must supply.
const TRACKPOINT_COLUMNS: usize = 8;

/// Decode a `T` line.
pub fn decode_trackpoint(line: &str, schema: &Schema, date_format: &DateFormat) -> Result<Trackpoint> {
    let record = schema.split(line)?;

    let mut lat = None;
    let mut lon = None;
    let mut stamp = String::new();
    let mut pattern = String::new();
    let mut duration = 0;
    let mut distance = 0.0;
    let mut speed = 0.0;
    let mut recognized = 0;

    for field in &record.fields {
        match field.kind {
            FieldType::Latitude => lat = Some(field.text),
            FieldType::Longitude => lon = Some(field.text),
            FieldType::Altitude => continue,
            FieldType::Date => {
                push_part(&mut stamp, field.text);
                push_part(&mut pattern, &date_format.pattern());
            }
            FieldType::Time => {
                push_part(&mut stamp, field.text);
                push_part(&mut pattern, "%H:%M:%S");
            }
            FieldType::SegFlag => {}
            FieldType::Seconds => duration = parse_seconds(field.text)?,
            FieldType::Duration => duration = parse_duration(field.text)?,
            FieldType::Distance => distance = parse_number(field.text)?,
            FieldType::Speed => speed = parse_number(field.text)?,
            _ => return Err(FieldError::with_token(ErrorKind::Field, field.text)),
        }
        recognized += 1;
    }

    if record.segment_start.is_none() && recognized < TRACKPOINT_COLUMNS {
        return Err(FieldError::new(ErrorKind::Field));
    }

    let coord = match (lat, lon) {
        (Some(lat), Some(lon)) => parse_coord(lat, lon)?,
        _ => Coord::default(),
    };

    let timestamp = NaiveDateTime::parse_from_str(&stamp, &pattern)
        .map_err(|_| FieldError::with_token(ErrorKind::Value, &stamp))?;

    Ok(Trackpoint {
        coord,
        timestamp,
        segment_start: record.segment_start.is_some(),
        duration,
        distance,
        speed,
        comment: record.segment_start.unwrap_or_default().to_string(),
    })
}

/// Parse a hemisphere-prefixed latitude/longitude pair such as `N45.000000` / `W075.000000`.
pub fn parse_coord(lat: &str, lon: &str) -> Result<Coord> {
    Ok(Coord {
        lat: parse_angle(lat, 'N', 'S', 90.0)?,
        lon: parse_angle(lon, 'E', 'W', 180.0)?,
    })
}

fn parse_angle(text: &str, positive: char, negative: char, limit: f64) -> Result<f64> {
    let signed = if let Some(rest) = text.strip_prefix(positive) {
        format!("+{rest}")
    } else if let Some(rest) = text.strip_prefix(negative) {
        format!("-{rest}")
    } else {
        text.to_string()
    };
    signed
        .parse::<f64>()
        .ok()
        .filter(|v| (-limit..=limit).contains(v))
        .ok_or_else(|| FieldError::with_token(ErrorKind::Value, text))
}

/// `H:M:S` with each part range-checked, or a bare count of seconds.
fn parse_duration(text: &str) -> Result<i64> {
    if !text.contains(':') {
        return parse_seconds(text);
    }
    let err = || FieldError::with_token(ErrorKind::Value, text);

    let parts: Vec<i64> = text
        .split(':')
        .map(|p| p.trim().parse::<i64>().map_err(|_| err()))
        .collect::<Result<_>>()?;
    let &[h, m, s] = parts.as_slice() else {
        return Err(err());
    };
    if !(0..24).contains(&h) || !(0..60).contains(&m) || !(0..60).contains(&s) {
        return Err(err());
    }
    Ok(h * 3600 + m * 60 + s)
}

fn parse_seconds(text: &str) -> Result<i64> {
    text.parse::<i64>()
        .map_err(|_| FieldError::with_token(ErrorKind::Value, text))
}

fn parse_number(text: &str) -> Result<f64> {
    text.parse::<f64>()
        .map_err(|_| FieldError::with_token(ErrorKind::Value, text))
}

fn push_part(buf: &mut String, part: &str) {
    if !buf.is_empty() {
        buf.push(' ');
    }
    buf.push_str(part);
}

/// A data line with nothing after its tag is missing every required field.
fn ensure_content(line: &str) -> Result<()> {
    if line.get(1..).unwrap_or_default().trim_matches(is_blank).is_empty() {
        return Err(FieldError::new(ErrorKind::Field));
    }
    Ok(())
}
