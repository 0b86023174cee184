use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::decode::{decode_leg, decode_route_header, decode_trackpoint, decode_waypoint};
use crate::error::{ErrorKind, FieldError, GpsuError, ParseError};
use crate::gpsu_types::*;
use crate::schema::{is_blank, Schema};

type Result<T> = std::result::Result<T, ParseError>;

const PRODUCT_MARKER: &str = "GPSU";
const DATUM_MARKER: &str = "WGS 84";
const COORDINATE_MARKER: &str = "LAT LON DEG";
const MAX_ZONE_HOURS: i32 = 23;

/// Parse GPSU text held in memory.
pub fn parse_gpsu(text: &str) -> Result<GpsFile> {
    read_gpsu(text.as_bytes())
}

/// Open and parse a GPSU file.
pub fn read_gpsu_path(path: impl AsRef<Path>) -> crate::error::Result<GpsFile> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| GpsuError::Open {
        path: path.display().to_string(),
        source,
    })?;
    Ok(read_gpsu(BufReader::new(file))?)
}

/// Parse a GPSU stream line by line.
///
/// The first failing line aborts the parse; everything built so far is dropped.
pub fn read_gpsu<R: BufRead>(mut input: R) -> Result<GpsFile> {
    let mut state = ReaderState::default();
    let mut buf = Vec::new();
    let mut lineno = 0;
    let mut stream_error = None;

    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                stream_error = Some(e);
                break;
            }
        }
        lineno += 1;

        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\n', '\r']);
        if let Err(e) = state.feed(line) {
            let err = e.at_line(lineno);
            tracing::debug!(line = err.line, kind = ?err.kind, "GPSU parse aborted");
            return Err(err);
        }
    }

    if let Some(e) = stream_error {
        return Err(FieldError::with_token(ErrorKind::Io, &e.to_string()).at_line(lineno + 1));
    }

    let file = state.file;
    tracing::debug!(
        lines = lineno,
        waypoints = file.waypoints.len(),
        routes = file.routes.len(),
        trackpoints = file.trackpoints.len(),
        "parsed GPSU file"
    );
    Ok(file)
}

/// Everything the reader carries from one line to the next.
#[derive(Default)]
struct ReaderState {
    file: GpsFile,
    /// Most recent `F` line, reparsed by every data line that uses it.
    schema_line: Option<String>,
    in_route: bool,
}

impl ReaderState {
    fn feed(&mut self, line: &str) -> std::result::Result<(), FieldError> {
        let mut chars = line.chars();
        let Some(tag) = chars.next() else {
            return Ok(());
        };
        if matches!(tag, 'C' | 'A' | 'H') {
            return Ok(());
        }
        if !matches!(tag, 'I' | 'S' | 'M' | 'U' | 'F' | 'W' | 'R' | 'T') {
            return Err(FieldError::with_token(ErrorKind::UnknownRecord, &tag.to_string()));
        }
        if !chars.as_str().starts_with(' ') {
            return Err(FieldError::new(ErrorKind::BadSeparator));
        }
        let body = &line[1..];

        if !matches!(tag, 'F' | 'W') {
            self.in_route = false;
        }

        match tag {
            'I' => {
                let product = body.split_ascii_whitespace().next().unwrap_or_default();
                if !product.eq_ignore_ascii_case(PRODUCT_MARKER) {
                    return Err(FieldError::with_token(ErrorKind::FileType, product));
                }
            }
            'M' => {
                if !contains_ignore_case(body, DATUM_MARKER) {
                    return Err(FieldError::with_token(ErrorKind::Datum, body.trim()));
                }
            }
            'U' => {
                if !contains_ignore_case(body, COORDINATE_MARKER) {
                    return Err(FieldError::with_token(ErrorKind::CoordinateSystem, body.trim()));
                }
            }
            'F' => self.schema_line = Some(line.to_string()),
            'S' => self.apply_setting(body)?,
            'W' if self.in_route => {
                let schema = self.schema()?;
                let leg = decode_leg(line, &schema, &self.file.waypoints)?;
                if let Some(route) = self.file.routes.last_mut() {
                    route.legs.push(leg);
                }
            }
            'W' => {
                let schema = self.schema()?;
                self.file.waypoints.push(decode_waypoint(line, &schema)?);
            }
            'R' => {
                let route = decode_route_header(line)?;
                if self.file.routes.iter().any(|r| r.number == route.number) {
                    return Err(FieldError::with_token(
                        ErrorKind::DuplicateRoute,
                        &route.number.to_string(),
                    ));
                }
                self.file.routes.push(route);
                self.in_route = true;
            }
            'T' => {
                let schema = self.schema()?;
                let point = decode_trackpoint(line, &schema, &self.file.date_format)?;
                self.file.trackpoints.push(point);
            }
            _ => {
                return Err(FieldError::with_token(ErrorKind::UnknownRecord, &tag.to_string()));
            }
        }
        Ok(())
    }

    fn schema(&self) -> std::result::Result<Schema, FieldError> {
        let line = self
            .schema_line
            .as_deref()
            .ok_or_else(|| FieldError::new(ErrorKind::MissingSchema))?;
        Schema::parse(line)
    }

    /// Apply one `S key=value` line. Unknown keys are ignored.
    fn apply_setting(&mut self, body: &str) -> std::result::Result<(), FieldError> {
        let body = body.trim_start_matches(is_blank);
        let key_len = body
            .find(|c: char| is_blank(c) || c == '=')
            .unwrap_or(body.len());
        let (key, value) = body.split_at(key_len);
        let value = value
            .trim_start_matches(|c: char| is_blank(c) || c == '=')
            .trim_end();

        if key.eq_ignore_ascii_case("DateFormat") {
            self.file.date_format = parse_date_format(value)?;
        } else if key.eq_ignore_ascii_case("TimeZone") {
            self.file.time_zone = parse_time_zone(value)?;
        } else if key.eq_ignore_ascii_case("Units") {
            let unit = value
                .chars()
                .next()
                .and_then(HorizontalUnit::from_code)
                .ok_or_else(|| FieldError::with_token(ErrorKind::Value, value))?;
            self.file.set_units(unit);
        }
        Ok(())
    }
}

fn parse_date_format(value: &str) -> std::result::Result<DateFormat, FieldError> {
    let err = || FieldError::with_token(ErrorKind::Value, value);
    let tokens = value
        .split('/')
        .map(|t| DateToken::from_setting(t.trim()).ok_or_else(err))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let tokens: [DateToken; 3] = tokens.try_into().map_err(|_| err())?;
    Ok(DateFormat(tokens))
}

/// `±H:MM` with `|H| <= 23`. Minutes must be present but are dropped.
fn parse_time_zone(value: &str) -> std::result::Result<i32, FieldError> {
    let err = || FieldError::with_token(ErrorKind::Value, value);
    let (hours, minutes) = value.split_once(':').ok_or_else(err)?;
    minutes.trim().parse::<i32>().map_err(|_| err())?;
    hours
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|h| (-MAX_ZONE_HOURS..=MAX_ZONE_HOURS).contains(h))
        .ok_or_else(err)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}
