use std::fmt::Display;
use std::io::{self, Write};

use chrono::NaiveDateTime;

use crate::error::{GpsuError, Result};
use crate::gpsu_types::{Coord, GpsFile, Route};

const LAT_WIDTH: usize = "N00.000000".len();
const LON_WIDTH: usize = "W000.000000".len();
const CLOCK_WIDTH: usize = "hh:mm:ss".len();

/// Serialize a file model as GPSU text. Returns the number of lines written.
///
/// Every column width is recomputed from the data being written. Output
/// already emitted before a failure is not rolled back.
pub fn write_gpsu<W: Write>(out: W, file: &GpsFile) -> Result<usize> {
    let mut w = Emitter { out, lines: 0 };

    write_header(&mut w, file)?;
    write_waypoints(&mut w, file)?;
    for route in &file.routes {
        write_route(&mut w, file, route)?;
    }
    write_tracks(&mut w, file)?;
    w.out.flush().map_err(GpsuError::Write)?;

    tracing::debug!(lines = w.lines, "wrote GPSU file");
    Ok(w.lines)
}

/// Serialize a file model into an in-memory string.
pub fn to_gpsu_string(file: &GpsFile) -> Result<String> {
    let mut buf = Vec::new();
    write_gpsu(&mut buf, file)?;
    String::from_utf8(buf)
        .map_err(|e| GpsuError::Write(io::Error::new(io::ErrorKind::InvalidData, e)))
}

struct Emitter<W> {
    out: W,
    lines: usize,
}

impl<W: Write> Emitter<W> {
    fn line(&mut self, text: impl Display) -> Result<()> {
        writeln!(self.out, "{text}").map_err(GpsuError::Write)?;
        self.lines += 1;
        Ok(())
    }

    fn blank(&mut self) -> Result<()> {
        self.line("")
    }
}

fn write_header<W: Write>(w: &mut Emitter<W>, file: &GpsFile) -> Result<()> {
    w.line("H  SOFTWARE NAME & VERSION")?;
    w.line("I  GPSU 4.20 01 FREEWARE VERSION")?;
    w.blank()?;
    w.line(format_args!("S DateFormat={}", file.date_format.setting()))?;
    w.line(format_args!("S Timezone={:+}:00", file.time_zone))?;
    w.line(format_args!("S Units={}", file.unit_horz.code()))?;
    w.blank()?;
    w.line("H R DATUM")?;
    w.line("M E            WGS 84 100  0.0000000E+00  0.0000000E+00 0 0 0")?;
    w.blank()?;
    w.line("H  COORDINATE SYSTEM")?;
    w.line("U  LAT LON DEG")
}

fn write_waypoints<W: Write>(w: &mut Emitter<W>, file: &GpsFile) -> Result<()> {
    if file.waypoints.is_empty() {
        return Ok(());
    }

    let id_width = keyword_width("ID", file.waypoints.iter().map(|wp| wp.id.as_str()));
    let symbol_len = max_len(file.waypoints.iter().map(|wp| wp.symbol.trim_end()));
    let symbol_width = if symbol_len > 0 {
        symbol_len.max("Symbol".len())
    } else {
        0
    };
    let has_comment = file.waypoints.iter().any(|wp| !wp.comment.is_empty());

    w.blank()?;

    // A blank Symbol field is skipped on read and would swallow the comment,
    // so runs of symbol-less commented waypoints get a schema without Symbol.
    let mut active_width = None;
    for wp in &file.waypoints {
        let symbol = wp.symbol.trim_end();
        let width = if symbol.is_empty() && !wp.comment.is_empty() {
            0
        } else {
            symbol_width
        };
        if active_width != Some(width) {
            w.line(waypoint_schema(id_width, width, has_comment))?;
            active_width = Some(width);
        }

        let mut line = format!(
            "W {:<id_width$} {} {} {:<2}",
            wp.id,
            format_coord(wp.coord),
            wp.text_choice.glyph(),
            wp.text_place.as_str()
        );
        if width > 0 {
            line.push_str(&format!(" {symbol:<width$}"));
        }
        if has_comment {
            line.push(' ');
            line.push_str(&wp.comment);
        }
        w.line(line)?;
    }
    Ok(())
}

/// `symbol_width` of 0 leaves the Symbol column out.
fn waypoint_schema(id_width: usize, symbol_width: usize, has_comment: bool) -> String {
    let mut schema = format!(
        "F {} {:<lat$} {:<lon$} T O  ",
        dashed("ID", id_width),
        "Latitude",
        "Longitude",
        lat = LAT_WIDTH,
        lon = LON_WIDTH
    );
    if symbol_width > 0 {
        schema.push_str(&dashed("Symbol", symbol_width));
    }
    if has_comment {
        schema.push_str(" Comment");
    }
    schema
}

/// Legs are written by waypoint ID, resolved from their indices at write time.
fn write_route<W: Write>(w: &mut Emitter<W>, file: &GpsFile, route: &Route) -> Result<()> {
    let ids = route
        .legs
        .iter()
        .enumerate()
        .map(|(n, &leg)| {
            file.leg_id(leg).ok_or_else(|| {
                GpsuError::Write(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "route {} leg {} refers to missing waypoint {}",
                        route.number,
                        n + 1,
                        leg
                    ),
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let id_width = keyword_width("ID", ids.iter().copied());

    w.blank()?;
    w.line(format_args!("R {:02} {}", route.number, route.comment))?;
    w.line(format_args!("F {}", dashed("ID", id_width)))?;
    for id in ids {
        w.line(format_args!("W {id:<id_width$}"))?;
    }
    Ok(())
}

fn write_tracks<W: Write>(w: &mut Emitter<W>, file: &GpsFile) -> Result<()> {
    let Some(first) = file.trackpoints.first() else {
        return Ok(());
    };

    let date_pattern = file.date_format.pattern();
    let date = |t: &NaiveDateTime| t.format(&date_pattern).to_string();
    let date_width = date(&first.timestamp).len();
    let distance_label = file.unit_horz.distance_label();
    let speed_label = file.unit_horz.speed_label();

    let tracks = file.tracks();
    let dist_width = numeric_width(distance_label, tracks.iter().map(|t| t.distance));
    let speed_width = numeric_width(speed_label, tracks.iter().map(|t| t.speed));

    w.blank()?;
    w.line(format_args!(
        "H    Track    Pnts. {:<date_width$} Time     StopTime Duration {:>dist_width$} {:>speed_width$}",
        "Date", distance_label, speed_label
    ))?;
    for track in &tracks {
        w.line(format_args!(
            "H {:>8} {:>8} {} {} {} {} {:>dist_width$.6} {:>speed_width$.6}",
            track.seqno(),
            track.point_count,
            date(&track.start),
            clock_time(&track.start),
            clock_time(&track.end),
            elapsed(track.duration),
            track.distance,
            track.speed
        ))?;
    }

    let dist_width = numeric_width(distance_label, file.trackpoints.iter().map(|tp| tp.distance));
    let speed_width = numeric_width(speed_label, file.trackpoints.iter().map(|tp| tp.speed));

    w.blank()?;
    w.line(format_args!(
        "F {:<lat$} {:<lon$} {:<date_width$} {:<clock$} S {:<clock$} {:>dist_width$} {:>speed_width$}",
        "Latitude",
        "Longitude",
        "Date",
        "Time",
        "Duration",
        distance_label,
        speed_label,
        lat = LAT_WIDTH,
        lon = LON_WIDTH,
        clock = CLOCK_WIDTH
    ))?;
    for tp in &file.trackpoints {
        let position = format!(
            "T {} {} {}",
            format_coord(tp.coord),
            date(&tp.timestamp),
            clock_time(&tp.timestamp)
        );
        if tp.segment_start {
            w.line(format_args!("{position} 1 {}", tp.comment))?;
        } else {
            w.line(format_args!(
                "{position} 0 {} {:>dist_width$.6} {:>speed_width$.6}",
                elapsed(tp.duration),
                tp.distance,
                tp.speed
            ))?;
        }
    }
    Ok(())
}

/// `N45.000000 W075.000000`: zero padded, sign replaced by the hemisphere letter.
pub fn format_coord(coord: Coord) -> String {
    format!(
        "{} {}",
        hemisphere(format!("{:+0w$.6}", coord.lat, w = LAT_WIDTH), 'N', 'S'),
        hemisphere(format!("{:+0w$.6}", coord.lon, w = LON_WIDTH), 'E', 'W')
    )
}

fn hemisphere(signed: String, positive: char, negative: char) -> String {
    match signed.strip_prefix('-') {
        Some(digits) => format!("{negative}{digits}"),
        None => format!("{positive}{}", signed.trim_start_matches('+')),
    }
}

fn clock_time(t: &NaiveDateTime) -> String {
    t.format("%H:%M:%S").to_string()
}

/// `HH:MM:SS`, or bare seconds when that cannot hold the value.
fn elapsed(seconds: i64) -> String {
    if (0..86_400).contains(&seconds) {
        format!(
            "{:02}:{:02}:{:02}",
            seconds / 3600,
            seconds / 60 % 60,
            seconds % 60
        )
    } else {
        seconds.to_string()
    }
}

/// `ID` followed by dashes out to `width`.
fn dashed(keyword: &str, width: usize) -> String {
    format!("{keyword:-<width$}")
}

/// A fixed column is never narrower than the keyword that declares it.
fn keyword_width<'a>(keyword: &str, values: impl IntoIterator<Item = &'a str>) -> usize {
    max_len(values).max(keyword.len())
}

fn max_len<'a>(values: impl IntoIterator<Item = &'a str>) -> usize {
    values
        .into_iter()
        .map(|v| v.chars().count())
        .max()
        .unwrap_or(0)
}

fn numeric_width(label: &str, values: impl Iterator<Item = f64>) -> usize {
    values
        .map(|v| format!("{v:.6}").len())
        .fold(label.len(), usize::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpsu_types::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2010, 2, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_header_block() {
        let text = to_gpsu_string(&GpsFile::default()).unwrap();
        let expected = "\
H  SOFTWARE NAME & VERSION
I  GPSU 4.20 01 FREEWARE VERSION

S DateFormat=dd/mm/yy
S Timezone=+0:00
S Units=M

H R DATUM
M E            WGS 84 100  0.0000000E+00  0.0000000E+00 0 0 0

H  COORDINATE SYSTEM
U  LAT LON DEG
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_settings_reencoded() {
        let mut file = GpsFile {
            date_format: DateFormat([DateToken::Month, DateToken::Day, DateToken::Year4]),
            time_zone: -5,
            ..GpsFile::default()
        };
        file.set_units(HorizontalUnit::NauticalMiles);
        let text = to_gpsu_string(&file).unwrap();
        assert!(text.contains("S DateFormat=mm/dd/yyyy\n"));
        assert!(text.contains("S Timezone=-5:00\n"));
        assert!(text.contains("S Units=N\n"));
    }

    #[test]
    fn test_coordinate_rendering() {
        assert_eq!(
            format_coord(Coord::new(45.0, -75.0)),
            "N45.000000 W075.000000"
        );
        assert_eq!(
            format_coord(Coord::new(-5.5, 130.25)),
            "S05.500000 E130.250000"
        );
    }

    #[test]
    fn test_waypoint_block() {
        let mut camp = Waypoint::new("CAMP", Coord::new(45.0, -75.0));
        camp.comment = "riverside".to_string();
        let file = GpsFile {
            waypoints: vec![camp, Waypoint::new("X", Coord::new(-5.5, 130.25))],
            ..GpsFile::default()
        };
        let text = to_gpsu_string(&file).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[13..],
            [
                "F ID-- Latitude   Longitude   T O   Comment",
                "W CAMP N45.000000 W075.000000 I E  riverside",
                "W X    S05.500000 E130.250000 I E  ",
            ]
        );
    }

    #[test]
    fn test_symbol_column_at_least_keyword_wide() {
        let mut wp = Waypoint::new("A", Coord::new(1.0, 1.0));
        wp.symbol = "Dot".to_string();
        let file = GpsFile {
            waypoints: vec![wp],
            ..GpsFile::default()
        };
        let text = to_gpsu_string(&file).unwrap();
        assert!(text.contains("F ID Latitude   Longitude   T O  Symbol\n"));
        assert!(text.contains("W A  N01.000000 E001.000000 I E  Dot   \n"));
    }

    #[test]
    fn test_symbol_less_comments_get_own_schema() {
        let mut tent = Waypoint::new("AA", Coord::new(1.0, 1.0));
        tent.symbol = "Tent".to_string();
        let mut note = Waypoint::new("BB", Coord::new(2.0, 2.0));
        note.comment = "hello world".to_string();
        let mut flag = Waypoint::new("CC", Coord::new(3.0, 3.0));
        flag.symbol = "Flag  ".to_string();
        let file = GpsFile {
            waypoints: vec![tent, note, flag],
            ..GpsFile::default()
        };

        let text = to_gpsu_string(&file).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[13..],
            [
                "F ID Latitude   Longitude   T O  Symbol Comment",
                "W AA N01.000000 E001.000000 I E  Tent   ",
                "F ID Latitude   Longitude   T O   Comment",
                "W BB N02.000000 E002.000000 I E  hello world",
                "F ID Latitude   Longitude   T O  Symbol Comment",
                "W CC N03.000000 E003.000000 I E  Flag   ",
            ]
        );

        let reread = crate::parser::parse_gpsu(&text).unwrap();
        assert_eq!(reread.waypoints[0].symbol, "Tent");
        assert_eq!(reread.waypoints[1].symbol, "");
        assert_eq!(reread.waypoints[1].comment, "hello world");
        assert_eq!(reread.waypoints[2].symbol, "Flag");
        assert_eq!(reread.waypoints[2].comment, "");
    }

    #[test]
    fn test_route_block_uses_ids() {
        let file = GpsFile {
            waypoints: vec![
                Waypoint::new("HOME", Coord::new(1.0, 1.0)),
                Waypoint::new("LAKE", Coord::new(2.0, 2.0)),
            ],
            routes: vec![Route {
                number: 3,
                comment: "out".to_string(),
                legs: vec![1, 0],
            }],
            ..GpsFile::default()
        };
        let text = to_gpsu_string(&file).unwrap();
        assert!(text.ends_with("\nR 03 out\nF ID--\nW LAKE\nW HOME\n"));
    }

    #[test]
    fn test_dangling_leg_is_write_error() {
        let file = GpsFile {
            routes: vec![Route {
                number: 1,
                comment: String::new(),
                legs: vec![4],
            }],
            ..GpsFile::default()
        };
        assert!(matches!(to_gpsu_string(&file), Err(GpsuError::Write(_))));
    }

    #[test]
    fn test_track_block() {
        let file = GpsFile {
            trackpoints: vec![
                Trackpoint {
                    coord: Coord::new(45.0, -75.0),
                    timestamp: at(10, 0, 0),
                    segment_start: true,
                    duration: 0,
                    distance: 0.0,
                    speed: 0.0,
                    comment: "go".to_string(),
                },
                Trackpoint {
                    coord: Coord::new(45.1, -75.1),
                    timestamp: at(10, 5, 0),
                    segment_start: false,
                    duration: 300,
                    distance: 1200.0,
                    speed: 4.0,
                    comment: String::new(),
                },
            ],
            ..GpsFile::default()
        };
        let text = to_gpsu_string(&file).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[13..],
            [
                "H    Track    Pnts. Date     Time     StopTime Duration           m      m/s",
                "H        1        2 01/02/10 10:00:00 10:05:00 00:05:00 1200.000000 4.000000",
                "",
                "F Latitude   Longitude   Date     Time     S Duration           m      m/s",
                "T N45.000000 W075.000000 01/02/10 10:00:00 1 go",
                "T N45.100000 W075.100000 01/02/10 10:05:00 0 00:05:00 1200.000000 4.000000",
            ]
        );
    }

    #[test]
    fn test_long_duration_written_as_seconds() {
        assert_eq!(elapsed(3723), "01:02:03");
        assert_eq!(elapsed(90_000), "90000");
    }

    #[test]
    fn test_line_count() {
        let file = GpsFile {
            waypoints: vec![Waypoint::new("AB", Coord::new(1.0, 1.0))],
            ..GpsFile::default()
        };
        let mut buf = Vec::new();
        let count = write_gpsu(&mut buf, &file).unwrap();
        let newlines = buf.iter().filter(|&&b| b == b'\n').count();
        assert_eq!(count, newlines);
        assert_eq!(count, 15);
    }

    #[test]
    fn test_failing_sink() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let err = write_gpsu(Full, &GpsFile::default()).unwrap_err();
        assert!(matches!(err, GpsuError::Write(_)));
        assert!(err.is_fatal());
    }
}
