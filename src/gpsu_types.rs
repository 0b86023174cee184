use chrono::NaiveDateTime;
use serde::Serialize;

use crate::track::{segment_tracks, Track};

/// A parsed GPSU file: settings plus waypoints, routes and trackpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsFile {
    pub date_format: DateFormat,
    /// Signed hour offset from UTC. Minutes are not kept.
    pub time_zone: i32,
    pub unit_horz: HorizontalUnit,
    pub unit_time: TimeUnit,
    pub waypoints: Vec<Waypoint>,
    pub routes: Vec<Route>,
    pub trackpoints: Vec<Trackpoint>,
}

impl Default for GpsFile {
    fn default() -> Self {
        Self {
            date_format: DateFormat::default(),
            time_zone: 0,
            unit_horz: HorizontalUnit::Meters,
            unit_time: TimeUnit::Seconds,
            waypoints: Vec::new(),
            routes: Vec::new(),
            trackpoints: Vec::new(),
        }
    }
}

impl GpsFile {
    /// Track summaries derived from the current trackpoints.
    ///
    /// Always recomputed; never hold on to the result across a mutation.
    pub fn tracks(&self) -> Vec<Track> {
        segment_tracks(&self.trackpoints, self.unit_time)
    }

    /// Set the horizontal unit and the time unit it implies.
    pub fn set_units(&mut self, unit: HorizontalUnit) {
        self.unit_horz = unit;
        self.unit_time = unit.time_unit();
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty() && self.routes.is_empty() && self.trackpoints.is_empty()
    }

    /// ID of the waypoint a route leg points at, if the leg is still valid.
    pub fn leg_id(&self, leg: usize) -> Option<&str> {
        self.waypoints.get(leg).map(|wp| wp.id.as_str())
    }
}

/// A latitude/longitude pair in signed decimal degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    /// Join key for route legs.
    pub id: String,
    pub coord: Coord,
    pub symbol: String,
    pub text_choice: TextChoice,
    pub text_place: TextPlace,
    pub comment: String,
}

impl Waypoint {
    pub fn new(id: impl Into<String>, coord: Coord) -> Self {
        Self {
            id: id.into(),
            coord,
            symbol: String::new(),
            text_choice: TextChoice::default(),
            text_place: TextPlace::default(),
            comment: String::new(),
        }
    }
}

/// How the waypoint label is drawn. One of the six GPSU glyphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextChoice(char);

impl TextChoice {
    pub const GLYPHS: [char; 6] = ['-', 'I', 'C', '&', '+', '^'];

    pub fn new(glyph: char) -> Option<Self> {
        Self::GLYPHS.contains(&glyph).then_some(Self(glyph))
    }

    pub fn glyph(self) -> char {
        self.0
    }
}

impl Default for TextChoice {
    fn default() -> Self {
        Self('I')
    }
}

/// Compass placement of the waypoint label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum TextPlace {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "NE")]
    NorthEast,
    #[default]
    #[serde(rename = "E")]
    East,
    #[serde(rename = "SE")]
    SouthEast,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "SW")]
    SouthWest,
    #[serde(rename = "W")]
    West,
    #[serde(rename = "NW")]
    NorthWest,
}

impl TextPlace {
    pub const ALL: [TextPlace; 8] = [
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::North => "N",
            Self::NorthEast => "NE",
            Self::East => "E",
            Self::SouthEast => "SE",
            Self::South => "S",
            Self::SouthWest => "SW",
            Self::West => "W",
            Self::NorthWest => "NW",
        }
    }

    /// Exact, case-sensitive match against the eight compass strings.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|place| place.as_str() == code)
    }
}

/// A numbered route. Legs are indices into [`GpsFile::waypoints`].
///
/// Legs are weak references: they go stale as soon as the waypoint
/// sequence is reordered or extended, and must be repaired by whoever
/// did that (see `sort_waypoints` and `merge`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub number: u32,
    pub comment: String,
    pub legs: Vec<usize>,
}

impl Route {
    /// Largest route number a file may carry, the range of the classic tool's `int`.
    pub const MAX_NUMBER: u32 = i32::MAX as u32;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trackpoint {
    pub coord: Coord,
    /// Wall-clock time in the file's time zone.
    pub timestamp: NaiveDateTime,
    pub segment_start: bool,
    /// Seconds. Only meaningful on points that close a segment.
    pub duration: i64,
    /// Cumulative distance in the file's horizontal unit.
    pub distance: f64,
    pub speed: f64,
    /// Only carried by segment-start points.
    pub comment: String,
}

/// Horizontal distance unit, from the `S Units=` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HorizontalUnit {
    Meters,
    Kilometers,
    Feet,
    NauticalMiles,
    Miles,
}

/// Feet per nautical mile.
const FEET_PER_NM: f64 = 2_315_000.0 / 381.0;

impl HorizontalUnit {
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'M' => Some(Self::Meters),
            'K' => Some(Self::Kilometers),
            'F' => Some(Self::Feet),
            'N' => Some(Self::NauticalMiles),
            'S' => Some(Self::Miles),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Self::Meters => 'M',
            Self::Kilometers => 'K',
            Self::Feet => 'F',
            Self::NauticalMiles => 'N',
            Self::Miles => 'S',
        }
    }

    /// Feet and meters pair with seconds; the long units pair with hours.
    pub fn time_unit(self) -> TimeUnit {
        match self {
            Self::Meters | Self::Feet => TimeUnit::Seconds,
            Self::Kilometers | Self::NauticalMiles | Self::Miles => TimeUnit::Hours,
        }
    }

    pub fn distance_label(self) -> &'static str {
        match self {
            Self::Meters => "m",
            Self::Kilometers => "km",
            Self::Feet => "ft",
            Self::NauticalMiles => "nm",
            Self::Miles => "miles",
        }
    }

    pub fn speed_label(self) -> &'static str {
        match self {
            Self::Meters => "m/s",
            Self::Kilometers => "km/h",
            Self::Feet => "ft/s",
            Self::NauticalMiles => "knots",
            Self::Miles => "mph",
        }
    }

    /// Multiply a distance in this unit by this to get nautical miles.
    pub fn to_nautical_miles(self) -> f64 {
        match self {
            Self::Meters => 1.0 / 1852.0,
            Self::Kilometers => 1000.0 / 1852.0,
            Self::Feet => 1.0 / FEET_PER_NM,
            Self::Miles => 5280.0 / FEET_PER_NM,
            Self::NauticalMiles => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeUnit {
    Seconds,
    Hours,
}

impl TimeUnit {
    pub fn code(self) -> char {
        match self {
            Self::Seconds => 'S',
            Self::Hours => 'H',
        }
    }
}

/// One slot of the `DateFormat` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DateToken {
    Day,
    Month,
    MonthName,
    Year2,
    Year4,
}

impl DateToken {
    pub fn from_setting(token: &str) -> Option<Self> {
        match token {
            "dd" => Some(Self::Day),
            "mm" => Some(Self::Month),
            "mmm" => Some(Self::MonthName),
            "yy" => Some(Self::Year2),
            "yyyy" => Some(Self::Year4),
            _ => None,
        }
    }

    pub fn setting(self) -> &'static str {
        match self {
            Self::Day => "dd",
            Self::Month => "mm",
            Self::MonthName => "mmm",
            Self::Year2 => "yy",
            Self::Year4 => "yyyy",
        }
    }

    fn specifier(self) -> &'static str {
        match self {
            Self::Day => "%d",
            Self::Month => "%m",
            Self::MonthName => "%b",
            Self::Year2 => "%y",
            Self::Year4 => "%Y",
        }
    }
}

/// The three-part date layout used by Date columns, e.g. `dd/mmm/yy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateFormat(pub [DateToken; 3]);

impl Default for DateFormat {
    fn default() -> Self {
        Self([DateToken::Day, DateToken::Month, DateToken::Year2])
    }
}

impl DateFormat {
    /// chrono format string for the date part alone, e.g. `%d/%b/%y`.
    pub fn pattern(&self) -> String {
        let [a, b, c] = self.0;
        format!("{}/{}/{}", a.specifier(), b.specifier(), c.specifier())
    }

    /// Value of the `S DateFormat=` setting, e.g. `dd/mmm/yy`.
    pub fn setting(&self) -> String {
        let [a, b, c] = self.0;
        format!("{}/{}/{}", a.setting(), b.setting(), c.setting())
    }
}
