use std::fmt;

use serde::Serialize;

use crate::gpsu_types::{Coord, GpsFile};

/// Counts and extent of a file, as printed by the info report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub waypoints: usize,
    pub routes: usize,
    pub trackpoints: usize,
    pub tracks: usize,
    /// Waypoint IDs are non-decreasing, byte-wise.
    pub sorted: bool,
    pub sw_corner: Coord,
    pub ne_corner: Coord,
}

impl GpsFile {
    /// The extent covers every waypoint and every track's bounding box.
    /// Route legs add nothing since they point at waypoints.
    pub fn summary(&self) -> Summary {
        let tracks = self.tracks();
        let mut ne = Coord::new(-91.0, -181.0);
        let mut sw = Coord::new(91.0, 181.0);

        let corners = tracks
            .iter()
            .flat_map(|t| [t.ne_corner, t.sw_corner])
            .chain(self.waypoints.iter().map(|wp| wp.coord));
        for c in corners {
            ne.lat = ne.lat.max(c.lat);
            ne.lon = ne.lon.max(c.lon);
            sw.lat = sw.lat.min(c.lat);
            sw.lon = sw.lon.min(c.lon);
        }

        Summary {
            waypoints: self.waypoints.len(),
            routes: self.routes.len(),
            trackpoints: self.trackpoints.len(),
            tracks: tracks.len(),
            sorted: self
                .waypoints
                .windows(2)
                .all(|pair| pair[0].id.as_bytes() <= pair[1].id.as_bytes()),
            sw_corner: sw,
            ne_corner: ne,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} waypoints", self.waypoints)?;
        if self.waypoints > 0 {
            f.write_str(if self.sorted { " (sorted)" } else { " (not sorted)" })?;
        }
        writeln!(f)?;
        writeln!(f, "{} routes", self.routes)?;
        writeln!(f, "{} trackpoints", self.trackpoints)?;
        writeln!(f, "{} tracks", self.tracks)?;
        write!(
            f,
            "Extent: SW {} {} to NE {} {}",
            signed(self.sw_corner.lon, 'E', 'W'),
            signed(self.sw_corner.lat, 'N', 'S'),
            signed(self.ne_corner.lon, 'E', 'W'),
            signed(self.ne_corner.lat, 'N', 'S'),
        )
    }
}

fn signed(value: f64, positive: char, negative: char) -> String {
    let letter = if value.is_sign_negative() { negative } else { positive };
    format!("{letter}{:.6}", value.abs())
}
