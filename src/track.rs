use chrono::NaiveDateTime;
use serde::Serialize;

use crate::gpsu_types::{Coord, TimeUnit, Trackpoint};

/// Summary of one run of trackpoints between segment-start markers.
///
/// Derived data only: recompute with [`segment_tracks`] after any change to the trackpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Offset of the first trackpoint in the file's trackpoint sequence.
    pub first_point: usize,
    pub point_count: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration: i64,
    pub distance: f64,
    pub speed: f64,
    pub mean_coord: Coord,
    pub ne_corner: Coord,
    pub sw_corner: Coord,
}

impl Track {
    /// 1-based sequence number of the first point, as shown in track listings.
    pub fn seqno(&self) -> usize {
        self.first_point + 1
    }

    pub fn points<'a>(&self, trackpoints: &'a [Trackpoint]) -> &'a [Trackpoint] {
        let end = (self.first_point + self.point_count).min(trackpoints.len());
        trackpoints.get(self.first_point..end).unwrap_or_default()
    }
}

/// Split a trackpoint sequence into tracks.
///
/// A track opens at the first point and at every segment-start point, and
/// closes on the point just before the next opening or on the last point.
/// End time, duration and distance come from the closing point.
pub fn segment_tracks(trackpoints: &[Trackpoint], unit_time: TimeUnit) -> Vec<Track> {
    let mut tracks = Vec::new();
    let mut open: Option<OpenTrack> = None;

    for (i, point) in trackpoints.iter().enumerate() {
        if point.segment_start || open.is_none() {
            if let Some(track) = open.take() {
                tracks.push(track.close(&trackpoints[i - 1], i, unit_time));
            }
            open = Some(OpenTrack::new(i, point));
        } else if let Some(track) = open.as_mut() {
            track.extend(point.coord);
        }
    }

    if let (Some(track), Some(last)) = (open, trackpoints.last()) {
        tracks.push(track.close(last, trackpoints.len(), unit_time));
    }

    tracks
}

struct OpenTrack {
    first_point: usize,
    start: NaiveDateTime,
    ne: Coord,
    sw: Coord,
}

impl OpenTrack {
    fn new(first_point: usize, point: &Trackpoint) -> Self {
        Self {
            first_point,
            start: point.timestamp,
            ne: point.coord,
            sw: point.coord,
        }
    }

    fn extend(&mut self, coord: Coord) {
        self.ne.lat = self.ne.lat.max(coord.lat);
        self.ne.lon = self.ne.lon.max(coord.lon);
        self.sw.lat = self.sw.lat.min(coord.lat);
        self.sw.lon = self.sw.lon.min(coord.lon);
    }

    /// `end_index` is one past the closing point.
    fn close(self, closing: &Trackpoint, end_index: usize, unit_time: TimeUnit) -> Track {
        let mut speed = if closing.duration == 0 {
            0.0
        } else {
            closing.distance / closing.duration as f64
        };
        if unit_time == TimeUnit::Hours {
            speed *= 3600.0;
        }

        Track {
            first_point: self.first_point,
            point_count: end_index - self.first_point,
            start: self.start,
            end: closing.timestamp,
            duration: closing.duration,
            distance: closing.distance,
            speed,
            mean_coord: Coord {
                lat: (self.ne.lat + self.sw.lat) / 2.0,
                lon: (self.ne.lon + self.sw.lon) / 2.0,
            },
            ne_corner: self.ne,
            sw_corner: self.sw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2010, 2, 1)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap()
    }

    fn point(minute: u32, start: bool, lat: f64, lon: f64, duration: i64, distance: f64) -> Trackpoint {
        Trackpoint {
            coord: Coord::new(lat, lon),
            timestamp: at(minute),
            segment_start: start,
            duration,
            distance,
            speed: 0.0,
            comment: String::new(),
        }
    }

    #[test]
    fn test_two_segments_close_before_next_start() {
        let points = vec![
            point(0, true, 45.0, -75.0, 0, 0.0),
            point(5, false, 45.2, -75.4, 300, 1200.0),
            point(30, true, 46.0, -76.0, 0, 0.0),
            point(40, false, 46.5, -76.5, 600, 3000.0),
        ];
        let tracks = segment_tracks(&points, TimeUnit::Seconds);
        assert_eq!(tracks.len(), 2);

        let first = &tracks[0];
        assert_eq!(first.seqno(), 1);
        assert_eq!(first.point_count, 2);
        assert_eq!(first.start, at(0));
        assert_eq!(first.end, at(5));
        assert_eq!(first.duration, 300);
        assert!((first.distance - 1200.0).abs() < 1e-12);
        assert!((first.speed - 4.0).abs() < 1e-12);
        assert!((first.ne_corner.lat - 45.2).abs() < 1e-12);
        assert!((first.sw_corner.lon + 75.4).abs() < 1e-12);
        assert!((first.mean_coord.lat - 45.1).abs() < 1e-12);
        assert!((first.mean_coord.lon + 75.2).abs() < 1e-12);

        let second = &tracks[1];
        assert_eq!(second.first_point, 2);
        assert_eq!(second.point_count, 2);
        assert_eq!(second.end, at(40));
        assert_eq!(second.duration, 600);
    }

    #[test]
    fn test_speed_scaled_for_hours() {
        let points = vec![
            point(0, true, 45.0, -75.0, 0, 0.0),
            point(30, false, 45.1, -75.1, 1800, 9.0),
        ];
        let tracks = segment_tracks(&points, TimeUnit::Hours);
        assert!((tracks[0].speed - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_point_opens_track_without_flag() {
        let points = vec![
            point(0, false, 45.0, -75.0, 0, 0.0),
            point(1, false, 45.1, -75.1, 60, 100.0),
        ];
        let tracks = segment_tracks(&points, TimeUnit::Seconds);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].first_point, 0);
        assert_eq!(tracks[0].point_count, 2);
    }

    #[test]
    fn test_zero_duration_gives_zero_speed() {
        let points = vec![point(0, true, 45.0, -75.0, 0, 0.0)];
        let tracks = segment_tracks(&points, TimeUnit::Seconds);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].speed, 0.0);
        assert_eq!(tracks[0].points(&points).len(), 1);
    }

    #[test]
    fn test_no_points_no_tracks() {
        assert!(segment_tracks(&[], TimeUnit::Seconds).is_empty());
    }
}
