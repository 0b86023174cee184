//! In-place operations on a parsed file: discard, keep, sort and merge.

use std::path::Path;

use chrono::TimeDelta;

use crate::error::{GpsuError, Result};
use crate::gpsu_types::{GpsFile, Route, TimeUnit};
use crate::parser::read_gpsu_path;

/// A top-level section of a GPSU file, named by a single letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Waypoints,
    Routes,
    Trackpoints,
}

impl Component {
    pub fn from_letter(letter: char) -> Result<Self> {
        match letter {
            'w' => Ok(Self::Waypoints),
            'r' => Ok(Self::Routes),
            't' => Ok(Self::Trackpoints),
            other => Err(GpsuError::Component(other)),
        }
    }
}

/// Which sections an operation removes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Removal {
    waypoints: bool,
    routes: bool,
    trackpoints: bool,
}

impl Removal {
    /// Routes cannot outlive the waypoints they reference.
    fn discarding(letters: &str) -> Result<Self> {
        let mut removal = Self::default();
        for letter in letters.chars() {
            match Component::from_letter(letter)? {
                Component::Waypoints => {
                    removal.waypoints = true;
                    removal.routes = true;
                }
                Component::Routes => removal.routes = true,
                Component::Trackpoints => removal.trackpoints = true,
            }
        }
        Ok(removal)
    }

    /// Keeping routes keeps the waypoints they reference.
    fn keeping(letters: &str) -> Result<Self> {
        let mut removal = Self {
            waypoints: true,
            routes: true,
            trackpoints: true,
        };
        for letter in letters.chars() {
            match Component::from_letter(letter)? {
                Component::Waypoints => removal.waypoints = false,
                Component::Routes => {
                    removal.routes = false;
                    removal.waypoints = false;
                }
                Component::Trackpoints => removal.trackpoints = false,
            }
        }
        Ok(removal)
    }
}

impl GpsFile {
    /// Remove the named components (`w`, `r`, `t`). Discarding waypoints also discards routes.
    ///
    /// Declines with [`GpsuError::EmptyFile`] and leaves the file untouched when
    /// nothing would be left.
    pub fn discard(&mut self, letters: &str) -> Result<()> {
        self.remove(Removal::discarding(letters)?)
    }

    /// Remove everything except the named components. Keeping routes also keeps waypoints.
    pub fn keep(&mut self, letters: &str) -> Result<()> {
        self.remove(Removal::keeping(letters)?)
    }

    fn remove(&mut self, removal: Removal) -> Result<()> {
        let waypoints_left = !removal.waypoints && !self.waypoints.is_empty();
        let routes_left = !removal.routes && !self.routes.is_empty();
        let trackpoints_left = !removal.trackpoints && !self.trackpoints.is_empty();
        if !(waypoints_left || routes_left || trackpoints_left) {
            tracing::warn!("declined to remove components: no data would be left");
            return Err(GpsuError::EmptyFile);
        }

        if removal.waypoints {
            self.waypoints.clear();
        }
        if removal.routes {
            self.routes.clear();
        }
        if removal.trackpoints {
            self.trackpoints.clear();
        }
        Ok(())
    }

    /// Order waypoints by ID, byte-wise, and repoint every route leg at the
    /// waypoint that carries the ID it pointed at before.
    ///
    /// With duplicate IDs a leg resolves to the first match after sorting,
    /// which need not be the waypoint it referenced before.
    pub fn sort_waypoints(&mut self) -> Result<()> {
        let mut leg_ids: Vec<Vec<String>> = Vec::with_capacity(self.routes.len());
        for route in &self.routes {
            let ids = route
                .legs
                .iter()
                .enumerate()
                .map(|(n, &index)| {
                    self.leg_id(index)
                        .map(str::to_string)
                        .ok_or(GpsuError::Sort {
                            route: route.number,
                            leg: n + 1,
                            index,
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            leg_ids.push(ids);
        }

        self.waypoints.sort_by(|a, b| a.id.as_bytes().cmp(b.id.as_bytes()));

        for (route, ids) in self.routes.iter_mut().zip(leg_ids) {
            for (leg, id) in route.legs.iter_mut().zip(ids) {
                if let Some(index) = self.waypoints.iter().position(|wp| wp.id == id) {
                    *leg = index;
                }
            }
        }
        Ok(())
    }

    /// Append the contents of `other`, converting it to this file's conventions.
    ///
    /// - incoming legs are offset past this file's waypoints;
    /// - incoming routes are renumbered into a hundred-block above this file's routes;
    /// - all waypoint IDs and symbols are padded to the widest after the merge,
    ///   and clashing incoming IDs get their last character rewritten;
    /// - incoming trackpoints are shifted to this time zone and rescaled to these units.
    ///
    /// Fails with [`GpsuError::RouteNumber`] before changing anything when the
    /// renumbered routes would run past [`Route::MAX_NUMBER`].
    pub fn merge(&mut self, mut other: GpsFile) -> Result<()> {
        let offset = self.waypoints.len();
        tracing::debug!(
            waypoints = other.waypoints.len(),
            routes = other.routes.len(),
            trackpoints = other.trackpoints.len(),
            "merging GPSU file"
        );

        if !other.routes.is_empty() {
            let first = self.first_free_route_number(&other)?;
            for (route, number) in other.routes.iter_mut().zip(first..) {
                for leg in &mut route.legs {
                    *leg += offset;
                }
                route.number = number;
            }
            self.routes.append(&mut other.routes);
        }

        if !other.waypoints.is_empty() {
            self.waypoints.append(&mut other.waypoints);
            self.pad_waypoint_fields();
            self.rename_duplicates(offset);
        }

        if !other.trackpoints.is_empty() {
            if other.time_zone != self.time_zone {
                let shift =
                    TimeDelta::hours(i64::from(self.time_zone) - i64::from(other.time_zone));
                for tp in &mut other.trackpoints {
                    tp.timestamp += shift;
                }
            }
            if other.unit_horz != self.unit_horz {
                let dist_factor =
                    other.unit_horz.to_nautical_miles() / self.unit_horz.to_nautical_miles();
                let mut speed_factor = dist_factor;
                if other.unit_time == TimeUnit::Hours {
                    speed_factor /= 3600.0;
                }
                if self.unit_time == TimeUnit::Hours {
                    speed_factor *= 3600.0;
                }
                tracing::debug!(dist_factor, speed_factor, "converting merged trackpoint units");
                for tp in &mut other.trackpoints {
                    tp.distance *= dist_factor;
                    tp.speed *= speed_factor;
                }
            }
            self.trackpoints.append(&mut other.trackpoints);
        }
        Ok(())
    }

    /// Read the GPSU file at `path` and merge it in. A parse failure leaves this file untouched.
    pub fn merge_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let other = read_gpsu_path(path)?;
        self.merge(other)
    }

    /// Start from the lowest incoming number (capped at 1000) and bump it,
    /// keeping its last two digits, past each of our route numbers it would collide with.
    /// The whole incoming run must still fit under [`Route::MAX_NUMBER`].
    fn first_free_route_number(&self, other: &GpsFile) -> Result<u32> {
        let overflow = || GpsuError::RouteNumber {
            max: Route::MAX_NUMBER,
        };
        let mut start = other
            .routes
            .iter()
            .map(|r| r.number)
            .fold(1000, u32::min);
        for route in &self.routes {
            if start <= route.number {
                start = (route.number / 100 + 1)
                    .checked_mul(100)
                    .and_then(|block| block.checked_add(start % 100))
                    .ok_or_else(overflow)?;
            }
        }
        let last = u32::try_from(other.routes.len() - 1)
            .ok()
            .and_then(|extra| start.checked_add(extra))
            .filter(|&last| last <= Route::MAX_NUMBER)
            .ok_or_else(overflow)?;
        tracing::debug!(start, last, "merged route numbers");
        Ok(start)
    }

    fn pad_waypoint_fields(&mut self) {
        let id_width = self
            .waypoints
            .iter()
            .map(|wp| wp.id.chars().count())
            .max()
            .unwrap_or(0);
        let symbol_width = self
            .waypoints
            .iter()
            .map(|wp| wp.symbol.chars().count())
            .max()
            .unwrap_or(0);
        for wp in &mut self.waypoints {
            wp.id = format!("{:<id_width$}", wp.id);
            wp.symbol = format!("{:<symbol_width$}", wp.symbol);
        }
    }

    /// Give each incoming waypoint whose ID clashes with any other a new last
    /// character, counting up from `'0'`, rescanning the whole set after every rewrite.
    fn rename_duplicates(&mut self, first_incoming: usize) {
        for i in first_incoming..self.waypoints.len() {
            let mut code = b'0';
            let mut j = 0;
            while j < self.waypoints.len() {
                if i != j && self.waypoints[i].id == self.waypoints[j].id {
                    let id = &mut self.waypoints[i].id;
                    if id.pop().is_none() {
                        break;
                    }
                    id.push(char::from(code));
                    tracing::debug!(index = i, id = %id, "rewrote duplicate waypoint ID");
                    code = code.wrapping_add(1);
                    j = 0;
                    continue;
                }
                j += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpsu_types::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn waypoints(ids: &[&str]) -> Vec<Waypoint> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Waypoint::new(*id, Coord::new(i as f64, i as f64)))
            .collect()
    }

    fn route(number: u32, legs: &[usize]) -> Route {
        Route {
            number,
            comment: String::new(),
            legs: legs.to_vec(),
        }
    }

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2010, 2, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn trackpoint(hour: u32, distance: f64, speed: f64) -> Trackpoint {
        Trackpoint {
            coord: Coord::new(45.0, -75.0),
            timestamp: at(hour),
            segment_start: false,
            duration: 60,
            distance,
            speed,
            comment: String::new(),
        }
    }

    fn full_file() -> GpsFile {
        GpsFile {
            waypoints: waypoints(&["AA", "BB"]),
            routes: vec![route(1, &[0, 1])],
            trackpoints: vec![trackpoint(10, 0.0, 0.0)],
            ..GpsFile::default()
        }
    }

    #[test]
    fn test_discard_waypoints_takes_routes() {
        let mut file = full_file();
        file.discard("w").unwrap();
        assert!(file.waypoints.is_empty());
        assert!(file.routes.is_empty());
        assert_eq!(file.trackpoints.len(), 1);
    }

    #[test]
    fn test_discard_everything_declines() {
        let mut file = full_file();
        let before = file.clone();
        let err = file.discard("wrt").unwrap_err();
        assert!(matches!(err, GpsuError::EmptyFile));
        assert!(!err.is_fatal());
        assert_eq!(file, before);
    }

    #[test]
    fn test_discard_last_present_component_declines() {
        let mut file = GpsFile {
            trackpoints: vec![trackpoint(10, 0.0, 0.0)],
            ..GpsFile::default()
        };
        assert!(matches!(file.discard("t"), Err(GpsuError::EmptyFile)));
        assert_eq!(file.trackpoints.len(), 1);
    }

    #[test]
    fn test_unknown_component_letter() {
        let mut file = full_file();
        let before = file.clone();
        assert!(matches!(file.discard("wx"), Err(GpsuError::Component('x'))));
        assert!(matches!(file.keep("W"), Err(GpsuError::Component('W'))));
        assert_eq!(file, before);
    }

    #[test]
    fn test_keep_routes_keeps_waypoints() {
        let mut file = full_file();
        file.keep("r").unwrap();
        assert_eq!(file.waypoints.len(), 2);
        assert_eq!(file.routes.len(), 1);
        assert!(file.trackpoints.is_empty());
    }

    #[test]
    fn test_keep_waypoints_only() {
        let mut file = full_file();
        file.keep("w").unwrap();
        assert_eq!(file.waypoints.len(), 2);
        assert!(file.routes.is_empty());
        assert!(file.trackpoints.is_empty());
    }

    #[test]
    fn test_keep_nothing_declines() {
        let mut file = full_file();
        assert!(matches!(file.keep(""), Err(GpsuError::EmptyFile)));
        assert_eq!(file.waypoints.len(), 2);
    }

    #[test]
    fn test_sort_repoints_legs() {
        let mut file = GpsFile {
            waypoints: waypoints(&["DELTA", "ALPHA", "CHARLIE", "BRAVO"]),
            routes: vec![route(1, &[0, 2, 1]), route(2, &[3, 0])],
            ..GpsFile::default()
        };
        file.sort_waypoints().unwrap();

        let ids: Vec<&str> = file.waypoints.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, ["ALPHA", "BRAVO", "CHARLIE", "DELTA"]);
        assert_eq!(file.routes[0].legs, vec![3, 2, 0]);
        assert_eq!(file.routes[1].legs, vec![1, 3]);
    }

    #[test]
    fn test_sort_is_bytewise() {
        let mut file = GpsFile {
            waypoints: waypoints(&["b", "B", "a", "A"]),
            ..GpsFile::default()
        };
        file.sort_waypoints().unwrap();
        let ids: Vec<&str> = file.waypoints.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, ["A", "B", "a", "b"]);
    }

    #[test]
    fn test_sort_dangling_leg_fails_untouched() {
        let mut file = GpsFile {
            waypoints: waypoints(&["B", "A"]),
            routes: vec![route(4, &[1, 7])],
            ..GpsFile::default()
        };
        let before = file.clone();
        let err = file.sort_waypoints().unwrap_err();
        assert!(matches!(
            err,
            GpsuError::Sort {
                route: 4,
                leg: 2,
                index: 7
            }
        ));
        assert_eq!(file, before);
    }

    #[test]
    fn test_merge_offsets_and_renumbers_routes() {
        let mut a = GpsFile {
            waypoints: waypoints(&["A1", "A2"]),
            routes: vec![route(1, &[0, 1]), route(2, &[1])],
            ..GpsFile::default()
        };
        let b = GpsFile {
            waypoints: waypoints(&["B1", "B2"]),
            routes: vec![route(1, &[1, 0]), route(5, &[0])],
            ..GpsFile::default()
        };
        a.merge(b).unwrap();

        let numbers: Vec<u32> = a.routes.iter().map(|r| r.number).collect();
        assert_eq!(numbers, [1, 2, 101, 102]);
        assert_eq!(a.routes[2].legs, vec![3, 2]);
        assert_eq!(a.routes[3].legs, vec![2]);
        assert_eq!(a.leg_id(a.routes[2].legs[0]), Some("B2"));
    }

    #[test]
    fn test_merge_route_block_clears_every_existing_number() {
        let mut a = GpsFile {
            waypoints: waypoints(&["A1"]),
            routes: vec![route(120, &[0]), route(250, &[0])],
            ..GpsFile::default()
        };
        let b = GpsFile {
            waypoints: waypoints(&["B1"]),
            routes: vec![route(10, &[0])],
            ..GpsFile::default()
        };
        a.merge(b).unwrap();
        assert_eq!(a.routes[2].number, 310);
    }

    #[test]
    fn test_merge_pads_ids_and_symbols() {
        let mut a = GpsFile {
            waypoints: waypoints(&["LONGID"]),
            ..GpsFile::default()
        };
        let mut b = GpsFile {
            waypoints: waypoints(&["X"]),
            ..GpsFile::default()
        };
        b.waypoints[0].symbol = "Flag".to_string();
        a.merge(b).unwrap();
        assert_eq!(a.waypoints[1].id, "X     ");
        assert_eq!(a.waypoints[0].symbol, "    ");
        assert_eq!(a.waypoints[1].symbol, "Flag");
    }

    #[test]
    fn test_merge_pads_by_characters() {
        let mut a = GpsFile {
            waypoints: waypoints(&["ÉTÉ"]),
            ..GpsFile::default()
        };
        let mut b = GpsFile {
            waypoints: waypoints(&["X"]),
            ..GpsFile::default()
        };
        b.waypoints[0].symbol = "Café".to_string();
        a.merge(b).unwrap();
        assert_eq!(a.waypoints[1].id, "X  ");
        assert_eq!(a.waypoints[0].symbol, "    ");
        assert_eq!(a.waypoints[1].symbol, "Café");
    }

    #[test]
    fn test_merge_renames_duplicate_ids() {
        let mut a = GpsFile {
            waypoints: waypoints(&["AAAA"]),
            ..GpsFile::default()
        };
        let b = GpsFile {
            waypoints: waypoints(&["AAAA"]),
            ..GpsFile::default()
        };
        a.merge(b).unwrap();
        assert_eq!(a.waypoints[0].id, "AAAA");
        assert_eq!(a.waypoints[1].id, "AAA0");
    }

    #[test]
    fn test_merge_rename_rescans_after_rewrite() {
        let mut a = GpsFile {
            waypoints: waypoints(&["AAA0", "AAAA"]),
            ..GpsFile::default()
        };
        let b = GpsFile {
            waypoints: waypoints(&["AAAA"]),
            ..GpsFile::default()
        };
        a.merge(b).unwrap();
        assert_eq!(a.waypoints[2].id, "AAA1");
    }

    #[test]
    fn test_merge_shifts_time_zone() {
        let mut a = GpsFile {
            time_zone: -5,
            ..GpsFile::default()
        };
        let b = GpsFile {
            time_zone: 1,
            trackpoints: vec![trackpoint(12, 0.0, 0.0)],
            ..GpsFile::default()
        };
        a.merge(b).unwrap();
        assert_eq!(a.trackpoints[0].timestamp, at(6));
    }

    #[test]
    fn test_merge_km_into_nautical_miles() {
        let mut a = GpsFile::default();
        a.set_units(HorizontalUnit::NauticalMiles);
        let mut b = GpsFile {
            trackpoints: vec![trackpoint(10, 1.852, 18.52)],
            ..GpsFile::default()
        };
        b.set_units(HorizontalUnit::Kilometers);
        a.merge(b).unwrap();

        let tp = &a.trackpoints[0];
        assert!((tp.distance - 1.0).abs() < 1e-9);
        assert!((tp.speed - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_meters_into_kilometers_scales_speed_by_time_unit() {
        let mut a = GpsFile::default();
        a.set_units(HorizontalUnit::Kilometers);
        let b = GpsFile {
            trackpoints: vec![trackpoint(10, 1000.0, 10.0)],
            ..GpsFile::default()
        };
        a.merge(b).unwrap();

        let tp = &a.trackpoints[0];
        assert!((tp.distance - 1.0).abs() < 1e-9);
        // 10 m/s is 36 km/h
        assert!((tp.speed - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_same_units_untouched() {
        let mut a = GpsFile::default();
        let b = GpsFile {
            trackpoints: vec![trackpoint(10, 123.0, 4.5)],
            ..GpsFile::default()
        };
        a.merge(b).unwrap();
        assert_eq!(a.trackpoints[0].distance, 123.0);
        assert_eq!(a.trackpoints[0].speed, 4.5);
    }

    #[test]
    fn test_merge_route_numbers_past_limit_fail_untouched() {
        let mut a = GpsFile {
            waypoints: waypoints(&["A1"]),
            routes: vec![route(Route::MAX_NUMBER, &[0])],
            ..GpsFile::default()
        };
        let b = GpsFile {
            waypoints: waypoints(&["B1"]),
            routes: vec![route(1, &[0]), route(2, &[0])],
            ..GpsFile::default()
        };
        let before = a.clone();
        let err = a.merge(b).unwrap_err();
        assert!(matches!(err, GpsuError::RouteNumber { max } if max == Route::MAX_NUMBER));
        assert_eq!(a, before);
    }

    #[test]
    fn test_merge_route_run_ending_on_limit() {
        // 2147483599 bumps the incoming block to ..600, leaving room for exactly 48 routes
        let mut a = GpsFile {
            waypoints: waypoints(&["A1"]),
            routes: vec![route(2_147_483_599, &[0])],
            ..GpsFile::default()
        };
        let b = GpsFile {
            waypoints: waypoints(&["B1"]),
            routes: (0..48).map(|_| route(0, &[0])).collect(),
            ..GpsFile::default()
        };
        a.merge(b.clone()).unwrap();
        assert_eq!(a.routes[1].number, 2_147_483_600);
        assert_eq!(a.routes.last().map(|r| r.number), Some(Route::MAX_NUMBER));

        let mut c = a.clone();
        assert!(c.merge(b).is_err());
    }

    #[test]
    fn test_merge_shifts_across_widest_zones() {
        let mut a = GpsFile {
            time_zone: 23,
            ..GpsFile::default()
        };
        let b = GpsFile {
            time_zone: -23,
            trackpoints: vec![trackpoint(12, 0.0, 0.0)],
            ..GpsFile::default()
        };
        a.merge(b).unwrap();
        assert_eq!(a.trackpoints[0].timestamp, at(12) + TimeDelta::hours(46));
    }

    #[test]
    fn test_component_letters() {
        assert_eq!(Component::from_letter('r').unwrap(), Component::Routes);
        assert!(matches!(
            Component::from_letter('q'),
            Err(GpsuError::Component('q'))
        ));
    }
}
