use chrono::NaiveDateTime;
use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::gpsu_types::*;
use crate::options::{ExportOptions, GpsuElementType};
use crate::track::Track;

/// Convert a parsed GPSU file to a GeoJSON FeatureCollection.
pub fn to_feature_collection(file: &GpsFile, opts: &ExportOptions) -> FeatureCollection {
    let mut features = Vec::new();

    if opts.should_include(GpsuElementType::Waypoint) {
        for wp in &file.waypoints {
            features.push(waypoint_to_feature(wp, opts));
        }
    }

    if opts.should_include(GpsuElementType::Route) {
        for route in &file.routes {
            features.extend(route_to_feature(file, route, opts));
        }
    }

    if opts.should_include(GpsuElementType::Track) {
        features.extend(tracks_to_features(file, opts));
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn waypoint_to_feature(wp: &Waypoint, opts: &ExportOptions) -> Feature {
    let mut props = typed_props("waypoint");

    if opts.include_metadata {
        props.insert("id".to_string(), JsonValue::String(wp.id.trim_end().to_string()));
        insert_nonempty(&mut props, "symbol", wp.symbol.trim_end());
        insert_nonempty(&mut props, "comment", &wp.comment);
        props.insert(
            "textChoice".to_string(),
            JsonValue::String(wp.text_choice.glyph().to_string()),
        );
        props.insert(
            "textPlace".to_string(),
            JsonValue::String(wp.text_place.as_str().to_string()),
        );
    }

    feature(Value::Point(position(wp.coord)), props)
}

/// Legs that no longer resolve to a waypoint are left out of the line.
fn route_to_feature(file: &GpsFile, route: &Route, opts: &ExportOptions) -> Option<Feature> {
    let mut coords: Vec<Vec<f64>> = route
        .legs
        .iter()
        .filter_map(|&leg| file.waypoints.get(leg))
        .map(|wp| position(wp.coord))
        .collect();

    let geometry = match coords.len() {
        0 => return None,
        1 => Value::Point(coords.remove(0)),
        _ => Value::LineString(coords),
    };

    let mut props = typed_props("route");
    if opts.include_metadata {
        props.insert("number".to_string(), JsonValue::from(route.number));
        insert_nonempty(&mut props, "comment", &route.comment);
    }

    Some(feature(geometry, props))
}

fn tracks_to_features(file: &GpsFile, opts: &ExportOptions) -> Vec<Feature> {
    let tracks = file.tracks();
    let (single, multi): (Vec<&Track>, Vec<&Track>) =
        tracks.iter().partition(|t| t.point_count == 1);

    // Single-point tracks always stand alone as Points
    let mut features: Vec<Feature> = single
        .iter()
        .map(|track| track_to_feature(file, track, opts))
        .collect();

    if !opts.join_tracks {
        features.extend(multi.iter().map(|track| track_to_feature(file, track, opts)));
        return features;
    }

    if multi.is_empty() {
        return features;
    }

    let lines: Vec<Vec<Vec<f64>>> = multi
        .iter()
        .map(|track| track.points(&file.trackpoints).iter().map(|tp| position(tp.coord)).collect())
        .collect();

    let mut props = typed_props("track");
    if opts.include_metadata {
        props.insert("tracks".to_string(), JsonValue::from(multi.len()));
    }
    if opts.include_time {
        let times = multi
            .iter()
            .map(|track| coordinate_times(file, track.points(&file.trackpoints)))
            .collect();
        insert_coordinate_times(&mut props, JsonValue::Array(times));
    }

    features.push(feature(Value::MultiLineString(lines), props));
    features
}

fn track_to_feature(file: &GpsFile, track: &Track, opts: &ExportOptions) -> Feature {
    let points = track.points(&file.trackpoints);
    let mut coords: Vec<Vec<f64>> = points.iter().map(|tp| position(tp.coord)).collect();
    let geometry = if coords.len() == 1 {
        Value::Point(coords.remove(0))
    } else {
        Value::LineString(coords)
    };

    let mut props = typed_props("track");
    if opts.include_metadata {
        props.insert("track".to_string(), JsonValue::from(track.seqno()));
        props.insert(
            "start".to_string(),
            JsonValue::String(iso_time(&track.start, file.time_zone)),
        );
        props.insert(
            "end".to_string(),
            JsonValue::String(iso_time(&track.end, file.time_zone)),
        );
        props.insert("duration".to_string(), JsonValue::from(track.duration));
        props.insert("distance".to_string(), JsonValue::from(track.distance));
        props.insert("speed".to_string(), JsonValue::from(track.speed));
        if let Some(first) = points.first() {
            insert_nonempty(&mut props, "comment", &first.comment);
        }
    }
    if opts.include_time {
        insert_coordinate_times(&mut props, coordinate_times(file, points));
    }

    feature(geometry, props)
}

fn feature(value: Value, properties: Map<String, JsonValue>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn typed_props(gpsu_type: &str) -> Map<String, JsonValue> {
    let mut props = Map::new();
    props.insert(
        "gpsuType".to_string(),
        JsonValue::String(gpsu_type.to_string()),
    );
    props
}

/// Build a `[lon, lat]` position.
fn position(coord: Coord) -> Vec<f64> {
    vec![coord.lon, coord.lat]
}

/// Wall-clock time with the file's whole-hour UTC offset, e.g. `2010-02-01T10:00:00-05:00`.
fn iso_time(t: &NaiveDateTime, time_zone: i32) -> String {
    let sign = if time_zone < 0 { '-' } else { '+' };
    format!(
        "{}{sign}{:02}:00",
        t.format("%Y-%m-%dT%H:%M:%S"),
        time_zone.unsigned_abs()
    )
}

fn coordinate_times(file: &GpsFile, points: &[Trackpoint]) -> JsonValue {
    points
        .iter()
        .map(|tp| JsonValue::String(iso_time(&tp.timestamp, file.time_zone)))
        .collect()
}

fn insert_coordinate_times(props: &mut Map<String, JsonValue>, times: JsonValue) {
    let mut coord_props = Map::new();
    coord_props.insert("times".to_string(), times);
    props.insert(
        "coordinateProperties".to_string(),
        JsonValue::Object(coord_props),
    );
}

fn insert_nonempty(props: &mut Map<String, JsonValue>, key: &str, value: &str) {
    if !value.is_empty() {
        props.insert(key.to_string(), JsonValue::String(value.to_string()));
    }
}
