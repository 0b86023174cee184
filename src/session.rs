use geojson::FeatureCollection;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::converter::to_feature_collection;
use crate::error::{GpsuError, Result};
use crate::gpsu_types::*;
use crate::options::ExportOptions;
use crate::parser::parse_gpsu;
use crate::track::Track;
use crate::writer::to_gpsu_string;

/// One loaded GPSU file, owned by the JS caller.
///
/// Reading replaces whatever was loaded before. Freeing drops the model and
/// every track derived from it; `getData` fails until the next successful read.
#[wasm_bindgen]
#[derive(Debug, Default)]
pub struct GpsSession {
    file: Option<GpsFile>,
}

/// Everything a map display needs from a loaded file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<'a> {
    pub waypoints: &'a [Waypoint],
    pub routes: &'a [Route],
    pub trackpoints: &'a [Trackpoint],
    pub tracks: Vec<Track>,
    pub unit_horz: HorizontalUnit,
    pub unit_time: TimeUnit,
}

impl GpsSession {
    /// Parse `text` into the session. A failed parse leaves the session empty.
    pub fn read(&mut self, text: &str) -> Result<()> {
        self.file = None;
        self.file = Some(parse_gpsu(text)?);
        Ok(())
    }

    /// Drop the loaded file. Safe to call when nothing is loaded.
    pub fn free(&mut self) {
        self.file = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.file.is_some()
    }

    pub fn file(&self) -> Result<&GpsFile> {
        self.file.as_ref().ok_or(GpsuError::NotLoaded)
    }

    pub fn file_mut(&mut self) -> Result<&mut GpsFile> {
        self.file.as_mut().ok_or(GpsuError::NotLoaded)
    }

    /// Tracks are derived fresh on every call.
    pub fn snapshot(&self) -> Result<Snapshot<'_>> {
        let file = self.file()?;
        Ok(Snapshot {
            waypoints: &file.waypoints,
            routes: &file.routes,
            trackpoints: &file.trackpoints,
            tracks: file.tracks(),
            unit_horz: file.unit_horz,
            unit_time: file.unit_time,
        })
    }

    /// Parse `text` as a second file and merge it into the loaded one.
    pub fn merge_text(&mut self, text: &str) -> Result<()> {
        let file = self.file_mut()?;
        let other = parse_gpsu(text)?;
        file.merge(other)
    }

    pub fn feature_collection(&self, opts: &ExportOptions) -> Result<FeatureCollection> {
        Ok(to_feature_collection(self.file()?, opts))
    }
}

#[wasm_bindgen]
impl GpsSession {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        crate::init_hooks();
        Self::default()
    }

    #[wasm_bindgen(js_name = readFile)]
    pub fn read_file(&mut self, text: &str) -> std::result::Result<(), JsValue> {
        Ok(self.read(text)?)
    }

    #[wasm_bindgen(js_name = getData)]
    pub fn get_data(&self) -> std::result::Result<JsValue, JsValue> {
        let snapshot = self.snapshot()?;
        serde_wasm_bindgen::to_value(&snapshot).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = freeFile)]
    pub fn free_file(&mut self) {
        self.free();
    }

    /// Returns false when declined because nothing would be left.
    #[wasm_bindgen(js_name = discard)]
    pub fn discard_js(&mut self, letters: &str) -> std::result::Result<bool, JsValue> {
        declined_to_false(self.file_mut()?.discard(letters))
    }

    /// Returns false when declined because nothing would be left.
    #[wasm_bindgen(js_name = keep)]
    pub fn keep_js(&mut self, letters: &str) -> std::result::Result<bool, JsValue> {
        declined_to_false(self.file_mut()?.keep(letters))
    }

    #[wasm_bindgen(js_name = sortWaypoints)]
    pub fn sort_waypoints(&mut self) -> std::result::Result<(), JsValue> {
        Ok(self.file_mut()?.sort_waypoints()?)
    }

    #[wasm_bindgen(js_name = merge)]
    pub fn merge_js(&mut self, text: &str) -> std::result::Result<(), JsValue> {
        Ok(self.merge_text(text)?)
    }

    #[wasm_bindgen(js_name = write)]
    pub fn write_js(&self) -> std::result::Result<String, JsValue> {
        Ok(to_gpsu_string(self.file()?)?)
    }

    #[wasm_bindgen(js_name = info)]
    pub fn info_js(&self) -> std::result::Result<String, JsValue> {
        Ok(self.file()?.summary().to_string())
    }

    #[wasm_bindgen(js_name = toGeoJson)]
    pub fn to_geojson(&self, options: JsValue) -> std::result::Result<JsValue, JsValue> {
        let opts = crate::parse_options(options)?;
        let fc = self.feature_collection(&opts)?;
        serde_wasm_bindgen::to_value(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

fn declined_to_false(outcome: Result<()>) -> std::result::Result<bool, JsValue> {
    match outcome {
        Ok(()) => Ok(true),
        Err(e) if !e.is_fatal() => Ok(false),
        Err(e) => Err(e.into()),
    }
}
