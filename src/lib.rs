pub mod converter;
pub mod decode;
pub mod error;
pub mod gpsu_types;
pub mod options;
pub mod parser;
pub mod schema;
pub mod session;
pub mod summary;
pub mod track;
pub mod transform;
pub mod writer;

use wasm_bindgen::prelude::*;

pub use crate::error::{ErrorKind, GpsuError, ParseError, Result};
pub use crate::gpsu_types::*;
pub use crate::options::{ExportOptions, GpsuElementType};
pub use crate::parser::{parse_gpsu, read_gpsu, read_gpsu_path};
pub use crate::session::GpsSession;
pub use crate::summary::Summary;
pub use crate::track::{segment_tracks, Track};
pub use crate::transform::Component;
pub use crate::writer::{to_gpsu_string, write_gpsu};

/// Convert GPSU text to GeoJSON, returned as a JS object.
#[wasm_bindgen(js_name = gpsuToGeoJson)]
pub fn gpsu_to_geojson(gpsu_string: &str, options: JsValue) -> std::result::Result<JsValue, JsValue> {
    init_hooks();

    let opts = parse_options(options)?;
    let file = parser::parse_gpsu(gpsu_string).map_err(GpsuError::from)?;
    let fc = converter::to_feature_collection(&file, &opts);
    serde_wasm_bindgen::to_value(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Convert GPSU text to GeoJSON, returned as a JSON string.
#[wasm_bindgen(js_name = gpsuToGeoJsonString)]
pub fn gpsu_to_geojson_string(gpsu_string: &str, options: JsValue) -> std::result::Result<String, JsValue> {
    init_hooks();

    let opts = parse_options(options)?;
    let file = parser::parse_gpsu(gpsu_string).map_err(GpsuError::from)?;
    let fc = converter::to_feature_collection(&file, &opts);
    serde_json::to_string(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn parse_options(options: JsValue) -> std::result::Result<ExportOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(ExportOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

/// Route panics and `tracing` events to the browser console. Repeat calls are no-ops.
fn init_hooks() {
    console_error_panic_hook::set_once();

    #[cfg(target_arch = "wasm32")]
    {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;
        use tracing_wasm::WASMLayerConfigBuilder;

        let mut builder = WASMLayerConfigBuilder::new();
        builder.set_max_level(if cfg!(debug_assertions) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        });
        let _ = tracing_subscriber::registry()
            .with(tracing_wasm::WASMLayer::new(builder.build()))
            .try_init();
    }
}
