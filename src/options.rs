use serde::Deserialize;

/// Options for GPSU to GeoJSON export.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    /// Include IDs, comments, symbols and track statistics in properties (default: true)
    #[serde(default = "default_true")]
    pub include_metadata: bool,

    /// Include trackpoint timestamps in coordinateProperties.times (default: true)
    #[serde(default = "default_true")]
    pub include_time: bool,

    /// Which GPSU element types to export (default: all)
    #[serde(default)]
    pub types: Option<Vec<GpsuElementType>>,

    /// Join all tracks into a single MultiLineString (default: false)
    #[serde(default)]
    pub join_tracks: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_metadata: true,
            include_time: true,
            types: None,
            join_tracks: false,
        }
    }
}

impl ExportOptions {
    pub fn should_include(&self, element_type: GpsuElementType) -> bool {
        match &self.types {
            None => true,
            Some(types) => types.contains(&element_type),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpsuElementType {
    Waypoint,
    Route,
    Track,
}

fn default_true() -> bool {
    true
}
