use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct OverpassResponse {
    pub elements: Vec<OverpassElement>,
}

/// One feature as Overpass returns it. Which optional fields are set depends
/// on the element type: nodes carry lat/lon, ways carry nodes/geometry/bounds.
#[derive(Serialize, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub element_type: String,
    pub id: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    pub nodes: Option<Vec<i64>>,
    pub geometry: Option<Vec<OverpassCoord>>,
    pub bounds: Option<OverpassBounds>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OverpassCoord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OverpassBounds {
    pub maxlat: f64,
    pub minlat: f64,
    pub maxlon: f64,
    pub minlon: f64,
}
