//! Text encoders: CSV, JSON, GeoJSON, and KML.

pub mod delimited;
pub mod geojson;
pub mod json;
pub mod kml;

use serde_json::{Number, Value};

/// Column names for the system values written after the form fields.
pub(crate) const LATITUDE: &str = "latitude";
pub(crate) const LONGITUDE: &str = "longitude";
pub(crate) const ACCURACY: &str = "accuracy";
pub(crate) const CREATED_AT: &str = "created_at";
pub(crate) const ID: &str = "id";

/// JSON number for an optional coordinate, `null` when absent or non-finite.
pub(crate) fn coordinate(value: Option<f64>) -> Value {
    value
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

/// Plain text for an optional coordinate, empty when absent.
pub(crate) fn coordinate_text(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
