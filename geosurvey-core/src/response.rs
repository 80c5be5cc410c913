//! Normalised survey responses.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field values keyed by sanitised field identifier.
pub type FieldMap = BTreeMap<String, Value>;

/// A response in the common shape every backend is normalised into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Per-form display identifier; increases with every saved response.
    pub unique_display_id: i64,
    /// Submitted values keyed by field identifier.
    pub data: FieldMap,
    /// WGS84 latitude in degrees.
    pub latitude: Option<f64>,
    /// WGS84 longitude in degrees.
    pub longitude: Option<f64>,
    /// Reported horizontal accuracy in metres.
    pub accuracy: Option<f64>,
    /// Time the response was persisted.
    pub created_at: DateTime<Utc>,
}

impl Response {
    /// Location as a point (`x = longitude`, `y = latitude`) when both
    /// coordinates are present, finite, and inside WGS84 bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use geosurvey_core::{FieldMap, Response};
    ///
    /// let response = Response {
    ///     unique_display_id: 1,
    ///     data: FieldMap::new(),
    ///     latitude: Some(40.0),
    ///     longitude: Some(-3.0),
    ///     accuracy: None,
    ///     created_at: Utc::now(),
    /// };
    /// let point = response.geo_point().expect("valid location");
    /// assert_eq!((point.x(), point.y()), (-3.0, 40.0));
    /// ```
    #[must_use]
    pub fn geo_point(&self) -> Option<Point<f64>> {
        let lat = self.latitude.filter(|v| v.is_finite() && (-90.0..=90.0).contains(v))?;
        let lon = self
            .longitude
            .filter(|v| v.is_finite() && (-180.0..=180.0).contains(v))?;
        Some(Point::new(lon, lat))
    }

    /// Text rendering of a field value, empty when absent.
    #[must_use]
    pub fn text(&self, field: &str) -> String {
        self.data.get(field).map(value_to_text).unwrap_or_default()
    }
}

/// Flatten a JSON field value into display text.
///
/// Strings are returned verbatim, arrays (checkbox selections) are joined
/// with `", "`, `null` becomes the empty string, and objects fall back to
/// their JSON encoding.
#[must_use]
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}
