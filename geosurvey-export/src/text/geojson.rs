//! GeoJSON `FeatureCollection` export.

use chrono::SecondsFormat;
use geosurvey_core::Form;
use serde_json::{Map, Value, json};

use super::{ACCURACY, CREATED_AT, ID, coordinate};
use crate::{ExportError, GeoRow};

fn properties(form: &Form, row: &GeoRow<'_>) -> Map<String, Value> {
    let response = row.response;
    let mut props = Map::new();
    props.insert(ID.into(), Value::from(response.unique_display_id));
    for field in &form.fields {
        let value = response.data.get(&field.name).cloned().unwrap_or(Value::Null);
        props.insert(field.name.clone(), value);
    }
    props.insert(ACCURACY.into(), coordinate(response.accuracy));
    props.insert(
        CREATED_AT.into(),
        Value::String(response.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    props
}

/// Encode located rows as a `FeatureCollection` of `Point` features.
///
/// Coordinates are written in `[longitude, latitude]` order.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialisation fails.
pub fn encode(form: &Form, rows: &[GeoRow<'_>]) -> Result<Vec<u8>, ExportError> {
    let features: Vec<Value> = rows
        .iter()
        .map(|row| {
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [row.point.x(), row.point.y()],
                },
                "properties": properties(form, row),
            })
        })
        .collect();
    let collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    Ok(serde_json::to_vec_pretty(&collection)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_rows;
    use chrono::Utc;
    use geosurvey_core::{FieldConfig, FieldMap, FieldType, Response, StorageType};
    use rstest::rstest;

    #[rstest]
    fn writes_lon_lat_points() {
        let form = Form::new(
            1,
            1,
            "TREES",
            StorageType::Admin,
            "trees",
            vec![FieldConfig::new("species", "Species", FieldType::Text)],
        )
        .expect("valid form");
        let mut data = FieldMap::new();
        data.insert("species".into(), json!("oak"));
        let responses = [
            Response {
                unique_display_id: 1,
                data,
                latitude: Some(40.0),
                longitude: Some(-3.0),
                accuracy: None,
                created_at: Utc::now(),
            },
            Response {
                unique_display_id: 2,
                data: FieldMap::new(),
                latitude: None,
                longitude: None,
                accuracy: None,
                created_at: Utc::now(),
            },
        ];

        let bytes = encode(&form, &geo_rows(&responses)).expect("geojson");
        let parsed: Value = serde_json::from_slice(&bytes).expect("valid json");
        let features = parsed["features"].as_array().expect("features");
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["geometry"]["coordinates"], json!([-3.0, 40.0]));
        assert_eq!(features[0]["properties"]["species"], json!("oak"));
        assert_eq!(features[0]["properties"]["id"], json!(1));
    }
}
