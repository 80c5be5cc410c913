//! JSON array export.

use chrono::SecondsFormat;
use geosurvey_core::{Form, Response};
use serde_json::{Map, Value};

use super::{ACCURACY, CREATED_AT, ID, LATITUDE, LONGITUDE, coordinate};
use crate::ExportError;

/// Build the JSON object for one response.
///
/// Form fields keep their stored JSON values; missing fields are `null`.
#[must_use]
pub fn row_object(form: &Form, response: &Response) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert(ID.into(), Value::from(response.unique_display_id));
    for field in &form.fields {
        let value = response.data.get(&field.name).cloned().unwrap_or(Value::Null);
        row.insert(field.name.clone(), value);
    }
    row.insert(LATITUDE.into(), coordinate(response.latitude));
    row.insert(LONGITUDE.into(), coordinate(response.longitude));
    row.insert(ACCURACY.into(), coordinate(response.accuracy));
    row.insert(
        CREATED_AT.into(),
        Value::String(response.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    row
}

/// Encode the responses as a pretty-printed JSON array of row objects.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialisation fails.
pub fn encode(form: &Form, responses: &[Response]) -> Result<Vec<u8>, ExportError> {
    let rows: Vec<Value> = responses
        .iter()
        .map(|response| Value::Object(row_object(form, response)))
        .collect();
    Ok(serde_json::to_vec_pretty(&rows)?)
}
