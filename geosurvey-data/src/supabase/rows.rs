//! Mapping between PostgREST JSON rows and domain responses.

use chrono::{DateTime, Utc};
use geosurvey_core::{BackendError, FieldMap, Form, Response, Submission, value_to_text};
use serde_json::{Map, Value};

/// JSON body inserting `submission` into the form's table.
///
/// Field values are sent as text to match the provisioned `TEXT` columns;
/// blank values become `null`.
pub(super) fn insert_body(form: &Form, submission: &Submission) -> Value {
    let mut row = Map::new();
    for field in &form.fields {
        let text = submission
            .data
            .get(&field.name)
            .map(value_to_text)
            .unwrap_or_default();
        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            Value::String(text)
        };
        row.insert(field.name.clone(), value);
    }
    row.insert("latitude".into(), number(submission.latitude));
    row.insert("longitude".into(), number(submission.longitude));
    row.insert("accuracy".into(), number(submission.accuracy));
    row.insert(
        "ip_address".into(),
        submission.client_ip.clone().map_or(Value::Null, Value::String),
    );
    Value::Object(row)
}

fn number(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

/// Normalise one selected row.
///
/// The table's serial `id` becomes the display id. Only declared form
/// fields are kept; unknown columns are ignored.
pub(super) fn normalise(form: &Form, row: &Map<String, Value>) -> Result<Response, BackendError> {
    let uid = row
        .get("id")
        .and_then(integer)
        .ok_or_else(|| decode_error("row is missing a numeric id"))?;
    let created_at = row
        .get("created_at")
        .and_then(Value::as_str)
        .ok_or_else(|| decode_error(format!("row {uid} is missing created_at")))?;
    let created_at = DateTime::parse_from_rfc3339(created_at)
        .map_err(|err| decode_error(format!("row {uid} has created_at {created_at:?}: {err}")))?
        .with_timezone(&Utc);

    let data: FieldMap = form
        .fields
        .iter()
        .filter_map(|field| {
            row.get(&field.name)
                .filter(|value| !value.is_null())
                .map(|value| (field.name.clone(), value.clone()))
        })
        .collect();

    Ok(Response {
        unique_display_id: uid,
        data,
        latitude: row.get("latitude").and_then(float),
        longitude: row.get("longitude").and_then(float),
        accuracy: row.get("accuracy").and_then(float),
        created_at,
    })
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn decode_error(message: impl Into<String>) -> BackendError {
    BackendError::Decode {
        message: message.into(),
    }
}
