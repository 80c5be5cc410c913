//! CSV encoding.

use chrono::SecondsFormat;
use geosurvey_core::{Form, Response};

use super::{ACCURACY, CREATED_AT, ID, LATITUDE, LONGITUDE, coordinate_text};
use crate::ExportError;

/// Encode every response as one CSV row.
///
/// Columns are `id`, the form fields in declaration order, then
/// `latitude`, `longitude`, `accuracy`, and `created_at`. Checkbox
/// selections are joined with `", "`.
///
/// # Errors
///
/// Returns [`ExportError::Csv`] if the writer fails.
pub fn encode(form: &Form, responses: &[Response]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let header = std::iter::once(ID)
        .chain(form.fields.iter().map(|field| field.name.as_str()))
        .chain([LATITUDE, LONGITUDE, ACCURACY, CREATED_AT]);
    writer.write_record(header)?;

    for response in responses {
        let mut record = Vec::with_capacity(form.fields.len() + 5);
        record.push(response.unique_display_id.to_string());
        record.extend(form.fields.iter().map(|field| response.text(&field.name)));
        record.push(coordinate_text(response.latitude));
        record.push(coordinate_text(response.longitude));
        record.push(coordinate_text(response.accuracy));
        record.push(response.created_at.to_rfc3339_opts(SecondsFormat::Secs, true));
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|err| ExportError::io("flushing CSV output")(err.into_error()))
}
