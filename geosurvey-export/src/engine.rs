//! Format dispatch and attachment naming.

use chrono::{NaiveDate, Utc};
use geosurvey_core::{Form, Response};

use crate::{
    ExportError, ExportFormat, GeoRow, geo_rows, geopackage, shapefile::ShapefileBundle, text,
};

/// Located rows for a spatial export, failing when there are none.
fn located<'a>(
    form: &Form,
    responses: &'a [Response],
    format: ExportFormat,
) -> Result<Vec<GeoRow<'a>>, ExportError> {
    let rows = geo_rows(responses);
    if rows.is_empty() {
        return Err(ExportError::NoGeoValidRows { format });
    }
    if rows.len() < responses.len() {
        log::debug!(
            "{format} export of {} skips {} responses without a valid location",
            form.public_code,
            responses.len() - rows.len()
        );
    }
    Ok(rows)
}

/// A finished export ready to be served as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    /// Attachment file name, `{public_code}_{YYYY-MM-DD}.{ext}`.
    pub file_name: String,
    /// MIME type for the `Content-Type` header.
    pub content_type: &'static str,
    /// File body.
    pub bytes: Vec<u8>,
}

/// Renders response sets into export artifacts.
///
/// The engine is stateless apart from the date stamped into file names, so
/// one instance can serve any number of requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportEngine {
    generated_on: NaiveDate,
}

impl Default for ExportEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportEngine {
    /// Engine stamping today's UTC date.
    #[must_use]
    pub fn new() -> Self {
        Self::for_date(Utc::now().date_naive())
    }

    /// Engine stamping a fixed date.
    #[must_use]
    pub const fn for_date(generated_on: NaiveDate) -> Self {
        Self { generated_on }
    }

    /// Date stamped into file names and DBF headers.
    #[must_use]
    pub const fn generated_on(&self) -> NaiveDate {
        self.generated_on
    }

    /// File stem `{public_code}_{YYYY-MM-DD}` with unsafe characters
    /// replaced by `_`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use geosurvey_core::{FieldConfig, FieldType, Form, StorageType};
    /// use geosurvey_export::ExportEngine;
    ///
    /// let fields = vec![FieldConfig::new("note", "Note", FieldType::Text)];
    /// let form = Form::new(1, 1, "AB/12", StorageType::Admin, "t", fields).expect("valid form");
    /// let engine = ExportEngine::for_date(NaiveDate::from_ymd_opt(2024, 3, 9).expect("date"));
    /// assert_eq!(engine.file_stem(&form), "AB_12_2024-03-09");
    /// ```
    #[must_use]
    pub fn file_stem(&self, form: &Form) -> String {
        let code: String = form
            .public_code
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let code = if code.is_empty() { "export" } else { code.as_str() };
        format!("{code}_{}", self.generated_on.format("%Y-%m-%d"))
    }

    /// Render `responses` of `form` in `format`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::NoResponses`] for an empty set,
    /// [`ExportError::NoGeoValidRows`] when a spatial format has no located
    /// rows, or the encoder's error otherwise.
    pub fn render(
        &self,
        form: &Form,
        responses: &[Response],
        format: ExportFormat,
    ) -> Result<ExportArtifact, ExportError> {
        if responses.is_empty() {
            return Err(ExportError::NoResponses);
        }
        let stem = self.file_stem(form);
        let bytes = match format {
            ExportFormat::Csv => text::delimited::encode(form, responses)?,
            ExportFormat::Json => text::json::encode(form, responses)?,
            ExportFormat::GeoJson => text::geojson::encode(form, &located(form, responses, format)?)?,
            ExportFormat::Kml => text::kml::encode(form, &located(form, responses, format)?),
            ExportFormat::GeoPackage => geopackage::encode(form, &located(form, responses, format)?)?,
            ExportFormat::Shapefile => {
                let rows = located(form, responses, format)?;
                ShapefileBundle::encode(form, &rows, self.generated_on)?.into_zip(&stem)?
            }
        };
        log::info!(
            "rendered {format} export for form {} ({} bytes)",
            form.public_code,
            bytes.len()
        );
        Ok(ExportArtifact {
            file_name: format!("{stem}.{}", format.extension()),
            content_type: format.content_type(),
            bytes,
        })
    }
}
