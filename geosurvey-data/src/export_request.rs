//! Export request lifecycle: fetch, encode, then stream or redirect.
//!
//! A request moves `Idle → FetchingResponses → Encoding → Streaming →
//! Done`. An unknown format or an empty response set sends it back to
//! `Idle` with a redirect; an encoding or write failure ends in `Failed`.
//! The artifact is fully built in memory before `Streaming`, so a failed
//! request never emits a partial file.

use std::io::Write;

use geosurvey_export::{ExportArtifact, ExportEngine, ExportError, ExportFormat};

use crate::{BackendResolver, StorageRouter};

/// Most responses fetched for a single export.
pub const EXPORT_FETCH_CAP: u32 = 10_000;

/// Position of an [`ExportRequest`] in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    /// Not started, or bounced back with a redirect.
    Idle,
    /// Loading responses from the form's backend.
    FetchingResponses,
    /// Rendering the artifact.
    Encoding,
    /// Artifact ready; bytes may be written.
    Streaming,
    /// All bytes written.
    Done,
    /// Aborted after encoding began.
    Failed,
}

impl ExportStage {
    /// Whether the lifecycle permits moving from `self` to `next`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::FetchingResponses)
                | (Self::FetchingResponses, Self::Idle | Self::Encoding)
                | (Self::Encoding, Self::Streaming | Self::Failed | Self::Idle)
                | (Self::Streaming, Self::Done | Self::Failed)
        )
    }
}

/// Why an export produced a redirect instead of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFailure {
    /// The format token is not recognised.
    UnsupportedFormat,
    /// No form with the requested id exists.
    UnknownForm,
    /// The form has no responses to export.
    NoResponses,
    /// A spatial format was requested but no response has a valid location.
    NoLocatedResponses,
    /// The encoder failed.
    EncodingFailed,
}

impl ExportFailure {
    /// Query-string code carried by the redirect.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "unsupported_format",
            Self::UnknownForm => "unknown_form",
            Self::NoResponses => "no_responses",
            Self::NoLocatedResponses => "no_located_responses",
            Self::EncodingFailed => "encoding_failed",
        }
    }
}

/// Result of running an export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Serve this file as an attachment.
    File(ExportArtifact),
    /// Redirect the caller back with an error flag.
    Redirect {
        /// Target of the redirect, including the `export_error` parameter.
        location: String,
        /// Reason for the redirect.
        error: ExportFailure,
    },
}

/// One export of one form in one format.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    form_id: i64,
    format_token: String,
    return_path: String,
    stage: ExportStage,
}

impl ExportRequest {
    /// Request exporting `form_id` as `format_token`. Redirects point at
    /// `/forms/{form_id}/responses` unless overridden.
    #[must_use]
    pub fn new(form_id: i64, format_token: impl Into<String>) -> Self {
        Self {
            form_id,
            format_token: format_token.into(),
            return_path: format!("/forms/{form_id}/responses"),
            stage: ExportStage::Idle,
        }
    }

    /// Redirect to `path` on failure.
    #[must_use]
    pub fn with_return_path(mut self, path: impl Into<String>) -> Self {
        self.return_path = path.into();
        self
    }

    /// Current lifecycle stage.
    #[must_use]
    pub const fn stage(&self) -> ExportStage {
        self.stage
    }

    /// Fetch and encode. A returned file leaves the request in
    /// [`ExportStage::Streaming`], ready for [`ExportRequest::stream_to`].
    ///
    /// The format token is checked before any backend is contacted.
    pub fn run<R: BackendResolver>(
        &mut self,
        router: &StorageRouter<'_, R>,
        engine: &ExportEngine,
    ) -> ExportOutcome {
        let format: ExportFormat = match self.format_token.parse() {
            Ok(format) => format,
            Err(err) => {
                log::info!("export of form {} refused: {err}", self.form_id);
                return self.redirect(ExportFailure::UnsupportedFormat);
            }
        };

        self.advance(ExportStage::FetchingResponses);
        let Some(form) = router.form(self.form_id) else {
            self.advance(ExportStage::Idle);
            return self.redirect(ExportFailure::UnknownForm);
        };
        let responses = router.fetch_form(&form, EXPORT_FETCH_CAP, 0);
        if responses.is_empty() {
            self.advance(ExportStage::Idle);
            return self.redirect(ExportFailure::NoResponses);
        }

        self.advance(ExportStage::Encoding);
        match engine.render(&form, &responses, format) {
            Ok(artifact) => {
                self.advance(ExportStage::Streaming);
                ExportOutcome::File(artifact)
            }
            Err(ExportError::NoGeoValidRows { .. }) => {
                self.advance(ExportStage::Idle);
                self.redirect(ExportFailure::NoLocatedResponses)
            }
            Err(err) => {
                log::error!("{format} export of form {} failed: {err}", self.form_id);
                self.advance(ExportStage::Failed);
                self.redirect(ExportFailure::EncodingFailed)
            }
        }
    }

    /// Write `artifact` to `writer` and finish the request.
    ///
    /// # Errors
    ///
    /// Returns the writer's error after moving to [`ExportStage::Failed`].
    pub fn stream_to<W: Write + ?Sized>(
        &mut self,
        artifact: &ExportArtifact,
        writer: &mut W,
    ) -> std::io::Result<()> {
        let written = writer
            .write_all(&artifact.bytes)
            .and_then(|()| writer.flush());
        match written {
            Ok(()) => {
                self.advance(ExportStage::Done);
                Ok(())
            }
            Err(err) => {
                log::error!("streaming {} failed: {err}", artifact.file_name);
                self.advance(ExportStage::Failed);
                Err(err)
            }
        }
    }

    fn advance(&mut self, next: ExportStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal export transition {:?} -> {next:?}",
            self.stage
        );
        log::debug!(
            "export of form {}: {:?} -> {next:?}",
            self.form_id,
            self.stage
        );
        self.stage = next;
    }

    fn redirect(&self, error: ExportFailure) -> ExportOutcome {
        ExportOutcome::Redirect {
            location: format!("{}?export_error={}", self.return_path, error.code()),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AdminStore, test_support::StubResolver};
    use chrono::NaiveDate;
    use geosurvey_core::{
        FieldConfig, FieldMap, FieldType, Form, ResponseBackend, StorageType, Submission,
        test_support::MemoryBackend,
    };
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn admin() -> AdminStore {
        let admin = AdminStore::open_in_memory().expect("admin store");
        let form = Form::new(
            4,
            1,
            "OWLS",
            StorageType::Supabase,
            "owls",
            vec![FieldConfig::new("species", "Species", FieldType::Text)],
        )
        .expect("valid form");
        admin.save_form(&form).expect("save form");
        admin
    }

    fn engine() -> ExportEngine {
        ExportEngine::for_date(NaiveDate::from_ymd_opt(2024, 3, 9).expect("date"))
    }

    fn seeded(located: bool) -> StubResolver<'static> {
        let resolver = StubResolver::with_backend(MemoryBackend::new(StorageType::Supabase));
        let mut data = FieldMap::new();
        data.insert("species".into(), json!("barn owl"));
        let mut submission = Submission::new(data);
        if located {
            submission = submission.with_location(52.0, 0.5, None);
        }
        let form = Form::new(
            4,
            1,
            "OWLS",
            StorageType::Supabase,
            "owls",
            vec![FieldConfig::new("species", "Species", FieldType::Text)],
        )
        .expect("valid form");
        resolver
            .backend()
            .expect("memory backend")
            .persist(&form, &submission)
            .expect("seed response");
        resolver
    }

    #[rstest]
    fn file_export_streams_and_finishes(admin: AdminStore) {
        let router = StorageRouter::new(&admin, seeded(true));
        let mut request = ExportRequest::new(4, "geojson");

        let ExportOutcome::File(artifact) = request.run(&router, &engine()) else {
            panic!("expected a file");
        };
        assert_eq!(artifact.file_name, "OWLS_2024-03-09.geojson");
        assert_eq!(request.stage(), ExportStage::Streaming);

        let mut sink = Vec::new();
        request.stream_to(&artifact, &mut sink).expect("stream");
        assert_eq!(sink, artifact.bytes);
        assert_eq!(request.stage(), ExportStage::Done);
    }

    #[rstest]
    fn unsupported_format_redirects_before_fetching(admin: AdminStore) {
        let router = StorageRouter::new(&admin, StubResolver::default());
        let mut request = ExportRequest::new(4, "xlsx");
        assert_eq!(
            request.run(&router, &engine()),
            ExportOutcome::Redirect {
                location: "/forms/4/responses?export_error=unsupported_format".into(),
                error: ExportFailure::UnsupportedFormat,
            }
        );
        assert_eq!(request.stage(), ExportStage::Idle);
    }

    #[rstest]
    #[case("csv")]
    #[case("shp")]
    fn empty_form_never_yields_a_file(admin: AdminStore, #[case] token: &str) {
        let router = StorageRouter::new(&admin, StubResolver::default());
        let mut request = ExportRequest::new(4, token).with_return_path("/dashboard");
        assert_eq!(
            request.run(&router, &engine()),
            ExportOutcome::Redirect {
                location: "/dashboard?export_error=no_responses".into(),
                error: ExportFailure::NoResponses,
            }
        );
        assert_eq!(request.stage(), ExportStage::Idle);
    }

    #[rstest]
    fn spatial_export_without_locations_redirects(admin: AdminStore) {
        let router = StorageRouter::new(&admin, seeded(false));
        let mut request = ExportRequest::new(4, "kml");
        let outcome = request.run(&router, &engine());
        assert!(matches!(
            outcome,
            ExportOutcome::Redirect {
                error: ExportFailure::NoLocatedResponses,
                ..
            }
        ));
    }

    #[rstest]
    fn unknown_form_redirects(admin: AdminStore) {
        let router = StorageRouter::new(&admin, StubResolver::default());
        let mut request = ExportRequest::new(99, "csv");
        assert!(matches!(
            request.run(&router, &engine()),
            ExportOutcome::Redirect {
                error: ExportFailure::UnknownForm,
                ..
            }
        ));
    }

    #[rstest]
    #[case(ExportStage::Idle, ExportStage::FetchingResponses, true)]
    #[case(ExportStage::FetchingResponses, ExportStage::Idle, true)]
    #[case(ExportStage::Encoding, ExportStage::Failed, true)]
    #[case(ExportStage::Streaming, ExportStage::Done, true)]
    #[case(ExportStage::Idle, ExportStage::Streaming, false)]
    #[case(ExportStage::FetchingResponses, ExportStage::Streaming, false)]
    #[case(ExportStage::Done, ExportStage::Idle, false)]
    fn transitions(#[case] from: ExportStage, #[case] to: ExportStage, #[case] allowed: bool) {
        assert_eq!(from.can_advance_to(to), allowed);
    }
}
