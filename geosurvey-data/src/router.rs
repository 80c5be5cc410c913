//! Routing of submissions and fetches to each form's backend.
//!
//! The router is the only place that decides where a response lives. It
//! owns the capacity check and the response counter for external
//! backends, and it turns backend failures into a boolean or an empty
//! list after logging them. Validation and unknown forms are the only
//! errors callers see.

use geosurvey_core::{Form, Response, Submission, ValidationError};
use thiserror::Error;

use crate::{AdminStore, BackendResolver, CounterKey};

/// Reasons a submission is refused before any backend is contacted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmissionError {
    /// No form with this id exists.
    #[error("form {form_id} does not exist")]
    UnknownForm {
        /// Requested form.
        form_id: i64,
    },
    /// The form has reached its response limit.
    #[error("form {form_id} has reached its limit of {max_responses} responses")]
    FormFull {
        /// Requested form.
        form_id: i64,
        /// Configured limit.
        max_responses: u32,
    },
    /// The submission does not satisfy the form's fields.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Routes persist and fetch calls for catalogued forms.
#[derive(Debug)]
pub struct StorageRouter<'s, R> {
    admin: &'s AdminStore,
    resolver: R,
    counter_key: CounterKey,
}

impl<'s, R: BackendResolver> StorageRouter<'s, R> {
    /// Router reading forms from `admin` and backends from `resolver`.
    pub const fn new(admin: &'s AdminStore, resolver: R) -> Self {
        Self {
            admin,
            resolver,
            counter_key: CounterKey::FormId,
        }
    }

    /// Choose how external inserts are counted.
    #[must_use]
    pub const fn with_counter_key(mut self, counter_key: CounterKey) -> Self {
        self.counter_key = counter_key;
        self
    }

    /// Catalogue entry for `form_id`. Lookup failures are logged and read
    /// as absent.
    #[must_use]
    pub fn form(&self, form_id: i64) -> Option<Form> {
        match self.admin.load_form(form_id) {
            Ok(form) => form,
            Err(err) => {
                log::warn!("could not load form {form_id}: {err}");
                None
            }
        }
    }

    /// Validate and store `submission` for `form_id`.
    ///
    /// Returns `Ok(true)` once the backend accepted the row and `Ok(false)`
    /// when the backend was unreachable or refused it. A counter that could
    /// not be updated after an external insert is logged, not reported.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError`] for unknown or full forms and invalid
    /// submissions.
    pub fn save(&self, form_id: i64, submission: &Submission) -> Result<bool, SubmissionError> {
        let form = match self.admin.load_form(form_id) {
            Ok(Some(form)) => form,
            Ok(None) => return Err(SubmissionError::UnknownForm { form_id }),
            Err(err) => {
                log::warn!("could not load form {form_id} for submission: {err}");
                return Ok(false);
            }
        };
        if form.is_full() {
            return Err(SubmissionError::FormFull {
                form_id,
                max_responses: form.max_responses,
            });
        }
        submission.validate(&form)?;

        let backend = match self.resolver.resolve(&form) {
            Ok(backend) => backend,
            Err(err) => {
                log::warn!("no {} backend for form {form_id}: {err}", form.storage_type);
                return Ok(false);
            }
        };
        if let Err(err) = backend.persist(&form, submission) {
            log::warn!(
                "{} backend rejected a response for form {form_id}: {err}",
                backend.kind()
            );
            return Ok(false);
        }
        if !backend.counts_in_transaction() {
            self.count_external_insert(&form);
        }
        log::info!("stored response for form {form_id} in {}", backend.kind());
        Ok(true)
    }

    fn count_external_insert(&self, form: &Form) {
        match self.admin.increment_response_count(form, self.counter_key) {
            Ok(1) => {}
            Ok(0) => log::error!(
                "response for form {} stored but no counter row matched",
                form.id
            ),
            Ok(updated) => log::warn!(
                "response for form {} incremented {updated} counters sharing table {}",
                form.id,
                form.table_name
            ),
            Err(err) => log::error!(
                "response for form {} stored but its counter was not updated: {err}",
                form.id
            ),
        }
    }

    /// Newest-first responses for `form_id`; empty when the form is
    /// unknown or its backend fails.
    #[must_use]
    pub fn fetch(&self, form_id: i64, limit: u32, offset: u32) -> Vec<Response> {
        self.form(form_id)
            .map(|form| self.fetch_form(&form, limit, offset))
            .unwrap_or_default()
    }

    /// Newest-first responses for an already loaded form.
    #[must_use]
    pub fn fetch_form(&self, form: &Form, limit: u32, offset: u32) -> Vec<Response> {
        let fetched = self
            .resolver
            .resolve(form)
            .and_then(|backend| backend.fetch(form, limit, offset));
        match fetched {
            Ok(responses) => responses,
            Err(err) => {
                log::warn!("could not fetch responses for form {}: {err}", form.id);
                Vec::new()
            }
        }
    }
}
