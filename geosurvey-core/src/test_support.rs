//! Test-only, in-memory `ResponseBackend` implementation used by unit and
//! behaviour tests.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::{BackendError, FieldMap, Form, Response, ResponseBackend, StorageType, Submission};

/// In-memory backend keeping responses in insertion order.
///
/// Each persisted response is stamped one second after the previous one so
/// ordering by creation time is deterministic.
#[derive(Debug)]
pub struct MemoryBackend {
    kind: StorageType,
    rows: Mutex<Vec<(i64, Response)>>,
    failure: Option<BackendError>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(StorageType::Supabase)
    }
}

impl MemoryBackend {
    /// Create an empty backend reporting the given storage type.
    #[must_use]
    pub const fn new(kind: StorageType) -> Self {
        Self {
            kind,
            rows: Mutex::new(Vec::new()),
            failure: None,
        }
    }

    /// Create a backend whose every call fails with `error`.
    #[must_use]
    pub const fn failing(kind: StorageType, error: BackendError) -> Self {
        Self {
            kind,
            rows: Mutex::new(Vec::new()),
            failure: Some(error),
        }
    }

    /// Responses persisted for `form_id`, oldest first.
    pub fn persisted(&self, form_id: i64) -> Vec<Response> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, _)| *id == form_id)
            .map(|(_, response)| response.clone())
            .collect()
    }
}

impl ResponseBackend for MemoryBackend {
    fn kind(&self) -> StorageType {
        self.kind
    }

    fn persist(&self, form: &Form, submission: &Submission) -> Result<(), BackendError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let next_id = rows.iter().filter(|(id, _)| *id == form.id).count() as i64 + 1;
        let offset = Duration::seconds(rows.len() as i64);
        let data: FieldMap = form
            .fields
            .iter()
            .filter_map(|field| {
                submission
                    .data
                    .get(&field.name)
                    .map(|value| (field.name.clone(), value.clone()))
            })
            .collect();
        rows.push((
            form.id,
            Response {
                unique_display_id: next_id,
                data,
                latitude: submission.latitude,
                longitude: submission.longitude,
                accuracy: submission.accuracy,
                created_at: DateTime::<Utc>::UNIX_EPOCH + offset,
            },
        ));
        Ok(())
    }

    fn fetch(&self, form: &Form, limit: u32, offset: u32) -> Result<Vec<Response>, BackendError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let mut rows = self.persisted(form.id);
        rows.reverse();
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}
