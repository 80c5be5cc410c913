//! Response rows held in the admin store.

use chrono::{DateTime, SecondsFormat, Utc};
use geosurvey_core::{FieldMap, Form, Response, Submission};
use rusqlite::{Transaction, TransactionBehavior, params};

use super::{AdminError, AdminStore};

impl AdminStore {
    /// Store `submission` for `form` and return its display id.
    ///
    /// The display id is one greater than the form's current maximum and
    /// is allocated in the same transaction that increments the catalogue
    /// counter, so the two never disagree.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError`] if any statement fails; nothing is written.
    pub fn insert_response(&self, form: &Form, submission: &Submission) -> Result<i64, AdminError> {
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
        let data = serde_json::to_string(&data).map_err(AdminError::json("encode response data"))?;
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        // Take the write lock before reading the maximum so concurrent
        // writers allocate display ids one at a time.
        let transaction =
            Transaction::new_unchecked(&self.connection, TransactionBehavior::Immediate)
                .map_err(AdminError::sqlite("begin response transaction"))?;
        let uid: i64 = transaction
            .query_row(
                "SELECT COALESCE(MAX(unique_display_id), 0) + 1 FROM responses WHERE form_id = ?1",
                [form.id],
                |row| row.get(0),
            )
            .map_err(AdminError::sqlite("allocate display id"))?;
        transaction
            .execute(
                "INSERT INTO responses (
                    form_id, unique_display_id, data, latitude, longitude,
                    accuracy, ip_address, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    form.id,
                    uid,
                    data,
                    submission.latitude,
                    submission.longitude,
                    submission.accuracy,
                    submission.client_ip,
                    created_at,
                ],
            )
            .map_err(AdminError::sqlite("insert response"))?;
        transaction
            .execute(
                "UPDATE forms SET response_count = response_count + 1 WHERE id = ?1",
                [form.id],
            )
            .map_err(AdminError::sqlite("increment response count"))?;
        transaction
            .commit()
            .map_err(AdminError::sqlite("commit response transaction"))?;
        Ok(uid)
    }

    /// Responses for `form`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError`] on query failure or an undecodable row.
    pub fn list_responses(
        &self,
        form: &Form,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Response>, AdminError> {
        let mut statement = self
            .connection
            .prepare_cached(
                "SELECT unique_display_id, data, latitude, longitude, accuracy, created_at
                 FROM responses
                 WHERE form_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2 OFFSET ?3",
            )
            .map_err(AdminError::sqlite("prepare response listing"))?;
        let rows = statement
            .query_map(params![form.id, limit, offset], |row| {
                Ok(StoredResponse {
                    uid: row.get(0)?,
                    data: row.get(1)?,
                    latitude: row.get(2)?,
                    longitude: row.get(3)?,
                    accuracy: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .map_err(AdminError::sqlite("list responses"))?;

        rows.map(|row| {
            row.map_err(AdminError::sqlite("read response row"))
                .and_then(StoredResponse::into_response)
        })
        .collect()
    }
}

struct StoredResponse {
    uid: i64,
    data: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    accuracy: Option<f64>,
    created_at: String,
}

impl StoredResponse {
    fn into_response(self) -> Result<Response, AdminError> {
        let data: FieldMap =
            serde_json::from_str(&self.data).map_err(AdminError::json("decode response data"))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|err| AdminError::Corrupt {
                what: "response",
                message: format!("created_at {:?}: {err}", self.created_at),
            })?
            .with_timezone(&Utc);
        Ok(Response {
            unique_display_id: self.uid,
            data,
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy: self.accuracy,
            created_at,
        })
    }
}
