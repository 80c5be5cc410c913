//! SQLite-backed form catalogue and admin response store.
//!
//! The admin store holds every form definition, the encrypted credentials
//! for user-owned backends, and the responses of forms whose storage type
//! is [`StorageType::Admin`]. Admin inserts allocate the next display id
//! and bump the form counter inside one transaction.

mod credentials;
mod responses;
mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use geosurvey_core::{
    BackendError, FieldConfig, Form, Response, ResponseBackend, StorageType, Submission,
};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

/// How long a writer waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Which catalogue rows a successful external insert increments.
///
/// [`CounterKey::TableName`] reproduces the legacy behaviour of matching on
/// the physical table name, which over-counts when several forms share one
/// table. New deployments keep the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CounterKey {
    /// Increment the submitting form only.
    #[default]
    FormId,
    /// Increment every form writing to the same table.
    TableName,
}

/// Errors raised by the admin store.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The database file could not be opened.
    #[error("failed to open admin store at {path:?}: {source}")]
    Open {
        /// Requested location.
        path: PathBuf,
        /// Driver error.
        #[source]
        source: rusqlite::Error,
    },
    /// A statement failed.
    #[error("admin store failed to {operation}: {source}")]
    Sqlite {
        /// What the store was doing.
        operation: &'static str,
        /// Driver error.
        #[source]
        source: rusqlite::Error,
    },
    /// A JSON column could not be encoded or decoded.
    #[error("admin store could not {operation}: {source}")]
    Json {
        /// What the store was doing.
        operation: &'static str,
        /// Serialiser error.
        #[source]
        source: serde_json::Error,
    },
    /// A stored row holds a value the domain types reject.
    #[error("stored {what} is corrupt: {message}")]
    Corrupt {
        /// Kind of row.
        what: &'static str,
        /// Description of the offending value.
        message: String,
    },
}

impl AdminError {
    pub(crate) fn sqlite(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::Sqlite { operation, source }
    }

    pub(crate) fn json(operation: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| Self::Json { operation, source }
    }
}

impl From<AdminError> for BackendError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::Corrupt { .. } | AdminError::Json { .. } => Self::Decode {
                message: err.to_string(),
            },
            AdminError::Open { .. } | AdminError::Sqlite { .. } => Self::Query {
                message: err.to_string(),
            },
        }
    }
}

/// Form catalogue, credential table, and admin response store.
#[derive(Debug)]
pub struct AdminStore {
    connection: Connection,
    location: Option<PathBuf>,
}

impl AdminStore {
    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::Open`] or a schema error.
    pub fn open(path: &Path) -> Result<Self, AdminError> {
        let connection = Connection::open(path).map_err(|source| AdminError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(AdminError::sqlite("set busy timeout"))?;
        schema::initialise(&connection)?;
        Ok(Self {
            connection,
            location: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError`] if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, AdminError> {
        let connection = Connection::open_in_memory().map_err(|source| AdminError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        schema::initialise(&connection)?;
        Ok(Self {
            connection,
            location: None,
        })
    }

    /// Location of the database file, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Insert or update a form definition. The stored response counter is
    /// left untouched on update.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError`] when the row cannot be written.
    pub fn save_form(&self, form: &Form) -> Result<(), AdminError> {
        let fields =
            serde_json::to_string(&form.fields).map_err(AdminError::json("encode fields"))?;
        self.connection
            .execute(
                "INSERT INTO forms (
                    id, owner_id, public_code, storage_type, table_name,
                    fields_config, max_responses, response_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT (id) DO UPDATE SET
                    owner_id = excluded.owner_id,
                    public_code = excluded.public_code,
                    storage_type = excluded.storage_type,
                    table_name = excluded.table_name,
                    fields_config = excluded.fields_config,
                    max_responses = excluded.max_responses",
                params![
                    form.id,
                    form.owner_id,
                    form.public_code,
                    form.storage_type.as_str(),
                    form.table_name,
                    fields,
                    form.max_responses,
                    form.response_count,
                ],
            )
            .map_err(AdminError::sqlite("save form"))?;
        Ok(())
    }

    /// Load the form with `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError`] on query failure or a corrupt row.
    pub fn load_form(&self, id: i64) -> Result<Option<Form>, AdminError> {
        let row = self
            .connection
            .query_row(
                "SELECT id, owner_id, public_code, storage_type, table_name,
                        fields_config, max_responses, response_count
                 FROM forms WHERE id = ?1",
                [id],
                |row| {
                    Ok(StoredForm {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        public_code: row.get(2)?,
                        storage_type: row.get(3)?,
                        table_name: row.get(4)?,
                        fields_config: row.get(5)?,
                        max_responses: row.get(6)?,
                        response_count: row.get(7)?,
                    })
                },
            )
            .optional()
            .map_err(AdminError::sqlite("load form"))?;
        row.map(StoredForm::into_form).transpose()
    }

    /// Bump the response counter after an external backend stored a row.
    ///
    /// Returns the number of catalogue rows updated; anything other than one
    /// signals drift the caller should report.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError`] on query failure.
    pub fn increment_response_count(
        &self,
        form: &Form,
        key: CounterKey,
    ) -> Result<usize, AdminError> {
        let updated = match key {
            CounterKey::FormId => self.connection.execute(
                "UPDATE forms SET response_count = response_count + 1 WHERE id = ?1",
                [form.id],
            ),
            CounterKey::TableName => self.connection.execute(
                "UPDATE forms SET response_count = response_count + 1 WHERE table_name = ?1",
                [form.table_name.as_str()],
            ),
        }
        .map_err(AdminError::sqlite("increment response count"))?;
        Ok(updated)
    }

    #[cfg(test)]
    pub(crate) const fn connection(&self) -> &Connection {
        &self.connection
    }
}

struct StoredForm {
    id: i64,
    owner_id: i64,
    public_code: String,
    storage_type: String,
    table_name: String,
    fields_config: String,
    max_responses: u32,
    response_count: u32,
}

impl StoredForm {
    fn into_form(self) -> Result<Form, AdminError> {
        let storage_type: StorageType =
            self.storage_type.parse().map_err(|err| AdminError::Corrupt {
                what: "form",
                message: format!("form {}: {err}", self.id),
            })?;
        let fields: Vec<FieldConfig> =
            serde_json::from_str(&self.fields_config).map_err(AdminError::json("decode fields"))?;
        let form = Form::new(
            self.id,
            self.owner_id,
            self.public_code,
            storage_type,
            &self.table_name,
            fields,
        )
        .map_err(|err| AdminError::Corrupt {
            what: "form",
            message: format!("form {}: {err}", self.id),
        })?;
        Ok(Form {
            max_responses: self.max_responses,
            response_count: self.response_count,
            ..form
        })
    }
}

impl ResponseBackend for AdminStore {
    fn kind(&self) -> StorageType {
        StorageType::Admin
    }

    fn persist(&self, form: &Form, submission: &Submission) -> Result<(), BackendError> {
        self.insert_response(form, submission)
            .map(|uid| log::debug!("admin store saved response {uid} for form {}", form.id))
            .map_err(BackendError::from)
    }

    fn fetch(&self, form: &Form, limit: u32, offset: u32) -> Result<Vec<Response>, BackendError> {
        self.list_responses(form, limit, offset)
            .map_err(BackendError::from)
    }

    fn counts_in_transaction(&self) -> bool {
        true
    }
}
