//! Persist/fetch contract shared by every storage backend.
//!
//! Backends report failures as [`BackendError`]; callers that route
//! submissions are expected to log those errors and degrade to a boolean
//! or an empty list rather than propagate them further.

use thiserror::Error;

use crate::{Form, Response, StorageType, Submission};

/// Failures reaching or querying a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend did not answer within the configured timeout.
    #[error("request to {target} timed out after {timeout_secs}s")]
    Timeout {
        /// Host or URL that was contacted.
        target: String,
        /// Timeout that elapsed, in seconds.
        timeout_secs: u64,
    },
    /// The connection could not be established or broke mid-request.
    #[error("connection to {target} failed: {message}")]
    Connection {
        /// Host or URL that was contacted.
        target: String,
        /// Underlying error description.
        message: String,
    },
    /// The backend answered with a non-success status.
    #[error("{target} answered with status {status}: {message}")]
    Status {
        /// Host or URL that was contacted.
        target: String,
        /// HTTP status code, or zero when not applicable.
        status: u16,
        /// Response body or status description.
        message: String,
    },
    /// A statement failed inside the database.
    #[error("query failed: {message}")]
    Query {
        /// Underlying error description.
        message: String,
    },
    /// Returned rows could not be mapped into [`Response`] values.
    #[error("failed to decode backend rows: {message}")]
    Decode {
        /// Underlying error description.
        message: String,
    },
    /// The owner has not stored usable credentials for this backend.
    #[error("owner {owner_id} has no usable {storage_type} credentials")]
    MissingCredentials {
        /// Form owner.
        owner_id: i64,
        /// Backend requiring the credentials.
        storage_type: StorageType,
    },
}

/// Storage backend honouring the persist/fetch contract.
///
/// Implementations are synchronous: they block the calling request until
/// the backend answers or times out. Nothing retries automatically.
pub trait ResponseBackend {
    /// Which storage type this backend serves.
    fn kind(&self) -> StorageType;

    /// Persist one submission into the form's response storage.
    fn persist(&self, form: &Form, submission: &Submission) -> Result<(), BackendError>;

    /// Fetch up to `limit` responses, newest first, skipping `offset`.
    fn fetch(&self, form: &Form, limit: u32, offset: u32) -> Result<Vec<Response>, BackendError>;

    /// Whether [`ResponseBackend::persist`] already incremented the form's
    /// response counter in the same transaction as the insert.
    fn counts_in_transaction(&self) -> bool {
        false
    }
}

impl<T: ResponseBackend + ?Sized> ResponseBackend for &T {
    fn kind(&self) -> StorageType {
        (**self).kind()
    }

    fn persist(&self, form: &Form, submission: &Submission) -> Result<(), BackendError> {
        (**self).persist(form, submission)
    }

    fn fetch(&self, form: &Form, limit: u32, offset: u32) -> Result<Vec<Response>, BackendError> {
        (**self).fetch(form, limit, offset)
    }

    fn counts_in_transaction(&self) -> bool {
        (**self).counts_in_transaction()
    }
}

impl<T: ResponseBackend + ?Sized> ResponseBackend for Box<T> {
    fn kind(&self) -> StorageType {
        (**self).kind()
    }

    fn persist(&self, form: &Form, submission: &Submission) -> Result<(), BackendError> {
        (**self).persist(form, submission)
    }

    fn fetch(&self, form: &Form, limit: u32, offset: u32) -> Result<Vec<Response>, BackendError> {
        (**self).fetch(form, limit, offset)
    }

    fn counts_in_transaction(&self) -> bool {
        (**self).counts_in_transaction()
    }
}
