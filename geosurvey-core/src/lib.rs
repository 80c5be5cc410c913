//! Core domain types for the geosurvey engine.
//!
//! These models describe survey forms, the responses collected against
//! them, and the persist/fetch contract every storage backend honours.
//! Constructors sanitise identifiers and validate input early so the
//! backends and export encoders can trust what they receive.

#![forbid(unsafe_code)]

mod backend;
mod credentials;
mod form;
pub mod identifier;
mod response;
mod submission;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use backend::{BackendError, ResponseBackend};
pub use credentials::{BackendCredentials, DEFAULT_POSTGRES_PORT};
pub use form::{FieldConfig, FieldType, Form, FormError, StorageType, UnknownStorageType};
pub use identifier::{MAX_IDENTIFIER_LEN, is_valid_identifier, sanitize_identifier};
pub use response::{FieldMap, Response, value_to_text};
pub use submission::{Submission, ValidationError};
