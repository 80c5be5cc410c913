//! Facade crate for the geosurvey engine.
//!
//! This crate re-exports the core domain types and the export encoders, and
//! exposes the storage routing layer behind the `data` feature.

#![forbid(unsafe_code)]

pub use geosurvey_core::{
    BackendCredentials, BackendError, FieldConfig, FieldMap, FieldType, Form, FormError,
    Response, ResponseBackend, StorageType, Submission, ValidationError,
};

pub use geosurvey_export::{ExportArtifact, ExportEngine, ExportError, ExportFormat};

#[cfg(feature = "data")]
pub use geosurvey_data::{
    AdminStore, CredentialResolver, CredentialVault, ExportOutcome, ExportRequest, StorageRouter,
    SubmissionError, VaultKey,
};
