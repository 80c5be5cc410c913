//! Error types emitted by the geosurvey CLI.
//!
//! Keep this error type reasonably small; every subcommand returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use geosurvey_core::{BackendError, FormError, StorageType};
use geosurvey_data::{AdminError, SubmissionError, VaultError};
use thiserror::Error;

/// Errors emitted by the geosurvey CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Long flag name.
        field: &'static str,
        /// Environment variable that can supply it.
        env: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The vault key could not be obtained or decoded.
    #[error("invalid vault key: {0}")]
    VaultKey(#[from] VaultError),
    /// The admin store could not be opened or queried.
    #[error(transparent)]
    Admin(#[from] AdminError),
    /// Reading an input JSON document failed.
    #[error("failed to read {path:?}: {source}")]
    ReadInput {
        /// Input path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// An input JSON document could not be decoded.
    #[error("failed to parse JSON at {path:?}: {source}")]
    ParseInput {
        /// Input path.
        path: Utf8PathBuf,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// A form definition was rejected.
    #[error("form definition in {path:?} is invalid: {source}")]
    InvalidForm {
        /// Definition path.
        path: Utf8PathBuf,
        /// Validation failure.
        #[source]
        source: FormError,
    },
    /// The form id is not in the admin catalogue.
    #[error("form {form_id} is not registered")]
    UnknownForm {
        /// Requested form.
        form_id: i64,
    },
    /// Credentials were supplied for a different backend than the form uses.
    #[error("form {form_id} stores responses in {expected}, but {supplied} credentials were given")]
    CredentialsMismatch {
        /// Form being registered.
        form_id: i64,
        /// Backend of the form.
        expected: StorageType,
        /// Backend the credentials are for.
        supplied: StorageType,
    },
    /// The submission was refused before persistence.
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    /// The backend did not persist the submission.
    #[error("form {form_id}: the {storage_type} backend did not store the submission")]
    NotStored {
        /// Target form.
        form_id: i64,
        /// Backend that failed.
        storage_type: StorageType,
    },
    /// The export ended without a file.
    #[error("export of form {form_id} failed: {code}")]
    Export {
        /// Exported form.
        form_id: i64,
        /// Redirect error code.
        code: &'static str,
    },
    /// Provisioning needs credentials that are not stored.
    #[error("no usable {storage_type} credentials for owner {owner_id}")]
    MissingCredentials {
        /// Form owner.
        owner_id: i64,
        /// Backend needing credentials.
        storage_type: StorageType,
    },
    /// Creating the response table failed.
    #[error("failed to provision table for form {form_id}: {source}")]
    Provision {
        /// Provisioned form.
        form_id: i64,
        /// Backend failure.
        #[source]
        source: BackendError,
    },
    /// Writing the export artefact failed.
    #[error("failed to write export to {path:?}: {source}")]
    WriteExport {
        /// Destination path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
