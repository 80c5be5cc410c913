//! Storage routing and credential handling for the geosurvey engine.
//!
//! This crate connects the domain types in `geosurvey-core` to real
//! storage:
//!
//! - [`AdminStore`]: the shared SQLite catalogue of forms, encrypted owner
//!   credentials, and admin-backed responses.
//! - [`supabase::SupabaseHttpStore`] and [`PostgresDirectStore`]: user-owned
//!   backends reached over REST and a direct connection.
//! - [`StorageRouter`]: validates submissions, enforces capacity, selects
//!   the backend, and degrades backend failures to `false` or an empty list.
//! - [`ExportRequest`]: drives one export from fetch to file or redirect.
//!
//! Both remote backends implement the synchronous
//! [`geosurvey_core::ResponseBackend`] contract by blocking on async
//! clients; inside a multi-threaded Tokio runtime they use
//! `block_in_place`.

#![forbid(unsafe_code)]

mod admin;
mod export_request;
mod postgres;
mod resolver;
mod router;
mod runtime;
pub mod sql;
pub mod supabase;
mod vault;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use admin::{AdminError, AdminStore, CounterKey};
pub use export_request::{
    EXPORT_FETCH_CAP, ExportFailure, ExportOutcome, ExportRequest, ExportStage,
};
pub use postgres::{PostgresConfig, PostgresDirectStore};
pub use resolver::{BackendResolver, CredentialResolver};
pub use router::{StorageRouter, SubmissionError};
pub use vault::{
    CredentialVault, EnvKeySource, IV_LEN, KEY_LEN, KeySource, VAULT_KEY_ENV, VaultError, VaultKey,
};
