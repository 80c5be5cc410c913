//! Selection of the concrete backend for a form.

use geosurvey_core::{BackendCredentials, BackendError, Form, ResponseBackend, StorageType};

use crate::{
    AdminStore, CredentialVault,
    postgres::{PostgresConfig, PostgresDirectStore},
    supabase::{SupabaseHttpConfig, SupabaseHttpStore},
};

/// Produces the backend holding a form's responses.
pub trait BackendResolver {
    /// Backend for `form`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the backend cannot be reached or
    /// configured, for example because credentials are missing.
    fn resolve<'a>(&'a self, form: &Form) -> Result<Box<dyn ResponseBackend + 'a>, BackendError>;
}

impl<R: BackendResolver + ?Sized> BackendResolver for &R {
    fn resolve<'a>(&'a self, form: &Form) -> Result<Box<dyn ResponseBackend + 'a>, BackendError> {
        (**self).resolve(form)
    }
}

/// Resolves backends from the admin store and the owner's stored
/// credentials.
#[derive(Debug)]
pub struct CredentialResolver<'s> {
    admin: &'s AdminStore,
    vault: &'s CredentialVault,
    http: SupabaseHttpConfig,
    postgres: PostgresConfig,
}

impl<'s> CredentialResolver<'s> {
    /// Resolver with default transport settings.
    #[must_use]
    pub fn new(admin: &'s AdminStore, vault: &'s CredentialVault) -> Self {
        Self {
            admin,
            vault,
            http: SupabaseHttpConfig::default(),
            postgres: PostgresConfig::default(),
        }
    }

    /// Override the REST transport settings.
    #[must_use]
    pub fn with_http_config(mut self, http: SupabaseHttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Override the PostgreSQL connection settings.
    #[must_use]
    pub const fn with_postgres_config(mut self, postgres: PostgresConfig) -> Self {
        self.postgres = postgres;
        self
    }

    fn credentials(&self, form: &Form) -> Result<BackendCredentials, BackendError> {
        let missing = || BackendError::MissingCredentials {
            owner_id: form.owner_id,
            storage_type: form.storage_type,
        };
        self.admin
            .load_credentials(form.owner_id, form.storage_type, self.vault)
            .map_err(BackendError::from)?
            .filter(BackendCredentials::is_complete)
            .ok_or_else(missing)
    }
}

impl BackendResolver for CredentialResolver<'_> {
    fn resolve<'a>(&'a self, form: &Form) -> Result<Box<dyn ResponseBackend + 'a>, BackendError> {
        match form.storage_type {
            StorageType::Admin => Ok(Box::new(self.admin)),
            StorageType::Supabase => {
                let credentials = self.credentials(form)?;
                let BackendCredentials::Supabase { url, api_key } = credentials else {
                    return Err(BackendError::MissingCredentials {
                        owner_id: form.owner_id,
                        storage_type: form.storage_type,
                    });
                };
                let store = SupabaseHttpStore::with_config(url.as_str(), api_key, self.http.clone())
                    .map_err(|err| BackendError::Connection {
                        target: url,
                        message: err.to_string(),
                    })?;
                Ok(Box::new(store))
            }
            StorageType::Postgres => {
                let credentials = self.credentials(form)?;
                let store =
                    PostgresDirectStore::from_credentials(&credentials, self.postgres.clone())?;
                Ok(Box::new(store))
            }
        }
    }
}
