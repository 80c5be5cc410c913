//! Test-only backend resolver used by unit and behaviour tests.

use geosurvey_core::{
    BackendError, Form, ResponseBackend, StorageType, test_support::MemoryBackend,
};

use crate::{AdminStore, BackendResolver};

#[derive(Debug)]
enum Source<'a> {
    Memory(MemoryBackend),
    Admin(&'a AdminStore),
    Unavailable(BackendError),
}

/// Resolves every form to one fixed backend, whatever its storage type.
#[derive(Debug)]
pub struct StubResolver<'a> {
    source: Source<'a>,
}

impl Default for StubResolver<'_> {
    fn default() -> Self {
        Self::with_backend(MemoryBackend::new(StorageType::Supabase))
    }
}

impl<'a> StubResolver<'a> {
    /// Resolve to `backend`.
    #[must_use]
    pub const fn with_backend(backend: MemoryBackend) -> Self {
        Self {
            source: Source::Memory(backend),
        }
    }

    /// Resolve to the admin store itself.
    #[must_use]
    pub const fn admin(store: &'a AdminStore) -> Self {
        Self {
            source: Source::Admin(store),
        }
    }

    /// Fail every resolution with `error`.
    #[must_use]
    pub const fn unavailable(error: BackendError) -> Self {
        Self {
            source: Source::Unavailable(error),
        }
    }

    /// The in-memory backend, when this stub resolves to one.
    #[must_use]
    pub const fn backend(&self) -> Option<&MemoryBackend> {
        match &self.source {
            Source::Memory(backend) => Some(backend),
            Source::Admin(_) | Source::Unavailable(_) => None,
        }
    }
}

impl BackendResolver for StubResolver<'_> {
    fn resolve<'b>(&'b self, _form: &Form) -> Result<Box<dyn ResponseBackend + 'b>, BackendError> {
        match &self.source {
            Source::Memory(backend) => Ok(Box::new(backend)),
            Source::Admin(store) => Ok(Box::new(*store)),
            Source::Unavailable(error) => Err(error.clone()),
        }
    }
}
