//! Shared plumbing for the subcommands.

use camino::Utf8Path;
use geosurvey_data::{
    AdminStore, CredentialVault, EnvKeySource, VAULT_KEY_ENV, VaultError, VaultKey,
};
use serde::de::DeserializeOwned;

use crate::{ARG_VAULT_KEY, CliError};

/// Fail unless `path` is an existing regular file.
pub(crate) fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match geosurvey_fs::is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) if path.exists() => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Ok(false) => Err(CliError::MissingSourceFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Open the admin catalogue at `path`, creating it when absent.
pub(crate) fn open_admin(path: &Utf8Path) -> Result<AdminStore, CliError> {
    geosurvey_fs::ensure_parent_dir(path).map_err(|source| CliError::InspectSourcePath {
        field: crate::ARG_ADMIN_DB,
        path: path.to_path_buf(),
        source,
    })?;
    Ok(AdminStore::open(path.as_std_path())?)
}

/// Build the vault from an explicit base64 key, falling back to
/// `GEOSURVEY_VAULT_KEY`.
pub(crate) fn resolve_vault(vault_key: Option<&str>) -> Result<CredentialVault, CliError> {
    if let Some(encoded) = vault_key {
        return Ok(CredentialVault::new(VaultKey::from_base64(encoded)?));
    }
    CredentialVault::from_source(&EnvKeySource::default()).map_err(|err| match err {
        VaultError::MissingKey { .. } => CliError::MissingArgument {
            field: ARG_VAULT_KEY,
            env: VAULT_KEY_ENV,
        },
        other => CliError::VaultKey(other),
    })
}

/// Decode a JSON document from disk.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, CliError> {
    let raw = geosurvey_fs::read_to_string(path).map_err(|source| CliError::ReadInput {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CliError::ParseInput {
        path: path.to_path_buf(),
        source,
    })
}
