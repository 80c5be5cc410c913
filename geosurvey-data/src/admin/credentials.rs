//! Encrypted backend credentials.

use geosurvey_core::{BackendCredentials, DEFAULT_POSTGRES_PORT, StorageType};
use rusqlite::{OptionalExtension, params};

use super::{AdminError, AdminStore};
use crate::CredentialVault;

impl AdminStore {
    /// Store `credentials` for `owner_id`, encrypting every field.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError`] when the row cannot be written.
    pub fn store_credentials(
        &self,
        owner_id: i64,
        credentials: &BackendCredentials,
        vault: &CredentialVault,
    ) -> Result<(), AdminError> {
        let (storage_type, row) = match credentials {
            BackendCredentials::Supabase { url, api_key } => (
                StorageType::Supabase,
                [url.as_str(), api_key.as_str(), "", "", "", "", ""].map(|v| vault.encrypt(v)),
            ),
            BackendCredentials::Postgres {
                host,
                port,
                database,
                user,
                password,
            } => {
                let port = port.to_string();
                (
                    StorageType::Postgres,
                    [
                        "",
                        "",
                        host.as_str(),
                        port.as_str(),
                        database.as_str(),
                        user.as_str(),
                        password.as_str(),
                    ]
                    .map(|v| vault.encrypt(v)),
                )
            }
        };
        let [url, api_key, host, port, database, user, password] = row;
        self.connection
            .execute(
                "INSERT INTO backend_credentials (
                    owner_id, storage_type, url, api_key, host, port,
                    database_name, db_user, db_password
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT (owner_id, storage_type) DO UPDATE SET
                    url = excluded.url,
                    api_key = excluded.api_key,
                    host = excluded.host,
                    port = excluded.port,
                    database_name = excluded.database_name,
                    db_user = excluded.db_user,
                    db_password = excluded.db_password",
                params![
                    owner_id,
                    storage_type.as_str(),
                    url,
                    api_key,
                    host,
                    port,
                    database,
                    user,
                    password
                ],
            )
            .map_err(AdminError::sqlite("store credentials"))?;
        Ok(())
    }

    /// Load and decrypt the credentials `owner_id` registered for
    /// `storage_type`.
    ///
    /// Fields that fail to decrypt come back empty, so the result may be
    /// incomplete; check [`BackendCredentials::is_complete`]. Returns
    /// `None` for [`StorageType::Admin`] and for owners without a row.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError`] on query failure.
    pub fn load_credentials(
        &self,
        owner_id: i64,
        storage_type: StorageType,
        vault: &CredentialVault,
    ) -> Result<Option<BackendCredentials>, AdminError> {
        if storage_type == StorageType::Admin {
            return Ok(None);
        }
        let row: Option<[String; 7]> = self
            .connection
            .query_row(
                "SELECT url, api_key, host, port, database_name, db_user, db_password
                 FROM backend_credentials
                 WHERE owner_id = ?1 AND storage_type = ?2",
                params![owner_id, storage_type.as_str()],
                |row| {
                    Ok([
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ])
                },
            )
            .optional()
            .map_err(AdminError::sqlite("load credentials"))?;

        Ok(row.map(|stored| {
            let [url, api_key, host, port, database, user, password] =
                stored.map(|v| vault.decrypt(&v));
            if storage_type == StorageType::Supabase {
                BackendCredentials::Supabase { url, api_key }
            } else {
                BackendCredentials::Postgres {
                    host,
                    port: port.parse().unwrap_or(DEFAULT_POSTGRES_PORT),
                    database,
                    user,
                    password,
                }
            }
        }))
    }
}
