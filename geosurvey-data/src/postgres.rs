//! Response storage in a user-owned PostgreSQL database.
//!
//! Each call opens a transient connection, bounded by a connect timeout,
//! and closes it afterwards. The whole call, statements included, is
//! bounded by a request timeout. No pool is kept: user databases are reached
//! rarely and from many owners.

use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use geosurvey_core::{
    BackendCredentials, BackendError, FieldMap, Form, Response, ResponseBackend, StorageType,
    Submission, value_to_text,
};
use serde_json::Value;
use sqlx::{
    ConnectOptions, Connection, Row,
    postgres::{PgConnectOptions, PgConnection, PgRow},
};

use crate::runtime::BlockingRuntime;
use crate::sql;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection settings for [`PostgresDirectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    /// Upper bound on establishing a connection.
    pub connect_timeout: Duration,
    /// Upper bound on a whole call, from connect to close.
    pub request_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl PostgresConfig {
    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the timeout for a whole call.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Direct-connection response store.
pub struct PostgresDirectStore {
    options: PgConnectOptions,
    target: String,
    config: PostgresConfig,
    runtime: BlockingRuntime,
}

impl std::fmt::Debug for PostgresDirectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDirectStore")
            .field("target", &self.target)
            .field("config", &self.config)
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

impl PostgresDirectStore {
    /// Store for the database described by `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Connection`] for non-PostgreSQL credentials
    /// or when the blocking runtime cannot be built.
    pub fn from_credentials(
        credentials: &BackendCredentials,
        config: PostgresConfig,
    ) -> Result<Self, BackendError> {
        let BackendCredentials::Postgres {
            host,
            port,
            database,
            user,
            password,
        } = credentials
        else {
            return Err(BackendError::Connection {
                target: "postgres".into(),
                message: "credentials are not for a PostgreSQL backend".into(),
            });
        };
        let options = PgConnectOptions::new()
            .host(host)
            .port(*port)
            .database(database)
            .username(user)
            .password(password);
        let target = format!("postgres://{host}:{port}/{database}");
        let runtime = BlockingRuntime::new().map_err(|err| BackendError::Connection {
            target: target.clone(),
            message: format!("failed to build Tokio runtime: {err}"),
        })?;
        Ok(Self {
            options,
            target,
            config,
            runtime,
        })
    }

    /// Create the response table and its index for `form` if missing.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the connection or DDL fails.
    pub fn provision(&self, form: &Form) -> Result<(), BackendError> {
        self.runtime.block_on(self.bounded(self.provision_async(form)))
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        tokio::time::timeout(self.config.request_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(BackendError::Timeout {
                    target: self.target.clone(),
                    timeout_secs: self.config.request_timeout.as_secs(),
                })
            })
    }

    async fn connect(&self) -> Result<PgConnection, BackendError> {
        match tokio::time::timeout(self.config.connect_timeout, self.options.connect()).await {
            Ok(Ok(connection)) => Ok(connection),
            Ok(Err(err)) => Err(BackendError::Connection {
                target: self.target.clone(),
                message: err.to_string(),
            }),
            Err(_) => Err(BackendError::Timeout {
                target: self.target.clone(),
                timeout_secs: self.config.connect_timeout.as_secs(),
            }),
        }
    }

    async fn provision_async(&self, form: &Form) -> Result<(), BackendError> {
        let mut connection = self.connect().await?;
        for statement in sql::provision_statements(form) {
            sqlx::query(&statement)
                .execute(&mut connection)
                .await
                .map_err(query_error)?;
        }
        close(connection).await;
        Ok(())
    }

    async fn insert_async(&self, form: &Form, submission: &Submission) -> Result<(), BackendError> {
        let statement = sql::insert_sql(form);
        let mut query = sqlx::query(&statement);
        for field in &form.fields {
            let text = submission
                .data
                .get(&field.name)
                .map(value_to_text)
                .filter(|text| !text.trim().is_empty());
            query = query.bind(text);
        }
        let query = query
            .bind(submission.latitude)
            .bind(submission.longitude)
            .bind(submission.accuracy)
            .bind(submission.client_ip.clone());

        let mut connection = self.connect().await?;
        query.execute(&mut connection).await.map_err(query_error)?;
        close(connection).await;
        Ok(())
    }

    async fn select_async(
        &self,
        form: &Form,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Response>, BackendError> {
        let statement = sql::select_sql(form);
        let mut connection = self.connect().await?;
        let rows = sqlx::query(&statement)
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&mut connection)
            .await
            .map_err(query_error)?;
        close(connection).await;
        rows.iter().map(|row| decode_row(form, row)).collect()
    }
}

async fn close(connection: PgConnection) {
    if let Err(err) = connection.close().await {
        log::debug!("closing PostgreSQL connection failed: {err}");
    }
}

fn query_error(err: sqlx::Error) -> BackendError {
    BackendError::Query {
        message: err.to_string(),
    }
}

fn decode_row(form: &Form, row: &PgRow) -> Result<Response, BackendError> {
    let decode = |err: sqlx::Error| BackendError::Decode {
        message: err.to_string(),
    };
    let mut data = FieldMap::new();
    for field in &form.fields {
        let value: Option<String> = row.try_get(field.name.as_str()).map_err(decode)?;
        if let Some(text) = value {
            data.insert(field.name.clone(), Value::String(text));
        }
    }
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;
    Ok(Response {
        unique_display_id: row.try_get("id").map_err(decode)?,
        data,
        latitude: row.try_get("latitude").map_err(decode)?,
        longitude: row.try_get("longitude").map_err(decode)?,
        accuracy: row.try_get("accuracy").map_err(decode)?,
        created_at,
    })
}

impl ResponseBackend for PostgresDirectStore {
    fn kind(&self) -> StorageType {
        StorageType::Postgres
    }

    fn persist(&self, form: &Form, submission: &Submission) -> Result<(), BackendError> {
        self.runtime
            .block_on(self.bounded(self.insert_async(form, submission)))
    }

    fn fetch(&self, form: &Form, limit: u32, offset: u32) -> Result<Vec<Response>, BackendError> {
        self.runtime
            .block_on(self.bounded(self.select_async(form, limit, offset)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geosurvey_core::{FieldConfig, FieldType};
    use rstest::rstest;

    fn credentials(port: u16) -> BackendCredentials {
        BackendCredentials::Postgres {
            host: "127.0.0.1".into(),
            port,
            database: "survey".into(),
            user: "collector".into(),
            password: "hunter2".into(),
        }
    }

    #[rstest]
    fn rejects_supabase_credentials() {
        let creds = BackendCredentials::Supabase {
            url: "https://x".into(),
            api_key: "k".into(),
        };
        assert!(matches!(
            PostgresDirectStore::from_credentials(&creds, PostgresConfig::default()),
            Err(BackendError::Connection { .. })
        ));
    }

    #[rstest]
    fn debug_hides_password() {
        let store = PostgresDirectStore::from_credentials(&credentials(5432), PostgresConfig::default())
            .expect("store should build");
        let rendered = format!("{store:?}");
        assert!(rendered.contains("postgres://127.0.0.1:5432/survey"));
        assert!(!rendered.contains("hunter2"));
    }

    #[rstest]
    fn unreachable_database_is_a_backend_error() {
        // Port 1 is reserved and refuses connections on loopback.
        let config = PostgresConfig::default().with_connect_timeout(Duration::from_secs(2));
        let store = PostgresDirectStore::from_credentials(&credentials(1), config)
            .expect("store should build");
        let form = Form::new(
            1,
            1,
            "X",
            StorageType::Postgres,
            "x",
            vec![FieldConfig::new("note", "Note", FieldType::Text)],
        )
        .expect("valid form");
        let result = store.fetch(&form, 10, 0);
        assert!(matches!(
            result,
            Err(BackendError::Connection { .. } | BackendError::Timeout { .. })
        ));
    }

    #[rstest]
    fn hung_call_times_out() {
        let config = PostgresConfig::default().with_request_timeout(Duration::from_millis(50));
        let store = PostgresDirectStore::from_credentials(&credentials(5432), config)
            .expect("store should build");
        let hung = std::future::pending::<Result<(), BackendError>>();
        let err = store
            .runtime
            .block_on(store.bounded(hung))
            .expect_err("hung call should time out");
        assert_eq!(
            err,
            BackendError::Timeout {
                target: "postgres://127.0.0.1:5432/survey".into(),
                timeout_secs: 0,
            }
        );
    }
}
