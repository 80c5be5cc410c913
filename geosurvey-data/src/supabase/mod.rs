//! Response storage in a user-owned Supabase project over its REST API.
//!
//! [`SupabaseHttpStore`] implements the synchronous [`ResponseBackend`]
//! contract by blocking on async `reqwest` calls, the same bridge the
//! PostgreSQL store uses.
//!
//! # Example
//!
//! ```no_run
//! use geosurvey_core::{FieldConfig, FieldType, Form, ResponseBackend, StorageType};
//! use geosurvey_data::supabase::SupabaseHttpStore;
//!
//! let store = SupabaseHttpStore::new("https://project.example.co", "service-key")?;
//! let form = Form::new(
//!     1,
//!     1,
//!     "BIRDS",
//!     StorageType::Supabase,
//!     "birds",
//!     vec![FieldConfig::new("species", "Species", FieldType::Text)],
//! )?;
//! let latest = store.fetch(&form, 20, 0)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod rows;

use std::time::Duration;

use geosurvey_core::{BackendError, Form, Response, ResponseBackend, StorageType, Submission};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::runtime::BlockingRuntime;

/// Errors constructing a [`SupabaseHttpStore`].
#[derive(Debug, Error)]
pub enum StoreBuildError {
    /// Failed to construct the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to construct the Tokio runtime.
    #[error("failed to build Tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Default User-Agent header sent with REST requests.
pub const DEFAULT_USER_AGENT: &str = "geosurvey-storage/0.1";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Transport settings for [`SupabaseHttpStore`].
#[derive(Debug, Clone)]
pub struct SupabaseHttpConfig {
    /// Connect and whole-request timeout.
    pub timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
}

impl Default for SupabaseHttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl SupabaseHttpConfig {
    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// REST-backed response store for one Supabase project.
pub struct SupabaseHttpStore {
    client: Client,
    config: SupabaseHttpConfig,
    runtime: BlockingRuntime,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for SupabaseHttpStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseHttpStore")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("config", &self.config)
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

impl SupabaseHttpStore {
    /// Store for the project at `base_url` with default transport settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreBuildError`] if the client or runtime cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, StoreBuildError> {
        Self::with_config(base_url, api_key, SupabaseHttpConfig::default())
    }

    /// Store with explicit transport settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreBuildError`] if the client or runtime cannot be built.
    pub fn with_config(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        config: SupabaseHttpConfig,
    ) -> Result<Self, StoreBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(StoreBuildError::HttpClient)?;
        let runtime = BlockingRuntime::new().map_err(StoreBuildError::Runtime)?;
        Ok(Self {
            client,
            config,
            runtime,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url.trim_end_matches('/'))
    }

    fn authorised(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn insert_async(&self, form: &Form, submission: &Submission) -> Result<(), BackendError> {
        let url = self.table_url(&form.table_name);
        let response = self
            .authorised(self.client.post(&url))
            .header("Prefer", "return=minimal")
            .json(&rows::insert_body(form, submission))
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, &url))?;
        expect_status(response, StatusCode::CREATED, &url).await?;
        Ok(())
    }

    async fn select_async(
        &self,
        form: &Form,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Response>, BackendError> {
        let url = self.table_url(&form.table_name);
        let response = self
            .authorised(self.client.get(&url))
            .query(&[
                ("select", "*".to_owned()),
                ("order", "created_at.desc,id.desc".to_owned()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, &url))?;
        let response = expect_status(response, StatusCode::OK, &url).await?;
        let body: Vec<Map<String, Value>> =
            response.json().await.map_err(|err| BackendError::Decode {
                message: err.to_string(),
            })?;
        body.iter().map(|row| rows::normalise(form, row)).collect()
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &str) -> BackendError {
        if error.is_timeout() {
            return BackendError::Timeout {
                target: url.to_owned(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }
        if let Some(status) = error.status() {
            return BackendError::Status {
                target: url.to_owned(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }
        BackendError::Connection {
            target: url.to_owned(),
            message: error.to_string(),
        }
    }
}

/// Accept only `expected`; any other status, including other 2xx codes,
/// is a failure carrying the response body.
async fn expect_status(
    response: reqwest::Response,
    expected: StatusCode,
    url: &str,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        target: url.to_owned(),
        status: status.as_u16(),
        message,
    })
}

impl ResponseBackend for SupabaseHttpStore {
    fn kind(&self) -> StorageType {
        StorageType::Supabase
    }

    fn persist(&self, form: &Form, submission: &Submission) -> Result<(), BackendError> {
        self.runtime.block_on(self.insert_async(form, submission))
    }

    fn fetch(&self, form: &Form, limit: u32, offset: u32) -> Result<Vec<Response>, BackendError> {
        self.runtime.block_on(self.select_async(form, limit, offset))
    }
}
