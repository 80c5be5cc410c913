//! Connection secrets for user-owned backends.

use std::fmt;

/// Credentials for a user-owned backend.
///
/// Values are held in plaintext only in memory; at rest every field is
/// stored encrypted. `Debug` output redacts secrets.
#[derive(Clone, PartialEq, Eq)]
pub enum BackendCredentials {
    /// PostgREST-style HTTP endpoint.
    Supabase {
        /// Project base URL, e.g. `https://abc.supabase.co`.
        url: String,
        /// API key sent as `apikey` and bearer token.
        api_key: String,
    },
    /// Direct PostgreSQL connection.
    Postgres {
        /// Server host name.
        host: String,
        /// Server port.
        port: u16,
        /// Database name.
        database: String,
        /// Login role.
        user: String,
        /// Login password.
        password: String,
    },
}

/// Default PostgreSQL port used when a stored port is blank or corrupt.
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

impl BackendCredentials {
    /// Whether every field needed to open a connection is present.
    ///
    /// Decryption failures surface as empty strings, so incomplete
    /// credentials usually mean a corrupt or rotated secret.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Supabase { url, api_key } => !url.is_empty() && !api_key.is_empty(),
            Self::Postgres {
                host,
                database,
                user,
                ..
            } => !host.is_empty() && !database.is_empty() && !user.is_empty(),
        }
    }
}

impl fmt::Debug for BackendCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supabase { url, .. } => f
                .debug_struct("Supabase")
                .field("url", url)
                .field("api_key", &"<redacted>")
                .finish(),
            Self::Postgres {
                host,
                port,
                database,
                user,
                ..
            } => f
                .debug_struct("Postgres")
                .field("host", host)
                .field("port", port)
                .field("database", database)
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn debug_redacts_secrets() {
        let creds = BackendCredentials::Postgres {
            host: "db.example.com".into(),
            port: 5432,
            database: "survey".into(),
            user: "collector".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("db.example.com"));
        assert!(!rendered.contains("hunter2"));
    }

    #[rstest]
    #[case(BackendCredentials::Supabase { url: "https://x".into(), api_key: String::new() }, false)]
    #[case(BackendCredentials::Supabase { url: "https://x".into(), api_key: "k".into() }, true)]
    fn completeness(#[case] creds: BackendCredentials, #[case] expected: bool) {
        assert_eq!(creds.is_complete(), expected);
    }
}
