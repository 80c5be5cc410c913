//! Catalogue schema for the admin store.

use rusqlite::Connection;

use super::AdminError;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS forms (
    id INTEGER PRIMARY KEY,
    owner_id INTEGER NOT NULL,
    public_code TEXT NOT NULL UNIQUE,
    storage_type TEXT NOT NULL,
    table_name TEXT NOT NULL,
    fields_config TEXT NOT NULL,
    max_responses INTEGER NOT NULL DEFAULT 0,
    response_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS forms_table_name ON forms (table_name);
CREATE TABLE IF NOT EXISTS responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    form_id INTEGER NOT NULL REFERENCES forms (id),
    unique_display_id INTEGER NOT NULL,
    data TEXT NOT NULL,
    latitude REAL,
    longitude REAL,
    accuracy REAL,
    ip_address TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (form_id, unique_display_id)
);
CREATE INDEX IF NOT EXISTS responses_form_created
    ON responses (form_id, created_at DESC);
CREATE TABLE IF NOT EXISTS backend_credentials (
    owner_id INTEGER NOT NULL,
    storage_type TEXT NOT NULL,
    url TEXT NOT NULL DEFAULT '',
    api_key TEXT NOT NULL DEFAULT '',
    host TEXT NOT NULL DEFAULT '',
    port TEXT NOT NULL DEFAULT '',
    database_name TEXT NOT NULL DEFAULT '',
    db_user TEXT NOT NULL DEFAULT '',
    db_password TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (owner_id, storage_type)
);
";

/// Create the catalogue tables if they are missing.
pub(super) fn initialise(connection: &Connection) -> Result<(), AdminError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .and_then(|()| connection.execute_batch(SCHEMA_SQL))
        .map_err(AdminError::sqlite("initialise schema"))
}
