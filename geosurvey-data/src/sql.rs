//! SQL text for user-owned PostgreSQL response tables.
//!
//! Table and column names come from sanitised identifiers and are quoted
//! regardless; values are always bound, never interpolated.

use geosurvey_core::Form;

/// Double-quote `name` for PostgreSQL, doubling embedded quotes.
///
/// # Examples
///
/// ```
/// use geosurvey_data::sql::quote_identifier;
///
/// assert_eq!(quote_identifier("species"), "\"species\"");
/// assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
/// ```
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Statements provisioning the response table for `form`.
///
/// Every form field becomes a nullable `TEXT` column next to the fixed
/// system columns. Both statements are idempotent.
#[must_use]
pub fn provision_statements(form: &Form) -> [String; 2] {
    let table = quote_identifier(&form.table_name);
    let mut columns = vec!["id BIGSERIAL PRIMARY KEY".to_owned()];
    columns.extend(
        form.fields
            .iter()
            .map(|field| format!("{} TEXT", quote_identifier(&field.name))),
    );
    columns.extend(
        [
            "latitude DOUBLE PRECISION",
            "longitude DOUBLE PRECISION",
            "accuracy DOUBLE PRECISION",
            "ip_address TEXT",
            "created_at TIMESTAMPTZ NOT NULL DEFAULT now()",
        ]
        .map(str::to_owned),
    );
    let index = quote_identifier(&format!("{}_created_at_idx", form.table_name));
    [
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n    {}\n)",
            columns.join(",\n    ")
        ),
        format!("CREATE INDEX IF NOT EXISTS {index} ON {table} (created_at DESC)"),
    ]
}

/// Provisioning DDL as one script.
#[must_use]
pub fn create_table_sql(form: &Form) -> String {
    let [table, index] = provision_statements(form);
    format!("{table};\n{index};\n")
}

/// Parameterised insert for `form`.
///
/// Placeholders `$1..$n` bind the form fields in declaration order,
/// followed by latitude, longitude, accuracy, and client IP.
#[must_use]
pub fn insert_sql(form: &Form) -> String {
    let columns: Vec<String> = form
        .fields
        .iter()
        .map(|field| quote_identifier(&field.name))
        .chain(["latitude", "longitude", "accuracy", "ip_address"].map(str::to_owned))
        .collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|n| format!("${n}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(&form.table_name),
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// Newest-first page of responses for `form`; `$1` is the limit and `$2`
/// the offset.
#[must_use]
pub fn select_sql(form: &Form) -> String {
    let fields: Vec<String> = form
        .fields
        .iter()
        .map(|field| {
            let column = quote_identifier(&field.name);
            format!("{column}::text AS {column}")
        })
        .collect();
    let mut columns = vec!["id::bigint AS id".to_owned()];
    columns.extend(fields);
    columns.extend(
        [
            "latitude::double precision AS latitude",
            "longitude::double precision AS longitude",
            "accuracy::double precision AS accuracy",
            "created_at::timestamptz AS created_at",
        ]
        .map(str::to_owned),
    );
    format!(
        "SELECT {} FROM {} ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
        columns.join(", "),
        quote_identifier(&form.table_name)
    )
}
