//! OGC GeoPackage export.
//!
//! The package is built as a SQLite file inside a request-scoped scratch
//! directory, read back into memory, and the directory is removed when the
//! guard drops, on success and failure alike.

use geosurvey_core::{FieldType, Form, sanitize_identifier};
use rusqlite::{Connection, Transaction, params, params_from_iter, types::Value as SqlValue};

use crate::{BoundingBox, ExportError, ExportFormat, GeoRow, wkb};

/// `application_id` pragma value (`"GPKG"` in ASCII).
pub const APPLICATION_ID: i32 = 0x4750_4B47;
/// `user_version` pragma value for GeoPackage 1.2.
pub const USER_VERSION: i32 = 10_200;
/// Spatial reference system of every exported geometry.
pub const WGS84_SRS_ID: i32 = 4326;
/// Name of the geometry column in the feature table.
pub const GEOMETRY_COLUMN: &str = "geom";

const WGS84_DEFINITION: &str = concat!(
    "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563,",
    "AUTHORITY[\"EPSG\",\"7030\"]],AUTHORITY[\"EPSG\",\"6326\"]],",
    "PRIMEM[\"Greenwich\",0,AUTHORITY[\"EPSG\",\"8901\"]],",
    "UNIT[\"degree\",0.0174532925199433,AUTHORITY[\"EPSG\",\"9122\"]],",
    "AUTHORITY[\"EPSG\",\"4326\"]]"
);

const CATALOG_SQL: &str = "
CREATE TABLE gpkg_spatial_ref_sys (
    srs_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL PRIMARY KEY,
    organization TEXT NOT NULL,
    organization_coordsys_id INTEGER NOT NULL,
    definition TEXT NOT NULL,
    description TEXT
);
CREATE TABLE gpkg_contents (
    table_name TEXT NOT NULL PRIMARY KEY,
    data_type TEXT NOT NULL,
    identifier TEXT UNIQUE,
    description TEXT DEFAULT '',
    last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    min_x DOUBLE,
    min_y DOUBLE,
    max_x DOUBLE,
    max_y DOUBLE,
    srs_id INTEGER,
    CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
CREATE TABLE gpkg_geometry_columns (
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    geometry_type_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL,
    z TINYINT NOT NULL,
    m TINYINT NOT NULL,
    CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
    CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
    CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
";

/// Name of the feature table for `form`.
///
/// Reuses the sanitised table name, prefixed when it would collide with the
/// `gpkg_` or `sqlite_` namespaces.
#[must_use]
pub fn feature_table_name(form: &Form) -> String {
    let name = sanitize_identifier(&form.table_name);
    if name.starts_with("gpkg_") || name.starts_with("sqlite_") {
        format!("f_{name}")
    } else {
        name
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Encode located `rows` as a GeoPackage file.
///
/// # Errors
///
/// Returns [`ExportError::NoGeoValidRows`] for an empty row set,
/// [`ExportError::GeoPackage`] when a statement fails, or
/// [`ExportError::Io`] when the scratch file cannot be handled.
pub fn encode(form: &Form, rows: &[GeoRow<'_>]) -> Result<Vec<u8>, ExportError> {
    let bbox = BoundingBox::from_points(rows.iter().map(|row| row.point)).ok_or(
        ExportError::NoGeoValidRows {
            format: ExportFormat::GeoPackage,
        },
    )?;
    let scratch = tempfile::Builder::new()
        .prefix("geosurvey-gpkg-")
        .tempdir()
        .map_err(ExportError::io("creating GeoPackage scratch directory"))?;
    let path = scratch.path().join("export.gpkg");

    let mut conn = Connection::open(&path).map_err(ExportError::geopackage("open"))?;
    write_package(&mut conn, form, rows, bbox)?;
    conn.close()
        .map_err(|(_, source)| ExportError::geopackage("close")(source))?;

    let bytes = std::fs::read(&path).map_err(ExportError::io("reading GeoPackage scratch file"))?;
    log::debug!(
        "GeoPackage for form {} holds {} features in {} bytes",
        form.public_code,
        rows.len(),
        bytes.len()
    );
    Ok(bytes)
}

fn write_package(
    conn: &mut Connection,
    form: &Form,
    rows: &[GeoRow<'_>],
    bbox: BoundingBox,
) -> Result<(), ExportError> {
    conn.pragma_update(None, "application_id", APPLICATION_ID)
        .map_err(ExportError::geopackage("set application_id"))?;
    conn.pragma_update(None, "user_version", USER_VERSION)
        .map_err(ExportError::geopackage("set user_version"))?;

    let tx = conn
        .transaction()
        .map_err(ExportError::geopackage("begin"))?;
    tx.execute_batch(CATALOG_SQL)
        .map_err(ExportError::geopackage("create catalog"))?;
    seed_spatial_ref_sys(&tx)?;

    let table = feature_table_name(form);
    create_feature_table(&tx, &table, form)?;
    register_layer(&tx, &table, form)?;
    insert_features(&tx, &table, form, rows)?;
    tx.execute(
        "UPDATE gpkg_contents SET min_x = ?1, min_y = ?2, max_x = ?3, max_y = ?4 \
         WHERE table_name = ?5",
        params![bbox.min_x(), bbox.min_y(), bbox.max_x(), bbox.max_y(), table],
    )
    .map_err(ExportError::geopackage("update extent"))?;
    tx.commit().map_err(ExportError::geopackage("commit"))
}

fn seed_spatial_ref_sys(tx: &Transaction<'_>) -> Result<(), ExportError> {
    let rows: [(&str, i32, &str, i32, &str, &str); 3] = [
        (
            "WGS 84 geodetic",
            WGS84_SRS_ID,
            "EPSG",
            WGS84_SRS_ID,
            WGS84_DEFINITION,
            "longitude/latitude coordinates in decimal degrees on the WGS 84 spheroid",
        ),
        (
            "Undefined cartesian SRS",
            -1,
            "NONE",
            -1,
            "undefined",
            "undefined cartesian coordinate reference system",
        ),
        (
            "Undefined geographic SRS",
            0,
            "NONE",
            0,
            "undefined",
            "undefined geographic coordinate reference system",
        ),
    ];
    let mut stmt = tx
        .prepare(
            "INSERT INTO gpkg_spatial_ref_sys \
             (srs_name, srs_id, organization, organization_coordsys_id, definition, description) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(ExportError::geopackage("prepare spatial_ref_sys"))?;
    for (name, id, org, org_id, definition, description) in rows {
        stmt.execute(params![name, id, org, org_id, definition, description])
            .map_err(ExportError::geopackage("seed spatial_ref_sys"))?;
    }
    Ok(())
}

const fn column_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Number => "REAL",
        _ => "TEXT",
    }
}

fn create_feature_table(tx: &Transaction<'_>, table: &str, form: &Form) -> Result<(), ExportError> {
    let mut columns = vec![
        "fid INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL".to_owned(),
        format!("{} POINT", quote(GEOMETRY_COLUMN)),
        "unique_display_id INTEGER NOT NULL".to_owned(),
        "created_at TEXT NOT NULL".to_owned(),
        "accuracy REAL".to_owned(),
    ];
    columns.extend(
        form.fields
            .iter()
            .map(|field| format!("{} {}", quote(&field.name), column_type(field.field_type))),
    );
    let sql = format!("CREATE TABLE {} ({})", quote(table), columns.join(", "));
    tx.execute_batch(&sql)
        .map_err(ExportError::geopackage("create feature table"))
}

fn register_layer(tx: &Transaction<'_>, table: &str, form: &Form) -> Result<(), ExportError> {
    tx.execute(
        "INSERT INTO gpkg_contents (table_name, data_type, identifier, description, srs_id) \
         VALUES (?1, 'features', ?2, ?3, ?4)",
        params![
            table,
            form.public_code,
            format!("Responses for form {}", form.public_code),
            WGS84_SRS_ID
        ],
    )
    .map_err(ExportError::geopackage("register contents"))?;
    tx.execute(
        "INSERT INTO gpkg_geometry_columns \
         (table_name, column_name, geometry_type_name, srs_id, z, m) \
         VALUES (?1, ?2, 'POINT', ?3, 0, 0)",
        params![table, GEOMETRY_COLUMN, WGS84_SRS_ID],
    )
    .map_err(ExportError::geopackage("register geometry column"))?;
    Ok(())
}

fn field_value(field_type: FieldType, text: String) -> SqlValue {
    if text.is_empty() {
        return SqlValue::Null;
    }
    match field_type {
        FieldType::Number => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map_or(SqlValue::Text(text), SqlValue::Real),
        _ => SqlValue::Text(text),
    }
}

fn insert_features(
    tx: &Transaction<'_>,
    table: &str,
    form: &Form,
    rows: &[GeoRow<'_>],
) -> Result<(), ExportError> {
    let mut columns = vec![
        quote(GEOMETRY_COLUMN),
        "unique_display_id".to_owned(),
        "created_at".to_owned(),
        "accuracy".to_owned(),
    ];
    columns.extend(form.fields.iter().map(|field| quote(&field.name)));
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table),
        columns.join(", "),
        placeholders.join(", ")
    );
    let mut stmt = tx
        .prepare(&sql)
        .map_err(ExportError::geopackage("prepare feature insert"))?;

    for row in rows {
        let response = row.response;
        let mut values = vec![
            SqlValue::Blob(wkb::encode_gpkg_point(row.point, WGS84_SRS_ID)),
            SqlValue::Integer(response.unique_display_id),
            SqlValue::Text(response.created_at.to_rfc3339()),
            response.accuracy.map_or(SqlValue::Null, SqlValue::Real),
        ];
        values.extend(
            form.fields
                .iter()
                .map(|field| field_value(field.field_type, response.text(&field.name))),
        );
        stmt.execute(params_from_iter(values))
            .map_err(ExportError::geopackage("insert feature"))?;
    }
    Ok(())
}
