use thiserror::Error;

use crate::{ExportFormat, UnsupportedFormat};

/// Errors aborting an export before any bytes are handed out.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The response set was empty.
    #[error("there are no responses to export")]
    NoResponses,
    /// A spatial format was requested but no row carried a valid location.
    #[error("no responses with valid coordinates for a {format} export")]
    NoGeoValidRows {
        /// Requested spatial format.
        format: ExportFormat,
    },
    /// The format token was not recognised.
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormat),
    /// A value could not be represented inside a fixed-width binary field.
    #[error("{what} does not fit the {format} layout")]
    TooLarge {
        /// Format whose layout overflowed.
        format: ExportFormat,
        /// Field that overflowed.
        what: &'static str,
    },
    /// Writing CSV rows failed.
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    /// Serialising JSON output failed.
    #[error("failed to serialise JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A GeoPackage statement failed.
    #[error("GeoPackage step '{stage}' failed: {source}")]
    GeoPackage {
        /// Step that failed.
        stage: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Assembling the shapefile archive failed.
    #[error("failed to assemble shapefile archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// Scratch file handling failed.
    #[error("I/O failure while {context}: {source}")]
    Io {
        /// Operation that failed.
        context: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    pub(crate) fn geopackage(stage: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::GeoPackage { stage, source }
    }

    pub(crate) fn io(context: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Io { context, source }
    }
}
