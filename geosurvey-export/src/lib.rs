//! Export encoders for survey responses.
//!
//! Responsibilities:
//! - Turn a normalised response set plus its form schema into CSV, JSON,
//!   GeoJSON, KML, zipped Shapefile, or GeoPackage bytes.
//! - Keep the binary layouts (SHP/SHX/DBF, WKB, GeoPackage geometry blobs)
//!   in fixed-layout encoder functions that can be tested in isolation.
//!
//! Boundaries:
//! - Encoders never fetch data; callers hand over fully materialised rows.
//! - Every encoder either returns the complete output or an error; partial
//!   output is never produced.
//!
//! Invariants:
//! - Only rows with a valid WGS84 location participate in spatial formats,
//!   and every spatial file of one export sees the same rows in the same
//!   order.
//! - Scratch files live in a request-scoped temporary directory that is
//!   removed on every exit path.

#![forbid(unsafe_code)]

mod bounds;
mod engine;
mod error;
mod format;
pub mod geopackage;
mod rows;
pub mod shapefile;
pub mod text;
pub mod wkb;

pub use bounds::BoundingBox;
pub use engine::{ExportArtifact, ExportEngine};
pub use error::ExportError;
pub use format::{ExportFormat, UnsupportedFormat};
pub use rows::{GeoRow, geo_rows};
