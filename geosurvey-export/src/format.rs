//! Export format tokens and their HTTP metadata.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Target format of an export request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Comma-separated values.
    Csv,
    /// JSON array of row objects.
    Json,
    /// GeoJSON `FeatureCollection` of points.
    GeoJson,
    /// KML document with one placemark per located row.
    Kml,
    /// OGC GeoPackage (SQLite container).
    GeoPackage,
    /// ESRI Shapefile set, zipped.
    Shapefile,
}

/// Error returned for an unrecognised format token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported export format {token:?}")]
pub struct UnsupportedFormat {
    /// Token that failed to parse.
    pub token: String,
}

impl ExportFormat {
    /// Every supported format, in token order.
    pub const ALL: [Self; 6] = [
        Self::Csv,
        Self::Json,
        Self::GeoJson,
        Self::Kml,
        Self::GeoPackage,
        Self::Shapefile,
    ];

    /// Request token naming this format.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::GeoJson => "geojson",
            Self::Kml => "kml",
            Self::GeoPackage => "gpkg",
            Self::Shapefile => "shp",
        }
    }

    /// Extension of the attachment file.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Shapefile => "zip",
            other => other.token(),
        }
    }

    /// MIME type of the attachment.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Json => "application/json",
            Self::GeoJson => "application/geo+json",
            Self::Kml => "application/vnd.google-earth.kml+xml",
            Self::GeoPackage => "application/geopackage+sqlite3",
            Self::Shapefile => "application/zip",
        }
    }

    /// Whether only rows with a valid location are exported.
    #[must_use]
    pub const fn is_spatial(self) -> bool {
        !matches!(self, Self::Csv | Self::Json)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ExportFormat {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.token() == wanted)
            .ok_or_else(|| UnsupportedFormat {
                token: s.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("csv", ExportFormat::Csv)]
    #[case("JSON", ExportFormat::Json)]
    #[case("geojson", ExportFormat::GeoJson)]
    #[case("kml", ExportFormat::Kml)]
    #[case(" gpkg ", ExportFormat::GeoPackage)]
    #[case("shp", ExportFormat::Shapefile)]
    fn parses_tokens(#[case] token: &str, #[case] expected: ExportFormat) {
        assert_eq!(token.parse::<ExportFormat>(), Ok(expected));
    }

    #[rstest]
    #[case("xlsx")]
    #[case("")]
    #[case("shapefile")]
    fn rejects_unknown_tokens(#[case] token: &str) {
        assert!(token.parse::<ExportFormat>().is_err());
    }

    #[rstest]
    fn shapefile_is_served_as_zip() {
        assert_eq!(ExportFormat::Shapefile.extension(), "zip");
        assert_eq!(ExportFormat::Shapefile.content_type(), "application/zip");
    }
}
