//! ESRI Shapefile point layers, delivered as a zip archive.
//!
//! A layer is four parallel files: geometry (`.shp`), index (`.shx`),
//! attributes (`.dbf`), and projection (`.prj`). A `.cpg` sidecar declares
//! the attribute encoding. Record `i` in `.shp`, `.shx`, and `.dbf`
//! always describes the same response.

pub mod dbf;
pub mod shp;

use std::io::{Cursor, Write};

use chrono::NaiveDate;
use geosurvey_core::Form;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::{BoundingBox, ExportError, ExportFormat, GeoRow};
use dbf::DbfTable;

/// WGS84 geographic coordinate system in ESRI WKT.
pub const WGS84_PRJ: &str = concat!(
    "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",",
    "SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],",
    "PRIMEM[\"Greenwich\",0.0],UNIT[\"Degree\",0.0174532925199433]]"
);

/// Attribute code page declared in the `.cpg` sidecar.
pub const CODE_PAGE: &str = "UTF-8";

/// The member files of one shapefile layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapefileBundle {
    /// Geometry records.
    pub shp: Vec<u8>,
    /// Record index.
    pub shx: Vec<u8>,
    /// Attribute table.
    pub dbf: Vec<u8>,
}

impl ShapefileBundle {
    /// Encode the layer for located `rows`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::NoGeoValidRows`] for an empty row set and
    /// [`ExportError::TooLarge`] when a header field overflows.
    pub fn encode(form: &Form, rows: &[GeoRow<'_>], updated: NaiveDate) -> Result<Self, ExportError> {
        let bbox = BoundingBox::from_points(rows.iter().map(|row| row.point)).ok_or(
            ExportError::NoGeoValidRows {
                format: ExportFormat::Shapefile,
            },
        )?;
        Ok(Self {
            shp: shp::encode_shp(rows, bbox)?,
            shx: shp::encode_shx(rows.len(), bbox)?,
            dbf: DbfTable::plan(form, rows).encode(updated)?,
        })
    }

    /// Zip the layer files as `{stem}.shp`, `{stem}.shx`, `{stem}.dbf`,
    /// `{stem}.prj`, and `{stem}.cpg`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Zip`] or [`ExportError::Io`] if the archive
    /// cannot be written.
    pub fn into_zip(self, stem: &str) -> Result<Vec<u8>, ExportError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let members: [(&str, &[u8]); 5] = [
            ("shp", &self.shp),
            ("shx", &self.shx),
            ("dbf", &self.dbf),
            ("prj", WGS84_PRJ.as_bytes()),
            ("cpg", CODE_PAGE.as_bytes()),
        ];
        for (extension, bytes) in members {
            writer.start_file(format!("{stem}.{extension}"), options)?;
            writer
                .write_all(bytes)
                .map_err(ExportError::io("writing shapefile member"))?;
        }
        Ok(writer.finish()?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_rows;
    use chrono::Utc;
    use geosurvey_core::{FieldConfig, FieldMap, FieldType, Response, StorageType};
    use rstest::rstest;
    use std::io::Read;

    fn layer_form() -> Form {
        let fields = vec![FieldConfig::new("note", "Note", FieldType::Text)];
        Form::new(1, 1, "X", StorageType::Admin, "x", fields).expect("valid form")
    }

    #[rstest]
    fn empty_layer_is_rejected() {
        let form = layer_form();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        assert!(matches!(
            ShapefileBundle::encode(&form, &[], date),
            Err(ExportError::NoGeoValidRows { .. })
        ));
    }

    #[rstest]
    fn archive_holds_all_members() {
        let form = layer_form();
        let responses = [Response {
            unique_display_id: 1,
            data: FieldMap::new(),
            latitude: Some(1.0),
            longitude: Some(2.0),
            accuracy: None,
            created_at: Utc::now(),
        }];
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        let bundle = ShapefileBundle::encode(&form, &geo_rows(&responses), date).expect("bundle");
        let shp = bundle.shp.clone();
        let bytes = bundle.into_zip("X_2024-01-01").expect("zip");

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("archive");
        let mut names: Vec<String> = archive.file_names().map(str::to_owned).collect();
        names.sort();
        assert_eq!(
            names,
            [
                "X_2024-01-01.cpg",
                "X_2024-01-01.dbf",
                "X_2024-01-01.prj",
                "X_2024-01-01.shp",
                "X_2024-01-01.shx",
            ]
        );
        let mut member = archive.by_name("X_2024-01-01.shp").expect("shp member");
        let mut unpacked = Vec::new();
        member.read_to_end(&mut unpacked).expect("read");
        assert_eq!(unpacked, shp);
    }
}
