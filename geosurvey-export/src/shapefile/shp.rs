//! Main (`.shp`) and index (`.shx`) files for point layers.
//!
//! Both files start with the same 100-byte header:
//!
//! | offset | size | endian | value                                 |
//! |--------|------|--------|---------------------------------------|
//! | 0      | 4    | big    | file code `9994`                      |
//! | 4      | 20   |        | unused, zero                          |
//! | 24     | 4    | big    | file length in 16-bit words           |
//! | 28     | 4    | little | version `1000`                        |
//! | 32     | 4    | little | shape type (`1` = point)              |
//! | 36     | 32   | little | `xmin`, `ymin`, `xmax`, `ymax`        |
//! | 68     | 32   | little | Z and M ranges, zero for 2D points    |
//!
//! Each `.shp` record is an 8-byte big-endian header (1-based record
//! number, content length in words) followed by the little-endian point
//! content (shape type, x, y). Each `.shx` entry is the big-endian record
//! offset and content length, both in words.

use crate::{BoundingBox, ExportError, ExportFormat, GeoRow};

/// Magic number opening every main and index file.
pub const FILE_CODE: i32 = 9994;
/// Shapefile format version.
pub const VERSION: i32 = 1000;
/// Shape type code for 2D points.
pub const SHAPE_TYPE_POINT: i32 = 1;
/// Header length in bytes.
pub const HEADER_LEN: usize = 100;
/// Point record content length in bytes: shape type plus two doubles.
pub const POINT_CONTENT_LEN: usize = 20;
/// Record header length in bytes.
pub const RECORD_HEADER_LEN: usize = 8;
/// Index entry length in bytes.
pub const INDEX_ENTRY_LEN: usize = 8;

const POINT_RECORD_LEN: usize = RECORD_HEADER_LEN + POINT_CONTENT_LEN;
const POINT_CONTENT_WORDS: i32 = 10;

mod offset {
    pub const FILE_CODE: usize = 0;
    pub const FILE_LENGTH: usize = 24;
    pub const VERSION: usize = 28;
    pub const SHAPE_TYPE: usize = 32;
    pub const X_MIN: usize = 36;
    pub const Y_MIN: usize = 44;
    pub const X_MAX: usize = 52;
    pub const Y_MAX: usize = 60;
}

fn words(bytes: usize, what: &'static str) -> Result<i32, ExportError> {
    i32::try_from(bytes / 2).map_err(|_| ExportError::TooLarge {
        format: ExportFormat::Shapefile,
        what,
    })
}

/// Encode the shared 100-byte header for a file of `file_len` bytes.
///
/// # Errors
///
/// Returns [`ExportError::TooLarge`] when the length overflows the
/// 32-bit word count.
pub fn encode_header(file_len: usize, bbox: BoundingBox) -> Result<[u8; HEADER_LEN], ExportError> {
    let mut header = [0_u8; HEADER_LEN];
    let mut put = |at: usize, bytes: &[u8]| header[at..at + bytes.len()].copy_from_slice(bytes);
    put(offset::FILE_CODE, &FILE_CODE.to_be_bytes());
    put(offset::FILE_LENGTH, &words(file_len, "file length")?.to_be_bytes());
    put(offset::VERSION, &VERSION.to_le_bytes());
    put(offset::SHAPE_TYPE, &SHAPE_TYPE_POINT.to_le_bytes());
    put(offset::X_MIN, &bbox.min_x().to_le_bytes());
    put(offset::Y_MIN, &bbox.min_y().to_le_bytes());
    put(offset::X_MAX, &bbox.max_x().to_le_bytes());
    put(offset::Y_MAX, &bbox.max_y().to_le_bytes());
    Ok(header)
}

fn point_record(record_number: i32, row: &GeoRow<'_>) -> [u8; POINT_RECORD_LEN] {
    let mut record = [0_u8; POINT_RECORD_LEN];
    record[0..4].copy_from_slice(&record_number.to_be_bytes());
    record[4..8].copy_from_slice(&POINT_CONTENT_WORDS.to_be_bytes());
    record[8..12].copy_from_slice(&SHAPE_TYPE_POINT.to_le_bytes());
    record[12..20].copy_from_slice(&row.point.x().to_le_bytes());
    record[20..28].copy_from_slice(&row.point.y().to_le_bytes());
    record
}

/// Encode the `.shp` main file.
///
/// # Errors
///
/// Returns [`ExportError::TooLarge`] when the file or record numbering
/// overflows 32 bits.
pub fn encode_shp(rows: &[GeoRow<'_>], bbox: BoundingBox) -> Result<Vec<u8>, ExportError> {
    let file_len = HEADER_LEN + rows.len() * POINT_RECORD_LEN;
    let mut out = Vec::with_capacity(file_len);
    out.extend_from_slice(&encode_header(file_len, bbox)?);
    for (index, row) in rows.iter().enumerate() {
        let number = i32::try_from(index + 1).map_err(|_| ExportError::TooLarge {
            format: ExportFormat::Shapefile,
            what: "record number",
        })?;
        out.extend_from_slice(&point_record(number, row));
    }
    Ok(out)
}

/// Encode the `.shx` index for `count` point records.
///
/// # Errors
///
/// Returns [`ExportError::TooLarge`] when an offset overflows 32 bits.
pub fn encode_shx(count: usize, bbox: BoundingBox) -> Result<Vec<u8>, ExportError> {
    let file_len = HEADER_LEN + count * INDEX_ENTRY_LEN;
    let mut out = Vec::with_capacity(file_len);
    out.extend_from_slice(&encode_header(file_len, bbox)?);
    for index in 0..count {
        let offset = words(HEADER_LEN + index * POINT_RECORD_LEN, "record offset")?;
        out.extend_from_slice(&offset.to_be_bytes());
        out.extend_from_slice(&POINT_CONTENT_WORDS.to_be_bytes());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_rows;
    use chrono::Utc;
    use geosurvey_core::{FieldMap, Response};
    use rstest::{fixture, rstest};

    fn be_i32(bytes: &[u8], at: usize) -> i32 {
        i32::from_be_bytes(bytes[at..at + 4].try_into().expect("4 bytes"))
    }

    fn le_i32(bytes: &[u8], at: usize) -> i32 {
        i32::from_le_bytes(bytes[at..at + 4].try_into().expect("4 bytes"))
    }

    fn le_f64(bytes: &[u8], at: usize) -> f64 {
        f64::from_le_bytes(bytes[at..at + 8].try_into().expect("8 bytes"))
    }

    #[fixture]
    fn responses() -> Vec<Response> {
        [(40.0, -3.0), (41.0, 2.0)]
            .into_iter()
            .enumerate()
            .map(|(i, (lat, lon))| Response {
                unique_display_id: i as i64 + 1,
                data: FieldMap::new(),
                latitude: Some(lat),
                longitude: Some(lon),
                accuracy: None,
                created_at: Utc::now(),
            })
            .collect()
    }

    #[rstest]
    fn shp_header_and_records(responses: Vec<Response>) {
        let rows = geo_rows(&responses);
        let bbox = BoundingBox::from_points(rows.iter().map(|r| r.point)).expect("bbox");
        let shp = encode_shp(&rows, bbox).expect("shp");

        assert_eq!(shp.len(), 100 + 2 * 28);
        assert_eq!(be_i32(&shp, 0), 9994);
        assert_eq!(be_i32(&shp, 24), (shp.len() / 2) as i32);
        assert_eq!(le_i32(&shp, 28), 1000);
        assert_eq!(le_i32(&shp, 32), 1);
        assert_eq!(
            (le_f64(&shp, 36), le_f64(&shp, 44), le_f64(&shp, 52), le_f64(&shp, 60)),
            (-3.0, 40.0, 2.0, 41.0)
        );

        assert_eq!(be_i32(&shp, 100), 1);
        assert_eq!(be_i32(&shp, 104), 10);
        assert_eq!(le_i32(&shp, 108), 1);
        assert_eq!((le_f64(&shp, 112), le_f64(&shp, 120)), (-3.0, 40.0));
        assert_eq!(be_i32(&shp, 128), 2);
    }

    #[rstest]
    fn shx_offsets_step_by_record_size(responses: Vec<Response>) {
        let rows = geo_rows(&responses);
        let bbox = BoundingBox::from_points(rows.iter().map(|r| r.point)).expect("bbox");
        let shx = encode_shx(rows.len(), bbox).expect("shx");

        assert_eq!(shx.len(), 100 + 2 * 8);
        assert_eq!(be_i32(&shx, 24), (shx.len() / 2) as i32);
        assert_eq!((be_i32(&shx, 100), be_i32(&shx, 104)), (50, 10));
        assert_eq!((be_i32(&shx, 108), be_i32(&shx, 112)), (64, 10));
    }
}
