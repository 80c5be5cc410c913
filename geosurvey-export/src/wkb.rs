//! Well-known binary points and GeoPackage geometry blobs.
//!
//! A WKB point is 21 bytes:
//!
//! | offset | size | value                              |
//! |--------|------|------------------------------------|
//! | 0      | 1    | byte order (`1` = little endian)   |
//! | 1      | 4    | geometry type (`1` = point)        |
//! | 5      | 8    | x (longitude), IEEE-754 double     |
//! | 13     | 8    | y (latitude), IEEE-754 double      |
//!
//! GeoPackage prefixes the WKB with an 8-byte header: the magic `GP`, a
//! version byte (`0`), a flags byte, and the little-endian `srs_id`. The
//! flags used here mark little-endian encoding with no envelope.

use geo::Point;
use thiserror::Error;

/// Byte-order flag for big-endian (XDR) encoding.
pub const WKB_BIG_ENDIAN: u8 = 0;
/// Byte-order flag for little-endian (NDR) encoding.
pub const WKB_LITTLE_ENDIAN: u8 = 1;
/// WKB geometry type code for a 2D point.
pub const WKB_POINT: u32 = 1;
/// Encoded length of a 2D WKB point.
pub const WKB_POINT_LEN: usize = 21;
/// GeoPackage geometry blob magic.
pub const GPKG_MAGIC: [u8; 2] = *b"GP";
/// GeoPackage geometry blob format version.
pub const GPKG_VERSION: u8 = 0;
/// Flags: little-endian header values, no envelope, non-empty, standard.
pub const GPKG_FLAGS_LE_NO_ENVELOPE: u8 = 0b0000_0001;
/// Length of a GeoPackage header without an envelope.
pub const GPKG_HEADER_LEN: usize = 8;

/// Errors raised while decoding WKB or GeoPackage blobs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WkbError {
    /// Input ended before the geometry did.
    #[error("expected at least {expected} bytes, found {found}")]
    Truncated {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        found: usize,
    },
    /// The byte-order flag was neither `0` nor `1`.
    #[error("unknown byte order flag {0}")]
    UnknownByteOrder(u8),
    /// The geometry was not a 2D point.
    #[error("unsupported geometry type {0}")]
    UnsupportedGeometry(u32),
    /// The blob did not start with `GP`.
    #[error("missing GeoPackage magic")]
    BadMagic,
    /// The GeoPackage header declared an envelope or an extended type.
    #[error("unsupported GeoPackage header flags {0:#010b}")]
    UnsupportedFlags(u8),
}

/// Encode `point` as a little-endian WKB point.
///
/// # Examples
///
/// ```
/// use geo::Point;
/// use geosurvey_export::wkb::{decode_point, encode_point};
///
/// let bytes = encode_point(Point::new(-3.7, 40.4));
/// assert_eq!(bytes.len(), 21);
/// assert_eq!(decode_point(&bytes), Ok(Point::new(-3.7, 40.4)));
/// ```
#[must_use]
pub fn encode_point(point: Point<f64>) -> [u8; WKB_POINT_LEN] {
    let mut out = [0_u8; WKB_POINT_LEN];
    out[0] = WKB_LITTLE_ENDIAN;
    out[1..5].copy_from_slice(&WKB_POINT.to_le_bytes());
    out[5..13].copy_from_slice(&point.x().to_le_bytes());
    out[13..21].copy_from_slice(&point.y().to_le_bytes());
    out
}

/// Decode a 2D WKB point in either byte order.
///
/// # Errors
///
/// Returns [`WkbError`] when the input is truncated, uses an unknown byte
/// order, or holds anything other than a point.
pub fn decode_point(bytes: &[u8]) -> Result<Point<f64>, WkbError> {
    let raw: &[u8; WKB_POINT_LEN] = bytes
        .get(..WKB_POINT_LEN)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(WkbError::Truncated {
            expected: WKB_POINT_LEN,
            found: bytes.len(),
        })?;
    let little = match raw[0] {
        WKB_LITTLE_ENDIAN => true,
        WKB_BIG_ENDIAN => false,
        other => return Err(WkbError::UnknownByteOrder(other)),
    };
    let word = |at: usize| -> [u8; 4] { [raw[at], raw[at + 1], raw[at + 2], raw[at + 3]] };
    let double = |at: usize| -> [u8; 8] {
        let mut buf = [0_u8; 8];
        buf.copy_from_slice(&raw[at..at + 8]);
        buf
    };
    let (kind, x, y) = if little {
        (
            u32::from_le_bytes(word(1)),
            f64::from_le_bytes(double(5)),
            f64::from_le_bytes(double(13)),
        )
    } else {
        (
            u32::from_be_bytes(word(1)),
            f64::from_be_bytes(double(5)),
            f64::from_be_bytes(double(13)),
        )
    };
    if kind != WKB_POINT {
        return Err(WkbError::UnsupportedGeometry(kind));
    }
    Ok(Point::new(x, y))
}

/// Encode `point` as a GeoPackage geometry blob tagged with `srs_id`.
#[must_use]
pub fn encode_gpkg_point(point: Point<f64>, srs_id: i32) -> Vec<u8> {
    let mut blob = Vec::with_capacity(GPKG_HEADER_LEN + WKB_POINT_LEN);
    blob.extend_from_slice(&GPKG_MAGIC);
    blob.push(GPKG_VERSION);
    blob.push(GPKG_FLAGS_LE_NO_ENVELOPE);
    blob.extend_from_slice(&srs_id.to_le_bytes());
    blob.extend_from_slice(&encode_point(point));
    blob
}

/// Decode a GeoPackage point blob written without an envelope.
///
/// Returns the `srs_id` and the point.
///
/// # Errors
///
/// Returns [`WkbError`] for a missing magic, unsupported flags, or a
/// malformed WKB body.
pub fn decode_gpkg_point(blob: &[u8]) -> Result<(i32, Point<f64>), WkbError> {
    let header: &[u8; GPKG_HEADER_LEN] = blob
        .get(..GPKG_HEADER_LEN)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(WkbError::Truncated {
            expected: GPKG_HEADER_LEN + WKB_POINT_LEN,
            found: blob.len(),
        })?;
    if header[..2] != GPKG_MAGIC {
        return Err(WkbError::BadMagic);
    }
    let flags = header[3];
    // Envelope bits 1..=3 and the extended-type bit 5 must be clear.
    if flags & 0b0010_1110 != 0 {
        return Err(WkbError::UnsupportedFlags(flags));
    }
    let srs_bytes = [header[4], header[5], header[6], header[7]];
    let srs_id = if flags & 1 == 1 {
        i32::from_le_bytes(srs_bytes)
    } else {
        i32::from_be_bytes(srs_bytes)
    };
    let point = decode_point(&blob[GPKG_HEADER_LEN..])?;
    Ok((srs_id, point))
}
