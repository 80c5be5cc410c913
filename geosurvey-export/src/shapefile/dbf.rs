//! dBASE III attribute table (`.dbf`).
//!
//! Layout:
//!
//! | offset     | size | value                                          |
//! |------------|------|------------------------------------------------|
//! | 0          | 1    | version `0x03`                                 |
//! | 1          | 3    | last update as `YY - 1900`, `MM`, `DD`         |
//! | 4          | 4    | record count, little endian                    |
//! | 8          | 2    | header length `32 + 32 * fields + 1`, LE       |
//! | 10         | 2    | record length `1 + sum(widths)`, LE            |
//! | 12         | 20   | reserved, zero                                 |
//! | 32         | 32n  | field descriptors                              |
//! | 32 + 32n   | 1    | header terminator `0x0D`                       |
//!
//! Each record starts with the deletion flag (space for live records)
//! followed by the fixed-width values. The file ends with `0x1A`.

use std::{collections::HashSet, num::TryFromIntError};

use chrono::{Datelike, NaiveDate, SecondsFormat};
use geosurvey_core::{FieldType, Form};

use crate::{ExportError, ExportFormat, GeoRow};

/// dBASE III without memo.
pub const DBF_VERSION: u8 = 0x03;
/// Byte closing the field descriptor array.
pub const HEADER_TERMINATOR: u8 = 0x0D;
/// Byte closing the file.
pub const END_OF_FILE: u8 = 0x1A;
/// Deletion flag of a live record.
pub const RECORD_LIVE: u8 = b' ';
/// Longest field name, excluding the NUL terminator.
pub const MAX_NAME_LEN: usize = 10;
/// Widest character field.
pub const MAX_CHAR_WIDTH: usize = 254;
/// Width of numeric survey fields.
pub const NUMERIC_WIDTH: u8 = 18;
/// Most decimal places kept for numeric survey fields.
pub const MAX_DECIMALS: u8 = 6;

const HEADER_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const ID_WIDTH: u8 = 10;
const CREATED_WIDTH: u8 = 20;

/// dBASE column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbfKind {
    /// `C`: left-aligned text.
    Character,
    /// `N`: right-aligned decimal text.
    Numeric,
}

impl DbfKind {
    const fn code(self) -> u8 {
        match self {
            Self::Character => b'C',
            Self::Numeric => b'N',
        }
    }
}

/// A column descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfField {
    /// Upper-case name of at most ten characters.
    pub name: String,
    /// Column type.
    pub kind: DbfKind,
    /// Width in bytes.
    pub width: u8,
    /// Decimal places for numeric columns.
    pub decimals: u8,
}

/// A fully planned attribute table: descriptors plus formatted cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfTable {
    fields: Vec<DbfField>,
    records: Vec<Vec<String>>,
}

/// Derive a unique dBASE name from `raw`.
fn unique_name(raw: &str, taken: &mut HashSet<String>) -> String {
    let base: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_uppercase())
        .take(MAX_NAME_LEN)
        .collect();
    let base = if base.is_empty() { "FIELD".to_owned() } else { base };
    let mut candidate = base.clone();
    let mut suffix = 2_usize;
    while taken.contains(&candidate) {
        let tail = format!("_{suffix}");
        let keep = MAX_NAME_LEN.saturating_sub(tail.len());
        candidate = format!("{}{tail}", &base[..base.len().min(keep)]);
        suffix += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

/// Longest prefix of `text` that fits in `width` bytes on a char boundary.
fn fit(text: &str, width: usize) -> &str {
    let mut end = text.len().min(width);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn decimals_of(text: &str) -> usize {
    text.split_once('.').map_or(0, |(_, frac)| frac.len())
}

/// Plan a numeric column when every non-blank value parses as a finite
/// number that fits the column; otherwise `None`.
fn numeric_cells(values: &[String]) -> Option<(u8, Vec<String>)> {
    let mut parsed = Vec::with_capacity(values.len());
    let mut decimals = 0_usize;
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            parsed.push(None);
            continue;
        }
        let number = trimmed.parse::<f64>().ok().filter(|n| n.is_finite())?;
        decimals = decimals.max(decimals_of(trimmed));
        parsed.push(Some(number));
    }
    let decimals = decimals.min(usize::from(MAX_DECIMALS));
    let cells: Vec<String> = parsed
        .into_iter()
        .map(|n| n.map(|n| format!("{n:.decimals$}")).unwrap_or_default())
        .collect();
    if cells.iter().any(|cell| cell.len() > usize::from(NUMERIC_WIDTH)) {
        return None;
    }
    let decimals = u8::try_from(decimals).ok()?;
    Some((decimals, cells))
}

/// `ID_WIDTH`, widened to the longest id so no digit is cut.
fn id_width(ids: &[String]) -> u8 {
    let widest = ids.iter().map(String::len).max().unwrap_or(0);
    // An i64 renders in at most 20 bytes.
    u8::try_from(widest).map_or(u8::MAX, |w| w.max(ID_WIDTH))
}

fn character_cells(values: &[String]) -> (u8, Vec<String>) {
    let cells: Vec<String> = values
        .iter()
        .map(|v| fit(v, MAX_CHAR_WIDTH).to_owned())
        .collect();
    let widest = cells.iter().map(String::len).max().unwrap_or(0).max(1);
    let width = u8::try_from(widest).unwrap_or(u8::MAX);
    (width, cells)
}

impl DbfTable {
    /// Plan the attribute table for `rows`.
    ///
    /// Columns are `ID`, at least ten digits wide, then one per form
    /// field, then `CREATED`. Number fields become `N(18, d)` when every
    /// value is numeric; everything else is `C` sized to its longest value.
    #[must_use]
    pub fn plan(form: &Form, rows: &[GeoRow<'_>]) -> Self {
        let mut taken: HashSet<String> = HashSet::new();
        let mut fields = Vec::with_capacity(form.fields.len() + 2);
        let mut columns: Vec<Vec<String>> = Vec::with_capacity(form.fields.len() + 2);

        let ids: Vec<String> = rows
            .iter()
            .map(|row| row.response.unique_display_id.to_string())
            .collect();
        fields.push(DbfField {
            name: unique_name("ID", &mut taken),
            kind: DbfKind::Numeric,
            width: id_width(&ids),
            decimals: 0,
        });
        columns.push(ids);

        for field in &form.fields {
            let values: Vec<String> = rows.iter().map(|row| row.response.text(&field.name)).collect();
            let name = unique_name(&field.name, &mut taken);
            let numeric = (field.field_type == FieldType::Number)
                .then(|| numeric_cells(&values))
                .flatten();
            let (descriptor, cells) = match numeric {
                Some((decimals, cells)) => (
                    DbfField {
                        name,
                        kind: DbfKind::Numeric,
                        width: NUMERIC_WIDTH,
                        decimals,
                    },
                    cells,
                ),
                None => {
                    let (width, cells) = character_cells(&values);
                    (
                        DbfField {
                            name,
                            kind: DbfKind::Character,
                            width,
                            decimals: 0,
                        },
                        cells,
                    )
                }
            };
            fields.push(descriptor);
            columns.push(cells);
        }

        fields.push(DbfField {
            name: unique_name("CREATED", &mut taken),
            kind: DbfKind::Character,
            width: CREATED_WIDTH,
            decimals: 0,
        });
        columns.push(
            rows.iter()
                .map(|row| {
                    row.response
                        .created_at
                        .to_rfc3339_opts(SecondsFormat::Secs, true)
                })
                .collect(),
        );

        let records = (0..rows.len())
            .map(|index| {
                columns
                    .iter()
                    .map(|column| column.get(index).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        Self { fields, records }
    }

    /// Column descriptors in file order.
    #[must_use]
    pub fn fields(&self) -> &[DbfField] {
        &self.fields
    }

    /// Encode the table, stamping `updated` as the last update date.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::TooLarge`] when counts or lengths overflow
    /// their header fields.
    pub fn encode(&self, updated: NaiveDate) -> Result<Vec<u8>, ExportError> {
        let record_count = u32::try_from(self.records.len()).map_err(too_large("record count"))?;
        let header_len = u16::try_from(HEADER_LEN + DESCRIPTOR_LEN * self.fields.len() + 1)
            .map_err(too_large("header length"))?;
        let record_len = u16::try_from(
            1 + self
                .fields
                .iter()
                .map(|field| usize::from(field.width))
                .sum::<usize>(),
        )
        .map_err(too_large("record length"))?;
        let year = u8::try_from(updated.year() - 1900).map_err(too_large("update year"))?;
        let month = u8::try_from(updated.month()).map_err(too_large("update month"))?;
        let day = u8::try_from(updated.day()).map_err(too_large("update day"))?;

        let mut out = Vec::with_capacity(
            usize::from(header_len) + self.records.len() * usize::from(record_len) + 1,
        );
        let mut header = [0_u8; HEADER_LEN];
        header[0] = DBF_VERSION;
        header[1..4].copy_from_slice(&[year, month, day]);
        header[4..8].copy_from_slice(&record_count.to_le_bytes());
        header[8..10].copy_from_slice(&header_len.to_le_bytes());
        header[10..12].copy_from_slice(&record_len.to_le_bytes());
        out.extend_from_slice(&header);

        for field in &self.fields {
            out.extend_from_slice(&descriptor(field));
        }
        out.push(HEADER_TERMINATOR);

        for record in &self.records {
            out.push(RECORD_LIVE);
            for (field, cell) in self.fields.iter().zip(record) {
                write_cell(&mut out, field, cell);
            }
        }
        out.push(END_OF_FILE);
        Ok(out)
    }
}

fn too_large(what: &'static str) -> impl FnOnce(TryFromIntError) -> ExportError {
    move |_| ExportError::TooLarge {
        format: ExportFormat::Shapefile,
        what,
    }
}

fn descriptor(field: &DbfField) -> [u8; DESCRIPTOR_LEN] {
    let mut raw = [0_u8; DESCRIPTOR_LEN];
    let name = field.name.as_bytes();
    let len = name.len().min(MAX_NAME_LEN);
    raw[..len].copy_from_slice(&name[..len]);
    raw[11] = field.kind.code();
    raw[16] = field.width;
    raw[17] = field.decimals;
    raw
}

fn write_cell(out: &mut Vec<u8>, field: &DbfField, cell: &str) {
    let width = usize::from(field.width);
    let value = fit(cell, width).as_bytes();
    let padding = std::iter::repeat_n(b' ', width - value.len());
    match field.kind {
        DbfKind::Character => {
            out.extend_from_slice(value);
            out.extend(padding);
        }
        DbfKind::Numeric => {
            out.extend(padding);
            out.extend_from_slice(value);
        }
    }
}
