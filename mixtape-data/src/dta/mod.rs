//! Stata `.dta` codec
//!
//! Reads releases 113-115 (fixed binary header) and 117-119 (tagged layout)
//! in either byte order, and writes release 118 little-endian.
//!
//! Stata's extended missing values (`.`, `.a` .. `.z`) all map to `None`.
//! Columns with a `%td` display format become dates and `%tc`/`%tC` become
//! timestamps; all other formats keep their numeric storage type.

mod cursor;
mod legacy;
mod tagged;
mod writer;

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::table::{Column, ColumnData, Table, TableError, ValueLabels};
use cursor::Cursor;

/// Errors from reading or writing `.dta` data
#[derive(Debug, Error)]
pub enum DtaError {
    #[error("Unsupported .dta release: {0}")]
    UnsupportedRelease(u16),

    #[error("Unexpected end of data at byte {offset} ({needed} more bytes needed)")]
    Truncated { offset: usize, needed: usize },

    #[error("Expected {expected} at byte {offset}")]
    MissingTag {
        expected: &'static str,
        offset: usize,
    },

    #[error("Invalid byte order marker: {0}")]
    ByteOrder(String),

    #[error("Unknown type code {code} for variable {index}")]
    UnknownType { code: u16, index: usize },

    #[error("strL reference ({v}, {o}) not found")]
    MissingStrl { v: u64, o: u64 },

    #[error("Value {value} in column '{column}' does not fit Stata type {stata_type}")]
    OutOfRange {
        column: String,
        value: String,
        stata_type: &'static str,
    },

    #[error("String in column '{column}' is {len} bytes (max {max})")]
    StringTooLong {
        column: String,
        len: usize,
        max: usize,
    },

    #[error("Too many columns for a .dta file: {0}")]
    TooManyColumns(usize),

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Parse `.dta` bytes into a table
pub fn from_bytes(bytes: &[u8]) -> Result<Table, DtaError> {
    if bytes.starts_with(b"<stata_dta>") {
        return tagged::read(bytes);
    }
    match bytes.first() {
        Some(&release) if (113..=115).contains(&release) => legacy::read(bytes, release),
        Some(&release) => Err(DtaError::UnsupportedRelease(release.into())),
        None => Err(DtaError::Truncated {
            offset: 0,
            needed: 1,
        }),
    }
}

/// Serialize a table as a release 118 `.dta` file
pub fn to_bytes(table: &Table) -> Result<Vec<u8>, DtaError> {
    writer::write(table)
}

// ============================================================================
// Storage types and missing values
// ============================================================================

/// Largest `str#` width in the tagged releases
pub(crate) const MAX_STR_WIDTH: usize = 2045;

/// Largest non-missing value per integer type; anything above is missing
pub(crate) const BYTE_MAX: i8 = 100;
pub(crate) const INT_MAX: i16 = 32_740;
pub(crate) const LONG_MAX: i32 = 2_147_483_620;

/// Smallest valid value per integer type
pub(crate) const BYTE_MIN: i8 = -127;
pub(crate) const INT_MIN: i16 = -32_767;
pub(crate) const LONG_MIN: i32 = -2_147_483_647;

/// `.` for floats (2^127) and doubles (2^1023)
pub(crate) const FLOAT_MISSING_BITS: u32 = 0x7f00_0000;
pub(crate) const DOUBLE_MISSING_BITS: u64 = 0x7fe0_0000_0000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VarType {
    Byte,
    Int,
    Long,
    Float,
    Double,
    Str(usize),
    StrL,
}

impl VarType {
    /// Bytes one cell occupies in the data section
    pub fn width(self) -> usize {
        match self {
            VarType::Byte => 1,
            VarType::Int => 2,
            VarType::Long | VarType::Float => 4,
            VarType::Double | VarType::StrL => 8,
            VarType::Str(n) => n,
        }
    }
}

fn float_value(v: f32) -> Option<f32> {
    (!v.is_nan() && v < f32::from_bits(FLOAT_MISSING_BITS)).then_some(v)
}

fn double_value(v: f64) -> Option<f64> {
    (!v.is_nan() && v < f64::from_bits(DOUBLE_MISSING_BITS)).then_some(v)
}

// ============================================================================
// Shared reader pieces
// ============================================================================

/// Variable descriptor assembled from the header sections
#[derive(Debug, Clone)]
pub(crate) struct Variable {
    pub name: String,
    pub vtype: VarType,
    pub format: String,
    pub value_labels: String,
    pub label: String,
}

/// Text stored in a fixed-width field: cut at the first NUL.
/// Releases before 118 are latin-1; 118 and later are UTF-8.
pub(crate) fn decode_text(bytes: &[u8], utf8: bool) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let bytes = &bytes[..end];
    if utf8 {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        bytes.iter().map(|&b| char::from(b)).collect()
    }
}

pub(crate) fn read_text(c: &mut Cursor<'_>, width: usize, utf8: bool) -> Result<String, DtaError> {
    Ok(decode_text(c.take(width)?, utf8))
}

/// Per-column accumulator while reading the data section
pub(crate) enum Builder {
    Byte(Vec<Option<i8>>),
    Int(Vec<Option<i16>>),
    Long(Vec<Option<i32>>),
    Float(Vec<Option<f32>>),
    Double(Vec<Option<f64>>),
    Str(Vec<String>),
    StrL(Vec<(u64, u64)>),
}

impl Builder {
    fn for_type(vtype: VarType, rows: usize) -> Self {
        match vtype {
            VarType::Byte => Builder::Byte(Vec::with_capacity(rows)),
            VarType::Int => Builder::Int(Vec::with_capacity(rows)),
            VarType::Long => Builder::Long(Vec::with_capacity(rows)),
            VarType::Float => Builder::Float(Vec::with_capacity(rows)),
            VarType::Double => Builder::Double(Vec::with_capacity(rows)),
            VarType::Str(_) => Builder::Str(Vec::with_capacity(rows)),
            VarType::StrL => Builder::StrL(Vec::with_capacity(rows)),
        }
    }
}

/// How a strL cell reference is laid out in the data section
#[derive(Debug, Clone, Copy)]
pub(crate) struct StrlLayout {
    pub v_width: usize,
    pub o_width: usize,
}

/// Read `nobs` rows of the data section, row-major
pub(crate) fn read_data(
    c: &mut Cursor<'_>,
    vars: &[Variable],
    nobs: usize,
    utf8: bool,
    strl: Option<StrlLayout>,
) -> Result<Vec<Builder>, DtaError> {
    let row_width: usize = vars.iter().map(|v| v.vtype.width()).sum();
    let needed = row_width.saturating_mul(nobs);
    if needed > c.remaining() {
        return Err(DtaError::Truncated {
            offset: c.position(),
            needed: needed - c.remaining(),
        });
    }

    let mut builders: Vec<Builder> = vars.iter().map(|v| Builder::for_type(v.vtype, nobs)).collect();

    for _ in 0..nobs {
        for (var, builder) in vars.iter().zip(builders.iter_mut()) {
            match builder {
                Builder::Byte(v) => {
                    let x = c.i8()?;
                    v.push((x <= BYTE_MAX).then_some(x));
                }
                Builder::Int(v) => {
                    let x = c.i16()?;
                    v.push((x <= INT_MAX).then_some(x));
                }
                Builder::Long(v) => {
                    let x = c.i32()?;
                    v.push((x <= LONG_MAX).then_some(x));
                }
                Builder::Float(v) => v.push(float_value(c.f32()?)),
                Builder::Double(v) => v.push(double_value(c.f64()?)),
                Builder::Str(v) => v.push(read_text(c, var.vtype.width(), utf8)?),
                Builder::StrL(v) => {
                    // Only the tagged releases declare strL variables
                    let layout = strl.unwrap_or(StrlLayout { v_width: 4, o_width: 4 });
                    let vv = c.uint(layout.v_width)?;
                    let oo = c.uint(layout.o_width)?;
                    v.push((vv, oo));
                }
            }
        }
    }

    Ok(builders)
}

/// Body of one value-label table (shared by all supported releases)
pub(crate) fn read_value_label_table(
    c: &mut Cursor<'_>,
    len: usize,
    utf8: bool,
) -> Result<ValueLabels, DtaError> {
    let body = c.take(len)?;
    let mut t = Cursor::new(body);
    t.set_order(c.order());

    let n = t.u32()? as usize;
    let txtlen = t.u32()? as usize;
    if n.saturating_mul(8) > t.remaining() {
        return Err(DtaError::Truncated {
            offset: c.position(),
            needed: n.saturating_mul(8) - t.remaining(),
        });
    }
    let offsets = (0..n).map(|_| t.u32()).collect::<Result<Vec<_>, _>>()?;
    let values = (0..n).map(|_| t.i32()).collect::<Result<Vec<_>, _>>()?;
    let text = t.take(txtlen)?;

    let mut labels = ValueLabels::new();
    for (off, value) in offsets.into_iter().zip(values) {
        let start = (off as usize).min(text.len());
        labels.insert(value, decode_text(&text[start..], utf8));
    }
    Ok(labels)
}

/// Turn the accumulated pieces into a [`Table`]
pub(crate) fn assemble(
    nobs: usize,
    data_label: String,
    vars: Vec<Variable>,
    builders: Vec<Builder>,
    strls: &HashMap<(u64, u64), String>,
    value_labels: BTreeMap<String, ValueLabels>,
) -> Result<Table, DtaError> {
    let columns = vars
        .into_iter()
        .zip(builders)
        .map(|(var, builder)| {
            let data = finish(builder, &var.format, strls)?;
            let mut column = Column::new(var.name, data)
                .with_label(var.label)
                .with_format(var.format);
            if !var.value_labels.is_empty() {
                column = column.with_value_labels(var.value_labels);
            }
            Ok(column)
        })
        .collect::<Result<Vec<_>, DtaError>>()?;

    let mut table = Table::with_rows(nobs, columns)?.with_label(data_label);
    for (name, labels) in value_labels {
        table = table.with_value_labels(name, labels);
    }
    Ok(table)
}

fn finish(
    builder: Builder,
    format: &str,
    strls: &HashMap<(u64, u64), String>,
) -> Result<ColumnData, DtaError> {
    let kind = DateKind::from_format(format);

    let data = match builder {
        Builder::Str(v) => return Ok(ColumnData::Str(v)),
        Builder::StrL(refs) => {
            let v = refs
                .into_iter()
                .map(|(v, o)| match (v, o) {
                    (0, 0) => Ok(String::new()),
                    key => strls
                        .get(&key)
                        .cloned()
                        .ok_or(DtaError::MissingStrl { v, o }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ColumnData::Str(v));
        }
        Builder::Byte(v) if kind.is_none() => ColumnData::Int8(v),
        Builder::Int(v) if kind.is_none() => ColumnData::Int16(v),
        Builder::Long(v) if kind.is_none() => ColumnData::Int32(v),
        Builder::Float(v) if kind.is_none() => ColumnData::Float32(v),
        Builder::Double(v) if kind.is_none() => ColumnData::Float64(v),
        numeric => {
            let values = as_f64(numeric);
            return Ok(match kind {
                Some(DateKind::Date) => {
                    ColumnData::Date(values.into_iter().map(|x| x.and_then(days_to_date)).collect())
                }
                _ => ColumnData::DateTime(
                    values.into_iter().map(|x| x.and_then(millis_to_datetime)).collect(),
                ),
            });
        }
    };
    Ok(data)
}

fn as_f64(builder: Builder) -> Vec<Option<f64>> {
    match builder {
        Builder::Byte(v) => v.into_iter().map(|x| x.map(f64::from)).collect(),
        Builder::Int(v) => v.into_iter().map(|x| x.map(f64::from)).collect(),
        Builder::Long(v) => v.into_iter().map(|x| x.map(f64::from)).collect(),
        Builder::Float(v) => v.into_iter().map(|x| x.map(f64::from)).collect(),
        Builder::Double(v) => v,
        Builder::Str(_) | Builder::StrL(_) => Vec::new(),
    }
}

// ============================================================================
// Dates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DateKind {
    Date,
    DateTime,
}

impl DateKind {
    /// Only daily and millisecond formats are converted; `%tw`, `%tm`, `%tq`,
    /// `%th` and `%ty` columns stay numeric.
    pub fn from_format(format: &str) -> Option<Self> {
        let f = format.trim_start_matches('%').trim_start_matches('-');
        if f.starts_with("td") || f.starts_with('d') {
            Some(DateKind::Date)
        } else if f.starts_with("tc") || f.starts_with("tC") {
            Some(DateKind::DateTime)
        } else {
            None
        }
    }
}

pub(crate) fn stata_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1960, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn days_to_date(days: f64) -> Option<NaiveDate> {
    if !days.is_finite() {
        return None;
    }
    let days = Duration::try_days(days.floor() as i64)?;
    stata_epoch().date().checked_add_signed(days)
}

fn millis_to_datetime(ms: f64) -> Option<NaiveDateTime> {
    if !ms.is_finite() {
        return None;
    }
    let ms = Duration::try_milliseconds(ms.round() as i64)?;
    stata_epoch().checked_add_signed(ms)
}

pub(crate) fn date_to_days(date: NaiveDate) -> f64 {
    (date - stata_epoch().date()).num_days() as f64
}

pub(crate) fn datetime_to_millis(ts: NaiveDateTime) -> f64 {
    (ts - stata_epoch()).num_milliseconds() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_release() {
        let err = from_bytes(&[110, 2, 1, 0]).unwrap_err();
        assert!(matches!(err, DtaError::UnsupportedRelease(110)));
    }

    #[test]
    fn test_rejects_empty_input() {
        assert!(matches!(
            from_bytes(&[]).unwrap_err(),
            DtaError::Truncated { offset: 0, .. }
        ));
    }

    #[test]
    fn test_rejects_html() {
        let err = from_bytes(b"<!DOCTYPE html><html>Not Found</html>").unwrap_err();
        assert!(matches!(err, DtaError::UnsupportedRelease(60)));
    }

    #[test]
    fn test_missing_thresholds() {
        assert_eq!(float_value(1.5), Some(1.5));
        assert_eq!(float_value(f32::from_bits(FLOAT_MISSING_BITS)), None);
        assert_eq!(float_value(f32::from_bits(FLOAT_MISSING_BITS + 3)), None);
        assert_eq!(double_value(-8.9e307), Some(-8.9e307));
        assert_eq!(double_value(f64::from_bits(DOUBLE_MISSING_BITS)), None);
        assert_eq!(double_value(f64::NAN), None);
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(DateKind::from_format("%td"), Some(DateKind::Date));
        assert_eq!(DateKind::from_format("%tdCCYY-NN-DD"), Some(DateKind::Date));
        assert_eq!(DateKind::from_format("%-td"), Some(DateKind::Date));
        assert_eq!(DateKind::from_format("%d"), Some(DateKind::Date));
        assert_eq!(DateKind::from_format("%tc"), Some(DateKind::DateTime));
        assert_eq!(DateKind::from_format("%tC"), Some(DateKind::DateTime));
        assert_eq!(DateKind::from_format("%9.0g"), None);
        for periodic in ["%tw", "%tm", "%tq", "%th", "%ty"] {
            assert_eq!(DateKind::from_format(periodic), None, "{periodic}");
        }
        assert_eq!(DateKind::from_format("%10s"), None);
    }

    #[test]
    fn test_date_conversion() {
        assert_eq!(days_to_date(0.0), NaiveDate::from_ymd_opt(1960, 1, 1));
        assert_eq!(days_to_date(366.0), NaiveDate::from_ymd_opt(1961, 1, 1));
        assert_eq!(days_to_date(-1.0), NaiveDate::from_ymd_opt(1959, 12, 31));

        let ts = millis_to_datetime(86_400_000.0 + 1_500.0).unwrap();
        assert_eq!(
            ts,
            NaiveDate::from_ymd_opt(1960, 1, 2)
                .unwrap()
                .and_hms_milli_opt(0, 0, 1, 500)
                .unwrap()
        );
        assert_eq!(datetime_to_millis(ts), 86_401_500.0);
    }

    #[test]
    fn test_decode_text() {
        assert_eq!(decode_text(b"abc\0garbage", true), "abc");
        assert_eq!(decode_text(&[0x53, 0xe3, 0x6f], false), "S\u{e3}o");
    }
}
