//! Release 118 writer (little-endian, `str#` strings only)

use super::{
    date_to_days, datetime_to_millis, DateKind, DtaError, BYTE_MAX, BYTE_MIN, DOUBLE_MISSING_BITS,
    FLOAT_MISSING_BITS, INT_MAX, INT_MIN, LONG_MAX, LONG_MIN, MAX_STR_WIDTH,
};
use crate::table::{Column, ColumnData, Table, ValueLabels};

const NAME_LEN: usize = 129;
const FORMAT_LEN: usize = 57;
const VAR_LABEL_LEN: usize = 321;
const DATA_LABEL_MAX: usize = 80;

/// Storage type chosen for a column
enum Storage {
    Byte,
    Int,
    Long,
    Float,
    Double,
    Str(usize),
}

impl Storage {
    fn code(&self) -> u16 {
        match self {
            Storage::Byte => 65530,
            Storage::Int => 65529,
            Storage::Long => 65528,
            Storage::Float => 65527,
            Storage::Double => 65526,
            Storage::Str(width) => *width as u16,
        }
    }
}

fn storage(column: &Column) -> Result<Storage, DtaError> {
    Ok(match &column.data {
        ColumnData::Int8(v) => {
            check_range(&column.name, v, BYTE_MIN, BYTE_MAX, "byte")?;
            Storage::Byte
        }
        ColumnData::Int16(v) => {
            check_range(&column.name, v, INT_MIN, INT_MAX, "int")?;
            Storage::Int
        }
        ColumnData::Int32(v) => {
            check_range(&column.name, v, LONG_MIN, LONG_MAX, "long")?;
            Storage::Long
        }
        ColumnData::Float32(_) => Storage::Float,
        ColumnData::Float64(_) | ColumnData::Date(_) | ColumnData::DateTime(_) => Storage::Double,
        ColumnData::Str(v) => {
            let width = v.iter().map(String::len).max().unwrap_or(0).max(1);
            if width > MAX_STR_WIDTH {
                return Err(DtaError::StringTooLong {
                    column: column.name.clone(),
                    len: width,
                    max: MAX_STR_WIDTH,
                });
            }
            Storage::Str(width)
        }
    })
}

fn check_range<T: PartialOrd + Copy + ToString>(
    column: &str,
    values: &[Option<T>],
    min: T,
    max: T,
    stata_type: &'static str,
) -> Result<(), DtaError> {
    match values.iter().flatten().find(|&&x| x < min || x > max) {
        Some(x) => Err(DtaError::OutOfRange {
            column: column.to_string(),
            value: x.to_string(),
            stata_type,
        }),
        None => Ok(()),
    }
}

/// Display format written for a column; date columns always carry a date format
fn format_for(column: &Column) -> &str {
    match column.data {
        ColumnData::Date(_) if DateKind::from_format(&column.format) != Some(DateKind::Date) => "%td",
        ColumnData::DateTime(_) if DateKind::from_format(&column.format) != Some(DateKind::DateTime) => "%tc",
        _ => &column.format,
    }
}

pub(crate) fn write(table: &Table) -> Result<Vec<u8>, DtaError> {
    let columns = table.columns();
    let nvar = u16::try_from(columns.len()).map_err(|_| DtaError::TooManyColumns(columns.len()))?;
    let storages = columns.iter().map(storage).collect::<Result<Vec<_>, _>>()?;

    let mut w = Writer::default();
    let mut map = [0u64; 14];

    w.tag("<stata_dta>");
    w.tag("<header>");
    w.tag("<release>118</release>");
    w.tag("<byteorder>LSF</byteorder>");
    w.tag("<K>");
    w.u16(nvar);
    w.tag("</K>");
    w.tag("<N>");
    w.u64(table.nrows() as u64);
    w.tag("</N>");
    w.tag("<label>");
    let label = truncate(table.label(), DATA_LABEL_MAX);
    w.u16(label.len() as u16);
    w.bytes(label.as_bytes());
    w.tag("</label>");
    w.tag("<timestamp>");
    w.u8(0);
    w.tag("</timestamp>");
    w.tag("</header>");

    map[1] = w.pos();
    w.tag("<map>");
    let map_at = w.pos();
    w.bytes(&[0u8; 14 * 8]);
    w.tag("</map>");

    map[2] = w.pos();
    w.tag("<variable_types>");
    for s in &storages {
        w.u16(s.code());
    }
    w.tag("</variable_types>");

    map[3] = w.pos();
    w.tag("<varnames>");
    for column in columns {
        w.fixed(&column.name, NAME_LEN);
    }
    w.tag("</varnames>");

    map[4] = w.pos();
    w.tag("<sortlist>");
    w.bytes(&vec![0u8; (columns.len() + 1) * 2]);
    w.tag("</sortlist>");

    map[5] = w.pos();
    w.tag("<formats>");
    for column in columns {
        w.fixed(format_for(column), FORMAT_LEN);
    }
    w.tag("</formats>");

    map[6] = w.pos();
    w.tag("<value_label_names>");
    for column in columns {
        w.fixed(column.value_labels.as_deref().unwrap_or(""), NAME_LEN);
    }
    w.tag("</value_label_names>");

    map[7] = w.pos();
    w.tag("<variable_labels>");
    for column in columns {
        w.fixed(&column.label, VAR_LABEL_LEN);
    }
    w.tag("</variable_labels>");

    map[8] = w.pos();
    w.tag("<characteristics></characteristics>");

    map[9] = w.pos();
    w.tag("<data>");
    for row in 0..table.nrows() {
        for (column, s) in columns.iter().zip(&storages) {
            w.cell(&column.data, row, s);
        }
    }
    w.tag("</data>");

    map[10] = w.pos();
    w.tag("<strls></strls>");

    map[11] = w.pos();
    w.tag("<value_labels>");
    for (name, labels) in table.value_label_sets() {
        let body = value_label_table(labels);
        w.tag("<lbl>");
        w.u32(body.len() as u32);
        w.fixed(name, NAME_LEN);
        w.bytes(&[0u8; 3]);
        w.bytes(&body);
        w.tag("</lbl>");
    }
    w.tag("</value_labels>");

    map[12] = w.pos();
    w.tag("</stata_dta>");
    map[13] = w.pos();

    let mut out = w.buf;
    for (i, offset) in map.iter().enumerate() {
        let at = map_at as usize + i * 8;
        out[at..at + 8].copy_from_slice(&offset.to_le_bytes());
    }
    Ok(out)
}

fn value_label_table(labels: &ValueLabels) -> Vec<u8> {
    let mut offsets = Vec::with_capacity(labels.len());
    let mut text = Vec::new();
    for label in labels.values() {
        offsets.push(text.len() as u32);
        text.extend(label.as_bytes());
        text.push(0);
    }

    let mut body = Vec::new();
    body.extend((labels.len() as u32).to_le_bytes());
    body.extend((text.len() as u32).to_le_bytes());
    for off in offsets {
        body.extend(off.to_le_bytes());
    }
    for code in labels.keys() {
        body.extend(code.to_le_bytes());
    }
    body.extend(text);
    body
}

/// Longest prefix of `text` within `max` bytes, on a char boundary
fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn pos(&self) -> u64 {
        self.buf.len() as u64
    }

    fn tag(&mut self, tag: &str) {
        self.buf.extend(tag.as_bytes());
    }

    fn bytes(&mut self, b: &[u8]) {
        self.buf.extend(b);
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.bytes(&v.to_le_bytes());
    }

    /// NUL-padded text field; always leaves room for a terminator
    fn fixed(&mut self, text: &str, width: usize) {
        let text = truncate(text, width - 1);
        self.bytes(text.as_bytes());
        self.bytes(&vec![0u8; width - text.len()]);
    }

    fn cell(&mut self, data: &ColumnData, row: usize, storage: &Storage) {
        match data {
            ColumnData::Int8(v) => self.u8(v[row].unwrap_or(BYTE_MAX + 1) as u8),
            ColumnData::Int16(v) => self.u16(v[row].unwrap_or(INT_MAX + 1) as u16),
            ColumnData::Int32(v) => self.u32(v[row].unwrap_or(LONG_MAX + 1) as u32),
            ColumnData::Float32(v) => self.u32(v[row].map(f32::to_bits).unwrap_or(FLOAT_MISSING_BITS)),
            ColumnData::Float64(v) => self.double(v[row]),
            ColumnData::Date(v) => self.double(v[row].map(date_to_days)),
            ColumnData::DateTime(v) => self.double(v[row].map(datetime_to_millis)),
            ColumnData::Str(v) => {
                let width = match storage {
                    Storage::Str(width) => *width,
                    _ => v[row].len(),
                };
                self.fixed_exact(&v[row], width);
            }
        }
    }

    fn double(&mut self, v: Option<f64>) {
        self.u64(v.map(f64::to_bits).unwrap_or(DOUBLE_MISSING_BITS));
    }

    /// `str#` cell: exactly `width` bytes, no terminator needed when full
    fn fixed_exact(&mut self, text: &str, width: usize) {
        let text = truncate(text, width);
        self.bytes(text.as_bytes());
        self.bytes(&vec![0u8; width - text.len()]);
    }
}
