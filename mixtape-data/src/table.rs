//! In-memory tabular dataset
//!
//! A [`Table`] is an ordered list of named [`Column`]s sharing one row count.
//! Column types follow the Stata storage types; missing values are `None`.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value-label set: integer code to text
pub type ValueLabels = BTreeMap<i32, String>;

/// Errors raised when assembling a table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),
}

/// Typed column storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Int8(Vec<Option<i8>>),
    Int16(Vec<Option<i16>>),
    Int32(Vec<Option<i32>>),
    Float32(Vec<Option<f32>>),
    Float64(Vec<Option<f64>>),
    Str(Vec<String>),
    Date(Vec<Option<NaiveDate>>),
    DateTime(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int8(v) => v.len(),
            ColumnData::Int16(v) => v.len(),
            ColumnData::Int32(v) => v.len(),
            ColumnData::Float32(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Str(v) => v.len(),
            ColumnData::Date(v) => v.len(),
            ColumnData::DateTime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short type name (e.g. "int16", "str")
    pub fn dtype(&self) -> &'static str {
        match self {
            ColumnData::Int8(_) => "int8",
            ColumnData::Int16(_) => "int16",
            ColumnData::Int32(_) => "int32",
            ColumnData::Float32(_) => "float32",
            ColumnData::Float64(_) => "float64",
            ColumnData::Str(_) => "str",
            ColumnData::Date(_) => "date",
            ColumnData::DateTime(_) => "datetime",
        }
    }

    /// Cell at `row`, or `None` past the end
    pub fn get(&self, row: usize) -> Option<Value<'_>> {
        fn cell<T: Copy>(v: &[Option<T>], row: usize, f: impl Fn(T) -> Value<'static>) -> Option<Value<'static>> {
            v.get(row).map(|x| x.map(&f).unwrap_or(Value::Missing))
        }

        match self {
            ColumnData::Int8(v) => cell(v, row, |x| Value::Int(x.into())),
            ColumnData::Int16(v) => cell(v, row, |x| Value::Int(x.into())),
            ColumnData::Int32(v) => cell(v, row, |x| Value::Int(x.into())),
            ColumnData::Float32(v) => cell(v, row, |x| Value::Float(x.into())),
            ColumnData::Float64(v) => cell(v, row, Value::Float),
            ColumnData::Str(v) => v.get(row).map(|s| Value::Str(s.as_str())),
            ColumnData::Date(v) => cell(v, row, Value::Date),
            ColumnData::DateTime(v) => cell(v, row, Value::DateTime),
        }
    }

    /// Number of missing cells
    pub fn missing_count(&self) -> usize {
        fn count<T>(v: &[Option<T>]) -> usize {
            v.iter().filter(|x| x.is_none()).count()
        }

        match self {
            ColumnData::Int8(v) => count(v),
            ColumnData::Int16(v) => count(v),
            ColumnData::Int32(v) => count(v),
            ColumnData::Float32(v) => count(v),
            ColumnData::Float64(v) => count(v),
            ColumnData::Str(_) => 0,
            ColumnData::Date(v) => count(v),
            ColumnData::DateTime(v) => count(v),
        }
    }
}

/// A single cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Missing,
    Int(i64),
    Float(f64),
    Str(&'a str),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value<'_> {
    /// Numeric view of the cell; `None` for missing and non-numeric cells
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(i) => Some(i as f64),
            Value::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

/// A named column with its Stata metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Variable label (empty when unset)
    #[serde(default)]
    pub label: String,
    /// Display format (e.g. "%9.0g", "%td")
    pub format: String,
    /// Name of the attached value-label set
    #[serde(default)]
    pub value_labels: Option<String>,
    pub data: ColumnData,
}

impl Column {
    /// Create a column with the default display format for its type
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        let format = default_format(&data);
        Self {
            name: name.into(),
            label: String::new(),
            format,
            value_labels: None,
            data,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_value_labels(mut self, set: impl Into<String>) -> Self {
        self.value_labels = Some(set.into());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn default_format(data: &ColumnData) -> String {
    match data {
        ColumnData::Int8(_) | ColumnData::Int16(_) => "%8.0g".to_string(),
        ColumnData::Int32(_) => "%12.0g".to_string(),
        ColumnData::Float32(_) => "%9.0g".to_string(),
        ColumnData::Float64(_) => "%10.0g".to_string(),
        ColumnData::Str(v) => {
            let width = v.iter().map(|s| s.len()).max().unwrap_or(1).max(1);
            format!("%{}s", width)
        }
        ColumnData::Date(_) => "%td".to_string(),
        ColumnData::DateTime(_) => "%tc".to_string(),
    }
}

/// Tabular dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Dataset label (empty when unset)
    #[serde(default)]
    label: String,
    nrows: usize,
    columns: Vec<Column>,
    #[serde(default)]
    value_labels: BTreeMap<String, ValueLabels>,
}

impl Table {
    /// Build a table; all columns must have the same length and distinct names
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let nrows = columns.first().map(Column::len).unwrap_or(0);
        Self::with_rows(nrows, columns)
    }

    /// Build a table with an explicit row count (allows zero columns)
    pub fn with_rows(nrows: usize, columns: Vec<Column>) -> Result<Self, TableError> {
        let mut seen = std::collections::HashSet::new();
        for column in &columns {
            if column.len() != nrows {
                return Err(TableError::RaggedColumn {
                    column: column.name.clone(),
                    expected: nrows,
                    actual: column.len(),
                });
            }
            if !seen.insert(column.name.as_str()) {
                return Err(TableError::DuplicateColumn(column.name.clone()));
            }
        }

        Ok(Self {
            label: String::new(),
            nrows,
            columns,
            value_labels: BTreeMap::new(),
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Register a value-label set under `name`
    pub fn with_value_labels(mut self, name: impl Into<String>, labels: ValueLabels) -> Self {
        self.value_labels.insert(name.into(), labels);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.columns.len())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Cell lookup by row index and column name
    pub fn get(&self, row: usize, column: &str) -> Option<Value<'_>> {
        self.column(column).and_then(|c| c.data.get(row))
    }

    /// All value-label sets, keyed by set name
    pub fn value_label_sets(&self) -> &BTreeMap<String, ValueLabels> {
        &self.value_labels
    }

    /// Value-label set attached to a column, if any
    pub fn value_labels_for(&self, column: &str) -> Option<&ValueLabels> {
        let set = self.column(column)?.value_labels.as_deref()?;
        self.value_labels.get(set)
    }

    /// Decode a labeled numeric column into label text.
    ///
    /// Codes without a label keep their numeric text; missing cells are `None`.
    /// Returns `None` when the column does not exist or has no label set.
    pub fn labeled(&self, column: &str) -> Option<Vec<Option<String>>> {
        let labels = self.value_labels_for(column)?;
        let data = &self.column(column)?.data;

        let decoded = (0..self.nrows)
            .map(|row| {
                let code = match data.get(row)? {
                    Value::Int(i) => i,
                    Value::Float(f) if f.fract() == 0.0 => f as i64,
                    Value::Float(f) => return Some(f.to_string()),
                    _ => return None,
                };
                Some(
                    i32::try_from(code)
                        .ok()
                        .and_then(|c| labels.get(&c).cloned())
                        .unwrap_or_else(|| code.to_string()),
                )
            })
            .collect();

        Some(decoded)
    }
}
