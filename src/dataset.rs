//! In-memory tabular batches handed to the sync engine

use crate::error::{Result, SyncError};
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse the date/time spellings recognised during inference
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ts);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// A single cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    /// Build a text cell, trimming whitespace; blank text becomes null
    pub fn text(s: impl AsRef<str>) -> Self {
        let trimmed = s.as_ref().trim();
        if trimmed.is_empty() {
            Value::Null
        } else {
            Value::Text(trimmed.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// String representation used for length measurement; None for null
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    fn normalize(self) -> Self {
        match self {
            Value::Text(s) => Value::text(s),
            other => other,
        }
    }

    /// Hashable identity used to detect repeated primary keys within a batch
    pub(crate) fn identity_key(&self) -> String {
        match self {
            Value::Null => "n:".to_string(),
            Value::Integer(i) => format!("i:{}", i),
            Value::Float(f) => format!("f:{}", f.to_bits()),
            Value::Timestamp(ts) => format!("t:{}", ts),
            Value::Text(s) => format!("s:{}", s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::text(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Ordered named columns of equal length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: IndexMap<String, Vec<Value>>,
    row_count: usize,
}

impl Dataset {
    /// Build a dataset from named columns.
    ///
    /// Column names and text cells are trimmed and blank cells become null.
    /// Columns must all have the same length and names must stay unique after
    /// trimming, ignoring ASCII case.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: AsRef<str>,
    {
        let mut map = IndexMap::new();
        let mut row_count = None;

        for (name, values) in columns {
            let name = name.as_ref().trim().to_string();
            if name.is_empty() {
                return Err(SyncError::invalid_input("Dataset contains a column without a name"));
            }

            match row_count {
                None => row_count = Some(values.len()),
                Some(expected) if expected != values.len() => {
                    return Err(SyncError::invalid_input(format!(
                        "Column '{}' has {} values, expected {}",
                        name,
                        values.len(),
                        expected
                    )));
                }
                Some(_) => {}
            }

            if let Some(existing) = map.keys().find(|k| k.eq_ignore_ascii_case(&name)) {
                return Err(SyncError::invalid_input(format!(
                    "Duplicate column name: '{}' and '{}' differ only in case or whitespace",
                    existing, name
                )));
            }
            let values: Vec<Value> = values.into_iter().map(Value::normalize).collect();
            map.insert(name, values);
        }

        Ok(Self {
            columns: map,
            row_count: row_count.unwrap_or(0),
        })
    }

    /// Build a dataset from a header row and row-major data
    pub fn from_rows<S: AsRef<str>>(header: &[S], rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); header.len()];
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != header.len() {
                return Err(SyncError::invalid_input(format!(
                    "Row {} has {} values, expected {}",
                    index + 1,
                    row.len(),
                    header.len()
                )));
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }
        Self::from_columns(header.iter().map(|h| h.as_ref()).zip(columns))
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(|k| k.as_str()).collect()
    }

    fn entry(&self, name: &str) -> Option<(&String, &Vec<Value>)> {
        let name = name.trim();
        self.columns
            .get_key_value(name)
            .or_else(|| self.columns.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)))
    }

    /// The dataset's own spelling of `name`, matched trimmed and ignoring ASCII case
    pub fn resolve_name(&self, name: &str) -> Option<&str> {
        self.entry(name).map(|(k, _)| k.as_str())
    }

    /// Values of a column, looked up like [`Dataset::resolve_name`]
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.entry(name).map(|(_, v)| v.as_slice())
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Columns in order
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Non-null cells of one column
    pub fn non_null(&self, name: &str) -> Vec<&Value> {
        self.column(name)
            .map(|values| values.iter().filter(|v| !v.is_null()).collect())
            .unwrap_or_default()
    }
}
