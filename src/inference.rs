//! Column type inference from sampled values

use crate::config::SyncConfig;
use crate::dataset::{parse_timestamp, Value};
use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length used for text columns that have no non-null values
pub const DEFAULT_TEXT_LENGTH: usize = 10;

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ColumnType {
    Integer,
    Float,
    Timestamp,
    BoundedText(usize),
    UnboundedText,
}

impl ColumnType {
    /// SQL type used in DDL
    pub fn sql_type(&self) -> String {
        match self {
            ColumnType::Integer => "BIGINT".to_string(),
            ColumnType::Float => "DOUBLE".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::BoundedText(len) => format!("VARCHAR({})", len),
            ColumnType::UnboundedText => "TEXT".to_string(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ColumnType::BoundedText(_) | ColumnType::UnboundedText)
    }

    /// Convert a cell to the representation stored in a column of this type.
    ///
    /// Cells that cannot be converted are passed through unchanged and left
    /// for the backend to reject.
    pub fn coerce(&self, value: &Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (ColumnType::Integer, Value::Text(s)) => {
                s.parse::<i64>().map(Value::Integer).unwrap_or_else(|_| value.clone())
            }
            (ColumnType::Float, Value::Integer(i)) => Value::Float(*i as f64),
            (ColumnType::Float, Value::Text(s)) => {
                s.parse::<f64>().map(Value::Float).unwrap_or_else(|_| value.clone())
            }
            (ColumnType::Timestamp, Value::Text(s)) => {
                parse_timestamp(s).map(Value::Timestamp).unwrap_or_else(|| value.clone())
            }
            (ColumnType::BoundedText(_) | ColumnType::UnboundedText, Value::Text(_)) => value.clone(),
            (ColumnType::BoundedText(_) | ColumnType::UnboundedText, other) => {
                other.render().map(Value::Text).unwrap_or(Value::Null)
            }
            (_, other) => other.clone(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_type())
    }
}

impl FromStr for ColumnType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_uppercase();
        match upper.as_str() {
            "BIGINT" => Ok(ColumnType::Integer),
            "DOUBLE" => Ok(ColumnType::Float),
            "TIMESTAMP" => Ok(ColumnType::Timestamp),
            "TEXT" => Ok(ColumnType::UnboundedText),
            other => other
                .strip_prefix("VARCHAR(")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(|len| len.trim().parse::<usize>().ok())
                .map(ColumnType::BoundedText)
                .ok_or_else(|| SyncError::data_processing(format!("Unknown column type '{}'", s))),
        }
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.sql_type()
    }
}

impl TryFrom<String> for ColumnType {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Integer,
    Float,
    Timestamp,
    Text,
}

fn classify(value: &Value) -> Class {
    match value {
        Value::Integer(_) => Class::Integer,
        Value::Float(_) => Class::Float,
        Value::Timestamp(_) => Class::Timestamp,
        Value::Text(s) => {
            if s.parse::<i64>().is_ok() {
                Class::Integer
            } else if s.parse::<f64>().map(f64::is_finite).unwrap_or(false) {
                Class::Float
            } else if parse_timestamp(s).is_some() {
                Class::Timestamp
            } else {
                Class::Text
            }
        }
        Value::Null => Class::Text,
    }
}

/// Derives storage types from column values
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeInferencer {
    config: SyncConfig,
}

impl TypeInferencer {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Infer the type of one column. Null cells are ignored.
    pub fn infer<'a, I>(&self, values: I) -> ColumnType
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let values: Vec<&Value> = values.into_iter().filter(|v| !v.is_null()).collect();
        let classes: Vec<Class> = values.iter().map(|v| classify(v)).collect();

        if !classes.is_empty() {
            if classes.iter().all(|c| *c == Class::Integer) {
                return ColumnType::Integer;
            }
            if classes.iter().all(|c| matches!(c, Class::Integer | Class::Float)) {
                return ColumnType::Float;
            }
            if classes.iter().all(|c| *c == Class::Timestamp) {
                return ColumnType::Timestamp;
            }
        }

        let length = self.required_length(values).unwrap_or(DEFAULT_TEXT_LENGTH);
        self.text_type(length)
    }

    /// Weighted length needed to hold the longest value, or None without values
    pub fn required_length<'a, I>(&self, values: I) -> Option<usize>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        values
            .into_iter()
            .filter_map(Value::render)
            .map(|s| s.chars().count())
            .max()
            .map(|max_len| weighted_length(max_len, self.config.length_weight))
    }

    /// Bounded text up to the configured limit, unbounded beyond it
    pub fn text_type(&self, length: usize) -> ColumnType {
        if length > self.config.length_limit {
            ColumnType::UnboundedText
        } else {
            ColumnType::BoundedText(length)
        }
    }
}

/// `ceil(len * weight)`, ignoring float noise just above an integer
fn weighted_length(len: usize, weight: f64) -> usize {
    let scaled = len as f64 * weight;
    let nearest = scaled.round();
    if (scaled - nearest).abs() <= scaled.abs() * 1e-12 {
        nearest as usize
    } else {
        scaled.ceil() as usize
    }
}
