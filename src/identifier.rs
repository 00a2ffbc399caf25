//! Validated table and column identifiers
//!
//! Identifiers are the only text interpolated into SQL, so every name coming
//! from a file header or the command line passes through here first.

use crate::error::{Result, SyncError};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Metadata column holding the time a row was last written
pub const IMPORT_TIME: &str = "import_time";

/// Surrogate key of the history table
pub const HISTORY_ID: &str = "history_id";

const MAX_TABLE_LEN: usize = 55;
const MAX_COLUMN_LEN: usize = 63;

fn table_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid table pattern"))
}

fn column_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_ \-]*$").expect("valid column pattern"))
}

/// A name that is safe to quote into a SQL statement
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Validate a table name. DuckDB resolves table names without regard to
    /// case, so they are stored lowercased.
    pub fn table(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.len() > MAX_TABLE_LEN {
            return Err(SyncError::invalid_identifier(
                name,
                format!("table names are limited to {} characters", MAX_TABLE_LEN),
            ));
        }
        if !table_pattern().is_match(name) {
            return Err(SyncError::invalid_identifier(
                name,
                "table names may only contain letters, digits and underscores",
            ));
        }
        Ok(Self(name.to_ascii_lowercase()))
    }

    /// Validate a column name taken from a dataset header
    pub fn column(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.len() > MAX_COLUMN_LEN {
            return Err(SyncError::invalid_identifier(
                name,
                format!("column names are limited to {} characters", MAX_COLUMN_LEN),
            ));
        }
        if !column_pattern().is_match(name) {
            return Err(SyncError::invalid_identifier(
                name,
                "column names may only contain letters, digits, spaces, '-' and '_'",
            ));
        }
        if name.eq_ignore_ascii_case(IMPORT_TIME) || name.eq_ignore_ascii_case(HISTORY_ID) {
            return Err(SyncError::invalid_identifier(name, "name is reserved for metadata"));
        }
        Ok(Self(name.to_string()))
    }

    /// Metadata identifiers bypass the reserved-name check
    pub(crate) fn metadata(name: &'static str) -> Self {
        Self(name.to_string())
    }

    /// Derive `<name><suffix>`, e.g. the history or staging table
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self(format!("{}{}", self.0, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for SQL text
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
