//! Backend execution interface and its DuckDB implementation

use crate::dataset::Value;
use crate::error::{Result, SyncError};
use crate::identifier::Identifier;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use duckdb::types::{TimeUnit, Value as DuckValue, ValueRef};
use duckdb::{params_from_iter, Connection};
use std::path::Path;

/// The capability surface the sync engine needs from a store.
///
/// Data values are always bound as parameters; only validated identifiers
/// are ever part of the SQL text.
pub trait Backend {
    /// Run a statement and return the number of affected rows
    fn execute_sql(&self, sql: &str, params: &[Value]) -> Result<usize>;

    /// Run a query and return all rows
    fn query_sql(&self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>>;

    /// Run several parameterless statements
    fn execute_script(&self, sql: &str) -> Result<()>;

    fn begin(&self) -> Result<()> {
        self.execute_script("BEGIN TRANSACTION")
    }

    fn commit(&self) -> Result<()> {
        self.execute_script("COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.execute_script("ROLLBACK")
    }

    /// Run a query expected to return a single integer
    fn query_scalar(&self, sql: &str, params: &[Value]) -> Result<i64> {
        let rows = self.query_sql(sql, params)?;
        match rows.first().and_then(|row| row.first()) {
            Some(Value::Integer(n)) => Ok(*n),
            Some(other) => Err(SyncError::data_processing(format!(
                "Expected an integer result, got '{}'",
                other
            ))),
            None => Err(SyncError::data_processing("Query returned no rows")),
        }
    }

    fn table_exists(&self, table: &Identifier) -> Result<bool> {
        let count = self.query_scalar(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_name = ? AND table_schema = current_schema()",
            &[Value::Text(table.to_string())],
        )?;
        Ok(count > 0)
    }

    fn count_rows(&self, table: &Identifier) -> Result<u64> {
        let count = self.query_scalar(&format!("SELECT COUNT(*) FROM {}", table.quoted()), &[])?;
        Ok(count.max(0) as u64)
    }
}

/// Rolls back on drop unless committed
pub struct Transaction<'a, B: Backend + ?Sized> {
    backend: &'a B,
    finished: bool,
}

impl<'a, B: Backend + ?Sized> Transaction<'a, B> {
    pub fn begin(backend: &'a B) -> Result<Self> {
        backend.begin()?;
        Ok(Self {
            backend,
            finished: false,
        })
    }

    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.backend.commit()
    }
}

impl<B: Backend + ?Sized> Drop for Transaction<'_, B> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.backend.rollback() {
                log::warn!("Failed to roll back transaction: {}", e);
            }
        }
    }
}

/// Open a DuckDB database file, or an in-memory database when no path is given
pub fn open_database(path: Option<&Path>) -> Result<Connection> {
    let connection = match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(SyncError::invalid_input(format!(
                        "Database directory does not exist: {}",
                        parent.display()
                    )));
                }
            }
            log::debug!("Opening database {}", path.display());
            Connection::open(path)?
        }
        None => Connection::open_in_memory()?,
    };

    connection.execute("SET enable_progress_bar=false", [])?;

    Ok(connection)
}

impl Backend for Connection {
    fn execute_sql(&self, sql: &str, params: &[Value]) -> Result<usize> {
        log::trace!("execute: {}", sql);
        let affected = Connection::execute(self, sql, params_from_iter(params.iter().map(to_duckdb)))?;
        Ok(affected)
    }

    fn query_sql(&self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>> {
        log::trace!("query: {}", sql);
        let mut stmt = self.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter().map(to_duckdb)))?;

        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let statement: &duckdb::Statement<'_> = row.as_ref();
            let width = statement.column_count();
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(from_duckdb(row.get_ref(index)?));
            }
            result.push(values);
        }
        Ok(result)
    }

    fn execute_script(&self, sql: &str) -> Result<()> {
        log::trace!("script: {}", sql);
        Connection::execute_batch(self, sql)?;
        Ok(())
    }
}

fn to_duckdb(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Integer(i) => DuckValue::BigInt(*i),
        Value::Float(f) => DuckValue::Double(*f),
        Value::Timestamp(ts) => DuckValue::Timestamp(TimeUnit::Microsecond, ts.and_utc().timestamp_micros()),
        Value::Text(s) => DuckValue::Text(s.clone()),
    }
}

fn timestamp_from(unit: TimeUnit, raw: i64) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Second => DateTime::from_timestamp(raw, 0),
        TimeUnit::Millisecond => DateTime::from_timestamp_millis(raw),
        TimeUnit::Microsecond => DateTime::from_timestamp_micros(raw),
        TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(raw)),
    };
    dt.map(|dt| dt.naive_utc())
}

fn from_duckdb(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Text(b.to_string()),
        ValueRef::TinyInt(i) => Value::Integer(i as i64),
        ValueRef::SmallInt(i) => Value::Integer(i as i64),
        ValueRef::Int(i) => Value::Integer(i as i64),
        ValueRef::BigInt(i) => Value::Integer(i),
        ValueRef::HugeInt(i) => i64::try_from(i)
            .map(Value::Integer)
            .unwrap_or(Value::Float(i as f64)),
        ValueRef::UTinyInt(i) => Value::Integer(i as i64),
        ValueRef::USmallInt(i) => Value::Integer(i as i64),
        ValueRef::UInt(i) => Value::Integer(i as i64),
        ValueRef::UBigInt(i) => i64::try_from(i)
            .map(Value::Integer)
            .unwrap_or(Value::Float(i as f64)),
        ValueRef::Float(f) => Value::Float(f as f64),
        ValueRef::Double(f) => Value::Float(f),
        ValueRef::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::Text(d.to_string())),
        ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).to_string()),
        ValueRef::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days as i64)))
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        ValueRef::Timestamp(unit, raw) => timestamp_from(unit, raw)
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        ValueRef::Blob(b) => Value::Text(format!("<blob:{} bytes>", b.len())),
        other => Value::Text(format!("{:?}", other)),
    }
}
