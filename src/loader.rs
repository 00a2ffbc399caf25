//! Reading tabular files into datasets using DuckDB

use crate::backend::{open_database, Backend};
use crate::dataset::{Dataset, Value};
use crate::error::{Result, SyncError};
use duckdb::Connection;
use std::path::Path;

/// Loads CSV, TSV, Parquet and JSON files
pub struct DataLoader {
    connection: Connection,
}

impl DataLoader {
    pub fn new() -> Result<Self> {
        let connection = open_database(None)?;
        connection.execute("SET preserve_insertion_order=true", [])?;
        Ok(Self { connection })
    }

    /// Check if file format is supported
    pub fn is_supported_format(file_path: &Path) -> bool {
        extension(file_path)
            .map(|ext| matches!(ext.as_str(), "csv" | "tsv" | "parquet" | "json" | "jsonl"))
            .unwrap_or(false)
    }

    /// Read a whole file. Delimited text is read verbatim so every cell arrives as text.
    pub fn load_file(&self, file_path: &Path) -> Result<Dataset> {
        if !file_path.is_file() {
            return Err(SyncError::invalid_input(format!(
                "File not found: {}",
                file_path.display()
            )));
        }

        let source = source_expression(file_path)?;
        self.connection
            .execute(
                &format!("CREATE OR REPLACE VIEW source_view AS SELECT * FROM {}", source),
                [],
            )
            .map_err(|e| convert_duckdb_error(e, file_path))?;

        let header = self.column_names()?;
        let rows = self
            .connection
            .query_sql("SELECT * FROM source_view", &[])
            .map_err(|e| match e {
                SyncError::DuckDb(inner) => convert_duckdb_error(inner, file_path),
                other => other,
            })?;

        log::debug!(
            "Read {} rows and {} columns from {}",
            rows.len(),
            header.len(),
            file_path.display()
        );

        Dataset::from_rows(&header, rows)
    }

    fn column_names(&self) -> Result<Vec<String>> {
        let rows = self.connection.query_sql("DESCRIBE source_view", &[])?;
        rows.into_iter()
            .map(|row| match row.into_iter().next() {
                Some(Value::Text(name)) => Ok(name),
                other => Err(SyncError::data_processing(format!(
                    "Unexpected column description: {:?}",
                    other
                ))),
            })
            .collect()
    }
}

fn extension(file_path: &Path) -> Option<String> {
    file_path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
}

fn source_expression(file_path: &Path) -> Result<String> {
    let path = file_path.to_string_lossy().replace('\'', "''");
    match extension(file_path).as_deref() {
        Some("csv") => Ok(format!(
            "read_csv('{}', header = true, all_varchar = true)",
            path
        )),
        Some("tsv") => Ok(format!(
            "read_csv('{}', header = true, all_varchar = true, delim = '\\t')",
            path
        )),
        Some("parquet") => Ok(format!("read_parquet('{}')", path)),
        Some("json") | Some("jsonl") => Ok(format!("read_json_auto('{}')", path)),
        _ => Err(SyncError::invalid_input(format!(
            "Unsupported file format: {} (expected csv, tsv, parquet, json or jsonl)",
            file_path.display()
        ))),
    }
}

/// Map DuckDB reader errors to input errors naming the file
fn convert_duckdb_error(error: duckdb::Error, file_path: &Path) -> SyncError {
    let error_msg = error.to_string();

    if error_msg.contains("CSV Error")
        || error_msg.contains("Could not convert")
        || error_msg.contains("Invalid CSV")
        || error_msg.contains("Unterminated quoted field")
    {
        SyncError::invalid_input(format!(
            "Malformed CSV file '{}': {}",
            file_path.display(),
            error_msg
        ))
    } else if error_msg.contains("JSON") {
        SyncError::invalid_input(format!(
            "Malformed JSON file '{}': {}",
            file_path.display(),
            error_msg
        ))
    } else if error_msg.contains("No files found") || error_msg.contains("does not exist") {
        SyncError::invalid_input(format!("File not found: {}", file_path.display()))
    } else if error_msg.contains("Permission denied") {
        SyncError::invalid_input(format!(
            "Permission denied accessing file: {}",
            file_path.display()
        ))
    } else if error_msg.contains("UTF-8") || error_msg.contains("encoding") {
        SyncError::invalid_input(format!(
            "File encoding error '{}': {}",
            file_path.display(),
            error_msg
        ))
    } else {
        SyncError::DuckDb(error)
    }
}
