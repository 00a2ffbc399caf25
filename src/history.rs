//! Capture of pre-update row images
//!
//! DuckDB has no triggers, so the capture runs in the merge transaction
//! immediately before the overwrite: every main row whose staged counterpart
//! differs in at least one compared column is copied, with its original
//! `import_time`, into the history table. The same predicate then selects the
//! rows to overwrite, so a row is never updated without being archived.

use crate::backend::Backend;
use crate::dataset::Value;
use crate::error::{Result, Step, StepContext};
use crate::identifier::{Identifier, HISTORY_ID, IMPORT_TIME};
use crate::schema::TableSchema;
use serde::Serialize;

/// Null-safe "row changed" test between two aliases over `columns`.
///
/// Null compared with null counts as unchanged. With no columns to compare a
/// row can never change.
pub fn changed_predicate(current: &str, incoming: &str, columns: &[Identifier]) -> String {
    if columns.is_empty() {
        return "FALSE".to_string();
    }
    let unchanged: Vec<String> = columns
        .iter()
        .map(|c| {
            format!(
                "{current}.{col} IS NOT DISTINCT FROM {incoming}.{col}",
                current = current,
                incoming = incoming,
                col = c.quoted()
            )
        })
        .collect();
    format!("NOT ({})", unchanged.join(" AND "))
}

/// Archives the current image of rows about to be overwritten from a staging table
pub struct HistoryCapture<'s> {
    schema: &'s TableSchema,
    compared: Vec<Identifier>,
}

impl<'s> HistoryCapture<'s> {
    /// `compared` are the non-key columns supplied by the incoming batch
    pub fn new(schema: &'s TableSchema, compared: Vec<Identifier>) -> Self {
        Self { schema, compared }
    }

    pub fn compared(&self) -> &[Identifier] {
        &self.compared
    }

    /// Predicate over the main table (by name) and the staging alias `s`
    pub fn predicate(&self) -> String {
        changed_predicate(&self.schema.table.quoted(), "s", &self.compared)
    }

    /// Copy pre-change images into history; returns the number archived
    pub fn capture<B: Backend + ?Sized>(&self, backend: &B, staging: &Identifier) -> Result<usize> {
        let mut columns: Vec<String> = self.schema.columns.iter().map(|c| c.name.quoted()).collect();
        columns.push(Identifier::metadata(IMPORT_TIME).quoted());

        let main = self.schema.table.quoted();
        let selected: Vec<String> = columns.iter().map(|c| format!("{}.{}", main, c)).collect();
        let key = self.schema.primary_key.quoted();

        let sql = format!(
            "INSERT INTO {history} ({columns}) \
             SELECT {selected} FROM {main} JOIN {staging} AS s ON {main}.{key} = s.{key} \
             WHERE {predicate}",
            history = self.schema.history_table().quoted(),
            columns = columns.join(", "),
            selected = selected.join(", "),
            main = main,
            staging = staging.quoted(),
            key = key,
            predicate = self.predicate(),
        );

        let archived = backend.execute_sql(&sql, &[]).step(Step::Merge)?;
        log::debug!("Archived {} rows of `{}`", archived, self.schema.table);
        Ok(archived)
    }
}

/// Archived rows of one table, oldest first
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRows {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl HistoryRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in row `index`
    pub fn value(&self, index: usize, column: &str) -> Option<&Value> {
        let position = self.columns.iter().position(|c| c == column)?;
        self.rows.get(index).and_then(|row| row.get(position))
    }
}

/// Read a table's history, optionally only for one primary key value
pub fn fetch_history<B: Backend + ?Sized>(
    backend: &B,
    schema: &TableSchema,
    key: Option<&Value>,
) -> Result<HistoryRows> {
    let mut columns = vec![HISTORY_ID.to_string()];
    columns.extend(schema.columns.iter().map(|c| c.name.to_string()));
    columns.push(IMPORT_TIME.to_string());

    let projection: Vec<String> = columns
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect();

    let mut sql = format!(
        "SELECT {} FROM {}",
        projection.join(", "),
        schema.history_table().quoted()
    );
    let mut params = Vec::new();
    if let Some(key) = key {
        sql.push_str(&format!(" WHERE {} = ?", schema.primary_key.quoted()));
        let key = match schema.key_column() {
            Some(column) => column.column_type.coerce(key),
            None => key.clone(),
        };
        params.push(key);
    }
    sql.push_str(&format!(" ORDER BY {}", Identifier::metadata(HISTORY_ID).quoted()));

    let rows = backend.query_sql(&sql, &params).step(Step::Inspect)?;

    Ok(HistoryRows {
        table: schema.history_table().to_string(),
        columns,
        rows,
    })
}
