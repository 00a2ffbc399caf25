//! Keyed merge of a batch into a main table through a staging table
//!
//! The batch is written to `<table>_tmp`, then in one transaction the
//! pre-images of changed rows are archived, changed rows are overwritten and
//! rows with new keys are inserted. Counts are derived from the main and
//! history row counts before and after the merge.

use crate::backend::{Backend, Transaction};
use crate::dataset::{Dataset, Value};
use crate::error::{Result, Step, StepContext, SyncError};
use crate::history::HistoryCapture;
use crate::identifier::{Identifier, IMPORT_TIME};
use crate::progress::ProgressReporter;
use crate::schema::{ColumnDef, TableSchema};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Upper bound on bound parameters per staging INSERT
const STAGE_BATCH_PARAMS: usize = 8192;

/// Rows written by one merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub inserted: u64,
    pub updated: u64,
}

impl SyncResult {
    pub fn total(&self) -> u64 {
        self.inserted + self.updated
    }

    pub fn is_noop(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} updated, {} inserted", self.updated, self.inserted)
    }
}

/// Staging table that is dropped when the guard goes out of scope
struct StagingTable<'a, B: Backend + ?Sized> {
    backend: &'a B,
    table: Identifier,
}

impl<'a, B: Backend + ?Sized> StagingTable<'a, B> {
    fn create(backend: &'a B, table: Identifier, columns: &[&ColumnDef]) -> Result<Self> {
        let defs: Vec<String> = columns
            .iter()
            .map(|c| format!("{} {}", c.name.quoted(), c.column_type.sql_type()))
            .collect();
        backend
            .execute_script(&format!(
                "CREATE OR REPLACE TABLE {} ({})",
                table.quoted(),
                defs.join(", ")
            ))
            .step(Step::Stage)?;
        Ok(Self { backend, table })
    }
}

impl<B: Backend + ?Sized> Drop for StagingTable<'_, B> {
    fn drop(&mut self) {
        let sql = format!("DROP TABLE IF EXISTS {}", self.table.quoted());
        if let Err(e) = self.backend.execute_script(&sql) {
            log::warn!("Failed to drop staging table `{}`: {}", self.table, e);
        }
    }
}

/// Merges datasets into existing main tables
pub struct UpsertReconciler<'a, B: Backend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: Backend + ?Sized> UpsertReconciler<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Merge `dataset` into the table described by `schema`
    pub fn merge(&self, schema: &TableSchema, dataset: &Dataset) -> Result<SyncResult> {
        self.merge_with_progress(schema, dataset, &mut ProgressReporter::new_minimal())
    }

    pub fn merge_with_progress(
        &self,
        schema: &TableSchema,
        dataset: &Dataset,
        progress: &mut ProgressReporter,
    ) -> Result<SyncResult> {
        if dataset.is_empty() {
            log::debug!("Nothing to merge into `{}`", schema.table);
            return Ok(SyncResult::default());
        }

        let columns = merge_columns(schema, dataset)?;
        let rows = staged_rows(schema, &columns, dataset)?;

        let staging = StagingTable::create(self.backend, schema.staging_table(), &columns)?;

        let tx = Transaction::begin(self.backend).step(Step::Merge)?;

        let history_table = schema.history_table();
        let main_before = self.backend.count_rows(&schema.table).step(Step::Count)?;
        let history_before = self.backend.count_rows(&history_table).step(Step::Count)?;

        self.stage(&staging.table, &columns, &rows, progress)?;

        progress.start_merge();
        let compared: Vec<Identifier> = columns
            .iter()
            .filter(|c| c.name != schema.primary_key)
            .map(|c| c.name.clone())
            .collect();
        let capture = HistoryCapture::new(schema, compared);
        let now = Value::Timestamp(chrono::Local::now().naive_local());

        if !capture.compared().is_empty() {
            capture.capture(self.backend, &staging.table)?;
            self.update_changed(schema, &capture, &staging.table, &now)?;
        }
        self.insert_new(schema, &columns, &staging.table, &now)?;

        let main_after = self.backend.count_rows(&schema.table).step(Step::Count)?;
        let history_after = self.backend.count_rows(&history_table).step(Step::Count)?;

        tx.commit().step(Step::Merge)?;

        let result = SyncResult {
            inserted: main_after.saturating_sub(main_before),
            updated: history_after.saturating_sub(history_before),
        };
        progress.finish_merge();
        log::debug!("Merged {} staged rows into `{}`: {}", rows.len(), schema.table, result);

        Ok(result)
    }

    fn stage(
        &self,
        staging: &Identifier,
        columns: &[&ColumnDef],
        rows: &[Vec<Value>],
        progress: &mut ProgressReporter,
    ) -> Result<()> {
        let names: Vec<String> = columns.iter().map(|c| c.name.quoted()).collect();
        let placeholder = format!("({})", vec!["?"; columns.len()].join(", "));
        let rows_per_batch = (STAGE_BATCH_PARAMS / columns.len()).max(1);

        progress.start_stage(rows.len() as u64);
        let mut staged = 0usize;
        for chunk in rows.chunks(rows_per_batch) {
            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                staging.quoted(),
                names.join(", "),
                vec![placeholder.as_str(); chunk.len()].join(", ")
            );
            let params: Vec<Value> = chunk.iter().flatten().cloned().collect();
            self.backend.execute_sql(&sql, &params).step(Step::Stage)?;

            staged += chunk.len();
            progress.update_stage(staged as u64);
        }
        progress.finish_stage(&format!("Staged {} rows", staged));
        Ok(())
    }

    fn update_changed(
        &self,
        schema: &TableSchema,
        capture: &HistoryCapture<'_>,
        staging: &Identifier,
        now: &Value,
    ) -> Result<usize> {
        let mut assignments: Vec<String> = capture
            .compared()
            .iter()
            .map(|c| format!("{col} = s.{col}", col = c.quoted()))
            .collect();
        assignments.push(format!(
            "{} = CAST(? AS TIMESTAMP)",
            Identifier::metadata(IMPORT_TIME).quoted()
        ));

        let main = schema.table.quoted();
        let key = schema.primary_key.quoted();
        let sql = format!(
            "UPDATE {main} SET {assignments} FROM {staging} AS s \
             WHERE {main}.{key} = s.{key} AND {predicate}",
            main = main,
            assignments = assignments.join(", "),
            staging = staging.quoted(),
            key = key,
            predicate = capture.predicate(),
        );

        self.backend
            .execute_sql(&sql, std::slice::from_ref(now))
            .step(Step::Merge)
    }

    fn insert_new(
        &self,
        schema: &TableSchema,
        columns: &[&ColumnDef],
        staging: &Identifier,
        now: &Value,
    ) -> Result<usize> {
        let names: Vec<String> = columns.iter().map(|c| c.name.quoted()).collect();
        let selected: Vec<String> = names.iter().map(|n| format!("s.{}", n)).collect();
        let key = schema.primary_key.quoted();

        let sql = format!(
            "INSERT INTO {main} ({names}, {import_time}) \
             SELECT {selected}, CAST(? AS TIMESTAMP) FROM {staging} AS s \
             WHERE NOT EXISTS (SELECT 1 FROM {main} AS m WHERE m.{key} = s.{key})",
            main = schema.table.quoted(),
            names = names.join(", "),
            import_time = Identifier::metadata(IMPORT_TIME).quoted(),
            selected = selected.join(", "),
            staging = staging.quoted(),
            key = key,
        );

        self.backend
            .execute_sql(&sql, std::slice::from_ref(now))
            .step(Step::Merge)
    }
}

/// Stored columns that the dataset supplies, in table order
fn merge_columns<'s>(schema: &'s TableSchema, dataset: &Dataset) -> Result<Vec<&'s ColumnDef>> {
    for name in dataset.column_names() {
        if schema.column(name).is_none() {
            log::warn!(
                "Column '{}' is not part of `{}` and will not be imported",
                name,
                schema.table
            );
        }
    }

    if !dataset.contains_column(schema.primary_key.as_str()) {
        return Err(SyncError::invalid_input(format!(
            "Data for `{}` has no '{}' column, which is the table's primary key",
            schema.table, schema.primary_key
        )));
    }

    Ok(schema
        .columns
        .iter()
        .filter(|c| dataset.contains_column(c.name.as_str()))
        .collect())
}

/// Coerce cells to the stored types and collapse repeated keys, last row wins
fn staged_rows(
    schema: &TableSchema,
    columns: &[&ColumnDef],
    dataset: &Dataset,
) -> Result<Vec<Vec<Value>>> {
    let key_index = columns
        .iter()
        .position(|c| c.name == schema.primary_key)
        .ok_or_else(|| SyncError::invalid_input(format!("Missing key '{}'", schema.primary_key)))?;

    let sources: Vec<&[Value]> = columns
        .iter()
        .map(|c| dataset.column(c.name.as_str()).unwrap_or_default())
        .collect();

    let mut rows: IndexMap<String, Vec<Value>> = IndexMap::with_capacity(dataset.row_count());
    let mut duplicates = 0usize;

    for index in 0..dataset.row_count() {
        let row: Vec<Value> = columns
            .iter()
            .zip(&sources)
            .map(|(column, values)| column.column_type.coerce(&values[index]))
            .collect();

        let key = &row[key_index];
        if key.is_null() {
            return Err(SyncError::invalid_input(format!(
                "Row {} of the data for `{}` has no value for primary key '{}'",
                index + 1,
                schema.table,
                schema.primary_key
            )));
        }

        if rows.insert(key.identity_key(), row).is_some() {
            duplicates += 1;
        }
    }

    if duplicates > 0 {
        log::warn!(
            "{} rows for `{}` repeat an earlier primary key; the last occurrence is kept",
            duplicates,
            schema.table
        );
    }

    Ok(rows.into_values().collect())
}
