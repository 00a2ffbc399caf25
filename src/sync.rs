//! End-to-end import of one dataset into one table

use crate::backend::Backend;
use crate::config::SyncConfig;
use crate::dataset::{Dataset, Value};
use crate::error::{Result, SyncError};
use crate::history::{fetch_history, HistoryRows};
use crate::identifier::Identifier;
use crate::inference::TypeInferencer;
use crate::progress::ProgressReporter;
use crate::schema::{
    SchemaManager, SchemaOutcome, TableSchema, CATALOG_TABLE, HISTORY_SUFFIX, SEQUENCE_SUFFIX,
    STAGING_SUFFIX,
};
use crate::upsert::{SyncResult, UpsertReconciler};
use serde::Serialize;

/// What an import did to a table
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub table: String,
    pub outcome: SchemaOutcome,
    pub result: SyncResult,
}

fn target_table(table: &str) -> Result<Identifier> {
    let table = Identifier::table(table)?;
    if table.as_str().eq_ignore_ascii_case(CATALOG_TABLE) {
        return Err(SyncError::invalid_identifier(
            table.as_str(),
            "name is reserved for the column catalog",
        ));
    }
    // Names of derived tables would collide with another table's history or staging table
    for suffix in [STAGING_SUFFIX, HISTORY_SUFFIX, SEQUENCE_SUFFIX] {
        if table.as_str().ends_with(suffix) {
            return Err(SyncError::invalid_identifier(
                table.as_str(),
                format!("names ending in '{}' are reserved for derived tables", suffix),
            ));
        }
    }
    Ok(table)
}

/// Import `dataset` into `table`, creating or widening it as needed
pub fn import_dataset<B: Backend + ?Sized>(
    backend: &B,
    table: &str,
    dataset: &Dataset,
    primary_key: Option<&str>,
    config: &SyncConfig,
) -> Result<ImportReport> {
    import_dataset_with_progress(
        backend,
        table,
        dataset,
        primary_key,
        config,
        &mut ProgressReporter::new_minimal(),
    )
}

pub fn import_dataset_with_progress<B: Backend + ?Sized>(
    backend: &B,
    table: &str,
    dataset: &Dataset,
    primary_key: Option<&str>,
    config: &SyncConfig,
    progress: &mut ProgressReporter,
) -> Result<ImportReport> {
    config.validate()?;
    let table = target_table(table)?;
    let inferencer = TypeInferencer::new(*config);

    let desired = TableSchema::infer(table.clone(), dataset, primary_key, &inferencer)?;
    log::debug!(
        "Inferred {} columns for `{}`, keyed on '{}'",
        desired.columns.len(),
        table,
        desired.primary_key
    );

    let sync = SchemaManager::new(backend, inferencer).synchronize(&desired, dataset)?;

    let result = UpsertReconciler::new(backend)
        .merge_with_progress(&sync.schema, dataset, progress)
        .map_err(|e| {
            if sync.outcome.changed_schema() {
                SyncError::schema_drift(table.as_str(), e)
            } else {
                e
            }
        })?;

    log::debug!("Import into `{}` finished: {}", table, result);

    Ok(ImportReport {
        table: table.to_string(),
        outcome: sync.outcome,
        result,
    })
}

/// Catalogued schema of a managed table
pub fn describe_table<B: Backend + ?Sized>(backend: &B, table: &str) -> Result<TableSchema> {
    let table = target_table(table)?;
    SchemaManager::new(backend, TypeInferencer::default())
        .describe(&table)?
        .ok_or_else(|| SyncError::invalid_input(format!("Table `{}` is not managed by tabsync", table)))
}

/// Archived row images of a managed table, optionally for one key
pub fn table_history<B: Backend + ?Sized>(
    backend: &B,
    table: &str,
    key: Option<&Value>,
) -> Result<HistoryRows> {
    let schema = describe_table(backend, table)?;
    fetch_history(backend, &schema, key)
}
