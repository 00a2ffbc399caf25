//! # tabsync
//!
//! Imports tabular batches into keyed DuckDB tables. Column types are inferred
//! from the data, text columns only ever widen, and every row image that an
//! import overwrites is archived in a companion history table.

pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dataset;
pub mod error;
pub mod history;
pub mod identifier;
pub mod inference;
pub mod loader;
pub mod output;
pub mod progress;
pub mod schema;
pub mod sync;
pub mod upsert;

pub use backend::{open_database, Backend};
pub use config::{ImportManifest, SyncConfig};
pub use dataset::{Dataset, Value};
pub use error::{Result, Step, SyncError};
pub use inference::{ColumnType, TypeInferencer};
pub use loader::DataLoader;
pub use schema::{ColumnChange, SchemaManager, SchemaOutcome, TableSchema};
pub use sync::{describe_table, import_dataset, table_history, ImportReport};
pub use upsert::{SyncResult, UpsertReconciler};
