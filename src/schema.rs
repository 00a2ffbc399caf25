//! Main and history table schemas, and their create-or-widen lifecycle
//!
//! A table is either absent, in which case the main table, its history table
//! and their catalog entries are created together, or present, in which case
//! bounded text columns are widened (or promoted to unbounded text) to fit the
//! incoming data. Nothing is ever narrowed, dropped or retyped.
//!
//! DuckDB accepts `VARCHAR(n)` but neither enforces nor remembers `n`, so the
//! declared type of every column is kept in the `tabsync_columns` catalog.

use crate::backend::{Backend, Transaction};
use crate::dataset::{Dataset, Value};
use crate::error::{Result, Step, StepContext, SyncError};
use crate::identifier::{Identifier, HISTORY_ID, IMPORT_TIME};
use crate::inference::{ColumnType, TypeInferencer};
use serde::Serialize;

/// Catalog of declared column types for every managed table
pub const CATALOG_TABLE: &str = "tabsync_columns";

pub const HISTORY_SUFFIX: &str = "_history";
pub const STAGING_SUFFIX: &str = "_tmp";
pub const SEQUENCE_SUFFIX: &str = "_history_seq";

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDef {
    pub name: Identifier,
    pub column_type: ColumnType,
}

impl ColumnDef {
    fn ddl(&self) -> String {
        format!("{} {}", self.name.quoted(), self.column_type.sql_type())
    }
}

/// Schema of a main table. `import_time` is implicit and not listed in `columns`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub table: Identifier,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Identifier,
}

impl TableSchema {
    /// Infer a schema for `dataset`, resolving the primary key.
    ///
    /// An absent or unknown primary key falls back to the first column.
    pub fn infer(
        table: Identifier,
        dataset: &Dataset,
        primary_key: Option<&str>,
        inferencer: &TypeInferencer,
    ) -> Result<Self> {
        if dataset.column_count() == 0 {
            return Err(SyncError::invalid_input(format!(
                "Cannot import into `{}`: the dataset has no columns",
                table
            )));
        }

        let mut columns = Vec::with_capacity(dataset.column_count());
        for (name, values) in dataset.columns() {
            columns.push(ColumnDef {
                name: Identifier::column(name)?,
                column_type: inferencer.infer(values),
            });
        }

        let primary_key = resolve_primary_key(&table, dataset, primary_key)?;

        Ok(Self {
            table,
            columns,
            primary_key,
        })
    }

    pub fn history_table(&self) -> Identifier {
        self.table.with_suffix(HISTORY_SUFFIX)
    }

    pub fn staging_table(&self) -> Identifier {
        self.table.with_suffix(STAGING_SUFFIX)
    }

    /// Look up a column, ignoring surrounding whitespace and ASCII case
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        let name = name.trim();
        self.columns
            .iter()
            .find(|c| c.name.as_str().eq_ignore_ascii_case(name))
    }

    pub fn key_column(&self) -> Option<&ColumnDef> {
        self.column(self.primary_key.as_str())
    }

    /// Columns compared for change detection: everything except the key
    pub fn value_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(move |c| c.name != self.primary_key)
    }

    pub fn history(&self) -> HistorySchema {
        HistorySchema::from(self)
    }

    fn create_sql(&self) -> String {
        let mut defs: Vec<String> = self.columns.iter().map(ColumnDef::ddl).collect();
        defs.push(format!(
            "{} TIMESTAMP DEFAULT CURRENT_TIMESTAMP",
            Identifier::metadata(IMPORT_TIME).quoted()
        ));
        defs.push(format!("PRIMARY KEY ({})", self.primary_key.quoted()));
        format!("CREATE TABLE {} ({})", self.table.quoted(), defs.join(", "))
    }
}

fn resolve_primary_key(
    table: &Identifier,
    dataset: &Dataset,
    requested: Option<&str>,
) -> Result<Identifier> {
    let first = dataset
        .column_names()
        .first()
        .map(|name| name.to_string())
        .ok_or_else(|| SyncError::invalid_input("Dataset has no columns"))?;

    match requested.map(str::trim) {
        Some(key) => match dataset.resolve_name(key) {
            Some(name) => Identifier::column(name),
            None => {
                log::warn!(
                    "Primary key '{}' is not a column of the data for `{}`; using '{}' instead",
                    key,
                    table,
                    first
                );
                Identifier::column(&first)
            }
        },
        None => {
            log::debug!("No primary key given for `{}`; using '{}'", table, first);
            Identifier::column(&first)
        }
    }
}

/// Append-only mirror of a main table, keyed by a surrogate `history_id`
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySchema {
    pub table: Identifier,
    pub sequence: Identifier,
    pub columns: Vec<ColumnDef>,
}

impl From<&TableSchema> for HistorySchema {
    fn from(schema: &TableSchema) -> Self {
        Self {
            table: schema.history_table(),
            sequence: schema.table.with_suffix(SEQUENCE_SUFFIX),
            columns: schema.columns.clone(),
        }
    }
}

impl HistorySchema {
    fn create_sql(&self) -> Vec<String> {
        let mut defs = vec![format!(
            "{} BIGINT PRIMARY KEY DEFAULT nextval('{}')",
            Identifier::metadata(HISTORY_ID).quoted(),
            self.sequence
        )];
        defs.extend(self.columns.iter().map(ColumnDef::ddl));
        defs.push(format!("{} TIMESTAMP", Identifier::metadata(IMPORT_TIME).quoted()));

        vec![
            format!("CREATE SEQUENCE {}", self.sequence.quoted()),
            format!("CREATE TABLE {} ({})", self.table.quoted(), defs.join(", ")),
        ]
    }
}

/// A widen-only change applied to a bounded text column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ColumnChange {
    Widened { column: String, from: usize, to: usize },
    Promoted { column: String, from: usize },
}

/// Which branch schema synchronization took
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SchemaOutcome {
    Created,
    Reconciled { changes: Vec<ColumnChange> },
}

impl SchemaOutcome {
    /// True when this run committed schema changes
    pub fn changed_schema(&self) -> bool {
        match self {
            SchemaOutcome::Created => true,
            SchemaOutcome::Reconciled { changes } => !changes.is_empty(),
        }
    }
}

/// Result of synchronizing a table's schema
#[derive(Debug, Clone)]
pub struct SchemaSync {
    /// The schema as stored after synchronization
    pub schema: TableSchema,
    pub outcome: SchemaOutcome,
}

/// Ensures main/history tables exist and are wide enough for incoming data
pub struct SchemaManager<'a, B: Backend + ?Sized> {
    backend: &'a B,
    inferencer: TypeInferencer,
}

impl<'a, B: Backend + ?Sized> SchemaManager<'a, B> {
    pub fn new(backend: &'a B, inferencer: TypeInferencer) -> Self {
        Self {
            backend,
            inferencer,
        }
    }

    fn catalog() -> Identifier {
        Identifier::metadata(CATALOG_TABLE)
    }

    fn ensure_catalog(&self) -> Result<()> {
        self.backend
            .execute_script(&format!(
                "CREATE TABLE IF NOT EXISTS {} (\
                 table_name VARCHAR NOT NULL, \
                 column_name VARCHAR NOT NULL, \
                 ordinal INTEGER NOT NULL, \
                 column_type VARCHAR NOT NULL, \
                 is_primary_key INTEGER NOT NULL, \
                 PRIMARY KEY (table_name, column_name))",
                Self::catalog().quoted()
            ))
            .step(Step::Create)
    }

    /// Read a managed table's schema from the catalog
    pub fn describe(&self, table: &Identifier) -> Result<Option<TableSchema>> {
        if !self.backend.table_exists(&Self::catalog()).step(Step::Inspect)? {
            return Ok(None);
        }

        let rows = self
            .backend
            .query_sql(
                &format!(
                    "SELECT column_name, column_type, is_primary_key \
                     FROM {} WHERE table_name = ? ORDER BY ordinal",
                    Self::catalog().quoted()
                ),
                &[Value::Text(table.to_string())],
            )
            .step(Step::Inspect)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut columns = Vec::with_capacity(rows.len());
        let mut primary_key = None;
        for row in rows {
            match row.as_slice() {
                [Value::Text(name), Value::Text(column_type), flag] => {
                    let name = Identifier::column(name)?;
                    if *flag == Value::Integer(1) {
                        primary_key = Some(name.clone());
                    }
                    columns.push(ColumnDef {
                        name,
                        column_type: column_type.parse()?,
                    });
                }
                other => {
                    return Err(SyncError::data_processing(format!(
                        "Malformed catalog entry for `{}`: {:?}",
                        table, other
                    )))
                }
            }
        }

        let primary_key = primary_key.ok_or_else(|| {
            SyncError::data_processing(format!("Catalog has no primary key for `{}`", table))
        })?;

        Ok(Some(TableSchema {
            table: table.clone(),
            columns,
            primary_key,
        }))
    }

    /// Create the tables for `desired` or reconcile the stored schema with `dataset`
    pub fn synchronize(&self, desired: &TableSchema, dataset: &Dataset) -> Result<SchemaSync> {
        self.ensure_catalog()?;

        let exists = self.backend.table_exists(&desired.table).step(Step::Inspect)?;
        if !exists {
            self.create(desired)?;
            return Ok(SchemaSync {
                schema: desired.clone(),
                outcome: SchemaOutcome::Created,
            });
        }

        let stored = self.describe(&desired.table)?.ok_or_else(|| {
            SyncError::invalid_input(format!(
                "Table `{}` exists but was not created by tabsync",
                desired.table
            ))
        })?;

        if !stored
            .primary_key
            .as_str()
            .eq_ignore_ascii_case(desired.primary_key.as_str())
        {
            log::warn!(
                "`{}` is keyed on '{}'; ignoring primary key '{}'",
                stored.table,
                stored.primary_key,
                desired.primary_key
            );
        }
        if !dataset.contains_column(stored.primary_key.as_str()) {
            return Err(SyncError::invalid_input(format!(
                "Data for `{}` has no '{}' column, which is the table's primary key",
                stored.table, stored.primary_key
            )));
        }

        self.reconcile(stored, dataset)
    }

    fn create(&self, schema: &TableSchema) -> Result<()> {
        log::debug!("Creating `{}` and `{}`", schema.table, schema.history_table());

        let tx = Transaction::begin(self.backend).step(Step::Create)?;

        self.backend
            .execute_script(&schema.create_sql())
            .step(Step::Create)?;
        for statement in schema.history().create_sql() {
            self.backend.execute_script(&statement).step(Step::Create)?;
        }

        self.backend
            .execute_sql(
                &format!("DELETE FROM {} WHERE table_name = ?", Self::catalog().quoted()),
                &[Value::Text(schema.table.to_string())],
            )
            .step(Step::Create)?;
        let insert = format!(
            "INSERT INTO {} VALUES (?, ?, ?, ?, ?)",
            Self::catalog().quoted()
        );
        for (ordinal, column) in schema.columns.iter().enumerate() {
            self.backend
                .execute_sql(
                    &insert,
                    &[
                        Value::Text(schema.table.to_string()),
                        Value::Text(column.name.to_string()),
                        Value::Integer(ordinal as i64),
                        Value::Text(column.column_type.sql_type()),
                        Value::Integer((column.name == schema.primary_key) as i64),
                    ],
                )
                .step(Step::Create)?;
        }

        tx.commit().step(Step::Create)?;
        log::debug!("Table `{}` created", schema.table);
        Ok(())
    }

    fn reconcile(&self, mut stored: TableSchema, dataset: &Dataset) -> Result<SchemaSync> {
        let limit = self.inferencer.config().length_limit;
        let mut changes = Vec::new();

        for column in stored.columns.iter_mut() {
            let ColumnType::BoundedText(current) = column.column_type else {
                continue;
            };
            if !dataset.contains_column(column.name.as_str()) {
                continue;
            }
            let Some(required) = self
                .inferencer
                .required_length(dataset.non_null(column.name.as_str()))
            else {
                continue;
            };

            if required > limit {
                column.column_type = ColumnType::UnboundedText;
                changes.push(ColumnChange::Promoted {
                    column: column.name.to_string(),
                    from: current,
                });
            } else if required > current {
                column.column_type = ColumnType::BoundedText(required);
                changes.push(ColumnChange::Widened {
                    column: column.name.to_string(),
                    from: current,
                    to: required,
                });
            }
        }

        if !changes.is_empty() {
            self.apply(&stored, &changes)?;
        }

        Ok(SchemaSync {
            schema: stored,
            outcome: SchemaOutcome::Reconciled { changes },
        })
    }

    fn apply(&self, schema: &TableSchema, changes: &[ColumnChange]) -> Result<()> {
        let tx = Transaction::begin(self.backend).step(Step::Alter)?;
        let update = format!(
            "UPDATE {} SET column_type = ? WHERE table_name = ? AND column_name = ?",
            Self::catalog().quoted()
        );

        for change in changes {
            let column = match change {
                ColumnChange::Widened { column, from, to } => {
                    log::debug!("Expanded `{}`.`{}`: {} → {}", schema.table, column, from, to);
                    column
                }
                ColumnChange::Promoted { column, .. } => {
                    log::debug!("Converted `{}`.`{}` → TEXT", schema.table, column);
                    column
                }
            };
            let column_type = schema
                .column(column)
                .map(|c| c.column_type)
                .ok_or_else(|| SyncError::data_processing(format!("Unknown column '{}'", column)))?;

            self.backend
                .execute_sql(
                    &update,
                    &[
                        Value::Text(column_type.sql_type()),
                        Value::Text(schema.table.to_string()),
                        Value::Text(column.clone()),
                    ],
                )
                .step(Step::Alter)?;
        }

        tx.commit().step(Step::Alter)
    }
}
