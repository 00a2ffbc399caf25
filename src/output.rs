//! Output formatting utilities

use crate::error::Result;
use crate::history::HistoryRows;
use crate::schema::{ColumnChange, SchemaOutcome, TableSchema};
use crate::sync::ImportReport;

/// Pretty printer for tabsync output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Status lines describing one import
    pub fn import_lines(report: &ImportReport) -> Vec<String> {
        let table = &report.table;
        let mut lines = Vec::new();

        match &report.outcome {
            SchemaOutcome::Created => lines.push(format!("Table `{}` created", table)),
            SchemaOutcome::Reconciled { changes } => {
                for change in changes {
                    lines.push(match change {
                        ColumnChange::Widened { column, from, to } => {
                            format!("Expanded `{}`.`{}`: {} → {}", table, column, from, to)
                        }
                        ColumnChange::Promoted { column, .. } => {
                            format!("Converted `{}`.`{}` → TEXT", table, column)
                        }
                    });
                }
            }
        }

        lines.push(format!("{} in `{}`.", report.result, table));
        lines
    }

    /// Print the outcome of one import
    pub fn print_import_report(report: &ImportReport) {
        for line in Self::import_lines(report) {
            println!("{}", line);
        }
    }

    /// Print a stored table schema
    pub fn print_schema(schema: &TableSchema) {
        println!("📋 Table: {}", schema.table);
        println!("├─ History: {}", schema.history_table());
        println!("├─ Primary key: {}", schema.primary_key);
        println!("└─ Columns:");
        for (i, column) in schema.columns.iter().enumerate() {
            let prefix = if i == schema.columns.len() - 1 { "   └─" } else { "   ├─" };
            let marker = if column.name == schema.primary_key { " (key)" } else { "" };
            println!("{} {}: {}{}", prefix, column.name, column.column_type, marker);
        }
    }

    /// Print archived row images, oldest first
    pub fn print_history(history: &HistoryRows) {
        if history.is_empty() {
            println!("No history found in `{}`.", history.table);
            return;
        }

        println!("🕘 {} ({} rows):", history.table, history.len());
        for (i, row) in history.rows.iter().enumerate() {
            let prefix = if i == history.len() - 1 { "└─" } else { "├─" };
            let cells: Vec<String> = history
                .columns
                .iter()
                .zip(row)
                .map(|(name, value)| {
                    if value.is_null() {
                        format!("{}=NULL", name)
                    } else {
                        format!("{}={}", name, value)
                    }
                })
                .collect();
            println!("{} {}", prefix, cells.join(", "));
        }
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }
}
