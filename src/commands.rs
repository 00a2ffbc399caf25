//! Command implementations for tabsync CLI

use crate::backend::open_database;
use crate::cli::{Commands, OutputFormat, DEFAULT_DATABASE};
use crate::config::{ImportManifest, SyncConfig};
use crate::dataset::Value;
use crate::error::{Result, SyncError};
use crate::loader::DataLoader;
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::progress::ProgressReporter;
use crate::sync::{describe_table, import_dataset_with_progress, table_history, ImportReport};
use duckdb::Connection;
use std::path::{Path, PathBuf};

/// Execute a command
pub fn execute_command(command: Commands, database: Option<&Path>) -> Result<()> {
    match command {
        Commands::Import {
            input,
            table,
            primary_key,
            length_weight,
            length_limit,
            json,
        } => {
            let config = SyncConfig::with_overrides(length_weight, length_limit)?;
            import_command(database, &input, &table, primary_key.as_deref(), &config, json)
        }
        Commands::Batch { manifest, json } => batch_command(database, &manifest, json),
        Commands::Schema { table, format } => schema_command(database, &table, &format),
        Commands::History { table, key, format } => {
            history_command(database, &table, key.as_deref(), &format)
        }
    }
}

fn database_path(database: Option<&Path>) -> PathBuf {
    database
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
}

fn parse_format(format: &str) -> Result<OutputFormat> {
    OutputFormat::parse(format).map_err(SyncError::invalid_input)
}

/// Load one file and import it into one table
fn import_file(
    connection: &Connection,
    loader: &DataLoader,
    input: &Path,
    table: &str,
    primary_key: Option<&str>,
    config: &SyncConfig,
    progress: &mut ProgressReporter,
) -> Result<ImportReport> {
    if !DataLoader::is_supported_format(input) {
        return Err(SyncError::invalid_input(format!(
            "Unsupported file format: {}",
            input.display()
        )));
    }

    progress.start_load(&format!("Reading {}...", input.display()));
    let dataset = loader.load_file(input)?;
    progress.finish_load(&format!(
        "Read {} rows from {}",
        dataset.row_count(),
        input.display()
    ));

    import_dataset_with_progress(connection, table, &dataset, primary_key, config, progress)
}

fn import_command(
    database: Option<&Path>,
    input: &str,
    table: &str,
    primary_key: Option<&str>,
    config: &SyncConfig,
    json: bool,
) -> Result<()> {
    let connection = open_database(Some(&database_path(database)))?;
    let loader = DataLoader::new()?;
    let mut progress = if json {
        ProgressReporter::new_minimal()
    } else {
        ProgressReporter::new_for_import()
    };

    let report = import_file(
        &connection,
        &loader,
        Path::new(input),
        table,
        primary_key,
        config,
        &mut progress,
    )?;

    if json {
        println!("{}", JsonFormatter::format(&report)?);
    } else {
        PrettyPrinter::print_import_report(&report);
    }

    Ok(())
}

fn batch_command(database: Option<&Path>, manifest_path: &Path, json: bool) -> Result<()> {
    let manifest = ImportManifest::load(manifest_path)?;
    let config = manifest.config()?;

    let database = match database {
        Some(path) => path.to_path_buf(),
        None => manifest
            .database_path()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
    };
    let connection = open_database(Some(&database))?;
    let loader = DataLoader::new()?;

    if !json {
        println!(
            "📦 Running {} imports from '{}'...",
            manifest.imports.len(),
            manifest_path.display()
        );
    }

    let mut reports = Vec::with_capacity(manifest.imports.len());
    for entry in &manifest.imports {
        let input = manifest.resolve(entry);
        let mut progress = if json {
            ProgressReporter::new_minimal()
        } else {
            ProgressReporter::new_for_import()
        };

        let report = import_file(
            &connection,
            &loader,
            &input,
            &entry.table,
            manifest.primary_key(&entry.table),
            &config,
            &mut progress,
        )
        .map_err(|e| {
            log::error!("Import of '{}' into `{}` failed", input.display(), entry.table);
            e
        })?;

        if !json {
            PrettyPrinter::print_import_report(&report);
        }
        reports.push(report);
    }

    if json {
        println!("{}", JsonFormatter::format(&reports)?);
    }

    Ok(())
}

fn schema_command(database: Option<&Path>, table: &str, format: &str) -> Result<()> {
    let output_format = parse_format(format)?;
    let connection = open_database(Some(&database_path(database)))?;
    let schema = describe_table(&connection, table)?;

    match output_format {
        OutputFormat::Pretty => PrettyPrinter::print_schema(&schema),
        OutputFormat::Json => println!("{}", JsonFormatter::format(&schema)?),
    }

    Ok(())
}

fn history_command(
    database: Option<&Path>,
    table: &str,
    key: Option<&str>,
    format: &str,
) -> Result<()> {
    let output_format = parse_format(format)?;
    let connection = open_database(Some(&database_path(database)))?;
    let key = key.map(Value::text);
    let history = table_history(&connection, table, key.as_ref())?;

    match output_format {
        OutputFormat::Pretty => PrettyPrinter::print_history(&history),
        OutputFormat::Json => println!("{}", JsonFormatter::format(&history)?),
    }

    Ok(())
}
