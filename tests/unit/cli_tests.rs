//! Unit tests for CLI argument parsing and validation

use clap::Parser;
use std::path::PathBuf;
use tabsync::cli::{Cli, Commands, OutputFormat};

#[test]
fn test_cli_import_command() {
    let cli = Cli::try_parse_from(["tabsync", "import", "data.csv", "--table", "orders"]).unwrap();
    match cli.command {
        Commands::Import {
            input,
            table,
            primary_key,
            length_weight,
            length_limit,
            json,
        } => {
            assert_eq!(input, "data.csv");
            assert_eq!(table, "orders");
            assert!(primary_key.is_none());
            assert!(length_weight.is_none());
            assert!(length_limit.is_none());
            assert!(!json);
        }
        _ => panic!("Expected Import command"),
    }
    assert!(cli.database.is_none());
    assert!(!cli.verbose);
}

#[test]
fn test_cli_import_command_with_options() {
    let cli = Cli::try_parse_from([
        "tabsync",
        "import",
        "data.csv",
        "--table",
        "orders",
        "--primary-key",
        "order_id",
        "--length-weight",
        "1.5",
        "--length-limit",
        "255",
        "--json",
        "--database",
        "store.duckdb",
        "-v",
    ])
    .unwrap();

    match cli.command {
        Commands::Import {
            primary_key,
            length_weight,
            length_limit,
            json,
            ..
        } => {
            assert_eq!(primary_key.as_deref(), Some("order_id"));
            assert_eq!(length_weight, Some(1.5));
            assert_eq!(length_limit, Some(255));
            assert!(json);
        }
        _ => panic!("Expected Import command"),
    }
    assert_eq!(cli.database, Some(PathBuf::from("store.duckdb")));
    assert!(cli.verbose);
}

#[test]
fn test_cli_import_requires_table() {
    assert!(Cli::try_parse_from(["tabsync", "import", "data.csv"]).is_err());
}

#[test]
fn test_cli_rejects_invalid_length_options() {
    let base = ["tabsync", "import", "data.csv", "--table", "t"];

    let mut args = base.to_vec();
    args.extend(["--length-weight", "0"]);
    assert!(Cli::try_parse_from(args).is_err());

    let mut args = base.to_vec();
    args.extend(["--length-limit", "0"]);
    assert!(Cli::try_parse_from(args).is_err());

    let mut args = base.to_vec();
    args.extend(["--length-limit", "many"]);
    assert!(Cli::try_parse_from(args).is_err());
}

#[test]
fn test_cli_batch_command() {
    let cli = Cli::try_parse_from(["tabsync", "batch", "imports.json"]).unwrap();
    match cli.command {
        Commands::Batch { manifest, json } => {
            assert_eq!(manifest, PathBuf::from("imports.json"));
            assert!(!json);
        }
        _ => panic!("Expected Batch command"),
    }
}

#[test]
fn test_cli_schema_and_history_commands() {
    let cli = Cli::try_parse_from(["tabsync", "schema", "orders"]).unwrap();
    match cli.command {
        Commands::Schema { table, format } => {
            assert_eq!(table, "orders");
            assert_eq!(format, "pretty");
        }
        _ => panic!("Expected Schema command"),
    }

    let cli =
        Cli::try_parse_from(["tabsync", "history", "orders", "--key", "42", "--format", "json"])
            .unwrap();
    match cli.command {
        Commands::History { table, key, format } => {
            assert_eq!(table, "orders");
            assert_eq!(key.as_deref(), Some("42"));
            assert_eq!(OutputFormat::parse(&format), Ok(OutputFormat::Json));
        }
        _ => panic!("Expected History command"),
    }
}

#[test]
fn test_cli_unknown_command() {
    assert!(Cli::try_parse_from(["tabsync", "export"]).is_err());
}
