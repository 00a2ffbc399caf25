//! End-to-end properties of repeated imports through the library API

use tabsync::{
    describe_table, import_dataset, open_database, Backend, ColumnChange, ColumnType, Dataset,
    SchemaOutcome, SyncConfig, SyncResult, Value,
};

fn dataset(columns: Vec<(&str, Vec<Value>)>) -> Dataset {
    Dataset::from_columns(columns).unwrap()
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|v| Value::Integer(*v)).collect()
}

fn texts(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::text(v)).collect()
}

fn column_type(conn: &duckdb::Connection, table: &str, column: &str) -> ColumnType {
    describe_table(conn, table)
        .unwrap()
        .column(column)
        .unwrap()
        .column_type
}

#[test]
fn test_idempotence() {
    let conn = open_database(None).unwrap();
    let config = SyncConfig::default();
    let data = dataset(vec![
        ("id", ints(&[1, 2, 3, 4])),
        ("name", texts(&["a", "b", "", "d"])),
        ("score", vec![1.5.into(), Value::Null, 3.0.into(), 4.25.into()]),
    ]);

    let first = import_dataset(&conn, "scores", &data, Some("id"), &config).unwrap();
    assert_eq!(first.result, SyncResult { inserted: 4, updated: 0 });

    let second = import_dataset(&conn, "scores", &data, Some("id"), &config).unwrap();
    assert_eq!(second.result, SyncResult { inserted: 0, updated: 0 });
    assert_eq!(second.outcome, SchemaOutcome::Reconciled { changes: vec![] });
}

#[test]
fn test_monotonic_widening() {
    let conn = open_database(None).unwrap();
    let config = SyncConfig::default();

    let long = dataset(vec![("id", ints(&[1])), ("name", texts(&["a fairly long name"]))]);
    import_dataset(&conn, "names", &long, None, &config).unwrap();
    let stored = column_type(&conn, "names", "name");
    assert_eq!(stored, ColumnType::BoundedText(22));

    let short = dataset(vec![("id", ints(&[2])), ("name", texts(&["Al"]))]);
    let report = import_dataset(&conn, "names", &short, None, &config).unwrap();
    assert!(!report.outcome.changed_schema());
    assert_eq!(column_type(&conn, "names", "name"), stored);
}

#[test]
fn test_widening_reports_change() {
    let conn = open_database(None).unwrap();
    let config = SyncConfig::default();

    let short = dataset(vec![("id", ints(&[1])), ("name", texts(&["Al"]))]);
    import_dataset(&conn, "names", &short, None, &config).unwrap();

    let long = dataset(vec![("id", ints(&[2])), ("name", texts(&["a fairly long name"]))]);
    let report = import_dataset(&conn, "names", &long, None, &config).unwrap();
    assert_eq!(
        report.outcome,
        SchemaOutcome::Reconciled {
            changes: vec![ColumnChange::Widened {
                column: "name".into(),
                from: 3,
                to: 22
            }]
        }
    );
    assert_eq!(report.result.inserted, 1);
}

#[test]
fn test_text_promotion_is_permanent() {
    let conn = open_database(None).unwrap();
    let config = SyncConfig::default();

    let short = dataset(vec![("id", ints(&[1])), ("body", texts(&["hello"]))]);
    import_dataset(&conn, "posts", &short, None, &config).unwrap();

    let huge = "x".repeat(1200);
    let long = dataset(vec![("id", ints(&[2])), ("body", texts(&[huge.as_str()]))]);
    let report = import_dataset(&conn, "posts", &long, None, &config).unwrap();
    assert_eq!(
        report.outcome,
        SchemaOutcome::Reconciled {
            changes: vec![ColumnChange::Promoted {
                column: "body".into(),
                from: 6
            }]
        }
    );
    assert_eq!(column_type(&conn, "posts", "body"), ColumnType::UnboundedText);

    let tiny = dataset(vec![("id", ints(&[3])), ("body", texts(&["hi"]))]);
    import_dataset(&conn, "posts", &tiny, None, &config).unwrap();
    assert_eq!(column_type(&conn, "posts", "body"), ColumnType::UnboundedText);

    let stored = conn
        .query_sql("SELECT length(\"body\") FROM \"posts\" WHERE \"id\" = 2", &[])
        .unwrap();
    assert_eq!(stored, vec![vec![Value::Integer(1200)]]);
}

#[test]
fn test_null_safe_noop() {
    let conn = open_database(None).unwrap();
    let config = SyncConfig::default();
    let data = dataset(vec![
        ("pk", ints(&[1])),
        ("x", vec![Value::Null]),
        ("y", texts(&["kept"])),
    ]);

    import_dataset(&conn, "nulls", &data, Some("pk"), &config).unwrap();
    let report = import_dataset(&conn, "nulls", &data, Some("pk"), &config).unwrap();

    assert_eq!(report.result.updated, 0);
    let history = conn
        .query_sql("SELECT COUNT(*) FROM \"nulls_history\"", &[])
        .unwrap();
    assert_eq!(history, vec![vec![Value::Integer(0)]]);
}

#[test]
fn test_history_fidelity() {
    let conn = open_database(None).unwrap();
    let config = SyncConfig::default();

    let before = dataset(vec![("pk", ints(&[1])), ("a", texts(&["x"])), ("b", ints(&[5]))]);
    import_dataset(&conn, "t", &before, Some("pk"), &config).unwrap();

    let after = dataset(vec![("pk", ints(&[1])), ("a", texts(&["y"])), ("b", ints(&[5]))]);
    let report = import_dataset(&conn, "t", &after, Some("pk"), &config).unwrap();
    assert_eq!(report.result, SyncResult { inserted: 0, updated: 1 });

    let history = conn
        .query_sql("SELECT \"pk\", \"a\", \"b\" FROM \"t_history\"", &[])
        .unwrap();
    assert_eq!(
        history,
        vec![vec![Value::Integer(1), Value::Text("x".into()), Value::Integer(5)]]
    );

    let main = conn
        .query_sql("SELECT \"pk\", \"a\", \"b\" FROM \"t\"", &[])
        .unwrap();
    assert_eq!(
        main,
        vec![vec![Value::Integer(1), Value::Text("y".into()), Value::Integer(5)]]
    );
}

#[test]
fn test_insert_only_batch() {
    let conn = open_database(None).unwrap();
    let data = dataset(vec![("pk", ints(&[1, 2, 3])), ("v", texts(&["a", "b", "c"]))]);

    let report = import_dataset(&conn, "fresh", &data, Some("pk"), &SyncConfig::default()).unwrap();
    assert_eq!(report.outcome, SchemaOutcome::Created);
    assert_eq!(report.result, SyncResult { inserted: 3, updated: 0 });

    let history = conn
        .query_sql("SELECT COUNT(*) FROM \"fresh_history\"", &[])
        .unwrap();
    assert_eq!(history, vec![vec![Value::Integer(0)]]);
}

#[test]
fn test_type_inference_boundary_on_create() {
    let conn = open_database(None).unwrap();
    let config = SyncConfig::default();

    let wide = "w".repeat(900);
    let narrow = "n".repeat(800);
    let data = dataset(vec![
        ("id", ints(&[1])),
        ("wide", texts(&[wide.as_str()])),
        ("narrow", texts(&[narrow.as_str()])),
    ]);
    import_dataset(&conn, "bounds", &data, None, &config).unwrap();

    assert_eq!(column_type(&conn, "bounds", "wide"), ColumnType::UnboundedText);
    assert_eq!(column_type(&conn, "bounds", "narrow"), ColumnType::BoundedText(960));
}

#[test]
fn test_import_time_advances_only_on_change() {
    let conn = open_database(None).unwrap();
    let config = SyncConfig::default();

    let data = dataset(vec![("pk", ints(&[1, 2])), ("v", texts(&["a", "b"]))]);
    import_dataset(&conn, "stamps", &data, Some("pk"), &config).unwrap();
    let stamps = |conn: &duckdb::Connection| {
        conn.query_sql("SELECT \"import_time\" FROM \"stamps\" ORDER BY \"pk\"", &[])
            .unwrap()
    };
    let original = stamps(&conn);
    assert!(original.iter().all(|row| matches!(row[0], Value::Timestamp(_))));

    std::thread::sleep(std::time::Duration::from_millis(20));
    let changed = dataset(vec![("pk", ints(&[1, 2])), ("v", texts(&["a", "B"]))]);
    import_dataset(&conn, "stamps", &changed, Some("pk"), &config).unwrap();

    let updated = stamps(&conn);
    assert_eq!(updated[0], original[0]);
    assert_ne!(updated[1], original[1]);

    let archived = conn
        .query_sql("SELECT \"import_time\" FROM \"stamps_history\"", &[])
        .unwrap();
    assert_eq!(archived, vec![original[1].clone()]);
}
