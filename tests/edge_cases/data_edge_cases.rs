//! Edge case tests for unusual input data

use crate::common::CliTestRunner;
use tabsync::{
    describe_table, import_dataset, open_database, Backend, ColumnType, Dataset, DataLoader,
    SyncConfig, SyncError, SyncResult, Value,
};

#[test]
fn test_duplicate_keys_last_row_wins() {
    let runner = CliTestRunner::new().unwrap();
    let csv = runner
        .fixture()
        .create_csv(
            "dupes.csv",
            &[
                vec!["id", "status"],
                vec!["1", "draft"],
                vec!["2", "open"],
                vec!["1", "final"],
            ],
        )
        .unwrap();

    runner.import(&csv, "docs", "id").unwrap();

    let fixture = runner.fixture();
    assert_eq!(fixture.count("docs"), 2);
    let status = fixture.query("SELECT \"status\" FROM \"docs\" WHERE \"id\" = 1");
    assert_eq!(status, vec![vec![Value::Text("final".into())]]);
}

#[test]
fn test_whitespace_is_trimmed() {
    let runner = CliTestRunner::new().unwrap();
    let csv = runner
        .fixture()
        .create_csv_raw("spaces.csv", " id , name \n1,  Alice  \n2,   \n")
        .unwrap();

    runner.import(&csv, "people", "id").unwrap();

    let rows = runner
        .fixture()
        .query("SELECT \"id\", \"name\" FROM \"people\" ORDER BY \"id\"");
    assert_eq!(
        rows,
        vec![
            vec![Value::Integer(1), Value::Text("Alice".into())],
            vec![Value::Integer(2), Value::Null],
        ]
    );
}

#[test]
fn test_unicode_values() {
    let runner = CliTestRunner::new().unwrap();
    let csv = runner
        .fixture()
        .create_csv(
            "unicode.csv",
            &[
                vec!["id", "name"],
                vec!["1", "Café"],
                vec!["2", "北京"],
                vec!["3", "🚀"],
            ],
        )
        .unwrap();

    runner.import(&csv, "places", "id").unwrap();

    let conn = open_database(Some(&runner.fixture().db_path())).unwrap();
    let schema = describe_table(&conn, "places").unwrap();
    assert_eq!(schema.column("name").unwrap().column_type, ColumnType::BoundedText(5));
}

#[test]
fn test_header_only_file() {
    let runner = CliTestRunner::new().unwrap();
    let csv = runner.fixture().create_csv_raw("empty.csv", "id,name\n").unwrap();

    runner.import(&csv, "empty", "id").unwrap();

    let fixture = runner.fixture();
    fixture.assert_table_exists("empty");
    assert_eq!(fixture.count("empty"), 0);
}

#[test]
fn test_unknown_columns_are_skipped() {
    let conn = open_database(None).unwrap();
    let config = SyncConfig::default();

    let first = Dataset::from_columns(vec![
        ("id", vec![Value::Integer(1)]),
        ("name", vec![Value::text("a")]),
    ])
    .unwrap();
    import_dataset(&conn, "things", &first, None, &config).unwrap();

    let wider = Dataset::from_columns(vec![
        ("id", vec![Value::Integer(2)]),
        ("name", vec![Value::text("b")]),
        ("extra", vec![Value::text("ignored")]),
    ])
    .unwrap();
    let report = import_dataset(&conn, "things", &wider, None, &config).unwrap();
    assert_eq!(report.result, SyncResult { inserted: 1, updated: 0 });
    assert!(describe_table(&conn, "things").unwrap().column("extra").is_none());
}

#[test]
fn test_missing_columns_are_left_unchanged() {
    let conn = open_database(None).unwrap();
    let config = SyncConfig::default();

    let first = Dataset::from_columns(vec![
        ("id", vec![Value::Integer(1)]),
        ("name", vec![Value::text("a")]),
        ("city", vec![Value::text("Oslo")]),
    ])
    .unwrap();
    import_dataset(&conn, "things", &first, None, &config).unwrap();

    let partial = Dataset::from_columns(vec![
        ("id", vec![Value::Integer(1), Value::Integer(2)]),
        ("name", vec![Value::text("a"), Value::text("b")]),
    ])
    .unwrap();
    let report = import_dataset(&conn, "things", &partial, None, &config).unwrap();
    assert_eq!(report.result, SyncResult { inserted: 1, updated: 0 });

    let rows = conn
        .query_sql("SELECT \"city\" FROM \"things\" ORDER BY \"id\"", &[])
        .unwrap();
    assert_eq!(rows, vec![vec![Value::Text("Oslo".into())], vec![Value::Null]]);
}

#[test]
fn test_stored_primary_key_wins() {
    let conn = open_database(None).unwrap();
    let config = SyncConfig::default();

    let data = Dataset::from_columns(vec![
        ("id", vec![Value::Integer(1)]),
        ("code", vec![Value::text("X")]),
    ])
    .unwrap();
    import_dataset(&conn, "keyed", &data, Some("id"), &config).unwrap();
    import_dataset(&conn, "keyed", &data, Some("code"), &config).unwrap();

    assert_eq!(describe_table(&conn, "keyed").unwrap().primary_key.as_str(), "id");
}

#[test]
fn test_missing_stored_key_column_fails() {
    let conn = open_database(None).unwrap();
    let config = SyncConfig::default();

    let data = Dataset::from_columns(vec![
        ("id", vec![Value::Integer(1)]),
        ("code", vec![Value::text("X")]),
    ])
    .unwrap();
    import_dataset(&conn, "keyed", &data, Some("id"), &config).unwrap();

    let without_key = Dataset::from_columns(vec![("code", vec![Value::text("Y")])]).unwrap();
    let err = import_dataset(&conn, "keyed", &without_key, None, &config).unwrap_err();
    assert!(matches!(err, SyncError::InvalidInput { .. }));
}

#[test]
fn test_null_primary_key_fails_without_writing() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let v1 = fixture
        .create_csv("v1.csv", &[vec!["id", "name"], vec!["1", "a"]])
        .unwrap();
    let v2 = fixture
        .create_csv("v2.csv", &[vec!["id", "name"], vec!["2", "b"], vec!["", "c"]])
        .unwrap();

    runner.import(&v1, "items", "id").unwrap();
    let err = runner.import(&v2, "items", "id").unwrap_err();
    assert!(matches!(err, SyncError::InvalidInput { .. }));
    assert_eq!(fixture.count("items"), 1);
}

#[test]
fn test_reserved_column_name_fails() {
    let runner = CliTestRunner::new().unwrap();
    let csv = runner
        .fixture()
        .create_csv("reserved.csv", &[vec!["id", "import_time"], vec!["1", "x"]])
        .unwrap();

    let err = runner.import(&csv, "reserved", "id").unwrap_err();
    assert!(matches!(err, SyncError::InvalidIdentifier { .. }));
}

#[test]
fn test_type_conflict_is_rejected_at_staging() {
    let conn = open_database(None).unwrap();
    let config = SyncConfig::default();

    let numbers = Dataset::from_columns(vec![
        ("id", vec![Value::Integer(1)]),
        ("qty", vec![Value::text("5")]),
    ])
    .unwrap();
    import_dataset(&conn, "stock", &numbers, None, &config).unwrap();

    let words = Dataset::from_columns(vec![
        ("id", vec![Value::Integer(1)]),
        ("qty", vec![Value::text("five")]),
    ])
    .unwrap();
    let err = import_dataset(&conn, "stock", &words, None, &config).unwrap_err();
    assert_eq!(err.step(), Some(tabsync::Step::Stage));

    let rows = conn.query_sql("SELECT \"qty\" FROM \"stock\"", &[]).unwrap();
    assert_eq!(rows, vec![vec![Value::Integer(5)]]);
}

#[test]
fn test_malformed_csv_reports_path() {
    let runner = CliTestRunner::new().unwrap();
    let csv = runner
        .fixture()
        .create_csv_raw("broken.csv", "id,name\n1,\"unterminated\n")
        .unwrap();

    // DuckDB may recover the row or reject the file; it must never panic or write
    let loader = DataLoader::new().unwrap();
    match loader.load_file(&csv) {
        Ok(dataset) => assert_eq!(dataset.column_names().len(), 2),
        Err(err) => assert!(matches!(
            err,
            SyncError::InvalidInput { .. } | SyncError::DuckDb(_)
        )),
    }
}

#[test]
fn test_primary_key_header_case_is_ignored() {
    let runner = CliTestRunner::new().unwrap();
    let csv = runner
        .fixture()
        .create_csv(
            "mixed.csv",
            &[vec!["name", "ID"], vec!["a", "1"], vec!["a", "2"]],
        )
        .unwrap();

    runner.import(&csv, "mixed", "id").unwrap();

    let fixture = runner.fixture();
    assert_eq!(fixture.count("mixed"), 2);
    let key = fixture.query(
        "SELECT column_name FROM tabsync_columns WHERE table_name = 'mixed' AND is_primary_key = 1",
    );
    assert_eq!(key, vec![vec![Value::Text("ID".into())]]);
}

#[test]
fn test_table_name_case_reconciles_same_table() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let v1 = fixture
        .create_csv("v1.csv", &[vec!["id", "name"], vec!["1", "a"]])
        .unwrap();
    let v2 = fixture
        .create_csv("v2.csv", &[vec!["id", "name"], vec!["1", "b"]])
        .unwrap();

    runner.import(&v1, "People", "id").unwrap();
    runner.import(&v2, "people", "id").unwrap();

    assert_eq!(fixture.count("people"), 1);
    assert_eq!(fixture.count("people_history"), 1);
}

#[test]
fn test_derived_table_suffix_is_rejected() {
    let runner = CliTestRunner::new().unwrap();
    let csv = runner
        .fixture()
        .create_csv("orders.csv", &[vec!["id", "total"], vec!["1", "9"]])
        .unwrap();

    let err = runner.import(&csv, "orders_tmp", "id").unwrap_err();
    assert!(matches!(err, SyncError::InvalidIdentifier { .. }));
    runner.import(&csv, "orders", "id").unwrap();
    assert_eq!(runner.fixture().count("orders"), 1);
}
