//! History capture across several imports

use tabsync::history::fetch_history;
use tabsync::{describe_table, import_dataset, open_database, table_history, Dataset, SyncConfig, Value};

fn version(price: f64, note: Option<&str>) -> Dataset {
    Dataset::from_columns(vec![
        ("sku", vec![Value::text("A-1"), Value::text("B-2")]),
        ("price", vec![Value::Float(price), Value::Float(9.99)]),
        ("note", vec![Value::from(note), Value::Null]),
    ])
    .unwrap()
}

#[test]
fn test_history_keeps_every_version_oldest_first() {
    let conn = open_database(None).unwrap();
    let config = SyncConfig::default();

    import_dataset(&conn, "catalog", &version(1.0, None), Some("sku"), &config).unwrap();
    import_dataset(&conn, "catalog", &version(2.0, None), Some("sku"), &config).unwrap();
    import_dataset(&conn, "catalog", &version(2.0, Some("sale")), Some("sku"), &config).unwrap();
    import_dataset(&conn, "catalog", &version(3.0, Some("sale")), Some("sku"), &config).unwrap();

    let history = table_history(&conn, "catalog", None).unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(
        history.columns,
        vec!["history_id", "sku", "price", "note", "import_time"]
    );

    let prices: Vec<&Value> = (0..history.len())
        .map(|i| history.value(i, "price").unwrap())
        .collect();
    assert_eq!(prices, vec![&Value::Float(1.0), &Value::Float(2.0), &Value::Float(2.0)]);
    assert_eq!(history.value(0, "note"), Some(&Value::Null));
    assert_eq!(history.value(2, "note"), Some(&Value::Text("sale".into())));

    // B-2 never changed
    let untouched = table_history(&conn, "catalog", Some(&Value::text("B-2"))).unwrap();
    assert!(untouched.is_empty());
}

#[test]
fn test_fetch_history_for_one_key() {
    let conn = open_database(None).unwrap();
    let config = SyncConfig::default();

    let first = Dataset::from_columns(vec![
        ("id", vec![Value::Integer(1), Value::Integer(2)]),
        ("status", vec![Value::text("new"), Value::text("new")]),
    ])
    .unwrap();
    let second = Dataset::from_columns(vec![
        ("id", vec![Value::Integer(1), Value::Integer(2)]),
        ("status", vec![Value::text("paid"), Value::text("void")]),
    ])
    .unwrap();
    import_dataset(&conn, "orders", &first, None, &config).unwrap();
    import_dataset(&conn, "orders", &second, None, &config).unwrap();

    let schema = describe_table(&conn, "orders").unwrap();
    // Text keys are converted to the key column's type
    let history = fetch_history(&conn, &schema, Some(&Value::text("2"))).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history.value(0, "id"), Some(&Value::Integer(2)));
    assert_eq!(history.value(0, "status"), Some(&Value::Text("new".into())));

    let json = serde_json::to_value(&history).unwrap();
    assert_eq!(json["table"], "orders_history");
    assert_eq!(json["rows"][0][1], 2);
}

#[test]
fn test_history_of_unknown_table_fails() {
    let conn = open_database(None).unwrap();
    assert!(table_history(&conn, "nothing", None).is_err());
}
