//! SQLite-backed checks of catalog introspection and complete comparison runs

use std::path::Path;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};

use dbdiff::catalog::{ConstraintKind, KeyValue};
use dbdiff::config::{Config, DatabaseConfig};
use dbdiff::report::{Summary, EXIT_DIVERGED, EXIT_OK};
use dbdiff::{CatalogProvider, ComparisonLevel, ComparisonOutcome, DatabaseConnection, DbDiffClient};

const SCHEMA: &[&str] = &[
    "CREATE TABLE customers (
        id INTEGER PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        name TEXT
    )",
    "CREATE TABLE orders (
        id INTEGER PRIMARY KEY,
        customer_id INTEGER REFERENCES customers(id),
        total NUMERIC DEFAULT 0
    )",
    "CREATE TABLE notes (body TEXT)",
    "INSERT INTO customers (id, email, name) VALUES (1, 'ann@example.com', 'Ann')",
    "INSERT INTO customers (id, email, name) VALUES (2, 'bob@example.com', NULL)",
    "INSERT INTO orders (id, customer_id, total) VALUES (1, 1, 10)",
    "INSERT INTO orders (id, customer_id, total) VALUES (2, 1, 20)",
    "INSERT INTO orders (id, customer_id, total) VALUES (3, 2, 30)",
    "INSERT INTO notes (body) VALUES ('first')",
];

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}?mode=rwc", path.display())
}

async fn create_database(dir: &TempDir, name: &str, extra: &[&str]) -> String {
    let url = sqlite_url(&dir.path().join(name));
    let connection = DatabaseConnection::connect(&DatabaseConfig::from_url(&url))
        .await
        .expect("Failed to open sqlite database");

    for statement in SCHEMA.iter().chain(extra) {
        connection
            .execute(statement)
            .await
            .unwrap_or_else(|e| panic!("Failed to run {}: {}", statement, e));
    }
    connection.close().await;
    url
}

#[tokio::test]
async fn test_sqlite_catalog_introspection() {
    let dir = tempdir().unwrap();
    let url = create_database(&dir, "source.db", &[]).await;
    let connection = DatabaseConnection::connect(&DatabaseConfig::from_url(&url))
        .await
        .unwrap();
    let catalog = connection.catalog(None);

    assert_eq!(
        catalog.table_names().await.unwrap(),
        vec!["customers", "notes", "orders"]
    );
    assert!(catalog.sequence_names().await.unwrap().is_empty());
    assert_eq!(catalog.table_row_count("orders").await.unwrap(), 3);

    let customers = catalog.table_columns("customers").await.unwrap();
    let kinds: Vec<(&str, ConstraintKind)> = customers
        .iter()
        .map(|c| (c.name.as_str(), c.constraint))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("id", ConstraintKind::PrimaryKey),
            ("email", ConstraintKind::Unique),
            ("name", ConstraintKind::None),
        ]
    );
    assert!(!customers[1].nullable);

    let orders = catalog.table_columns("orders").await.unwrap();
    assert_eq!(orders[1].constraint, ConstraintKind::ForeignKey);
    assert_eq!(orders[2].default.as_deref(), Some("0"));

    assert_eq!(
        catalog.primary_key_column("orders").await.unwrap().as_deref(),
        Some("id")
    );
    assert_eq!(catalog.primary_key_column("notes").await.unwrap(), None);

    assert_eq!(
        catalog.primary_key_values("customers").await.unwrap(),
        vec![KeyValue::from(1), KeyValue::from(2)]
    );
    assert_eq!(
        catalog
            .row_by_primary_key("customers", &KeyValue::from(2))
            .await
            .unwrap(),
        Some(vec![
            Some("2".to_string()),
            Some("bob@example.com".to_string()),
            None
        ])
    );

    connection.close().await;
}

#[tokio::test]
async fn test_identical_sqlite_databases() {
    let dir = tempdir().unwrap();
    let source = create_database(&dir, "source.db", &[]).await;
    let target = create_database(&dir, "target.db", &[]).await;

    let mut config = Config::from_urls(&source, &target);
    config.compare.max_level = ComparisonLevel::RowContent;
    let client = DbDiffClient::new(config).await.unwrap();

    let mut summary = Summary::start();
    let mut events = client.compare().await.unwrap();
    while let Some(event) = events.next().await {
        summary.record(&event);
    }

    assert_eq!(summary.tables.matched, 2);
    assert_eq!(summary.tables.skipped, 1);
    assert_eq!(summary.records.matched, 5);
    assert_eq!(summary.exit_code(), EXIT_OK);
    client.close().await;
}

#[tokio::test]
async fn test_diverging_sqlite_databases() {
    let dir = tempdir().unwrap();
    let source = create_database(&dir, "source.db", &[]).await;
    let target = create_database(
        &dir,
        "target.db",
        &[
            "UPDATE orders SET total = 25 WHERE id = 2",
            // Foreign keys are enforced, so order 3 must stop referencing customer 2
            "UPDATE orders SET customer_id = 1 WHERE id = 3",
            "DELETE FROM customers WHERE id = 2",
            "INSERT INTO customers (id, email, name) VALUES (9, 'zed@example.com', 'Zed')",
        ],
    )
    .await;

    let mut config = Config::from_urls(&source, &target);
    config.compare.max_level = ComparisonLevel::RowContent;
    let client = DbDiffClient::new(config).await.unwrap();

    let events = client.compare().await.unwrap().collect::<Vec<_>>().await;
    let mut summary = Summary::start();
    for event in &events {
        summary.record(event);
    }

    let outcome_of = |table: &str, key: i64| {
        events
            .iter()
            .find(|e| {
                e.name == table
                    && matches!(&e.kind, dbdiff::compare::ObjectKind::Record { key: k } if *k == KeyValue::from(key))
            })
            .map(|e| e.outcome.clone())
    };

    // Same row count on both sides, so the scan reaches the records
    assert_eq!(outcome_of("customers", 2), Some(ComparisonOutcome::MissingInTarget));
    assert_eq!(outcome_of("customers", 9), None);
    assert_eq!(
        outcome_of("orders", 2).and_then(|o| o.mismatch_level()),
        Some(ComparisonLevel::RowContent)
    );
    assert_eq!(
        outcome_of("orders", 3).and_then(|o| o.mismatch_level()),
        Some(ComparisonLevel::RowContent)
    );
    assert_eq!(outcome_of("orders", 1), Some(ComparisonOutcome::Match));
    assert_eq!(summary.exit_code(), EXIT_DIVERGED);
    client.close().await;
}

#[tokio::test]
async fn test_reordered_sqlite_columns_compare_equal() {
    let dir = tempdir().unwrap();
    let source = create_database(
        &dir,
        "source.db",
        &[
            "CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT)",
            "INSERT INTO tags (id, label) VALUES (1, 'red'), (2, 'blue')",
        ],
    )
    .await;
    let target = create_database(
        &dir,
        "target.db",
        &[
            "CREATE TABLE tags (label TEXT, id INTEGER PRIMARY KEY)",
            "INSERT INTO tags (label, id) VALUES ('red', 1), ('blue', 2)",
        ],
    )
    .await;

    let mut config = Config::from_urls(&source, &target);
    config.compare.max_level = ComparisonLevel::RowContent;
    let client = DbDiffClient::new(config).await.unwrap();

    let events = client.compare().await.unwrap().collect::<Vec<_>>().await;
    let tags: Vec<&ComparisonOutcome> = events
        .iter()
        .filter(|e| e.name == "tags")
        .map(|e| &e.outcome)
        .collect();

    assert_eq!(tags.len(), 3);
    assert!(tags.iter().all(|o| o.is_match()), "{:?}", tags);
    client.close().await;
}
