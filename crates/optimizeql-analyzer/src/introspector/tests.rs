use super::*;
use crate::test_support::{MockConnector, init_test_logging};
use optimizeql_core::{ColumnDescriptor, TableSchema};
use pretty_assertions::assert_eq;

fn schema(table: &str) -> TableSchema {
    TableSchema {
        table_name: table.to_string(),
        columns: vec![ColumnDescriptor {
            column_name: "id".to_string(),
            data_type: "integer".to_string(),
            is_nullable: false,
            column_default: None,
        }],
        row_count: 10,
        ..Default::default()
    }
}

const JOIN_SQL: &str = "SELECT * FROM users u JOIN orders o ON o.user_id = u.id";

#[tokio::test]
async fn test_full_context() {
    init_test_logging();
    let connector = MockConnector::new(Dialect::Postgresql)
        .with_plan("Seq Scan on users")
        .with_schema(schema("users"))
        .with_schema(schema("orders"));

    let context = Introspector::new(&connector, 2500).introspect(JOIN_SQL).await;

    assert_eq!(context.sql, JOIN_SQL);
    assert_eq!(context.dialect, Some(Dialect::Postgresql));
    assert_eq!(context.table_names, vec!["orders", "users"]);
    assert_eq!(context.explain.unwrap().raw_plan, "Seq Scan on users");
    assert_eq!(context.explain_error, None);
    let names: Vec<_> = context.table_schemas.iter().map(|s| s.table_name.as_str()).collect();
    assert_eq!(names, vec!["orders", "users"]);
}

#[tokio::test]
async fn test_explain_failure_is_recorded_not_fatal() {
    init_test_logging();
    let connector = MockConnector::new(Dialect::Mysql)
        .with_explain_error("canceling statement due to statement timeout")
        .with_schema(schema("users"));

    let context = Introspector::new(&connector, 100).introspect("SELECT * FROM users").await;

    assert_eq!(context.explain, None);
    assert_eq!(
        context.explain_error.as_deref(),
        Some("Plan execution error: canceling statement due to statement timeout")
    );
    assert_eq!(context.table_schemas.len(), 1);
}

#[tokio::test]
async fn test_failed_schema_keeps_table_name() {
    init_test_logging();
    let connector = MockConnector::new(Dialect::Postgresql)
        .with_plan("plan")
        .with_schema(schema("users"))
        .with_failing_table("orders");

    let context = Introspector::new(&connector, 1000).introspect(JOIN_SQL).await;

    assert_eq!(context.table_names, vec!["orders", "users"]);
    assert_eq!(context.table_schemas.len(), 1);
    assert_eq!(context.table_schemas[0].table_name, "users");
    assert_eq!(*connector.schema_calls.lock().unwrap(), vec!["orders", "users"]);
}

#[tokio::test]
async fn test_unknown_table_is_left_out() {
    let connector = MockConnector::new(Dialect::Postgresql).with_plan("plan");
    let context = Introspector::new(&connector, 1000).introspect("SELECT * FROM ghosts").await;
    assert_eq!(context.table_names, vec!["ghosts"]);
    assert!(context.table_schemas.is_empty());
}

#[tokio::test]
async fn test_offline_context() {
    let context = Introspector::offline(Some(Dialect::Mysql)).introspect(JOIN_SQL).await;
    assert_eq!(context.table_names, vec!["orders", "users"]);
    assert_eq!(context.dialect, Some(Dialect::Mysql));
    assert_eq!(context.explain, None);
    assert_eq!(context.explain_error, None);
    assert!(context.table_schemas.is_empty());
}
