//! Connector contract checks against live servers

#[cfg(test)]
mod tests {
    use crate::fixtures::{TestDriver, connection_config, test_connector};
    use optimizeql_core::{Connector, OptimizeError};
    use rstest::rstest;
    use std::time::{Duration, Instant};

    #[rstest]
    #[case::postgres(TestDriver::Postgres)]
    #[case::mysql(TestDriver::Mysql)]
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_ping_and_close(#[case] driver: TestDriver) -> anyhow::Result<()> {
        let connector = test_connector(driver).await?;
        assert_eq!(connector.dialect(), driver.dialect());
        assert!(connector.test_connection().await);

        connector.close().await;
        connector.close().await;
        assert!(connector.is_closed());
        assert!(!connector.test_connection().await);
        Ok(())
    }

    #[rstest]
    #[case::postgres(TestDriver::Postgres)]
    #[case::mysql(TestDriver::Mysql)]
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_explain_analyze(#[case] driver: TestDriver) -> anyhow::Result<()> {
        let connector = test_connector(driver).await?;
        let explain = connector
            .explain_analyze(
                "SELECT u.email, SUM(o.total) FROM users u JOIN orders o ON o.user_id = u.id GROUP BY u.email",
                10_000,
            )
            .await?;

        assert!(!explain.raw_plan.is_empty());
        match driver {
            TestDriver::Postgres => {
                assert!(explain.raw_plan.contains("\"Plan\""), "{}", explain.raw_plan);
                assert!(explain.execution_time_ms.is_some());
            }
            TestDriver::Mysql => {
                assert!(explain.raw_plan.contains("actual time"), "{}", explain.raw_plan);
            }
        }
        connector.close().await;
        Ok(())
    }

    #[rstest]
    #[case::postgres(TestDriver::Postgres)]
    #[case::mysql(TestDriver::Mysql)]
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_explain_invalid_sql_is_plan_error(#[case] driver: TestDriver) -> anyhow::Result<()> {
        let connector = test_connector(driver).await?;
        let err = connector
            .explain_analyze("SELECT * FROM no_such_table", 5_000)
            .await
            .unwrap_err();
        assert!(matches!(err, OptimizeError::PlanExecution(_)), "{:?}", err);

        // the session survives the failed statement
        assert!(connector.test_connection().await);
        connector.close().await;
        Ok(())
    }

    #[rstest]
    #[case::postgres(TestDriver::Postgres)]
    #[case::mysql(TestDriver::Mysql)]
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_table_schema(#[case] driver: TestDriver) -> anyhow::Result<()> {
        let connector = test_connector(driver).await?;
        let schema = connector.get_table_schema("orders", None).await?;

        assert_eq!(schema.table_name, "orders");
        let columns: Vec<_> = schema.columns.iter().map(|c| c.column_name.as_str()).collect();
        assert_eq!(columns, vec!["id", "user_id", "total", "status"]);
        assert!(!schema.columns[1].is_nullable);
        assert!(schema.row_count > 0, "row estimate {}", schema.row_count);
        assert!(
            schema
                .indexes
                .iter()
                .any(|idx| idx.index_name == "idx_orders_user_id" && idx.columns == vec!["user_id"] && !idx.is_unique)
        );
        assert!(schema.indexes.iter().any(|idx| idx.is_unique && idx.columns == vec!["id"]));

        if driver == TestDriver::Postgres {
            assert!(schema.column_stats.iter().any(|s| s.column_name == "status"));
        }
        connector.close().await;
        Ok(())
    }

    #[rstest]
    #[case::postgres(TestDriver::Postgres)]
    #[case::mysql(TestDriver::Mysql)]
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_missing_table_has_empty_schema(#[case] driver: TestDriver) -> anyhow::Result<()> {
        let connector = test_connector(driver).await?;
        let schema = connector.get_table_schema("no_such_table", None).await?;
        assert!(schema.is_empty());
        assert_eq!(schema.table_name, "no_such_table");
        connector.close().await;
        Ok(())
    }

    #[rstest]
    #[case::postgres(TestDriver::Postgres)]
    #[case::mysql(TestDriver::Mysql)]
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_existing_indexes_across_tables(#[case] driver: TestDriver) -> anyhow::Result<()> {
        let connector = test_connector(driver).await?;
        let indexes = connector
            .get_existing_indexes(&["orders".to_string(), "users".to_string()])
            .await?;

        assert!(indexes.iter().any(|idx| idx.table_name == "users"));
        assert!(indexes.iter().any(|idx| idx.index_name == "idx_orders_user_id"));
        assert!(connector.get_existing_indexes(&[]).await?.is_empty());
        connector.close().await;
        Ok(())
    }

    #[rstest]
    #[case::postgres(TestDriver::Postgres)]
    #[case::mysql(TestDriver::Mysql)]
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_execute_limited_caps_rows(#[case] driver: TestDriver) -> anyhow::Result<()> {
        let connector = test_connector(driver).await?;
        let rows = connector
            .execute_limited("SELECT id, email FROM users ORDER BY id;", 5, 5_000)
            .await?;

        assert_eq!(rows.columns, vec!["id", "email"]);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows.rows[0][0].as_i64(), Some(1));
        assert_eq!(rows.rows[0][1].as_str(), Some("user1@example.com"));
        connector.close().await;
        Ok(())
    }

    #[rstest]
    #[case::postgres(TestDriver::Postgres)]
    #[case::mysql(TestDriver::Mysql)]
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_writes_are_rejected(#[case] driver: TestDriver) -> anyhow::Result<()> {
        let connector = test_connector(driver).await?;
        let write = connector
            .execute_limited("INSERT INTO users (email) VALUES ('intruder@example.com')", 10, 5_000)
            .await;
        assert!(write.is_err());

        let count = connector
            .execute_limited("SELECT COUNT(*) FROM users WHERE email = 'intruder@example.com'", 1, 5_000)
            .await?;
        assert_eq!(count.rows[0][0].as_i64(), Some(0));
        connector.close().await;
        Ok(())
    }

    const STATEMENT_CHAIN: &str = "SELECT 1; COMMIT; SET SESSION TRANSACTION READ WRITE; DELETE FROM orders";

    async fn order_count(connector: &dyn Connector) -> anyhow::Result<Option<i64>> {
        let count = connector.execute_limited("SELECT COUNT(*) FROM orders", 1, 5_000).await?;
        Ok(count.rows[0][0].as_i64())
    }

    #[rstest]
    #[case::postgres(TestDriver::Postgres)]
    #[case::mysql(TestDriver::Mysql)]
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_explain_of_writes_leaves_no_trace(#[case] driver: TestDriver) -> anyhow::Result<()> {
        let connector = test_connector(driver).await?;
        let before = order_count(connector.as_ref()).await?;

        for sql in [
            "INSERT INTO orders (user_id, total, status) VALUES (1, 9.99, 'explained')",
            "UPDATE orders SET status = 'explained'",
            "DELETE FROM orders",
        ] {
            // the read-only transaction may refuse the statement outright
            let _ = connector.explain_analyze(sql, 5_000).await;
        }

        assert_eq!(order_count(connector.as_ref()).await?, before);
        let explained = connector
            .execute_limited("SELECT COUNT(*) FROM orders WHERE status = 'explained'", 1, 5_000)
            .await?;
        assert_eq!(explained.rows[0][0].as_i64(), Some(0));
        connector.close().await;
        Ok(())
    }

    #[rstest]
    #[case::postgres(TestDriver::Postgres)]
    #[case::mysql(TestDriver::Mysql)]
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_statement_chains_are_rejected(#[case] driver: TestDriver) -> anyhow::Result<()> {
        let connector = test_connector(driver).await?;
        let before = order_count(connector.as_ref()).await?;
        assert_eq!(before, Some(2000));

        let err = connector.execute_limited(STATEMENT_CHAIN, 10, 5_000).await.unwrap_err();
        assert!(matches!(err, OptimizeError::Query(_)), "{:?}", err);
        let err = connector.explain_analyze(STATEMENT_CHAIN, 5_000).await.unwrap_err();
        assert!(matches!(err, OptimizeError::PlanExecution(_)), "{:?}", err);

        assert_eq!(order_count(connector.as_ref()).await?, before);
        connector.close().await;
        Ok(())
    }

    #[rstest]
    #[case::postgres(TestDriver::Postgres)]
    #[case::mysql(TestDriver::Mysql)]
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_execute_limited_keeps_duplicate_column_names(#[case] driver: TestDriver) -> anyhow::Result<()> {
        let connector = test_connector(driver).await?;
        let rows = connector
            .execute_limited(
                "SELECT u.id, o.id FROM users u JOIN orders o ON o.user_id = u.id ORDER BY o.id",
                3,
                5_000,
            )
            .await?;

        assert_eq!(rows.columns, vec!["id", "id"]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.rows[0][0].as_i64(), Some(2));
        assert_eq!(rows.rows[0][1].as_i64(), Some(1));
        connector.close().await;
        Ok(())
    }

    #[rstest]
    #[case::postgres(TestDriver::Postgres)]
    #[case::mysql(TestDriver::Mysql)]
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_statement_timeout_is_enforced(#[case] driver: TestDriver) -> anyhow::Result<()> {
        let connector = test_connector(driver).await?;
        let started = Instant::now();
        let outcome = connector.execute_limited(&driver.sleep_sql(10), 1, 500).await;

        assert!(started.elapsed() < Duration::from_secs(8), "took {:?}", started.elapsed());
        if driver == TestDriver::Postgres {
            assert!(outcome.is_err());
        }
        assert!(connector.test_connection().await);
        connector.close().await;
        Ok(())
    }

    #[rstest]
    #[case::postgres(TestDriver::Postgres)]
    #[case::mysql(TestDriver::Mysql)]
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_closed_connector_fails_fast(#[case] driver: TestDriver) -> anyhow::Result<()> {
        let connector = test_connector(driver).await?;
        connector.close().await;

        let started = Instant::now();
        assert!(connector.explain_analyze("SELECT 1", 1_000).await.is_err());
        assert!(connector.get_table_schema("users", None).await.is_err());
        assert!(connector.execute_limited("SELECT 1", 1, 1_000).await.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
        Ok(())
    }

    #[rstest]
    #[case::postgres(TestDriver::Postgres)]
    #[case::mysql(TestDriver::Mysql)]
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_connection_helper(#[case] driver: TestDriver) -> anyhow::Result<()> {
        let mut config = connection_config(driver).await?;
        assert!(optimizeql_drivers::test_connection(&config).await);

        config.password = Some("wrong-password".to_string());
        assert!(!optimizeql_drivers::test_connection(&config).await);
        Ok(())
    }
}
