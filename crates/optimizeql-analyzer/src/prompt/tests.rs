use super::*;
use indoc::indoc;
use optimizeql_core::{ColumnDescriptor, ColumnStat, IndexInfo};
use pretty_assertions::assert_eq;

fn users_schema() -> TableSchema {
    TableSchema {
        table_name: "users".to_string(),
        columns: vec![
            ColumnDescriptor {
                column_name: "id".to_string(),
                data_type: "integer".to_string(),
                is_nullable: false,
                column_default: Some("nextval('users_id_seq'::regclass)".to_string()),
            },
            ColumnDescriptor {
                column_name: "email".to_string(),
                data_type: "text".to_string(),
                is_nullable: true,
                column_default: None,
            },
        ],
        row_count: 1_234_567,
        indexes: vec![IndexInfo {
            index_name: "users_pkey".to_string(),
            table_name: "users".to_string(),
            columns: vec!["id".to_string()],
            is_unique: true,
            index_type: "btree".to_string(),
            definition: Some("CREATE UNIQUE INDEX users_pkey ON public.users USING btree (id)".to_string()),
        }],
        column_stats: vec![
            ColumnStat {
                column_name: "email".to_string(),
                null_frac: 0.0125,
                avg_width: 24,
                n_distinct: -1.0,
                ..Default::default()
            },
            ColumnStat {
                column_name: "unanalyzed".to_string(),
                n_distinct: 0.0,
                ..Default::default()
            },
        ],
    }
}

#[test]
fn test_format_table_schema() {
    let expected = indoc! {"
        Table: users  (~1,234,567 rows)
          Columns:
            id  integer  NOT NULL DEFAULT nextval('users_id_seq'::regclass)
            email  text  NULL
          Indexes:
            users_pkey: UNIQUE BTREE (id)
              DDL: CREATE UNIQUE INDEX users_pkey ON public.users USING btree (id)
          Column Statistics:
            email: n_distinct=-1.0, null_frac=1.25%, avg_width=24B"};
    assert_eq!(format_table_schema(&users_schema()), expected);
}

#[test]
fn test_stats_are_capped() {
    let mut schema = TableSchema::empty("wide");
    schema.column_stats = (0..15)
        .map(|i| ColumnStat {
            column_name: format!("c{}", i),
            n_distinct: 5.0,
            ..Default::default()
        })
        .collect();

    let block = format_table_schema(&schema);
    assert!(block.contains("    c9: n_distinct=5.0"));
    assert!(!block.contains("c10:"));
    assert!(!block.contains("Indexes:"));
}

#[test]
fn test_group_thousands() {
    assert_eq!(group_thousands(0), "0");
    assert_eq!(group_thousands(999), "999");
    assert_eq!(group_thousands(1000), "1,000");
    assert_eq!(group_thousands(-1), "-1");
    assert_eq!(group_thousands(-1_234_567), "-1,234,567");
}

#[test]
fn test_offline_user_message() {
    let context = IntrospectionContext::offline("SELECT * FROM users", vec!["users".to_string()]);
    let prompt = PromptBuilder::new().build(&context);

    let expected = indoc! {"
        ## SQL Query
        ```sql
        SELECT * FROM users
        ```

        ## EXPLAIN ANALYZE Output
        _Not available: no live database connection was provided._

        ## Table Schemas & Statistics
        _Not available: no live database connection was provided._"};
    assert_eq!(prompt.user, expected);
    assert!(prompt.system.contains("Detect the SQL dialect"));
}

#[test]
fn test_user_message_with_plan_and_schema() {
    let mut context = IntrospectionContext::offline("SELECT * FROM users", vec!["users".to_string()])
        .with_dialect(Some(Dialect::Postgresql));
    context.explain = Some(ExplainResult {
        raw_plan: "Seq Scan on users".to_string(),
        planning_time_ms: Some(0.1234),
        execution_time_ms: Some(12.0),
    });
    context.table_schemas = vec![users_schema()];

    let prompt = PromptBuilder::new().build(&context);
    assert!(prompt.user.contains(
        "## EXPLAIN ANALYZE Output\nPlanning time: 0.12 ms\nExecution time: 12.00 ms\n```\nSeq Scan on users\n```"
    ));
    assert!(prompt.user.contains("## Table Schemas & Statistics\n```\nTable: users  (~1,234,567 rows)"));
    assert!(prompt.user.ends_with("avg_width=24B\n```"));
}

#[test]
fn test_plan_without_timings() {
    let mut context = IntrospectionContext::offline("SELECT 1", Vec::new());
    context.explain = Some(ExplainResult {
        raw_plan: "-> Rows fetched before execution".to_string(),
        planning_time_ms: None,
        execution_time_ms: None,
    });
    let prompt = PromptBuilder::new().build(&context);
    assert!(prompt.user.contains("## EXPLAIN ANALYZE Output\n```\n-> Rows fetched before execution\n```"));
}

#[test]
fn test_system_prompt_per_dialect() {
    let builder = PromptBuilder::new();
    let postgres = builder.system_prompt(Some(Dialect::Postgresql));
    let mysql = builder.system_prompt(Some(Dialect::Mysql));
    let generic = builder.system_prompt(None);

    assert!(postgres.contains("specializing in PostgreSQL"));
    assert!(postgres.contains("btree, gin, gist, brin, hash, partial, covering"));
    assert!(mysql.contains("specializing in MySQL/InnoDB"));
    assert!(mysql.contains("btree, hash, fulltext, spatial, composite, covering"));
    assert!(generic.contains("most appropriate for the detected dialect"));

    for prompt in [postgres, mysql, generic] {
        assert!(prompt.contains("\"materialized_views\": ["));
        assert!(prompt.contains("Do NOT suggest dropping existing indexes"));
        assert!(!prompt.contains("{response_schema}"));
        assert!(!prompt.contains("{rules}"));
    }
}

#[test]
fn test_checklist_order() {
    for dialect in [Dialect::Postgresql, Dialect::Mysql] {
        let prompt = PromptBuilder::new().system_prompt(Some(dialect));
        let positions: Vec<usize> = ["\n1. ESTIMATION", "\n2. MISSING", "\n3. QUERY REWRITES", "\n4. MEMORY", "\n5. "]
            .iter()
            .map(|heading| prompt.find(heading).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", positions);
    }
}
