use super::*;
use indoc::indoc;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case::simple_select("SELECT * FROM users WHERE id = 1", &["users"])]
#[case::join("SELECT u.name, o.total FROM users u JOIN orders o ON o.user_id = u.id", &["orders", "users"])]
#[case::self_join("SELECT * FROM users u1 JOIN users u2 ON u1.id=u2.id", &["users"])]
#[case::comma_tables("SELECT * FROM c, a, b WHERE a.id = b.id AND b.id = c.id", &["a", "b", "c"])]
#[case::subquery(
    "SELECT * FROM users WHERE id IN (SELECT user_id FROM orders WHERE total > 100)",
    &["orders", "users"]
)]
#[case::insert_select("INSERT INTO orders SELECT * FROM users", &["orders", "users"])]
#[case::schema_qualified("SELECT * FROM public.Users", &["users"])]
#[case::uppercase("SELECT * FROM USERS JOIN Orders ON USERS.id = Orders.user_id", &["orders", "users"])]
fn test_extracts_tables(#[case] sql: &str, #[case] expected: &[&str]) {
    assert_eq!(extract_table_names(sql, None), expected);
}

#[test]
fn test_cte_names_are_not_tables() {
    let sql = indoc! {"
        WITH recent AS (
            SELECT * FROM orders WHERE created_at > now() - interval '1 day'
        )
        SELECT * FROM recent JOIN users ON users.id = recent.user_id
    "};
    assert_eq!(extract_table_names(sql, Some(Dialect::Postgresql)), vec!["orders", "users"]);

    let tables = extract_table_names("WITH cte AS (SELECT * FROM users) SELECT * FROM cte", None);
    assert_eq!(tables, vec!["users"]);
}

#[rstest]
#[case::cte_shadowing_its_source(
    "WITH users AS (SELECT * FROM users WHERE active) SELECT * FROM users JOIN orders ON orders.user_id = users.id",
    &["orders", "users"]
)]
#[case::later_cte_not_visible_earlier("WITH a AS (SELECT * FROM b), b AS (SELECT * FROM a) SELECT * FROM b", &["b"])]
#[case::recursive("WITH RECURSIVE t (n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM t WHERE n < 5) SELECT * FROM t JOIN users ON true", &["users"])]
#[case::scope_ends_with_subquery(
    "SELECT * FROM (WITH t AS (SELECT * FROM orders) SELECT * FROM t) x JOIN t ON true",
    &["orders", "t"]
)]
#[case::qualified_name_is_a_table("WITH users AS (SELECT 1 AS id) SELECT * FROM public.users JOIN users ON true", &["users"])]
fn test_cte_scoping(#[case] sql: &str, #[case] expected: &[&str]) {
    assert_eq!(extract_table_names(sql, Some(Dialect::Postgresql)), expected);
}

#[test]
fn test_mysql_backticks() {
    let tables = extract_table_names("SELECT * FROM `shop`.`Orders` o JOIN `users` u ON u.id = o.user_id", Some(Dialect::Mysql));
    assert_eq!(tables, vec!["orders", "users"]);
}

#[test]
fn test_unparseable_sql_falls_back_to_scan() {
    let sql = "SELECT * FROM \"Sales\".\"Orders\" o JOIN customers c ON WHERE GARBAGE ((";
    assert_eq!(extract_table_names(sql, None), vec!["customers", "orders"]);
}

#[test]
fn test_scan_is_sorted_and_deduplicated() {
    assert_eq!(
        scan_tables("select 1 from b join a on x join B on y from `a`"),
        vec!["a", "b"]
    );
}

#[test]
fn test_no_tables() {
    assert!(extract_table_names("SELECT 1", None).is_empty());
    assert!(extract_table_names("", None).is_empty());
    assert!(extract_table_names("not sql at all", None).is_empty());
}

#[test]
fn test_deterministic() {
    let sql = "SELECT * FROM zeta JOIN alpha ON true JOIN mid ON true";
    let first = extract_table_names(sql, None);
    for _ in 0..5 {
        assert_eq!(extract_table_names(sql, None), first);
    }
    assert_eq!(first, vec!["alpha", "mid", "zeta"]);
}
