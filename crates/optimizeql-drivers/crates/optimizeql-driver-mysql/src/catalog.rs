//! Catalog queries against `information_schema`

use mysql_async::prelude::*;
use mysql_async::{Conn, Params, Row as MySqlRow};
use optimizeql_core::{ColumnDescriptor, ColumnStat, IndexInfo, OptimizeError, Result, Value};

use crate::connector::format_mysql_error;
use crate::values::{cell_i64, cell_text, row_cell};

/// Most-common values kept per column from a singleton histogram
const MAX_COMMON_VALUES: usize = 10;

const COLUMNS_SQL: &str = "\
SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_DEFAULT
FROM information_schema.COLUMNS
WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
ORDER BY ORDINAL_POSITION";

const ROW_ESTIMATE_SQL: &str = "\
SELECT TABLE_ROWS
FROM information_schema.TABLES
WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?";

const STATS_SQL: &str = "\
SELECT COLUMN_NAME, HISTOGRAM
FROM information_schema.COLUMN_STATISTICS
WHERE SCHEMA_NAME = ? AND TABLE_NAME = ?
ORDER BY COLUMN_NAME";

// ER_UNKNOWN_TABLE: COLUMN_STATISTICS only exists from 8.0 on
const ER_UNKNOWN_TABLE: u16 = 1109;

fn indexes_sql(table_count: usize) -> String {
    let placeholders = vec!["?"; table_count].join(", ");
    format!(
        "SELECT TABLE_NAME, INDEX_NAME, NON_UNIQUE, COLUMN_NAME, INDEX_TYPE
FROM information_schema.STATISTICS
WHERE TABLE_SCHEMA = ? AND TABLE_NAME IN ({})
ORDER BY TABLE_NAME, INDEX_NAME, SEQ_IN_INDEX",
        placeholders
    )
}

fn catalog_error(what: &str, table: &str, e: mysql_async::Error) -> OptimizeError {
    OptimizeError::Schema(format!(
        "Failed to read {} for {}: {}",
        what,
        table,
        format_mysql_error(&e)
    ))
}

pub(crate) async fn columns(conn: &mut Conn, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
    let rows: Vec<MySqlRow> = conn
        .exec(COLUMNS_SQL, (schema, table))
        .await
        .map_err(|e| catalog_error("columns", table, e))?;

    Ok(rows
        .iter()
        .map(|row| ColumnDescriptor {
            column_name: cell_text(row, 0).unwrap_or_default(),
            data_type: cell_text(row, 1).unwrap_or_default(),
            is_nullable: cell_text(row, 2).as_deref() == Some("YES"),
            column_default: cell_text(row, 3),
        })
        .collect())
}

pub(crate) async fn row_estimate(conn: &mut Conn, schema: &str, table: &str) -> Result<i64> {
    let row: Option<MySqlRow> = conn
        .exec_first(ROW_ESTIMATE_SQL, (schema, table))
        .await
        .map_err(|e| catalog_error("row estimate", table, e))?;

    Ok(row.and_then(|row| cell_i64(&row, 0)).unwrap_or(0))
}

pub(crate) async fn indexes(conn: &mut Conn, schema: &str, tables: &[String]) -> Result<Vec<IndexInfo>> {
    if tables.is_empty() {
        return Ok(Vec::new());
    }

    let mut params: Vec<mysql_async::Value> = Vec::with_capacity(tables.len() + 1);
    params.push(schema.into());
    params.extend(tables.iter().map(|t| mysql_async::Value::from(t.as_str())));

    let rows: Vec<MySqlRow> = conn
        .exec(indexes_sql(tables.len()), Params::Positional(params))
        .await
        .map_err(|e| catalog_error("indexes", &tables.join(", "), e))?;

    let mut indexes: Vec<IndexInfo> = Vec::new();
    for row in &rows {
        let table_name = cell_text(row, 0).unwrap_or_default();
        let index_name = cell_text(row, 1).unwrap_or_default();
        // functional key parts have no column name
        let column = cell_text(row, 3);

        match indexes.last_mut() {
            Some(last) if last.table_name == table_name && last.index_name == index_name => {
                last.columns.extend(column);
            }
            _ => indexes.push(IndexInfo {
                index_name,
                table_name,
                columns: column.into_iter().collect(),
                is_unique: cell_i64(row, 2) == Some(0),
                index_type: cell_text(row, 4).unwrap_or_default().to_lowercase(),
                definition: None,
            }),
        }
    }
    Ok(indexes)
}

pub(crate) async fn column_stats(conn: &mut Conn, schema: &str, table: &str) -> Result<Vec<ColumnStat>> {
    let rows: Vec<MySqlRow> = match conn.exec(STATS_SQL, (schema, table)).await {
        Ok(rows) => rows,
        Err(mysql_async::Error::Server(e)) if e.code == ER_UNKNOWN_TABLE => {
            tracing::debug!("COLUMN_STATISTICS unavailable, skipping histograms");
            return Ok(Vec::new());
        }
        Err(e) => return Err(catalog_error("statistics", table, e)),
    };

    Ok(rows
        .iter()
        .map(|row| {
            let column_name = cell_text(row, 0).unwrap_or_default();
            let histogram = match row_cell(row, 1) {
                Value::Json(json) => json,
                Value::String(text) => serde_json::from_str(&text).unwrap_or(serde_json::Value::Null),
                _ => serde_json::Value::Null,
            };
            histogram_stat(column_name, &histogram)
        })
        .collect())
}

/// Summarise a MySQL 8 histogram as planner statistics.
///
/// Singleton buckets are `[value, cumulative_frequency]`; equi-height
/// buckets are `[lower, upper, cumulative_frequency, distinct_count]`.
/// An unrecognised histogram reports an unknown distinct count of -1.
pub(crate) fn histogram_stat(column_name: String, histogram: &serde_json::Value) -> ColumnStat {
    let null_frac = histogram.get("null-values").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let buckets = histogram
        .get("buckets")
        .and_then(|b| b.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut stat = ColumnStat {
        column_name,
        null_frac,
        avg_width: 0,
        n_distinct: -1.0,
        most_common_vals: Vec::new(),
        most_common_freqs: Vec::new(),
    };

    match histogram.get("histogram-type").and_then(|t| t.as_str()) {
        Some("singleton") => {
            stat.n_distinct = buckets.len() as f64;

            let mut previous = 0.0;
            let mut frequencies: Vec<(String, f64)> = buckets
                .iter()
                .filter_map(|bucket| {
                    let cumulative = bucket.get(1)?.as_f64()?;
                    let frequency = cumulative - previous;
                    previous = cumulative;
                    let value = match bucket.get(0)? {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    // string values arrive base64-encoded and are not worth decoding here
                    (!value.starts_with("base64:")).then_some((value, frequency))
                })
                .collect();
            frequencies.sort_by(|a, b| b.1.total_cmp(&a.1));
            frequencies.truncate(MAX_COMMON_VALUES);

            for (value, frequency) in frequencies {
                stat.most_common_vals.push(value);
                stat.most_common_freqs.push(frequency);
            }
        }
        Some("equi-height") => {
            let distinct: f64 = buckets
                .iter()
                .filter_map(|bucket| bucket.get(3).and_then(|d| d.as_f64()))
                .sum();
            if distinct > 0.0 {
                stat.n_distinct = distinct;
            }
        }
        _ => {}
    }

    stat
}
