//! Catalog queries: columns, row estimates, indexes and planner statistics

use optimizeql_core::{ColumnDescriptor, ColumnStat, IndexInfo, OptimizeError, Result};
use tokio_postgres::GenericClient;

use crate::connector::format_postgres_error;
use crate::values::parse_array_text;

pub(crate) const DEFAULT_SCHEMA: &str = "public";

const COLUMNS_SQL: &str = "\
SELECT column_name::text, data_type::text, is_nullable::text, column_default::text
FROM information_schema.columns
WHERE table_schema = $1 AND table_name = $2
ORDER BY ordinal_position";

const ROW_ESTIMATE_SQL: &str = "\
SELECT c.reltuples::bigint
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1 AND c.relname = $2";

// unnest(indkey) keeps key order; expression keys (attnum 0) have no attribute row
const INDEXES_SQL: &str = "\
SELECT i.relname::text AS index_name,
       t.relname::text AS table_name,
       ix.indisunique AS is_unique,
       am.amname::text AS index_type,
       pg_get_indexdef(ix.indexrelid) AS definition,
       COALESCE(
           array_agg(a.attname::text ORDER BY k.ord) FILTER (WHERE a.attname IS NOT NULL),
           '{}'::text[]
       ) AS columns
FROM pg_index ix
JOIN pg_class t ON t.oid = ix.indrelid
JOIN pg_class i ON i.oid = ix.indexrelid
JOIN pg_am am ON am.oid = i.relam
JOIN pg_namespace n ON n.oid = t.relnamespace
CROSS JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ord)
LEFT JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
WHERE n.nspname = $1 AND t.relname::text = ANY($2)
GROUP BY i.relname, t.relname, ix.indisunique, am.amname, ix.indexrelid
ORDER BY t.relname, i.relname";

const STATS_SQL: &str = "\
SELECT attname::text,
       null_frac::float8,
       avg_width,
       n_distinct::float8,
       most_common_vals::text,
       most_common_freqs::float8[]
FROM pg_stats
WHERE schemaname = $1 AND tablename = $2
ORDER BY attname";

fn decode_error(what: &str, e: tokio_postgres::Error) -> OptimizeError {
    OptimizeError::Schema(format!("Unexpected {} row shape: {}", what, e))
}

fn catalog_error(what: &str, table: &str, e: tokio_postgres::Error) -> OptimizeError {
    OptimizeError::Schema(format!(
        "Failed to read {} for {}: {}",
        what,
        table,
        format_postgres_error(&e)
    ))
}

pub(crate) async fn columns<C: GenericClient>(
    client: &C,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnDescriptor>> {
    let rows = client
        .query(COLUMNS_SQL, &[&schema, &table])
        .await
        .map_err(|e| catalog_error("columns", table, e))?;

    rows.iter()
        .map(|row| {
            Ok(ColumnDescriptor {
                column_name: row.try_get(0)?,
                data_type: row.try_get(1)?,
                is_nullable: row.try_get::<_, Option<String>>(2)?.as_deref() == Some("YES"),
                column_default: row.try_get(3)?,
            })
        })
        .collect::<std::result::Result<_, tokio_postgres::Error>>()
        .map_err(|e| decode_error("column", e))
}

pub(crate) async fn row_estimate<C: GenericClient>(client: &C, schema: &str, table: &str) -> Result<i64> {
    let row = client
        .query_opt(ROW_ESTIMATE_SQL, &[&schema, &table])
        .await
        .map_err(|e| catalog_error("row estimate", table, e))?;

    match row {
        Some(row) => Ok(row
            .try_get::<_, Option<i64>>(0)
            .map_err(|e| decode_error("row estimate", e))?
            .unwrap_or(0)),
        None => Ok(0),
    }
}

pub(crate) async fn indexes<C: GenericClient>(
    client: &C,
    schema: &str,
    tables: &[String],
) -> Result<Vec<IndexInfo>> {
    if tables.is_empty() {
        return Ok(Vec::new());
    }

    let rows = client
        .query(INDEXES_SQL, &[&schema, &tables])
        .await
        .map_err(|e| catalog_error("indexes", &tables.join(", "), e))?;

    rows.iter()
        .map(|row| {
            Ok(IndexInfo {
                index_name: row.try_get(0)?,
                table_name: row.try_get(1)?,
                is_unique: row.try_get(2)?,
                index_type: row.try_get(3)?,
                definition: row.try_get(4)?,
                columns: row.try_get(5)?,
            })
        })
        .collect::<std::result::Result<_, tokio_postgres::Error>>()
        .map_err(|e| decode_error("index", e))
}

pub(crate) async fn column_stats<C: GenericClient>(
    client: &C,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnStat>> {
    let rows = client
        .query(STATS_SQL, &[&schema, &table])
        .await
        .map_err(|e| catalog_error("statistics", table, e))?;

    rows.iter()
        .map(|row| {
            let mut most_common_vals = row
                .try_get::<_, Option<String>>(4)?
                .map(|text| parse_array_text(&text))
                .unwrap_or_default();
            let mut most_common_freqs = row.try_get::<_, Option<Vec<f64>>>(5)?.unwrap_or_default();
            let paired = most_common_vals.len().min(most_common_freqs.len());
            most_common_vals.truncate(paired);
            most_common_freqs.truncate(paired);

            Ok(ColumnStat {
                column_name: row.try_get(0)?,
                null_frac: row.try_get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                avg_width: row.try_get::<_, Option<i32>>(2)?.unwrap_or(0),
                n_distinct: row.try_get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                most_common_vals,
                most_common_freqs,
            })
        })
        .collect::<std::result::Result<_, tokio_postgres::Error>>()
        .map_err(|e| decode_error("statistics", e))
}
