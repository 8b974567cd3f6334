//! Side-by-side execution of an original query and its rewrite

use optimizeql_core::{CompareResult, Connector, QueryRows, Row, RowDiff, clamp_row_limit};

pub const DEFAULT_ROW_LIMIT: usize = 100;
pub const DEFAULT_COMPARE_TIMEOUT_MS: u64 = 30_000;

/// Execute both statements and diff their rows.
///
/// Neither statement failing is fatal: errors are reported per side and the
/// result simply does not match.
#[tracing::instrument(skip(connector, original_sql, rewritten_sql))]
pub async fn compare(
    connector: &dyn Connector,
    original_sql: &str,
    rewritten_sql: &str,
    row_limit: usize,
    timeout_ms: u64,
) -> CompareResult {
    let row_limit = clamp_row_limit(row_limit);

    let original = fetch(connector, original_sql, row_limit, timeout_ms, "original").await;
    let rewritten = fetch(connector, rewritten_sql, row_limit, timeout_ms, "rewritten").await;

    match (original, rewritten) {
        (Ok(original), Ok(rewritten)) => compare_rows(original, rewritten),
        (original, rewritten) => CompareResult {
            is_match: false,
            rows_compared: 0,
            original_row_count: original.as_ref().map_or(0, Vec::len),
            rewritten_row_count: rewritten.as_ref().map_or(0, Vec::len),
            first_diff: None,
            original_error: original.err(),
            rewritten_error: rewritten.err(),
        },
    }
}

async fn fetch(
    connector: &dyn Connector,
    sql: &str,
    row_limit: usize,
    timeout_ms: u64,
    side: &str,
) -> Result<Vec<Row>, String> {
    match connector.execute_limited(sql, row_limit, timeout_ms).await {
        Ok(QueryRows { mut rows, .. }) => {
            rows.truncate(row_limit);
            tracing::debug!(side, rows = rows.len(), "query executed");
            Ok(rows)
        }
        Err(e) => {
            tracing::warn!(side, error = %e, "query failed during comparison");
            Err(e.to_string().trim().to_string())
        }
    }
}

fn canonical_order(mut rows: Vec<Row>) -> Vec<Row> {
    rows.sort_by_cached_key(|row| row.iter().map(|cell| cell.sort_key()).collect::<Vec<_>>());
    rows
}

fn same_row(a: &Row, b: &Row) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.sort_key() == y.sort_key())
}

/// Diff two result sets without regard to their physical row order
pub fn compare_rows(original: Vec<Row>, rewritten: Vec<Row>) -> CompareResult {
    let original = canonical_order(original);
    let rewritten = canonical_order(rewritten);
    let rows_compared = original.len().min(rewritten.len());

    let mut first_diff = original
        .iter()
        .zip(&rewritten)
        .position(|(a, b)| !same_row(a, b))
        .map(|idx| RowDiff {
            row_number: idx + 1,
            original_row: original[idx].clone(),
            rewritten_row: rewritten[idx].clone(),
        });

    if first_diff.is_none() && original.len() != rewritten.len() {
        first_diff = Some(RowDiff {
            row_number: rows_compared + 1,
            original_row: original.get(rows_compared).cloned().unwrap_or_default(),
            rewritten_row: rewritten.get(rows_compared).cloned().unwrap_or_default(),
        });
    }

    CompareResult {
        is_match: first_diff.is_none(),
        rows_compared,
        original_row_count: original.len(),
        rewritten_row_count: rewritten.len(),
        first_diff,
        original_error: None,
        rewritten_error: None,
    }
}
