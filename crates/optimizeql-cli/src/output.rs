//! Terminal rendering of results

use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL};
use optimizeql_core::{AnalysisResult, CompareResult, Row, SuggestionItem};

pub fn row_text(row: &Row) -> String {
    if row.is_empty() {
        return "(no row)".to_string();
    }
    let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
    format!("({})", cells.join(", "))
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn compare_table(result: &CompareResult) -> Table {
    let mut table = new_table();
    table.set_header(vec!["", "Original", "Rewritten"]);
    table.add_row(vec![
        Cell::new("Rows"),
        Cell::new(result.original_row_count),
        Cell::new(result.rewritten_row_count),
    ]);

    if result.original_error.is_some() || result.rewritten_error.is_some() {
        table.add_row(vec![
            Cell::new("Error"),
            Cell::new(result.original_error.as_deref().unwrap_or("-")),
            Cell::new(result.rewritten_error.as_deref().unwrap_or("-")),
        ]);
    }

    if let Some(diff) = &result.first_diff {
        table.add_row(vec![
            Cell::new(format!("Row {}", diff.row_number)),
            Cell::new(row_text(&diff.original_row)),
            Cell::new(row_text(&diff.rewritten_row)),
        ]);
    }
    table
}

pub fn compare_verdict(result: &CompareResult) -> String {
    if result.is_match {
        format!("MATCH: {} rows compared", result.rows_compared)
    } else if result.original_error.is_some() || result.rewritten_error.is_some() {
        "ERROR: at least one statement failed".to_string()
    } else {
        format!("MISMATCH after {} rows compared", result.rows_compared)
    }
}

fn add_suggestions(table: &mut Table, category: &str, items: &[SuggestionItem]) {
    for item in items {
        let mut detail = item.explanation.clone();
        if let Some(sql) = &item.sql {
            detail.push_str("\n\n");
            detail.push_str(sql);
        }
        table.add_row(vec![
            Cell::new(category),
            Cell::new(item.estimated_impact),
            Cell::new(detail),
        ]);
    }
}

pub fn analysis_table(result: &AnalysisResult) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Category", "Impact", "Suggestion"]);
    add_suggestions(&mut table, "index", &result.indexes);
    add_suggestions(&mut table, "rewrite", &result.rewrites);
    add_suggestions(&mut table, "materialized view", &result.materialized_views);
    add_suggestions(&mut table, "bottleneck", &result.bottlenecks);
    add_suggestions(&mut table, "statistics", &result.statistics);
    for item in &result.configuration {
        table.add_row(vec![
            Cell::new("configuration"),
            Cell::new(item.estimated_impact),
            Cell::new(format!(
                "{} = {} (currently {})\n{}",
                item.parameter, item.recommended_value, item.current_value, item.explanation
            )),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use optimizeql_core::{Impact, RowDiff, Value};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_row_text() {
        assert_eq!(row_text(&vec![Value::Int32(1), Value::Null, Value::String("a".into())]), "(1, NULL, a)");
        assert_eq!(row_text(&Vec::new()), "(no row)");
    }

    #[test]
    fn test_compare_table_shows_diff() {
        let result = CompareResult {
            is_match: false,
            rows_compared: 2,
            original_row_count: 3,
            rewritten_row_count: 2,
            first_diff: Some(RowDiff {
                row_number: 3,
                original_row: vec![Value::Int64(3)],
                rewritten_row: Vec::new(),
            }),
            ..Default::default()
        };
        let rendered = compare_table(&result).to_string();
        assert!(rendered.contains("Row 3"));
        assert!(rendered.contains("(no row)"));
        assert!(!rendered.contains("Error"));
        assert_eq!(compare_verdict(&result), "MISMATCH after 2 rows compared");
    }

    #[test]
    fn test_compare_verdicts() {
        let matched = CompareResult {
            is_match: true,
            rows_compared: 4,
            ..Default::default()
        };
        assert_eq!(compare_verdict(&matched), "MATCH: 4 rows compared");

        let failed = CompareResult {
            original_error: Some("Query error: boom".to_string()),
            ..Default::default()
        };
        assert!(compare_verdict(&failed).starts_with("ERROR"));
        assert!(compare_table(&failed).to_string().contains("Query error: boom"));
    }

    #[test]
    fn test_analysis_table_lists_every_category() {
        let result = AnalysisResult {
            indexes: vec![SuggestionItem::new("add index", Impact::High).with_sql("CREATE INDEX i ON t (c)")],
            bottlenecks: vec![SuggestionItem::new("slow sort", Impact::Low)],
            ..Default::default()
        };
        let rendered = analysis_table(&result).to_string();
        assert!(rendered.contains("CREATE INDEX i ON t (c)"));
        assert!(rendered.contains("bottleneck"));
        assert!(rendered.contains("high"));
    }
}
