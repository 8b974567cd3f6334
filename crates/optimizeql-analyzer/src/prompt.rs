//! Rendering the system instruction and user payload sent to the model

use optimizeql_core::{Dialect, ExplainResult, IntrospectionContext, TableSchema};
use std::sync::LazyLock;

const RESPONSE_SCHEMA: &str = include_str!("../prompts/response_schema.json");
const RULES: &str = include_str!("../prompts/rules.md");
const POSTGRESQL_TEMPLATE: &str = include_str!("../prompts/postgresql.md");
const MYSQL_TEMPLATE: &str = include_str!("../prompts/mysql.md");
const GENERIC_TEMPLATE: &str = include_str!("../prompts/generic.md");

/// Column statistics shown per table
const MAX_STATS_PER_TABLE: usize = 10;

const NOT_AVAILABLE: &str = "_Not available: no live database connection was provided._";

fn render(template: &str) -> String {
    template
        .replace("{response_schema}", RESPONSE_SCHEMA.trim_end())
        .replace("{rules}", RULES.trim_end())
}

static POSTGRESQL_PROMPT: LazyLock<String> = LazyLock::new(|| render(POSTGRESQL_TEMPLATE));
static MYSQL_PROMPT: LazyLock<String> = LazyLock::new(|| render(MYSQL_TEMPLATE));
static GENERIC_PROMPT: LazyLock<String> = LazyLock::new(|| render(GENERIC_TEMPLATE));

/// A rendered prompt pair
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// System instruction for `dialect`; the dialect-detecting one when unknown
    pub fn system_prompt(&self, dialect: Option<Dialect>) -> &'static str {
        match dialect {
            Some(Dialect::Postgresql) => POSTGRESQL_PROMPT.as_str(),
            Some(Dialect::Mysql) => MYSQL_PROMPT.as_str(),
            None => GENERIC_PROMPT.as_str(),
        }
    }

    pub fn build(&self, context: &IntrospectionContext) -> Prompt {
        let sections = [
            format!("## SQL Query\n```sql\n{}\n```", context.sql),
            explain_section(context.explain.as_ref()),
            schema_section(&context.table_schemas),
        ];

        Prompt {
            system: self.system_prompt(context.dialect).to_string(),
            user: sections.join("\n\n"),
        }
    }
}

fn explain_section(explain: Option<&ExplainResult>) -> String {
    let Some(explain) = explain else {
        return format!("## EXPLAIN ANALYZE Output\n{}", NOT_AVAILABLE);
    };

    let mut timing = String::new();
    if let Some(ms) = explain.planning_time_ms {
        timing.push_str(&format!("\nPlanning time: {:.2} ms", ms));
    }
    if let Some(ms) = explain.execution_time_ms {
        timing.push_str(&format!("\nExecution time: {:.2} ms", ms));
    }
    format!("## EXPLAIN ANALYZE Output{}\n```\n{}\n```", timing, explain.raw_plan)
}

fn schema_section(schemas: &[TableSchema]) -> String {
    if schemas.is_empty() {
        return format!("## Table Schemas & Statistics\n{}", NOT_AVAILABLE);
    }

    let blocks = schemas.iter().map(format_table_schema).collect::<Vec<_>>().join("\n\n");
    format!("## Table Schemas & Statistics\n```\n{}\n```", blocks)
}

/// `1234567` -> `1,234,567`
pub(crate) fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        grouped.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

pub(crate) fn format_table_schema(schema: &TableSchema) -> String {
    let mut lines = vec![
        format!(
            "Table: {}  (~{} rows)",
            schema.table_name,
            group_thousands(schema.row_count)
        ),
        "  Columns:".to_string(),
    ];

    for column in &schema.columns {
        let nullable = if column.is_nullable { "NULL" } else { "NOT NULL" };
        let default = match column.column_default.as_deref() {
            Some(default) if !default.is_empty() => format!(" DEFAULT {}", default),
            _ => String::new(),
        };
        lines.push(format!(
            "    {}  {}  {}{}",
            column.column_name, column.data_type, nullable, default
        ));
    }

    if !schema.indexes.is_empty() {
        lines.push("  Indexes:".to_string());
        for index in &schema.indexes {
            let unique = if index.is_unique { "UNIQUE " } else { "" };
            lines.push(format!(
                "    {}: {}{} ({})",
                index.index_name,
                unique,
                index.index_type.to_uppercase(),
                index.columns.join(", ")
            ));
            if let Some(ddl) = index.definition.as_deref().filter(|d| !d.is_empty()) {
                lines.push(format!("      DDL: {}", ddl));
            }
        }
    }

    // columns with no distinctness estimate say nothing useful
    let mut stats = schema.column_stats.iter().filter(|s| s.n_distinct != 0.0).peekable();
    if stats.peek().is_some() {
        lines.push("  Column Statistics:".to_string());
        for stat in stats.take(MAX_STATS_PER_TABLE) {
            lines.push(format!(
                "    {}: n_distinct={:?}, null_frac={:.2}%, avg_width={}B",
                stat.column_name,
                stat.n_distinct,
                stat.null_frac * 100.0,
                stat.avg_width
            ));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests;
