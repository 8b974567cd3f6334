use optimizeql_core::{Connector, Dialect, IntrospectionContext};

use crate::tables::extract_table_names;

pub const DEFAULT_EXPLAIN_TIMEOUT_MS: u64 = 10_000;

/// Gathers the plan and catalog metadata for a query.
///
/// Every sub-step is best effort: a failed explain or schema lookup is logged
/// and left out of the context, never surfaced as an error.
pub struct Introspector<'a> {
    connector: Option<&'a dyn Connector>,
    dialect: Option<Dialect>,
    explain_timeout_ms: u64,
}

impl<'a> Introspector<'a> {
    pub fn new(connector: &'a dyn Connector, explain_timeout_ms: u64) -> Self {
        Self {
            connector: Some(connector),
            dialect: Some(connector.dialect()),
            explain_timeout_ms,
        }
    }

    /// Introspector without a database; contexts carry only the SQL and its tables
    pub fn offline(dialect: Option<Dialect>) -> Self {
        Self {
            connector: None,
            dialect,
            explain_timeout_ms: DEFAULT_EXPLAIN_TIMEOUT_MS,
        }
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    pub async fn introspect(&self, sql: &str) -> IntrospectionContext {
        let table_names = extract_table_names(sql, self.dialect);
        let mut context = IntrospectionContext::offline(sql, table_names).with_dialect(self.dialect);

        let Some(connector) = self.connector else {
            tracing::debug!(tables = context.table_names.len(), "no connector, offline context");
            return context;
        };

        match connector.explain_analyze(sql, self.explain_timeout_ms).await {
            Ok(explain) => context.explain = Some(explain),
            Err(e) => {
                tracing::warn!(error = %e, "EXPLAIN ANALYZE failed, continuing without a plan");
                context.explain_error = Some(e.to_string());
            }
        }

        for table in &context.table_names {
            match connector.get_table_schema(table, None).await {
                Ok(schema) if schema.is_empty() => {
                    tracing::debug!(table = %table, "table not found in catalog");
                }
                Ok(schema) => context.table_schemas.push(schema),
                Err(e) => tracing::warn!(table = %table, error = %e, "failed to read table schema"),
            }
        }

        tracing::info!(
            tables = context.table_names.len(),
            schemas = context.table_schemas.len(),
            has_plan = context.explain.is_some(),
            "introspection complete"
        );
        context
    }
}

#[cfg(test)]
mod tests;
