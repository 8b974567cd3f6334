//! Best-effort extraction of the tables a statement references

use optimizeql_core::Dialect;
use regex::Regex;
use sqlparser::ast::{ObjectName, Query, Visit, Visitor};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::sync::LazyLock;

static FROM_JOIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:FROM|JOIN)\s+([`"]?\w+[`"]?(?:\.[`"]?\w+[`"]?)?)"#).expect("valid regex")
});

/// CTE names declared by one `WITH` clause.
///
/// Queries are identified by address only; the pointers are never dereferenced.
struct CteScope {
    owner: *const Query,
    bodies: Vec<*const Query>,
    names: Vec<String>,
    recursive: bool,
    /// The CTE whose body is being walked, if any
    inside: Option<usize>,
}

impl CteScope {
    /// A non-recursive CTE sees only the CTEs declared before it
    fn shadows(&self, name: &str) -> bool {
        let visible = match self.inside {
            Some(idx) if !self.recursive => &self.names[..idx],
            _ => &self.names[..],
        };
        visible.iter().any(|n| n == name)
    }
}

/// Collects relation names that are not references to an enclosing CTE
#[derive(Default)]
struct RelationCollector {
    relations: BTreeSet<String>,
    scopes: Vec<CteScope>,
}

impl Visitor for RelationCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        let ptr: *const Query = query;
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(idx) = scope.bodies.iter().position(|body| std::ptr::eq(*body, ptr)) {
                scope.inside = Some(idx);
            }
        }

        if let Some(with) = &query.with {
            self.scopes.push(CteScope {
                owner: ptr,
                bodies: with.cte_tables.iter().map(|cte| &*cte.query as *const Query).collect(),
                names: with
                    .cte_tables
                    .iter()
                    .map(|cte| cte.alias.name.value.to_lowercase())
                    .collect(),
                recursive: with.recursive,
                inside: None,
            });
        }
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        let ptr: *const Query = query;
        if self.scopes.last().is_some_and(|scope| std::ptr::eq(scope.owner, ptr)) {
            self.scopes.pop();
        }
        if let Some(scope) = self.scopes.last_mut() {
            if scope.inside.is_some_and(|idx| std::ptr::eq(scope.bodies[idx], ptr)) {
                scope.inside = None;
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        if let Some(ident) = relation.0.last() {
            let name = ident.value.to_lowercase();
            // a schema-qualified name never refers to a CTE
            let is_cte = relation.0.len() == 1 && self.scopes.iter().any(|scope| scope.shadows(&name));
            if !is_cte {
                self.relations.insert(name);
            }
        }
        ControlFlow::Continue(())
    }
}

fn parse_tables(sql: &str, dialect: Option<Dialect>) -> Option<Vec<String>> {
    let parsed = match dialect {
        Some(dialect) => Parser::parse_sql(dialect.parser_dialect().as_ref(), sql),
        None => Parser::parse_sql(&GenericDialect {}, sql),
    };
    let statements = match parsed {
        Ok(statements) => statements,
        Err(e) => {
            tracing::debug!(error = %e, "SQL parsing failed, falling back to regex scan");
            return None;
        }
    };

    let mut collector = RelationCollector::default();
    let _ = statements.visit(&mut collector);

    let tables: Vec<String> = collector.relations.into_iter().collect();
    (!tables.is_empty()).then_some(tables)
}

fn scan_tables(sql: &str) -> Vec<String> {
    FROM_JOIN_REGEX
        .captures_iter(sql)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().rsplit('.').next().map(str::to_string))
        .map(|name| name.trim_matches(|c| c == '`' || c == '"').to_lowercase())
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Lowercase, deduplicated, sorted names of the tables `sql` references.
///
/// Parses with the given dialect (or a generic one) and walks every table
/// reference, skipping references to CTEs in scope. When parsing fails or finds nothing, the
/// identifiers after `FROM`/`JOIN` are scanned instead. Never fails.
pub fn extract_table_names(sql: &str, dialect: Option<Dialect>) -> Vec<String> {
    parse_tables(sql, dialect).unwrap_or_else(|| scan_tables(sql))
}

#[cfg(test)]
mod tests;
