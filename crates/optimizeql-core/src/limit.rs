//! Statement checks and row limiting for sandboxed execution

use crate::{Dialect, OptimizeError, Result};
use sqlparser::ast::{Expr, Query, Statement, Value as SqlValue};
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Location, Token, Tokenizer};

/// How a statement will be bounded to a row limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitedSql {
    /// The query was re-rendered with a `LIMIT` of at most the row limit
    Limited(String),
    /// The statement cannot be bounded; rows are truncated after fetching
    Unchanged(String),
}

impl LimitedSql {
    pub fn sql(&self) -> &str {
        match self {
            LimitedSql::Limited(sql) | LimitedSql::Unchanged(sql) => sql,
        }
    }
}

/// Byte offset of a tokenizer location (1-based line and character column)
fn byte_offset(sql: &str, location: &Location) -> usize {
    let (mut line, mut column) = (1, 1);
    for (offset, c) in sql.char_indices() {
        if line == location.line && column == location.column {
            return offset;
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    sql.len()
}

/// Require `sql` to hold exactly one statement and return it without its
/// trailing terminators and comments.
///
/// The check works on tokens, so a `;` inside a string literal, a quoted
/// identifier or a comment does not count as a separator.
pub fn single_statement(sql: &str, dialect: Dialect) -> Result<&str> {
    let parser_dialect = dialect.parser_dialect();
    let tokens = Tokenizer::new(parser_dialect.as_ref(), sql)
        .tokenize_with_location()
        .map_err(|e| OptimizeError::Query(format!("Could not read SQL: {}", e)))?;

    let is_trivia = |token: &Token| matches!(token, Token::Whitespace(_) | Token::SemiColon | Token::EOF);
    let Some(last) = tokens.iter().rposition(|t| !is_trivia(&t.token)) else {
        return Err(OptimizeError::Query("SQL statement is empty".to_string()));
    };

    let separators = tokens[..last]
        .iter()
        .filter(|t| t.token == Token::SemiColon)
        .count();
    if separators > 0 {
        return Err(OptimizeError::Query(format!(
            "Expected a single SQL statement, found {}",
            separators + 1
        )));
    }

    let end = tokens
        .get(last + 1)
        .map(|t| byte_offset(sql, &t.location))
        .unwrap_or(sql.len());
    Ok(sql[..end].trim())
}

/// Cap the query's own `LIMIT` at `row_limit`. Returns `false` when the
/// row count is bounded some other way that cannot be rewritten safely.
fn cap_limit(query: &mut Query, row_limit: usize) -> bool {
    if query.fetch.is_some() || !query.limit_by.is_empty() {
        return false;
    }

    let cap = Expr::Value(SqlValue::Number(row_limit.to_string(), false));
    match &query.limit {
        None => {
            query.limit = Some(cap);
            true
        }
        Some(Expr::Value(SqlValue::Number(existing, _))) => match existing.parse::<usize>() {
            Ok(existing) if existing <= row_limit => true,
            Ok(_) => {
                query.limit = Some(cap);
                true
            }
            Err(_) => false,
        },
        Some(_) => false,
    }
}

/// Bound `sql` to at most `row_limit` rows.
///
/// Input with more than one statement is rejected. Row-returning queries
/// (`SELECT`, `WITH`, `VALUES`, set operations) get a `LIMIT` on the
/// outermost query, so the engine stops producing rows early and column
/// names are passed through as written. Anything else, including SQL the
/// parser does not understand, is returned unchanged.
pub fn apply_limit(sql: &str, row_limit: usize, dialect: Dialect) -> Result<LimitedSql> {
    let body = single_statement(sql, dialect)?;

    let mut statements = match Parser::parse_sql(dialect.parser_dialect().as_ref(), body) {
        Ok(statements) => statements,
        Err(e) => {
            tracing::debug!(error = %e, "limit parse failed, leaving statement unchanged");
            return Ok(LimitedSql::Unchanged(body.to_string()));
        }
    };

    match statements.as_mut_slice() {
        [Statement::Query(query)] => {
            if cap_limit(query, row_limit) {
                Ok(LimitedSql::Limited(query.to_string()))
            } else {
                Ok(LimitedSql::Unchanged(body.to_string()))
            }
        }
        _ => Ok(LimitedSql::Unchanged(body.to_string())),
    }
}
