//! optimizeql analyzer - everything between a SQL string and a suggestion list
//!
//! - `extract_table_names` finds the tables a statement touches
//! - `Introspector` gathers the plan and per-table schema through a `Connector`
//! - `PromptBuilder` renders the system and user messages
//! - `Analyzer` calls an `LlmProvider` and projects its JSON into an `AnalysisResult`
//! - `compare` executes an original and a rewritten query and diffs the rows

mod analyzer;
mod comparator;
mod introspector;
mod prompt;
mod response;
mod tables;

#[cfg(test)]
mod test_support;

pub use analyzer::Analyzer;
pub use comparator::{DEFAULT_COMPARE_TIMEOUT_MS, DEFAULT_ROW_LIMIT, compare, compare_rows};
pub use introspector::{DEFAULT_EXPLAIN_TIMEOUT_MS, Introspector};
pub use prompt::{Prompt, PromptBuilder};
pub use response::strip_code_fence;
pub use tables::extract_table_names;
