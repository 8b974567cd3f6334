//! Suggestion taxonomy produced by the analyzer and the comparator

use crate::Row;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Expected benefit of applying a suggestion
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Impact {
    High,
    #[default]
    Medium,
    Low,
}

impl Impact {
    /// Parse a model-supplied impact level. Anything outside the three known
    /// levels (including case variants and missing values) becomes `Medium`.
    pub fn coerce(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

/// Why a bottleneck exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RootCause {
    Estimation,
    CostModel,
    MissingIndex,
    Memory,
    QueryStructure,
    Other,
}

/// One entry in the indexes, rewrites, materialized_views, bottlenecks or
/// statistics category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionItem {
    pub sql: Option<String>,
    pub explanation: String,
    pub estimated_impact: Impact,
    pub plan_node: Option<String>,
    pub root_cause: Option<RootCause>,
    pub index_type: Option<String>,
}

impl SuggestionItem {
    pub fn new(explanation: impl Into<String>, estimated_impact: Impact) -> Self {
        Self {
            sql: None,
            explanation: explanation.into(),
            estimated_impact,
            plan_node: None,
            root_cause: None,
            index_type: None,
        }
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn with_root_cause(mut self, root_cause: RootCause) -> Self {
        self.root_cause = Some(root_cause);
        self
    }

    pub fn with_index_type(mut self, index_type: impl Into<String>) -> Self {
        self.index_type = Some(index_type.into());
        self
    }
}

/// A server parameter change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationItem {
    pub parameter: String,
    pub current_value: String,
    pub recommended_value: String,
    pub explanation: String,
    pub estimated_impact: Impact,
}

/// Structured outcome of one analysis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AnalysisResult {
    pub query_id: String,
    pub indexes: Vec<SuggestionItem>,
    pub rewrites: Vec<SuggestionItem>,
    pub materialized_views: Vec<SuggestionItem>,
    pub bottlenecks: Vec<SuggestionItem>,
    pub statistics: Vec<SuggestionItem>,
    pub configuration: Vec<ConfigurationItem>,
    /// Human-readable summary, also used to explain degraded results
    pub summary: String,
    pub explain_plan: Option<String>,
    pub explain_error: Option<String>,
    pub tables_analyzed: Vec<String>,
}

impl AnalysisResult {
    /// Total number of suggestions across all categories
    pub fn suggestion_count(&self) -> usize {
        self.indexes.len()
            + self.rewrites.len()
            + self.materialized_views.len()
            + self.bottlenecks.len()
            + self.statistics.len()
            + self.configuration.len()
    }
}

/// The first position at which two sorted result sets disagree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowDiff {
    /// 1-based position after canonical sorting
    pub row_number: usize,
    /// Empty when the original result ran out of rows
    pub original_row: Row,
    /// Empty when the rewritten result ran out of rows
    pub rewritten_row: Row,
}

/// Outcome of running an original query and its rewrite side by side
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CompareResult {
    /// Only true when both sides executed and every row matched
    #[serde(rename = "match")]
    pub is_match: bool,
    pub rows_compared: usize,
    pub original_row_count: usize,
    pub rewritten_row_count: usize,
    pub first_diff: Option<RowDiff>,
    pub original_error: Option<String>,
    pub rewritten_error: Option<String>,
}
