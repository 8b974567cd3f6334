//! Tolerant projection of model output onto the suggestion taxonomy

use optimizeql_core::{ConfigurationItem, Impact, RootCause, SuggestionItem};
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use std::sync::LazyLock;

static FENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?\s*```$").expect("valid regex"));

/// Remove one Markdown code fence wrapping the whole (trimmed) text
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match FENCE_REGEX.captures(trimmed).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// Non-empty string field, absent otherwise
fn optional_str(entry: &Map<String, JsonValue>, key: &str) -> Option<String> {
    entry
        .get(key)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn str_or(entry: &Map<String, JsonValue>, key: &str, default: &str) -> String {
    entry
        .get(key)
        .and_then(JsonValue::as_str)
        .unwrap_or(default)
        .to_string()
}

fn impact(entry: &Map<String, JsonValue>) -> Impact {
    Impact::coerce(entry.get("estimated_impact").and_then(JsonValue::as_str))
}

fn entries<'a>(data: &'a JsonValue, key: &str) -> impl Iterator<Item = &'a Map<String, JsonValue>> {
    data.get(key)
        .and_then(JsonValue::as_array)
        .into_iter()
        .flatten()
        .filter_map(JsonValue::as_object)
}

pub(crate) fn suggestion_list(data: &JsonValue, key: &str) -> Vec<SuggestionItem> {
    entries(data, key)
        .map(|entry| SuggestionItem {
            sql: optional_str(entry, "sql"),
            explanation: str_or(entry, "explanation", ""),
            estimated_impact: impact(entry),
            plan_node: optional_str(entry, "plan_node"),
            // an unrecognised cause is still a cause
            root_cause: optional_str(entry, "root_cause")
                .map(|tag| tag.parse::<RootCause>().unwrap_or(RootCause::Other)),
            index_type: optional_str(entry, "index_type"),
        })
        .collect()
}

pub(crate) fn configuration_list(data: &JsonValue) -> Vec<ConfigurationItem> {
    entries(data, "configuration")
        .map(|entry| ConfigurationItem {
            parameter: str_or(entry, "parameter", ""),
            current_value: str_or(entry, "current_value", "unknown"),
            recommended_value: str_or(entry, "recommended_value", ""),
            explanation: str_or(entry, "explanation", ""),
            estimated_impact: impact(entry),
        })
        .collect()
}

#[cfg(test)]
mod tests;
