use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_strip_json_fence() {
    let parsed: JsonValue = serde_json::from_str(strip_code_fence("```json\n{\"summary\":\"x\"}\n```")).unwrap();
    assert_eq!(parsed, json!({"summary": "x"}));
}

#[test]
fn test_strip_bare_fence_and_whitespace() {
    assert_eq!(strip_code_fence("  ```\n{\"a\": 1}\n```  \n"), "{\"a\": 1}");
    assert_eq!(strip_code_fence("```json{\"a\": 1}```"), "{\"a\": 1}");
}

#[test]
fn test_fence_only_at_edges() {
    let text = "Here you go:\n```json\n{}\n```";
    assert_eq!(strip_code_fence(text), text);
    assert_eq!(strip_code_fence("{\"a\": 1}"), "{\"a\": 1}");
}

#[test]
fn test_suggestion_projection_is_tolerant() {
    let data = json!({
        "indexes": [
            "not an object",
            42,
            {
                "sql": "CREATE INDEX idx_orders_user ON orders (user_id)",
                "index_type": "btree",
                "explanation": "Seq Scan on orders filters by user_id",
                "estimated_impact": "high"
            },
            {"explanation": "no impact given"},
            {"sql": "", "plan_node": "", "root_cause": "", "index_type": "", "estimated_impact": "critical"},
            {"explanation": 7, "root_cause": "disk_io", "estimated_impact": null}
        ]
    });

    let items = suggestion_list(&data, "indexes");
    assert_eq!(items.len(), 4);

    assert_eq!(
        items[0],
        SuggestionItem::new("Seq Scan on orders filters by user_id", Impact::High)
            .with_sql("CREATE INDEX idx_orders_user ON orders (user_id)")
            .with_index_type("btree")
    );
    assert_eq!(items[1], SuggestionItem::new("no impact given", Impact::Medium));
    assert_eq!(items[2], SuggestionItem::new("", Impact::Medium));
    assert_eq!(items[3], SuggestionItem::new("", Impact::Medium).with_root_cause(RootCause::Other));
}

#[test]
fn test_root_cause_and_plan_node() {
    let data = json!({"bottlenecks": [{
        "plan_node": "Hash Join",
        "root_cause": "estimation",
        "explanation": "rows 10 vs 100000",
        "estimated_impact": "low"
    }]});
    let items = suggestion_list(&data, "bottlenecks");
    assert_eq!(items[0].plan_node.as_deref(), Some("Hash Join"));
    assert_eq!(items[0].root_cause, Some(RootCause::Estimation));
    assert_eq!(items[0].estimated_impact, Impact::Low);
}

#[test]
fn test_missing_or_wrongly_typed_list_is_empty() {
    assert!(suggestion_list(&json!({}), "rewrites").is_empty());
    assert!(suggestion_list(&json!({"rewrites": "none"}), "rewrites").is_empty());
    assert!(configuration_list(&json!({"configuration": {"work_mem": "64MB"}})).is_empty());
}

#[test]
fn test_configuration_defaults() {
    let data = json!({"configuration": [
        {"parameter": "work_mem", "recommended_value": "64MB", "explanation": "sort spills", "estimated_impact": "high"},
        {},
        []
    ]});
    let items = configuration_list(&data);
    assert_eq!(
        items,
        vec![
            ConfigurationItem {
                parameter: "work_mem".to_string(),
                current_value: "unknown".to_string(),
                recommended_value: "64MB".to_string(),
                explanation: "sort spills".to_string(),
                estimated_impact: Impact::High,
            },
            ConfigurationItem {
                parameter: String::new(),
                current_value: "unknown".to_string(),
                recommended_value: String::new(),
                explanation: String::new(),
                estimated_impact: Impact::Medium,
            },
        ]
    );
}
