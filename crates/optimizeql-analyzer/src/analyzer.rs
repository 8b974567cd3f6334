use optimizeql_core::{
    AnalysisResult, Impact, IntrospectionContext, LlmError, LlmProvider, Settings, SuggestionItem,
};
use serde_json::Value as JsonValue;

use crate::prompt::PromptBuilder;
use crate::response::{configuration_list, strip_code_fence, suggestion_list};

/// Characters of an unparsable response kept for debugging
const RAW_RESPONSE_EXCERPT: usize = 1000;

/// Turns an `IntrospectionContext` into an `AnalysisResult` through a model.
///
/// Every failure after the prompt is built (transport errors, empty output,
/// invalid JSON) degrades to a partially empty result instead of an error.
pub struct Analyzer {
    default_provider: Result<Box<dyn LlmProvider>, LlmError>,
    prompt_builder: PromptBuilder,
    max_tokens: u32,
}

impl Analyzer {
    pub fn new(provider: Box<dyn LlmProvider>, max_tokens: u32) -> Self {
        Self {
            default_provider: Ok(provider),
            prompt_builder: PromptBuilder::new(),
            max_tokens,
        }
    }

    /// Use the provider named by `settings.llm_provider`.
    ///
    /// A provider that cannot be created is remembered; analyses without an
    /// override then report it in their summary.
    pub fn from_settings(settings: &Settings) -> Self {
        let default_provider = optimizeql_llm::create_default_provider(settings);
        if let Err(e) = &default_provider {
            tracing::warn!(provider = %settings.llm_provider, error = %e, "default LLM provider unavailable");
        }
        Self {
            default_provider,
            prompt_builder: PromptBuilder::new(),
            max_tokens: settings.llm_max_tokens,
        }
    }

    pub fn provider(&self) -> Option<&dyn LlmProvider> {
        self.default_provider.as_ref().ok().map(|p| p.as_ref())
    }

    pub fn new_query_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    #[tracing::instrument(skip(self, context, provider_override), fields(tables = context.table_names.len()))]
    pub async fn analyze(
        &self,
        context: &IntrospectionContext,
        query_id: &str,
        provider_override: Option<&dyn LlmProvider>,
    ) -> AnalysisResult {
        let provider = match (provider_override, &self.default_provider) {
            (Some(provider), _) => provider,
            (None, Ok(provider)) => provider.as_ref(),
            (None, Err(e)) => {
                return degraded(
                    context,
                    query_id,
                    format!("No LLM provider is available: {}. Configure an API key and retry.", e),
                );
            }
        };
        let model = provider.model();

        let prompt = self.prompt_builder.build(context);
        tracing::info!(
            query_id = %query_id,
            provider = %provider.name(),
            model = %model,
            overridden = provider_override.is_some(),
            "calling LLM"
        );

        let raw = match provider.generate(&prompt.system, &prompt.user, self.max_tokens).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(query_id = %query_id, model = %model, error = %e, "LLM request failed");
                return degraded(
                    context,
                    query_id,
                    format!("The model ({}) could not be reached: {}. Retry or choose another provider.", model, e),
                );
            }
        };
        let raw = raw.trim();
        tracing::debug!(
            response_preview = %raw.chars().take(500).collect::<String>(),
            "raw LLM response"
        );

        if raw.is_empty() {
            tracing::error!(query_id = %query_id, model = %model, "LLM returned an empty response");
            return degraded(
                context,
                query_id,
                format!(
                    "The model ({}) returned an empty response. This usually means the model is overloaded \
                     or does not support structured JSON output. Try a different model or retry.",
                    model
                ),
            );
        }

        let text = strip_code_fence(raw);
        let data = match serde_json::from_str::<JsonValue>(text) {
            Ok(data) if data.is_object() => data,
            Ok(_) => {
                tracing::error!(query_id = %query_id, "LLM returned JSON that is not an object");
                return unparsable(context, query_id, model, text);
            }
            Err(e) => {
                tracing::error!(query_id = %query_id, error = %e, "LLM did not return valid JSON");
                return unparsable(context, query_id, model, text);
            }
        };

        let result = AnalysisResult {
            summary: data
                .get("summary")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string(),
            indexes: suggestion_list(&data, "indexes"),
            rewrites: suggestion_list(&data, "rewrites"),
            materialized_views: suggestion_list(&data, "materialized_views"),
            bottlenecks: suggestion_list(&data, "bottlenecks"),
            statistics: suggestion_list(&data, "statistics"),
            configuration: configuration_list(&data),
            ..pass_through(context, query_id)
        };
        tracing::info!(query_id = %query_id, suggestions = result.suggestion_count(), "analysis complete");
        result
    }
}

/// The fields carried over from the context regardless of the model's answer
fn pass_through(context: &IntrospectionContext, query_id: &str) -> AnalysisResult {
    AnalysisResult {
        query_id: query_id.to_string(),
        explain_plan: context.explain.as_ref().map(|e| e.raw_plan.clone()),
        explain_error: context.explain_error.clone(),
        tables_analyzed: context.table_names.clone(),
        ..Default::default()
    }
}

fn degraded(context: &IntrospectionContext, query_id: &str, summary: String) -> AnalysisResult {
    AnalysisResult {
        summary,
        ..pass_through(context, query_id)
    }
}

fn unparsable(context: &IntrospectionContext, query_id: &str, model: &str, text: &str) -> AnalysisResult {
    let excerpt: String = text.chars().take(RAW_RESPONSE_EXCERPT).collect();
    AnalysisResult {
        summary: format!(
            "The model ({}) did not return valid JSON. Try a more capable model or retry.",
            model
        ),
        bottlenecks: vec![SuggestionItem::new(
            format!("Raw model response:\n{}", excerpt),
            Impact::Low,
        )],
        ..pass_through(context, query_id)
    }
}
