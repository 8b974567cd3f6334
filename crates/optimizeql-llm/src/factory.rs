use optimizeql_core::{LlmError, LlmProvider, LlmResult, Settings};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::anthropic::{ANTHROPIC_BASE_URL, AnthropicProvider};
use crate::gemini::{GEMINI_BASE_URL, GeminiProvider};
use crate::openai::OpenAiCompatibleProvider;
use crate::openrouter::{OPENROUTER_BASE_URL, OpenRouterProvider};

/// Supported model backends, parsed from the provider tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    OpenAi,
    DeepSeek,
    Xai,
    Qwen,
    Meta,
    Kimi,
    OpenRouter,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub fn tag(self) -> &'static str {
        self.into()
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::DeepSeek => "https://api.deepseek.com/v1",
            ProviderKind::Xai => "https://api.x.ai/v1",
            ProviderKind::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            ProviderKind::Meta => "https://api.llama.com/compat/v1",
            ProviderKind::Kimi => "https://api.moonshot.cn/v1",
            ProviderKind::OpenRouter => OPENROUTER_BASE_URL,
            ProviderKind::Anthropic => ANTHROPIC_BASE_URL,
            ProviderKind::Gemini => GEMINI_BASE_URL,
        }
    }

    /// Comma-separated list of every accepted tag
    pub fn supported() -> String {
        ProviderKind::iter().map(ProviderKind::tag).collect::<Vec<_>>().join(", ")
    }

    fn api_key(self, settings: &Settings) -> Option<String> {
        settings.api_key(self.tag()).or_else(|| match self {
            ProviderKind::Gemini => std::env::var("GOOGLE_API_KEY").ok().filter(|k| !k.is_empty()),
            _ => None,
        })
    }
}

/// Build a provider of `kind` from the API key, model and base URL in `settings`
pub fn create_provider(kind: ProviderKind, settings: &Settings) -> LlmResult<Box<dyn LlmProvider>> {
    let tag = kind.tag();
    let api_key = kind.api_key(settings).ok_or_else(|| {
        LlmError::ProviderUnavailable(format!(
            "no API key for {}: set providers.{}.api_key or {}_API_KEY",
            tag,
            tag,
            tag.to_ascii_uppercase()
        ))
    })?;
    let model = settings.model_for(tag);
    let base_url = settings
        .provider(tag)
        .and_then(|p| p.base_url.clone())
        .unwrap_or_else(|| kind.default_base_url().to_string());

    tracing::debug!(provider = %tag, model = %model, base_url = %base_url, "creating LLM provider");

    let provider: Box<dyn LlmProvider> = match kind {
        ProviderKind::Anthropic => Box::new(AnthropicProvider::with_base_url(api_key, model, base_url)?),
        ProviderKind::Gemini => Box::new(GeminiProvider::with_base_url(api_key, model, base_url)?),
        ProviderKind::OpenRouter => Box::new(OpenRouterProvider::with_base_url(api_key, model, base_url)?),
        ProviderKind::OpenAi
        | ProviderKind::DeepSeek
        | ProviderKind::Xai
        | ProviderKind::Qwen
        | ProviderKind::Meta
        | ProviderKind::Kimi => Box::new(OpenAiCompatibleProvider::new(tag, api_key, model, base_url)?),
    };
    Ok(provider)
}

/// Like `create_provider`, with the backend given as a tag such as `"deepseek"`
pub fn create_provider_by_name(name: &str, settings: &Settings) -> LlmResult<Box<dyn LlmProvider>> {
    let kind = ProviderKind::from_str(name.trim()).map_err(|_| {
        LlmError::ProviderUnavailable(format!(
            "Unknown LLM provider '{}'. Supported: {}",
            name,
            ProviderKind::supported()
        ))
    })?;
    create_provider(kind, settings)
}

/// The provider named by `settings.llm_provider`
pub fn create_default_provider(settings: &Settings) -> LlmResult<Box<dyn LlmProvider>> {
    create_provider_by_name(&settings.llm_provider, settings)
}
