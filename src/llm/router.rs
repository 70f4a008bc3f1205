use std::sync::Arc;

use tracing::info;

use super::anthropic::AnthropicProvider;
use super::catalog::{self, Backend};
use super::gemini::GeminiProvider;
use super::openai::OpenAIProvider;
use super::provider::LLMProvider;
use crate::errors::VulnAgentError;

/// Everything needed to build an oracle client.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Provider id or alias (`anthropic`, `openai-o3`, ...).
    pub provider: String,
    /// Falls back to the provider's environment variables when `None`.
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            api_key: None,
            model: None,
            base_url: None,
            temperature: None,
            max_tokens: 4096,
        }
    }
}

pub fn create_provider(settings: &LlmSettings) -> Result<Arc<dyn LLMProvider>, VulnAgentError> {
    let (info, implied_model) = catalog::resolve(&settings.provider)
        .ok_or_else(|| VulnAgentError::Config(format!("Unknown LLM provider: {}", settings.provider)))?;

    let model = settings.model.clone().unwrap_or_else(|| implied_model.to_string());
    let api_key = settings
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| catalog::api_key_from_env(info))
        .unwrap_or_default();

    if info.requires_key && api_key.is_empty() {
        return Err(VulnAgentError::Authentication(format!(
            "No API key for {}. Set {} or llm.api_key in the config file",
            info.name,
            info.env_vars.join(" or ")
        )));
    }

    let base_url = settings.base_url.as_deref().or(info.base_url);
    info!(provider = info.id, model = %model, "Creating LLM provider");

    let provider: Arc<dyn LLMProvider> = match info.backend {
        Backend::Anthropic => {
            let mut p = AnthropicProvider::new(&api_key, &model)
                .with_sampling(settings.max_tokens, settings.temperature);
            if let Some(url) = base_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        Backend::OpenAI => {
            let p = match base_url {
                Some(url) => OpenAIProvider::with_base_url(&api_key, &model, url),
                None => OpenAIProvider::new(&api_key, &model),
            };
            Arc::new(p.with_label(info.name).with_sampling(settings.max_tokens, settings.temperature))
        }
        Backend::Gemini => {
            let mut p = GeminiProvider::new(&api_key, &model)
                .with_sampling(settings.max_tokens, settings.temperature);
            if let Some(url) = base_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_is_config_error() {
        let settings = LlmSettings { provider: "nope".into(), ..LlmSettings::default() };
        assert!(matches!(create_provider(&settings), Err(VulnAgentError::Config(_))));
    }

    #[test]
    fn test_explicit_key_and_alias() {
        let settings = LlmSettings {
            provider: "openai-o3".into(),
            api_key: Some("sk-test".into()),
            ..LlmSettings::default()
        };
        let provider = create_provider(&settings).unwrap();
        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.model_name(), "o3");
    }

    #[test]
    fn test_local_provider_needs_no_key() {
        let settings = LlmSettings {
            provider: "local".into(),
            model: Some("llama3".into()),
            ..LlmSettings::default()
        };
        let provider = create_provider(&settings).unwrap();
        assert_eq!(provider.model_name(), "llama3");
    }
}
