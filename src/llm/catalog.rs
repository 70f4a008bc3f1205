/// Wire protocol a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Anthropic,
    OpenAI,
    Gemini,
}

pub struct ProviderInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub backend: Backend,
    /// Environment variables consulted for the API key, in order.
    pub env_vars: &'static [&'static str],
    pub base_url: Option<&'static str>,
    pub requires_key: bool,
    pub models: &'static [ModelInfo],
}

pub struct ModelInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub recommended: bool,
}

pub static PROVIDERS: &[ProviderInfo] = &[
    ProviderInfo {
        id: "anthropic",
        name: "Anthropic",
        backend: Backend::Anthropic,
        env_vars: &["ANTHROPIC_API_KEY"],
        base_url: None,
        requires_key: true,
        models: &[
            ModelInfo { id: "claude-sonnet-4-5-20250929", label: "Claude 4.5 Sonnet", recommended: true },
            ModelInfo { id: "claude-sonnet-4-20250514", label: "Claude Sonnet 4", recommended: false },
            ModelInfo { id: "claude-3-5-haiku-20241022", label: "Claude 3.5 Haiku", recommended: false },
        ],
    },
    ProviderInfo {
        id: "openai",
        name: "OpenAI",
        backend: Backend::OpenAI,
        env_vars: &["OPENAI_API_KEY"],
        base_url: None,
        requires_key: true,
        models: &[
            ModelInfo { id: "gpt-4o", label: "GPT-4o", recommended: true },
            ModelInfo { id: "o3", label: "o3", recommended: false },
            ModelInfo { id: "gpt-4o-mini", label: "GPT-4o Mini", recommended: false },
        ],
    },
    ProviderInfo {
        id: "gemini",
        name: "Google Gemini",
        backend: Backend::Gemini,
        env_vars: &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        base_url: None,
        requires_key: true,
        models: &[
            ModelInfo { id: "gemini-2.5-flash", label: "Gemini 2.5 Flash", recommended: true },
            ModelInfo { id: "gemini-2.5-pro", label: "Gemini 2.5 Pro", recommended: false },
        ],
    },
    ProviderInfo {
        id: "openrouter",
        name: "OpenRouter",
        backend: Backend::OpenAI,
        env_vars: &["OPENROUTER_API_KEY"],
        base_url: Some("https://openrouter.ai/api/v1"),
        requires_key: true,
        models: &[
            ModelInfo { id: "anthropic/claude-sonnet-4.5", label: "Claude 4.5 Sonnet", recommended: true },
            ModelInfo { id: "openai/gpt-4o", label: "GPT-4o", recommended: false },
        ],
    },
    ProviderInfo {
        id: "local",
        name: "Local / Ollama",
        backend: Backend::OpenAI,
        env_vars: &[],
        base_url: Some("http://localhost:11434/v1"),
        requires_key: false,
        models: &[
            ModelInfo { id: "qwen2.5-coder:7b", label: "Qwen 2.5 Coder 7B", recommended: true },
        ],
    },
];

/// Shorthand names accepted on the command line: (alias, provider id, model id).
pub static ALIASES: &[(&str, &str, &str)] = &[
    ("anthropic-sonnet4", "anthropic", "claude-sonnet-4-20250514"),
    ("openai-o3", "openai", "o3"),
    ("gemini-2.5-pro", "gemini", "gemini-2.5-pro"),
    ("gemini-2.5-flash", "gemini", "gemini-2.5-flash"),
];

pub fn get_provider(id: &str) -> Option<&'static ProviderInfo> {
    PROVIDERS.iter().find(|p| p.id == id)
}

pub fn get_default_model(provider: &ProviderInfo) -> &'static str {
    provider
        .models
        .iter()
        .find(|m| m.recommended)
        .or_else(|| provider.models.first())
        .map(|m| m.id)
        .unwrap_or_default()
}

/// Resolve a provider id or alias to the provider and the model it implies.
pub fn resolve(name: &str) -> Option<(&'static ProviderInfo, &'static str)> {
    let name = name.trim().to_ascii_lowercase();
    if let Some((_, provider_id, model)) = ALIASES.iter().find(|(alias, _, _)| *alias == name) {
        return get_provider(provider_id).map(|p| (p, *model));
    }
    get_provider(&name).map(|p| (p, get_default_model(p)))
}

/// First non-empty API key from the provider's environment variables.
pub fn api_key_from_env(provider: &ProviderInfo) -> Option<String> {
    provider
        .env_vars
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.trim().is_empty())
}
