use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::credentials::resolve_credential;
use crate::errors::RetryConfig;
use crate::llm::LlmSettings;
use crate::pipeline::ScanConfig;
use crate::transport::{RateLimitConfig, TransportConfig};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct VulnAgentConfig {
    pub llm: LlmConfig,
    pub transport: TransportSection,
    pub scan: ScanSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider id or alias.
    pub provider: String,
    pub model: Option<String>,
    /// Literal key or `$ENV_VAR` reference.
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: None,
            api_key: None,
            base_url: None,
            temperature: None,
            max_tokens: 4096,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportSection {
    pub whitelist: Vec<String>,
    pub rate_limit: RateLimitConfig,
    pub timeout_ms: u64,
    pub retries: u32,
    pub backoff_base_ms: u64,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            whitelist: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            timeout_ms: 10_000,
            retries: 3,
            backoff_base_ms: 1000,
            user_agent: "VulnAgent/1.0".to_string(),
            max_redirects: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanSection {
    pub max_steps: u32,
    pub min_steps: u32,
    pub strategy_interval: u32,
    pub max_attempts: u32,
    pub oracle_retries: u32,
    pub system_prompt_file: Option<PathBuf>,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            max_steps: 100,
            min_steps: 5,
            strategy_interval: 20,
            max_attempts: 3,
            oracle_retries: 2,
            system_prompt_file: None,
        }
    }
}

impl VulnAgentConfig {
    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            provider: self.llm.provider.clone(),
            api_key: self.llm.api_key.as_deref().map(resolve_credential),
            model: self.llm.model.clone(),
            base_url: self.llm.base_url.clone(),
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        let t = &self.transport;
        TransportConfig {
            whitelist: t.whitelist.clone(),
            rate_limit: t.rate_limit,
            timeout: Duration::from_millis(t.timeout_ms),
            retries: t.retries,
            backoff_base: Duration::from_millis(t.backoff_base_ms),
            user_agent: t.user_agent.clone(),
            max_redirects: t.max_redirects,
        }
    }

    pub fn scan_config(&self) -> ScanConfig {
        let s = &self.scan;
        ScanConfig {
            max_steps: s.max_steps,
            min_steps: s.min_steps,
            strategy_interval: s.strategy_interval,
            max_attempts: s.max_attempts,
            oracle_retry: RetryConfig {
                max_retries: s.oracle_retries,
                base_delay: Duration::from_millis(self.transport.backoff_base_ms),
            },
            system_prompt_file: s.system_prompt_file.clone(),
        }
    }
}
