use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::provider::LLMProvider;
use super::response::{check_status, extract_json, schema_instruction};
use super::types::{LLMResponse, StepEvent, ToolDefinition};
use crate::errors::VulnAgentError;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 4096,
            temperature: None,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: Option<f32>) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    fn request_body(&self, prompt: &str, system: Option<&str>) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{"role": "user", "content": prompt}]
        });
        if let Some(sys) = system {
            body["system"] = json!(sys);
        }
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        body
    }

    async fn post_messages(&self, body: &Value) -> Result<Value, VulnAgentError> {
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| VulnAgentError::Network(format!("Anthropic API request failed: {}", e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| VulnAgentError::Network(format!("Anthropic response read failed: {}", e)))?;
        check_status("Anthropic", status, &text)?;

        serde_json::from_str(&text)
            .map_err(|e| VulnAgentError::LLMApi(format!("Failed to parse Anthropic response: {}", e)))
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<LLMResponse, VulnAgentError> {
        let data = self.post_messages(&self.request_body(prompt, system)).await?;

        let content: String = data["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VulnAgentError::LLMApi("No content in Anthropic response".into()))?;

        let input_tokens = data["usage"]["input_tokens"].as_u64();
        let output_tokens = data["usage"]["output_tokens"].as_u64();
        debug!(model = %self.model, input_tokens, output_tokens, "Anthropic completion");

        Ok(LLMResponse {
            content,
            input_tokens,
            output_tokens,
            model: self.model.clone(),
        })
    }

    async fn complete_structured(&self, prompt: &str, schema: &Value, system: Option<&str>) -> Result<Value, VulnAgentError> {
        let response = self.complete(&schema_instruction(prompt, schema), system).await?;
        extract_json(&response.content)
    }

    async fn decide(
        &self,
        system: &str,
        prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<Vec<StepEvent>, VulnAgentError> {
        let mut body = self.request_body(prompt, Some(system));
        body["tools"] = Value::Array(
            tools
                .iter()
                .map(|t| json!({"name": t.name, "description": t.description, "input_schema": t.input_schema}))
                .collect(),
        );
        body["tool_choice"] = json!({"type": "any"});

        let data = self.post_messages(&body).await?;
        let blocks = data["content"]
            .as_array()
            .ok_or_else(|| VulnAgentError::LLMApi("No content in Anthropic response".into()))?;

        let mut events = Vec::with_capacity(blocks.len());
        for block in blocks {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(text) = block["text"].as_str() {
                        events.push(StepEvent::Reasoning { text: text.to_string() });
                    }
                }
                Some("tool_use") => {
                    let tool = block["name"]
                        .as_str()
                        .ok_or_else(|| VulnAgentError::OutputValidation("tool_use block without name".into()))?;
                    events.push(StepEvent::ToolInvocation {
                        tool: tool.to_string(),
                        arguments: block["input"].clone(),
                    });
                }
                _ => {}
            }
        }
        Ok(events)
    }

    fn provider_name(&self) -> &str { "anthropic" }
    fn model_name(&self) -> &str { &self.model }
}
