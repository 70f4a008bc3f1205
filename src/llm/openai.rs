use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::provider::LLMProvider;
use super::response::{check_status, extract_json, schema_instruction};
use super::types::{LLMResponse, Message, StepEvent, ToolDefinition};
use crate::errors::VulnAgentError;

/// OpenAI chat-completions client. Also serves OpenRouter and local
/// OpenAI-compatible servers through `base_url`.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    label: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl OpenAIProvider {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_base_url(api_key, model, "https://api.openai.com/v1")
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            label: "OpenAI".to_string(),
            max_tokens: 4096,
            temperature: None,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: Option<f32>) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    fn request_body(&self, prompt: &str, system: Option<&str>) -> Value {
        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(Message::system(sys));
        }
        messages.push(Message::user(prompt));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        body
    }

    async fn post_chat(&self, body: &Value) -> Result<Value, VulnAgentError> {
        let mut request = self.client.post(format!("{}/chat/completions", self.base_url)).json(body);
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }
        let resp = request
            .send()
            .await
            .map_err(|e| VulnAgentError::Network(format!("{} request failed: {}", self.label, e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| VulnAgentError::Network(format!("{} response read failed: {}", self.label, e)))?;
        check_status(&self.label, status, &text)?;

        serde_json::from_str(&text)
            .map_err(|e| VulnAgentError::LLMApi(format!("Failed to parse {} response: {}", self.label, e)))
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<LLMResponse, VulnAgentError> {
        let data = self.post_chat(&self.request_body(prompt, system)).await?;

        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| VulnAgentError::LLMApi(format!("No content in {} response", self.label)))?
            .to_string();
        let input_tokens = data["usage"]["prompt_tokens"].as_u64();
        let output_tokens = data["usage"]["completion_tokens"].as_u64();
        debug!(model = %self.model, input_tokens, output_tokens, "Chat completion");

        Ok(LLMResponse {
            content,
            input_tokens,
            output_tokens,
            model: self.model.clone(),
        })
    }

    async fn complete_structured(&self, prompt: &str, schema: &Value, system: Option<&str>) -> Result<Value, VulnAgentError> {
        let mut body = self.request_body(&schema_instruction(prompt, schema), system);
        body["response_format"] = json!({ "type": "json_object" });

        let data = self.post_chat(&body).await?;
        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| VulnAgentError::LLMApi(format!("No content in {} structured response", self.label)))?;
        extract_json(content)
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
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {"name": t.name, "description": t.description, "parameters": t.input_schema}
                    })
                })
                .collect(),
        );
        body["tool_choice"] = json!("required");

        let data = self.post_chat(&body).await?;
        let message = &data["choices"][0]["message"];

        let mut events = Vec::new();
        if let Some(text) = message["content"].as_str() {
            if !text.trim().is_empty() {
                events.push(StepEvent::Reasoning { text: text.to_string() });
            }
        }
        for call in message["tool_calls"].as_array().into_iter().flatten() {
            let function = &call["function"];
            let tool = function["name"]
                .as_str()
                .ok_or_else(|| VulnAgentError::OutputValidation("tool call without name".into()))?;
            // Arguments arrive as a JSON-encoded string.
            let arguments = match &function["arguments"] {
                Value::String(raw) => serde_json::from_str(raw).map_err(|e| {
                    VulnAgentError::OutputValidation(format!("Invalid arguments for {}: {}", tool, e))
                })?,
                Value::Null => json!({}),
                other => other.clone(),
            };
            events.push(StepEvent::ToolInvocation { tool: tool.to_string(), arguments });
        }
        Ok(events)
    }

    fn provider_name(&self) -> &str { "openai" }
    fn model_name(&self) -> &str { &self.model }
}
