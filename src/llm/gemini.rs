use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::provider::LLMProvider;
use super::response::{check_status, extract_json, schema_instruction};
use super::types::LLMResponse;
use crate::errors::VulnAgentError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl GeminiProvider {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 8192,
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

    fn request_body(&self, prompt: &str, system: Option<&str>, json_mode: bool) -> Value {
        let mut generation = json!({ "maxOutputTokens": self.max_tokens });
        if let Some(t) = self.temperature {
            generation["temperature"] = json!(t);
        }
        if json_mode {
            generation["responseMimeType"] = json!("application/json");
        }

        let mut body = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": generation,
        });
        if let Some(sys) = system {
            body["systemInstruction"] = json!({"parts": [{"text": sys}]});
        }
        body
    }

    async fn generate_content(&self, body: &Value) -> Result<LLMResponse, VulnAgentError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| VulnAgentError::Network(format!("Gemini request failed: {}", e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| VulnAgentError::Network(format!("Gemini response read failed: {}", e)))?;
        check_status("Gemini", status, &text)?;

        let data: Value = serde_json::from_str(&text)
            .map_err(|e| VulnAgentError::LLMApi(format!("Failed to parse Gemini response: {}", e)))?;

        let content: String = data["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect::<Vec<_>>().join(""))
            .unwrap_or_default();
        if content.is_empty() {
            let reason = data["candidates"][0]["finishReason"].as_str().unwrap_or("unknown");
            return Err(VulnAgentError::LLMApi(format!("Empty Gemini response (finish reason: {})", reason)));
        }

        let input_tokens = data["usageMetadata"]["promptTokenCount"].as_u64();
        let output_tokens = data["usageMetadata"]["candidatesTokenCount"].as_u64();
        debug!(model = %self.model, input_tokens, output_tokens, "Gemini completion");

        Ok(LLMResponse {
            content,
            input_tokens,
            output_tokens,
            model: self.model.clone(),
        })
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<LLMResponse, VulnAgentError> {
        self.generate_content(&self.request_body(prompt, system, false)).await
    }

    async fn complete_structured(&self, prompt: &str, schema: &Value, system: Option<&str>) -> Result<Value, VulnAgentError> {
        let body = self.request_body(&schema_instruction(prompt, schema), system, true);
        let response = self.generate_content(&body).await?;
        extract_json(&response.content)
    }

    fn provider_name(&self) -> &str { "gemini" }
    fn model_name(&self) -> &str { &self.model }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_mode_sets_mime_type() {
        let p = GeminiProvider::new("k", "gemini-2.5-flash");
        let body = p.request_body("x", Some("sys"), true);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert!(p.request_body("x", None, false).get("systemInstruction").is_none());
    }
}
