use async_trait::async_trait;
use serde_json::Value;

use super::decision;
use super::types::{LLMResponse, StepEvent, ToolDefinition};
use crate::errors::VulnAgentError;

/// The decision-making oracle. The scan core depends only on this trait;
/// each external provider is one implementation.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Free-form text completion
    async fn complete(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<LLMResponse, VulnAgentError>;

    /// Structured JSON completion shaped by `schema`
    async fn complete_structured(
        &self,
        prompt: &str,
        schema: &Value,
        system: Option<&str>,
    ) -> Result<Value, VulnAgentError>;

    /// Choose the next action(s) from `tools`.
    ///
    /// The default asks for a structured decision document; providers with
    /// native tool calling override it.
    async fn decide(
        &self,
        system: &str,
        prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<Vec<StepEvent>, VulnAgentError> {
        let schema = decision::decision_schema(tools);
        let prompt = decision::with_tool_catalog(prompt, tools);
        let value = self.complete_structured(&prompt, &schema, Some(system)).await?;
        decision::parse_decision(&value)
    }

    /// Provider name for logging
    fn provider_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;
}
