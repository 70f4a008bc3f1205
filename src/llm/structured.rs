use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::provider::LLMProvider;
use crate::errors::VulnAgentError;

/// Ask the oracle for a value of shape `schema`, validate it and deserialize it.
pub async fn generate<T: DeserializeOwned>(
    llm: &dyn LLMProvider,
    prompt: &str,
    schema: &Value,
    system: Option<&str>,
) -> Result<T, VulnAgentError> {
    let value = llm.complete_structured(prompt, schema, system).await?;
    validate_against(schema, &value)?;
    debug!(provider = llm.provider_name(), "Structured output validated");
    serde_json::from_value(value)
        .map_err(|e| VulnAgentError::OutputValidation(format!("Unexpected structured output: {}", e)))
}

pub fn validate_against(schema: &Value, value: &Value) -> Result<(), VulnAgentError> {
    let compiled = jsonschema::JSONSchema::compile(schema)
        .map_err(|e| VulnAgentError::Internal(format!("Schema compilation error: {}", e)))?;

    let result = compiled.validate(value);
    if let Err(errors) = result {
        let messages: Vec<String> = errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        return Err(VulnAgentError::OutputValidation(messages.join("; ")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::LLMResponse;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;

    struct Canned(Value);

    #[async_trait]
    impl LLMProvider for Canned {
        async fn complete(&self, _prompt: &str, _system: Option<&str>) -> Result<LLMResponse, VulnAgentError> {
            Ok(LLMResponse { content: self.0.to_string(), input_tokens: None, output_tokens: None, model: "canned".into() })
        }
        async fn complete_structured(&self, _p: &str, _s: &Value, _sys: Option<&str>) -> Result<Value, VulnAgentError> {
            Ok(self.0.clone())
        }
        fn provider_name(&self) -> &str { "canned" }
        fn model_name(&self) -> &str { "canned" }
    }

    #[derive(Debug, Deserialize)]
    struct Score {
        confidence: f64,
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["confidence"],
            "properties": { "confidence": { "type": "number", "minimum": 0, "maximum": 1 } }
        })
    }

    #[tokio::test]
    async fn test_generate_accepts_valid_output() {
        let llm = Canned(json!({"confidence": 0.7}));
        let score: Score = generate(&llm, "rate it", &schema(), None).await.unwrap();
        assert_eq!(score.confidence, 0.7);
    }

    #[tokio::test]
    async fn test_generate_rejects_out_of_range() {
        let llm = Canned(json!({"confidence": 1.5}));
        let err = generate::<Score>(&llm, "rate it", &schema(), None).await.unwrap_err();
        assert!(matches!(err, VulnAgentError::OutputValidation(_)));
    }

    #[tokio::test]
    async fn test_generate_rejects_missing_field() {
        let llm = Canned(json!({}));
        assert!(generate::<Score>(&llm, "rate it", &schema(), None).await.is_err());
    }
}
