use reqwest::StatusCode;
use serde_json::Value;

use crate::errors::VulnAgentError;
use crate::utils::truncation::truncate_error;

/// Map a provider HTTP status (and body) onto the error taxonomy.
pub fn check_status(provider: &str, status: StatusCode, body: &str) -> Result<(), VulnAgentError> {
    if status.is_success() {
        return Ok(());
    }
    let detail = error_message(body).unwrap_or_else(|| truncate_error(body));
    match status.as_u16() {
        401 | 403 => Err(VulnAgentError::Authentication(format!(
            "{} rejected credentials ({}): {}",
            provider, status, detail
        ))),
        429 => Err(VulnAgentError::RateLimit(format!("{} rate limit exceeded: {}", provider, detail))),
        402 => Err(VulnAgentError::Billing(format!("{}: {}", provider, detail))),
        _ if detail.contains("billing") || detail.contains("quota") => {
            Err(VulnAgentError::Billing(format!("{}: {}", provider, detail)))
        }
        _ => Err(VulnAgentError::LLMApi(format!("{} returned {}: {}", provider, status, detail))),
    }
}

/// `error.message` (or a string `error`) from a provider error document.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
}

/// Pull a JSON value out of a completion that may wrap it in prose or a code fence.
pub fn extract_json(text: &str) -> Result<Value, VulnAgentError> {
    // Try direct parse first
    if let Ok(v) = serde_json::from_str::<Value>(text.trim()) {
        return Ok(v);
    }
    // Fenced ```json block
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            return serde_json::from_str(rest[..end].trim())
                .map_err(|e| VulnAgentError::OutputValidation(format!("Invalid JSON in code block: {}", e)));
        }
    }
    // First { to last }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return serde_json::from_str(&text[start..=end])
                .map_err(|e| VulnAgentError::OutputValidation(format!("Invalid JSON extraction: {}", e)));
        }
    }
    Err(VulnAgentError::OutputValidation("No valid JSON found in LLM response".into()))
}

/// Instruction appended to prompts for providers without a native JSON mode.
pub fn schema_instruction(prompt: &str, schema: &Value) -> String {
    format!(
        "{}\n\nRespond with valid JSON matching this schema:\n```json\n{}\n```\n\nReturn ONLY the JSON, no other text.",
        prompt,
        serde_json::to_string_pretty(schema).unwrap_or_default()
    )
}
