use serde_json::{json, Value};

use super::types::{StepEvent, ToolDefinition};
use crate::errors::VulnAgentError;

/// Schema of the decision document used by providers without native tool calling.
pub fn decision_schema(tools: &[ToolDefinition]) -> Value {
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    json!({
        "type": "object",
        "required": ["tool_calls"],
        "properties": {
            "reasoning": { "type": "string" },
            "tool_calls": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["tool", "arguments"],
                    "properties": {
                        "tool": { "type": "string", "enum": names },
                        "arguments": { "type": "object" }
                    }
                }
            }
        }
    })
}

/// Append a description of every tool and its argument schema to `prompt`.
pub fn with_tool_catalog(prompt: &str, tools: &[ToolDefinition]) -> String {
    let mut out = String::with_capacity(prompt.len() + tools.len() * 512);
    out.push_str(prompt);
    out.push_str("\n\n## Available Tools\n");
    for tool in tools {
        out.push_str(&format!(
            "\n### {}\n{}\nArguments schema: {}\n",
            tool.name,
            tool.description,
            serde_json::to_string(&tool.input_schema).unwrap_or_default()
        ));
    }
    out.push_str(
        "\nReply with a JSON object: {\"reasoning\": string, \"tool_calls\": [{\"tool\": name, \"arguments\": {...}}]}.",
    );
    out
}

/// Turn a decision document into step events, reasoning first.
pub fn parse_decision(value: &Value) -> Result<Vec<StepEvent>, VulnAgentError> {
    let calls = value
        .get("tool_calls")
        .and_then(Value::as_array)
        .ok_or_else(|| VulnAgentError::OutputValidation("Decision has no tool_calls array".into()))?;

    let mut events = Vec::with_capacity(calls.len() + 1);
    if let Some(text) = value.get("reasoning").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            events.push(StepEvent::Reasoning { text: text.to_string() });
        }
    }
    for call in calls {
        let tool = call
            .get("tool")
            .and_then(Value::as_str)
            .ok_or_else(|| VulnAgentError::OutputValidation("Tool call without a tool name".into()))?;
        let arguments = call.get("arguments").cloned().unwrap_or_else(|| json!({}));
        events.push(StepEvent::ToolInvocation { tool: tool.to_string(), arguments });
    }
    Ok(events)
}
