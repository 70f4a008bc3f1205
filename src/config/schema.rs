use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "llm": {
                "type": "object",
                "properties": {
                    "provider": { "type": "string" },
                    "model": { "type": "string" },
                    "api_key": { "type": "string" },
                    "base_url": { "type": "string" },
                    "temperature": { "type": "number", "minimum": 0, "maximum": 2 },
                    "max_tokens": { "type": "integer", "minimum": 1 }
                }
            },
            "transport": {
                "type": "object",
                "properties": {
                    "whitelist": { "type": "array", "items": { "type": "string" } },
                    "rate_limit": {
                        "type": "object",
                        "properties": {
                            "max_requests": { "type": "integer", "minimum": 1 },
                            "window_ms": { "type": "integer", "minimum": 1 }
                        }
                    },
                    "timeout_ms": { "type": "integer", "minimum": 1 },
                    "retries": { "type": "integer", "minimum": 0, "maximum": 10 },
                    "backoff_base_ms": { "type": "integer", "minimum": 0 },
                    "user_agent": { "type": "string" },
                    "max_redirects": { "type": "integer", "minimum": 0 }
                }
            },
            "scan": {
                "type": "object",
                "properties": {
                    "max_steps": { "type": "integer", "minimum": 1 },
                    "min_steps": { "type": "integer", "minimum": 0 },
                    "strategy_interval": { "type": "integer", "minimum": 0 },
                    "max_attempts": { "type": "integer", "minimum": 1, "maximum": 10 },
                    "oracle_retries": { "type": "integer", "minimum": 0, "maximum": 10 },
                    "system_prompt_file": { "type": "string" }
                }
            }
        }
    })
});
