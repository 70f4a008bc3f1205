use serde_json::json;

use super::params::ToolKind;
use crate::llm::ToolDefinition;

/// Every tool the oracle may call, in catalog order.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolKind::ALL.into_iter().map(definition).collect()
}

pub fn definition(kind: ToolKind) -> ToolDefinition {
    let (description, input_schema) = match kind {
        ToolKind::Probe => (
            "Send an HTTP request to a whitelisted URL and return status, headers, body and timing. \
             Use this for reconnaissance and to capture baselines before testing.",
            json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "Absolute URL to request" },
                    "method": {
                        "type": "string",
                        "enum": ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"],
                        "default": "GET"
                    },
                    "headers": {
                        "type": "object",
                        "additionalProperties": { "type": "string" },
                        "description": "Extra request headers"
                    },
                    "body": { "type": "string", "description": "Raw request body" }
                },
                "required": ["url"]
            }),
        ),
        ToolKind::AnalyzeResponse => (
            "Analyze an HTTP response for vulnerabilities, missing or misconfigured security headers \
             and suspicious patterns. Pass a response, or a URL that was probed earlier.",
            json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "URL of a previously probed response" },
                    "response": {
                        "type": "object",
                        "properties": {
                            "status": { "type": "integer" },
                            "headers": { "type": "object", "additionalProperties": { "type": "string" } },
                            "body": { "type": "string" }
                        },
                        "required": ["status"]
                    },
                    "focus": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Vulnerability classes to emphasize"
                    }
                }
            }),
        ),
        ToolKind::ExtractLinks => (
            "Extract links, forms, API patterns and technologies from page content. Internal links \
             become discovered endpoints. Content defaults to the last probed body of base_url.",
            json!({
                "type": "object",
                "properties": {
                    "base_url": { "type": "string", "description": "URL the content was fetched from" },
                    "content": { "type": "string", "description": "HTML or JavaScript to parse" }
                },
                "required": ["base_url"]
            }),
        ),
        ToolKind::TestPayload => (
            "Test one parameter for one vulnerability class. Generates payloads, injects them, \
             compares against the baseline and retries with bypasses when a filter is detected.",
            json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string" },
                    "parameter": { "type": "string", "description": "Parameter name to inject into" },
                    "location": { "type": "string", "enum": ["query", "path", "body", "header", "cookie"] },
                    "vulnerability_type": {
                        "type": "string",
                        "enum": ["xss", "sqli", "command_injection", "path_traversal", "ssrf", "xxe", "other"]
                    },
                    "method": {
                        "type": "string",
                        "enum": ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"]
                    },
                    "max_attempts": { "type": "integer", "minimum": 1, "maximum": 10 }
                },
                "required": ["url", "parameter", "location", "vulnerability_type"]
            }),
        ),
        ToolKind::ReportFinding => (
            "Record a confirmed vulnerability with evidence. Only report what you have verified.",
            json!({
                "type": "object",
                "properties": {
                    "type": {
                        "type": "string",
                        "enum": [
                            "XSS", "SQLi", "Authentication", "Authorization", "CSRF",
                            "Information Disclosure", "Configuration", "Injection", "Path Traversal",
                            "XXE", "SSRF", "Deserialization", "File Upload", "Business Logic",
                            "Race Condition", "Other"
                        ]
                    },
                    "severity": { "type": "string", "enum": ["critical", "high", "medium", "low", "info"] },
                    "url": { "type": "string" },
                    "parameter": { "type": "string" },
                    "evidence": {
                        "type": "object",
                        "properties": {
                            "request": {
                                "type": "object",
                                "properties": {
                                    "method": { "type": "string" },
                                    "url": { "type": "string" },
                                    "headers": { "type": "object" },
                                    "body": { "type": "string" }
                                },
                                "required": ["method", "url"]
                            },
                            "response": {
                                "type": "object",
                                "properties": {
                                    "status": { "type": "integer" },
                                    "headers": { "type": "object" },
                                    "body": { "type": "string" }
                                },
                                "required": ["status"]
                            },
                            "payload": { "type": "string" }
                        },
                        "required": ["request", "response"]
                    },
                    "description": { "type": "string" },
                    "remediation": { "type": "string" },
                    "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
                    "metadata": {
                        "type": "object",
                        "properties": {
                            "technique": { "type": "string" },
                            "cwe": { "type": "string" },
                            "owasp": { "type": "string" },
                            "references": { "type": "array", "items": { "type": "string" } }
                        }
                    }
                },
                "required": ["type", "severity", "url", "evidence", "description", "remediation", "confidence"]
            }),
        ),
        ToolKind::ManageTasks => (
            "Manage the scan task queue: add, update, get, prioritize or complete tasks. \
             Lower priority numbers run first.",
            json!({
                "type": "object",
                "properties": {
                    "action": { "type": "string", "enum": ["add", "update", "get", "prioritize", "complete"] },
                    "task": {
                        "type": "object",
                        "description": "For add (type and target required) and update (id required)",
                        "properties": {
                            "id": { "type": "string" },
                            "type": {
                                "type": "string",
                                "enum": ["probe_endpoint", "analyze_response", "extract_links", "test_payload"]
                            },
                            "target": { "type": "string" },
                            "priority": { "type": "integer", "minimum": 0 },
                            "status": { "type": "string", "enum": ["pending", "in_progress", "completed", "failed"] },
                            "metadata": { "type": "object" }
                        }
                    },
                    "filter": {
                        "type": "object",
                        "properties": {
                            "status": { "type": "string", "enum": ["pending", "in_progress", "completed", "failed"] },
                            "type": {
                                "type": "string",
                                "enum": ["probe_endpoint", "analyze_response", "extract_links", "test_payload"]
                            }
                        }
                    },
                    "context": {
                        "type": "object",
                        "properties": {
                            "current_findings": { "type": "integer" },
                            "completed_tasks": { "type": "integer" },
                            "remaining_steps": { "type": "integer" }
                        },
                        "required": ["current_findings", "completed_tasks", "remaining_steps"]
                    },
                    "task_id": { "type": "string", "description": "For complete" }
                },
                "required": ["action"]
            }),
        ),
        ToolKind::UpdateStrategy => (
            "Re-plan the scan from current progress. Report payloads that were blocked and \
             technologies you detected; returns the new focus, tactics and adjustments.",
            json!({
                "type": "object",
                "properties": {
                    "blocked_payloads": { "type": "array", "items": { "type": "string" } },
                    "technologies": { "type": "array", "items": { "type": "string" } }
                }
            }),
        ),
    };

    ToolDefinition {
        name: kind.name().to_string(),
        description: description.to_string(),
        input_schema,
    }
}
