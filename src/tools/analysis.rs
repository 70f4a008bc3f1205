use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::errors::VulnAgentError;
use crate::llm::{self, LLMProvider};
use crate::models::{ProbeResponse, Severity};
use crate::protocol::EvidenceItem;
use crate::utils::truncation::truncate_chars;

const ANALYZE_BODY_CHARS: usize = 5000;
const EXTRACT_CONTENT_CHARS: usize = 10_000;

/// Headers whose absence is always reported.
pub const BASELINE_SECURITY_HEADERS: [&str; 4] = [
    "x-frame-options",
    "content-security-policy",
    "x-content-type-options",
    "strict-transport-security",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedVulnerability {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    pub description: String,
    pub remediation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MisconfiguredHeader {
    pub header: String,
    pub issue: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityHeaders {
    #[serde(default)]
    pub missing: Vec<String>,
    #[serde(default)]
    pub misconfigured: Vec<MisconfiguredHeader>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseAnalysis {
    #[serde(default)]
    pub vulnerabilities: Vec<DetectedVulnerability>,
    #[serde(default)]
    pub security_headers: SecurityHeaders,
    #[serde(default)]
    pub suspicious_patterns: Vec<String>,
}

pub fn missing_security_headers(response: &ProbeResponse) -> Vec<&'static str> {
    BASELINE_SECURITY_HEADERS
        .into_iter()
        .filter(|h| response.header(h).is_none())
        .collect()
}

fn analysis_schema() -> Value {
    json!({
        "type": "object",
        "required": ["vulnerabilities", "security_headers", "suspicious_patterns"],
        "properties": {
            "vulnerabilities": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["type", "severity", "confidence", "description", "remediation"],
                    "properties": {
                        "type": { "type": "string" },
                        "severity": { "type": "string", "enum": ["critical", "high", "medium", "low", "info"] },
                        "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
                        "evidence": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["type", "description"],
                                "properties": {
                                    "type": { "type": "string" },
                                    "description": { "type": "string" },
                                    "location": { "type": "string" }
                                }
                            }
                        },
                        "description": { "type": "string" },
                        "remediation": { "type": "string" }
                    }
                }
            },
            "security_headers": {
                "type": "object",
                "properties": {
                    "missing": { "type": "array", "items": { "type": "string" } },
                    "misconfigured": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["header", "issue"],
                            "properties": {
                                "header": { "type": "string" },
                                "issue": { "type": "string" }
                            }
                        }
                    }
                }
            },
            "suspicious_patterns": { "type": "array", "items": { "type": "string" } }
        }
    })
}

/// Oracle review of one response, with the local header baseline merged in.
pub async fn analyze_response(
    llm: &dyn LLMProvider,
    response: &ProbeResponse,
    focus: &[String],
) -> Result<ResponseAnalysis, VulnAgentError> {
    let mut headers: Vec<String> = response.headers.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
    headers.sort();

    let focus = if focus.is_empty() {
        "all common web vulnerability classes".to_string()
    } else {
        focus.join(", ")
    };
    let prompt = format!(
        "Analyze this HTTP response for security issues.\n\n\
         URL: {}\nStatus: {}\nHeaders:\n{}\n\nBody:\n{}\n\n\
         Focus on: {}\n\
         Identify vulnerabilities with evidence, missing or misconfigured security headers, \
         and suspicious patterns such as stack traces, debug output, secrets or internal paths.",
        response.url,
        response.status,
        headers.join("\n"),
        truncate_chars(&response.body, ANALYZE_BODY_CHARS),
        focus,
    );

    let mut analysis: ResponseAnalysis = llm::generate(llm, &prompt, &analysis_schema(), None).await?;

    for header in missing_security_headers(response) {
        if !analysis.security_headers.missing.iter().any(|m| m.eq_ignore_ascii_case(header)) {
            analysis.security_headers.missing.push(header.to_string());
        }
    }
    Ok(analysis)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Link,
    Script,
    Stylesheet,
    Image,
    Api,
    Form,
    Websocket,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedLink {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: LinkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
    pub is_internal: bool,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedForm {
    pub action: String,
    pub method: String,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPattern {
    pub pattern: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub total_links: usize,
    pub internal_links: usize,
    pub forms: usize,
    pub api_endpoints: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkExtraction {
    #[serde(default)]
    pub links: Vec<ExtractedLink>,
    #[serde(default)]
    pub forms: Vec<ExtractedForm>,
    #[serde(default)]
    pub api_patterns: Vec<ApiPattern>,
    #[serde(default)]
    pub technologies: Vec<String>,
}

impl LinkExtraction {
    pub fn stats(&self) -> LinkStats {
        LinkStats {
            total_links: self.links.len(),
            internal_links: self.links.iter().filter(|l| l.is_internal).count(),
            forms: self.forms.len(),
            api_endpoints: self.links.iter().filter(|l| l.kind == LinkKind::Api).count() + self.api_patterns.len(),
        }
    }

    /// Internal links resolved against `base_url`. Unparseable ones are dropped.
    pub fn internal_endpoints(&self, base_url: &str) -> Vec<String> {
        let Ok(base) = Url::parse(base_url) else {
            return Vec::new();
        };
        let mut out: Vec<String> = Vec::new();
        for link in self.links.iter().filter(|l| l.is_internal) {
            if let Ok(resolved) = base.join(&link.url) {
                let resolved = resolved.to_string();
                if !out.contains(&resolved) {
                    out.push(resolved);
                }
            }
        }
        out
    }
}

fn extraction_schema() -> Value {
    json!({
        "type": "object",
        "required": ["links", "forms", "api_patterns", "technologies"],
        "properties": {
            "links": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["url", "type", "is_internal"],
                    "properties": {
                        "url": { "type": "string" },
                        "type": {
                            "type": "string",
                            "enum": ["link", "script", "stylesheet", "image", "api", "form", "websocket", "other"]
                        },
                        "method": { "type": "string" },
                        "parameters": { "type": "array", "items": { "type": "string" } },
                        "is_internal": { "type": "boolean" },
                        "source": { "type": "string" }
                    }
                }
            },
            "forms": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["action", "method"],
                    "properties": {
                        "action": { "type": "string" },
                        "method": { "type": "string" },
                        "fields": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["name"],
                                "properties": {
                                    "name": { "type": "string" },
                                    "type": { "type": "string" },
                                    "required": { "type": "boolean" }
                                }
                            }
                        }
                    }
                }
            },
            "api_patterns": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["pattern", "description"],
                    "properties": {
                        "pattern": { "type": "string" },
                        "description": { "type": "string" },
                        "example_endpoint": { "type": "string" }
                    }
                }
            },
            "technologies": { "type": "array", "items": { "type": "string" } }
        }
    })
}

pub async fn extract_links(
    llm: &dyn LLMProvider,
    base_url: &str,
    content: &str,
) -> Result<LinkExtraction, VulnAgentError> {
    let prompt = format!(
        "Extract every link, form, API endpoint pattern and technology hint from this content.\n\n\
         Base URL: {}\n\nContent:\n{}\n\n\
         Mark a link internal when it stays on the base URL's host. Include script sources, \
         fetch/XHR endpoints and websocket URLs found in JavaScript.",
        base_url,
        truncate_chars(content, EXTRACT_CONTENT_CHARS),
    );
    llm::generate(llm, &prompt, &extraction_schema(), None).await
}
