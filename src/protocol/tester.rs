use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::inject::ParameterLocation;
use crate::models::{HttpMethod, ProbeRequest, ProbeResponse, Severity, VulnClass};
use crate::utils::truncation::truncate_chars;

const BASELINE_BODY_CHARS: usize = 2000;
const TEST_BODY_CHARS: usize = 5000;

/// Vulnerability classes the test protocol can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VulnerabilityTestClass {
    Xss,
    Sqli,
    CommandInjection,
    PathTraversal,
    Ssrf,
    Xxe,
    Other,
}

impl VulnerabilityTestClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            VulnerabilityTestClass::Xss => "xss",
            VulnerabilityTestClass::Sqli => "sqli",
            VulnerabilityTestClass::CommandInjection => "command_injection",
            VulnerabilityTestClass::PathTraversal => "path_traversal",
            VulnerabilityTestClass::Ssrf => "ssrf",
            VulnerabilityTestClass::Xxe => "xxe",
            VulnerabilityTestClass::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VulnerabilityTestClass::Xss => "Cross-Site Scripting (XSS)",
            VulnerabilityTestClass::Sqli => "SQL Injection",
            VulnerabilityTestClass::CommandInjection => "OS Command Injection",
            VulnerabilityTestClass::PathTraversal => "Path Traversal",
            VulnerabilityTestClass::Ssrf => "Server-Side Request Forgery (SSRF)",
            VulnerabilityTestClass::Xxe => "XML External Entity (XXE)",
            VulnerabilityTestClass::Other => "other injection flaws",
        }
    }

    /// Finding taxonomy entry this class reports under.
    pub fn finding_class(&self) -> VulnClass {
        match self {
            VulnerabilityTestClass::Xss => VulnClass::Xss,
            VulnerabilityTestClass::Sqli => VulnClass::Sqli,
            VulnerabilityTestClass::CommandInjection => VulnClass::Injection,
            VulnerabilityTestClass::PathTraversal => VulnClass::PathTraversal,
            VulnerabilityTestClass::Ssrf => VulnClass::Ssrf,
            VulnerabilityTestClass::Xxe => VulnClass::Xxe,
            VulnerabilityTestClass::Other => VulnClass::Other,
        }
    }
}

impl fmt::Display for VulnerabilityTestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse effect of one payload, derived from the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Reflected,
    SqlErrorExposed,
    Blocked,
    ServerError,
    NoChange,
}

impl AttemptOutcome {
    pub fn from_verdict(class: VulnerabilityTestClass, verdict: &VerdictAnalysis, response: &ProbeResponse) -> Self {
        if verdict.is_vulnerable {
            if class == VulnerabilityTestClass::Sqli {
                AttemptOutcome::SqlErrorExposed
            } else {
                AttemptOutcome::Reflected
            }
        } else if verdict.filter_detected.is_some() {
            AttemptOutcome::Blocked
        } else if response.is_server_error() {
            AttemptOutcome::ServerError
        } else {
            AttemptOutcome::NoChange
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Reflected => "reflected",
            AttemptOutcome::SqlErrorExposed => "sql_error_exposed",
            AttemptOutcome::Blocked => "blocked",
            AttemptOutcome::ServerError => "server_error",
            AttemptOutcome::NoChange => "no_change",
        }
    }
}

/// One payload tried within a single protocol run. Never persisted.
#[derive(Debug, Clone)]
pub struct VulnerabilityAttempt {
    pub payload: String,
    pub technique: String,
    pub outcome: AttemptOutcome,
    pub response: ProbeResponse,
}

/// Oracle output for the "generate" step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPayload {
    pub payload: String,
    pub reasoning: String,
    pub technique: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub bypass: String,
}

/// Oracle output for the "analyze" step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictAnalysis {
    pub is_vulnerable: bool,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    pub severity: Severity,
    pub remediation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_next_payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_detected: Option<FilterDescriptor>,
}

/// Everything one protocol run needs to know about the parameter under test.
#[derive(Debug, Clone)]
pub struct TestContext {
    /// Request the payload is injected into.
    pub request: ProbeRequest,
    pub parameter: String,
    pub location: ParameterLocation,
    /// Response to the unmodified request.
    pub baseline: ProbeResponse,
}

impl TestContext {
    pub fn new(
        url: impl Into<String>,
        method: HttpMethod,
        parameter: impl Into<String>,
        location: ParameterLocation,
        baseline: ProbeResponse,
    ) -> Self {
        let mut request = ProbeRequest::get(url);
        request.method = method;
        Self {
            request,
            parameter: parameter.into(),
            location,
            baseline,
        }
    }
}

pub(crate) fn payload_schema() -> Value {
    json!({
        "type": "object",
        "required": ["payload", "reasoning", "technique", "confidence"],
        "properties": {
            "payload": { "type": "string", "minLength": 1 },
            "reasoning": { "type": "string" },
            "technique": { "type": "string" },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
        }
    })
}

pub(crate) fn verdict_schema() -> Value {
    json!({
        "type": "object",
        "required": ["is_vulnerable", "confidence", "evidence", "severity", "remediation"],
        "properties": {
            "is_vulnerable": { "type": "boolean" },
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
            "severity": { "type": "string", "enum": ["low", "medium", "high", "critical"] },
            "remediation": { "type": "string" },
            "suggested_next_payload": { "type": "string" },
            "filter_detected": {
                "type": "object",
                "required": ["type", "bypass"],
                "properties": {
                    "type": { "type": "string" },
                    "bypass": { "type": "string" }
                }
            }
        }
    })
}

pub(crate) fn payload_prompt(
    ctx: &TestContext,
    class: VulnerabilityTestClass,
    previous: &[VulnerabilityAttempt],
    suggestion: Option<&str>,
    filter: Option<&FilterDescriptor>,
) -> String {
    let mut prompt = format!(
        "Generate a payload to test for {}.\n\n\
         Target: {} {}\n\
         Parameter: {} (in {})\n\
         Baseline status: {}\n\
         Baseline body:\n{}\n",
        class.label(),
        ctx.request.method,
        ctx.request.url,
        ctx.parameter,
        ctx.location,
        ctx.baseline.status,
        truncate_chars(&ctx.baseline.body, BASELINE_BODY_CHARS),
    );

    if !previous.is_empty() {
        prompt.push_str("\nPrevious attempts:\n");
        for (i, attempt) in previous.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. {} [{}] -> {} (status {})\n",
                i + 1,
                attempt.payload,
                attempt.technique,
                attempt.outcome.as_str(),
                attempt.response.status
            ));
        }
    }
    if let Some(filter) = filter {
        prompt.push_str(&format!("\nFilter detected: {} (suggested bypass: {})\n", filter.kind, filter.bypass));
    }
    if let Some(next) = suggestion {
        prompt.push_str(&format!("\nSuggested next payload: {}\n", next));
    }

    prompt.push_str(
        "\nProduce one payload that differs from every previous attempt, name the technique \
         and rate your confidence from 0 to 1.",
    );
    prompt
}

pub(crate) fn verdict_prompt(
    ctx: &TestContext,
    class: VulnerabilityTestClass,
    payload: &str,
    response: &ProbeResponse,
) -> String {
    let mut headers: Vec<String> = response
        .headers
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect();
    headers.sort();

    format!(
        "Determine whether the response shows {}.\n\n\
         Parameter: {} (in {})\n\
         Payload: {}\n\n\
         Baseline status: {}\n\
         Baseline body:\n{}\n\n\
         Test status: {}\n\
         Test headers:\n{}\n\
         Test response body:\n{}\n\n\
         Compare baseline and test responses. Report whether the payload had a security-relevant \
         effect, your confidence, the evidence, a severity and remediation. If input filtering \
         blocked the payload, describe the filter and a bypass. Suggest a next payload when \
         further testing is worthwhile.",
        class.label(),
        ctx.parameter,
        ctx.location,
        payload,
        ctx.baseline.status,
        truncate_chars(&ctx.baseline.body, BASELINE_BODY_CHARS),
        response.status,
        headers.join("\n"),
        truncate_chars(&response.body, TEST_BODY_CHARS),
    )
}
