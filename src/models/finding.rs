use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::http::HttpMethod;

/// Severity level for a security finding, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Returns a numeric rank where lower values indicate higher severity.
    /// Critical = 0, High = 1, Medium = 2, Low = 3, Info = 4.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    pub fn is_critical_or_high(&self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vulnerability taxonomy. `Other` is a last resort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VulnClass {
    #[serde(rename = "XSS", alias = "xss")]
    Xss,
    #[serde(rename = "SQLi", alias = "sqli", alias = "SQL Injection")]
    Sqli,
    Authentication,
    Authorization,
    #[serde(rename = "CSRF", alias = "csrf")]
    Csrf,
    #[serde(rename = "Information Disclosure")]
    InformationDisclosure,
    Configuration,
    Injection,
    #[serde(rename = "Path Traversal")]
    PathTraversal,
    #[serde(rename = "XXE", alias = "xxe")]
    Xxe,
    #[serde(rename = "SSRF", alias = "ssrf")]
    Ssrf,
    Deserialization,
    #[serde(rename = "File Upload")]
    FileUpload,
    #[serde(rename = "Business Logic")]
    BusinessLogic,
    #[serde(rename = "Race Condition")]
    RaceCondition,
    Other,
}

impl VulnClass {
    pub const ALL: [VulnClass; 16] = [
        VulnClass::Xss,
        VulnClass::Sqli,
        VulnClass::Authentication,
        VulnClass::Authorization,
        VulnClass::Csrf,
        VulnClass::InformationDisclosure,
        VulnClass::Configuration,
        VulnClass::Injection,
        VulnClass::PathTraversal,
        VulnClass::Xxe,
        VulnClass::Ssrf,
        VulnClass::Deserialization,
        VulnClass::FileUpload,
        VulnClass::BusinessLogic,
        VulnClass::RaceCondition,
        VulnClass::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VulnClass::Xss => "XSS",
            VulnClass::Sqli => "SQLi",
            VulnClass::Authentication => "Authentication",
            VulnClass::Authorization => "Authorization",
            VulnClass::Csrf => "CSRF",
            VulnClass::InformationDisclosure => "Information Disclosure",
            VulnClass::Configuration => "Configuration",
            VulnClass::Injection => "Injection",
            VulnClass::PathTraversal => "Path Traversal",
            VulnClass::Xxe => "XXE",
            VulnClass::Ssrf => "SSRF",
            VulnClass::Deserialization => "Deserialization",
            VulnClass::FileUpload => "File Upload",
            VulnClass::BusinessLogic => "Business Logic",
            VulnClass::RaceCondition => "Race Condition",
            VulnClass::Other => "Other",
        }
    }
}

impl fmt::Display for VulnClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvidence {
    #[serde(default)]
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEvidence {
    pub status: u16,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Request/response pair plus the payload that triggered the behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingEvidence {
    pub request: RequestEvidence,
    pub response: ResponseEvidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindingMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technique: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owasp: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

/// A finding as submitted, before the recorder assigns id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFinding {
    #[serde(rename = "type")]
    pub class: VulnClass,
    pub severity: Severity,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    pub evidence: FindingEvidence,
    pub description: String,
    pub remediation: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FindingMetadata>,
}

/// A recorded, evidenced vulnerability. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnerabilityFinding {
    pub id: String,
    #[serde(rename = "type")]
    pub class: VulnClass,
    pub severity: Severity,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    pub evidence: FindingEvidence,
    pub description: String,
    pub remediation: String,
    /// Always within [0, 1].
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FindingMetadata>,
}

impl VulnerabilityFinding {
    pub fn from_new(id: String, finding: NewFinding, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            class: finding.class,
            severity: finding.severity,
            url: finding.url,
            parameter: finding.parameter,
            evidence: finding.evidence,
            description: finding.description,
            remediation: finding.remediation,
            confidence: finding.confidence,
            timestamp,
            metadata: finding.metadata,
        }
    }
}

/// Running tallies over a session's findings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
}

impl FindingSummary {
    pub fn from_findings(findings: &[VulnerabilityFinding]) -> Self {
        Self {
            total: findings.len(),
            critical: findings.iter().filter(|f| f.severity == Severity::Critical).count(),
            high: findings.iter().filter(|f| f.severity == Severity::High).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_rank_orders_critical_first() {
        assert!(Severity::Critical.rank() < Severity::High.rank());
        assert!(Severity::Low.rank() < Severity::Info.rank());
    }

    #[test]
    fn test_vuln_class_wire_names() {
        let json = serde_json::to_string(&VulnClass::InformationDisclosure).unwrap();
        assert_eq!(json, "\"Information Disclosure\"");
        let parsed: VulnClass = serde_json::from_str("\"sqli\"").unwrap();
        assert_eq!(parsed, VulnClass::Sqli);
        for class in VulnClass::ALL {
            let value = serde_json::to_value(class).unwrap();
            assert_eq!(value.as_str(), Some(class.as_str()));
        }
    }

    #[test]
    fn test_unknown_class_rejected() {
        assert!(serde_json::from_str::<VulnClass>("\"Prompt Injection\"").is_err());
        assert!(serde_json::from_str::<Severity>("\"severe\"").is_err());
    }
}
