use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::finding::{Severity, VulnerabilityFinding};
use super::strategy::ScanStrategy;
use crate::errors::VulnAgentError;
use crate::pipeline::state::ScanState;

/// Why a scan ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The oracle rejected its credentials.
    Authentication,
    Cancelled,
    Error,
}

impl FailureKind {
    pub fn of(error: &VulnAgentError) -> Self {
        match error {
            VulnAgentError::Cancelled(_) => FailureKind::Cancelled,
            e if e.is_credential_failure() => FailureKind::Authentication,
            _ => FailureKind::Error,
        }
    }
}

/// Final outcome of one scan session, handed to callers and report renderers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub session_id: String,
    pub target_url: String,
    /// Findings recorded during the session, including partial runs.
    pub findings: Vec<VulnerabilityFinding>,
    pub steps_executed: u32,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Distinct tool names invoked, sorted.
    pub tools_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ScanStrategy>,
    pub strategy_updates: u32,
    pub state: ScanState,
    pub completed: bool,
}

impl ScanResult {
    /// Returns a map of severity level to the count of findings at that severity.
    pub fn finding_counts(&self) -> HashMap<Severity, usize> {
        let mut counts = HashMap::new();
        for finding in &self.findings {
            *counts.entry(finding.severity).or_insert(0) += 1;
        }
        counts
    }

    pub fn total_findings(&self) -> usize {
        self.findings.len()
    }
}
