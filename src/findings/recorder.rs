use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::errors::VulnAgentError;
use crate::models::{FindingSummary, NewFinding, VulnerabilityFinding};
use crate::session::SessionStore;
use crate::utils::ids::timestamped_id;

#[derive(Debug, Clone, Serialize)]
pub struct FindingReport {
    pub finding: VulnerabilityFinding,
    pub summary: FindingSummary,
    pub message: String,
}

/// Validates and appends findings. Findings are never edited or deduplicated.
pub struct FindingRecorder {
    store: Arc<SessionStore>,
}

impl FindingRecorder {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    pub fn report(&self, session_id: &str, finding: NewFinding) -> Result<FindingReport, VulnAgentError> {
        validate(&finding)?;

        let id = timestamped_id(session_id);
        let recorded = VulnerabilityFinding::from_new(id, finding, Utc::now());
        let message = format!(
            "{} severity {} vulnerability reported successfully",
            recorded.severity.as_str().to_uppercase(),
            recorded.class
        );

        info!(
            session_id,
            finding_id = %recorded.id,
            class = %recorded.class,
            severity = %recorded.severity,
            url = %recorded.url,
            "Finding recorded"
        );
        let summary = self.store.append_finding(session_id, recorded.clone());

        Ok(FindingReport { finding: recorded, summary, message })
    }

    pub fn findings(&self, session_id: &str) -> Vec<VulnerabilityFinding> {
        self.store.findings(session_id)
    }

    pub fn summary(&self, session_id: &str) -> FindingSummary {
        self.store.finding_summary(session_id)
    }
}

fn validate(finding: &NewFinding) -> Result<(), VulnAgentError> {
    if !finding.confidence.is_finite() || !(0.0..=1.0).contains(&finding.confidence) {
        return Err(VulnAgentError::InvalidInput(format!(
            "confidence must be within [0, 1], got {}",
            finding.confidence
        )));
    }
    if finding.url.trim().is_empty() {
        return Err(VulnAgentError::InvalidInput("finding url must not be empty".into()));
    }
    if finding.description.trim().is_empty() {
        return Err(VulnAgentError::InvalidInput("finding description must not be empty".into()));
    }
    Ok(())
}
