use crate::models::{Severity, VulnClass};

/// Messages sent from the orchestrator to a display consumer.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    ScanStarted {
        session_id: String,
        target: String,
        max_steps: u32,
    },
    StepStarted {
        step: u32,
        max_steps: u32,
    },
    /// Oracle reasoning text for the current step
    Reasoning {
        text: String,
    },
    ToolStarted {
        tool: String,
    },
    ToolCompleted {
        tool: String,
        success: bool,
        error: Option<String>,
    },
    FindingReported {
        class: VulnClass,
        severity: Severity,
        url: String,
    },
    StrategyUpdated {
        focus_areas: Vec<String>,
        significant_change: bool,
    },
    /// The oracle failed for this step; the loop continues.
    StepFailed {
        step: u32,
        error: String,
    },
    ScanCompleted {
        steps: u32,
        total_findings: usize,
        duration_ms: u64,
    },
    ScanFailed {
        error: String,
    },
}
