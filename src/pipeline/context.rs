use crate::models::{FindingSummary, ScanTask};
use crate::session::{ScanSession, SessionStore};
use crate::tools::ToolResult;
use crate::utils::formatting::percent;
use crate::utils::truncation::truncate_chars;

const RECENT_ENDPOINTS: usize = 3;
const NEXT_TASKS: usize = 3;
const RESULT_DIGEST_CHARS: usize = 2000;

/// What the oracle is told about the session before each decision.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub step: u32,
    pub max_steps: u32,
    pub findings: FindingSummary,
    pub pending_tasks: usize,
    pub tested_endpoints: usize,
    pub recent_endpoints: Vec<String>,
    pub focus: Vec<String>,
    pub next_tasks: Vec<ScanTask>,
    pub previous_results: Vec<String>,
}

impl StepContext {
    /// Snapshot the store for the step about to run.
    pub fn gather(store: &SessionStore, session: &ScanSession, previous: &[ToolResult]) -> Self {
        let mut pending: Vec<ScanTask> = store
            .tasks(&session.id)
            .into_iter()
            .filter(ScanTask::is_pending)
            .collect();
        pending.sort_by_key(|t| t.priority);

        let observations = store.observations(&session.id);
        let focus = store.strategy(&session.id).map(|s| s.focus_areas).unwrap_or_default();

        Self {
            step: session.current_step + 1,
            max_steps: session.max_steps,
            findings: store.finding_summary(&session.id),
            pending_tasks: pending.len(),
            tested_endpoints: observations.tested_endpoints.len(),
            recent_endpoints: observations.last_tested(RECENT_ENDPOINTS).to_vec(),
            focus,
            next_tasks: pending.into_iter().take(NEXT_TASKS).collect(),
            previous_results: previous
                .iter()
                .map(|r| format!("{}: {}", r.tool, truncate_chars(&r.to_json().to_string(), RESULT_DIGEST_CHARS)))
                .collect(),
        }
    }

    pub fn remaining_steps(&self) -> u32 {
        self.max_steps.saturating_sub(self.step)
    }

    pub fn render(&self) -> String {
        let focus = if self.focus.is_empty() {
            "general reconnaissance".to_string()
        } else {
            self.focus.join(", ")
        };
        let recent = if self.recent_endpoints.is_empty() {
            "- nothing tested yet".to_string()
        } else {
            self.recent_endpoints
                .iter()
                .map(|ep| format!("- tested {}", ep))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let next = if self.next_tasks.is_empty() {
            "- queue is empty".to_string()
        } else {
            self.next_tasks
                .iter()
                .enumerate()
                .map(|(i, t)| format!("{}. [{}] {} {} (priority {})", i + 1, t.id, t.kind, t.target, t.priority))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let mut out = format!(
            "## Current Status\n\n\
             Progress: step {}/{} ({}%)\n\
             Findings: {} total ({} critical/high)\n\
             Task queue: {} pending\n\
             Tested endpoints: {}\n\
             Current focus: {}\n\n\
             ## Recent Activity\n{}\n\n\
             ## Next Priority Tasks\n{}\n",
            self.step,
            self.max_steps,
            percent(self.step as u64, self.max_steps as u64),
            self.findings.total,
            self.findings.critical + self.findings.high,
            self.pending_tasks,
            self.tested_endpoints,
            focus,
            recent,
            next,
        );

        if !self.previous_results.is_empty() {
            out.push_str("\n## Previous Step Results\n");
            for result in &self.previous_results {
                out.push_str(result);
                out.push('\n');
            }
        }

        out.push_str(&format!(
            "\n## Your Decision\n\n\
             Choose the most valuable next action. Consider untested high-value endpoints, \
             deeper testing of existing findings and whether the strategy needs adjusting. \
             {} steps remain after this one.",
            self.remaining_steps()
        ));
        out
    }
}
