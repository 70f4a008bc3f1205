use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::state::ScanState;

/// Bookkeeping for one scan run. Tasks, findings and strategy live in the
/// `SessionStore` under the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: String,
    pub target_url: String,
    pub start_time: DateTime<Utc>,
    pub current_step: u32,
    pub max_steps: u32,
    pub state: ScanState,
}

impl ScanSession {
    pub fn new(target_url: impl Into<String>, max_steps: u32) -> Self {
        Self {
            id: format!("scan-{}", uuid::Uuid::new_v4()),
            target_url: target_url.into(),
            start_time: Utc::now(),
            current_step: 0,
            max_steps,
            state: ScanState::Initializing,
        }
    }

    pub fn remaining_steps(&self) -> u32 {
        self.max_steps.saturating_sub(self.current_step)
    }

    /// Progress through the step budget, 0-100.
    pub fn progress_pct(&self) -> u32 {
        if self.max_steps == 0 {
            return 100;
        }
        ((self.current_step as f64 / self.max_steps as f64) * 100.0).round() as u32
    }
}
