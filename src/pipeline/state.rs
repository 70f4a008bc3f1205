use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::RetryConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Initializing,
    Scanning,
    Completed,
    Failed,
}

impl ScanState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanState::Completed | ScanState::Failed)
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Scanning => write!(f, "scanning"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Step-loop limits and oracle settings for one scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub max_steps: u32,
    /// Early exit on an empty queue is allowed only after this many steps.
    pub min_steps: u32,
    /// Run the strategy adapter every this many steps. Zero disables it.
    pub strategy_interval: u32,
    /// Default attempts per test_payload call.
    pub max_attempts: u32,
    pub oracle_retry: RetryConfig,
    /// Replaces the built-in system prompt.
    pub system_prompt_file: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            min_steps: 5,
            strategy_interval: 20,
            max_attempts: 3,
            oracle_retry: RetryConfig {
                max_retries: 2,
                base_delay: std::time::Duration::from_secs(1),
            },
            system_prompt_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ScanState::Completed).unwrap(), "\"completed\"");
        assert!(ScanState::Failed.is_terminal());
        assert!(!ScanState::Scanning.is_terminal());
    }
}
