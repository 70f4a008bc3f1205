use crate::errors::VulnAgentError;
use crate::models::{FailureKind, ScanResult};

pub const SUCCESS: i32 = 0;
pub const SCAN_FAILED: i32 = 1;
pub const CONFIG_ERROR: i32 = 2;
pub const AUTH_ERROR: i32 = 3;

/// Exit code for a scan that ran to a result.
pub fn for_result(result: &ScanResult) -> i32 {
    match result.failure {
        None if result.completed => SUCCESS,
        Some(FailureKind::Authentication) => AUTH_ERROR,
        _ => SCAN_FAILED,
    }
}

/// Exit code for an error raised before or outside the scan loop.
pub fn for_error(error: &VulnAgentError) -> i32 {
    match error {
        VulnAgentError::Config(_)
        | VulnAgentError::Yaml(_)
        | VulnAgentError::InvalidTarget(_)
        | VulnAgentError::NotWhitelisted(_) => CONFIG_ERROR,
        e if e.is_credential_failure() => AUTH_ERROR,
        _ => SCAN_FAILED,
    }
}
