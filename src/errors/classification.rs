use super::types::VulnAgentError;

/// Substrings that mark an oracle failure as a credential problem.
const CREDENTIAL_MARKERS: &[&str] = &[
    "401",
    "403",
    "Unauthorized",
    "Invalid API",
    "API key",
    "authentication",
];

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl VulnAgentError {
    /// Classify this error to determine its type and whether it can be retried.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Transient
            VulnAgentError::RateLimit(_) => ErrorClassification {
                error_type: "RateLimitError",
                retryable: true,
            },
            VulnAgentError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },
            VulnAgentError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                retryable: true,
            },
            VulnAgentError::OutputValidation(_) => ErrorClassification {
                error_type: "OutputValidationError",
                retryable: true,
            },
            VulnAgentError::LLMApi(_) => ErrorClassification {
                error_type: "LLMApiError",
                retryable: !self.is_credential_failure(),
            },

            // Policy violations and caller mistakes
            VulnAgentError::NotWhitelisted(_) => ErrorClassification {
                error_type: "WhitelistError",
                retryable: false,
            },
            VulnAgentError::InvalidTarget(_) => ErrorClassification {
                error_type: "InvalidTargetError",
                retryable: false,
            },
            VulnAgentError::Authentication(_) => ErrorClassification {
                error_type: "AuthenticationError",
                retryable: false,
            },
            VulnAgentError::Billing(_) => ErrorClassification {
                error_type: "BillingError",
                retryable: false,
            },
            VulnAgentError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            VulnAgentError::TaskNotFound(_) => ErrorClassification {
                error_type: "TaskNotFoundError",
                retryable: false,
            },
            VulnAgentError::InvalidTransition(_) => ErrorClassification {
                error_type: "InvalidTransitionError",
                retryable: false,
            },
            VulnAgentError::InvalidInput(_) => ErrorClassification {
                error_type: "InvalidInputError",
                retryable: false,
            },
            VulnAgentError::Cancelled(_) => ErrorClassification {
                error_type: "CancelledError",
                retryable: false,
            },
            VulnAgentError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: false,
            },
            VulnAgentError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
            },

            VulnAgentError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },
            VulnAgentError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: false,
            },
        }
    }

    /// True when an oracle call failed because of missing or rejected credentials.
    /// Such failures abort a whole scan instead of a single step.
    pub fn is_credential_failure(&self) -> bool {
        match self {
            VulnAgentError::Authentication(_) => true,
            VulnAgentError::LLMApi(msg) => {
                CREDENTIAL_MARKERS.iter().any(|marker| msg.contains(marker))
            }
            _ => false,
        }
    }

    /// User-facing message for a credential failure.
    pub fn credential_hint(&self) -> String {
        format!("Authentication failed: {}. Please check your API key.", self)
    }
}
