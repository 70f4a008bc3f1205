use thiserror::Error;

#[derive(Debug, Error)]
pub enum VulnAgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("LLM API error: {0}")]
    LLMApi(String),

    #[error("Rate limited: {0}")]
    RateLimit(String),

    #[error("Billing/quota error: {0}")]
    Billing(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("URL not whitelisted: {0}")]
    NotWhitelisted(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Output validation error: {0}")]
    OutputValidation(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid task transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
