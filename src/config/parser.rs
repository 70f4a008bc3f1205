use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::schema::CONFIG_SCHEMA;
use super::security::validate_security_patterns;
use super::types::VulnAgentConfig;
use crate::errors::VulnAgentError;

const MAX_CONFIG_BYTES: u64 = 1_048_576;
const LOCAL_CONFIG: &str = ".vulnagent.yaml";

pub async fn parse_config(path: &Path) -> Result<VulnAgentConfig, VulnAgentError> {
    if !path.exists() {
        return Err(VulnAgentError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(VulnAgentError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let yaml: serde_yaml::Value = serde_yaml::from_str(&content)?;

    // An empty file is a valid, all-defaults config.
    if yaml.is_null() {
        return Ok(VulnAgentConfig::default());
    }

    validate_security_patterns(&yaml)?;
    validate_schema(&yaml)?;

    let config: VulnAgentConfig = serde_yaml::from_value(yaml)?;
    validate_conflicts(&config)?;

    Ok(config)
}

/// Explicit path, else `./.vulnagent.yaml`, else the per-user config file.
pub fn discover_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok();
    let xdg = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from);
    let home = std::env::var_os("HOME").map(PathBuf::from);
    discover_in(explicit, cwd.as_deref(), xdg.as_deref(), home.as_deref())
}

fn discover_in(explicit: Option<&Path>, cwd: Option<&Path>, xdg: Option<&Path>, home: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = cwd.map(|d| d.join(LOCAL_CONFIG));
    let global = xdg
        .map(Path::to_path_buf)
        .or_else(|| home.map(|h| h.join(".config")))
        .map(|d| d.join("vulnagent").join("config.yaml"));

    [local, global].into_iter().flatten().find(|p| p.is_file())
}

/// Load the first config found by [`discover_config_path`], or defaults.
pub async fn load_layered_config(explicit: Option<&Path>) -> Result<(VulnAgentConfig, Option<PathBuf>), VulnAgentError> {
    match discover_config_path(explicit) {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            let config = parse_config(&path).await?;
            Ok((config, Some(path)))
        }
        None => {
            debug!("No configuration file found, using defaults");
            Ok((VulnAgentConfig::default(), None))
        }
    }
}

/// Validate config against the JSON schema for structural correctness.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), VulnAgentError> {
    let json_value: serde_json::Value = serde_json::to_value(yaml)
        .map_err(|e| VulnAgentError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| VulnAgentError::Config(format!("Schema compilation error: {}", e)))?;

    let result = compiled.validate(&json_value);
    if let Err(errors) = result {
        // Advisory: typed parsing below is the hard gate.
        for e in errors {
            warn!(validation_error = %format!("{} at {}", e, e.instance_path), "Config schema warning");
        }
    }

    Ok(())
}

/// Detect semantic conflicts in the parsed configuration.
fn validate_conflicts(config: &VulnAgentConfig) -> Result<(), VulnAgentError> {
    if config.scan.max_steps == 0 {
        return Err(VulnAgentError::Config("scan.max_steps must be at least 1".into()));
    }
    if config.transport.rate_limit.max_requests == 0 || config.transport.rate_limit.window_ms == 0 {
        return Err(VulnAgentError::Config(
            "transport.rate_limit needs a positive max_requests and window_ms".into(),
        ));
    }

    if let Some(path) = &config.scan.system_prompt_file {
        if !path.is_file() {
            return Err(VulnAgentError::Config(format!(
                "scan.system_prompt_file not found: {}",
                path.display()
            )));
        }
    }

    if config.scan.min_steps > config.scan.max_steps {
        warn!(
            min_steps = config.scan.min_steps,
            max_steps = config.scan.max_steps,
            "min_steps exceeds max_steps, early exit will never trigger"
        );
    }
    if config.transport.whitelist.is_empty() {
        info!("Transport whitelist is empty, only loopback targets are reachable");
    }
    if let Some(key) = &config.llm.api_key {
        if !key.starts_with('$') {
            warn!("llm.api_key is stored in plain text, prefer a $ENV_VAR reference");
        }
    }

    Ok(())
}
