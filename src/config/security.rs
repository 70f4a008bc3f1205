use crate::errors::VulnAgentError;

const DANGEROUS_PATTERNS: &[&str] = &[
    "../",
    "..\\",
    "<script",
    "javascript:",
    "data:",
    "file:",
    "vbscript:",
    "{{",
    "${",
];

/// Reject configs whose string values carry traversal, script or template payloads.
pub fn validate_security_patterns(value: &serde_yaml::Value) -> Result<(), VulnAgentError> {
    check_value(value, &[])
}

fn check_value(value: &serde_yaml::Value, path: &[String]) -> Result<(), VulnAgentError> {
    match value {
        serde_yaml::Value::String(s) => {
            let lower = s.to_lowercase();
            for pattern in DANGEROUS_PATTERNS {
                if lower.contains(pattern) {
                    let path_str = if path.is_empty() { "root".to_string() } else { path.join(".") };
                    return Err(VulnAgentError::Config(format!(
                        "Dangerous pattern '{}' found at config path: {}",
                        pattern, path_str
                    )));
                }
            }
            Ok(())
        }
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let key = k.as_str().unwrap_or("unknown").to_string();
                let mut new_path = path.to_vec();
                new_path.push(key);
                check_value(v, &new_path)?;
            }
            Ok(())
        }
        serde_yaml::Value::Sequence(seq) => {
            for (i, v) in seq.iter().enumerate() {
                let mut new_path = path.to_vec();
                new_path.push(format!("[{}]", i));
                check_value(v, &new_path)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(yaml: &str) -> Result<(), VulnAgentError> {
        validate_security_patterns(&serde_yaml::from_str::<serde_yaml::Value>(yaml).unwrap())
    }

    #[test]
    fn test_safe_config_passes() {
        assert!(check("llm:\n  provider: anthropic\n  api_key: $ANTHROPIC_API_KEY\ntransport:\n  whitelist: ['*.example.com']").is_ok());
    }

    #[test]
    fn test_traversal_in_prompt_path_blocked() {
        let err = check("scan:\n  system_prompt_file: ../../etc/passwd").unwrap_err();
        assert!(err.to_string().contains("scan.system_prompt_file"));
    }

    #[test]
    fn test_script_and_uri_schemes_blocked() {
        assert!(check("value: '<SCRIPT>alert(1)</script>'").is_err());
        assert!(check("llm:\n  base_url: 'javascript:void(0)'").is_err());
        assert!(check("llm:\n  base_url: 'file:///etc/passwd'").is_err());
    }

    #[test]
    fn test_template_expressions_blocked() {
        assert!(check("transport:\n  user_agent: '{{7*7}}'").is_err());
        assert!(check("transport:\n  user_agent: '${jndi:ldap://x}'").is_err());
    }

    #[test]
    fn test_sequence_entries_are_checked() {
        let err = check("transport:\n  whitelist:\n    - ok.com\n    - '<script>'").unwrap_err();
        assert!(err.to_string().contains("transport.whitelist.[1]"));
    }

    #[test]
    fn test_numeric_values_pass() {
        assert!(check("scan:\n  max_steps: 50\n  min_steps: 0").is_ok());
    }
}
