use std::path::Path;

use crate::config::credentials::mask_key;
use crate::config::parse_config;
use crate::errors::VulnAgentError;
use crate::llm::create_provider;
use crate::transport::Whitelist;

/// Parse a config file and check that its whitelist and provider resolve.
pub async fn handle_validate(path: &str) -> Result<(), VulnAgentError> {
    let config = parse_config(Path::new(path)).await?;
    Whitelist::new(&config.transport.whitelist)?;

    // A missing key is reported but does not invalidate the file.
    match create_provider(&config.llm_settings()) {
        Ok(provider) => println!("LLM: {} / {}", provider.provider_name(), provider.model_name()),
        Err(e) if e.is_credential_failure() => println!("LLM: {} (warning: {})", config.llm.provider, e),
        Err(e) => return Err(e),
    }
    if let Some(key) = config.llm_settings().api_key.filter(|k| !k.starts_with('$')) {
        println!("API key: {}", mask_key(&key));
    }
    println!("Whitelist: {} entries", config.transport.whitelist.len());
    println!("Configuration is valid: {}", path);
    Ok(())
}
