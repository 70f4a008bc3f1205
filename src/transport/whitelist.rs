use regex::Regex;
use url::{Host, Url};

use crate::errors::VulnAgentError;

/// Hosts that are always reachable regardless of configuration.
pub const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1", "0.0.0.0"];

/// Host allow-list. Entries match the hostname exactly or with `*` wildcards.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: Vec<String>,
    patterns: Vec<Regex>,
}

impl Whitelist {
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Result<Self, VulnAgentError> {
        let mut normalized = Vec::with_capacity(entries.len());
        let mut patterns = Vec::with_capacity(entries.len());

        for entry in entries {
            let host = normalize_entry(entry.as_ref());
            if host.is_empty() {
                continue;
            }
            let pattern = format!("^{}$", regex::escape(&host).replace(r"\*", ".*"));
            let regex = Regex::new(&pattern).map_err(|e| {
                VulnAgentError::Config(format!("Invalid whitelist entry '{}': {}", host, e))
            })?;
            normalized.push(host);
            patterns.push(regex);
        }

        Ok(Self { entries: normalized, patterns })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn allows_host(&self, host: &str) -> bool {
        let host = host.trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase();
        if LOOPBACK_HOSTS.contains(&host.as_str()) {
            return true;
        }
        self.patterns.iter().any(|p| p.is_match(&host))
    }

    pub fn allows(&self, url: &Url) -> bool {
        match url.host() {
            Some(Host::Domain(domain)) => self.allows_host(domain),
            Some(Host::Ipv4(ip)) => self.allows_host(&ip.to_string()),
            Some(Host::Ipv6(ip)) => self.allows_host(&ip.to_string()),
            None => false,
        }
    }

    /// Parse `raw` and fail with `NotWhitelisted` unless its host is allowed.
    pub fn check(&self, raw: &str) -> Result<Url, VulnAgentError> {
        let url = Url::parse(raw)
            .map_err(|e| VulnAgentError::InvalidTarget(format!("{}: {}", raw, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(VulnAgentError::InvalidTarget(format!(
                "{}: unsupported scheme '{}'",
                raw,
                url.scheme()
            )));
        }
        if !self.allows(&url) {
            return Err(VulnAgentError::NotWhitelisted(raw.to_string()));
        }
        Ok(url)
    }
}

/// Reduce `https://Api.Example.com:8443/x` style entries to a bare host.
fn normalize_entry(entry: &str) -> String {
    let trimmed = entry.trim().to_ascii_lowercase();
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed.as_str());
    let host = without_scheme.split('/').next().unwrap_or_default();
    if host.starts_with('[') {
        return host.split(']').next().unwrap_or_default().trim_start_matches('[').to_string();
    }
    host.split(':').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_empty_whitelist_allows_only_loopback() {
        let wl = Whitelist::new::<&str>(&[]).unwrap();
        assert!(wl.allows(&url("http://localhost:3000/")));
        assert!(wl.allows(&url("http://127.0.0.1/a")));
        assert!(wl.allows(&url("http://[::1]:8080/")));
        assert!(wl.allows(&url("http://0.0.0.0/")));
        assert!(!wl.allows(&url("https://example.com/")));
    }

    #[test]
    fn test_exact_match() {
        let wl = Whitelist::new(&["allowed.com"]).unwrap();
        assert!(wl.allows(&url("https://allowed.com/login")));
        assert!(!wl.allows(&url("https://notallowed.com/")));
        assert!(!wl.allows(&url("https://sub.allowed.com/")));
    }

    #[test]
    fn test_wildcard_match() {
        let wl = Whitelist::new(&["*.example.com"]).unwrap();
        assert!(wl.allows(&url("https://api.example.com/")));
        assert!(wl.allows(&url("https://a.b.example.com/")));
        assert!(!wl.allows(&url("https://example.com/")));
        assert!(!wl.allows(&url("https://example.com.evil.net/")));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let wl = Whitelist::new(&["a.b"]).unwrap();
        assert!(wl.allows(&url("http://a.b/")));
        assert!(!wl.allows(&url("http://axb/")));
    }

    #[test]
    fn test_entries_with_scheme_and_port_are_normalized() {
        let wl = Whitelist::new(&["https://Staging.Example.org:8443/app"]).unwrap();
        assert_eq!(wl.entries(), &["staging.example.org".to_string()]);
        assert!(wl.allows(&url("http://staging.example.org/")));
    }

    #[test]
    fn test_check_rejects_unlisted_host() {
        let wl = Whitelist::new(&["allowed.com"]).unwrap();
        let err = wl.check("https://notallowed.com/").unwrap_err();
        assert!(matches!(err, VulnAgentError::NotWhitelisted(_)));
        assert!(err.to_string().contains("not whitelisted"));
    }

    #[test]
    fn test_check_rejects_garbage_and_other_schemes() {
        let wl = Whitelist::default();
        assert!(matches!(wl.check("not a url"), Err(VulnAgentError::InvalidTarget(_))));
        assert!(matches!(wl.check("file:///etc/passwd"), Err(VulnAgentError::InvalidTarget(_))));
    }
}
