use std::collections::VecDeque;

use serde::Serialize;

use crate::models::ProbeResponse;

const RESPONSE_CACHE_SIZE: usize = 25;

/// What a session has seen so far: endpoints, technologies, blocked
/// payloads and a small ring of recent responses.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionObservations {
    pub tested_endpoints: Vec<String>,
    pub discovered_endpoints: Vec<String>,
    pub technologies: Vec<String>,
    pub blocked_payloads: Vec<String>,
    #[serde(skip)]
    recent_responses: VecDeque<(String, ProbeResponse)>,
}

impl SessionObservations {
    pub fn record_tested(&mut self, url: &str) {
        push_unique(&mut self.tested_endpoints, url);
    }

    pub fn record_discovered(&mut self, url: &str) {
        push_unique(&mut self.discovered_endpoints, url);
    }

    pub fn record_technology(&mut self, name: &str) {
        push_unique(&mut self.technologies, name);
    }

    pub fn record_blocked(&mut self, payload: &str) {
        push_unique(&mut self.blocked_payloads, payload);
    }

    pub fn cache_response(&mut self, requested_url: &str, response: ProbeResponse) {
        if self.recent_responses.len() == RESPONSE_CACHE_SIZE {
            self.recent_responses.pop_front();
        }
        self.recent_responses.push_back((requested_url.to_string(), response));
    }

    /// Newest cached response whose requested or final URL equals `url`.
    pub fn response_for(&self, url: &str) -> Option<&ProbeResponse> {
        self.recent_responses
            .iter()
            .rev()
            .find(|(requested, response)| requested == url || response.url == url)
            .map(|(_, response)| response)
    }

    pub fn last_tested(&self, n: usize) -> &[String] {
        let start = self.tested_endpoints.len().saturating_sub(n);
        &self.tested_endpoints[start..]
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn response(url: &str, body: &str) -> ProbeResponse {
        ProbeResponse {
            status: 200,
            headers: HashMap::new(),
            body: body.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_tested_endpoints_are_deduplicated_in_order() {
        let mut obs = SessionObservations::default();
        obs.record_tested("http://localhost/a");
        obs.record_tested("http://localhost/b");
        obs.record_tested("http://localhost/a");
        obs.record_tested("http://localhost/c");
        assert_eq!(obs.tested_endpoints.len(), 3);
        assert_eq!(obs.last_tested(2), &["http://localhost/b".to_string(), "http://localhost/c".to_string()]);
    }

    #[test]
    fn test_response_cache_returns_newest_and_is_bounded() {
        let mut obs = SessionObservations::default();
        obs.cache_response("http://localhost/", response("http://localhost/", "old"));
        obs.cache_response("http://localhost/", response("http://localhost/", "new"));
        assert_eq!(obs.response_for("http://localhost/").unwrap().body, "new");

        for i in 0..RESPONSE_CACHE_SIZE {
            obs.cache_response(&format!("http://localhost/{i}"), response("x", "y"));
        }
        assert!(obs.response_for("http://localhost/").is_none());
    }

    #[test]
    fn test_response_lookup_by_final_url() {
        let mut obs = SessionObservations::default();
        obs.cache_response("http://localhost/old", response("http://localhost/new", "moved"));
        assert_eq!(obs.response_for("http://localhost/new").unwrap().body, "moved");
    }
}
