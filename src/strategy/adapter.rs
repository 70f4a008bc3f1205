use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::errors::VulnAgentError;
use crate::llm::{self, LLMProvider};
use crate::models::{ScanStrategy, Tactic, TestIntensity};
use crate::session::SessionStore;
use crate::utils::formatting::percent;

/// Session progress as seen by the strategy oracle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StrategySnapshot {
    pub completed_steps: u32,
    pub remaining_steps: u32,
    pub findings_by_class: BTreeMap<String, usize>,
    pub critical_or_high: usize,
    pub tested_endpoints: usize,
    pub discovered_endpoints: usize,
    pub blocked_payloads: Vec<String>,
    pub technologies: Vec<String>,
}

impl StrategySnapshot {
    /// Build a snapshot from what the store holds for `session_id`.
    pub fn from_store(store: &SessionStore, session_id: &str, completed_steps: u32, remaining_steps: u32) -> Self {
        let findings = store.findings(session_id);
        let observations = store.observations(session_id);

        let mut findings_by_class = BTreeMap::new();
        for f in &findings {
            *findings_by_class.entry(f.class.to_string()).or_insert(0) += 1;
        }

        Self {
            completed_steps,
            remaining_steps,
            findings_by_class,
            critical_or_high: findings.iter().filter(|f| f.severity.is_critical_or_high()).count(),
            tested_endpoints: observations.tested_endpoints.len(),
            discovered_endpoints: observations.discovered_endpoints.len(),
            blocked_payloads: observations.blocked_payloads,
            technologies: observations.technologies,
        }
    }

    pub fn progress_pct(&self) -> u64 {
        percent(self.completed_steps as u64, (self.completed_steps + self.remaining_steps) as u64)
    }

    pub fn total_findings(&self) -> usize {
        self.findings_by_class.values().sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyUpdate {
    pub strategy: ScanStrategy,
    pub previous: ScanStrategy,
    pub reasoning: String,
    pub tactics: Vec<Tactic>,
    pub adjustments: Vec<String>,
    /// Focus areas or intensity changed. Informational only.
    pub significant_change: bool,
}

#[derive(Debug, Deserialize)]
struct StrategyAdvice {
    recommendations: Recommendations,
    #[serde(default)]
    tactics: Vec<Tactic>,
    #[serde(default)]
    adjustments: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Recommendations {
    #[serde(default)]
    focus_areas: Vec<String>,
    #[serde(default)]
    skip_patterns: Vec<String>,
    max_depth: u32,
    test_intensity: TestIntensity,
    #[serde(default)]
    reasoning: String,
}

fn strategy_schema() -> Value {
    json!({
        "type": "object",
        "required": ["recommendations"],
        "properties": {
            "recommendations": {
                "type": "object",
                "required": ["focus_areas", "skip_patterns", "max_depth", "test_intensity", "reasoning"],
                "properties": {
                    "focus_areas": { "type": "array", "items": { "type": "string" } },
                    "skip_patterns": { "type": "array", "items": { "type": "string" } },
                    "max_depth": { "type": "integer", "minimum": 1 },
                    "test_intensity": { "type": "string", "enum": ["light", "normal", "thorough"] },
                    "reasoning": { "type": "string" }
                }
            },
            "tactics": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["technique", "description", "priority"],
                    "properties": {
                        "technique": { "type": "string" },
                        "description": { "type": "string" },
                        "priority": { "type": "string", "enum": ["high", "medium", "low"] }
                    }
                }
            },
            "adjustments": { "type": "array", "items": { "type": "string" } }
        }
    })
}

/// Recomputes a session's testing focus from its progress.
pub struct StrategyAdapter {
    store: Arc<SessionStore>,
    llm: Arc<dyn LLMProvider>,
}

impl StrategyAdapter {
    pub fn new(store: Arc<SessionStore>, llm: Arc<dyn LLMProvider>) -> Self {
        Self { store, llm }
    }

    pub fn current(&self, session_id: &str) -> ScanStrategy {
        self.store.strategy(session_id).unwrap_or_default()
    }

    /// Ask the oracle for a new strategy and store it in place of the old one.
    pub async fn update(&self, session_id: &str, snapshot: &StrategySnapshot) -> Result<StrategyUpdate, VulnAgentError> {
        let previous = self.current(session_id);
        let prompt = strategy_prompt(snapshot, &previous);

        let advice: StrategyAdvice =
            llm::generate(self.llm.as_ref(), &prompt, &strategy_schema(), None).await?;

        let strategy = ScanStrategy {
            focus_areas: advice.recommendations.focus_areas,
            skip_patterns: advice.recommendations.skip_patterns,
            max_depth: advice.recommendations.max_depth,
            test_intensity: advice.recommendations.test_intensity,
        };
        let significant_change = strategy.differs_significantly(&previous);
        self.store.replace_strategy(session_id, strategy.clone());

        info!(
            session_id,
            significant_change,
            intensity = %strategy.test_intensity,
            focus = ?strategy.focus_areas,
            "Strategy updated"
        );

        Ok(StrategyUpdate {
            strategy,
            previous,
            reasoning: advice.recommendations.reasoning,
            tactics: advice.tactics,
            adjustments: advice.adjustments,
            significant_change,
        })
    }
}

fn strategy_prompt(snapshot: &StrategySnapshot, current: &ScanStrategy) -> String {
    let by_class = if snapshot.findings_by_class.is_empty() {
        "none yet".to_string()
    } else {
        snapshot
            .findings_by_class
            .iter()
            .map(|(class, n)| format!("{}: {}", class, n))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let list_or_none = |items: &[String]| {
        if items.is_empty() {
            "none".to_string()
        } else {
            items.join(", ")
        }
    };

    format!(
        "Review the progress of this web security scan and recommend how to continue.\n\n\
         ## Progress\n\
         Progress: {}% ({} steps done, {} remaining)\n\
         Findings: {} total ({} critical/high)\n\
         Findings by type: {}\n\
         Endpoints tested: {} of {} discovered\n\
         Blocked payloads: {}\n\
         Detected technologies: {}\n\n\
         ## Current Strategy\n\
         Focus areas: {}\nSkip patterns: {}\nMax depth: {}\nIntensity: {}\n\n\
         ## Guidance\n\
         - Many findings: look for the same patterns across the rest of the site.\n\
         - Blocked payloads: plan filter bypass techniques.\n\
         - Few findings: widen scope or try other vulnerability classes.\n\
         - Few steps left: go for unexplored high-value targets.\n\n\
         Recommend focus areas, URL substrings to skip, a max crawl depth and a test intensity \
         (light, normal or thorough), plus ranked tactics and concrete adjustments.",
        snapshot.progress_pct(),
        snapshot.completed_steps,
        snapshot.remaining_steps,
        snapshot.total_findings(),
        snapshot.critical_or_high,
        by_class,
        snapshot.tested_endpoints,
        snapshot.discovered_endpoints,
        list_or_none(&snapshot.blocked_payloads),
        list_or_none(&snapshot.technologies),
        list_or_none(&current.focus_areas),
        list_or_none(&current.skip_patterns),
        current.max_depth,
        current.test_intensity,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMResponse;
    use crate::models::TacticPriority;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Advisor {
        replies: Mutex<Vec<Value>>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LLMProvider for Advisor {
        async fn complete(&self, _p: &str, _s: Option<&str>) -> Result<LLMResponse, VulnAgentError> {
            Err(VulnAgentError::Internal("unused".into()))
        }
        async fn complete_structured(&self, prompt: &str, _schema: &Value, _s: Option<&str>) -> Result<Value, VulnAgentError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.replies.lock().unwrap().remove(0))
        }
        fn provider_name(&self) -> &str { "advisor" }
        fn model_name(&self) -> &str { "advisor" }
    }

    fn advice(focus: &[&str], intensity: &str, depth: u32) -> Value {
        json!({
            "recommendations": {
                "focus_areas": focus,
                "skip_patterns": ["/logout"],
                "max_depth": depth,
                "test_intensity": intensity,
                "reasoning": "xss filters seen"
            },
            "tactics": [{"technique": "encoding bypass", "description": "try html entities", "priority": "high"}],
            "adjustments": ["slow down on /api"]
        })
    }

    #[tokio::test]
    async fn test_update_replaces_strategy_and_flags_change() {
        let store = Arc::new(SessionStore::new());
        let advisor = Arc::new(Advisor {
            replies: Mutex::new(vec![
                advice(&["xss"], "thorough", 4),
                advice(&["xss"], "thorough", 6),
            ]),
            prompts: Mutex::new(Vec::new()),
        });
        let adapter = StrategyAdapter::new(store.clone(), advisor.clone());
        let snapshot = StrategySnapshot {
            completed_steps: 20,
            remaining_steps: 80,
            blocked_payloads: vec!["<script>alert(1)</script>".into()],
            ..StrategySnapshot::default()
        };

        let first = adapter.update("s", &snapshot).await.unwrap();
        assert!(first.significant_change);
        assert_eq!(first.previous, ScanStrategy::default());
        assert_eq!(first.tactics[0].priority, TacticPriority::High);
        assert_eq!(store.strategy("s").unwrap().skip_patterns, vec!["/logout".to_string()]);

        let second = adapter.update("s", &snapshot).await.unwrap();
        assert!(!second.significant_change);
        assert_eq!(store.strategy("s").unwrap().max_depth, 6);

        let prompt = &advisor.prompts.lock().unwrap()[0];
        assert!(prompt.contains("Progress: 20%"));
        assert!(prompt.contains("Blocked payloads: <script>alert(1)</script>"));
        assert!(prompt.contains("Intensity: normal"));
    }

    #[tokio::test]
    async fn test_invalid_intensity_leaves_strategy_untouched() {
        let store = Arc::new(SessionStore::new());
        let advisor = Arc::new(Advisor {
            replies: Mutex::new(vec![advice(&[], "extreme", 3)]),
            prompts: Mutex::new(Vec::new()),
        });
        let adapter = StrategyAdapter::new(store.clone(), advisor);
        let err = adapter.update("s", &StrategySnapshot::default()).await.unwrap_err();
        assert!(matches!(err, VulnAgentError::OutputValidation(_)));
        assert!(store.strategy("s").is_none());
    }

    #[test]
    fn test_snapshot_from_store() {
        let store = SessionStore::new();
        store.observe("s", |o| {
            o.record_tested("http://localhost/");
            o.record_discovered("http://localhost/a");
            o.record_discovered("http://localhost/b");
            o.record_technology("nginx");
        });
        let snap = StrategySnapshot::from_store(&store, "s", 5, 15);
        assert_eq!(snap.tested_endpoints, 1);
        assert_eq!(snap.discovered_endpoints, 2);
        assert_eq!(snap.technologies, vec!["nginx".to_string()]);
        assert_eq!(snap.progress_pct(), 25);
        assert_eq!(snap.total_findings(), 0);
    }
}
