use dashmap::DashMap;

use super::observations::SessionObservations;
use crate::models::{FindingSummary, ScanStrategy, ScanTask, VulnerabilityFinding};

/// In-memory, per-session arenas for tasks, findings, strategy and
/// observations. Sessions are isolated by key; a handle is passed to every
/// component that needs it. Nothing is persisted.
#[derive(Debug, Default)]
pub struct SessionStore {
    tasks: DashMap<String, Vec<ScanTask>>,
    findings: DashMap<String, Vec<VulnerabilityFinding>>,
    strategies: DashMap<String, ScanStrategy>,
    observations: DashMap<String, SessionObservations>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Tasks

    /// Snapshot of the session's queue. Unknown sessions have an empty queue.
    pub fn tasks(&self, session_id: &str) -> Vec<ScanTask> {
        self.tasks.get(session_id).map(|t| t.value().clone()).unwrap_or_default()
    }

    /// Mutate the session's queue, creating it if needed.
    pub fn with_tasks<R>(&self, session_id: &str, f: impl FnOnce(&mut Vec<ScanTask>) -> R) -> R {
        let mut entry = self.tasks.entry(session_id.to_string()).or_default();
        f(entry.value_mut())
    }

    /// Mutate an existing queue only; `None` when the session has none.
    pub fn with_existing_tasks<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut Vec<ScanTask>) -> R,
    ) -> Option<R> {
        self.tasks.get_mut(session_id).map(|mut entry| f(entry.value_mut()))
    }

    pub fn pending_task_count(&self, session_id: &str) -> usize {
        self.tasks
            .get(session_id)
            .map(|t| t.iter().filter(|task| task.is_pending()).count())
            .unwrap_or(0)
    }

    // Findings

    pub fn findings(&self, session_id: &str) -> Vec<VulnerabilityFinding> {
        self.findings.get(session_id).map(|f| f.value().clone()).unwrap_or_default()
    }

    /// Append a finding and return tallies computed under the same lock.
    pub fn append_finding(&self, session_id: &str, finding: VulnerabilityFinding) -> FindingSummary {
        let mut entry = self.findings.entry(session_id.to_string()).or_default();
        entry.push(finding);
        FindingSummary::from_findings(&entry)
    }

    pub fn finding_summary(&self, session_id: &str) -> FindingSummary {
        self.findings
            .get(session_id)
            .map(|f| FindingSummary::from_findings(&f))
            .unwrap_or_default()
    }

    // Strategy

    pub fn strategy(&self, session_id: &str) -> Option<ScanStrategy> {
        self.strategies.get(session_id).map(|s| s.value().clone())
    }

    /// Store `strategy` wholesale, returning the one it replaced.
    pub fn replace_strategy(&self, session_id: &str, strategy: ScanStrategy) -> Option<ScanStrategy> {
        self.strategies.insert(session_id.to_string(), strategy)
    }

    // Observations

    pub fn observations(&self, session_id: &str) -> SessionObservations {
        self.observations.get(session_id).map(|o| o.value().clone()).unwrap_or_default()
    }

    pub fn observe<R>(&self, session_id: &str, f: impl FnOnce(&mut SessionObservations) -> R) -> R {
        let mut entry = self.observations.entry(session_id.to_string()).or_default();
        f(entry.value_mut())
    }

    // Lifecycle

    /// Drop every collection held for the session. Returns whether anything existed.
    pub fn clear_session(&self, session_id: &str) -> bool {
        let tasks = self.tasks.remove(session_id).is_some();
        let findings = self.findings.remove(session_id).is_some();
        let strategy = self.strategies.remove(session_id).is_some();
        let observations = self.observations.remove(session_id).is_some();
        tasks || findings || strategy || observations
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .tasks
            .iter()
            .map(|e| e.key().clone())
            .chain(self.findings.iter().map(|e| e.key().clone()))
            .chain(self.strategies.iter().map(|e| e.key().clone()))
            .chain(self.observations.iter().map(|e| e.key().clone()))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskKind, TaskStatus};
    use std::sync::Arc;

    fn task(id: &str, status: TaskStatus) -> ScanTask {
        ScanTask {
            id: id.to_string(),
            kind: TaskKind::ProbeEndpoint,
            target: "http://localhost".to_string(),
            priority: 0,
            status,
            metadata: None,
        }
    }

    #[test]
    fn test_unknown_session_reads_empty() {
        let store = SessionStore::new();
        assert!(store.tasks("nope").is_empty());
        assert!(store.findings("nope").is_empty());
        assert!(store.strategy("nope").is_none());
        assert_eq!(store.pending_task_count("nope"), 0);
        assert!(store.with_existing_tasks("nope", |t| t.len()).is_none());
        assert!(store.session_ids().is_empty());
    }

    #[test]
    fn test_sessions_are_isolated_and_clearable() {
        let store = SessionStore::new();
        store.with_tasks("a", |t| t.push(task("t1", TaskStatus::Pending)));
        store.with_tasks("b", |t| t.push(task("t2", TaskStatus::Completed)));
        store.replace_strategy("a", ScanStrategy::default());
        store.observe("a", |o| o.record_tested("http://localhost/"));

        assert_eq!(store.pending_task_count("a"), 1);
        assert_eq!(store.pending_task_count("b"), 0);
        assert_eq!(store.session_ids(), vec!["a".to_string(), "b".to_string()]);

        assert!(store.clear_session("a"));
        assert!(store.tasks("a").is_empty());
        assert!(store.strategy("a").is_none());
        assert!(store.observations("a").tested_endpoints.is_empty());
        assert_eq!(store.tasks("b").len(), 1);
        assert!(!store.clear_session("a"));
    }

    #[test]
    fn test_replace_strategy_returns_previous() {
        let store = SessionStore::new();
        assert!(store.replace_strategy("s", ScanStrategy::default()).is_none());
        let next = ScanStrategy { max_depth: 5, ..ScanStrategy::default() };
        assert_eq!(store.replace_strategy("s", next).unwrap().max_depth, 3);
        assert_eq!(store.strategy("s").unwrap().max_depth, 5);
    }

    #[tokio::test]
    async fn test_concurrent_sessions_do_not_interfere() {
        let store = Arc::new(SessionStore::new());
        let mut handles = Vec::new();
        for s in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let session = format!("session-{s}");
                for i in 0..50 {
                    store.with_tasks(&session, |t| t.push(task(&format!("t{i}"), TaskStatus::Pending)));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        for s in 0..8 {
            assert_eq!(store.tasks(&format!("session-{s}")).len(), 50);
        }
    }
}
