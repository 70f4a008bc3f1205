use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[serde(alias = "test_endpoint")]
    ProbeEndpoint,
    AnalyzeResponse,
    ExtractLinks,
    TestPayload,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::ProbeEndpoint => "probe_endpoint",
            TaskKind::AnalyzeResponse => "analyze_response",
            TaskKind::ExtractLinks => "extract_links",
            TaskKind::TestPayload => "test_payload",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Completed | TaskStatus::Failed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    /// Statuses only move forward: pending -> in_progress -> completed | failed.
    /// Staying put is allowed; leaving a terminal status is not.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        *self == next || (!self.is_terminal() && next.rank() > self.rank())
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work in a session's queue. Lower priority runs sooner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanTask {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub target: String,
    pub priority: u32,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ScanTask {
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

/// Input to `TaskManager::add`. Missing fields receive defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub target: String,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl NewTask {
    pub fn new(kind: TaskKind, target: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            target: target.into(),
            priority: None,
            status: None,
            metadata: None,
        }
    }
}

/// Partial update merged into an existing task by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: Option<TaskKind>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default, rename = "type")]
    pub kind: Option<TaskKind>,
}

impl TaskFilter {
    pub fn matches(&self, task: &ScanTask) -> bool {
        self.status.map_or(true, |s| task.status == s) && self.kind.map_or(true, |k| task.kind == k)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[ScanTask]) -> Self {
        let mut stats = TaskStats { total: tasks.len(), ..Default::default() };
        for task in tasks {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}
