use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::errors::VulnAgentError;
use crate::llm::{self, LLMProvider};
use crate::models::{NewTask, ScanTask, TaskFilter, TaskStats, TaskStatus, TaskUpdate};
use crate::session::SessionStore;
use crate::utils::ids::timestamped_id;

/// Session progress handed to the oracle when reordering the queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrioritizationContext {
    pub current_findings: usize,
    pub completed_tasks: usize,
    pub remaining_steps: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskListing {
    pub tasks: Vec<ScanTask>,
    pub stats: TaskStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriorityChange {
    pub task_id: String,
    pub old_priority: u32,
    pub new_priority: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrioritizationOutcome {
    /// Pending tasks in their new order.
    pub tasks: Vec<ScanTask>,
    pub changes: Vec<PriorityChange>,
}

#[derive(Debug, Deserialize)]
struct PrioritizedTasks {
    prioritized_tasks: Vec<PrioritizedTask>,
}

#[derive(Debug, Deserialize)]
struct PrioritizedTask {
    task_index: usize,
    new_priority: u32,
    #[serde(default)]
    reasoning: Option<String>,
}

fn prioritization_schema() -> Value {
    json!({
        "type": "object",
        "required": ["prioritized_tasks"],
        "properties": {
            "prioritized_tasks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["task_index", "new_priority"],
                    "properties": {
                        "task_index": { "type": "integer", "minimum": 1 },
                        "new_priority": { "type": "integer", "minimum": 0 },
                        "reasoning": { "type": "string" }
                    }
                }
            }
        }
    })
}

/// CRUD and oracle-driven reordering over a session's task queue.
pub struct TaskManager {
    store: Arc<SessionStore>,
    llm: Arc<dyn LLMProvider>,
}

impl TaskManager {
    pub fn new(store: Arc<SessionStore>, llm: Arc<dyn LLMProvider>) -> Self {
        Self { store, llm }
    }

    /// Append a task. Id, priority (queue length) and status (pending) default when absent.
    pub fn add(&self, session_id: &str, task: NewTask) -> Result<ScanTask, VulnAgentError> {
        if task.target.trim().is_empty() {
            return Err(VulnAgentError::InvalidInput("Task target must not be empty".into()));
        }

        self.store.with_tasks(session_id, |tasks| {
            let id = task.id.unwrap_or_else(|| timestamped_id("task"));
            if tasks.iter().any(|t| t.id == id) {
                return Err(VulnAgentError::InvalidInput(format!("Task {} already exists", id)));
            }
            let created = ScanTask {
                id,
                kind: task.kind,
                target: task.target,
                priority: task.priority.unwrap_or(tasks.len() as u32),
                status: task.status.unwrap_or_default(),
                metadata: task.metadata,
            };
            tasks.push(created.clone());
            debug!(session_id, task_id = %created.id, kind = %created.kind, "Task added");
            Ok(created)
        })
    }

    /// Merge `update` into the task with the same id. Unknown ids and
    /// backward status moves fail without touching the queue.
    pub fn update(&self, session_id: &str, update: TaskUpdate) -> Result<ScanTask, VulnAgentError> {
        let id = update.id.clone();
        self.store
            .with_existing_tasks(session_id, |tasks| {
                let task = tasks
                    .iter_mut()
                    .find(|t| t.id == update.id)
                    .ok_or_else(|| VulnAgentError::TaskNotFound(update.id.clone()))?;

                if let Some(next) = update.status {
                    if !task.status.can_transition_to(next) {
                        return Err(VulnAgentError::InvalidTransition(format!(
                            "{}: {} -> {}",
                            task.id, task.status, next
                        )));
                    }
                }

                if let Some(kind) = update.kind {
                    task.kind = kind;
                }
                if let Some(target) = update.target {
                    task.target = target;
                }
                if let Some(priority) = update.priority {
                    task.priority = priority;
                }
                if let Some(status) = update.status {
                    task.status = status;
                }
                if let Some(metadata) = update.metadata {
                    task.metadata.get_or_insert_with(Default::default).extend(metadata);
                }
                Ok(task.clone())
            })
            .unwrap_or(Err(VulnAgentError::TaskNotFound(id)))
    }

    pub fn get(&self, session_id: &str, filter: &TaskFilter) -> TaskListing {
        let all = self.store.tasks(session_id);
        let stats = TaskStats::from_tasks(&all);
        let tasks = all.into_iter().filter(|t| filter.matches(t)).collect();
        TaskListing { tasks, stats }
    }

    /// Mark a task completed. Returns it with the number of tasks still pending.
    pub fn complete(&self, session_id: &str, task_id: &str) -> Result<(ScanTask, usize), VulnAgentError> {
        let task = self.update(
            session_id,
            TaskUpdate {
                id: task_id.to_string(),
                status: Some(TaskStatus::Completed),
                ..TaskUpdate::default()
            },
        )?;
        let remaining = self.store.pending_task_count(session_id);
        info!(session_id, task_id, remaining, "Task completed");
        Ok((task, remaining))
    }

    /// Ask the oracle to reorder pending tasks, apply its priorities and
    /// sort the queue ascending by priority.
    pub async fn prioritize(
        &self,
        session_id: &str,
        context: Option<PrioritizationContext>,
    ) -> Result<PrioritizationOutcome, VulnAgentError> {
        let context = context.ok_or_else(|| {
            VulnAgentError::InvalidInput("Context required for prioritization".into())
        })?;

        let mut pending: Vec<ScanTask> = self.store.tasks(session_id).into_iter().filter(ScanTask::is_pending).collect();
        pending.sort_by_key(|t| t.priority);
        if pending.is_empty() {
            return Ok(PrioritizationOutcome { tasks: pending, changes: Vec::new() });
        }

        let prompt = prioritization_prompt(&pending, &context);
        let ranked: PrioritizedTasks =
            llm::generate(self.llm.as_ref(), &prompt, &prioritization_schema(), None).await?;

        let mut changes = Vec::new();
        for entry in ranked.prioritized_tasks {
            // Indexes are 1-based positions in the list shown to the oracle.
            let Some(task) = entry.task_index.checked_sub(1).and_then(|i| pending.get(i)) else {
                debug!(session_id, task_index = entry.task_index, "Ignoring out-of-range task index");
                continue;
            };
            changes.push(PriorityChange {
                task_id: task.id.clone(),
                old_priority: task.priority,
                new_priority: entry.new_priority,
                reasoning: entry.reasoning,
            });
        }

        let tasks = self
            .store
            .with_existing_tasks(session_id, |tasks| {
                for change in &changes {
                    if let Some(task) = tasks.iter_mut().find(|t| t.id == change.task_id && t.is_pending()) {
                        task.priority = change.new_priority;
                    }
                }
                tasks.sort_by_key(|t| t.priority);
                tasks.iter().filter(|t| t.is_pending()).cloned().collect::<Vec<_>>()
            })
            .unwrap_or_default();

        info!(session_id, changed = changes.len(), "Task queue reprioritized");
        Ok(PrioritizationOutcome { tasks, changes })
    }
}

fn prioritization_prompt(pending: &[ScanTask], context: &PrioritizationContext) -> String {
    let listing: Vec<String> = pending
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. [{}] {} (priority {})", i + 1, t.kind, t.target, t.priority))
        .collect();

    format!(
        "Prioritize these security testing tasks for the current scan.\n\n\
         Current findings: {}\nCompleted tasks: {}\nRemaining steps: {}\n\n\
         Pending tasks:\n{}\n\n\
         Assign a new priority (lower runs sooner) to each task that should move, \
         referring to tasks by their number. Favor high-risk areas such as \
         authentication, input handling and APIs, and tasks likely to expand coverage.",
        context.current_findings,
        context.completed_tasks,
        context.remaining_steps,
        listing.join("\n")
    )
}
