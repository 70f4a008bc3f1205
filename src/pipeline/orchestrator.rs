use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::context::StepContext;
use super::events::ScanEvent;
use super::state::{ScanConfig, ScanState};
use crate::errors::{with_retry, VulnAgentError};
use crate::llm::{LLMProvider, StepEvent, ToolDefinition};
use crate::models::{FailureKind, NewTask, ScanResult, TaskKind};
use crate::prompts::{PromptLoader, PromptVariables, SYSTEM_PROMPT};
use crate::session::{ScanSession, SessionStore};
use crate::strategy::StrategySnapshot;
use crate::tools::{tool_definitions, ToolContext, ToolExecutor, ToolKind, ToolResult};
use crate::transport::Transport;

/// Counters kept across steps of one run.
#[derive(Debug, Default)]
struct RunTally {
    tools_used: BTreeSet<String>,
    strategy_updates: u32,
    previous_results: Vec<ToolResult>,
}

/// Drives one scan: seed the queue, ask the oracle, run its tools, repeat.
pub struct ScanOrchestrator {
    store: Arc<SessionStore>,
    llm: Arc<dyn LLMProvider>,
    executor: ToolExecutor,
    config: ScanConfig,
    tools: Vec<ToolDefinition>,
    cancel_token: CancellationToken,
    event_tx: Option<mpsc::UnboundedSender<ScanEvent>>,
}

impl ScanOrchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        llm: Arc<dyn LLMProvider>,
        transport: Arc<dyn Transport>,
        config: ScanConfig,
    ) -> Self {
        let executor = ToolExecutor::new(store.clone(), llm.clone(), transport).with_max_attempts(config.max_attempts);
        Self {
            store,
            llm,
            executor,
            config,
            tools: tool_definitions(),
            cancel_token: CancellationToken::new(),
            event_tx: None,
        }
    }

    /// Replace the internal cancel token with an external one (e.g. a Ctrl-C handler).
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Attach an event channel for streaming scan events to a display.
    pub fn with_event_channel(mut self, tx: mpsc::UnboundedSender<ScanEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Run a scan against `target_url`. Always returns a result; failures are
    /// reported in `state` and `error` alongside whatever was found.
    pub async fn run(&self, target_url: &str) -> ScanResult {
        let started = Instant::now();
        let mut session = ScanSession::new(target_url, self.config.max_steps);
        let mut tally = RunTally::default();

        info!(
            session_id = %session.id,
            target = %target_url,
            max_steps = session.max_steps,
            provider = self.llm.provider_name(),
            model = self.llm.model_name(),
            "Scan started"
        );
        self.emit(ScanEvent::ScanStarted {
            session_id: session.id.clone(),
            target: target_url.to_string(),
            max_steps: session.max_steps,
        });

        let outcome = self.execute(&mut session, &mut tally).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (error, failure) = match outcome {
            Ok(()) => {
                session.state = ScanState::Completed;
                (None, None)
            }
            Err(e) => {
                session.state = ScanState::Failed;
                (Some(failure_message(&e)), Some(FailureKind::of(&e)))
            }
        };

        let findings = self.store.findings(&session.id);
        match &error {
            None => {
                info!(
                    session_id = %session.id,
                    steps = session.current_step,
                    findings = findings.len(),
                    duration_ms,
                    "Scan completed"
                );
                self.emit(ScanEvent::ScanCompleted {
                    steps: session.current_step,
                    total_findings: findings.len(),
                    duration_ms,
                });
            }
            Some(message) => {
                error!(session_id = %session.id, steps = session.current_step, error = %message, "Scan failed");
                self.emit(ScanEvent::ScanFailed { error: message.clone() });
            }
        }

        ScanResult {
            session_id: session.id.clone(),
            target_url: session.target_url.clone(),
            findings,
            steps_executed: session.current_step,
            duration_ms,
            error,
            failure,
            tools_used: tally.tools_used.into_iter().collect(),
            strategy: self.store.strategy(&session.id),
            strategy_updates: tally.strategy_updates,
            state: session.state,
            completed: session.state == ScanState::Completed,
        }
    }

    async fn execute(&self, session: &mut ScanSession, tally: &mut RunTally) -> Result<(), VulnAgentError> {
        let system_prompt = self.system_prompt(session)?;
        self.seed(session)?;
        session.state = ScanState::Scanning;

        while session.current_step < session.max_steps {
            if self.cancel_token.is_cancelled() {
                return Err(VulnAgentError::Cancelled("Scan cancelled".into()));
            }

            let step = session.current_step + 1;
            self.emit(ScanEvent::StepStarted { step, max_steps: session.max_steps });
            debug!(session_id = %session.id, step, "Step started");

            let prompt = StepContext::gather(&self.store, session, &tally.previous_results).render();
            let decision = with_retry("oracle_decision", &self.config.oracle_retry, || {
                self.llm.decide(&system_prompt, &prompt, &self.tools)
            })
            .await;

            match decision {
                Ok(events) => {
                    let results = self.run_decision(session, events, tally).await?;
                    tally.previous_results = results;
                }
                Err(e) if e.is_credential_failure() => return Err(e),
                Err(e) => {
                    warn!(session_id = %session.id, step, error = %e, "Oracle decision failed, continuing");
                    self.emit(ScanEvent::StepFailed { step, error: e.to_string() });
                    tally.previous_results.clear();
                }
            }

            session.current_step = step;

            let interval = self.config.strategy_interval;
            if interval > 0 && step % interval == 0 && step < session.max_steps {
                self.periodic_strategy_update(session, tally).await?;
            }

            let pending = self.store.pending_task_count(&session.id);
            if step >= self.config.min_steps && pending == 0 {
                info!(session_id = %session.id, step, "No pending tasks remain, finishing early");
                break;
            }
        }

        Ok(())
    }

    fn system_prompt(&self, session: &ScanSession) -> Result<String, VulnAgentError> {
        let vars = PromptVariables {
            target_url: session.target_url.clone(),
            session_id: session.id.clone(),
            max_steps: session.max_steps,
        };
        match &self.config.system_prompt_file {
            Some(path) => {
                let loader = PromptLoader::for_file(path);
                let template = loader.load_file(path)?;
                Ok(loader.interpolate(&template, &vars))
            }
            None => Ok(PromptLoader::new(Default::default()).interpolate(SYSTEM_PROMPT, &vars)),
        }
    }

    /// One reconnaissance task for the target.
    fn seed(&self, session: &ScanSession) -> Result<(), VulnAgentError> {
        let mut metadata = Map::new();
        metadata.insert("description".into(), json!("Initial reconnaissance of target"));

        let task = NewTask {
            priority: Some(0),
            metadata: Some(metadata),
            ..NewTask::new(TaskKind::ProbeEndpoint, session.target_url.clone())
        };
        self.executor.tasks().add(&session.id, task)?;
        Ok(())
    }

    /// Run every tool invocation of one oracle decision, in order.
    async fn run_decision(
        &self,
        session: &ScanSession,
        events: Vec<StepEvent>,
        tally: &mut RunTally,
    ) -> Result<Vec<ToolResult>, VulnAgentError> {
        let ctx = ToolContext {
            session_id: &session.id,
            completed_steps: session.current_step,
            remaining_steps: session.remaining_steps(),
        };

        let mut results = Vec::new();
        for event in events {
            match event {
                StepEvent::Reasoning { text } => {
                    debug!(session_id = %session.id, "Oracle reasoning: {}", text);
                    self.emit(ScanEvent::Reasoning { text });
                }
                StepEvent::ToolInvocation { tool, arguments } => {
                    self.emit(ScanEvent::ToolStarted { tool: tool.clone() });
                    let result = self.executor.invoke(&ctx, &tool, arguments).await?;

                    if let Some(kind) = ToolKind::from_name(&tool) {
                        tally.tools_used.insert(kind.name().to_string());
                        if result.success {
                            self.note_success(&session.id, kind, &result.data, tally);
                        }
                    }
                    self.emit(ScanEvent::ToolCompleted {
                        tool: tool.clone(),
                        success: result.success,
                        error: result.error.clone(),
                    });
                    results.push(result);
                }
            }
        }
        Ok(results)
    }

    fn note_success(&self, session_id: &str, kind: ToolKind, data: &Value, tally: &mut RunTally) {
        match kind {
            ToolKind::UpdateStrategy => {
                tally.strategy_updates += 1;
                self.emit(ScanEvent::StrategyUpdated {
                    focus_areas: string_list(&data["strategy"]["focus_areas"]),
                    significant_change: data["significant_change"].as_bool().unwrap_or(false),
                });
            }
            ToolKind::ReportFinding => {
                let Some(id) = data["finding_id"].as_str() else { return };
                let findings = self.store.findings(session_id);
                if let Some(finding) = findings.into_iter().rev().find(|f| f.id == id) {
                    self.emit(ScanEvent::FindingReported {
                        class: finding.class,
                        severity: finding.severity,
                        url: finding.url,
                    });
                }
            }
            _ => {}
        }
    }

    async fn periodic_strategy_update(&self, session: &ScanSession, tally: &mut RunTally) -> Result<(), VulnAgentError> {
        let snapshot = StrategySnapshot::from_store(
            &self.store,
            &session.id,
            session.current_step,
            session.remaining_steps(),
        );
        match self.executor.strategy().update(&session.id, &snapshot).await {
            Ok(update) => {
                tally.strategy_updates += 1;
                self.emit(ScanEvent::StrategyUpdated {
                    focus_areas: update.strategy.focus_areas,
                    significant_change: update.significant_change,
                });
                Ok(())
            }
            Err(e) if e.is_credential_failure() => Err(e),
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Periodic strategy update failed");
                Ok(())
            }
        }
    }
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn failure_message(e: &VulnAgentError) -> String {
    match e {
        VulnAgentError::Cancelled(message) => message.clone(),
        e if e.is_credential_failure() => e.credential_hint(),
        e => e.to_string(),
    }
}
