use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::analysis;
use super::params::{
    AnalyzeResponseParams, ExtractLinksParams, ManageTasksParams, TestPayloadParams, ToolCall, ToolKind,
    UpdateStrategyParams,
};
use crate::errors::VulnAgentError;
use crate::findings::FindingRecorder;
use crate::llm::LLMProvider;
use crate::models::{NewFinding, ProbeRequest, ProbeResponse};
use crate::protocol::{TestContext, VulnerabilityDetector};
use crate::session::SessionStore;
use crate::strategy::{StrategyAdapter, StrategySnapshot};
use crate::tasks::TaskManager;
use crate::transport::Transport;
use crate::utils::truncation::truncate_chars;

const PROBE_BODY_CHARS: usize = 10_000;
const MAX_TEST_ATTEMPTS: u32 = 10;

/// Per-call context injected by the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext<'a> {
    pub session_id: &'a str,
    pub completed_steps: u32,
    pub remaining_steps: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub tool: String,
    pub success: bool,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    fn ok(tool: &str, data: Value) -> Self {
        Self { tool: tool.to_string(), success: true, data, error: None }
    }

    fn failed(tool: &str, error: String) -> Self {
        Self { tool: tool.to_string(), success: false, data: Value::Null, error: Some(error) }
    }

    /// `{success: true, ...data}` or `{success: false, error}`.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("success".into(), Value::Bool(self.success));
        if let Some(error) = &self.error {
            out.insert("error".into(), Value::String(error.clone()));
        }
        if let Value::Object(data) = &self.data {
            for (k, v) in data {
                out.insert(k.clone(), v.clone());
            }
        }
        Value::Object(out)
    }
}

/// Runs tool calls against one shared store, oracle and transport.
pub struct ToolExecutor {
    store: Arc<SessionStore>,
    llm: Arc<dyn LLMProvider>,
    transport: Arc<dyn Transport>,
    tasks: TaskManager,
    findings: FindingRecorder,
    strategy: StrategyAdapter,
    detector: VulnerabilityDetector,
    default_max_attempts: u32,
}

impl ToolExecutor {
    pub fn new(store: Arc<SessionStore>, llm: Arc<dyn LLMProvider>, transport: Arc<dyn Transport>) -> Self {
        Self {
            tasks: TaskManager::new(store.clone(), llm.clone()),
            findings: FindingRecorder::new(store.clone()),
            strategy: StrategyAdapter::new(store.clone(), llm.clone()),
            detector: VulnerabilityDetector::new(llm.clone(), transport.clone()),
            store,
            llm,
            transport,
            default_max_attempts: 3,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.default_max_attempts = max_attempts.clamp(1, MAX_TEST_ATTEMPTS);
        self
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    pub fn findings(&self) -> &FindingRecorder {
        &self.findings
    }

    pub fn strategy(&self) -> &StrategyAdapter {
        &self.strategy
    }

    /// Decode and run a raw oracle invocation. Undecodable calls become
    /// failed results.
    pub async fn invoke(&self, ctx: &ToolContext<'_>, tool: &str, arguments: Value) -> Result<ToolResult, VulnAgentError> {
        match ToolCall::from_invocation(tool, arguments) {
            Ok(call) => self.execute(ctx, call).await,
            Err(e) => {
                warn!(session_id = ctx.session_id, tool, error = %e, "Rejected tool invocation");
                Ok(ToolResult::failed(tool, e.to_string()))
            }
        }
    }

    /// Run one tool. Only credential failures escape as errors.
    pub async fn execute(&self, ctx: &ToolContext<'_>, call: ToolCall) -> Result<ToolResult, VulnAgentError> {
        let kind = call.kind();
        debug!(session_id = ctx.session_id, tool = %kind, "Executing tool");

        let outcome = match call {
            ToolCall::Probe(request) => self.probe(ctx, request).await,
            ToolCall::AnalyzeResponse(params) => self.analyze_response(ctx, params).await,
            ToolCall::ExtractLinks(params) => self.extract_links(ctx, params).await,
            ToolCall::TestPayload(params) => self.test_payload(ctx, params).await,
            ToolCall::ReportFinding(finding) => self.report_finding(ctx, finding),
            ToolCall::ManageTasks(params) => self.manage_tasks(ctx, params).await,
            ToolCall::UpdateStrategy(params) => self.update_strategy(ctx, params).await,
        };

        match outcome {
            Ok(data) => Ok(ToolResult::ok(kind.name(), data)),
            Err(e) if e.is_credential_failure() => Err(e),
            Err(e) => {
                warn!(session_id = ctx.session_id, tool = %kind, error = %e, "Tool failed");
                Ok(ToolResult::failed(kind.name(), e.to_string()))
            }
        }
    }

    fn refuse_skipped(&self, session_id: &str, url: &str) -> Result<(), VulnAgentError> {
        let strategy = self.strategy.current(session_id);
        match strategy.skip_match(url) {
            Some(pattern) => Err(VulnAgentError::InvalidInput(format!(
                "URL matches skip pattern '{}': {}",
                pattern, url
            ))),
            None => Ok(()),
        }
    }

    /// Send through the transport, then record the URL and cache the response.
    async fn fetch(&self, session_id: &str, request: &ProbeRequest) -> Result<ProbeResponse, VulnAgentError> {
        let response = self.transport.send(request).await?;
        self.store.observe(session_id, |o| {
            o.record_tested(&request.url);
            o.cache_response(&request.url, response.clone());
        });
        Ok(response)
    }

    fn cached_or_error(&self, session_id: &str, url: &str) -> Result<ProbeResponse, VulnAgentError> {
        self.store
            .observations(session_id)
            .response_for(url)
            .cloned()
            .ok_or_else(|| VulnAgentError::InvalidInput(format!("No response available for {}; probe it first", url)))
    }

    async fn probe(&self, ctx: &ToolContext<'_>, request: ProbeRequest) -> Result<Value, VulnAgentError> {
        self.refuse_skipped(ctx.session_id, &request.url)?;

        let started = Instant::now();
        let response = self.fetch(ctx.session_id, &request).await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        Ok(json!({
            "status": response.status,
            "headers": response.headers,
            "body": truncate_chars(&response.body, PROBE_BODY_CHARS),
            "url": response.url,
            "elapsed_ms": elapsed_ms,
        }))
    }

    async fn analyze_response(&self, ctx: &ToolContext<'_>, params: AnalyzeResponseParams) -> Result<Value, VulnAgentError> {
        let response = match (params.response, params.url.as_deref()) {
            (Some(mut response), url) => {
                if response.url.is_empty() {
                    response.url = url.unwrap_or_default().to_string();
                }
                response
            }
            (None, Some(url)) => self.cached_or_error(ctx.session_id, url)?,
            (None, None) => {
                return Err(VulnAgentError::InvalidInput("Either url or response is required".into()));
            }
        };

        let result = analysis::analyze_response(self.llm.as_ref(), &response, &params.focus).await?;
        Ok(serde_json::to_value(result)?)
    }

    async fn extract_links(&self, ctx: &ToolContext<'_>, params: ExtractLinksParams) -> Result<Value, VulnAgentError> {
        let content = match params.content {
            Some(content) => content,
            None => self.cached_or_error(ctx.session_id, &params.base_url)?.body,
        };

        let extraction = analysis::extract_links(self.llm.as_ref(), &params.base_url, &content).await?;
        let endpoints = extraction.internal_endpoints(&params.base_url);
        self.store.observe(ctx.session_id, |o| {
            for endpoint in &endpoints {
                o.record_discovered(endpoint);
            }
            for tech in &extraction.technologies {
                o.record_technology(tech);
            }
        });

        let stats = extraction.stats();
        info!(
            session_id = ctx.session_id,
            links = stats.total_links,
            internal = stats.internal_links,
            forms = stats.forms,
            "Links extracted"
        );

        let mut data = serde_json::to_value(&extraction)?;
        data["stats"] = serde_json::to_value(stats)?;
        Ok(data)
    }

    async fn test_payload(&self, ctx: &ToolContext<'_>, params: TestPayloadParams) -> Result<Value, VulnAgentError> {
        self.refuse_skipped(ctx.session_id, &params.url)?;

        let method = params.method.unwrap_or_default();
        let cached = self.store.observations(ctx.session_id).response_for(&params.url).cloned();
        let baseline = match cached {
            Some(response) => response,
            None => {
                let mut request = ProbeRequest::get(params.url.clone());
                request.method = method;
                self.fetch(ctx.session_id, &request).await?
            }
        };

        let test_ctx = TestContext::new(params.url.clone(), method, params.parameter.clone(), params.location, baseline);
        let max_attempts = params
            .max_attempts
            .unwrap_or(self.default_max_attempts)
            .clamp(1, MAX_TEST_ATTEMPTS);
        let outcome = self.detector.detect(&test_ctx, params.vulnerability_type, max_attempts).await?;

        self.store.observe(ctx.session_id, |o| {
            o.record_tested(&params.url);
            for payload in outcome.blocked_payloads() {
                o.record_blocked(payload);
            }
        });

        let attempts: Vec<Value> = outcome
            .attempts
            .iter()
            .map(|a| json!({ "payload": a.payload, "outcome": a.outcome, "status": a.response.status }))
            .collect();

        let mut data = json!({
            "vulnerable": outcome.is_vulnerable(),
            "parameter": params.parameter,
            "location": params.location,
            "vulnerability_type": params.vulnerability_type,
            "attempts": attempts,
        });
        if let Some(analysis) = outcome.confirmed.as_ref().or(outcome.last_analysis.as_ref()) {
            data["analysis"] = serde_json::to_value(analysis)?;
        }
        Ok(data)
    }

    fn report_finding(&self, ctx: &ToolContext<'_>, finding: NewFinding) -> Result<Value, VulnAgentError> {
        let report = self.findings.report(ctx.session_id, finding)?;
        Ok(json!({
            "finding_id": report.finding.id,
            "message": report.message,
            "summary": report.summary,
        }))
    }

    async fn manage_tasks(&self, ctx: &ToolContext<'_>, params: ManageTasksParams) -> Result<Value, VulnAgentError> {
        let session_id = ctx.session_id;
        let data = match params {
            ManageTasksParams::Add { task } => json!({ "task": self.tasks.add(session_id, task)? }),
            ManageTasksParams::Update { task } => json!({ "task": self.tasks.update(session_id, task)? }),
            ManageTasksParams::Get { filter } => serde_json::to_value(self.tasks.get(session_id, &filter))?,
            ManageTasksParams::Prioritize { context } => {
                serde_json::to_value(self.tasks.prioritize(session_id, context).await?)?
            }
            ManageTasksParams::Complete { task_id } => {
                let (task, remaining) = self.tasks.complete(session_id, &task_id)?;
                json!({ "task": task, "remaining_pending": remaining })
            }
        };
        Ok(data)
    }

    async fn update_strategy(&self, ctx: &ToolContext<'_>, params: UpdateStrategyParams) -> Result<Value, VulnAgentError> {
        self.store.observe(ctx.session_id, |o| {
            for payload in &params.blocked_payloads {
                o.record_blocked(payload);
            }
            for tech in &params.technologies {
                o.record_technology(tech);
            }
        });

        let snapshot = StrategySnapshot::from_store(&self.store, ctx.session_id, ctx.completed_steps, ctx.remaining_steps);
        let update = self.strategy.update(ctx.session_id, &snapshot).await?;
        Ok(json!({
            "strategy": update.strategy,
            "reasoning": update.reasoning,
            "tactics": update.tactics,
            "adjustments": update.adjustments,
            "significant_change": update.significant_change,
        }))
    }
}
