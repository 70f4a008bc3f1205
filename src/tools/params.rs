use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::VulnAgentError;
use crate::models::{HttpMethod, NewFinding, NewTask, ProbeRequest, ProbeResponse, TaskFilter, TaskUpdate};
use crate::protocol::{ParameterLocation, VulnerabilityTestClass};
use crate::tasks::PrioritizationContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Probe,
    AnalyzeResponse,
    ExtractLinks,
    TestPayload,
    ReportFinding,
    ManageTasks,
    UpdateStrategy,
}

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        ToolKind::Probe,
        ToolKind::AnalyzeResponse,
        ToolKind::ExtractLinks,
        ToolKind::TestPayload,
        ToolKind::ReportFinding,
        ToolKind::ManageTasks,
        ToolKind::UpdateStrategy,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Probe => "probe",
            ToolKind::AnalyzeResponse => "analyze_response",
            ToolKind::ExtractLinks => "extract_links",
            ToolKind::TestPayload => "test_payload",
            ToolKind::ReportFinding => "report_finding",
            ToolKind::ManageTasks => "manage_tasks",
            ToolKind::UpdateStrategy => "update_strategy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeResponseParams {
    #[serde(default)]
    pub url: Option<String>,
    /// Falls back to the cached response for `url` when absent.
    #[serde(default)]
    pub response: Option<ProbeResponse>,
    #[serde(default)]
    pub focus: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractLinksParams {
    pub base_url: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPayloadParams {
    pub url: String,
    pub parameter: String,
    pub location: ParameterLocation,
    pub vulnerability_type: VulnerabilityTestClass,
    #[serde(default)]
    pub method: Option<HttpMethod>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManageTasksParams {
    Add { task: NewTask },
    Update { task: TaskUpdate },
    Get {
        #[serde(default)]
        filter: TaskFilter,
    },
    Prioritize {
        #[serde(default)]
        context: Option<PrioritizationContext>,
    },
    Complete { task_id: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStrategyParams {
    #[serde(default)]
    pub blocked_payloads: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
}

/// One decoded tool invocation. The session id is never part of the arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    Probe(ProbeRequest),
    AnalyzeResponse(AnalyzeResponseParams),
    ExtractLinks(ExtractLinksParams),
    TestPayload(TestPayloadParams),
    ReportFinding(NewFinding),
    ManageTasks(ManageTasksParams),
    UpdateStrategy(UpdateStrategyParams),
}

impl ToolCall {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolCall::Probe(_) => ToolKind::Probe,
            ToolCall::AnalyzeResponse(_) => ToolKind::AnalyzeResponse,
            ToolCall::ExtractLinks(_) => ToolKind::ExtractLinks,
            ToolCall::TestPayload(_) => ToolKind::TestPayload,
            ToolCall::ReportFinding(_) => ToolKind::ReportFinding,
            ToolCall::ManageTasks(_) => ToolKind::ManageTasks,
            ToolCall::UpdateStrategy(_) => ToolKind::UpdateStrategy,
        }
    }

    /// Decode an oracle invocation by tool name and raw arguments.
    pub fn from_invocation(tool: &str, arguments: Value) -> Result<Self, VulnAgentError> {
        if ToolKind::from_name(tool).is_none() {
            return Err(VulnAgentError::InvalidInput(format!("Unknown tool: {}", tool)));
        }
        let arguments = if arguments.is_null() { json!({}) } else { arguments };
        serde_json::from_value(json!({ "tool": tool, "arguments": arguments }))
            .map_err(|e| VulnAgentError::InvalidInput(format!("Invalid arguments for {}: {}", tool, e)))
    }
}
