#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use regex::Regex;
use serde_json::{json, Value};

use vulnagent::errors::VulnAgentError;
use vulnagent::llm::{LLMProvider, LLMResponse, StepEvent, ToolDefinition};
use vulnagent::transport::{GuardedTransport, RateLimitConfig, TransportConfig};

type Params = Query<HashMap<String, String>>;

async fn index() -> Html<&'static str> {
    Html(r#"<html><body><a href="/search?q=hello">Search</a><a href="/product?id=1">Product</a></body></html>"#)
}

async fn search(Query(params): Params) -> Html<String> {
    let q = params.get("q").cloned().unwrap_or_default();
    Html(format!("<html><body><p>You searched for: {}</p></body></html>", q))
}

async fn product(Query(params): Params) -> impl IntoResponse {
    let id = params.get("id").cloned().unwrap_or_default();
    if id.contains('\'') {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!(
                "You have an error in your SQL syntax near '{}' at line 1",
                id
            )),
        );
    }
    (StatusCode::OK, Html(format!("<html><body>Product {}</body></html>", id)))
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(2)).await;
    "finally"
}

/// Start a deliberately vulnerable app on an ephemeral loopback port.
pub async fn spawn_fixture() -> String {
    let app = Router::new()
        .route("/", get(index))
        .route("/search", get(search))
        .route("/product", get(product))
        .route("/slow", get(slow));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn fast_transport(whitelist: &[&str]) -> GuardedTransport {
    GuardedTransport::new(TransportConfig {
        whitelist: whitelist.iter().map(|s| s.to_string()).collect(),
        rate_limit: RateLimitConfig { max_requests: 100, window_ms: 1000 },
        timeout: Duration::from_millis(300),
        retries: 1,
        backoff_base: Duration::from_millis(10),
        ..TransportConfig::default()
    })
    .unwrap()
}

/// One scripted oracle decision.
pub enum Turn {
    Events(Vec<StepEvent>),
    /// Complete every task id listed in the step prompt.
    CompleteListedTasks,
    Fail(String),
}

pub fn tool(name: &str, arguments: Value) -> StepEvent {
    StepEvent::ToolInvocation { tool: name.to_string(), arguments }
}

/// Deterministic oracle: decisions come from a script, structured requests
/// are answered by inspecting the schema's required keys.
pub struct ScriptedOracle {
    turns: Mutex<VecDeque<Turn>>,
    pub decisions: AtomicUsize,
    pub structured_calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new(turns: Vec<Turn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            decisions: AtomicUsize::new(0),
            structured_calls: AtomicUsize::new(0),
        })
    }

    fn payload_for(prompt: &str) -> &'static str {
        if prompt.contains("SQL Injection") {
            "1'"
        } else {
            "<script>alert(1)</script>"
        }
    }

    fn verdict(prompt: &str) -> Value {
        let payload = prompt
            .lines()
            .find_map(|l| l.strip_prefix("Payload: "))
            .unwrap_or_default();
        let body = prompt
            .split_once("Test response body:\n")
            .map(|(_, rest)| rest)
            .unwrap_or_default();

        let reflected = !payload.is_empty() && body.contains(payload);
        let sql_error = body.contains("SQL syntax");
        if reflected || sql_error {
            json!({
                "is_vulnerable": true,
                "confidence": 0.95,
                "evidence": [{"type": "reflection", "description": "payload appears unencoded in the response"}],
                "severity": "high",
                "remediation": "Encode output and use parameterized queries"
            })
        } else {
            json!({
                "is_vulnerable": false,
                "confidence": 0.2,
                "evidence": [],
                "severity": "low",
                "remediation": "None required"
            })
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedOracle {
    async fn complete(&self, _prompt: &str, _system: Option<&str>) -> Result<LLMResponse, VulnAgentError> {
        Ok(LLMResponse {
            content: String::new(),
            input_tokens: None,
            output_tokens: None,
            model: "scripted".into(),
        })
    }

    async fn complete_structured(
        &self,
        prompt: &str,
        schema: &Value,
        _system: Option<&str>,
    ) -> Result<Value, VulnAgentError> {
        self.structured_calls.fetch_add(1, Ordering::SeqCst);
        let required: Vec<&str> = schema["required"]
            .as_array()
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let value = if required.contains(&"payload") {
            json!({
                "payload": Self::payload_for(prompt),
                "reasoning": "probe for unencoded reflection",
                "technique": "basic",
                "confidence": 0.6
            })
        } else if required.contains(&"is_vulnerable") {
            Self::verdict(prompt)
        } else if required.contains(&"recommendations") {
            json!({
                "recommendations": {
                    "focus_areas": ["xss", "sqli"],
                    "skip_patterns": [],
                    "max_depth": 3,
                    "test_intensity": "normal",
                    "reasoning": "input reflection observed"
                },
                "tactics": [],
                "adjustments": []
            })
        } else if required.contains(&"prioritized_tasks") {
            json!({"prioritized_tasks": []})
        } else if required.contains(&"vulnerabilities") {
            json!({"vulnerabilities": [], "security_headers": {}, "suspicious_patterns": []})
        } else if required.contains(&"links") {
            json!({"links": [], "forms": [], "api_patterns": [], "technologies": []})
        } else {
            return Err(VulnAgentError::LLMApi(format!("unscripted schema: {:?}", required)));
        };
        Ok(value)
    }

    async fn decide(
        &self,
        _system: &str,
        prompt: &str,
        _tools: &[ToolDefinition],
    ) -> Result<Vec<StepEvent>, VulnAgentError> {
        self.decisions.fetch_add(1, Ordering::SeqCst);
        let turn = self.turns.lock().unwrap().pop_front();
        match turn {
            Some(Turn::Events(events)) => Ok(events),
            Some(Turn::CompleteListedTasks) => {
                let re = Regex::new(r"\[(task-[^\]]+)\]").unwrap();
                Ok(re
                    .captures_iter(prompt)
                    .map(|c| tool("manage_tasks", json!({"action": "complete", "task_id": &c[1]})))
                    .collect())
            }
            Some(Turn::Fail(message)) => Err(VulnAgentError::LLMApi(message)),
            None => Ok(Vec::new()),
        }
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-1"
    }
}
