mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use vulnagent::errors::RetryConfig;
use vulnagent::cli::exit;
use vulnagent::models::{FailureKind, ScanResult, Severity, VulnClass};
use vulnagent::pipeline::{ScanConfig, ScanEvent, ScanOrchestrator, ScanState};
use vulnagent::session::SessionStore;

use common::{fast_transport, spawn_fixture, tool, ScriptedOracle, Turn};

fn config(max_steps: u32, min_steps: u32) -> ScanConfig {
    ScanConfig {
        max_steps,
        min_steps,
        strategy_interval: 0,
        max_attempts: 2,
        oracle_retry: RetryConfig { max_retries: 1, base_delay: Duration::from_millis(5) },
        system_prompt_file: None,
    }
}

fn orchestrator(oracle: Arc<ScriptedOracle>, config: ScanConfig) -> ScanOrchestrator {
    ScanOrchestrator::new(Arc::new(SessionStore::new()), oracle, Arc::new(fast_transport(&[])), config)
}

async fn drain(mut rx: mpsc::UnboundedReceiver<ScanEvent>) -> Vec<ScanEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_single_step_scan_completes() {
    let base = spawn_fixture().await;
    let oracle = ScriptedOracle::new(vec![Turn::Events(vec![tool("probe", json!({"url": base}))])]);

    let result = orchestrator(oracle.clone(), config(1, 5)).run(&base).await;

    assert!(result.completed, "scan failed: {:?}", result.error);
    assert_eq!(result.state, ScanState::Completed);
    assert!(result.failure.is_none());
    assert_eq!(exit::for_result(&result), exit::SUCCESS);
    assert_eq!(result.steps_executed, 1);
    assert_eq!(result.tools_used, vec!["probe"]);
    assert!(result.session_id.starts_with("scan-"));
    assert!(result.error.is_none());
    assert_eq!(oracle.decisions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_early_exit_after_min_steps_with_empty_queue() {
    let base = spawn_fixture().await;
    let oracle = ScriptedOracle::new(vec![Turn::CompleteListedTasks, Turn::Events(vec![])]);

    let result = orchestrator(oracle.clone(), config(10, 2)).run(&base).await;

    assert!(result.completed);
    assert_eq!(result.steps_executed, 2);
    assert_eq!(result.tools_used, vec!["manage_tasks"]);
    assert_eq!(oracle.decisions.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_pending_tasks_keep_the_loop_running() {
    let base = spawn_fixture().await;
    let oracle = ScriptedOracle::new(vec![]);

    // The seeded reconnaissance task is never completed.
    let result = orchestrator(oracle.clone(), config(3, 1)).run(&base).await;

    assert!(result.completed);
    assert_eq!(result.steps_executed, 3);
    assert!(result.tools_used.is_empty());
}

#[tokio::test]
async fn test_credential_failure_aborts_with_hint() {
    let base = spawn_fixture().await;
    let oracle = ScriptedOracle::new(vec![Turn::Fail("401 Unauthorized: invalid x-api-key".into())]);
    let (tx, rx) = mpsc::unbounded_channel();

    let result = orchestrator(oracle.clone(), config(5, 1))
        .with_event_channel(tx)
        .run(&base)
        .await;

    assert!(!result.completed);
    assert_eq!(result.state, ScanState::Failed);
    assert_eq!(result.steps_executed, 0);
    let error = result.error.clone().unwrap();
    assert!(error.contains("Please check your API key"), "{error}");
    assert_eq!(result.failure, Some(FailureKind::Authentication));
    assert_eq!(exit::for_result(&result), exit::AUTH_ERROR);
    assert_eq!(oracle.decisions.load(Ordering::SeqCst), 1);

    let events = drain(rx).await;
    assert!(matches!(events.last(), Some(ScanEvent::ScanFailed { .. })));
}

#[tokio::test]
async fn test_transient_oracle_failure_skips_step() {
    let base = spawn_fixture().await;
    let oracle = ScriptedOracle::new(vec![
        Turn::Fail("upstream overloaded".into()),
        Turn::Fail("upstream overloaded".into()),
        Turn::Events(vec![tool("probe", json!({"url": base}))]),
    ]);
    let (tx, rx) = mpsc::unbounded_channel();

    let result = orchestrator(oracle.clone(), config(2, 5))
        .with_event_channel(tx)
        .run(&base)
        .await;

    // Step 1 fails twice (first try plus one retry), step 2 probes.
    assert!(result.completed);
    assert_eq!(result.steps_executed, 2);
    assert_eq!(result.tools_used, vec!["probe"]);
    let events = drain(rx).await;
    assert!(events.iter().any(|e| matches!(e, ScanEvent::StepFailed { step: 1, .. })));
}

#[tokio::test]
async fn test_findings_and_sorted_tools_used() {
    let base = spawn_fixture().await;
    let search = format!("{}/search?q=hello", base);
    let oracle = ScriptedOracle::new(vec![
        Turn::Events(vec![
            tool("probe", json!({"url": search})),
            tool(
                "test_payload",
                json!({"url": search, "parameter": "q", "location": "query", "vulnerability_type": "xss"}),
            ),
        ]),
        Turn::Events(vec![
            tool(
                "report_finding",
                json!({
                    "type": "XSS",
                    "severity": "high",
                    "url": search,
                    "parameter": "q",
                    "evidence": {
                        "request": {"method": "GET", "url": format!("{}/search?q=<script>alert(1)</script>", base)},
                        "response": {"status": 200, "body": "<p>You searched for: <script>alert(1)</script></p>"},
                        "payload": "<script>alert(1)</script>"
                    },
                    "description": "Search term is reflected without encoding",
                    "remediation": "HTML-encode the search term",
                    "confidence": 0.95
                }),
            ),
            tool("extract_links", json!({"base_url": base})),
        ]),
    ]);
    let (tx, rx) = mpsc::unbounded_channel();

    let result: ScanResult = orchestrator(oracle, config(2, 5))
        .with_event_channel(tx)
        .run(&base)
        .await;

    assert!(result.completed, "scan failed: {:?}", result.error);
    assert_eq!(result.tools_used, vec!["extract_links", "probe", "report_finding", "test_payload"]);
    assert_eq!(result.total_findings(), 1);
    assert_eq!(result.findings[0].class, VulnClass::Xss);
    assert_eq!(result.finding_counts().get(&Severity::High), Some(&1));

    let events = drain(rx).await;
    assert!(events.iter().any(|e| matches!(
        e,
        ScanEvent::FindingReported { class: VulnClass::Xss, severity: Severity::High, .. }
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, ScanEvent::ToolCompleted { tool, success: true, .. } if tool == "test_payload")));
}

#[tokio::test]
async fn test_unknown_tool_is_not_fatal() {
    let base = spawn_fixture().await;
    let oracle = ScriptedOracle::new(vec![Turn::Events(vec![tool("nmap", json!({"ports": "1-1000"}))])]);
    let (tx, rx) = mpsc::unbounded_channel();

    let result = orchestrator(oracle, config(1, 5)).with_event_channel(tx).run(&base).await;

    assert!(result.completed);
    assert!(result.tools_used.is_empty());
    let events = drain(rx).await;
    assert!(events.iter().any(|e| matches!(
        e,
        ScanEvent::ToolCompleted { success: false, error: Some(msg), .. } if msg.contains("Unknown tool: nmap")
    )));
}

#[tokio::test]
async fn test_periodic_strategy_update() {
    let base = spawn_fixture().await;
    let oracle = ScriptedOracle::new(vec![]);
    let mut cfg = config(2, 5);
    cfg.strategy_interval = 1;

    let result = orchestrator(oracle, cfg).run(&base).await;

    // Runs after step 1 only; the final step never triggers an update.
    assert_eq!(result.strategy_updates, 1);
    let strategy = result.strategy.unwrap();
    assert_eq!(strategy.focus_areas, vec!["xss", "sqli"]);
}

#[tokio::test]
async fn test_cancelled_before_first_step() {
    let base = spawn_fixture().await;
    let oracle = ScriptedOracle::new(vec![]);
    let token = CancellationToken::new();
    token.cancel();

    let result = orchestrator(oracle.clone(), config(5, 1))
        .with_cancel_token(token)
        .run(&base)
        .await;

    assert!(!result.completed);
    assert_eq!(result.state, ScanState::Failed);
    assert_eq!(result.error.as_deref(), Some("Scan cancelled"));
    assert_eq!(result.failure, Some(FailureKind::Cancelled));
    assert_eq!(exit::for_result(&result), exit::SCAN_FAILED);
    assert_eq!(result.steps_executed, 0);
    assert_eq!(oracle.decisions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_session_state_survives_until_cleared() {
    let base = spawn_fixture().await;
    let store = Arc::new(SessionStore::new());
    let orchestrator = ScanOrchestrator::new(
        store.clone(),
        ScriptedOracle::new(vec![]),
        Arc::new(fast_transport(&[])),
        config(1, 5),
    );

    let result = orchestrator.run(&base).await;
    assert_eq!(store.tasks(&result.session_id).len(), 1);

    assert!(store.clear_session(&result.session_id));
    assert!(store.tasks(&result.session_id).is_empty());
    assert!(!store.session_ids().contains(&result.session_id));
}
