mod common;

use std::sync::Arc;

use vulnagent::models::{HttpMethod, ProbeRequest, Severity};
use vulnagent::protocol::{AttemptOutcome, ParameterLocation, TestContext, VulnerabilityDetector, VulnerabilityTestClass};
use vulnagent::transport::Transport;

use common::{fast_transport, spawn_fixture, ScriptedOracle};

async fn context(base: &str, path: &str, parameter: &str, transport: &dyn Transport) -> TestContext {
    let url = format!("{}{}", base, path);
    let baseline = transport.send(&ProbeRequest::get(url.clone())).await.unwrap();
    TestContext::new(url, HttpMethod::Get, parameter, ParameterLocation::Query, baseline)
}

#[tokio::test]
async fn test_reflected_xss_confirmed() {
    let base = spawn_fixture().await;
    let transport = Arc::new(fast_transport(&[]));
    let oracle = ScriptedOracle::new(vec![]);
    let detector = VulnerabilityDetector::new(oracle.clone(), transport.clone());

    let ctx = context(&base, "/search?q=hello", "q", transport.as_ref()).await;
    let outcome = detector.detect(&ctx, VulnerabilityTestClass::Xss, 3).await.unwrap();

    assert!(outcome.is_vulnerable());
    assert_eq!(outcome.attempts.len(), 1);
    assert_eq!(outcome.attempts[0].outcome, AttemptOutcome::Reflected);
    assert!(outcome.attempts[0].response.body.contains("<script>alert(1)</script>"));

    let verdict = outcome.confirmed.unwrap();
    assert_eq!(verdict.severity, Severity::High);
    assert!(verdict.confidence > 0.8);
}

#[tokio::test]
async fn test_sql_error_exposed() {
    let base = spawn_fixture().await;
    let transport = Arc::new(fast_transport(&[]));
    let detector = VulnerabilityDetector::new(ScriptedOracle::new(vec![]), transport.clone());

    let ctx = context(&base, "/product?id=1", "id", transport.as_ref()).await;
    let outcome = detector.detect(&ctx, VulnerabilityTestClass::Sqli, 2).await.unwrap();

    assert!(outcome.is_vulnerable());
    assert_eq!(outcome.attempts[0].outcome, AttemptOutcome::SqlErrorExposed);
    assert_eq!(outcome.attempts[0].response.status, 500);
}

#[tokio::test]
async fn test_non_reflecting_parameter_stops_without_suggestion() {
    let base = spawn_fixture().await;
    let transport = Arc::new(fast_transport(&[]));
    let detector = VulnerabilityDetector::new(ScriptedOracle::new(vec![]), transport.clone());

    // The index page ignores its query string.
    let ctx = context(&base, "/?q=hello", "q", transport.as_ref()).await;
    let outcome = detector.detect(&ctx, VulnerabilityTestClass::Xss, 2).await.unwrap();

    assert!(!outcome.is_vulnerable());
    assert_eq!(outcome.attempts.len(), 1);
    assert_eq!(outcome.attempts[0].outcome, AttemptOutcome::NoChange);
    assert!(outcome.last_analysis.is_some());
}
