mod common;

use vulnagent::errors::VulnAgentError;
use vulnagent::models::ProbeRequest;
use vulnagent::transport::Transport;

use common::{fast_transport, spawn_fixture};

#[tokio::test]
async fn test_loopback_reachable_with_empty_whitelist() {
    let base = spawn_fixture().await;
    let transport = fast_transport(&[]);

    let response = transport
        .send(&ProbeRequest::get(format!("{}/search?q=hello", base)))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert!(response.body.contains("You searched for: hello"));
    assert!(response.header("Content-Type").unwrap_or_default().starts_with("text/html"));

    let stats = transport.stats();
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.succeeded, 1);
}

#[tokio::test]
async fn test_non_whitelisted_host_never_contacted() {
    let transport = fast_transport(&["example.com"]);

    let err = transport
        .send(&ProbeRequest::get("http://notallowed.com/"))
        .await
        .unwrap_err();
    assert!(matches!(err, VulnAgentError::NotWhitelisted(_)));
    assert!(err.to_string().contains("notallowed.com"));

    let stats = transport.stats();
    assert_eq!(stats.attempts, 0);
    assert_eq!(stats.rejected, 1);
}

#[tokio::test]
async fn test_server_errors_are_returned_not_retried() {
    let base = spawn_fixture().await;
    let transport = fast_transport(&[]);

    let response = transport
        .send(&ProbeRequest::get(format!("{}/product?id=1'", base)))
        .await
        .unwrap();
    assert_eq!(response.status, 500);
    assert!(response.body.contains("SQL syntax"));
    assert_eq!(transport.stats().attempts, 1);
}

#[tokio::test]
async fn test_slow_endpoint_times_out_after_retries() {
    let base = spawn_fixture().await;
    let transport = fast_transport(&[]);

    let err = transport
        .send(&ProbeRequest::get(format!("{}/slow", base)))
        .await
        .unwrap_err();
    assert!(matches!(err, VulnAgentError::Timeout(_)), "unexpected error: {err}");
    // First attempt plus one retry.
    assert_eq!(transport.stats().attempts, 2);
}
