use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::inject::inject_payload;
use super::tester::{
    payload_prompt, payload_schema, verdict_prompt, verdict_schema, AttemptOutcome, FilterDescriptor,
    GeneratedPayload, TestContext, VerdictAnalysis, VulnerabilityAttempt, VulnerabilityTestClass,
};
use crate::errors::VulnAgentError;
use crate::llm::{self, LLMProvider};
use crate::models::ProbeResponse;
use crate::transport::Transport;

/// Verdicts at or below this confidence never confirm a vulnerability.
pub const HIGH_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    /// Set only when a verdict was vulnerable above [`HIGH_CONFIDENCE`].
    pub confirmed: Option<VerdictAnalysis>,
    pub attempts: Vec<VulnerabilityAttempt>,
    pub last_analysis: Option<VerdictAnalysis>,
}

impl DetectionOutcome {
    pub fn is_vulnerable(&self) -> bool {
        self.confirmed.is_some()
    }

    pub fn blocked_payloads(&self) -> impl Iterator<Item = &str> {
        self.attempts
            .iter()
            .filter(|a| a.outcome == AttemptOutcome::Blocked)
            .map(|a| a.payload.as_str())
    }
}

/// Runs generate, inject, observe, analyze for one (parameter, class) pair.
pub struct VulnerabilityDetector {
    llm: Arc<dyn LLMProvider>,
    transport: Arc<dyn Transport>,
}

impl VulnerabilityDetector {
    pub fn new(llm: Arc<dyn LLMProvider>, transport: Arc<dyn Transport>) -> Self {
        Self { llm, transport }
    }

    pub async fn detect(
        &self,
        ctx: &TestContext,
        class: VulnerabilityTestClass,
        max_attempts: u32,
    ) -> Result<DetectionOutcome, VulnAgentError> {
        let max_attempts = max_attempts.max(1);
        let mut attempts: Vec<VulnerabilityAttempt> = Vec::new();
        let mut last_analysis: Option<VerdictAnalysis> = None;
        let mut suggestion: Option<String> = None;
        let mut filter: Option<FilterDescriptor> = None;

        for attempt in 1..=max_attempts {
            let prompt = payload_prompt(ctx, class, &attempts, suggestion.as_deref(), filter.as_ref());
            let generated: GeneratedPayload =
                llm::generate(self.llm.as_ref(), &prompt, &payload_schema(), None).await?;

            let delivered = match inject_payload(&ctx.request, &ctx.parameter, ctx.location, &generated.payload) {
                Ok(request) => self.transport.send(&request).await.map_err(|e| (e, request.url)),
                Err(e) => Err((e, ctx.request.url.clone())),
            };
            let response = match delivered {
                Ok(response) => response,
                // A payload the wire cannot carry (CR/LF in a header, say) counts as blocked.
                Err((VulnAgentError::InvalidInput(reason), url)) => {
                    debug!(attempt, parameter = %ctx.parameter, %reason, "Payload could not be delivered");
                    attempts.push(VulnerabilityAttempt {
                        payload: generated.payload,
                        technique: generated.technique,
                        outcome: AttemptOutcome::Blocked,
                        response: ProbeResponse {
                            status: 0,
                            headers: HashMap::new(),
                            body: String::new(),
                            url,
                        },
                    });
                    continue;
                }
                Err((e, _)) => return Err(e),
            };

            let prompt = verdict_prompt(ctx, class, &generated.payload, &response);
            let verdict: VerdictAnalysis =
                llm::generate(self.llm.as_ref(), &prompt, &verdict_schema(), None).await?;

            let outcome = AttemptOutcome::from_verdict(class, &verdict, &response);
            debug!(
                attempt,
                class = class.as_str(),
                parameter = %ctx.parameter,
                outcome = outcome.as_str(),
                confidence = verdict.confidence,
                "Payload attempt analyzed"
            );
            attempts.push(VulnerabilityAttempt {
                payload: generated.payload,
                technique: generated.technique,
                outcome,
                response,
            });

            if verdict.is_vulnerable && verdict.confidence > HIGH_CONFIDENCE {
                info!(
                    class = class.as_str(),
                    parameter = %ctx.parameter,
                    attempts = attempts.len(),
                    "Vulnerability confirmed"
                );
                return Ok(DetectionOutcome {
                    confirmed: Some(verdict.clone()),
                    attempts,
                    last_analysis: Some(verdict),
                });
            }

            let next = verdict.suggested_next_payload.clone().filter(|p| !p.trim().is_empty());
            filter = verdict.filter_detected.clone();
            last_analysis = Some(verdict);

            match next {
                Some(next) if filter.is_some() && attempt < max_attempts => {
                    debug!(attempt, "Filter detected, trying bypass");
                    suggestion = Some(next);
                }
                None => break,
                Some(next) => suggestion = Some(next),
            }
        }

        Ok(DetectionOutcome {
            confirmed: None,
            attempts,
            last_analysis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMResponse;
    use crate::models::{HttpMethod, ProbeRequest};
    use crate::protocol::ParameterLocation;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Returns payloads and verdicts in order, routed by schema.
    struct Scripted {
        verdicts: Mutex<Vec<Value>>,
        payloads: Mutex<Vec<String>>,
        payload_calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(verdicts: Vec<Value>) -> Arc<Self> {
            Self::with_payloads(Vec::new(), verdicts)
        }

        /// Hands out `payloads` first, then falls back to `p<n>`.
        fn with_payloads(payloads: Vec<&str>, verdicts: Vec<Value>) -> Arc<Self> {
            Arc::new(Self {
                verdicts: Mutex::new(verdicts),
                payloads: Mutex::new(payloads.into_iter().map(String::from).collect()),
                payload_calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        async fn complete(&self, _p: &str, _s: Option<&str>) -> Result<LLMResponse, VulnAgentError> {
            Err(VulnAgentError::Internal("unused".into()))
        }
        async fn complete_structured(&self, _p: &str, schema: &Value, _s: Option<&str>) -> Result<Value, VulnAgentError> {
            let required = schema["required"].as_array().cloned().unwrap_or_default();
            if required.contains(&json!("payload")) {
                let mut n = self.payload_calls.lock().unwrap();
                *n += 1;
                let mut queued = self.payloads.lock().unwrap();
                let payload = if queued.is_empty() { format!("p{}", n) } else { queued.remove(0) };
                return Ok(json!({"payload": payload, "reasoning": "", "technique": "t", "confidence": 0.5}));
            }
            Ok(self.verdicts.lock().unwrap().remove(0))
        }
        fn provider_name(&self) -> &str { "scripted" }
        fn model_name(&self) -> &str { "scripted" }
    }

    struct Echo {
        sent: Mutex<Vec<ProbeRequest>>,
    }

    #[async_trait]
    impl Transport for Echo {
        async fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse, VulnAgentError> {
            self.sent.lock().unwrap().push(request.clone());
            Ok(ProbeResponse { status: 200, headers: HashMap::new(), body: request.url.clone(), url: request.url.clone() })
        }
    }

    /// Refuses header values the way an HTTP stack does.
    struct StrictHeaders {
        sent: Mutex<Vec<ProbeRequest>>,
    }

    #[async_trait]
    impl Transport for StrictHeaders {
        async fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse, VulnAgentError> {
            if request.headers.values().any(|v| v.contains('\r') || v.contains('\n')) {
                return Err(VulnAgentError::InvalidInput("header value contains CR/LF".into()));
            }
            self.sent.lock().unwrap().push(request.clone());
            Ok(ProbeResponse { status: 200, headers: HashMap::new(), body: "ok".into(), url: request.url.clone() })
        }
    }

    fn verdict(vulnerable: bool, confidence: f64, next: Option<&str>, filter: bool) -> Value {
        let mut v = json!({
            "is_vulnerable": vulnerable,
            "confidence": confidence,
            "evidence": [],
            "severity": "high",
            "remediation": "encode output"
        });
        if let Some(next) = next {
            v["suggested_next_payload"] = json!(next);
        }
        if filter {
            v["filter_detected"] = json!({"type": "keyword", "bypass": "mixed case"});
        }
        v
    }

    fn ctx() -> TestContext {
        TestContext::new(
            "http://localhost/search?q=test",
            HttpMethod::Get,
            "q",
            ParameterLocation::Query,
            ProbeResponse { status: 200, headers: HashMap::new(), body: String::new(), url: String::new() },
        )
    }

    async fn run(verdicts: Vec<Value>, max: u32) -> (DetectionOutcome, usize) {
        let llm = Scripted::new(verdicts);
        let transport = Arc::new(Echo { sent: Mutex::new(Vec::new()) });
        let detector = VulnerabilityDetector::new(llm, transport.clone());
        let outcome = detector.detect(&ctx(), VulnerabilityTestClass::Xss, max).await.unwrap();
        let sent = transport.sent.lock().unwrap().len();
        (outcome, sent)
    }

    #[tokio::test]
    async fn test_confirms_above_threshold() {
        let (outcome, sent) = run(vec![verdict(true, 0.95, None, false)], 3).await;
        assert!(outcome.is_vulnerable());
        assert_eq!(sent, 1);
        assert_eq!(outcome.attempts[0].outcome, AttemptOutcome::Reflected);
        assert!(outcome.attempts[0].response.body.contains("q=p1"));
    }

    #[tokio::test]
    async fn test_threshold_is_exclusive() {
        let (outcome, sent) = run(vec![verdict(true, 0.8, None, false)], 3).await;
        assert!(!outcome.is_vulnerable());
        assert_eq!(sent, 1);
        assert_eq!(outcome.last_analysis.unwrap().confidence, 0.8);
    }

    #[tokio::test]
    async fn test_stops_without_suggestion() {
        let (outcome, _) = run(vec![verdict(false, 0.1, None, false)], 3).await;
        assert_eq!(outcome.attempts.len(), 1);
        assert!(outcome.confirmed.is_none());
    }

    #[tokio::test]
    async fn test_bypass_path_until_confirmed() {
        let verdicts = vec![
            verdict(false, 0.3, Some("<ScRiPt>"), true),
            verdict(true, 0.9, None, false),
        ];
        let (outcome, sent) = run(verdicts, 3).await;
        assert!(outcome.is_vulnerable());
        assert_eq!(sent, 2);
        assert_eq!(outcome.blocked_payloads().collect::<Vec<_>>(), vec!["p1"]);
    }

    #[tokio::test]
    async fn test_never_exceeds_max_attempts() {
        let verdicts = vec![
            verdict(false, 0.3, Some("a"), true),
            verdict(false, 0.3, Some("b"), false),
            verdict(false, 0.3, Some("c"), true),
            verdict(true, 0.99, None, false),
        ];
        let (outcome, sent) = run(verdicts, 3).await;
        assert_eq!(sent, 3);
        assert_eq!(outcome.attempts.len(), 3);
        assert!(!outcome.is_vulnerable());
    }

    #[tokio::test]
    async fn test_undeliverable_header_payload_is_blocked_and_detection_continues() {
        let llm = Scripted::with_payloads(
            vec!["1.1.1.1\r\nSet-Cookie: admin=1"],
            vec![verdict(true, 0.95, None, false)],
        );
        let transport = Arc::new(StrictHeaders { sent: Mutex::new(Vec::new()) });
        let detector = VulnerabilityDetector::new(llm, transport.clone());
        let ctx = TestContext::new(
            "http://localhost/profile",
            HttpMethod::Get,
            "X-Forwarded-For",
            ParameterLocation::Header,
            ProbeResponse { status: 200, headers: HashMap::new(), body: String::new(), url: String::new() },
        );

        let outcome = detector.detect(&ctx, VulnerabilityTestClass::Xss, 3).await.unwrap();

        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(
            outcome.blocked_payloads().collect::<Vec<_>>(),
            vec!["1.1.1.1\r\nSet-Cookie: admin=1"]
        );
        assert_eq!(outcome.attempts[0].response.status, 0);
        assert_eq!(outcome.attempts[0].response.url, "http://localhost/profile");
        assert!(outcome.is_vulnerable());
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }
}
