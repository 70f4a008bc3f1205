pub mod detector;
pub mod inject;
pub mod tester;

pub use detector::{DetectionOutcome, VulnerabilityDetector, HIGH_CONFIDENCE};
pub use inject::{inject_payload, ParameterLocation};
pub use tester::{
    AttemptOutcome, EvidenceItem, FilterDescriptor, GeneratedPayload, TestContext, VerdictAnalysis,
    VulnerabilityAttempt, VulnerabilityTestClass,
};
