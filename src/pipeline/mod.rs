pub mod context;
pub mod events;
pub mod orchestrator;
pub mod state;

pub use context::StepContext;
pub use events::ScanEvent;
pub use orchestrator::ScanOrchestrator;
pub use state::{ScanConfig, ScanState};
