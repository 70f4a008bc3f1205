pub mod provider;
pub mod anthropic;
pub mod openai;
pub mod gemini;
pub mod router;
pub mod types;
pub mod catalog;
pub mod decision;
pub mod response;
pub mod structured;

pub use provider::LLMProvider;
pub use router::{create_provider, LlmSettings};
pub use structured::generate;
pub use types::{LLMResponse, StepEvent, ToolDefinition};
