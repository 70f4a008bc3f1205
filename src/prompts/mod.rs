pub mod loader;
pub mod templates;

pub use loader::{PromptLoader, PromptVariables};
pub use templates::SYSTEM_PROMPT;
