//! The closed tool surface offered to the oracle.

pub mod analysis;
pub mod definitions;
pub mod executor;
pub mod params;

pub use definitions::tool_definitions;
pub use executor::{ToolContext, ToolExecutor, ToolResult};
pub use params::{
    AnalyzeResponseParams, ExtractLinksParams, ManageTasksParams, TestPayloadParams, ToolCall, ToolKind,
    UpdateStrategyParams,
};
