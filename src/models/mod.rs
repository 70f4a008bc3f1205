pub mod finding;
pub mod http;
pub mod scan_result;
pub mod strategy;
pub mod task;

pub use finding::*;
pub use http::*;
pub use scan_result::*;
pub use strategy::*;
pub use task::*;
