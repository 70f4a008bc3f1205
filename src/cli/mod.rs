pub mod commands;
pub mod exit;
pub mod progress;
pub mod scan;
pub mod validate;

pub use commands::{Cli, Commands};
