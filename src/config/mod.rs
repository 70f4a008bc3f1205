pub mod credentials;
pub mod parser;
pub mod schema;
pub mod security;
pub mod types;

pub use parser::{discover_config_path, load_layered_config, parse_config};
pub use types::*;
