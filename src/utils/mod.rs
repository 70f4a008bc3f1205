pub mod formatting;
pub mod ids;
pub mod truncation;
