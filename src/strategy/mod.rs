pub mod adapter;

pub use adapter::{StrategyAdapter, StrategySnapshot, StrategyUpdate};
