pub mod manager;

pub use manager::{PrioritizationContext, PrioritizationOutcome, PriorityChange, TaskListing, TaskManager};
