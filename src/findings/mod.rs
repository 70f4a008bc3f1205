pub mod recorder;

pub use recorder::{FindingRecorder, FindingReport};
