pub mod observations;
pub mod state;
pub mod store;

pub use observations::SessionObservations;
pub use state::ScanSession;
pub use store::SessionStore;
