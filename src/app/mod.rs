//! Application wiring: shared state and the tick driver

pub mod state;
pub mod ticker;

pub use state::{AppState, World};
