//! Bridge orchestration
//!
//! - `engine`: per-session operation lifecycle and simulation
//! - `taxonomy`: failure classification
//! - `debounce`: cancellable delayed jobs

mod debounce;
mod engine;
mod format;
mod taxonomy;

pub use engine::{BridgeEngine, OperationOutcome, SimulationOutcome};
