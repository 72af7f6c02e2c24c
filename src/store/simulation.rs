//! Latest bridge preview

use crate::sdk::SimulationResult;

use serde::Serialize;

/// Current preview plus a generation counter.
///
/// Every request takes a new generation; results carrying an older one are dropped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationStore {
    result: Option<SimulationResult>,
    is_simulating: bool,
    error: Option<String>,
    #[serde(skip)]
    generation: u64,
}

impl SimulationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn result(&self) -> Option<&SimulationResult> {
        self.result.as_ref()
    }

    pub fn is_simulating(&self) -> bool {
        self.is_simulating
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Start a request and return its generation
    pub fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.is_simulating = true;
        self.error = None;
        self.generation
    }

    /// Store a result; false if a newer request superseded this one
    pub fn complete(&mut self, generation: u64, result: SimulationResult) -> bool {
        if generation != self.generation {
            return false;
        }
        self.result = Some(result);
        self.is_simulating = false;
        true
    }

    pub fn fail(&mut self, generation: u64, error: impl Into<String>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.result = None;
        self.error = Some(error.into());
        self.is_simulating = false;
        true
    }

    /// Drop the preview and invalidate anything in flight
    pub fn clear(&mut self) {
        self.generation += 1;
        self.result = None;
        self.error = None;
        self.is_simulating = false;
    }
}
