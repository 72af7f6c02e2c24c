//! Step progress for the running SDK operation

use crate::events::ProgressStep;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentStep {
    #[serde(flatten)]
    pub step: ProgressStep,
    pub done: bool,
}

/// Ordered steps announced by the SDK, marked off as completions arrive
#[derive(Debug, Clone, Default)]
pub struct ProgressStore {
    steps: Vec<ComponentStep>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the step list; every incoming step starts not done
    pub fn set_progress_steps(&mut self, steps: Vec<ProgressStep>) {
        self.steps = steps
            .into_iter()
            .map(|step| ComponentStep { step, done: false })
            .collect();
    }

    /// Mark the first matching, not-yet-done step as done.
    ///
    /// Returns false when nothing changed (unknown id or already done).
    pub fn update_step_completion(&mut self, type_id: &str) -> bool {
        match self
            .steps
            .iter_mut()
            .find(|s| s.step.type_id == type_id && !s.done)
        {
            Some(step) => {
                step.done = true;
                true
            }
            None => false,
        }
    }

    pub fn reset_progress(&mut self) {
        self.steps.clear();
    }

    pub fn steps(&self) -> &[ComponentStep] {
        &self.steps
    }

    pub fn has_active_steps(&self) -> bool {
        !self.steps.is_empty()
    }

    pub fn completed_steps_count(&self) -> usize {
        self.steps.iter().filter(|s| s.done).count()
    }

    /// Completion in percent; 0 when no steps are known
    pub fn progress_percentage(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        self.completed_steps_count() as f64 / self.steps.len() as f64 * 100.0
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            steps: self.steps.clone(),
            has_active_steps: self.has_active_steps(),
            completed_steps: self.completed_steps_count(),
            percentage: self.progress_percentage(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub steps: Vec<ComponentStep>,
    pub has_active_steps: bool,
    pub completed_steps: usize,
    pub percentage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge_steps() -> Vec<ProgressStep> {
        vec![
            ProgressStep::new("IA", "INTENT_ACCEPTED"),
            ProgressStep::new("IS", "INTENT_SUBMITTED"),
            ProgressStep::new("IF", "INTENT_FULFILLED"),
            ProgressStep::new("IS", "INTENT_SUBMITTED"),
        ]
    }

    #[test]
    fn test_set_steps_marks_all_pending() {
        let mut store = ProgressStore::new();
        store.set_progress_steps(bridge_steps());
        assert!(store.has_active_steps());
        assert_eq!(store.completed_steps_count(), 0);
        assert!(store.steps().iter().all(|s| !s.done));
    }

    #[test]
    fn test_set_steps_replaces_previous_list() {
        let mut store = ProgressStore::new();
        store.set_progress_steps(bridge_steps());
        store.update_step_completion("IA");

        store.set_progress_steps(vec![ProgressStep::new("TC", "TRANSACTION_CONFIRMED")]);
        assert_eq!(store.steps().len(), 1);
        assert_eq!(store.completed_steps_count(), 0);
    }

    #[test]
    fn test_update_step_completion_is_idempotent() {
        let mut store = ProgressStore::new();
        store.set_progress_steps(bridge_steps()[..3].to_vec());

        assert!(store.update_step_completion("IS"));
        let after_first = store.steps().to_vec();

        assert!(!store.update_step_completion("IS"));
        assert_eq!(store.steps(), after_first.as_slice());
        assert_eq!(store.completed_steps_count(), 1);
    }

    #[test]
    fn test_duplicate_ids_complete_in_order() {
        let mut store = ProgressStore::new();
        store.set_progress_steps(bridge_steps());

        assert!(store.update_step_completion("IS"));
        assert!(store.steps()[1].done);
        assert!(!store.steps()[3].done);

        assert!(store.update_step_completion("IS"));
        assert!(store.steps()[3].done);
    }

    #[test]
    fn test_unknown_id_is_noop() {
        let mut store = ProgressStore::new();
        store.set_progress_steps(bridge_steps());
        assert!(!store.update_step_completion("XX"));
        assert_eq!(store.completed_steps_count(), 0);
    }

    #[test]
    fn test_percentage() {
        let mut store = ProgressStore::new();
        assert_eq!(store.progress_percentage(), 0.0);

        store.set_progress_steps(bridge_steps());
        store.update_step_completion("IA");
        assert_eq!(store.progress_percentage(), 25.0);

        store.update_step_completion("IS");
        store.update_step_completion("IF");
        store.update_step_completion("IS");
        assert_eq!(store.progress_percentage(), 100.0);

        store.reset_progress();
        assert!(!store.has_active_steps());
        assert_eq!(store.progress_percentage(), 0.0);
    }
}
