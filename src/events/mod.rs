//! SDK lifecycle event types
//!
//! Defines the step events a bridging SDK emits while an operation runs.

use serde::{Deserialize, Serialize};

/// A step the SDK expects to execute for the current operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressStep {
    #[serde(rename = "typeID")]
    pub type_id: String,
    /// SDK step type, e.g. `INTENT_SUBMITTED`
    #[serde(rename = "type")]
    pub display_type: String,
}

impl ProgressStep {
    pub fn new(type_id: impl Into<String>, display_type: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            display_type: display_type.into(),
        }
    }
}

/// Extra data attached to a step completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepData {
    #[serde(rename = "explorerURL", skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    #[serde(rename = "intentID", skip_serializing_if = "Option::is_none")]
    pub intent_id: Option<u64>,
}

/// Well-known step type ids with dedicated handling
pub mod step_ids {
    /// Intent submitted to the solver network
    pub const INTENT_SUBMITTED: &str = "IS";
    /// Intent fulfilled on the destination chain
    pub const INTENT_FULFILLED: &str = "IF";
    /// Transaction confirmed (transfers)
    pub const TRANSACTION_CONFIRMED: &str = "TC";
}

/// Events emitted by the bridging SDK during an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SdkEvent {
    /// The full, ordered list of steps for the operation
    ExpectedSteps(Vec<ProgressStep>),

    /// One step finished
    StepComplete {
        type_id: String,
        data: Option<StepData>,
    },
}

impl SdkEvent {
    /// Get event name for metrics
    pub fn name(&self) -> &'static str {
        match self {
            SdkEvent::ExpectedSteps(_) => "expected_steps",
            SdkEvent::StepComplete { .. } => "step_complete",
        }
    }

    /// Explorer link carried by a completion, if any
    pub fn explorer_url(&self) -> Option<&str> {
        match self {
            SdkEvent::StepComplete {
                data: Some(StepData {
                    explorer_url: Some(url),
                    ..
                }),
                ..
            } if !url.is_empty() => Some(url),
            _ => None,
        }
    }

    /// Check if this event ends the operation from the UI's point of view
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SdkEvent::StepComplete { type_id, .. }
                if type_id == step_ids::INTENT_FULFILLED
                    || type_id == step_ids::TRANSACTION_CONFIRMED
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_step_wire_names() {
        let step = ProgressStep::new("IS", "INTENT_SUBMITTED");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["typeID"], "IS");
        assert_eq!(json["type"], "INTENT_SUBMITTED");
    }

    #[test]
    fn test_explorer_url_and_terminal() {
        let event = SdkEvent::StepComplete {
            type_id: "IF".to_string(),
            data: Some(StepData {
                explorer_url: Some("https://explorer/1".to_string()),
                intent_id: Some(1),
            }),
        };
        assert_eq!(event.explorer_url(), Some("https://explorer/1"));
        assert!(event.is_terminal());
        assert_eq!(event.name(), "step_complete");

        let empty = SdkEvent::StepComplete {
            type_id: "IS".to_string(),
            data: Some(StepData::default()),
        };
        assert_eq!(empty.explorer_url(), None);
        assert!(!empty.is_terminal());
        assert!(!SdkEvent::ExpectedSteps(vec![]).is_terminal());
    }
}
