//! Bridge form state

use crate::sdk::ChainId;
use crate::validation::{is_valid_amount_input, parse_amount, BridgeValidation};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeForm {
    pub selected_chain: ChainId,
    pub selected_token: Option<String>,
    pub amount: String,
}

/// Whether the form can be submitted right now, and why not
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionState {
    pub ready: bool,
    pub reason: Option<String>,
}

impl SubmissionState {
    fn blocked(reason: impl Into<String>) -> Self {
        Self {
            ready: false,
            reason: Some(reason.into()),
        }
    }
}

/// Form fields plus the UI flags that gate submission
#[derive(Debug, Clone, Serialize)]
pub struct FormStore {
    form: BridgeForm,
    #[serde(skip)]
    default_chain: ChainId,
    error: Option<String>,
    is_bridging: bool,
    is_loading: bool,
}

impl FormStore {
    pub fn new(default_chain: ChainId) -> Self {
        Self {
            form: Self::initial_form(default_chain),
            default_chain,
            error: None,
            is_bridging: false,
            is_loading: false,
        }
    }

    fn initial_form(chain: ChainId) -> BridgeForm {
        BridgeForm {
            selected_chain: chain,
            selected_token: None,
            amount: String::new(),
        }
    }

    pub fn form(&self) -> &BridgeForm {
        &self.form
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_bridging(&self) -> bool {
        self.is_bridging
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Select the destination chain; the token choice is chain-specific and is cleared
    pub fn set_selected_chain(&mut self, chain_id: ChainId) {
        self.form.selected_chain = chain_id;
        self.form.selected_token = None;
        self.error = None;
    }

    pub fn set_selected_token(&mut self, token: Option<String>) {
        self.form.selected_token = token;
        self.error = None;
    }

    /// Store an amount. Callers are expected to pass grammar-valid input;
    /// see `accept_amount_input` for raw keystrokes.
    pub fn set_amount(&mut self, amount: impl Into<String>) {
        self.form.amount = amount.into();
        self.error = None;
    }

    /// Store raw user input if it is a valid partial amount.
    ///
    /// Returns false (and leaves the form untouched) for malformed input.
    pub fn accept_amount_input(&mut self, value: &str) -> bool {
        if !is_valid_amount_input(value) {
            return false;
        }
        self.set_amount(value);
        true
    }

    pub fn clear_amount(&mut self) {
        self.set_amount(String::new());
    }

    pub fn reset_form(&mut self) {
        self.form = Self::initial_form(self.default_chain);
        self.error = None;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn set_bridging(&mut self, bridging: bool) {
        self.is_bridging = bridging;
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    /// Token chosen and a positive amount entered
    pub fn is_form_valid(&self) -> bool {
        self.form.selected_token.is_some()
            && parse_amount(&self.form.amount).map_or(false, |v| v > 0.0)
    }

    pub fn can_submit(&self) -> bool {
        self.is_form_valid() && !self.is_bridging && !self.is_loading
    }

    pub fn submission_state(&self, validation: &BridgeValidation) -> SubmissionState {
        if self.is_bridging {
            return SubmissionState::blocked("Transaction in progress");
        }
        if self.is_loading {
            return SubmissionState::blocked("Loading...");
        }
        if self.form.selected_token.is_none() {
            return SubmissionState::blocked("Please select a token");
        }
        if self.form.amount.trim().is_empty() {
            return SubmissionState::blocked("Please enter an amount");
        }
        if let Some(message) = validation.error_message() {
            return SubmissionState::blocked(message);
        }
        SubmissionState {
            ready: true,
            reason: None,
        }
    }
}
