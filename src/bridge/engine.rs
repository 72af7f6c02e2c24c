//! Bridge orchestration for one session
//!
//! Drives the SDK for bridge and transfer operations, feeds its step events into
//! the progress store, classifies failures and keeps balances, history and the
//! debounced simulation preview up to date.

use super::debounce::Debouncer;
use super::format::format_step_name;
use super::taxonomy::{log_bridge_error, BridgeError, ErrorCategory};
use crate::config::BridgeConfig;
use crate::error::{BridgeCoreError, BridgeResult};
use crate::events::{step_ids, SdkEvent};
use crate::hooks::ConfirmationQueue;
use crate::metrics;
use crate::sdk::{
    BridgeParams, BridgeSdk, ChainId, SdkContext, SdkResult, SdkOutcome, SimulationResult,
    TransferParams,
};
use crate::store::{Notice, NoticeLevel, SessionStores, SubmissionState};
use crate::validation::{parse_amount, BridgeValidation, ValidationRules};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

lazy_static! {
    static ref ADDRESS_PATTERN: Regex = Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Bridge,
    Transfer,
}

impl OperationKind {
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Bridge => "bridge",
            OperationKind::Transfer => "transfer",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            OperationKind::Bridge => "Bridge",
            OperationKind::Transfer => "Transfer",
        }
    }
}

enum Operation {
    Bridge(BridgeParams),
    Transfer(TransferParams),
}

impl Operation {
    fn kind(&self) -> OperationKind {
        match self {
            Operation::Bridge(_) => OperationKind::Bridge,
            Operation::Transfer(_) => OperationKind::Transfer,
        }
    }
}

/// Result of `execute_bridge` / `execute_transfer`
#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<BridgeError>,
}

impl OperationOutcome {
    fn succeeded(explorer_url: Option<String>) -> Self {
        Self {
            success: true,
            error: None,
            explorer_url,
            failure: None,
        }
    }

    fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            explorer_url: None,
            failure: None,
        }
    }

    fn failed(failure: BridgeError) -> Self {
        Self {
            success: false,
            error: Some(failure.user_message.to_string()),
            explorer_url: None,
            failure: Some(failure),
        }
    }
}

/// Result of `simulate_bridge`
#[derive(Debug, Clone, Serialize)]
pub struct SimulationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SimulationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SimulationOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Clears the in-flight flag when the operation ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct BridgeEngine {
    sdk: Arc<dyn BridgeSdk>,
    stores: Arc<SessionStores>,
    hooks: Arc<ConfirmationQueue>,
    rules: ValidationRules,
    config: BridgeConfig,
    chains: Vec<ChainId>,
    in_flight: AtomicBool,
    explorer_url: RwLock<Option<String>>,
    simulation_timer: Debouncer,
    progress_reset: Debouncer,
    weak_self: Weak<BridgeEngine>,
}

impl BridgeEngine {
    pub fn new(
        sdk: Arc<dyn BridgeSdk>,
        stores: Arc<SessionStores>,
        hooks: Arc<ConfirmationQueue>,
        config: BridgeConfig,
        chains: Vec<ChainId>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            sdk,
            stores,
            hooks,
            rules: ValidationRules::from_config(&config),
            simulation_timer: Debouncer::new(config.simulation_debounce()),
            progress_reset: Debouncer::new(config.progress_reset_delay()),
            config,
            chains,
            in_flight: AtomicBool::new(false),
            explorer_url: RwLock::new(None),
            weak_self: weak_self.clone(),
        })
    }

    pub fn stores(&self) -> &Arc<SessionStores> {
        &self.stores
    }

    pub fn hooks(&self) -> &Arc<ConfirmationQueue> {
        &self.hooks
    }

    pub fn is_bridging(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// A debounced simulation is waiting to fire
    pub fn is_simulation_scheduled(&self) -> bool {
        self.simulation_timer.is_pending()
    }

    /// Explorer link of the last submitted intent
    pub async fn explorer_url(&self) -> Option<String> {
        self.explorer_url.read().await.clone()
    }

    // Form edits

    pub async fn set_chain(&self, chain_id: ChainId) -> BridgeResult<()> {
        if !self.chains.contains(&chain_id) {
            return Err(BridgeCoreError::UnsupportedChain { chain_id });
        }
        self.stores.form.write().await.set_selected_chain(chain_id);
        self.schedule_simulation();
        Ok(())
    }

    pub async fn set_token(&self, token: Option<String>) -> BridgeResult<()> {
        if let Some(symbol) = &token {
            if !self.config.is_supported_token(symbol) {
                return Err(BridgeCoreError::UnsupportedToken {
                    token: symbol.clone(),
                });
            }
        }
        self.stores.form.write().await.set_selected_token(token);
        self.schedule_simulation();
        Ok(())
    }

    /// Accept raw amount input; malformed input leaves the form unchanged
    pub async fn set_amount(&self, value: &str) -> BridgeResult<()> {
        if value.trim().is_empty() {
            self.stores.form.write().await.clear_amount();
        } else if !self.stores.form.write().await.accept_amount_input(value) {
            return Err(BridgeCoreError::InvalidAmountFormat {
                input: value.to_string(),
            });
        }
        self.schedule_simulation();
        Ok(())
    }

    /// Fill the amount with the largest bridgeable value; None without a token
    pub async fn set_max_amount(&self) -> Option<String> {
        let token = self.stores.form.read().await.form().selected_token.clone()?;
        let max = {
            let balances = self.stores.balances.read().await;
            self.rules.max_amount(&token, balances.assets())
        };
        self.stores.form.write().await.set_amount(max.clone());
        self.schedule_simulation();
        Some(max)
    }

    pub async fn reset_form(&self) {
        self.stores.form.write().await.reset_form();
        self.simulation_timer.cancel();
        self.stores.simulation.write().await.clear();
    }

    pub async fn validation(&self) -> BridgeValidation {
        let form = self.stores.form.read().await;
        let balances = self.stores.balances.read().await;
        let form = form.form();
        self.rules
            .validate(form.selected_token.as_deref(), &form.amount, balances.assets())
    }

    pub async fn submission_state(&self) -> SubmissionState {
        let validation = self.validation().await;
        self.stores.form.read().await.submission_state(&validation)
    }

    // Operations

    /// Submit the current form as a bridge.
    ///
    /// The operation runs on its own task: dropping the returned future (a
    /// disconnected client) leaves the SDK call and its cleanup running.
    pub async fn execute_bridge(&self) -> BridgeResult<OperationOutcome> {
        self.detached(|engine| async move { engine.bridge_now().await })
            .await
    }

    /// Submit the current form as a same-chain transfer to `recipient`
    pub async fn execute_transfer(&self, recipient: &str) -> BridgeResult<OperationOutcome> {
        let recipient = recipient.trim().to_string();
        self.detached(move |engine| async move { engine.transfer_now(&recipient).await })
            .await
    }

    async fn detached<F, Fut>(&self, operation: F) -> BridgeResult<OperationOutcome>
    where
        F: FnOnce(Arc<BridgeEngine>) -> Fut,
        Fut: Future<Output = BridgeResult<OperationOutcome>> + Send + 'static,
    {
        let engine = self
            .weak_self
            .upgrade()
            .ok_or_else(|| BridgeCoreError::Internal("engine is shutting down".to_string()))?;
        tokio::spawn(operation(engine))
            .await
            .map_err(|e| BridgeCoreError::Internal(format!("operation task failed: {}", e)))?
    }

    async fn bridge_now(&self) -> BridgeResult<OperationOutcome> {
        let _guard = self.begin()?;

        let form = self.stores.form.read().await.form().clone();
        let (token, amount) = match (form.selected_token, form.amount.trim()) {
            (Some(token), amount) if !amount.is_empty() => (token, amount.to_string()),
            _ => {
                return Ok(self
                    .reject("Missing required parameters for bridge transaction")
                    .await)
            }
        };

        if let Some(message) = self.validation_error().await {
            return Ok(self.reject(&message).await);
        }

        let params = BridgeParams {
            chain_id: form.selected_chain,
            token,
            amount,
        };
        Ok(self.run(Operation::Bridge(params)).await)
    }

    async fn transfer_now(&self, recipient: &str) -> BridgeResult<OperationOutcome> {
        if !recipient.is_empty() && !ADDRESS_PATTERN.is_match(recipient) {
            return Err(BridgeCoreError::InvalidRecipient {
                address: recipient.to_string(),
            });
        }

        let _guard = self.begin()?;

        let form = self.stores.form.read().await.form().clone();
        let (token, amount) = match (form.selected_token, form.amount.trim()) {
            (Some(token), amount) if !amount.is_empty() && !recipient.is_empty() => {
                (token, amount.to_string())
            }
            _ => {
                return Ok(self
                    .reject("Missing required parameters for transfer transaction")
                    .await)
            }
        };

        if let Some(message) = self.validation_error().await {
            return Ok(self.reject(&message).await);
        }

        let params = TransferParams {
            chain_id: form.selected_chain,
            token,
            amount,
            recipient: recipient.to_string(),
        };
        Ok(self.run(Operation::Transfer(params)).await)
    }

    fn begin(&self) -> BridgeResult<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| BridgeCoreError::BridgeInProgress)?;
        Ok(InFlight(&self.in_flight))
    }

    async fn validation_error(&self) -> Option<String> {
        self.validation().await.error_message().map(str::to_string)
    }

    /// Fail before the SDK is involved
    async fn reject(&self, message: &str) -> OperationOutcome {
        warn!("Operation rejected: {}", message);
        self.stores.form.write().await.set_error(Some(message.to_string()));
        self.stores
            .notices
            .lock()
            .await
            .push(Notice::new(NoticeLevel::Error, message));
        self.stores.progress.write().await.reset_progress();
        OperationOutcome::rejected(message)
    }

    async fn run(&self, operation: Operation) -> OperationOutcome {
        let kind = operation.kind();
        let (token, amount) = match &operation {
            Operation::Bridge(p) => (p.token.clone(), p.amount.clone()),
            Operation::Transfer(p) => (p.token.clone(), p.amount.clone()),
        };

        {
            let mut form = self.stores.form.write().await;
            form.set_bridging(true);
            form.set_error(None);
        }
        self.progress_reset.cancel();
        *self.explorer_url.write().await = None;
        self.stores
            .notices
            .lock()
            .await
            .loading(format!("{} of {} {} in progress...", kind.title(), amount, token));

        info!("Starting {}: {} {}", kind.label(), amount, token);
        metrics::record_operation_started(kind.label());
        let started = Instant::now();

        let result = self.call_sdk(operation).await;

        let outcome = match result {
            Ok(SdkOutcome {
                success: true,
                explorer_url,
                ..
            }) => {
                self.settle_success(kind, &token, &amount, explorer_url).await
            }
            Ok(SdkOutcome { error, .. }) => {
                let raw = error.unwrap_or_else(|| "Transaction failed".to_string());
                self.settle_failure(kind, BridgeError::from_message(raw)).await
            }
            Err(e) => self.settle_failure(kind, BridgeError::from_sdk_error(&e)).await,
        };

        metrics::record_operation_latency(kind.label(), started.elapsed().as_secs_f64());
        self.stores.form.write().await.set_bridging(false);

        self.refresh_balances().await;
        self.refresh_history().await;

        outcome
    }

    /// Run the SDK call while applying its events in arrival order.
    ///
    /// The SDK owns the only sender, so the event loop ends once the call
    /// returns and every queued event has been applied.
    async fn call_sdk(&self, operation: Operation) -> SdkResult<SdkOutcome> {
        let kind = operation.kind();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = SdkContext {
            hooks: self.hooks.clone(),
            events: tx,
        };
        let sdk = self.sdk.clone();

        let call = async move {
            match &operation {
                Operation::Bridge(params) => sdk.bridge(params, &ctx).await,
                Operation::Transfer(params) => sdk.transfer(params, &ctx).await,
            }
        };
        let pump = async {
            while let Some(event) = rx.recv().await {
                self.handle_event(kind, event).await;
            }
        };

        let (result, ()) = tokio::join!(call, pump);
        result
    }

    async fn settle_success(
        &self,
        kind: OperationKind,
        token: &str,
        amount: &str,
        explorer_url: Option<String>,
    ) -> OperationOutcome {
        let explorer_url = match explorer_url {
            Some(url) => Some(url),
            None => self.explorer_url().await,
        };

        let verb = match kind {
            OperationKind::Bridge => "bridged",
            OperationKind::Transfer => "sent",
        };
        self.stores.notices.lock().await.push(
            Notice::new(
                NoticeLevel::Success,
                format!("{} transaction completed successfully!", kind.title()),
            )
            .with_description(format!("{} {} {} successfully", amount, token, verb))
            .with_action_url(explorer_url.clone()),
        );

        self.stores.form.write().await.reset_form();
        self.simulation_timer.cancel();
        self.stores.simulation.write().await.clear();
        self.schedule_progress_reset();

        info!("{} of {} {} completed", kind.title(), amount, token);
        metrics::record_operation_completed(kind.label());
        OperationOutcome::succeeded(explorer_url)
    }

    async fn settle_failure(&self, kind: OperationKind, failure: BridgeError) -> OperationOutcome {
        failure.log(match kind {
            OperationKind::Bridge => "Bridge transaction execution",
            OperationKind::Transfer => "Transfer transaction execution",
        });

        let description = if failure.category == ErrorCategory::AllowanceRejected {
            format!(
                "Please approve the token allowance to continue with the {} transaction",
                kind.label()
            )
        } else {
            failure.retry_hint().to_string()
        };

        self.stores
            .form
            .write()
            .await
            .set_error(Some(failure.user_message.to_string()));
        self.stores
            .notices
            .lock()
            .await
            .error(failure.user_message, description);
        self.progress_reset.cancel();
        self.stores.progress.write().await.reset_progress();

        metrics::record_operation_failed(kind.label(), failure.category.as_str());
        OperationOutcome::failed(failure)
    }

    async fn handle_event(&self, kind: OperationKind, event: SdkEvent) {
        debug!(terminal = event.is_terminal(), "SDK event: {}", event.name());
        let event_url = event.explorer_url().map(str::to_string);

        let (type_id, data) = match event {
            SdkEvent::ExpectedSteps(steps) => {
                self.stores.progress.write().await.set_progress_steps(steps);
                return;
            }
            SdkEvent::StepComplete { type_id, data } => (type_id, data),
        };

        let display_type = {
            let mut progress = self.stores.progress.write().await;
            let display_type = progress
                .steps()
                .iter()
                .find(|s| s.step.type_id == type_id && !s.done)
                .map(|s| s.step.display_type.clone());
            if display_type.is_some() {
                progress.update_step_completion(&type_id);
            }
            display_type
        };
        let Some(display_type) = display_type else {
            debug!("Ignoring completion of unknown or finished step {}", type_id);
            return;
        };
        metrics::record_step_completed(&type_id);

        match type_id.as_str() {
            step_ids::TRANSACTION_CONFIRMED => {
                if data.is_some() {
                    self.push_completed(kind, event_url).await;
                    self.schedule_progress_reset();
                }
            }
            step_ids::INTENT_FULFILLED => {
                self.refresh_history().await;
                let url = self.explorer_url().await;
                self.push_completed(kind, url).await;
                self.schedule_progress_reset();
            }
            step_ids::INTENT_SUBMITTED => {
                if data.is_some() {
                    self.refresh_history().await;
                    *self.explorer_url.write().await = event_url.clone();
                    self.stores.notices.lock().await.push(
                        Notice::new(
                            NoticeLevel::Success,
                            format!("{} transaction submitted successfully!", kind.title()),
                        )
                        .with_action_url(event_url),
                    );
                }
            }
            _ => {
                self.stores
                    .notices
                    .lock()
                    .await
                    .success(format!("{} completed!", format_step_name(&display_type)));
            }
        }
    }

    async fn push_completed(&self, kind: OperationKind, explorer_url: Option<String>) {
        self.stores.notices.lock().await.push(
            Notice::new(
                NoticeLevel::Success,
                format!("{} transaction completed successfully!", kind.title()),
            )
            .with_action_url(explorer_url),
        );
    }

    fn schedule_progress_reset(&self) {
        let stores = self.stores.clone();
        self.progress_reset.schedule(async move {
            stores.progress.write().await.reset_progress();
        });
    }

    // Simulation

    async fn current_params(&self) -> Option<BridgeParams> {
        let form = self.stores.form.read().await;
        let form = form.form();
        let token = form.selected_token.clone()?;
        if form.amount.trim().is_empty() {
            return None;
        }
        Some(BridgeParams {
            chain_id: form.selected_chain,
            token,
            amount: form.amount.clone(),
        })
    }

    /// One-off preview for the current form; leaves the simulation store alone
    pub async fn simulate_bridge(&self) -> SimulationOutcome {
        let Some(params) = self.current_params().await else {
            return SimulationOutcome::failed("Missing required parameters for simulation");
        };
        match self.sdk.simulate_bridge(&params).await {
            Ok(result) => SimulationOutcome {
                success: true,
                result: Some(result),
                error: None,
            },
            Err(e) => {
                let failure = log_bridge_error(&e.message, "Bridge simulation");
                SimulationOutcome::failed(failure.user_message)
            }
        }
    }

    /// Refresh the stored preview for the current form
    pub async fn run_simulation(&self) {
        let params = match self.current_params().await {
            Some(p) if parse_amount(&p.amount).map_or(false, |v| v > 0.0) => p,
            _ => {
                self.stores.simulation.write().await.clear();
                return;
            }
        };

        let generation = self.stores.simulation.write().await.begin();
        let result = self.sdk.simulate_bridge(&params).await;

        let mut simulation = self.stores.simulation.write().await;
        let (applied, outcome) = match result {
            Ok(result) => (simulation.complete(generation, result), "ok"),
            Err(e) => {
                debug!("Simulation error for {} {}: {}", params.amount, params.token, e);
                (simulation.fail(generation, e.message), "error")
            }
        };

        if applied {
            metrics::record_simulation(outcome);
        } else {
            debug!("Dropping stale simulation {}", generation);
            metrics::record_simulation("stale");
        }
    }

    /// Cancel any pending debounce and simulate now
    pub async fn trigger_simulation(&self) {
        self.simulation_timer.cancel();
        self.run_simulation().await;
    }

    /// Restart the debounce timer; the newest schedule wins
    pub fn schedule_simulation(&self) {
        let engine = self.weak_self.clone();
        self.simulation_timer.schedule(async move {
            if let Some(engine) = engine.upgrade() {
                engine.run_simulation().await;
            }
        });
    }

    // Balances and history

    pub async fn refresh_balances(&self) {
        self.stores.balances.write().await.begin_refresh();
        match self.sdk.unified_balances().await {
            Ok(assets) => self.stores.balances.write().await.finish_refresh(assets),
            Err(e) => {
                warn!("Failed to refresh balances: {}", e);
                self.stores.balances.write().await.fail_refresh(e.message);
            }
        }
    }

    pub async fn refresh_history(&self) {
        self.stores.history.write().await.begin_refresh();
        match self.sdk.my_intents(1).await {
            Ok(records) => self.stores.history.write().await.finish_refresh(records),
            Err(e) => {
                warn!("Failed to fetch transaction history: {}", e);
                self.stores.history.write().await.fail_refresh(e.message);
            }
        }
    }

    /// Initial load after sign-in
    pub async fn load(&self) {
        self.stores.form.write().await.set_loading(true);
        self.refresh_balances().await;
        self.refresh_history().await;
        self.stores.form.write().await.set_loading(false);
    }

    /// Stop timers and deny anything waiting on the user
    pub async fn shutdown(&self) -> usize {
        self.simulation_timer.cancel();
        self.progress_reset.cancel();
        self.stores.balances.write().await.clear();
        self.hooks.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_settings;
    use crate::events::ProgressStep;
    use crate::hooks::tests::spawn_auto_approver;
    use crate::sdk::{MockBridgeSdk, SandboxSdk, SdkError, TokenInfo, UserAsset};
    use crate::sdk::tests::sample_preview;
    use crate::validation::asset;
    use tokio::time::{advance, Duration};

    fn engine_with(sdk: Arc<dyn BridgeSdk>) -> Arc<BridgeEngine> {
        let settings = sample_settings();
        BridgeEngine::new(
            sdk,
            Arc::new(SessionStores::new(&settings.bridge)),
            Arc::new(ConfirmationQueue::new()),
            settings.bridge.clone(),
            vec![1, 42161],
        )
    }

    fn sandbox_engine() -> Arc<BridgeEngine> {
        engine_with(Arc::new(SandboxSdk::new(&sample_settings())))
    }

    fn quiet_refreshes(sdk: &mut MockBridgeSdk, assets: Vec<UserAsset>) {
        sdk.expect_unified_balances()
            .returning(move || Ok(assets.clone()));
        sdk.expect_my_intents().returning(|_| Ok(Vec::new()));
    }

    async fn fill_form(engine: &BridgeEngine, token: &str, amount: &str) {
        let mut form = engine.stores.form.write().await;
        form.set_selected_token(Some(token.to_string()));
        form.set_amount(amount);
    }

    async fn notice_titles(engine: &BridgeEngine) -> Vec<String> {
        engine
            .stores
            .notices
            .lock()
            .await
            .drain()
            .into_iter()
            .map(|n| n.title)
            .collect()
    }

    #[tokio::test]
    async fn test_missing_parameters() {
        let engine = engine_with(Arc::new(MockBridgeSdk::new()));
        engine
            .stores
            .progress
            .write()
            .await
            .set_progress_steps(vec![ProgressStep::new("IS", "INTENT_SUBMITTED")]);

        let outcome = engine.execute_bridge().await.unwrap();
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Missing required parameters for bridge transaction")
        );
        assert!(!engine.stores.progress.read().await.has_active_steps());
        assert!(!engine.is_bridging());
    }

    #[tokio::test]
    async fn test_validation_failure_skips_sdk() {
        let engine = engine_with(Arc::new(MockBridgeSdk::new()));
        engine
            .stores
            .balances
            .write()
            .await
            .finish_refresh(vec![asset("USDT", "50")]);
        fill_form(&engine, "USDT", "100").await;

        let outcome = engine.execute_bridge().await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Insufficient balance"));
        assert_eq!(
            engine.stores.form.read().await.error(),
            Some("Insufficient balance")
        );
    }

    #[tokio::test]
    async fn test_unsuccessful_outcome_is_classified() {
        let mut sdk = MockBridgeSdk::new();
        sdk.expect_bridge().times(1).returning(|_, ctx| {
            ctx.emit(SdkEvent::ExpectedSteps(vec![ProgressStep::new(
                "IS",
                "INTENT_SUBMITTED",
            )]));
            Ok(SdkOutcome::failed("insufficient funds for gas"))
        });
        quiet_refreshes(&mut sdk, vec![asset("USDT", "50")]);

        let engine = engine_with(Arc::new(sdk));
        engine
            .stores
            .balances
            .write()
            .await
            .finish_refresh(vec![asset("USDT", "50")]);
        fill_form(&engine, "USDT", "10").await;

        let outcome = engine.execute_bridge().await.unwrap();
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.category, ErrorCategory::InsufficientGas);
        assert_eq!(outcome.error.as_deref(), Some("Insufficient funds for gas fees"));

        let form = engine.stores.form.read().await;
        assert_eq!(form.error(), Some("Insufficient funds for gas fees"));
        assert!(!form.is_bridging());
        assert_eq!(form.form().amount, "10");
        drop(form);

        assert!(!engine.stores.progress.read().await.has_active_steps());
        assert!(!engine.is_bridging());
        assert_eq!(
            notice_titles(&engine).await.last().map(String::as_str),
            Some("Insufficient funds for gas fees")
        );
    }

    #[tokio::test]
    async fn test_wallet_rejection_code() {
        let mut sdk = MockBridgeSdk::new();
        sdk.expect_bridge()
            .returning(|_, _| Err(SdkError::with_code("Request aborted", 4001)));
        quiet_refreshes(&mut sdk, vec![asset("USDT", "50")]);

        let engine = engine_with(Arc::new(sdk));
        engine.refresh_balances().await;
        fill_form(&engine, "USDT", "10").await;

        let outcome = engine.execute_bridge().await.unwrap();
        assert_eq!(outcome.failure.unwrap().category, ErrorCategory::UserRejected);
        assert_eq!(
            engine.stores.form.read().await.error(),
            Some("Transaction was cancelled by user")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_success_with_sandbox() {
        let engine = sandbox_engine();
        let approver = spawn_auto_approver(engine.hooks.clone());
        engine.load().await;
        fill_form(&engine, "USDT", "10").await;

        let outcome = engine.execute_bridge().await.unwrap();
        approver.abort();

        assert!(outcome.success);
        assert!(outcome.explorer_url.is_some());
        assert_eq!(engine.explorer_url().await, outcome.explorer_url);

        let form = engine.stores.form.read().await;
        assert_eq!(form.form().selected_token, None);
        assert_eq!(form.form().amount, "");
        assert!(!form.is_bridging());
        drop(form);

        let progress = engine.stores.progress.read().await.snapshot();
        assert_eq!(progress.percentage, 100.0);

        let titles = notice_titles(&engine).await;
        assert!(titles.contains(&"Allowance User Approval completed!".to_string()));
        assert!(titles.contains(&"Bridge transaction submitted successfully!".to_string()));
        assert_eq!(
            titles.last().map(String::as_str),
            Some("Bridge transaction completed successfully!")
        );

        let balances = engine.stores.balances.read().await;
        assert_eq!(balances.get("USDT").unwrap().breakdown[0].balance, "40");
        drop(balances);
        assert_eq!(engine.stores.history.read().await.records().len(), 1);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(!engine.stores.progress.read().await.has_active_steps());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_submit_is_rejected() {
        let engine = sandbox_engine();
        engine.load().await;
        fill_form(&engine, "USDT", "10").await;

        let running = tokio::spawn({
            let engine = engine.clone();
            async move { engine.execute_bridge().await }
        });
        engine.hooks.wait_for_request().await;

        assert!(engine.is_bridging());
        assert!(engine.stores.form.read().await.is_bridging());
        assert!(matches!(
            engine.execute_bridge().await,
            Err(BridgeCoreError::BridgeInProgress)
        ));
        assert_eq!(
            engine.submission_state().await.reason.as_deref(),
            Some("Transaction in progress")
        );

        assert_eq!(engine.shutdown().await, 1);
        let outcome = running.await.unwrap().unwrap();
        assert_eq!(
            outcome.failure.map(|f| f.category),
            Some(ErrorCategory::AllowanceRejected)
        );
        assert_eq!(
            engine.stores.form.read().await.error(),
            Some("Token approval was cancelled")
        );
        assert!(!engine.is_bridging());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_caller_does_not_cancel_operation() {
        let engine = sandbox_engine();
        engine.load().await;
        fill_form(&engine, "USDT", "10").await;

        let caller = tokio::spawn({
            let engine = engine.clone();
            async move { engine.execute_bridge().await }
        });
        tokio::time::timeout(Duration::from_secs(5), engine.hooks.wait_for_request())
            .await
            .unwrap();
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        // The operation outlives its caller and still waits on the user
        assert!(engine.is_bridging());
        assert_eq!(engine.hooks.len().await, 1);

        let approver = spawn_auto_approver(engine.hooks.clone());
        tokio::time::timeout(Duration::from_secs(30), async {
            while engine.is_bridging() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
        approver.abort();

        let form = engine.stores.form.read().await;
        assert!(!form.is_bridging());
        assert!(form.error().is_none());
        drop(form);
        assert_eq!(
            engine.submission_state().await.reason.as_deref(),
            Some("Please select a token")
        );
        assert_eq!(engine.stores.history.read().await.records().len(), 1);
        assert_eq!(engine.hooks.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfer_with_sandbox() {
        let engine = sandbox_engine();
        engine.load().await;
        fill_form(&engine, "USDT", "5").await;

        let err = engine.execute_transfer("0x1234").await.unwrap_err();
        assert!(matches!(err, BridgeCoreError::InvalidRecipient { .. }));

        let outcome = engine.execute_transfer("").await.unwrap();
        assert_eq!(
            outcome.error.as_deref(),
            Some("Missing required parameters for transfer transaction")
        );

        let recipient = format!("0x{}", "Ab".repeat(20));
        let outcome = engine.execute_transfer(&recipient).await.unwrap();
        assert!(outcome.success);
        assert_eq!(engine.stores.balances.read().await.token_balance("USDT"), "45");
        assert!(notice_titles(&engine)
            .await
            .contains(&"Transfer transaction completed successfully!".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_completion_is_ignored() {
        let engine = engine_with(Arc::new(MockBridgeSdk::new()));
        engine
            .handle_event(
                OperationKind::Bridge,
                SdkEvent::ExpectedSteps(vec![ProgressStep::new("IA", "INTENT_ACCEPTED")]),
            )
            .await;

        for _ in 0..2 {
            engine
                .handle_event(
                    OperationKind::Bridge,
                    SdkEvent::StepComplete {
                        type_id: "IA".to_string(),
                        data: None,
                    },
                )
                .await;
        }

        assert_eq!(engine.stores.progress.read().await.completed_steps_count(), 1);
        assert_eq!(notice_titles(&engine).await, vec!["Intent Accepted completed!"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_simulation_runs_once() {
        let mut sdk = MockBridgeSdk::new();
        sdk.expect_simulate_bridge().times(1).returning(|params| {
            assert_eq!(params.amount, "12.5");
            Ok(SimulationResult {
                intent: sample_preview(),
                token: TokenInfo {
                    symbol: "USDT".to_string(),
                    decimals: 6,
                },
            })
        });
        let engine = engine_with(Arc::new(sdk));

        engine.set_token(Some("USDT".to_string())).await.unwrap();
        for value in ["1", "12", "12.", "12.5"] {
            engine.set_amount(value).await.unwrap();
            advance(Duration::from_millis(100)).await;
        }
        assert!(engine.stores.simulation.read().await.result().is_none());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(engine.stores.simulation.read().await.result().is_some());
    }

    #[tokio::test]
    async fn test_simulation_failure_is_non_blocking() {
        let mut sdk = MockBridgeSdk::new();
        sdk.expect_simulate_bridge()
            .returning(|_| Err(SdkError::new("Insufficient balance to bridge 100 USDT")));
        let engine = engine_with(Arc::new(sdk));
        fill_form(&engine, "USDT", "100").await;

        engine.trigger_simulation().await;
        let simulation = engine.stores.simulation.read().await;
        assert_eq!(
            simulation.error(),
            Some("Insufficient balance to bridge 100 USDT")
        );
        assert!(!simulation.is_simulating());
        drop(simulation);

        let preview = engine.simulate_bridge().await;
        assert!(!preview.success);
        assert!(preview.result.is_none());
        assert_eq!(
            preview.error.as_deref(),
            Some("Insufficient balance on source chain")
        );
        assert!(engine.stores.form.read().await.error().is_none());
    }

    #[tokio::test]
    async fn test_simulate_bridge_needs_token_and_amount() {
        let engine = engine_with(Arc::new(MockBridgeSdk::new()));
        let preview = engine.simulate_bridge().await;
        assert!(!preview.success);
        assert_eq!(
            preview.error.as_deref(),
            Some("Missing required parameters for simulation")
        );
    }

    #[tokio::test]
    async fn test_incomplete_form_clears_simulation() {
        let engine = engine_with(Arc::new(MockBridgeSdk::new()));
        fill_form(&engine, "USDT", "0").await;
        engine.trigger_simulation().await;
        let simulation = engine.stores.simulation.read().await;
        assert!(simulation.result().is_none());
        assert!(!simulation.is_simulating());
        assert!(simulation.error().is_none());
    }

    #[tokio::test]
    async fn test_form_edits_are_checked() {
        let engine = engine_with(Arc::new(MockBridgeSdk::new()));
        assert!(matches!(
            engine.set_chain(534352).await,
            Err(BridgeCoreError::UnsupportedChain { chain_id: 534352 })
        ));
        assert!(matches!(
            engine.set_token(Some("DOGE".to_string())).await,
            Err(BridgeCoreError::UnsupportedToken { .. })
        ));
        assert!(matches!(
            engine.set_amount("1.2.3").await,
            Err(BridgeCoreError::InvalidAmountFormat { .. })
        ));
        assert_eq!(engine.set_max_amount().await, None);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_max_amount_keeps_gas_reserve() {
        let engine = engine_with(Arc::new(MockBridgeSdk::new()));
        engine
            .stores
            .balances
            .write()
            .await
            .finish_refresh(vec![asset("ETH", "1.0")]);
        engine.set_token(Some("ETH".to_string())).await.unwrap();

        assert_eq!(engine.set_max_amount().await.as_deref(), Some("0.99"));
        assert_eq!(engine.stores.form.read().await.form().amount, "0.99");
        engine.shutdown().await;
    }
}
