//! In-process bridging SDK
//!
//! Keeps a per-token, per-chain balance ledger seeded from `[sdk]` settings and
//! walks the same allowance -> intent -> submission sequence a hosted SDK would,
//! emitting step events along the way.

use super::{
    BridgeParams, BridgeSdk, ChainBalance, ChainId, FeeBreakdown, IntentDestination,
    IntentPreview, IntentRecord, IntentSource, SdkContext, SdkError, SdkFactory, SdkOutcome,
    SdkResult, SimulationResult, TokenInfo, TransferParams, UserAsset,
};
use crate::config::{SandboxConfig, Settings};
use crate::events::{step_ids, ProgressStep, SdkEvent, StepData};
use crate::hooks::{AllowanceChoice, AllowanceDecision, AllowanceSource, IntentDecision};
use crate::validation::{format_amount, parse_amount};

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

const INTENT_PAGE_SIZE: usize = 10;

const ALLOWANCE_APPROVAL: &str = "AR";
const INTENT_ACCEPTED: &str = "IA";
const INTENT_HASH_SIGNED: &str = "IH";
const TRANSACTION_SENT: &str = "TS";

struct TokenLedger {
    fiat_price: f64,
    balances: BTreeMap<ChainId, f64>,
}

/// Funds pulled from each source chain, fee included
struct RoutePlan {
    preview: IntentPreview,
    pulls: Vec<(ChainId, f64)>,
    amount: f64,
}

/// Deterministic SDK used by the binary and by tests
pub struct SandboxSdk {
    config: SandboxConfig,
    native_token: String,
    chains: Vec<(ChainId, String)>,
    ledger: RwLock<HashMap<String, TokenLedger>>,
    intents: RwLock<Vec<IntentRecord>>,
    next_intent_id: AtomicU64,
}

impl SandboxSdk {
    pub fn new(settings: &Settings) -> Self {
        let mut chains: Vec<(ChainId, String)> = settings
            .enabled_chains()
            .into_iter()
            .map(|(_, c)| (c.chain_id, c.name.clone()))
            .collect();
        chains.sort_by_key(|(id, _)| *id);

        let mut ledger = HashMap::new();
        for seed in &settings.sdk.balances {
            if !settings.bridge.is_supported_token(&seed.symbol) {
                continue;
            }
            let balances = seed
                .chains
                .iter()
                .filter(|c| settings.is_supported_chain(c.chain_id))
                .map(|c| (c.chain_id, c.balance))
                .collect();
            ledger.insert(
                seed.symbol.clone(),
                TokenLedger {
                    fiat_price: seed.fiat_price,
                    balances,
                },
            );
        }

        Self {
            config: settings.sdk.clone(),
            native_token: settings.bridge.native_token.clone(),
            chains,
            ledger: RwLock::new(ledger),
            intents: RwLock::new(Vec::new()),
            next_intent_id: AtomicU64::new(1),
        }
    }

    fn chain_name(&self, chain_id: ChainId) -> String {
        self.chains
            .iter()
            .find(|(id, _)| *id == chain_id)
            .map(|(_, name)| name.clone())
            .unwrap_or_else(|| format!("Chain {}", chain_id))
    }

    fn is_native(&self, token: &str) -> bool {
        token == self.native_token
    }

    fn decimals(&self, token: &str) -> u8 {
        if self.is_native(token) {
            18
        } else {
            6
        }
    }

    fn explorer_url(&self, id: impl std::fmt::Display) -> String {
        format!("{}/{}", self.config.explorer_base_url.trim_end_matches('/'), id)
    }

    fn fees(&self, amount: f64) -> (FeeBreakdown, f64) {
        let total = amount * f64::from(self.config.fee_bps) / 10_000.0;
        let breakdown = FeeBreakdown {
            ca_gas: format_amount(total * 0.2),
            protocol: format_amount(total * 0.5),
            solver: format_amount(total * 0.3),
            total: format_amount(total),
        };
        (breakdown, total)
    }

    fn parse_positive(amount: &str) -> SdkResult<f64> {
        parse_amount(amount)
            .filter(|v| *v > 0.0)
            .ok_or_else(|| SdkError::new(format!("Invalid amount: {:?}", amount)))
    }

    fn check_chain(&self, chain_id: ChainId) -> SdkResult<()> {
        if self.chains.iter().any(|(id, _)| *id == chain_id) {
            Ok(())
        } else {
            Err(SdkError::new(format!("Unsupported chain: {}", chain_id)))
        }
    }

    /// Pick source chains for a bridge onto `params.chain_id`.
    ///
    /// Sources are every other chain holding the token, drained in chain id order
    /// until amount plus fees is covered.
    async fn plan_route(&self, params: &BridgeParams) -> SdkResult<RoutePlan> {
        let amount = Self::parse_positive(&params.amount)?;
        self.check_chain(params.chain_id)?;

        let (fees, fee_total) = self.fees(amount);
        let mut needed = amount + fee_total;

        let ledger = self.ledger.read().await;
        let mut pulls = Vec::new();
        if let Some(token) = ledger.get(&params.token) {
            for (chain_id, balance) in &token.balances {
                if needed <= 0.0 {
                    break;
                }
                if *chain_id == params.chain_id || *balance <= 0.0 {
                    continue;
                }
                let take = balance.min(needed);
                pulls.push((*chain_id, take));
                needed -= take;
            }
        }

        // Tolerate float dust left over from the subtraction
        if needed > 1e-12 {
            return Err(SdkError::new(format!(
                "Insufficient balance to bridge {} {}",
                params.amount, params.token
            )));
        }

        let sources: Vec<IntentSource> = pulls
            .iter()
            .map(|(chain_id, take)| IntentSource {
                chain_id: *chain_id,
                chain_name: self.chain_name(*chain_id),
                amount: format_amount(*take),
            })
            .collect();
        let sources_total = format_amount(pulls.iter().map(|(_, take)| take).sum());

        Ok(RoutePlan {
            preview: IntentPreview {
                token: params.token.clone(),
                sources,
                destination: IntentDestination {
                    chain_id: params.chain_id,
                    chain_name: self.chain_name(params.chain_id),
                    amount: format_amount(amount),
                },
                fees,
                sources_total,
            },
            pulls,
            amount,
        })
    }

    fn expected_bridge_steps(&self, needs_allowance: bool) -> Vec<ProgressStep> {
        let mut steps = Vec::new();
        if needs_allowance {
            steps.push(ProgressStep::new(ALLOWANCE_APPROVAL, "ALLOWANCE_USER_APPROVAL"));
        }
        if self.config.require_intent {
            steps.push(ProgressStep::new(INTENT_ACCEPTED, "INTENT_ACCEPTED"));
        }
        steps.push(ProgressStep::new(INTENT_HASH_SIGNED, "INTENT_HASH_SIGNED"));
        steps.push(ProgressStep::new(step_ids::INTENT_SUBMITTED, "INTENT_SUBMITTED"));
        steps.push(ProgressStep::new(step_ids::INTENT_FULFILLED, "INTENT_FULFILLED"));
        steps
    }

    async fn confirm_allowance(&self, plan: &RoutePlan, ctx: &SdkContext) -> SdkResult<()> {
        let sources: Vec<AllowanceSource> = plan
            .pulls
            .iter()
            .map(|(chain_id, take)| AllowanceSource {
                chain_id: *chain_id,
                token: plan.preview.token.clone(),
                min_allowance: format_amount(*take),
                current_allowance: "0".to_string(),
            })
            .collect();

        let choices = match ctx.hooks.request_allowance(sources).await {
            AllowanceDecision::Allow(choices) => choices,
            AllowanceDecision::Deny => {
                return Err(SdkError::new("User rejection during setting allowance"))
            }
        };

        for (choice, (chain_id, take)) in choices.iter().zip(&plan.pulls) {
            if let AllowanceChoice::Exact(value) = choice {
                let granted = parse_amount(value).unwrap_or(0.0);
                if granted < *take {
                    return Err(SdkError::new(format!(
                        "Allowance of {} on chain {} is below the required {}",
                        value,
                        chain_id,
                        format_amount(*take)
                    )));
                }
            }
        }

        Ok(())
    }

    /// Ask for intent approval, re-quoting on every refresh
    async fn confirm_intent(
        &self,
        params: &BridgeParams,
        mut plan: RoutePlan,
        ctx: &SdkContext,
    ) -> SdkResult<RoutePlan> {
        loop {
            match ctx.hooks.request_intent(plan.preview.clone()).await {
                IntentDecision::Allow => return Ok(plan),
                IntentDecision::Deny => {
                    return Err(SdkError::with_code(
                        "User rejected the request",
                        SdkError::USER_REJECTED_CODE,
                    ))
                }
                IntentDecision::Refresh => {
                    debug!("Refreshing intent quote for {} {}", params.amount, params.token);
                    plan = self.plan_route(params).await?;
                }
            }
        }
    }

    async fn step(&self, ctx: &SdkContext, type_id: &str, data: Option<StepData>) {
        sleep(Duration::from_millis(self.config.step_delay_ms)).await;
        ctx.emit(SdkEvent::StepComplete {
            type_id: type_id.to_string(),
            data,
        });
    }

    /// Move the planned funds; re-checks balances under the write lock
    async fn settle(&self, token: &str, destination: ChainId, plan: &RoutePlan) -> SdkResult<()> {
        let mut ledger = self.ledger.write().await;
        let entry = ledger
            .get_mut(token)
            .ok_or_else(|| SdkError::new(format!("Insufficient balance for {}", token)))?;

        for (chain_id, take) in &plan.pulls {
            let available = entry.balances.get(chain_id).copied().unwrap_or(0.0);
            if available + 1e-12 < *take {
                return Err(SdkError::new(format!(
                    "Insufficient balance on {}",
                    self.chain_name(*chain_id)
                )));
            }
        }
        for (chain_id, take) in &plan.pulls {
            if let Some(balance) = entry.balances.get_mut(chain_id) {
                *balance = (*balance - take).max(0.0);
            }
        }
        *entry.balances.entry(destination).or_insert(0.0) += plan.amount;
        Ok(())
    }
}

#[async_trait]
impl BridgeSdk for SandboxSdk {
    async fn bridge(&self, params: &BridgeParams, ctx: &SdkContext) -> SdkResult<SdkOutcome> {
        if let Some(message) = &self.config.fail_with {
            warn!("Sandbox configured to fail bridge: {}", message);
            return Err(SdkError::new(message.clone()));
        }

        let plan = self.plan_route(params).await?;
        let needs_allowance = self.config.require_allowance
            && !self.is_native(&params.token)
            && !plan.pulls.is_empty();

        ctx.emit(SdkEvent::ExpectedSteps(self.expected_bridge_steps(needs_allowance)));

        if needs_allowance {
            self.confirm_allowance(&plan, ctx).await?;
            ctx.emit(SdkEvent::StepComplete {
                type_id: ALLOWANCE_APPROVAL.to_string(),
                data: None,
            });
        }

        let plan = if self.config.require_intent {
            let plan = self.confirm_intent(params, plan, ctx).await?;
            ctx.emit(SdkEvent::StepComplete {
                type_id: INTENT_ACCEPTED.to_string(),
                data: None,
            });
            plan
        } else {
            plan
        };

        self.step(ctx, INTENT_HASH_SIGNED, None).await;

        let intent_id = self.next_intent_id.fetch_add(1, Ordering::SeqCst);
        let url = self.explorer_url(intent_id);
        self.settle(&params.token, params.chain_id, &plan).await?;
        self.intents.write().await.push(IntentRecord {
            id: intent_id,
            token: params.token.clone(),
            amount: format_amount(plan.amount),
            source_chain_ids: plan.pulls.iter().map(|(id, _)| *id).collect(),
            destination_chain_id: params.chain_id,
            deposited: true,
            fulfilled: false,
            refunded: false,
            created_at: Utc::now(),
        });

        let data = StepData {
            explorer_url: Some(url.clone()),
            intent_id: Some(intent_id),
        };
        self.step(ctx, step_ids::INTENT_SUBMITTED, Some(data.clone())).await;

        if let Some(record) = self
            .intents
            .write()
            .await
            .iter_mut()
            .find(|r| r.id == intent_id)
        {
            record.fulfilled = true;
        }
        self.step(ctx, step_ids::INTENT_FULFILLED, Some(data)).await;

        info!(
            "Sandbox intent {} fulfilled: {} {} to chain {}",
            intent_id, params.amount, params.token, params.chain_id
        );
        Ok(SdkOutcome::ok(Some(url)))
    }

    async fn transfer(&self, params: &TransferParams, ctx: &SdkContext) -> SdkResult<SdkOutcome> {
        if let Some(message) = &self.config.fail_with {
            warn!("Sandbox configured to fail transfer: {}", message);
            return Err(SdkError::new(message.clone()));
        }

        let amount = Self::parse_positive(&params.amount)?;
        self.check_chain(params.chain_id)?;

        ctx.emit(SdkEvent::ExpectedSteps(vec![
            ProgressStep::new(TRANSACTION_SENT, "TRANSACTION_SENT"),
            ProgressStep::new(step_ids::TRANSACTION_CONFIRMED, "TRANSACTION_CONFIRMED"),
        ]));

        {
            let mut ledger = self.ledger.write().await;
            let balance = ledger
                .get_mut(&params.token)
                .and_then(|t| t.balances.get_mut(&params.chain_id))
                .filter(|b| **b + 1e-12 >= amount)
                .ok_or_else(|| {
                    SdkError::new(format!(
                        "Insufficient balance on {}",
                        self.chain_name(params.chain_id)
                    ))
                })?;
            *balance = (*balance - amount).max(0.0);
        }

        let tx_hash = format!("0x{}", Uuid::new_v4().simple());
        let url = self.explorer_url(&tx_hash);
        self.step(ctx, TRANSACTION_SENT, None).await;
        self.step(
            ctx,
            step_ids::TRANSACTION_CONFIRMED,
            Some(StepData {
                explorer_url: Some(url.clone()),
                intent_id: None,
            }),
        )
        .await;

        info!(
            "Sandbox transfer {} sent {} {} to {}",
            tx_hash, params.amount, params.token, params.recipient
        );
        Ok(SdkOutcome::ok(Some(url)))
    }

    async fn simulate_bridge(&self, params: &BridgeParams) -> SdkResult<SimulationResult> {
        let plan = self.plan_route(params).await?;
        Ok(SimulationResult {
            intent: plan.preview,
            token: TokenInfo {
                symbol: params.token.clone(),
                decimals: self.decimals(&params.token),
            },
        })
    }

    async fn unified_balances(&self) -> SdkResult<Vec<UserAsset>> {
        let ledger = self.ledger.read().await;
        let mut assets: Vec<UserAsset> = ledger
            .iter()
            .map(|(symbol, token)| {
                let breakdown: Vec<ChainBalance> = token
                    .balances
                    .iter()
                    .map(|(chain_id, balance)| ChainBalance {
                        chain_id: *chain_id,
                        chain_name: self.chain_name(*chain_id),
                        balance: format_amount(*balance),
                        balance_in_fiat: balance * token.fiat_price,
                    })
                    .collect();
                let total: f64 = token.balances.values().sum();
                UserAsset {
                    symbol: symbol.clone(),
                    balance: format_amount(total),
                    balance_in_fiat: total * token.fiat_price,
                    breakdown,
                }
            })
            .collect();
        assets.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(assets)
    }

    async fn my_intents(&self, page: u32) -> SdkResult<Vec<IntentRecord>> {
        let page = page.max(1) as usize;
        let intents = self.intents.read().await;
        Ok(intents
            .iter()
            .rev()
            .skip((page - 1) * INTENT_PAGE_SIZE)
            .take(INTENT_PAGE_SIZE)
            .cloned()
            .collect())
    }
}

/// Hands every session its own sandbox ledger
pub struct SandboxFactory {
    settings: Arc<Settings>,
}

impl SandboxFactory {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }
}

impl SdkFactory for SandboxFactory {
    fn create(&self) -> Arc<dyn BridgeSdk> {
        Arc::new(SandboxSdk::new(&self.settings))
    }
}
