//! Bridging SDK boundary
//!
//! The cross-chain logic (allowances, intents, solver execution) lives in a
//! vendor SDK this crate treats as a black box. `BridgeSdk` is the seam; the
//! sandbox implementation drives the full flow in-process for local runs.

mod sandbox;

pub use sandbox::SandboxFactory;

#[cfg(test)]
pub(crate) use sandbox::SandboxSdk;

use crate::events::SdkEvent;
use crate::hooks::ConfirmationQueue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

pub type ChainId = u64;

/// Error returned by the SDK.
///
/// `code` carries the EIP-1193 provider code when the failure came from the wallet.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct SdkError {
    pub message: String,
    pub code: Option<i64>,
}

impl SdkError {
    /// EIP-1193 "user rejected request"
    pub const USER_REJECTED_CODE: i64 = 4001;

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: i64) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeParams {
    pub chain_id: ChainId,
    pub token: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferParams {
    pub chain_id: ChainId,
    pub token: String,
    pub amount: String,
    pub recipient: String,
}

/// `{success, error?}` as reported by the SDK
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SdkOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "explorerURL", skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

impl SdkOutcome {
    pub fn ok(explorer_url: Option<String>) -> Self {
        Self {
            success: true,
            error: None,
            explorer_url,
        }
    }

    #[cfg(test)]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            explorer_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSource {
    pub chain_id: ChainId,
    pub chain_name: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentDestination {
    pub chain_id: ChainId,
    pub chain_name: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub ca_gas: String,
    pub protocol: String,
    pub solver: String,
    pub total: String,
}

/// Route and fee preview shown before the user commits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentPreview {
    pub token: String,
    pub sources: Vec<IntentSource>,
    pub destination: IntentDestination,
    pub fees: FeeBreakdown,
    pub sources_total: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub intent: IntentPreview,
    pub token: TokenInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainBalance {
    pub chain_id: ChainId,
    pub chain_name: String,
    pub balance: String,
    pub balance_in_fiat: f64,
}

/// Unified balance of one token across all chains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAsset {
    pub symbol: String,
    pub balance: String,
    pub balance_in_fiat: f64,
    pub breakdown: Vec<ChainBalance>,
}

/// A past intent as reported by the SDK
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRecord {
    pub id: u64,
    pub token: String,
    pub amount: String,
    pub source_chain_ids: Vec<ChainId>,
    pub destination_chain_id: ChainId,
    pub deposited: bool,
    pub fulfilled: bool,
    pub refunded: bool,
    pub created_at: DateTime<Utc>,
}

/// Channels handed to the SDK for the duration of one operation.
///
/// Not `Clone`: the engine applies events until the last sender is gone, so
/// the context must not outlive the `bridge` / `transfer` call.
pub struct SdkContext {
    pub hooks: Arc<ConfirmationQueue>,
    pub events: mpsc::UnboundedSender<SdkEvent>,
}

impl SdkContext {
    pub fn emit(&self, event: SdkEvent) {
        // Receiver gone means nobody is watching this operation anymore
        let _ = self.events.send(event);
    }
}

/// Operations the dashboard needs from the bridging SDK
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BridgeSdk: Send + Sync {
    /// Move `amount` of `token` onto `chain_id`, pulling from other chains
    async fn bridge(&self, params: &BridgeParams, ctx: &SdkContext) -> SdkResult<SdkOutcome>;

    /// Send `amount` of `token` to `recipient` on `chain_id`
    async fn transfer(&self, params: &TransferParams, ctx: &SdkContext) -> SdkResult<SdkOutcome>;

    /// Preview route and fees without executing
    async fn simulate_bridge(&self, params: &BridgeParams) -> SdkResult<SimulationResult>;

    async fn unified_balances(&self) -> SdkResult<Vec<UserAsset>>;

    /// Intents of the connected account, newest first
    async fn my_intents(&self, page: u32) -> SdkResult<Vec<IntentRecord>>;
}

/// Creates one SDK instance per session
pub trait SdkFactory: Send + Sync {
    fn create(&self) -> Arc<dyn BridgeSdk>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_preview() -> IntentPreview {
        IntentPreview {
            token: "USDT".to_string(),
            sources: vec![IntentSource {
                chain_id: 42161,
                chain_name: "Arbitrum One".to_string(),
                amount: "20".to_string(),
            }],
            destination: IntentDestination {
                chain_id: 1,
                chain_name: "Ethereum".to_string(),
                amount: "19.98".to_string(),
            },
            fees: FeeBreakdown {
                ca_gas: "0.004".to_string(),
                protocol: "0.01".to_string(),
                solver: "0.006".to_string(),
                total: "0.02".to_string(),
            },
            sources_total: "20".to_string(),
        }
    }

    #[test]
    fn test_outcome_constructors() {
        let ok = SdkOutcome::ok(Some("https://x/1".to_string()));
        assert!(ok.success);
        assert!(ok.error.is_none());

        let failed = SdkOutcome::failed("insufficient funds for gas");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("insufficient funds for gas"));
    }

    #[test]
    fn test_sdk_error_display() {
        let err = SdkError::with_code("User rejected the request", SdkError::USER_REJECTED_CODE);
        assert_eq!(err.to_string(), "User rejected the request");
        assert_eq!(err.code, Some(4001));
    }
}
