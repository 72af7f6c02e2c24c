//! Error types for the bridge core

use crate::sdk::SdkError;

use thiserror::Error;
use uuid::Uuid;

/// Main error type for the bridge core
#[derive(Error, Debug)]
pub enum BridgeCoreError {
    #[error("Session {session_id} not found")]
    SessionNotFound { session_id: Uuid },

    #[error("Chain {chain_id} is not supported")]
    UnsupportedChain { chain_id: u64 },

    #[error("Token {token} is not supported")]
    UnsupportedToken { token: String },

    #[error("Invalid amount format: {input:?}")]
    InvalidAmountFormat { input: String },

    #[error("Invalid recipient address: {address}")]
    InvalidRecipient { address: String },

    #[error("Transaction in progress")]
    BridgeInProgress,

    #[error("Confirmation request {id} not found")]
    ConfirmationNotFound { id: Uuid },

    #[error("Confirmation request {id} is not an {expected} request")]
    ConfirmationMismatch { id: Uuid, expected: &'static str },

    #[error("Invalid confirmation decision: {0}")]
    InvalidDecision(String),

    #[error("SDK error: {0}")]
    Sdk(#[from] SdkError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeCoreError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeCoreError::BridgeInProgress | BridgeCoreError::Sdk(_)
        )
    }
}

/// Result type for bridge core operations
pub type BridgeResult<T> = Result<T, BridgeCoreError>;
