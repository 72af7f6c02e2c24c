//! Classification of bridge failures
//!
//! SDK failures arrive as free-form messages. They are mapped onto a small set
//! of categories by case-insensitive substring match; the first matching group wins.

use crate::sdk::SdkError;

use serde::Serialize;
use std::fmt;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    UserRejected,
    AllowanceRejected,
    InsufficientFunds,
    InsufficientGas,
    NetworkError,
    Unknown,
}

/// Match order. Gas is checked before funds so that
/// "insufficient funds for gas" lands in the gas bucket.
const PATTERNS: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::UserRejected,
        &[
            "user rejected",
            "user denied",
            "user cancelled",
            "transaction was rejected",
        ],
    ),
    (
        ErrorCategory::AllowanceRejected,
        &[
            "user rejection during setting allowance",
            "allowance rejected",
            "token approval was rejected",
        ],
    ),
    (
        ErrorCategory::InsufficientGas,
        &[
            "insufficient funds for gas",
            "gas required exceeds allowance",
            "out of gas",
        ],
    ),
    (
        ErrorCategory::InsufficientFunds,
        &["insufficient funds", "insufficient balance", "not enough balance"],
    ),
    (
        ErrorCategory::NetworkError,
        &["network error", "connection error", "timeout", "failed to fetch"],
    ),
];

impl ErrorCategory {
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        PATTERNS
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| lower.contains(p)))
            .map_or(ErrorCategory::Unknown, |(category, _)| *category)
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::UserRejected => "Transaction was cancelled by user",
            ErrorCategory::AllowanceRejected => "Token approval was cancelled",
            ErrorCategory::InsufficientFunds => "Insufficient balance on source chain",
            ErrorCategory::InsufficientGas => "Insufficient funds for gas fees",
            ErrorCategory::NetworkError => "Network error - please check your connection",
            ErrorCategory::Unknown => "An unexpected error occurred",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::NetworkError | ErrorCategory::Unknown)
    }

    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserRejected => "user-rejected",
            ErrorCategory::AllowanceRejected => "allowance-rejected",
            ErrorCategory::InsufficientFunds => "insufficient-funds",
            ErrorCategory::InsufficientGas => "insufficient-gas",
            ErrorCategory::NetworkError => "network-error",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure, ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeError {
    pub category: ErrorCategory,
    #[serde(skip)]
    pub raw_message: String,
    /// Raw message up to the first `:`
    pub message: String,
    pub is_retryable: bool,
    pub user_message: &'static str,
}

impl BridgeError {
    pub fn from_message(raw: impl Into<String>) -> Self {
        let raw_message = raw.into();
        Self::with_category(ErrorCategory::classify(&raw_message), raw_message)
    }

    /// Classify an SDK error. A wallet rejection code wins over an unmatched message.
    pub fn from_sdk_error(err: &SdkError) -> Self {
        let category = match ErrorCategory::classify(&err.message) {
            ErrorCategory::Unknown if err.code == Some(SdkError::USER_REJECTED_CODE) => {
                ErrorCategory::UserRejected
            }
            category => category,
        };
        Self::with_category(category, err.message.clone())
    }

    fn with_category(category: ErrorCategory, raw_message: String) -> Self {
        let message = raw_message
            .split(':')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();

        Self {
            category,
            message,
            is_retryable: category.is_retryable(),
            user_message: category.user_message(),
            raw_message,
        }
    }

    pub fn retry_hint(&self) -> &'static str {
        if self.is_retryable {
            "You can try again, or check your wallet and network connection"
        } else {
            "Please check your transaction parameters and try again"
        }
    }

    pub fn log(&self, context: &str) {
        error!(
            context,
            category = %self.category,
            message = %self.message,
            retryable = self.is_retryable,
            raw = %self.raw_message,
            "Bridge error"
        );
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.user_message)
    }
}

/// Classify a raw failure message and log it under `context`
pub fn log_bridge_error(raw: &str, context: &str) -> BridgeError {
    let err = BridgeError::from_message(raw);
    err.log(context);
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let cases = [
            ("User rejected the request", ErrorCategory::UserRejected),
            ("MetaMask: User denied transaction signature", ErrorCategory::UserRejected),
            (
                "User rejection during setting allowance",
                ErrorCategory::AllowanceRejected,
            ),
            ("Token approval was rejected", ErrorCategory::AllowanceRejected),
            ("insufficient balance for transfer", ErrorCategory::InsufficientFunds),
            ("Not enough balance on Arbitrum", ErrorCategory::InsufficientFunds),
            ("insufficient funds for gas * price + value", ErrorCategory::InsufficientGas),
            ("execution reverted: out of gas", ErrorCategory::InsufficientGas),
            ("Failed to fetch", ErrorCategory::NetworkError),
            ("request timeout after 30s", ErrorCategory::NetworkError),
            ("something odd", ErrorCategory::Unknown),
            ("", ErrorCategory::Unknown),
        ];

        for (message, expected) in cases {
            assert_eq!(ErrorCategory::classify(message), expected, "{}", message);
        }
    }

    #[test]
    fn test_insufficient_funds_for_gas_is_gas() {
        let err = BridgeError::from_message("insufficient funds for gas");
        assert_eq!(err.category, ErrorCategory::InsufficientGas);
        assert_eq!(err.user_message, "Insufficient funds for gas fees");
        assert!(!err.is_retryable);
    }

    #[test]
    fn test_gas_wins_over_funds() {
        let err = BridgeError::from_message("insufficient funds: out of gas on source chain");
        assert_eq!(err.category, ErrorCategory::InsufficientGas);
        assert_eq!(err.message, "insufficient funds");

        let err = BridgeError::from_message("Insufficient balance, gas required exceeds allowance");
        assert_eq!(err.category, ErrorCategory::InsufficientGas);
    }

    #[test]
    fn test_first_group_wins() {
        let err = BridgeError::from_message("user rejected after network error");
        assert_eq!(err.category, ErrorCategory::UserRejected);
    }

    #[test]
    fn test_clean_message() {
        let err = BridgeError::from_message("Network error: connection reset by peer");
        assert_eq!(err.message, "Network error");
        assert_eq!(err.raw_message, "Network error: connection reset by peer");
        assert!(err.is_retryable);
        assert_eq!(
            err.retry_hint(),
            "You can try again, or check your wallet and network connection"
        );
    }

    #[test]
    fn test_rejection_code_fallback() {
        let err = BridgeError::from_sdk_error(&SdkError::with_code(
            "Request aborted",
            SdkError::USER_REJECTED_CODE,
        ));
        assert_eq!(err.category, ErrorCategory::UserRejected);

        let err = BridgeError::from_sdk_error(&SdkError::with_code("Failed to fetch", 4001));
        assert_eq!(err.category, ErrorCategory::NetworkError);

        let err = BridgeError::from_sdk_error(&SdkError::new("Request aborted"));
        assert_eq!(err.category, ErrorCategory::Unknown);
    }

    #[test]
    fn test_only_network_and_unknown_retry() {
        let retryable: Vec<ErrorCategory> = [
            ErrorCategory::UserRejected,
            ErrorCategory::AllowanceRejected,
            ErrorCategory::InsufficientFunds,
            ErrorCategory::InsufficientGas,
            ErrorCategory::NetworkError,
            ErrorCategory::Unknown,
        ]
        .into_iter()
        .filter(ErrorCategory::is_retryable)
        .collect();
        assert_eq!(retryable, vec![ErrorCategory::NetworkError, ErrorCategory::Unknown]);
    }

    #[test]
    fn test_serialized_category() {
        let json = serde_json::to_value(BridgeError::from_message("out of gas")).unwrap();
        assert_eq!(json["category"], "insufficient-gas");
        assert!(json.get("raw_message").is_none());
    }
}
