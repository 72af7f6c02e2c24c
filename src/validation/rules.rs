//! Bridge form validation

use super::amount::{format_amount, is_valid_amount_input, parse_amount};
use crate::config::BridgeConfig;
use crate::sdk::UserAsset;

use serde::Serialize;

pub const SELECT_TOKEN: &str = "Please select a token";
pub const ENTER_AMOUNT: &str = "Please enter an amount";
pub const INVALID_FORMAT: &str = "Invalid amount format";
pub const NOT_POSITIVE: &str = "Amount must be greater than zero";
pub const INSUFFICIENT_BALANCE: &str = "Insufficient balance";
pub const DUST_WARNING: &str = "Amount is very small and may not be economical";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Individual checks, for UI hints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuickChecks {
    pub has_token: bool,
    pub has_amount: bool,
    pub is_valid_format: bool,
    pub is_positive: bool,
    pub has_balance: bool,
    pub is_not_dust: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeValidation {
    pub result: ValidationResult,
    pub checks: QuickChecks,
    pub max_amount: String,
    pub can_submit: bool,
}

impl BridgeValidation {
    pub fn is_valid(&self) -> bool {
        self.result.is_valid
    }

    /// First error, the only one surfaced inline
    pub fn error_message(&self) -> Option<&str> {
        self.result.errors.first().map(String::as_str)
    }

    pub fn warning_message(&self) -> Option<&str> {
        self.result.warnings.first().map(String::as_str)
    }
}

/// Validation thresholds taken from `[bridge]` settings
#[derive(Debug, Clone)]
pub struct ValidationRules {
    native_token: String,
    gas_reserve: f64,
    dust_threshold: f64,
}

impl ValidationRules {
    pub fn new(native_token: impl Into<String>, gas_reserve: f64, dust_threshold: f64) -> Self {
        Self {
            native_token: native_token.into(),
            gas_reserve,
            dust_threshold,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(&config.native_token, config.gas_reserve, config.dust_threshold)
    }

    pub fn is_native(&self, token: &str) -> bool {
        token == self.native_token
    }

    /// Validate the form against a balance snapshot
    pub fn validate(
        &self,
        token: Option<&str>,
        amount: &str,
        balances: &[UserAsset],
    ) -> BridgeValidation {
        let has_token = token.is_some();
        let has_amount = !amount.is_empty();
        let has_user_input = has_token || has_amount;
        let is_valid_format = is_valid_amount_input(amount);

        let asset = token.and_then(|t| find_asset(balances, t));
        let available = asset.and_then(|a| parse_amount(&a.balance)).unwrap_or(0.0);
        let value = if is_valid_format { parse_amount(amount) } else { None };

        let is_positive = value.map_or(false, |v| v > 0.0);
        let has_balance = match (value, token) {
            (Some(v), Some(_)) => v <= available,
            _ => true,
        };
        let is_not_dust = value.map_or(true, |v| v >= self.dust_threshold);

        let mut errors = Vec::new();
        if !has_token && has_user_input {
            errors.push(SELECT_TOKEN.to_string());
        }
        if has_token && !has_amount {
            errors.push(ENTER_AMOUNT.to_string());
        }
        if has_amount && !is_valid_format {
            errors.push(INVALID_FORMAT.to_string());
        }
        if has_amount && is_valid_format {
            if !is_positive {
                errors.push(NOT_POSITIVE.to_string());
            }
            if !has_balance {
                errors.push(INSUFFICIENT_BALANCE.to_string());
            }
        }

        let mut warnings = Vec::new();
        if let Some(v) = value {
            if !is_not_dust {
                warnings.push(DUST_WARNING.to_string());
            }
            if let (Some(t), Some(_)) = (token, asset) {
                if self.is_native(t) && available - v < self.gas_reserve {
                    warnings.push(format!("Consider leaving some {} for gas fees", t));
                }
            }
        }

        let is_valid = errors.is_empty();
        let can_submit = is_valid && has_token && !amount.trim().is_empty();

        BridgeValidation {
            result: ValidationResult {
                is_valid,
                errors,
                warnings,
            },
            checks: QuickChecks {
                has_token,
                has_amount,
                is_valid_format,
                is_positive,
                has_balance,
                is_not_dust,
            },
            max_amount: token.map_or_else(|| "0".to_string(), |t| self.max_amount(t, balances)),
            can_submit,
        }
    }

    /// Largest amount the user may bridge.
    ///
    /// The native token keeps `gas_reserve` back; other tokens return the full balance.
    pub fn max_amount(&self, token: &str, balances: &[UserAsset]) -> String {
        let Some(asset) = find_asset(balances, token) else {
            return "0".to_string();
        };

        if self.is_native(token) {
            let balance = parse_amount(&asset.balance).unwrap_or(0.0);
            return format_amount((balance - self.gas_reserve).max(0.0));
        }

        asset.balance.clone()
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

pub fn find_asset<'a>(balances: &'a [UserAsset], symbol: &str) -> Option<&'a UserAsset> {
    balances.iter().find(|a| a.symbol == symbol)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn asset(symbol: &str, balance: &str) -> UserAsset {
        UserAsset {
            symbol: symbol.to_string(),
            balance: balance.to_string(),
            balance_in_fiat: 0.0,
            breakdown: Vec::new(),
        }
    }

    fn rules() -> ValidationRules {
        ValidationRules::default()
    }

    #[test]
    fn test_untouched_form_is_valid_but_not_submittable() {
        let v = rules().validate(None, "", &[]);
        assert!(v.is_valid());
        assert!(v.result.errors.is_empty());
        assert!(!v.can_submit);
        assert_eq!(v.max_amount, "0");
    }

    #[test]
    fn test_amount_without_token() {
        let v = rules().validate(None, "5", &[asset("USDT", "50")]);
        assert_eq!(v.error_message(), Some(SELECT_TOKEN));
    }

    #[test]
    fn test_token_without_amount() {
        let v = rules().validate(Some("USDT"), "", &[asset("USDT", "50")]);
        assert_eq!(v.result.errors, vec![ENTER_AMOUNT.to_string()]);
    }

    #[test]
    fn test_invalid_format_skips_value_checks() {
        let v = rules().validate(Some("USDT"), "1.2.3", &[asset("USDT", "50")]);
        assert_eq!(v.result.errors, vec![INVALID_FORMAT.to_string()]);
        assert!(v.result.warnings.is_empty());
    }

    #[test]
    fn test_zero_amount() {
        for balance in ["0", "50"] {
            let v = rules().validate(Some("USDT"), "0", &[asset("USDT", balance)]);
            assert_eq!(v.error_message(), Some(NOT_POSITIVE));
        }
    }

    #[test]
    fn test_insufficient_balance() {
        let v = rules().validate(Some("USDT"), "100", &[asset("USDT", "50")]);
        assert!(!v.is_valid());
        assert_eq!(v.result.errors, vec![INSUFFICIENT_BALANCE.to_string()]);
        assert!(!v.can_submit);
    }

    #[test]
    fn test_exact_balance_passes() {
        let v = rules().validate(Some("USDT"), "50", &[asset("USDT", "50")]);
        assert!(v.is_valid());
        assert!(v.can_submit);
        assert!(!v.result.errors.iter().any(|e| e == INSUFFICIENT_BALANCE));
    }

    #[test]
    fn test_missing_balance_entry_counts_as_zero() {
        let v = rules().validate(Some("USDC"), "1", &[asset("USDT", "50")]);
        assert_eq!(v.error_message(), Some(INSUFFICIENT_BALANCE));
    }

    #[test]
    fn test_error_order_is_deterministic() {
        let v = rules().validate(None, "1.2.3", &[asset("USDT", "50")]);
        assert_eq!(
            v.result.errors,
            vec![SELECT_TOKEN.to_string(), INVALID_FORMAT.to_string()]
        );
        assert_eq!(v.error_message(), Some(SELECT_TOKEN));
    }

    #[test]
    fn test_dust_warning() {
        let v = rules().validate(Some("USDT"), "0.0000001", &[asset("USDT", "50")]);
        assert!(v.is_valid());
        assert_eq!(v.warning_message(), Some(DUST_WARNING));
        assert!(!v.checks.is_not_dust);
    }

    #[test]
    fn test_gas_reserve_warning() {
        let v = rules().validate(Some("ETH"), "0.995", &[asset("ETH", "1")]);
        assert!(v.is_valid());
        assert_eq!(v.warning_message(), Some("Consider leaving some ETH for gas fees"));

        let v = rules().validate(Some("ETH"), "0.5", &[asset("ETH", "1")]);
        assert!(v.result.warnings.is_empty());

        let v = rules().validate(Some("USDT"), "50", &[asset("USDT", "50")]);
        assert!(v.result.warnings.is_empty());
    }

    #[test]
    fn test_max_amount() {
        let rules = rules();
        assert_eq!(rules.max_amount("ETH", &[asset("ETH", "1.0")]), "0.99");
        assert_eq!(rules.max_amount("ETH", &[asset("ETH", "0.01")]), "0");
        assert_eq!(rules.max_amount("ETH", &[asset("ETH", "0.005")]), "0");
        assert_eq!(rules.max_amount("USDT", &[asset("USDT", "42.5")]), "42.5");
        assert_eq!(rules.max_amount("USDC", &[asset("USDT", "42.5")]), "0");
    }

    #[test]
    fn test_quick_checks() {
        let v = rules().validate(Some("USDT"), "10", &[asset("USDT", "50")]);
        assert_eq!(
            v.checks,
            QuickChecks {
                has_token: true,
                has_amount: true,
                is_valid_format: true,
                is_positive: true,
                has_balance: true,
                is_not_dust: true,
            }
        );
    }
}
