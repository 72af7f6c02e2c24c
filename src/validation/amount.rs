//! Decimal amount grammar and formatting

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref AMOUNT_GRAMMAR: Regex = Regex::new(r"^\d*\.?\d*$").unwrap();
}

/// Check user amount input.
///
/// Empty input is accepted (the user cleared the field). Anything else must be
/// digits with at most one `.`, and must contain at least one digit.
pub fn is_valid_amount_input(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    AMOUNT_GRAMMAR.is_match(value) && value.parse::<f64>().is_ok()
}

/// Parse a grammar-valid amount; `None` for empty or malformed input
pub fn parse_amount(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !AMOUNT_GRAMMAR.is_match(trimmed) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Render an amount without float noise (`1.0 - 0.01` renders as `0.99`)
pub fn format_amount(value: f64) -> String {
    if !value.is_finite() || value <= 0.0 {
        return "0".to_string();
    }
    let rounded = (value * 1e12).round() / 1e12;
    format!("{}", rounded)
}
