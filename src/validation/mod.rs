//! Amount grammar and form validation
//!
//! Pure functions only: nothing here touches a store or the SDK.

mod amount;
mod rules;

pub use amount::{format_amount, is_valid_amount_input, parse_amount};
pub use rules::{find_asset, BridgeValidation, ValidationRules};

#[cfg(test)]
pub(crate) use rules::tests::asset;
