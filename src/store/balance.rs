//! Unified balance snapshot

use crate::sdk::UserAsset;
use crate::validation::{find_asset, parse_amount};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BalanceStore {
    assets: Vec<UserAsset>,
    is_loading: bool,
    error: Option<String>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl BalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assets(&self) -> &[UserAsset] {
        &self.assets
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn begin_refresh(&mut self) {
        self.is_loading = true;
        self.error = None;
    }

    pub fn finish_refresh(&mut self, assets: Vec<UserAsset>) {
        self.assets = assets;
        self.is_loading = false;
        self.refreshed_at = Some(Utc::now());
    }

    /// Keep the previous snapshot, remember why the refresh failed
    pub fn fail_refresh(&mut self, error: impl Into<String>) {
        self.is_loading = false;
        self.error = Some(error.into());
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn get(&self, symbol: &str) -> Option<&UserAsset> {
        find_asset(&self.assets, symbol)
    }

    /// Displayed balance for a token, `"0"` when unknown
    pub fn token_balance(&self, symbol: &str) -> &str {
        self.get(symbol).map_or("0", |a| a.balance.as_str())
    }

    /// Tokens with a positive balance
    pub fn available_tokens(&self) -> Vec<String> {
        self.assets
            .iter()
            .filter(|a| parse_amount(&a.balance).map_or(false, |b| b > 0.0))
            .map(|a| a.symbol.clone())
            .collect()
    }

    pub fn is_token_available(&self, symbol: &str) -> bool {
        self.get(symbol)
            .and_then(|a| parse_amount(&a.balance))
            .map_or(false, |b| b > 0.0)
    }

    pub fn total_fiat(&self) -> f64 {
        self.assets.iter().map(|a| a.balance_in_fiat).sum()
    }
}
