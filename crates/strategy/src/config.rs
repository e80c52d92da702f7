use std::collections::{HashMap, HashSet};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use account::AccountParams;
use common::{CurrencyPair, Error, Result};

/// Top-level accounts file (TOML).
///
/// Example `config/accounts.toml`:
/// ```toml
/// [[account]]
/// strategy = "grid"
/// name = "JUANCHO"
/// currency = "USDT"
/// target_currency = "BTC"
/// initial_capital = "1000"
/// bucket_width = "200"
/// take_profit_fraction = "0.005"
/// poll_interval_secs = 20
///
/// [account.params]
/// slices = 50
/// max_open_positions = 50
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountFileConfig {
    #[serde(rename = "account", default)]
    pub accounts: Vec<AccountConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    /// Strategy type identifier: "grid" or "threshold".
    #[serde(rename = "strategy")]
    pub strategy_type: String,
    /// Human-readable name shown in logs and sent to the order gateway.
    pub name: String,
    /// Quote currency capital is held in, e.g. "USDT".
    pub currency: String,
    /// Base currency being bought, e.g. "BTC".
    pub target_currency: String,
    pub initial_capital: Decimal,
    pub bucket_width: Decimal,
    #[serde(default)]
    pub take_profit_fraction: Option<Decimal>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Strategy-specific parameters.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

fn default_poll_interval_secs() -> u64 {
    20
}

impl AccountConfig {
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(&self.target_currency, &self.currency)
    }

    pub fn account_params(&self) -> AccountParams {
        AccountParams {
            name: self.name.trim().to_string(),
            pair: self.pair(),
            initial_capital: self.initial_capital,
            bucket_width: self.bucket_width,
            take_profit_fraction: self.take_profit_fraction,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
        }
    }
}

impl AccountFileConfig {
    /// Read and parse the accounts file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read accounts config at '{path}': {e}"))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("accounts config at '{path}': {e}")))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse accounts config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Structural checks; per-account numeric checks happen when accounts are built.
    pub fn validate(&self) -> Result<()> {
        if self.accounts.is_empty() {
            return Err(Error::Invalid("no accounts configured".into()));
        }
        let mut seen = HashSet::new();
        for account in &self.accounts {
            if !seen.insert(account.name.trim()) {
                return Err(Error::Invalid(format!(
                    "duplicate account name '{}'",
                    account.name
                )));
            }
        }
        Ok(())
    }
}
