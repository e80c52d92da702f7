use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use account::TradingAccount;
use common::{CurrencyPair, Error, OrderGateway, Result};

use crate::config::{AccountConfig, AccountFileConfig};
use crate::grid::{GridParams, GridStrategy};
use crate::threshold::ThresholdStrategy;
use crate::Strategy;

/// Holds all configured strategy instances, each bound to its own account.
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyRegistry {
    /// Build one account and one strategy per configured entry. Any invalid
    /// entry aborts construction.
    pub fn from_config(
        file_cfg: &AccountFileConfig,
        gateway: Arc<dyn OrderGateway>,
    ) -> Result<Self> {
        file_cfg.validate()?;

        let mut strategies: Vec<Box<dyn Strategy>> = Vec::new();
        for cfg in &file_cfg.accounts {
            let strategy = build_strategy(cfg, gateway.clone())?;
            info!(
                name = %strategy.name(),
                kind = strategy.kind(),
                pair = %strategy.pair(),
                "Registered strategy"
            );
            strategies.push(strategy);
        }

        Ok(Self { strategies })
    }

    pub fn strategies(&self) -> &[Box<dyn Strategy>] {
        &self.strategies
    }

    pub fn into_strategies(self) -> Vec<Box<dyn Strategy>> {
        self.strategies
    }

    /// Distinct pairs in registration order.
    pub fn pairs(&self) -> Vec<CurrencyPair> {
        let mut pairs: Vec<CurrencyPair> = Vec::new();
        for s in &self.strategies {
            if !pairs.contains(s.pair()) {
                pairs.push(s.pair().clone());
            }
        }
        pairs
    }
}

// ─── Strategy builders ────────────────────────────────────────────────────────

fn build_strategy(
    cfg: &AccountConfig,
    gateway: Arc<dyn OrderGateway>,
) -> Result<Box<dyn Strategy>> {
    let account = Arc::new(TradingAccount::new(cfg.account_params())?);
    match cfg.strategy_type.as_str() {
        "grid" => {
            let defaults = GridParams::default();
            let params = GridParams {
                slices: param_u64(&cfg.params, "slices", defaults.slices as u64)? as u32,
                max_open_positions: param_u64(
                    &cfg.params,
                    "max_open_positions",
                    defaults.max_open_positions as u64,
                )? as usize,
            };
            Ok(Box::new(GridStrategy::new(account, gateway, params)?))
        }
        "threshold" => Ok(Box::new(ThresholdStrategy::new(account, gateway))),
        other => Err(Error::Invalid(format!(
            "account '{}': unknown strategy type '{other}'",
            cfg.name
        ))),
    }
}

fn param_u64(params: &HashMap<String, toml::Value>, key: &str, default: u64) -> Result<u64> {
    match params.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_integer()
            .filter(|v| *v >= 0 && *v <= u32::MAX as i64)
            .map(|v| v as u64)
            .ok_or_else(|| {
                Error::Invalid(format!("parameter '{key}' must be a non-negative integer"))
            }),
    }
}
