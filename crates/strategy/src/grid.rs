use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use account::TradingAccount;
use common::{Error, OrderGateway, Position, Result};

use crate::{register_position, Strategy};

/// Sizing and exposure limits of the grid strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridParams {
    /// Each position commits `initial_capital / slices`.
    pub slices: u32,
    /// Upper bound on simultaneously open positions.
    pub max_open_positions: usize,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            slices: 50,
            max_open_positions: 50,
        }
    }
}

impl GridParams {
    pub fn validate(&self) -> Result<()> {
        if self.slices == 0 {
            return Err(Error::Invalid("grid slices must be at least 1".into()));
        }
        if self.max_open_positions == 0 {
            return Err(Error::Invalid("grid max_open_positions must be at least 1".into()));
        }
        Ok(())
    }
}

/// Accumulation strategy: at most one position per price bucket, each sized as
/// a fixed slice of the initial capital. Positions close band by band as price
/// recovers past their exit price.
pub struct GridStrategy {
    account: Arc<TradingAccount>,
    gateway: Arc<dyn OrderGateway>,
    params: GridParams,
    slice_amount: Decimal,
}

impl GridStrategy {
    pub fn new(
        account: Arc<TradingAccount>,
        gateway: Arc<dyn OrderGateway>,
        params: GridParams,
    ) -> Result<Self> {
        params.validate()?;
        let slice_amount = account.params().initial_capital / Decimal::from(params.slices);
        Ok(Self {
            account,
            gateway,
            params,
            slice_amount,
        })
    }
}

#[async_trait]
impl Strategy for GridStrategy {
    fn kind(&self) -> &'static str {
        "grid"
    }

    fn account(&self) -> &Arc<TradingAccount> {
        &self.account
    }

    async fn on_price(&self, price: Decimal) -> Result<Option<Position>> {
        self.account.settle_positions_at_or_above(price).await;

        let bucket = self.account.compute_bucket(price);
        if self.account.has_open_position_in_bucket(bucket).await {
            return Ok(None);
        }

        if self.account.open_position_count().await >= self.params.max_open_positions {
            debug!(
                account = %self.account.name(),
                max = self.params.max_open_positions,
                "Grid full, not opening"
            );
            return Ok(None);
        }

        if self.account.available_capital().await < self.slice_amount {
            debug!(
                account = %self.account.name(),
                slice = %self.slice_amount,
                "Not enough available capital for another slice"
            );
            return Ok(None);
        }

        let position = self
            .account
            .open_position(price, bucket, self.slice_amount)
            .await?;
        register_position(&self.account, self.gateway.as_ref(), position)
            .await
            .map(Some)
    }
}
