use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use account::TradingAccount;
use common::{OrderGateway, Position, Result};

use crate::{register_position, Strategy};

/// Single-position "buy the dip" strategy.
///
/// Holds at most one position, committing all available capital to it. After a
/// settlement it only re-enters once price has fallen more than `bucket_width`
/// below the last exit price.
pub struct ThresholdStrategy {
    account: Arc<TradingAccount>,
    gateway: Arc<dyn OrderGateway>,
}

impl ThresholdStrategy {
    pub fn new(account: Arc<TradingAccount>, gateway: Arc<dyn OrderGateway>) -> Self {
        Self { account, gateway }
    }

    /// `true` when `price` is more than `delta` below `last_exit`.
    fn dropped_enough(last_exit: Decimal, price: Decimal, delta: Decimal) -> bool {
        last_exit > price && last_exit - price > delta
    }
}

#[async_trait]
impl Strategy for ThresholdStrategy {
    fn kind(&self) -> &'static str {
        "threshold"
    }

    fn account(&self) -> &Arc<TradingAccount> {
        &self.account
    }

    async fn on_price(&self, price: Decimal) -> Result<Option<Position>> {
        self.account.settle_positions_at_or_above(price).await;

        if self.account.has_any_open_position().await {
            return Ok(None);
        }

        if let Some(last_exit) = self.account.last_exit_price().await {
            let delta = self.account.params().bucket_width;
            if !Self::dropped_enough(last_exit, price, delta) {
                return Ok(None);
            }
            debug!(
                account = %self.account.name(),
                last_exit = %last_exit,
                price = %price,
                "Price retraced past threshold, re-entering"
            );
        }

        let amount = self.account.available_capital().await;
        if amount <= Decimal::ZERO {
            return Ok(None);
        }

        let bucket = self.account.compute_bucket(price);
        let position = self.account.open_position(price, bucket, amount).await?;
        register_position(&self.account, self.gateway.as_ref(), position)
            .await
            .map(Some)
    }
}
