pub mod config;
pub mod grid;
pub mod registry;
pub mod threshold;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AccountConfig, AccountFileConfig};
pub use grid::{GridParams, GridStrategy};
pub use registry::StrategyRegistry;
pub use threshold::ThresholdStrategy;

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{error, info};

use account::TradingAccount;
use common::{CurrencyPair, Error, OrderGateway, Position, Result};

/// All strategy implementations must satisfy this trait.
///
/// A strategy drives exactly one trading account. It is invoked once per tick
/// with that tick's price sample for the account's pair.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Label of the account this instance trades for.
    fn name(&self) -> &str {
        self.account().name()
    }

    /// Strategy type identifier as used in the accounts file.
    fn kind(&self) -> &'static str;

    fn account(&self) -> &Arc<TradingAccount>;

    fn pair(&self) -> &CurrencyPair {
        self.account().pair()
    }

    /// Settle what the price allows, then decide whether to open a new position.
    /// Returns the position opened this tick, if any.
    async fn on_price(&self, price: Decimal) -> Result<Option<Position>>;
}

/// Register a freshly opened position with the gateway and attach the id it
/// returns. If the gateway fails the position is rolled back so its capital
/// returns to the account.
pub async fn register_position(
    account: &TradingAccount,
    gateway: &dyn OrderGateway,
    mut position: Position,
) -> Result<Position> {
    match gateway.create_order(&position, account.name()).await {
        Ok(external_id) => {
            account.attach_external_id(&position.id, &external_id).await?;
            position.attach_external_id(external_id);
            info!(
                account = %account.name(),
                id = %position.id,
                external_id = ?position.external_id,
                "Position registered with gateway"
            );
            Ok(position)
        }
        Err(e) => {
            if let Err(rollback) = account.cancel_pending_position(&position.id).await {
                error!(
                    account = %account.name(),
                    id = %position.id,
                    error = %rollback,
                    "Rollback of unregistered position failed"
                );
            }
            Err(Error::internal("could not create order in provider", e))
        }
    }
}
