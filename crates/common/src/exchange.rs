use async_trait::async_trait;

use crate::{CurrencyPair, Position, Price, Result};

/// Source of spot prices.
///
/// `BinancePriceFeed` in `crates/engine` implements this against the public
/// ticker endpoint; `PaperClient` serves prices pushed into it.
///
/// Implementations own their own timeout and retry policy. Callers treat any
/// error as "no sample this tick".
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Current exchange rate of `pair.base` expressed in `pair.quote`.
    async fn price(&self, pair: &CurrencyPair) -> Result<Price>;
}

/// Venue that positions are registered with once opened.
///
/// Strategies call this outside of any account lock. A failure leaves the
/// position `Pending`; the caller is responsible for rolling it back.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Register `position` on behalf of the account labelled `account_name`
    /// and return the venue's identifier for it.
    async fn create_order(&self, position: &Position, account_name: &str) -> Result<String>;
}
