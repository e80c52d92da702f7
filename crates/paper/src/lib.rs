use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{CurrencyPair, Error, OrderGateway, Position, Price, PriceFeed, Result};

/// Intent recorded for every position sent to the paper venue.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperOrder {
    pub external_id: String,
    pub position_id: String,
    pub account_name: String,
    pub symbol: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub committed_amount: Decimal,
    pub exit_price: Decimal,
    pub recorded_at: DateTime<Utc>,
}

/// Simulated venue.
///
/// As an `OrderGateway` it only records the buy intent and hands back a
/// synthetic id; nothing is ever sent to an exchange. As a `PriceFeed` it
/// serves whatever prices were last pushed with `update_price`.
#[derive(Default)]
pub struct PaperClient {
    /// Recorded orders, in submission order.
    orders: Arc<RwLock<Vec<PaperOrder>>>,
    /// Latest known price per pair, updated via `update_price`.
    prices: Arc<RwLock<HashMap<CurrencyPair, Decimal>>>,
}

impl PaperClient {
    pub fn new() -> Self {
        info!("PaperClient initialized");
        Self::default()
    }

    /// Publish the latest price for a pair.
    pub async fn update_price(&self, pair: &CurrencyPair, price: Decimal) {
        self.prices.write().await.insert(pair.clone(), price);
    }

    /// Every order recorded so far.
    pub async fn orders(&self) -> Vec<PaperOrder> {
        self.orders.read().await.clone()
    }
}

#[async_trait]
impl OrderGateway for PaperClient {
    async fn create_order(&self, position: &Position, account_name: &str) -> Result<String> {
        let external_id = uuid::Uuid::new_v4().to_string();

        info!(
            account = %account_name,
            symbol = %position.symbol,
            qty = %position.quantity,
            entry = %position.entry_price,
            committed = %position.committed_amount,
            take_profit = %position.exit_price,
            "Paper buy recorded"
        );

        self.orders.write().await.push(PaperOrder {
            external_id: external_id.clone(),
            position_id: position.id.clone(),
            account_name: account_name.to_string(),
            symbol: position.symbol.clone(),
            quantity: position.quantity,
            entry_price: position.entry_price,
            committed_amount: position.committed_amount,
            exit_price: position.exit_price,
            recorded_at: Utc::now(),
        });

        Ok(external_id)
    }
}

#[async_trait]
impl PriceFeed for PaperClient {
    async fn price(&self, pair: &CurrencyPair) -> Result<Price> {
        let price = self
            .prices
            .read()
            .await
            .get(pair)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("No price available for {pair}")))?;
        debug!(pair = %pair, price = %price, "Paper price served");
        Ok(Price::new(pair.clone(), price))
    }
}
