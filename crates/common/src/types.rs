use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A base/quote pair, e.g. BTC priced in USDT.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Asset being bought (e.g. "BTC").
    pub base: String,
    /// Asset capital is held in (e.g. "USDT").
    pub quote: String,
}

impl CurrencyPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().trim().to_uppercase(),
            quote: quote.into().trim().to_uppercase(),
        }
    }

    /// Exchange symbol without separator, e.g. "BTCUSDT".
    pub fn ticker(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl std::fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// One price sample returned by a `PriceFeed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub pair: CurrencyPair,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Price {
    pub fn new(pair: CurrencyPair, price: Decimal) -> Self {
        Self {
            pair,
            price,
            timestamp: Utc::now(),
        }
    }
}

/// Lifecycle of an open buy. Settled positions leave the open set instead of
/// carrying a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    /// Created and capital reserved, not yet confirmed by the gateway.
    #[default]
    Pending,
    /// Gateway returned an external id.
    Open,
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionStatus::Pending => write!(f, "PENDING"),
            PositionStatus::Open => write!(f, "OPEN"),
        }
    }
}

/// An open buy held by a trading account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub account_id: String,
    /// "BASE/QUOTE", e.g. "BTC/USDT".
    pub symbol: String,
    /// Base-asset units bought: `committed_amount / entry_price`.
    pub quantity: Decimal,
    /// Quote capital reserved at entry.
    pub committed_amount: Decimal,
    /// Quote capital returned when the position settles.
    pub settlement_amount: Decimal,
    pub entry_price: Decimal,
    /// Price at or above which the position may be settled.
    pub exit_price: Decimal,
    /// `floor(entry_price / bucket_width)` at the time of entry.
    pub bucket: i64,
    pub external_id: Option<String>,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Record the gateway's identifier and mark the position open.
    /// Callers attach at most once; the account enforces that.
    pub fn attach_external_id(&mut self, external_id: impl Into<String>) {
        self.external_id = Some(external_id.into());
        self.status = PositionStatus::Open;
    }

    pub fn is_pending(&self) -> bool {
        self.status == PositionStatus::Pending
    }
}
