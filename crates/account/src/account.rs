use std::time::Duration;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use common::{CurrencyPair, Error, Position, PositionStatus, Result};

/// Markup applied to the entry price when an account has no take-profit
/// fraction of its own.
pub const DEFAULT_TAKE_PROFIT: Decimal = dec!(0.02);

/// Construction parameters of a trading account.
#[derive(Debug, Clone)]
pub struct AccountParams {
    /// Human label, used in logs and passed to the order gateway.
    pub name: String,
    pub pair: CurrencyPair,
    pub initial_capital: Decimal,
    /// Width of one price bucket. Doubles as the threshold strategy's re-entry drop.
    pub bucket_width: Decimal,
    /// Fractional markup required to exit (e.g. 0.005 = 0.5%).
    pub take_profit_fraction: Option<Decimal>,
    pub poll_interval: Duration,
}

impl AccountParams {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Invalid("account name must not be empty".into()));
        }
        if self.pair.base.is_empty() || self.pair.quote.is_empty() {
            return Err(Error::Invalid(format!(
                "account '{}' needs both currency and target currency",
                self.name
            )));
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err(Error::Invalid(format!(
                "account '{}': initial capital must be positive, got {}",
                self.name, self.initial_capital
            )));
        }
        if self.bucket_width <= Decimal::ZERO {
            return Err(Error::Invalid(format!(
                "account '{}': bucket width must be positive, got {}",
                self.name, self.bucket_width
            )));
        }
        if let Some(tp) = self.take_profit_fraction {
            if tp < Decimal::ZERO || tp > Decimal::ONE {
                return Err(Error::Invalid(format!(
                    "account '{}': take-profit fraction must be within [0, 1], got {tp}",
                    self.name
                )));
            }
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Invalid(format!(
                "account '{}': poll interval must be positive",
                self.name
            )));
        }
        Ok(())
    }

    fn exit_multiplier(&self) -> Decimal {
        Decimal::ONE + self.take_profit_fraction.unwrap_or(DEFAULT_TAKE_PROFIT)
    }
}

/// Mutable state of an account. Only ever touched under the account lock;
/// `TradingAccount::snapshot` hands out copies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ledger {
    pub available_capital: Decimal,
    pub invested_capital: Decimal,
    /// Always `available_capital + invested_capital`.
    pub total_capital: Decimal,
    /// Open positions in the order they were opened.
    pub open_positions: Vec<Position>,
    /// Price of the most recent settlement; `None` until one happens.
    pub last_exit_price: Option<Decimal>,
}

impl Ledger {
    fn new(initial_capital: Decimal) -> Self {
        Self {
            available_capital: initial_capital,
            invested_capital: Decimal::ZERO,
            total_capital: initial_capital,
            open_positions: Vec::new(),
            last_exit_price: None,
        }
    }

    fn recompute_total(&mut self) {
        self.total_capital = self.available_capital + self.invested_capital;
    }
}

/// Aggregate root: owns the open positions of one account and the capital
/// split between them and the free balance.
///
/// Every read used for a decision and every mutation takes the account lock for
/// the critical section only. Nothing here performs I/O, so the lock is never
/// held across price-feed or gateway calls.
pub struct TradingAccount {
    id: String,
    params: AccountParams,
    ledger: Mutex<Ledger>,
}

impl TradingAccount {
    pub fn new(params: AccountParams) -> Result<Self> {
        params.validate()?;

        let account = Self {
            id: uuid::Uuid::new_v4().to_string(),
            ledger: Mutex::new(Ledger::new(params.initial_capital)),
            params,
        };

        info!(
            account = %account.params.name,
            pair = %account.params.pair,
            initial_capital = %account.params.initial_capital,
            bucket_width = %account.params.bucket_width,
            take_profit = %account
                .params
                .take_profit_fraction
                .unwrap_or(DEFAULT_TAKE_PROFIT),
            "Trading account initialized"
        );
        Ok(account)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.params.name
    }

    pub fn pair(&self) -> &CurrencyPair {
        &self.params.pair
    }

    pub fn params(&self) -> &AccountParams {
        &self.params
    }

    /// `floor(price / bucket_width)`, saturating at the `i64` range.
    pub fn compute_bucket(&self, price: Decimal) -> i64 {
        let ratio = price
            .checked_div(self.params.bucket_width)
            .unwrap_or(if price.is_sign_negative() {
                Decimal::MIN
            } else {
                Decimal::MAX
            });
        ratio.floor().to_i64().unwrap_or(if ratio.is_sign_negative() {
            i64::MIN
        } else {
            i64::MAX
        })
    }

    pub async fn has_open_position_in_bucket(&self, bucket: i64) -> bool {
        self.ledger
            .lock()
            .await
            .open_positions
            .iter()
            .any(|p| p.bucket == bucket)
    }

    pub async fn has_any_open_position(&self) -> bool {
        !self.ledger.lock().await.open_positions.is_empty()
    }

    pub async fn open_position_count(&self) -> usize {
        self.ledger.lock().await.open_positions.len()
    }

    pub async fn available_capital(&self) -> Decimal {
        self.ledger.lock().await.available_capital
    }

    pub async fn last_exit_price(&self) -> Option<Decimal> {
        self.ledger.lock().await.last_exit_price
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> Ledger {
        self.ledger.lock().await.clone()
    }

    /// Reserve `committed_amount` of available capital for a new `Pending`
    /// position bought at `price`.
    pub async fn open_position(
        &self,
        price: Decimal,
        bucket: i64,
        committed_amount: Decimal,
    ) -> Result<Position> {
        if price <= Decimal::ZERO {
            return Err(Error::Invalid(format!("entry price must be positive, got {price}")));
        }
        if committed_amount <= Decimal::ZERO {
            return Err(Error::Invalid(format!(
                "committed amount must be positive, got {committed_amount}"
            )));
        }

        let multiplier = self.params.exit_multiplier();
        let quantity = committed_amount
            .checked_div(price)
            .ok_or_else(|| Error::Internal("quantity overflowed".into()))?;
        let exit_price = price
            .checked_mul(multiplier)
            .ok_or_else(|| Error::Internal("exit price overflowed".into()))?;
        let settlement_amount = committed_amount
            .checked_mul(multiplier)
            .ok_or_else(|| Error::Internal("settlement amount overflowed".into()))?;

        let mut ledger = self.ledger.lock().await;
        if committed_amount > ledger.available_capital {
            return Err(Error::Invalid(format!(
                "committed amount {committed_amount} exceeds available capital {}",
                ledger.available_capital
            )));
        }

        let position = Position {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: self.id.clone(),
            symbol: self.params.pair.to_string(),
            quantity,
            committed_amount,
            settlement_amount,
            entry_price: price,
            exit_price,
            bucket,
            external_id: None,
            status: PositionStatus::Pending,
            opened_at: Utc::now(),
        };

        ledger.available_capital -= committed_amount;
        ledger.invested_capital += committed_amount;
        ledger.recompute_total();
        ledger.open_positions.push(position.clone());

        info!(
            account = %self.params.name,
            id = %position.id,
            qty = %position.quantity,
            entry = %position.entry_price,
            committed = %position.committed_amount,
            exit = %position.exit_price,
            bucket = bucket,
            "Position opened"
        );
        Ok(position)
    }

    /// Record the gateway id of an open position. A position accepts exactly one id.
    pub async fn attach_external_id(&self, position_id: &str, external_id: &str) -> Result<()> {
        let mut ledger = self.ledger.lock().await;
        let position = ledger
            .open_positions
            .iter_mut()
            .find(|p| p.id == position_id)
            .ok_or_else(|| Error::NotFound(format!("no open position '{position_id}'")))?;

        if !position.is_pending() {
            return Err(Error::Invalid(format!(
                "position '{position_id}' already has external id {:?}",
                position.external_id
            )));
        }
        position.attach_external_id(external_id);
        debug!(account = %self.params.name, id = %position_id, external_id = %external_id, "Position confirmed");
        Ok(())
    }

    /// Undo `open_position` for a position the gateway never confirmed,
    /// returning its committed amount to available capital.
    pub async fn cancel_pending_position(&self, position_id: &str) -> Result<Position> {
        let mut ledger = self.ledger.lock().await;
        let idx = ledger
            .open_positions
            .iter()
            .position(|p| p.id == position_id)
            .ok_or_else(|| Error::NotFound(format!("no open position '{position_id}'")))?;

        if !ledger.open_positions[idx].is_pending() {
            return Err(Error::Invalid(format!(
                "position '{position_id}' is already confirmed and cannot be cancelled"
            )));
        }

        let removed = ledger.open_positions.remove(idx);
        ledger.invested_capital -= removed.committed_amount;
        ledger.available_capital += removed.committed_amount;
        ledger.recompute_total();

        warn!(
            account = %self.params.name,
            id = %removed.id,
            committed = %removed.committed_amount,
            "Pending position rolled back"
        );
        Ok(removed)
    }

    /// Settle every open position whose exit price is at or below `price`.
    ///
    /// Returns the settled positions; survivors keep their relative order.
    /// `last_exit_price` only moves when at least one position settles.
    pub async fn settle_positions_at_or_above(&self, price: Decimal) -> Vec<Position> {
        let mut ledger = self.ledger.lock().await;
        if ledger.open_positions.iter().all(|p| p.exit_price > price) {
            return Vec::new();
        }

        let (settled, kept): (Vec<Position>, Vec<Position>) =
            std::mem::take(&mut ledger.open_positions)
                .into_iter()
                .partition(|p| p.exit_price <= price);
        ledger.open_positions = kept;

        for position in &settled {
            ledger.invested_capital -= position.committed_amount;
            ledger.available_capital += position.settlement_amount;
            info!(
                account = %self.params.name,
                id = %position.id,
                qty = %position.quantity,
                exit = %position.exit_price,
                proceeds = %position.settlement_amount,
                "Position settled"
            );
        }
        ledger.recompute_total();
        ledger.last_exit_price = Some(price);

        info!(
            account = %self.params.name,
            total_capital = %ledger.total_capital,
            available = %ledger.available_capital,
            invested = %ledger.invested_capital,
            "Capital updated after settlement"
        );
        settled
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn params(take_profit: Option<Decimal>) -> AccountParams {
        AccountParams {
            name: "TEST".into(),
            pair: CurrencyPair::new("BTC", "USDT"),
            initial_capital: dec!(1000),
            bucket_width: dec!(200),
            take_profit_fraction: take_profit,
            poll_interval: Duration::from_secs(20),
        }
    }

    fn account() -> TradingAccount {
        TradingAccount::new(params(None)).unwrap()
    }

    fn assert_balanced(ledger: &Ledger) {
        assert_eq!(
            ledger.total_capital,
            ledger.available_capital + ledger.invested_capital
        );
        let committed: Decimal = ledger.open_positions.iter().map(|p| p.committed_amount).sum();
        assert_eq!(ledger.invested_capital, committed);
    }

    #[test]
    fn construction_rejects_bad_parameters() {
        let mut p = params(None);
        p.initial_capital = Decimal::ZERO;
        assert!(matches!(TradingAccount::new(p), Err(Error::Invalid(_))));

        let mut p = params(None);
        p.bucket_width = dec!(-1);
        assert!(matches!(TradingAccount::new(p), Err(Error::Invalid(_))));

        let p = params(Some(dec!(1.5)));
        assert!(matches!(TradingAccount::new(p), Err(Error::Invalid(_))));

        let mut p = params(None);
        p.poll_interval = Duration::ZERO;
        assert!(matches!(TradingAccount::new(p), Err(Error::Invalid(_))));
    }

    #[test]
    fn bucket_is_floor_of_price_over_width() {
        let acct = account();
        assert_eq!(acct.compute_bucket(dec!(1000)), 5);
        assert_eq!(acct.compute_bucket(dec!(1050)), 5);
        assert_eq!(acct.compute_bucket(dec!(1199.99)), 5);
        assert_eq!(acct.compute_bucket(dec!(1200)), 6);
        assert_eq!(acct.compute_bucket(dec!(0)), 0);
    }

    #[tokio::test]
    async fn open_moves_capital_and_prices_exit() {
        let acct = account();
        let position = acct.open_position(dec!(1000), 5, dec!(20)).await.unwrap();

        assert_eq!(position.quantity, dec!(0.02));
        assert_eq!(position.exit_price, dec!(1020));
        assert_eq!(position.settlement_amount, dec!(20.4));
        assert_eq!(position.status, PositionStatus::Pending);
        assert_eq!(position.symbol, "BTC/USDT");
        assert_eq!(position.account_id, acct.id());

        let ledger = acct.snapshot().await;
        assert_eq!(ledger.available_capital, dec!(980));
        assert_eq!(ledger.invested_capital, dec!(20));
        assert_eq!(ledger.total_capital, dec!(1000));
        assert_balanced(&ledger);
        assert!(acct.has_open_position_in_bucket(5).await);
        assert!(!acct.has_open_position_in_bucket(6).await);
    }

    #[tokio::test]
    async fn take_profit_fraction_overrides_default_markup() {
        let acct = TradingAccount::new(params(Some(dec!(0.005)))).unwrap();
        let position = acct.open_position(dec!(1000), 5, dec!(100)).await.unwrap();
        assert_eq!(position.exit_price, dec!(1005));
        assert_eq!(position.settlement_amount, dec!(100.5));
    }

    #[tokio::test]
    async fn open_rejects_oversized_and_non_positive_amounts() {
        let acct = account();
        assert!(matches!(
            acct.open_position(dec!(1000), 5, dec!(1000.01)).await,
            Err(Error::Invalid(_))
        ));
        assert!(matches!(
            acct.open_position(dec!(1000), 5, Decimal::ZERO).await,
            Err(Error::Invalid(_))
        ));
        assert!(matches!(
            acct.open_position(Decimal::ZERO, 0, dec!(10)).await,
            Err(Error::Invalid(_))
        ));
        assert_eq!(acct.snapshot().await, Ledger::new(dec!(1000)));
    }

    #[tokio::test]
    async fn settlement_returns_proceeds_and_records_exit_price() {
        let acct = account();
        let position = acct.open_position(dec!(1000), 5, dec!(20)).await.unwrap();

        let settled = acct.settle_positions_at_or_above(dec!(1020)).await;
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].id, position.id);

        let ledger = acct.snapshot().await;
        assert!(ledger.open_positions.is_empty());
        assert_eq!(ledger.available_capital, dec!(1000.4));
        assert_eq!(ledger.invested_capital, Decimal::ZERO);
        assert_eq!(ledger.last_exit_price, Some(dec!(1020)));
        assert_balanced(&ledger);
    }

    #[tokio::test]
    async fn settlement_keeps_unreached_positions_in_order() {
        let acct = account();
        let a = acct.open_position(dec!(1000), 5, dec!(20)).await.unwrap();
        let b = acct.open_position(dec!(1300), 6, dec!(20)).await.unwrap();
        let c = acct.open_position(dec!(900), 4, dec!(20)).await.unwrap();
        let d = acct.open_position(dec!(1500), 7, dec!(20)).await.unwrap();

        let settled = acct.settle_positions_at_or_above(dec!(1100)).await;
        let settled_ids: Vec<_> = settled.iter().map(|p| p.id.clone()).collect();
        assert_eq!(settled_ids, vec![a.id, c.id]);

        let ledger = acct.snapshot().await;
        let kept: Vec<_> = ledger.open_positions.iter().map(|p| p.id.clone()).collect();
        assert_eq!(kept, vec![b.id, d.id]);
        assert_balanced(&ledger);
    }

    #[tokio::test]
    async fn settlement_without_qualifying_positions_is_noop() {
        let acct = account();
        acct.open_position(dec!(1000), 5, dec!(20)).await.unwrap();
        let before = acct.snapshot().await;

        assert!(acct.settle_positions_at_or_above(dec!(1019.99)).await.is_empty());
        assert_eq!(acct.snapshot().await, before);
        assert_eq!(acct.last_exit_price().await, None);
    }

    #[tokio::test]
    async fn second_settlement_at_same_price_is_noop() {
        let acct = account();
        acct.open_position(dec!(1000), 5, dec!(20)).await.unwrap();
        acct.open_position(dec!(1400), 7, dec!(20)).await.unwrap();

        acct.settle_positions_at_or_above(dec!(1200)).await;
        let after_first = acct.snapshot().await;
        assert!(acct.settle_positions_at_or_above(dec!(1200)).await.is_empty());
        assert_eq!(acct.snapshot().await, after_first);
    }

    #[tokio::test]
    async fn external_id_attaches_once() {
        let acct = account();
        let position = acct.open_position(dec!(1000), 5, dec!(20)).await.unwrap();

        acct.attach_external_id(&position.id, "ext-1").await.unwrap();
        let ledger = acct.snapshot().await;
        assert_eq!(ledger.open_positions[0].status, PositionStatus::Open);
        assert_eq!(ledger.open_positions[0].external_id.as_deref(), Some("ext-1"));

        assert!(matches!(
            acct.attach_external_id(&position.id, "ext-2").await,
            Err(Error::Invalid(_))
        ));
        assert!(matches!(
            acct.attach_external_id("missing", "ext-3").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cancelling_pending_position_restores_capital() {
        let acct = account();
        let position = acct.open_position(dec!(1000), 5, dec!(20)).await.unwrap();

        let removed = acct.cancel_pending_position(&position.id).await.unwrap();
        assert_eq!(removed.id, position.id);
        assert_eq!(acct.snapshot().await, Ledger::new(dec!(1000)));
    }

    #[tokio::test]
    async fn confirmed_position_cannot_be_cancelled() {
        let acct = account();
        let position = acct.open_position(dec!(1000), 5, dec!(20)).await.unwrap();
        acct.attach_external_id(&position.id, "ext-1").await.unwrap();

        assert!(matches!(
            acct.cancel_pending_position(&position.id).await,
            Err(Error::Invalid(_))
        ));
        assert_eq!(acct.open_position_count().await, 1);
    }
}
