use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use account::{AccountParams, TradingAccount};
use common::{CurrencyPair, Error, OrderGateway, Position, Result};

/// Gateway double that hands out sequential ids, or fails on demand.
#[derive(Default)]
pub struct StubGateway {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl StubGateway {
    pub fn failing() -> Self {
        let gateway = Self::default();
        gateway.fail.store(true, Ordering::SeqCst);
        gateway
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderGateway for StubGateway {
    async fn create_order(&self, _position: &Position, _account_name: &str) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Exchange("venue unavailable".into()));
        }
        Ok(format!("ext-{n}"))
    }
}

pub fn account(initial_capital: Decimal, bucket_width: Decimal) -> Arc<TradingAccount> {
    Arc::new(
        TradingAccount::new(AccountParams {
            name: "TEST".into(),
            pair: CurrencyPair::new("BTC", "USDT"),
            initial_capital,
            bucket_width,
            take_profit_fraction: None,
            poll_interval: Duration::from_secs(20),
        })
        .unwrap(),
    )
}
