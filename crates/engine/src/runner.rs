use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, warn};

use common::{CurrencyPair, Error, PriceFeed, Result};
use strategy::{Strategy, StrategyRegistry};

/// Outcome of a single tick, mostly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Pairs for which a price sample was obtained.
    pub prices_fetched: usize,
    /// Pairs whose fetch failed; their strategies were skipped.
    pub feed_errors: usize,
    pub positions_opened: usize,
    pub strategy_errors: usize,
}

/// Polling loop. Each strategy runs on its own account's poll interval; on
/// every wake the runner samples each pair with a due strategy once and hands
/// the sample to the due strategies trading that pair.
///
/// Ticks never overlap: a strategy's next due time is counted from the end of
/// the tick it last ran in.
pub struct StrategyRunner {
    feed: Arc<dyn PriceFeed>,
    strategies: Vec<Box<dyn Strategy>>,
    /// Distinct pairs with the indices of the strategies trading them.
    groups: Vec<(CurrencyPair, Vec<usize>)>,
}

impl StrategyRunner {
    pub fn new(feed: Arc<dyn PriceFeed>, strategies: Vec<Box<dyn Strategy>>) -> Result<Self> {
        if strategies.is_empty() {
            return Err(Error::Invalid("runner needs at least one strategy".into()));
        }
        if let Some(s) = strategies
            .iter()
            .find(|s| s.account().params().poll_interval.is_zero())
        {
            return Err(Error::Invalid(format!(
                "strategy '{}': poll interval must be positive",
                s.name()
            )));
        }

        let mut groups: Vec<(CurrencyPair, Vec<usize>)> = Vec::new();
        for (idx, s) in strategies.iter().enumerate() {
            match groups.iter().position(|(pair, _)| pair == s.pair()) {
                Some(g) => groups[g].1.push(idx),
                None => groups.push((s.pair().clone(), vec![idx])),
            }
        }

        Ok(Self {
            feed,
            strategies,
            groups,
        })
    }

    /// Runner over every strategy in `registry`.
    pub fn from_registry(feed: Arc<dyn PriceFeed>, registry: StrategyRegistry) -> Result<Self> {
        Self::new(feed, registry.into_strategies())
    }

    fn poll_interval(&self, idx: usize) -> Duration {
        self.strategies[idx].account().params().poll_interval
    }

    /// Run every strategy once, regardless of its interval.
    pub async fn tick(&self) -> TickReport {
        let all: Vec<usize> = (0..self.strategies.len()).collect();
        self.tick_due(&all).await
    }

    /// Run the strategies at the given indices. Feed and strategy failures are
    /// logged and counted, never propagated.
    async fn tick_due(&self, due: &[usize]) -> TickReport {
        let mut report = TickReport::default();

        for (pair, members) in &self.groups {
            let members: Vec<usize> = members
                .iter()
                .copied()
                .filter(|idx| due.contains(idx))
                .collect();
            if members.is_empty() {
                continue;
            }

            let sample = match self.feed.price(pair).await {
                Ok(sample) => sample,
                Err(e) => {
                    error!(pair = %pair, kind = %e.kind(), error = %e, "could not get price");
                    report.feed_errors += 1;
                    continue;
                }
            };
            report.prices_fetched += 1;

            for idx in members {
                let strategy = &self.strategies[idx];
                match strategy.on_price(sample.price).await {
                    Ok(Some(_)) => report.positions_opened += 1,
                    Ok(None) => {}
                    Err(e) => {
                        error!(
                            strategy = %strategy.name(),
                            kind = %e.kind(),
                            error = %e,
                            "Strategy execution failed"
                        );
                        report.strategy_errors += 1;
                    }
                }
            }
        }

        report
    }

    /// Run forever: every strategy fires immediately, then again each time its
    /// account's poll interval elapses. Call from `tokio::spawn`.
    pub async fn run(self) {
        info!(
            strategies = self.strategies.len(),
            pairs = self.groups.len(),
            "StrategyRunner running"
        );

        let mut next_due = vec![Instant::now(); self.strategies.len()];
        loop {
            let now = Instant::now();
            let due: Vec<usize> = (0..next_due.len())
                .filter(|&idx| next_due[idx] <= now)
                .collect();

            let report = self.tick_due(&due).await;
            if report.feed_errors > 0 && report.prices_fetched == 0 {
                warn!("No price samples this tick");
            }

            let finished = Instant::now();
            for idx in due {
                next_due[idx] = finished + self.poll_interval(idx);
            }

            let Some(wake) = next_due.iter().min().copied() else {
                return;
            };
            tokio::time::sleep_until(wake).await;
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
