pub mod binance;
pub mod runner;

pub use binance::BinancePriceFeed;
pub use runner::{StrategyRunner, TickReport};
