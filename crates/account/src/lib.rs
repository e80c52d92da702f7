pub mod account;

pub use account::{AccountParams, Ledger, TradingAccount, DEFAULT_TAKE_PROFIT};
